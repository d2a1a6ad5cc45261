use std::fmt;
use std::ops::RangeInclusive;
use image::{GrayImage, Luma};
use ndarray::{Array3, ArrayView2, Axis};
use crate::imaging::ImagingError;
/// The three orthogonal cross sections of a `(slice, row, column)` volume.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ViewAxis {
    Axial,
    Coronal,
    Sagittal,
}
impl ViewAxis {
    pub const ALL: [ViewAxis; 3] = [ViewAxis::Axial, ViewAxis::Coronal, ViewAxis::Sagittal];
    /// Array axis this view cuts across.
    pub fn index(self) -> usize {
        match self {
            ViewAxis::Axial => 0,
            ViewAxis::Coronal => 1,
            ViewAxis::Sagittal => 2,
        }
    }
    pub fn label(self) -> &'static str {
        match self {
            ViewAxis::Axial => "Axial",
            ViewAxis::Coronal => "Coronal",
            ViewAxis::Sagittal => "Sagittal",
        }
    }
}
impl fmt::Display for ViewAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
/// Voxel block stored as `(slice, row, column)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Volume {
    data: Array3<f32>,
}
impl Volume {
    /// Wraps `data`; every axis must be non-empty.
    pub fn new(data: Array3<f32>) -> Result<Self, ImagingError> {
        let shape = shape_of(&data);
        if shape.contains(&0) {
            return Err(ImagingError::EmptyVolume(shape));
        }
        Ok(Self { data })
    }
    pub fn shape(&self) -> [usize; 3] {
        shape_of(&self.data)
    }
    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }
    /// Cross section at `index` along `axis`, or `None` when out of range.
    pub fn slice(&self, axis: ViewAxis, index: usize) -> Option<ArrayView2<'_, f32>> {
        (index < self.shape()[axis.index()]).then(|| self.data.index_axis(Axis(axis.index()), index))
    }
}
fn shape_of(data: &Array3<f32>) -> [usize; 3] {
    let (a, b, c) = data.dim();
    [a, b, c]
}
/// Current view position on each axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SliceCursor {
    shape: [usize; 3],
    indices: [usize; 3],
}
impl SliceCursor {
    /// Every index starts at `dim / 2`.
    pub fn centered(shape: [usize; 3]) -> Self {
        Self {
            shape,
            indices: shape.map(|dim| dim / 2),
        }
    }
    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }
    pub fn indices(&self) -> [usize; 3] {
        self.indices
    }
    pub fn index(&self, axis: ViewAxis) -> usize {
        self.indices[axis.index()]
    }
    /// Valid positions for `axis`: `0..=dim-1`.
    pub fn range(&self, axis: ViewAxis) -> RangeInclusive<usize> {
        0..=self.shape[axis.index()].saturating_sub(1)
    }
    pub fn set(&mut self, axis: ViewAxis, index: usize) -> Result<(), ImagingError> {
        let max = *self.range(axis).end();
        if index > max {
            return Err(ImagingError::SliceOutOfRange { axis, index, max });
        }
        self.indices[axis.index()] = index;
        Ok(())
    }
}
/// Rendered cross sections for the three viewers, in [`ViewAxis::ALL`] order.
#[derive(Clone, Debug)]
pub struct VolumeViews {
    pub shape: [usize; 3],
    pub indices: [usize; 3],
    pub slices: [GrayImage; 3],
}
impl VolumeViews {
    pub fn render(volume: &Volume, cursor: &SliceCursor) -> Self {
        let slices = ViewAxis::ALL.map(|axis| {
            volume
                .slice(axis, cursor.index(axis))
                .map(to_gray)
                .unwrap_or_else(|| GrayImage::new(1, 1))
        });
        Self {
            shape: volume.shape(),
            indices: cursor.indices(),
            slices,
        }
    }
}
/// Min/max windowing of one cross section onto 8 bits.
pub fn to_gray(slice: ArrayView2<'_, f32>) -> GrayImage {
    let (rows, cols) = slice.dim();
    let (min, max) = slice
        .iter()
        .filter(|v| v.is_finite())
        .fold((f32::MAX, f32::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let span = max - min;
    GrayImage::from_fn(cols as u32, rows as u32, |x, y| {
        let v = slice[[y as usize, x as usize]];
        if !v.is_finite() || span <= f32::EPSILON {
            return Luma([0]);
        }
        Luma([(((v - min) / span) * 255.0).round() as u8])
    })
}
#[cfg(test)]
mod tests {
    use super::*;
    fn ramp(shape: (usize, usize, usize)) -> Volume {
        Volume::new(Array3::from_shape_fn(shape, |(z, r, c)| (z * 100 + r * 10 + c) as f32)).unwrap()
    }
    #[test]
    fn cursor_starts_at_mid_points() {
        let cursor = SliceCursor::centered([5, 8, 3]);
        assert_eq!(cursor.indices(), [2, 4, 1]);
        assert_eq!(cursor.range(ViewAxis::Axial), 0..=4);
        assert_eq!(cursor.range(ViewAxis::Coronal), 0..=7);
        assert_eq!(cursor.range(ViewAxis::Sagittal), 0..=2);
    }
    #[test]
    fn cursor_rejects_out_of_range_index() {
        let mut cursor = SliceCursor::centered([5, 8, 3]);
        cursor.set(ViewAxis::Sagittal, 2).unwrap();
        let err = cursor.set(ViewAxis::Sagittal, 3).unwrap_err();
        assert!(matches!(
            err,
            ImagingError::SliceOutOfRange { max: 2, index: 3, .. }
        ));
        assert_eq!(cursor.indices(), [2, 4, 2]);
    }
    #[test]
    fn cross_sections_follow_axis_order() {
        let volume = ramp((4, 3, 2));
        let axial = volume.slice(ViewAxis::Axial, 1).unwrap();
        assert_eq!(axial.dim(), (3, 2));
        assert_eq!(axial[[2, 1]], 121.0);
        let coronal = volume.slice(ViewAxis::Coronal, 2).unwrap();
        assert_eq!(coronal.dim(), (4, 2));
        assert_eq!(coronal[[3, 0]], 320.0);
        let sagittal = volume.slice(ViewAxis::Sagittal, 1).unwrap();
        assert_eq!(sagittal.dim(), (4, 3));
        assert!(volume.slice(ViewAxis::Sagittal, 2).is_none());
    }
    #[test]
    fn rendered_views_match_cursor() {
        let volume = ramp((4, 3, 2));
        let cursor = SliceCursor::centered(volume.shape());
        let views = VolumeViews::render(&volume, &cursor);
        assert_eq!(views.indices, [2, 1, 1]);
        assert_eq!(views.slices[0].dimensions(), (2, 3));
        assert_eq!(views.slices[1].dimensions(), (2, 4));
        assert_eq!(views.slices[2].dimensions(), (3, 4));
    }
    #[test]
    fn gray_windowing_spans_full_range() {
        let volume = ramp((1, 2, 2));
        let gray = to_gray(volume.slice(ViewAxis::Axial, 0).unwrap());
        assert_eq!(gray.get_pixel(0, 0)[0], 0);
        assert_eq!(gray.get_pixel(1, 1)[0], 255);
        let flat = Array3::<f32>::from_elem((1, 2, 2), 7.0);
        let gray = to_gray(Volume::new(flat).unwrap().slice(ViewAxis::Axial, 0).unwrap());
        assert!(gray.pixels().all(|p| p[0] == 0));
    }
    #[test]
    fn empty_axis_is_rejected() {
        assert!(matches!(
            Volume::new(Array3::zeros((0, 2, 2))),
            Err(ImagingError::EmptyVolume([0, 2, 2]))
        ));
    }
}
