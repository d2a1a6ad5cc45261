use std::fmt;
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use imageproc::contrast::otsu_level;
use imageproc::distance_transform::Norm;
use imageproc::morphology::{self, Mask};
use imageproc::region_labelling::{connected_components, Connectivity};
use serde::{Deserialize, Serialize};
use crate::imaging::ImagingError;
/// Grayscale morphological operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MorphOp {
    Opening,
    Closing,
    Gradient,
}
impl MorphOp {
    pub const ALL: [MorphOp; 3] = [MorphOp::Opening, MorphOp::Closing, MorphOp::Gradient];
    pub fn as_str(&self) -> &'static str {
        match self {
            MorphOp::Opening => "opening",
            MorphOp::Closing => "closing",
            MorphOp::Gradient => "gradient",
        }
    }
}
impl fmt::Display for MorphOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
/// Side of the square structuring element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KernelSize {
    K3,
    K5,
    K7,
}
impl KernelSize {
    pub const ALL: [KernelSize; 3] = [KernelSize::K3, KernelSize::K5, KernelSize::K7];
    pub fn from_side(side: u32) -> Result<Self, ImagingError> {
        match side {
            3 => Ok(KernelSize::K3),
            5 => Ok(KernelSize::K5),
            7 => Ok(KernelSize::K7),
            other => Err(ImagingError::UnsupportedKernel(other)),
        }
    }
    pub fn side(&self) -> u32 {
        match self {
            KernelSize::K3 => 3,
            KernelSize::K5 => 5,
            KernelSize::K7 => 7,
        }
    }
    fn mask(&self) -> Mask {
        Mask::square(((self.side() - 1) / 2) as u8)
    }
}
impl fmt::Display for KernelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{0}x{0}", self.side())
    }
}
/// Applies `op` to the luma channel of `image`.
pub fn apply(image: &DynamicImage, op: MorphOp, kernel: KernelSize) -> GrayImage {
    let gray = image.to_luma8();
    let mask = kernel.mask();
    match op {
        MorphOp::Opening => morphology::grayscale_open(&gray, &mask),
        MorphOp::Closing => morphology::grayscale_close(&gray, &mask),
        MorphOp::Gradient => {
            let dilated = morphology::grayscale_dilate(&gray, &mask);
            let eroded = morphology::grayscale_erode(&gray, &mask);
            GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
                let hi = dilated.get_pixel(x, y)[0];
                let lo = eroded.get_pixel(x, y)[0];
                Luma([hi.saturating_sub(lo)])
            })
        }
    }
}
/// Outcome of [`count_cells`].
#[derive(Clone, Debug)]
pub struct CellCount {
    pub count: usize,
    pub threshold: u8,
    pub labels: RgbImage,
}
/// Counts dark blobs on a light background.
///
/// Otsu threshold (at or below the level is foreground), opening with a 3x3
/// square twice, then 8-connected labelling. The background is not counted.
pub fn count_cells(image: &DynamicImage) -> CellCount {
    let gray = image.to_luma8();
    let threshold = otsu_level(&gray);
    let mut binary = gray;
    for p in binary.pixels_mut() {
        *p = if p[0] <= threshold { Luma([255]) } else { Luma([0]) };
    }
    // two 3x3 erosions then two 3x3 dilations
    let denoised = morphology::open(&binary, Norm::LInf, 2);
    let labelled = connected_components(&denoised, Connectivity::Eight, Luma([0u8]));
    let count = labelled.pixels().map(|p| p[0]).max().unwrap_or(0) as usize;
    let labels = colorize(&labelled, count);
    CellCount {
        count,
        threshold,
        labels,
    }
}
fn colorize(labelled: &image::ImageBuffer<Luma<u32>, Vec<u32>>, count: usize) -> RgbImage {
    let scale = count.max(1) as f32;
    RgbImage::from_fn(labelled.width(), labelled.height(), |x, y| {
        jet(labelled.get_pixel(x, y)[0] as f32 / scale)
    })
}
// Piecewise-linear "jet" ramp: dark blue at 0, dark red at 1.
fn jet(t: f32) -> Rgb<u8> {
    let t = t.clamp(0.0, 1.0);
    let channel = |offset: f32| {
        let v = 1.5 - (4.0 * t - offset).abs();
        (v.clamp(0.0, 1.0) * 255.0).round() as u8
    };
    Rgb([channel(3.0), channel(2.0), channel(1.0)])
}
#[cfg(test)]
mod tests {
    use super::*;
    // light background with `n` dark 12x12 squares in a row
    fn blobs(n: u32) -> DynamicImage {
        let width = 20 + n * 24;
        let img = GrayImage::from_fn(width, 40, |x, y| {
            let in_blob = (14..26).contains(&y) && x >= 10 && (x - 10) % 24 < 12 && (x - 10) / 24 < n;
            if in_blob { Luma([20]) } else { Luma([230]) }
        });
        DynamicImage::ImageLuma8(img)
    }
    #[test]
    fn counts_separated_blobs() {
        for n in [1, 3, 5] {
            assert_eq!(count_cells(&blobs(n)).count, n as usize, "{n} blobs");
        }
    }
    #[test]
    fn isolated_specks_are_removed_before_counting() {
        let mut img = blobs(2).to_luma8();
        img.put_pixel(3, 3, Luma([0]));
        img.put_pixel(5, 36, Luma([0]));
        let result = count_cells(&DynamicImage::ImageLuma8(img));
        assert_eq!(result.count, 2);
    }
    #[test]
    fn label_map_keeps_image_size() {
        let image = blobs(2);
        let result = count_cells(&image);
        assert_eq!(result.labels.dimensions(), (image.width(), image.height()));
        assert!(result.threshold >= 20 && result.threshold < 230);
    }
    #[test]
    fn gradient_of_flat_image_is_zero() {
        let flat = DynamicImage::ImageLuma8(GrayImage::from_pixel(16, 16, Luma([90])));
        let out = apply(&flat, MorphOp::Gradient, KernelSize::K5);
        assert!(out.pixels().all(|p| p[0] == 0));
    }
    #[test]
    fn opening_erases_features_smaller_than_kernel() {
        let mut img = GrayImage::from_pixel(15, 15, Luma([10]));
        img.put_pixel(7, 7, Luma([200]));
        let out = apply(&DynamicImage::ImageLuma8(img.clone()), MorphOp::Opening, KernelSize::K3);
        assert_eq!(out.get_pixel(7, 7)[0], 10);
        let closed = apply(&DynamicImage::ImageLuma8(img), MorphOp::Closing, KernelSize::K3);
        assert_eq!(closed.get_pixel(7, 7)[0], 200);
    }
    #[test]
    fn color_input_is_reduced_to_one_channel() {
        let rgb = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 6, Rgb([10, 200, 30])));
        let out = apply(&rgb, MorphOp::Closing, KernelSize::K7);
        assert_eq!(out.dimensions(), (8, 6));
    }
    #[test]
    fn only_odd_kernels_3_to_7_are_accepted() {
        assert_eq!(KernelSize::from_side(5).unwrap(), KernelSize::K5);
        assert!(matches!(
            KernelSize::from_side(4),
            Err(ImagingError::UnsupportedKernel(4))
        ));
        assert_eq!(KernelSize::K7.to_string(), "7x7");
    }
}
