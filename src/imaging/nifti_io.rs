use std::path::Path;
use log::info;
use ndarray::{ArrayD, Axis, Ix3};
use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiObject, ReaderOptions};
use crate::imaging::{ImagingError, Volume};
/// Writes `volume` as a single-file NIfTI-1 image with an identity affine.
///
/// The array axes are stored in their in-memory order, so [`load_volume`]
/// returns the same `(slice, row, column)` shape.
pub fn export_volume(volume: &Volume, path: &Path) -> Result<(), ImagingError> {
    WriterOptions::new(path).write_nifti(volume.data())?;
    info!("exported volume {:?} to {}", volume.shape(), path.display());
    Ok(())
}
/// Reads a `.nii`/`.nii.gz` file as a 3-D volume.
pub fn load_volume(path: &Path) -> Result<Volume, ImagingError> {
    let obj = ReaderOptions::new().read_file(path)?;
    let data = obj.into_volume().into_ndarray::<f32>()?;
    let volume = Volume::new(squeeze_to_3d(data)?)?;
    info!("loaded NIfTI {} with shape {:?}", path.display(), volume.shape());
    Ok(volume)
}
// Trailing singleton axes (e.g. a one-frame 4-D file) are dropped.
fn squeeze_to_3d(mut data: ArrayD<f32>) -> Result<ndarray::Array3<f32>, ImagingError> {
    while data.ndim() > 3 && data.shape()[data.ndim() - 1] == 1 {
        let last = data.ndim() - 1;
        data = data.index_axis_move(Axis(last), 0);
    }
    if data.ndim() != 3 {
        return Err(ImagingError::NotVolumetric(data.ndim()));
    }
    Ok(data.into_dimensionality::<Ix3>()?)
}
#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array3, IxDyn};
    #[test]
    fn exported_volume_loads_back_with_same_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("series.nii");
        let data = Array3::from_shape_fn((3, 4, 5), |(z, r, c)| (z * 20 + r * 5 + c) as f32);
        let volume = Volume::new(data.clone()).unwrap();
        export_volume(&volume, &path).unwrap();
        let loaded = load_volume(&path).unwrap();
        assert_eq!(loaded.shape(), [3, 4, 5]);
        assert_eq!(loaded.data()[[2, 3, 4]], data[[2, 3, 4]]);
        assert_eq!(loaded.data()[[1, 0, 2]], data[[1, 0, 2]]);
    }
    #[test]
    fn single_frame_4d_volume_is_squeezed() {
        let data = ArrayD::<f32>::zeros(IxDyn(&[2, 3, 4, 1]));
        assert_eq!(squeeze_to_3d(data).unwrap().dim(), (2, 3, 4));
    }
    #[test]
    fn flat_image_is_not_a_volume() {
        let data = ArrayD::<f32>::zeros(IxDyn(&[8, 8]));
        assert!(matches!(
            squeeze_to_3d(data),
            Err(ImagingError::NotVolumetric(2))
        ));
    }
    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_volume(&dir.path().join("absent.nii")).is_err());
    }
}
