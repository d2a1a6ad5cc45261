use std::path::PathBuf;
use thiserror::Error;
use crate::imaging::ViewAxis;
#[derive(Debug, Error)]
pub enum ImagingError {
    #[error("no .dcm files found in {0}")]
    NoSlices(PathBuf),
    #[error("failed to read DICOM file {path}: {reason}")]
    Dicom { path: PathBuf, reason: String },
    #[error("{0} has no ImagePositionPatient; slices cannot be ordered")]
    MissingPosition(PathBuf),
    #[error("slice {path} is {actual:?} pixels, expected {expected:?}")]
    SliceShapeMismatch {
        path: PathBuf,
        expected: (usize, usize),
        actual: (usize, usize),
    },
    #[error("only single-sample (grayscale) pixel data is supported, got {0} samples per pixel")]
    UnsupportedSamples(u16),
    #[error("volume must be 3-D, got {0} dimensions")]
    NotVolumetric(usize),
    #[error("volume has an empty axis: {0:?}")]
    EmptyVolume([usize; 3]),
    #[error("no volume loaded")]
    NoVolume,
    #[error("no image loaded")]
    NoImage,
    #[error("{axis} index {index} is outside 0..={max}")]
    SliceOutOfRange {
        axis: ViewAxis,
        index: usize,
        max: usize,
    },
    #[error("unsupported kernel size {0}; use 3, 5 or 7")]
    UnsupportedKernel(u32),
    #[error("NIfTI error: {0}")]
    Nifti(#[from] nifti::NiftiError),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("volume shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
