// src/imaging/mod.rs
// 影像专家: DICOM 序列, NIfTI, 形态学与细胞计数
pub mod dicom_series;
pub mod error;
pub mod morphology;
pub mod nifti_io;
pub mod volume;
pub mod workflow;
pub use dicom_series::{DicomSeries, StudyMetadata};
pub use error::ImagingError;
pub use morphology::{CellCount, KernelSize, MorphOp};
pub use volume::{SliceCursor, ViewAxis, Volume, VolumeViews};
pub use workflow::{ImageWorkflow, SeriesLoaded};
