use std::path::{Path, PathBuf};
use image::DynamicImage;
use log::info;
use serde_json::json;
use crate::imaging::{
    dicom_series, morphology, nifti_io, CellCount, ImagingError, KernelSize, MorphOp, SliceCursor,
    StudyMetadata, ViewAxis, Volume, VolumeViews,
};
use crate::store::{AnalysisLog, Audited};
use crate::types::UserId;
const SUCCESS: &str = "success";
/// Result of loading a DICOM series.
#[derive(Clone, Debug)]
pub struct SeriesLoaded {
    pub patient_line: String,
    pub views: VolumeViews,
}
struct LoadedVolume {
    volume: Volume,
    source: PathBuf,
    // `None` for volumes that did not come from a DICOM series
    metadata: Option<StudyMetadata>,
    cursor: SliceCursor,
}
struct WorkingImage {
    path: PathBuf,
    image: DynamicImage,
}
/// Image expert state: the current volume with its view cursor, and the
/// current 2-D working image.
///
/// Every successful operation except a view change appends one audit record;
/// failed operations append nothing.
pub struct ImageWorkflow {
    log: AnalysisLog,
    user: UserId,
    volume: Option<LoadedVolume>,
    image: Option<WorkingImage>,
}
impl ImageWorkflow {
    pub fn new(log: AnalysisLog, user: UserId) -> Self {
        Self {
            log,
            user,
            volume: None,
            image: None,
        }
    }
    pub fn has_volume(&self) -> bool {
        self.volume.is_some()
    }
    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }
    pub fn load_dicom_series(&mut self, dir: &Path) -> Result<Audited<SeriesLoaded>, ImagingError> {
        let series = dicom_series::load_series(dir)?;
        let entry = series.metadata.study_entry(&series.source, None);
        let audit = self.log.record_image_study(&entry, self.user);
        let loaded = self.replace_volume(series.volume, series.source, Some(series.metadata));
        let value = SeriesLoaded {
            patient_line: loaded
                .metadata
                .as_ref()
                .map(StudyMetadata::patient_line)
                .unwrap_or_default(),
            views: VolumeViews::render(&loaded.volume, &loaded.cursor),
        };
        Ok(Audited::new(value, audit))
    }
    /// Writes the current volume to `path` and appends a study record that
    /// points at the new file.
    pub fn export_nifti(&self, path: &Path) -> Result<Audited<PathBuf>, ImagingError> {
        let loaded = self.volume.as_ref().ok_or(ImagingError::NoVolume)?;
        nifti_io::export_volume(&loaded.volume, path)?;
        let entry = loaded
            .metadata
            .clone()
            .unwrap_or_default()
            .study_entry(&loaded.source, Some(path));
        let audit = self.log.record_image_study(&entry, self.user);
        Ok(Audited::new(path.to_path_buf(), audit))
    }
    pub fn load_nifti(&mut self, path: &Path) -> Result<Audited<VolumeViews>, ImagingError> {
        let volume = nifti_io::load_volume(path)?;
        let shape = volume.shape();
        let audit = self.log.record_image_analysis(
            &path.display().to_string(),
            "nifti-load",
            &json!({ "shape": shape }),
            SUCCESS,
            self.user,
        );
        let loaded = self.replace_volume(volume, path.to_path_buf(), None);
        Ok(Audited::new(
            VolumeViews::render(&loaded.volume, &loaded.cursor),
            audit,
        ))
    }
    /// Moves one view; not audited.
    pub fn set_slice(&mut self, axis: ViewAxis, index: usize) -> Result<VolumeViews, ImagingError> {
        let loaded = self.volume.as_mut().ok_or(ImagingError::NoVolume)?;
        loaded.cursor.set(axis, index)?;
        Ok(VolumeViews::render(&loaded.volume, &loaded.cursor))
    }
    pub fn cursor(&self) -> Option<SliceCursor> {
        self.volume.as_ref().map(|loaded| loaded.cursor)
    }
    pub fn load_image(&mut self, path: &Path) -> Result<Audited<DynamicImage>, ImagingError> {
        let image = image::open(path)?;
        info!(
            "loaded image {} ({}x{})",
            path.display(),
            image.width(),
            image.height()
        );
        let audit = self.log.record_image_analysis(
            &path.display().to_string(),
            "load",
            &json!({}),
            SUCCESS,
            self.user,
        );
        self.image = Some(WorkingImage {
            path: path.to_path_buf(),
            image: image.clone(),
        });
        Ok(Audited::new(image, audit))
    }
    /// Replaces the working image with the filtered one, so operations chain.
    pub fn apply_morphology(
        &mut self,
        op: MorphOp,
        kernel: KernelSize,
    ) -> Result<Audited<DynamicImage>, ImagingError> {
        let working = self.image.as_mut().ok_or(ImagingError::NoImage)?;
        let filtered = DynamicImage::ImageLuma8(morphology::apply(&working.image, op, kernel));
        working.image = filtered.clone();
        let audit = self.log.record_image_analysis(
            &working.path.display().to_string(),
            "morphological",
            &json!({ "operation": op.as_str(), "kernel_size": kernel.side() }),
            SUCCESS,
            self.user,
        );
        Ok(Audited::new(filtered, audit))
    }
    /// The working image is left as is; only the label map is returned.
    pub fn count_cells(&self) -> Result<Audited<CellCount>, ImagingError> {
        let working = self.image.as_ref().ok_or(ImagingError::NoImage)?;
        let counted = morphology::count_cells(&working.image);
        info!("counted {} cells (threshold {})", counted.count, counted.threshold);
        let audit = self.log.record_image_analysis(
            &working.path.display().to_string(),
            "cell_count",
            &json!({ "method": "connected_components" }),
            &counted.count.to_string(),
            self.user,
        );
        Ok(Audited::new(counted, audit))
    }
    /// Encodes the working image in the format implied by `path`'s extension.
    pub fn save_image(&self, path: &Path) -> Result<Audited<PathBuf>, ImagingError> {
        let working = self.image.as_ref().ok_or(ImagingError::NoImage)?;
        working.image.save(path)?;
        let audit = self.log.record_image_analysis(
            &working.path.display().to_string(),
            "save",
            &json!({ "target": path.display().to_string() }),
            SUCCESS,
            self.user,
        );
        Ok(Audited::new(path.to_path_buf(), audit))
    }
    fn replace_volume(
        &mut self,
        volume: Volume,
        source: PathBuf,
        metadata: Option<StudyMetadata>,
    ) -> &LoadedVolume {
        let cursor = SliceCursor::centered(volume.shape());
        self.volume.insert(LoadedVolume {
            volume,
            source,
            metadata,
            cursor,
        })
    }
}
