use std::fs;
use std::path::{Path, PathBuf};
use dicom::dictionary_std::tags;
use dicom::object::{open_file, FileDicomObject, InMemDicomObject, Tag};
use dicom::pixeldata::PixelDecoder;
use log::{debug, info};
use ndarray::{s, stack, Array2, ArrayView2, Axis};
use crate::imaging::{ImagingError, Volume};
use crate::store::StudyEntry;
type DcmObj = FileDicomObject<InMemDicomObject>;
const NOT_AVAILABLE: &str = "N/A";
/// Study attributes read from the first slice of a series.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StudyMetadata {
    pub patient_id: Option<String>,
    pub patient_name: Option<String>,
    pub study_date: Option<String>,
    pub modality: Option<String>,
}
impl StudyMetadata {
    /// `Patient: <name> | ID: <id>`, with `N/A` for missing attributes.
    pub fn patient_line(&self) -> String {
        format!(
            "Patient: {} | ID: {}",
            self.patient_name.as_deref().unwrap_or(NOT_AVAILABLE),
            self.patient_id.as_deref().unwrap_or(NOT_AVAILABLE)
        )
    }
    pub fn study_entry(&self, source: &Path, derived: Option<&Path>) -> StudyEntry {
        StudyEntry {
            patient_id: self.patient_id.clone(),
            patient_name: self.patient_name.clone(),
            study_date: self.study_date.clone(),
            modality: self.modality.clone(),
            source_path: source.display().to_string(),
            derived_path: derived.map(|p| p.display().to_string()),
        }
    }
}
/// A stacked series and where it came from.
#[derive(Clone, Debug)]
pub struct DicomSeries {
    pub source: PathBuf,
    pub volume: Volume,
    pub metadata: StudyMetadata,
}
/// One decoded file before ordering.
#[derive(Clone, Debug)]
pub struct SliceFile {
    pub path: PathBuf,
    pub z: f64,
    pub pixels: Array2<f32>,
    pub metadata: StudyMetadata,
}
/// Reads every `.dcm` file in `dir`, orders the slices by the z component of
/// ImagePositionPatient and stacks them into a `(slice, row, column)` volume.
pub fn load_series(dir: &Path) -> Result<DicomSeries, ImagingError> {
    let files = list_dicom_files(dir)?;
    if files.is_empty() {
        return Err(ImagingError::NoSlices(dir.to_path_buf()));
    }
    let slices = files
        .iter()
        .map(|path| read_slice(path))
        .collect::<Result<Vec<_>, _>>()?;
    let (volume, metadata) = stack_slices(slices)?;
    info!("loaded DICOM series {} with shape {:?}", dir.display(), volume.shape());
    Ok(DicomSeries {
        source: dir.to_path_buf(),
        volume,
        metadata,
    })
}
fn list_dicom_files(dir: &Path) -> Result<Vec<PathBuf>, ImagingError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_dcm = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm"));
        if is_dcm && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
fn read_slice(path: &Path) -> Result<SliceFile, ImagingError> {
    let dicom_err = |reason: String| ImagingError::Dicom {
        path: path.to_path_buf(),
        reason,
    };
    let obj = open_file(path).map_err(|e| dicom_err(e.to_string()))?;
    let position = obj
        .element(tags::IMAGE_POSITION_PATIENT)
        .ok()
        .and_then(|e| e.to_multi_float64().ok())
        .filter(|ipp| ipp.len() >= 3)
        .ok_or_else(|| ImagingError::MissingPosition(path.to_path_buf()))?;
    let decoded = obj
        .decode_pixel_data()
        .map_err(|e| dicom_err(e.to_string()))?;
    let samples = decoded.samples_per_pixel();
    if samples != 1 {
        return Err(ImagingError::UnsupportedSamples(samples));
    }
    // [frame, row, column, sample]
    let frames = decoded
        .to_ndarray::<f32>()
        .map_err(|e| dicom_err(e.to_string()))?;
    let pixels = frames.slice(s![0, .., .., 0]).to_owned();
    debug!("read slice {} at z={}", path.display(), position[2]);
    Ok(SliceFile {
        path: path.to_path_buf(),
        z: position[2],
        pixels,
        metadata: read_metadata(&obj),
    })
}
fn read_metadata(obj: &DcmObj) -> StudyMetadata {
    StudyMetadata {
        patient_id: text_element(obj, tags::PATIENT_ID),
        patient_name: text_element(obj, tags::PATIENT_NAME),
        study_date: text_element(obj, tags::STUDY_DATE),
        modality: text_element(obj, tags::MODALITY),
    }
}
fn text_element(obj: &DcmObj, tag: Tag) -> Option<String> {
    let element = obj.element(tag).ok()?;
    let value = element.to_str().ok()?;
    let trimmed = value.trim_matches(|c: char| c == ' ' || c == '\0');
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}
/// Orders slices by ascending z and stacks them. Metadata is taken from the
/// lowest slice; every slice must share its row/column shape.
pub fn stack_slices(mut slices: Vec<SliceFile>) -> Result<(Volume, StudyMetadata), ImagingError> {
    slices.sort_by(|a, b| a.z.total_cmp(&b.z));
    let Some(first) = slices.first() else {
        return Err(ImagingError::NoSlices(PathBuf::new()));
    };
    let expected = first.pixels.dim();
    if let Some(bad) = slices.iter().find(|sl| sl.pixels.dim() != expected) {
        return Err(ImagingError::SliceShapeMismatch {
            path: bad.path.clone(),
            expected,
            actual: bad.pixels.dim(),
        });
    }
    let metadata = first.metadata.clone();
    let views: Vec<ArrayView2<'_, f32>> = slices.iter().map(|sl| sl.pixels.view()).collect();
    let volume = Volume::new(stack(Axis(0), &views)?)?;
    Ok((volume, metadata))
}
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::imaging::ViewAxis;
    use dicom::core::{DataElement, PrimitiveValue, VR};
    use dicom::object::FileMetaTableBuilder;
    const CT_IMAGE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.2";
    const EXPLICIT_VR_LE: &str = "1.2.840.10008.1.2.1";
    fn text(tag: Tag, vr: VR, value: &str) -> DataElement<InMemDicomObject> {
        DataElement::new(tag, vr, PrimitiveValue::from(value))
    }
    fn us(tag: Tag, value: u16) -> DataElement<InMemDicomObject> {
        DataElement::new(tag, VR::US, PrimitiveValue::from(value))
    }
    fn position(z: f64) -> DataElement<InMemDicomObject> {
        let ipp = vec!["0".to_owned(), "0".to_owned(), z.to_string()];
        DataElement::new(tags::IMAGE_POSITION_PATIENT, VR::DS, PrimitiveValue::Strs(ipp.into()))
    }
    fn save(path: &Path, uid: &str, mut elements: Vec<DataElement<InMemDicomObject>>) {
        elements.push(text(tags::SOP_CLASS_UID, VR::UI, CT_IMAGE_STORAGE));
        elements.push(text(tags::SOP_INSTANCE_UID, VR::UI, uid));
        let meta = FileMetaTableBuilder::new()
            .transfer_syntax(EXPLICIT_VR_LE)
            .media_storage_sop_class_uid(CT_IMAGE_STORAGE)
            .media_storage_sop_instance_uid(uid);
        InMemDicomObject::from_element_iter(elements)
            .with_meta(meta)
            .unwrap()
            .write_to_file(path)
            .unwrap();
    }
    /// 2x3 CT slice of constant `raw` with rescale intercept -1000, patient
    /// id `P-42`, modality `CT`.
    pub(crate) fn write_ct_slice(path: &Path, z: Option<f64>, raw: u16, patient_name: Option<&str>) {
        let mut elements = vec![
            text(tags::PATIENT_ID, VR::LO, "P-42"),
            text(tags::MODALITY, VR::CS, "CT"),
            text(tags::STUDY_DATE, VR::DA, "20240105"),
            us(tags::SAMPLES_PER_PIXEL, 1),
            text(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, "MONOCHROME2"),
            us(tags::ROWS, 2),
            us(tags::COLUMNS, 3),
            us(tags::BITS_ALLOCATED, 16),
            us(tags::BITS_STORED, 16),
            us(tags::HIGH_BIT, 15),
            us(tags::PIXEL_REPRESENTATION, 0),
            text(tags::RESCALE_INTERCEPT, VR::DS, "-1000"),
            text(tags::RESCALE_SLOPE, VR::DS, "1"),
            DataElement::new(tags::PIXEL_DATA, VR::OW, PrimitiveValue::U16(vec![raw; 6].into())),
        ];
        if let Some(z) = z {
            elements.push(position(z));
        }
        if let Some(name) = patient_name {
            elements.push(text(tags::PATIENT_NAME, VR::PN, name));
        }
        save(path, &format!("2.25.{raw}"), elements);
    }
    fn write_rgb_slice(path: &Path) {
        let elements = vec![
            position(0.0),
            us(tags::SAMPLES_PER_PIXEL, 3),
            text(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, "RGB"),
            us(tags::PLANAR_CONFIGURATION, 0),
            us(tags::ROWS, 2),
            us(tags::COLUMNS, 3),
            us(tags::BITS_ALLOCATED, 8),
            us(tags::BITS_STORED, 8),
            us(tags::HIGH_BIT, 7),
            us(tags::PIXEL_REPRESENTATION, 0),
            DataElement::new(tags::PIXEL_DATA, VR::OB, PrimitiveValue::U8(vec![200u8; 18].into())),
        ];
        save(path, "2.25.77", elements);
    }
    fn slice(name: &str, z: f64, fill: f32, patient: &str) -> SliceFile {
        SliceFile {
            path: PathBuf::from(name),
            z,
            pixels: Array2::from_elem((2, 3), fill),
            metadata: StudyMetadata {
                patient_id: Some(patient.into()),
                ..Default::default()
            },
        }
    }
    #[test]
    fn slices_are_stacked_by_ascending_z() {
        let (volume, meta) = stack_slices(vec![
            slice("c.dcm", 12.5, 3.0, "third"),
            slice("a.dcm", -4.0, 1.0, "first"),
            slice("b.dcm", 0.0, 2.0, "second"),
        ])
        .unwrap();
        assert_eq!(volume.shape(), [3, 2, 3]);
        let firsts: Vec<f32> = (0..3)
            .map(|i| volume.slice(ViewAxis::Axial, i).unwrap()[[0, 0]])
            .collect();
        assert_eq!(firsts, [1.0, 2.0, 3.0]);
        assert_eq!(meta.patient_id.as_deref(), Some("first"));
    }
    #[test]
    fn series_files_are_ordered_by_position_and_rescaled() {
        let dir = tempfile::tempdir().unwrap();
        write_ct_slice(&dir.path().join("a.dcm"), Some(20.0), 1300, Some("DOE^JANE"));
        write_ct_slice(&dir.path().join("b.dcm"), Some(10.0), 1200, Some("DOE^JANE"));
        write_ct_slice(&dir.path().join("c.DCM"), Some(-5.0), 1100, Some("DOE^JANE"));
        let series = load_series(dir.path()).unwrap();
        assert_eq!(series.volume.shape(), [3, 2, 3]);
        let firsts: Vec<f32> = (0..3)
            .map(|i| series.volume.slice(ViewAxis::Axial, i).unwrap()[[1, 2]])
            .collect();
        assert_eq!(firsts, [100.0, 200.0, 300.0]);
        assert_eq!(
            series.metadata,
            StudyMetadata {
                patient_id: Some("P-42".into()),
                patient_name: Some("DOE^JANE".into()),
                study_date: Some("20240105".into()),
                modality: Some("CT".into()),
            }
        );
    }
    #[test]
    fn multi_sample_pixel_data_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_rgb_slice(&dir.path().join("rgb.dcm"));
        assert!(matches!(
            load_series(dir.path()),
            Err(ImagingError::UnsupportedSamples(3))
        ));
    }
    #[test]
    fn slice_without_position_cannot_be_ordered() {
        let dir = tempfile::tempdir().unwrap();
        write_ct_slice(&dir.path().join("a.dcm"), Some(0.0), 1000, None);
        write_ct_slice(&dir.path().join("b.dcm"), None, 1000, None);
        assert!(matches!(
            load_series(dir.path()),
            Err(ImagingError::MissingPosition(path)) if path.ends_with("b.dcm")
        ));
    }
    #[test]
    fn mismatched_slice_shape_is_reported() {
        let mut odd = slice("odd.dcm", 1.0, 0.0, "x");
        odd.pixels = Array2::zeros((4, 4));
        let err = stack_slices(vec![slice("a.dcm", 0.0, 0.0, "x"), odd]).unwrap_err();
        assert!(matches!(
            err,
            ImagingError::SliceShapeMismatch { expected: (2, 3), actual: (4, 4), .. }
        ));
    }
    #[test]
    fn patient_line_falls_back_to_na() {
        let meta = StudyMetadata {
            patient_name: Some("DOE^JANE".into()),
            ..Default::default()
        };
        assert_eq!(meta.patient_line(), "Patient: DOE^JANE | ID: N/A");
        assert_eq!(StudyMetadata::default().patient_line(), "Patient: N/A | ID: N/A");
    }
    #[test]
    fn directory_without_dcm_files_is_empty_series() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "not a slice").unwrap();
        assert!(matches!(
            load_series(dir.path()),
            Err(ImagingError::NoSlices(_))
        ));
    }
    #[test]
    fn unreadable_dcm_file_fails_the_load() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.DCM"), b"definitely not dicom").unwrap();
        assert!(matches!(
            load_series(dir.path()),
            Err(ImagingError::Dicom { .. })
        ));
    }
}
