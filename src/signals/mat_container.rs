use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use log::{debug, info};
use matfile::{MatFile, NumericData};
use crate::signals::SignalError;
const RESERVED_PREFIX: &str = "__";
/// One numeric MATLAB array, widened to `f64`.
///
/// `values` keeps MATLAB's column-major order; `dims` are MATLAB dimensions.
#[derive(Clone, Debug, PartialEq)]
pub struct NamedArray {
    pub name: String,
    pub dims: Vec<usize>,
    pub values: Vec<f64>,
}
impl NamedArray {
    pub fn is_vector(&self) -> bool {
        self.dims.len() <= 2 && self.dims.iter().any(|&d| d == 1)
    }
    /// Sequences to draw: a vector gives one, a matrix gives one per row.
    pub fn series(&self) -> Result<Vec<Vec<f64>>, SignalError> {
        if self.values.is_empty() {
            return Err(SignalError::EmptyArray(self.name.clone()));
        }
        if self.dims.len() > 2 {
            return Err(SignalError::TooManyDimensions {
                name: self.name.clone(),
                dims: self.dims.len(),
            });
        }
        if self.is_vector() {
            return Ok(vec![self.values.clone()]);
        }
        let (rows, cols) = (self.dims[0], self.dims[1]);
        Ok((0..rows)
            .map(|r| (0..cols).map(|c| self.values[r + c * rows]).collect())
            .collect())
    }
}
/// Numeric arrays of a Level-5 MAT file.
#[derive(Clone, Debug)]
pub struct MatContainer {
    path: PathBuf,
    arrays: Vec<NamedArray>,
}
impl MatContainer {
    pub fn open(path: &Path) -> Result<Self, SignalError> {
        let file = File::open(path)?;
        let arrays = read_arrays(BufReader::new(file))?;
        info!("loaded MAT file {} with {} arrays", path.display(), arrays.len());
        Ok(Self {
            path: path.to_path_buf(),
            arrays,
        })
    }
    pub fn path(&self) -> &Path {
        &self.path
    }
    pub fn names(&self) -> Vec<String> {
        self.arrays.iter().map(|a| a.name.clone()).collect()
    }
    pub fn get(&self, name: &str) -> Result<&NamedArray, SignalError> {
        self.arrays
            .iter()
            .find(|a| a.name == name)
            .ok_or_else(|| SignalError::UnknownArray(name.to_owned()))
    }
}
/// Parses a MAT stream, dropping names with the reserved `__` prefix.
pub fn read_arrays(reader: impl Read) -> Result<Vec<NamedArray>, SignalError> {
    let mat = MatFile::parse(reader).map_err(|err| SignalError::Mat(format!("{err:?}")))?;
    let arrays = mat
        .arrays()
        .iter()
        .filter(|a| !a.name().starts_with(RESERVED_PREFIX))
        .map(|a| {
            debug!("MAT array `{}` {:?}", a.name(), a.size());
            NamedArray {
                name: a.name().to_owned(),
                dims: a.size().to_vec(),
                values: widen(a.data()),
            }
        })
        .collect();
    Ok(arrays)
}
// Real parts only.
fn widen(data: &NumericData) -> Vec<f64> {
    fn cast<T: Copy + Into<f64>>(real: &[T]) -> Vec<f64> {
        real.iter().map(|&v| v.into()).collect()
    }
    match data {
        NumericData::Int8 { real, .. } => cast(real),
        NumericData::UInt8 { real, .. } => cast(real),
        NumericData::Int16 { real, .. } => cast(real),
        NumericData::UInt16 { real, .. } => cast(real),
        NumericData::Int32 { real, .. } => cast(real),
        NumericData::UInt32 { real, .. } => cast(real),
        NumericData::Int64 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::UInt64 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::Single { real, .. } => cast(real),
        NumericData::Double { real, .. } => real.clone(),
    }
}
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;
    const MI_INT8: u32 = 1;
    const MI_INT32: u32 = 5;
    const MI_UINT32: u32 = 6;
    const MI_DOUBLE: u32 = 9;
    const MI_MATRIX: u32 = 14;
    const MX_DOUBLE_CLASS: u32 = 6;
    fn element(kind: u32, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&kind.to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(data);
        while out.len() % 8 != 0 {
            out.push(0);
        }
        out
    }
    fn double_matrix(name: &str, rows: usize, cols: usize, column_major: &[f64]) -> Vec<u8> {
        let mut flags = MX_DOUBLE_CLASS.to_le_bytes().to_vec();
        flags.extend_from_slice(&0u32.to_le_bytes());
        let mut dims = (rows as i32).to_le_bytes().to_vec();
        dims.extend_from_slice(&(cols as i32).to_le_bytes());
        let real: Vec<u8> = column_major.iter().flat_map(|v| v.to_le_bytes()).collect();
        let mut body = element(MI_UINT32, &flags);
        body.extend(element(MI_INT32, &dims));
        body.extend(element(MI_INT8, name.as_bytes()));
        body.extend(element(MI_DOUBLE, &real));
        element(MI_MATRIX, &body)
    }
    /// Uncompressed Level-5 MAT bytes holding `arrays` as double matrices.
    pub(crate) fn mat_bytes(arrays: &[(&str, usize, usize, Vec<f64>)]) -> Vec<u8> {
        let mut out = format!("MATLAB 5.0 MAT-file, Platform: test, Created on: {:>60}", "")
            .into_bytes();
        out.resize(116, b' ');
        out.extend_from_slice(&[0u8; 8]);
        out.extend_from_slice(&0x0100u16.to_le_bytes());
        out.extend_from_slice(b"IM");
        for (name, rows, cols, values) in arrays {
            out.extend(double_matrix(name, *rows, *cols, values));
        }
        out
    }
    #[test]
    fn reads_named_arrays_and_hides_reserved_names() {
        let bytes = mat_bytes(&[
            ("ecg", 1, 4, vec![1.0, 2.0, 3.0, 4.0]),
            ("__meta__", 1, 1, vec![0.0]),
            ("leads", 2, 3, vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]),
        ]);
        let arrays = read_arrays(Cursor::new(bytes)).unwrap();
        let names: Vec<_> = arrays.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["ecg", "leads"]);
        assert_eq!(arrays[0].dims, [1, 4]);
        assert_eq!(arrays[0].values, [1.0, 2.0, 3.0, 4.0]);
    }
    #[test]
    fn matrix_rows_become_series() {
        let leads = NamedArray {
            name: "leads".into(),
            dims: vec![2, 3],
            values: vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0],
        };
        assert_eq!(
            leads.series().unwrap(),
            vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]
        );
        let column = NamedArray {
            name: "col".into(),
            dims: vec![3, 1],
            values: vec![7.0, 8.0, 9.0],
        };
        assert_eq!(column.series().unwrap(), vec![vec![7.0, 8.0, 9.0]]);
    }
    #[test]
    fn higher_rank_arrays_cannot_be_plotted() {
        let cube = NamedArray {
            name: "cube".into(),
            dims: vec![2, 2, 2],
            values: vec![0.0; 8],
        };
        assert!(matches!(
            cube.series(),
            Err(SignalError::TooManyDimensions { dims: 3, .. })
        ));
    }
    #[test]
    fn invalid_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.mat");
        std::fs::write(&path, b"this is not a MAT file").unwrap();
        assert!(matches!(MatContainer::open(&path), Err(SignalError::Mat(_))));
        assert!(matches!(
            MatContainer::open(&dir.path().join("absent.mat")),
            Err(SignalError::Io(_))
        ));
    }
}
