use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use csv::ReaderBuilder;
use log::info;
use crate::signals::SignalError;
const PREVIEW_ROWS: usize = 1000;
// 按缺失值处理的标记
const MISSING_MARKERS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN", "<NA>", "N/A",
    "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];
pub(crate) fn is_missing(cell: &str) -> bool {
    let cell = cell.trim();
    cell.is_empty() || MISSING_MARKERS.contains(&cell)
}
/// Typed contents of one column.
#[derive(Clone, Debug, PartialEq)]
pub enum ColumnData {
    /// Blank cells and missing markers (`NA`, `nan`, ...) are `None`.
    Numeric(Vec<Option<f64>>),
    Categorical(Vec<String>),
}
impl ColumnData {
    fn infer(cells: Vec<String>) -> Self {
        let parsed: Option<Vec<Option<f64>>> = cells
            .iter()
            .map(|cell| {
                if is_missing(cell) {
                    Some(None)
                } else {
                    cell.trim().parse::<f64>().ok().map(Some)
                }
            })
            .collect();
        match parsed {
            Some(values) if values.iter().any(Option::is_some) => ColumnData::Numeric(values),
            _ => ColumnData::Categorical(cells),
        }
    }
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnData::Numeric(_))
    }
}
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}
impl Column {
    /// Finite numeric values; empty for categorical columns.
    pub fn numbers(&self) -> Vec<f64> {
        match &self.data {
            ColumnData::Numeric(values) => values.iter().flatten().copied().filter(|v| v.is_finite()).collect(),
            ColumnData::Categorical(_) => Vec::new(),
        }
    }
    /// Present cells as text.
    pub fn labels(&self) -> Vec<String> {
        match &self.data {
            ColumnData::Numeric(values) => values.iter().flatten().map(f64::to_string).collect(),
            ColumnData::Categorical(cells) => cells
                .iter()
                .filter(|c| !is_missing(c))
                .cloned()
                .collect(),
        }
    }
}
/// Header row plus the first rows, as the grid shows them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TablePreview {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub total_rows: usize,
}
/// Comma-delimited text with a header row.
#[derive(Clone, Debug)]
pub struct Table {
    path: PathBuf,
    columns: Vec<Column>,
    rows: Vec<Vec<String>>,
}
impl Table {
    pub fn open(path: &Path) -> Result<Self, SignalError> {
        let mut table = Self::from_reader(File::open(path)?)?;
        table.path = path.to_path_buf();
        info!(
            "loaded CSV {} ({} rows x {} columns)",
            path.display(),
            table.row_count(),
            table.columns.len()
        );
        Ok(table)
    }
    /// Rows with a different number of fields than the header are an error.
    pub fn from_reader(reader: impl Read) -> Result<Self, SignalError> {
        let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers: Vec<String> = rdr.headers()?.iter().map(str::to_owned).collect();
        if headers.is_empty() {
            return Err(SignalError::NoColumns);
        }
        let mut rows = Vec::new();
        for record in rdr.records() {
            rows.push(record?.iter().map(str::to_owned).collect::<Vec<_>>());
        }
        let columns = headers
            .iter()
            .enumerate()
            .map(|(idx, name)| Column {
                name: name.clone(),
                data: ColumnData::infer(rows.iter().map(|row| row[idx].clone()).collect()),
            })
            .collect();
        Ok(Self {
            path: PathBuf::new(),
            columns,
            rows,
        })
    }
    pub fn path(&self) -> &Path {
        &self.path
    }
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
    pub fn column(&self, name: &str) -> Result<&Column, SignalError> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| SignalError::UnknownColumn(name.to_owned()))
    }
    pub fn preview(&self) -> TablePreview {
        TablePreview {
            headers: self.column_names(),
            rows: self.rows.iter().take(PREVIEW_ROWS).cloned().collect(),
            total_rows: self.rows.len(),
        }
    }
}
