use thiserror::Error;
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("failed to read MAT file: {0}")]
    Mat(String),
    #[error("no MAT file loaded")]
    NoContainer,
    #[error("unknown array `{0}`")]
    UnknownArray(String),
    #[error("array `{name}` has {dims} dimensions; only vectors and 2-D matrices can be plotted")]
    TooManyDimensions { name: String, dims: usize },
    #[error("array `{0}` is empty")]
    EmptyArray(String),
    #[error("failed to read CSV file: {0}")]
    Csv(#[from] csv::Error),
    #[error("CSV file has no columns")]
    NoColumns,
    #[error("no CSV file loaded")]
    NoTable,
    #[error("unknown column `{0}`")]
    UnknownColumn(String),
    #[error("column `{0}` has no values")]
    EmptyColumn(String),
    #[error("no {0} selected")]
    NothingSelected(&'static str),
    #[error("nothing has been plotted yet")]
    NoFigure,
    #[error("failed to render plot: {0}")]
    Plot(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for SignalError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        SignalError::Plot(format!("{value:?}"))
    }
}
impl From<image::ImageError> for SignalError {
    fn from(value: image::ImageError) -> Self {
        SignalError::Plot(value.to_string())
    }
}
