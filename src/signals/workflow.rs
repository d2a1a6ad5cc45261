use std::fs;
use std::path::{Path, PathBuf};
use log::info;
use serde_json::json;
use crate::signals::stats::{self, StdConvention, Summary};
use crate::signals::{
    render_figure_png, ColumnData, MatContainer, PlotFigure, PlotStyle, SignalError, Table,
    TablePreview,
};
use crate::store::{AnalysisLog, Audited, SignalKind};
use crate::types::UserId;
const SUCCESS: &str = "success";
struct LastFigure {
    figure: PlotFigure,
    kind: SignalKind,
    source: PathBuf,
}
/// Signal expert state: the loaded MAT container, the loaded table and the
/// most recent figure.
pub struct SignalWorkflow {
    log: AnalysisLog,
    user: UserId,
    container: Option<MatContainer>,
    table: Option<Table>,
    last_figure: Option<LastFigure>,
    style: PlotStyle,
}
impl SignalWorkflow {
    pub fn new(log: AnalysisLog, user: UserId) -> Self {
        Self {
            log,
            user,
            container: None,
            table: None,
            last_figure: None,
            style: PlotStyle::default(),
        }
    }
    pub fn with_style(mut self, style: PlotStyle) -> Self {
        self.style = style;
        self
    }
    pub fn load_mat(&mut self, path: &Path) -> Result<Audited<Vec<String>>, SignalError> {
        let container = MatContainer::open(path)?;
        let names = container.names();
        let audit = self.record(SignalKind::MatrixContainer, path, "load", json!({}), SUCCESS);
        self.container = Some(container);
        Ok(Audited::new(names, audit))
    }
    pub fn plot_array(&mut self, name: &str) -> Result<Audited<PlotFigure>, SignalError> {
        let container = self.container.as_ref().ok_or(SignalError::NoContainer)?;
        let array = container.get(selected(name, "signal")?)?;
        let figure = PlotFigure::sequences(name, array.series()?);
        let source = container.path().to_path_buf();
        let audit = self.record(
            SignalKind::MatrixContainer,
            &source,
            "plot",
            json!({ "signal": name }),
            SUCCESS,
        );
        Ok(Audited::new(
            self.remember(figure, SignalKind::MatrixContainer, source),
            audit,
        ))
    }
    /// Population statistics over every value of the array.
    pub fn analyze_array(&self, name: &str) -> Result<Audited<String>, SignalError> {
        let container = self.container.as_ref().ok_or(SignalError::NoContainer)?;
        let array = container.get(selected(name, "signal")?)?;
        let report = Summary::of(&array.values, StdConvention::Population)
            .ok_or_else(|| SignalError::EmptyArray(name.to_owned()))?
            .report();
        let audit = self.record(
            SignalKind::MatrixContainer,
            container.path(),
            "basic_analysis",
            json!({ "signal": name }),
            &report,
        );
        Ok(Audited::new(report, audit))
    }
    pub fn load_table(&mut self, path: &Path) -> Result<Audited<TablePreview>, SignalError> {
        let table = Table::open(path)?;
        let audit = self.record(
            SignalKind::TabularText,
            path,
            "load",
            json!({ "columns": table.column_names() }),
            SUCCESS,
        );
        let preview = table.preview();
        self.table = Some(table);
        Ok(Audited::new(preview, audit))
    }
    pub fn plot_columns(&mut self, x: &str, y: &str) -> Result<Audited<PlotFigure>, SignalError> {
        let table = self.table.as_ref().ok_or(SignalError::NoTable)?;
        let x_column = table.column(selected(x, "x column")?)?;
        let y_column = table.column(selected(y, "y column")?)?;
        let figure = PlotFigure::from_columns(x_column, y_column);
        if figure.point_count() == 0 {
            return Err(SignalError::EmptyColumn(y.to_owned()));
        }
        let source = table.path().to_path_buf();
        let audit = self.record(
            SignalKind::TabularText,
            &source,
            "plot",
            json!({ "x_axis": x, "y_axis": y }),
            SUCCESS,
        );
        Ok(Audited::new(
            self.remember(figure, SignalKind::TabularText, source),
            audit,
        ))
    }
    /// Numeric columns get sample statistics; other columns get value counts.
    pub fn analyze_column(&self, name: &str) -> Result<Audited<String>, SignalError> {
        let table = self.table.as_ref().ok_or(SignalError::NoTable)?;
        let column = table.column(selected(name, "column")?)?;
        let report = match &column.data {
            ColumnData::Numeric(_) => {
                let summary = Summary::of(&column.numbers(), StdConvention::Sample)
                    .ok_or_else(|| SignalError::EmptyColumn(name.to_owned()))?;
                stats::column_report(name, &summary, table.row_count())
            }
            ColumnData::Categorical(_) => {
                let labels = column.labels();
                if labels.is_empty() {
                    return Err(SignalError::EmptyColumn(name.to_owned()));
                }
                let counts = stats::value_counts(labels.iter().map(String::as_str));
                stats::value_counts_report(name, &counts)
            }
        };
        let audit = self.record(
            SignalKind::TabularText,
            table.path(),
            "basic_analysis",
            json!({ "column": name }),
            &report,
        );
        Ok(Audited::new(report, audit))
    }
    /// Writes the most recent figure as PNG.
    pub fn export_plot(&self, path: &Path) -> Result<Audited<PathBuf>, SignalError> {
        let last = self.last_figure.as_ref().ok_or(SignalError::NoFigure)?;
        let png = render_figure_png(&last.figure, &self.style)?;
        fs::write(path, png)?;
        info!("exported figure `{}` to {}", last.figure.title, path.display());
        let audit = self.record(
            last.kind,
            &last.source,
            "plot_export",
            json!({ "target": path.display().to_string() }),
            SUCCESS,
        );
        Ok(Audited::new(path.to_path_buf(), audit))
    }
    fn remember(&mut self, figure: PlotFigure, kind: SignalKind, source: PathBuf) -> PlotFigure {
        self.last_figure = Some(LastFigure {
            figure: figure.clone(),
            kind,
            source,
        });
        figure
    }
    fn record(
        &self,
        kind: SignalKind,
        path: &Path,
        operation: &str,
        parameters: serde_json::Value,
        result: &str,
    ) -> Result<i64, crate::store::StoreError> {
        self.log.record_signal_analysis(
            &path.display().to_string(),
            kind,
            operation,
            &parameters,
            result,
            self.user,
        )
    }
}
fn selected<'a>(name: &'a str, what: &'static str) -> Result<&'a str, SignalError> {
    if name.is_empty() {
        Err(SignalError::NothingSelected(what))
    } else {
        Ok(name)
    }
}
