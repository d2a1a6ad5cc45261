// src/signals/mod.rs
// 信号专家: MAT 容器, CSV 表格, 统计与绘图
pub mod error;
pub mod mat_container;
pub mod plot;
pub mod stats;
pub mod table;
pub mod workflow;
pub use error::SignalError;
pub use mat_container::{MatContainer, NamedArray};
pub use plot::{render_figure_png, PlotFigure, PlotStyle, Series, SeriesKind};
pub use table::{Column, ColumnData, Table, TablePreview};
pub use workflow::SignalWorkflow;
