// src/types.rs
use std::fmt;
use std::path::PathBuf;
use image::{DynamicImage, RgbImage};
use serde::{Deserialize, Serialize};
use crate::imaging::{KernelSize, MorphOp, ViewAxis, VolumeViews};
use crate::signals::{PlotFigure, TablePreview};
use crate::store::History;

// 用户角色 (注册时选定, 之后不可更改)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    ImageExpert,
    SignalExpert,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::ImageExpert => "image-expert",
            Role::SignalExpert => "signal-expert",
        }
    }
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "image-expert" => Some(Role::ImageExpert),
            "signal-expert" => Some(Role::SignalExpert),
            _ => None,
        }
    }
    pub fn label(&self) -> &'static str {
        match self {
            Role::ImageExpert => "Image expert",
            Role::SignalExpert => "Signal expert",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// 数据库分配的用户 id
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// GUI 发给后台的命令
#[derive(Clone, Debug)]
pub enum AppCommand {
    Login { username: String, password: String },
    Register { username: String, password: String, role: Role },
    Image(ImageCommand),
    Signal(SignalCommand),
    RefreshHistory,
}

// 影像专家的操作
#[derive(Clone, Debug)]
pub enum ImageCommand {
    LoadDicomSeries(PathBuf),
    ExportNifti(PathBuf),
    LoadNifti(PathBuf),
    SetSlice { axis: ViewAxis, index: usize },
    LoadImage(PathBuf),
    ApplyMorphology { op: MorphOp, kernel: KernelSize },
    CountCells,
    SaveImage(PathBuf),
}

// 信号专家的操作
#[derive(Clone, Debug)]
pub enum SignalCommand {
    LoadMat(PathBuf),
    PlotArray(String),
    AnalyzeArray(String),
    LoadTable(PathBuf),
    PlotColumns { x: String, y: String },
    AnalyzeColumn(String),
    ExportPlot(PathBuf),
}

// 提示级别 (对应弹窗类型)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Info, text: text.into() }
    }
    pub fn warning(text: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Warning, text: text.into() }
    }
    pub fn error(text: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Error, text: text.into() }
    }
}

// 后台发给 GUI 的消息
#[derive(Clone, Debug)]
pub enum AppMessage {
    Log(String),
    Notice(Notice),
    Registered { username: String, role: Role },
    LoggedIn { username: String, role: Role },
    PatientInfo(String),
    Volume(VolumeViews),
    WorkingImage { image: DynamicImage, caption: String },
    CellCount { count: usize, labels: RgbImage },
    MatArrays(Vec<String>),
    Table(TablePreview),
    Figure(PlotFigure),
    Report { title: String, text: String },
    History(History),
}
