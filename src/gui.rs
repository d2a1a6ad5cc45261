// src/gui.rs
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::time::Duration;
use eframe::egui;
use egui::{Color32, ColorImage, RichText, TextureHandle, TextureOptions, Vec2};
use egui_plot::{Legend, Line, Plot, PlotPoints, Points};
use image::DynamicImage;
use crate::engine::{self, Engine};
use crate::imaging::{KernelSize, MorphOp, ViewAxis, VolumeViews};
use crate::signals::{PlotFigure, SeriesKind, TablePreview};
use crate::store::History;
use crate::types::*;

const LOG_LINES: usize = 200;
const VIEW_SIZE: f32 = 260.0;

#[derive(Clone, Copy, PartialEq, Eq)]
enum ImageTab { Volume, Micrograph }

#[derive(Clone, Copy, PartialEq, Eq)]
enum SignalTab { Mat, Csv }

// 三视图纹理
struct VolumeTextures {
    shape: [usize; 3],
    slices: [TextureHandle; 3],
}

pub struct BiomedApp {
    // 登录表单
    username: String,
    password: String,
    register_role: Role,
    user: Option<(String, Role)>,

    // 弹窗与日志
    notices: Vec<Notice>,
    report: Option<(String, String)>,
    log_messages: Vec<String>,
    history: Option<History>,
    show_history: bool,

    // 影像专家
    image_tab: ImageTab,
    patient_info: String,
    volume: Option<VolumeTextures>,
    slice_indices: [usize; 3],
    working_image: Option<(TextureHandle, String)>,
    cell_count: Option<usize>,
    morph_op: MorphOp,
    kernel: KernelSize,

    // 信号专家
    signal_tab: SignalTab,
    mat_arrays: Vec<String>,
    selected_array: String,
    table: Option<TablePreview>,
    x_column: String,
    y_column: String,
    figure: Option<PlotFigure>,

    // 通讯管道
    rx: Receiver<AppMessage>,
    tx_cmd: Sender<AppCommand>,
}

impl BiomedApp {
    pub fn new(engine: Engine) -> Self {
        let (tx, rx) = channel();
        let (tx_cmd, rx_cmd) = channel();

        // 启动后台引擎
        engine::spawn_thread(engine, tx, rx_cmd);

        Self {
            username: String::new(), password: String::new(), register_role: Role::ImageExpert, user: None,
            notices: Vec::new(), report: None,
            log_messages: vec!["Biomedical Analyzer ready.".to_owned()],
            history: None, show_history: false,
            image_tab: ImageTab::Volume, patient_info: String::new(), volume: None, slice_indices: [0; 3],
            working_image: None, cell_count: None, morph_op: MorphOp::Opening, kernel: KernelSize::K3,
            signal_tab: SignalTab::Mat, mat_arrays: Vec::new(), selected_array: String::new(),
            table: None, x_column: String::new(), y_column: String::new(), figure: None,
            rx, tx_cmd,
        }
    }

    fn send(&mut self, cmd: AppCommand) {
        if self.tx_cmd.send(cmd).is_err() {
            self.notices.push(Notice::error("The analysis engine has stopped."));
        }
    }

    fn log(&mut self, msg: &str) {
        self.log_messages.push(format!("> {}", msg));
        if self.log_messages.len() > LOG_LINES { self.log_messages.remove(0); }
    }

    fn poll_messages(&mut self, ctx: &egui::Context) {
        while let Ok(msg) = self.rx.try_recv() {
            match msg {
                AppMessage::Log(s) => self.log(&s),
                AppMessage::Notice(n) => self.notices.push(n),
                AppMessage::Registered { username, role } => {
                    self.log(&format!("Account {username} created as {}", role.label()));
                }
                AppMessage::LoggedIn { username, role } => {
                    self.password.clear();
                    self.user = Some((username, role));
                }
                AppMessage::PatientInfo(line) => self.patient_info = line,
                AppMessage::Volume(views) => self.show_volume(ctx, views),
                AppMessage::WorkingImage { image, caption } => {
                    let tex = ctx.load_texture("working", to_color_image(&image), TextureOptions::LINEAR);
                    self.working_image = Some((tex, caption));
                    self.cell_count = None;
                }
                AppMessage::CellCount { count, labels } => {
                    let tex = ctx.load_texture("labels", to_color_image(&DynamicImage::ImageRgb8(labels)), TextureOptions::NEAREST);
                    self.working_image = Some((tex, format!("Cells detected: {count}")));
                    self.cell_count = Some(count);
                }
                AppMessage::MatArrays(names) => {
                    self.selected_array = names.first().cloned().unwrap_or_default();
                    self.mat_arrays = names;
                }
                AppMessage::Table(preview) => {
                    self.x_column = preview.headers.first().cloned().unwrap_or_default();
                    self.y_column = preview.headers.get(1).or(preview.headers.first()).cloned().unwrap_or_default();
                    self.table = Some(preview);
                }
                AppMessage::Figure(figure) => self.figure = Some(figure),
                AppMessage::Report { title, text } => self.report = Some((title, text)),
                AppMessage::History(history) => self.history = Some(history),
            }
        }
    }

    fn show_volume(&mut self, ctx: &egui::Context, views: VolumeViews) {
        let [a, c, s] = views.slices;
        let load = |name: &str, img: image::GrayImage| ctx.load_texture(name, to_color_image(&DynamicImage::ImageLuma8(img)), TextureOptions::LINEAR);
        self.volume = Some(VolumeTextures {
            shape: views.shape,
            slices: [load("axial", a), load("coronal", c), load("sagittal", s)],
        });
        self.slice_indices = views.indices;
    }

    // === 登录 / 注册 ===
    fn login_panel(&mut self, ui: &mut egui::Ui) {
        ui.vertical_centered(|ui| {
            ui.add_space(80.0);
            ui.heading("Biomedical Analyzer");
            ui.label("Sign in to continue");
            ui.add_space(20.0);
            egui::Grid::new("login").num_columns(2).spacing([12.0, 8.0]).show(ui, |ui| {
                ui.label("Username");
                ui.text_edit_singleline(&mut self.username);
                ui.end_row();
                ui.label("Password");
                ui.add(egui::TextEdit::singleline(&mut self.password).password(true));
                ui.end_row();
                ui.label("Role (new accounts)");
                ui.horizontal(|ui| {
                    ui.radio_value(&mut self.register_role, Role::ImageExpert, Role::ImageExpert.label());
                    ui.radio_value(&mut self.register_role, Role::SignalExpert, Role::SignalExpert.label());
                });
                ui.end_row();
            });
            ui.add_space(12.0);
            ui.horizontal(|ui| {
                if ui.button("Login").clicked() {
                    let cmd = AppCommand::Login { username: self.username.trim().to_owned(), password: self.password.clone() };
                    self.send(cmd);
                }
                if ui.button("Register").clicked() {
                    let cmd = AppCommand::Register {
                        username: self.username.trim().to_owned(),
                        password: self.password.clone(),
                        role: self.register_role,
                    };
                    self.send(cmd);
                }
            });
        });
    }

    // === 影像专家界面 ===
    fn image_panel(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.selectable_value(&mut self.image_tab, ImageTab::Volume, "DICOM / NIfTI");
            ui.selectable_value(&mut self.image_tab, ImageTab::Micrograph, "Cell images");
        });
        ui.separator();
        match self.image_tab {
            ImageTab::Volume => self.volume_tab(ui),
            ImageTab::Micrograph => self.micrograph_tab(ui),
        }
    }

    fn volume_tab(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if ui.button("📂 Load DICOM folder").clicked() {
                if let Some(dir) = rfd::FileDialog::new().pick_folder() {
                    self.send(AppCommand::Image(ImageCommand::LoadDicomSeries(dir)));
                }
            }
            let has_volume = self.volume.is_some();
            if ui.add_enabled(has_volume, egui::Button::new("💾 Export NIfTI")).clicked() {
                if let Some(path) = rfd::FileDialog::new().add_filter("NIfTI", &["nii", "gz"]).set_file_name("volume.nii").save_file() {
                    self.send(AppCommand::Image(ImageCommand::ExportNifti(path)));
                }
            }
            if ui.button("📂 Load NIfTI").clicked() {
                if let Some(path) = rfd::FileDialog::new().add_filter("NIfTI", &["nii", "gz"]).pick_file() {
                    self.send(AppCommand::Image(ImageCommand::LoadNifti(path)));
                }
            }
        });
        if !self.patient_info.is_empty() {
            ui.label(RichText::new(&self.patient_info).strong());
        }
        ui.add_space(8.0);

        let Some(volume) = &self.volume else {
            ui.label("No volume loaded.");
            return;
        };
        let shape = volume.shape;
        let textures: Vec<(egui::TextureId, Vec2)> = volume.slices.iter().map(|t| (t.id(), fit(t.size_vec2(), VIEW_SIZE))).collect();
        let mut changed = None;
        ui.horizontal(|ui| {
            for (axis, (tex, size)) in ViewAxis::ALL.into_iter().zip(textures) {
                ui.vertical(|ui| {
                    ui.label(axis.label());
                    ui.add(egui::Image::new((tex, size)));
                    let idx = &mut self.slice_indices[axis.index()];
                    let max = shape[axis.index()].saturating_sub(1);
                    if ui.add(egui::Slider::new(idx, 0..=max)).changed() {
                        changed = Some((axis, *idx));
                    }
                });
            }
        });
        if let Some((axis, index)) = changed {
            self.send(AppCommand::Image(ImageCommand::SetSlice { axis, index }));
        }
    }

    fn micrograph_tab(&mut self, ui: &mut egui::Ui) {
        let has_image = self.working_image.is_some();
        ui.horizontal(|ui| {
            if ui.button("📂 Load image").clicked() {
                if let Some(path) = rfd::FileDialog::new().add_filter("Images", &["png", "jpg", "jpeg", "tif", "tiff"]).pick_file() {
                    self.send(AppCommand::Image(ImageCommand::LoadImage(path)));
                }
            }
            if ui.add_enabled(has_image, egui::Button::new("💾 Save image")).clicked() {
                if let Some(path) = rfd::FileDialog::new().add_filter("PNG", &["png"]).add_filter("JPEG", &["jpg"]).set_file_name("result.png").save_file() {
                    self.send(AppCommand::Image(ImageCommand::SaveImage(path)));
                }
            }
        });
        ui.horizontal(|ui| {
            egui::ComboBox::from_label("Operation")
                .selected_text(self.morph_op.as_str())
                .show_ui(ui, |ui| {
                    for op in MorphOp::ALL {
                        ui.selectable_value(&mut self.morph_op, op, op.as_str());
                    }
                });
            egui::ComboBox::from_label("Kernel")
                .selected_text(self.kernel.to_string())
                .show_ui(ui, |ui| {
                    for k in KernelSize::ALL {
                        ui.selectable_value(&mut self.kernel, k, k.to_string());
                    }
                });
            if ui.add_enabled(has_image, egui::Button::new("Apply")).clicked() {
                let cmd = ImageCommand::ApplyMorphology { op: self.morph_op, kernel: self.kernel };
                self.send(AppCommand::Image(cmd));
            }
            if ui.add_enabled(has_image, egui::Button::new("🔬 Count cells")).clicked() {
                self.send(AppCommand::Image(ImageCommand::CountCells));
            }
        });
        if let Some(count) = self.cell_count {
            ui.label(RichText::new(format!("Cells detected: {count}")).strong().color(Color32::LIGHT_GREEN));
        }
        ui.add_space(8.0);
        match &self.working_image {
            Some((tex, caption)) => {
                ui.label(caption);
                let avail = ui.available_size();
                ui.add(egui::Image::new((tex.id(), fit(tex.size_vec2(), avail.x.min(avail.y).max(100.0)))));
            }
            None => {
                ui.label("No image loaded.");
            }
        }
    }

    // === 信号专家界面 ===
    fn signal_panel(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.selectable_value(&mut self.signal_tab, SignalTab::Mat, "MAT signals");
            ui.selectable_value(&mut self.signal_tab, SignalTab::Csv, "CSV signals");
        });
        ui.separator();
        match self.signal_tab {
            SignalTab::Mat => self.mat_tab(ui),
            SignalTab::Csv => self.csv_tab(ui),
        }
        ui.separator();
        ui.horizontal(|ui| {
            let has_figure = self.figure.is_some();
            if ui.add_enabled(has_figure, egui::Button::new("💾 Export plot")).clicked() {
                if let Some(path) = rfd::FileDialog::new().add_filter("PNG", &["png"]).set_file_name("plot.png").save_file() {
                    self.send(AppCommand::Signal(SignalCommand::ExportPlot(path)));
                }
            }
        });
        if let Some(figure) = &self.figure {
            draw_figure(ui, figure);
        }
    }

    fn mat_tab(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if ui.button("📂 Load .mat").clicked() {
                if let Some(path) = pick_file("MATLAB", &["mat"]) {
                    self.send(AppCommand::Signal(SignalCommand::LoadMat(path)));
                }
            }
            column_combo(ui, "Signal", &mut self.selected_array, &self.mat_arrays);
            if ui.button("Plot").clicked() {
                let name = self.selected_array.clone();
                self.send(AppCommand::Signal(SignalCommand::PlotArray(name)));
            }
            if ui.button("Analyze").clicked() {
                let name = self.selected_array.clone();
                self.send(AppCommand::Signal(SignalCommand::AnalyzeArray(name)));
            }
        });
    }

    fn csv_tab(&mut self, ui: &mut egui::Ui) {
        let headers = self.table.as_ref().map(|t| t.headers.clone()).unwrap_or_default();
        ui.horizontal(|ui| {
            if ui.button("📂 Load CSV").clicked() {
                if let Some(path) = pick_file("CSV", &["csv"]) {
                    self.send(AppCommand::Signal(SignalCommand::LoadTable(path)));
                }
            }
            column_combo(ui, "X axis", &mut self.x_column, &headers);
            column_combo(ui, "Y axis", &mut self.y_column, &headers);
            if ui.button("Plot").clicked() {
                let cmd = SignalCommand::PlotColumns { x: self.x_column.clone(), y: self.y_column.clone() };
                self.send(AppCommand::Signal(cmd));
            }
            if ui.button("Analyze Y").clicked() {
                let name = self.y_column.clone();
                self.send(AppCommand::Signal(SignalCommand::AnalyzeColumn(name)));
            }
        });
        if let Some(table) = &self.table {
            ui.label(format!("{} rows", table.total_rows));
            egui::ScrollArea::both().id_source("csv_grid").max_height(220.0).show(ui, |ui| {
                egui::Grid::new("csv_table").striped(true).show(ui, |ui| {
                    for h in &table.headers { ui.label(RichText::new(h).strong()); }
                    ui.end_row();
                    for row in &table.rows {
                        for cell in row { ui.label(cell); }
                        ui.end_row();
                    }
                });
            });
        }
    }

    // === 历史记录窗口 ===
    fn history_window(&mut self, ctx: &egui::Context) {
        let mut open = self.show_history;
        egui::Window::new("History").open(&mut open).default_size([560.0, 360.0]).show(ctx, |ui| {
            if ui.button("🔄 Refresh").clicked() {
                self.send(AppCommand::RefreshHistory);
            }
            let Some(history) = &self.history else { return };
            egui::ScrollArea::vertical().show(ui, |ui| {
                if !history.studies.is_empty() {
                    ui.label(RichText::new("Studies").strong());
                    for s in &history.studies {
                        let e = &s.entry;
                        let derived = e.derived_path.as_deref().map(|p| format!(" -> {p}")).unwrap_or_default();
                        ui.monospace(format!("{} | {} | {}{derived}", s.created_at, e.patient_id.as_deref().unwrap_or("N/A"), e.source_path));
                    }
                }
                if !history.image_analyses.is_empty() {
                    ui.label(RichText::new("Image analyses").strong());
                    for r in &history.image_analyses {
                        ui.monospace(format!("{} | {} {} | {} | {}", r.created_at, r.operation_kind, r.parameters, r.result, r.file_path));
                    }
                }
                if !history.signal_analyses.is_empty() {
                    ui.label(RichText::new("Signal analyses").strong());
                    for r in &history.signal_analyses {
                        let result = r.result.lines().next().unwrap_or_default();
                        ui.monospace(format!("{} | {} {} {} | {} | {}", r.created_at, r.signal_kind.as_str(), r.operation_kind, r.parameters, result, r.file_path));
                    }
                }
                if history.is_empty() { ui.label("No records yet."); }
            });
        });
        self.show_history = open;
    }

    // 模态提示: 一次显示一条
    fn notice_window(&mut self, ctx: &egui::Context) {
        let Some(notice) = self.notices.first() else { return };
        let (title, color) = match notice.level {
            NoticeLevel::Info => ("Information", Color32::LIGHT_BLUE),
            NoticeLevel::Warning => ("Warning", Color32::YELLOW),
            NoticeLevel::Error => ("Error", Color32::LIGHT_RED),
        };
        let mut dismissed = false;
        egui::Window::new(title).collapsible(false).resizable(false).anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0]).show(ctx, |ui| {
            ui.label(RichText::new(&notice.text).color(color));
            if ui.button("OK").clicked() { dismissed = true; }
        });
        if dismissed { self.notices.remove(0); }
    }

    fn report_window(&mut self, ctx: &egui::Context) {
        let Some((title, text)) = &self.report else { return };
        let mut close = false;
        egui::Window::new(title.as_str()).collapsible(false).show(ctx, |ui| {
            ui.monospace(text);
            if ui.button("Close").clicked() { close = true; }
        });
        if close { self.report = None; }
    }
}

impl eframe::App for BiomedApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // 1. 消息处理
        self.poll_messages(ctx);
        ctx.request_repaint_after(Duration::from_millis(100));

        // 2. UI 绘制
        let Some((username, role)) = self.user.clone() else {
            egui::CentralPanel::default().show(ctx, |ui| self.login_panel(ui));
            self.notice_window(ctx);
            return;
        };

        egui::TopBottomPanel::top("top").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading(match role {
                    Role::ImageExpert => "Image analysis",
                    Role::SignalExpert => "Signal analysis",
                });
                ui.label(format!("{username} ({})", role.label()));
                if ui.button("📜 History").clicked() {
                    self.show_history = true;
                    self.send(AppCommand::RefreshHistory);
                }
            });
        });

        egui::TopBottomPanel::bottom("log").resizable(true).default_height(110.0).show(ctx, |ui| {
            egui::ScrollArea::vertical().stick_to_bottom(true).show(ui, |ui| {
                for m in &self.log_messages { ui.monospace(m); }
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| match role {
            Role::ImageExpert => self.image_panel(ui),
            Role::SignalExpert => self.signal_panel(ui),
        });

        self.history_window(ctx);
        self.report_window(ctx);
        self.notice_window(ctx);
    }
}

fn draw_figure(ui: &mut egui::Ui, figure: &PlotFigure) {
    ui.label(RichText::new(&figure.title).strong());
    Plot::new("figure")
        .legend(Legend::default())
        .x_axis_label(figure.x_label.clone())
        .y_axis_label(figure.y_label.clone())
        .show(ui, |plot_ui| {
            for series in &figure.series {
                let points = PlotPoints::new(series.points.clone());
                match series.kind {
                    SeriesKind::Line => plot_ui.line(Line::new(points).name(&series.label)),
                    SeriesKind::Scatter => plot_ui.points(Points::new(points).radius(3.0).name(&series.label)),
                }
            }
        });
}

fn column_combo(ui: &mut egui::Ui, label: &str, selected: &mut String, options: &[String]) {
    egui::ComboBox::from_label(label)
        .selected_text(selected.as_str())
        .show_ui(ui, |ui| {
            for opt in options {
                ui.selectable_value(selected, opt.clone(), opt);
            }
        });
}

fn pick_file(name: &str, extensions: &[&str]) -> Option<PathBuf> {
    rfd::FileDialog::new().add_filter(name, extensions).pick_file()
}

fn to_color_image(image: &DynamicImage) -> ColorImage {
    let rgba = image.to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    ColorImage::from_rgba_unmultiplied(size, rgba.as_raw())
}

// 等比缩放到 max 以内
fn fit(size: Vec2, max: f32) -> Vec2 {
    let scale = (max / size.x.max(size.y)).min(4.0);
    size * scale
}
