// src/engine.rs
use std::sync::mpsc::{Receiver, Sender};
use std::thread::{self, JoinHandle};
use log::{error, info, warn};
use thiserror::Error;
use crate::imaging::ImagingError;
use crate::session::{Session, SessionError};
use crate::signals::SignalError;
use crate::store::{AnalysisLog, Audited, CredentialStore, Database};
use crate::types::*;

#[derive(Debug, Error)]
enum EngineError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Imaging(#[from] ImagingError),
    #[error(transparent)]
    Signal(#[from] SignalError),
}

impl EngineError {
    // 输入错误 -> Error, 重复注册/存储失败/登录失败 -> Warning
    fn notice(&self) -> Notice {
        match self {
            EngineError::Session(SessionError::InvalidCredentials) => Notice::warning("Invalid credentials"),
            EngineError::Session(SessionError::Store(err)) if err.is_duplicate() => Notice::warning(err.to_string()),
            EngineError::Session(SessionError::Store(err)) => Notice::warning(format!("Database error: {err}")),
            other => Notice::error(other.to_string()),
        }
    }
}

/// Owns the session and turns each [`AppCommand`] into the messages the GUI
/// should render. Runs without a display.
pub struct Engine {
    session: Session,
}

impl Engine {
    pub fn new(db: Database) -> Self {
        Self {
            session: Session::new(CredentialStore::new(db.clone()), AnalysisLog::new(db)),
        }
    }

    pub fn handle(&mut self, cmd: AppCommand) -> Vec<AppMessage> {
        let mut out = Vec::new();
        let outcome = match cmd {
            AppCommand::Login { username, password } => self.login(&username, &password, &mut out),
            AppCommand::Register { username, password, role } => self.register(&username, &password, role, &mut out),
            AppCommand::Image(cmd) => self.image(cmd, &mut out),
            AppCommand::Signal(cmd) => self.signal(cmd, &mut out),
            AppCommand::RefreshHistory => self.history(&mut out),
        };
        if let Err(err) = outcome {
            let notice = err.notice();
            match notice.level {
                NoticeLevel::Error => error!("{err}"),
                _ => warn!("{err}"),
            }
            out.push(AppMessage::Log(format!("❌ {}", notice.text)));
            out.push(AppMessage::Notice(notice));
        }
        out
    }

    fn login(&mut self, username: &str, password: &str, out: &mut Vec<AppMessage>) -> Result<(), EngineError> {
        let user = self.session.login(username, password)?;
        out.push(AppMessage::LoggedIn { username: user.username.clone(), role: user.role });
        out.push(AppMessage::Log(format!("✅ Logged in as {} ({})", user.username, user.role.label())));
        self.history(out)
    }

    fn register(&mut self, username: &str, password: &str, role: Role, out: &mut Vec<AppMessage>) -> Result<(), EngineError> {
        self.session.register(username, password, role)?;
        out.push(AppMessage::Registered { username: username.to_owned(), role });
        out.push(AppMessage::Notice(Notice::info(format!("User `{username}` registered"))));
        out.push(AppMessage::Log(format!("👤 Registered {username} ({})", role.label())));
        Ok(())
    }

    fn history(&mut self, out: &mut Vec<AppMessage>) -> Result<(), EngineError> {
        out.push(AppMessage::History(self.session.history()?));
        Ok(())
    }

    fn image(&mut self, cmd: ImageCommand, out: &mut Vec<AppMessage>) -> Result<(), EngineError> {
        let wf = self.session.image_workflow()?;
        match cmd {
            ImageCommand::LoadDicomSeries(dir) => {
                let loaded = audited(out, wf.load_dicom_series(&dir)?);
                out.push(AppMessage::Log(format!("📂 DICOM series {} {:?}", dir.display(), loaded.views.shape)));
                out.push(AppMessage::PatientInfo(loaded.patient_line));
                out.push(AppMessage::Volume(loaded.views));
            }
            ImageCommand::ExportNifti(path) => {
                let path = audited(out, wf.export_nifti(&path)?);
                out.push(AppMessage::Notice(Notice::info(format!("Volume exported to {}", path.display()))));
                out.push(AppMessage::Log(format!("💾 NIfTI written: {}", path.display())));
            }
            ImageCommand::LoadNifti(path) => {
                let views = audited(out, wf.load_nifti(&path)?);
                out.push(AppMessage::Log(format!("📂 NIfTI {} {:?}", path.display(), views.shape)));
                out.push(AppMessage::Volume(views));
            }
            // 切片浏览不写审计记录
            ImageCommand::SetSlice { axis, index } => {
                out.push(AppMessage::Volume(wf.set_slice(axis, index)?));
            }
            ImageCommand::LoadImage(path) => {
                let image = audited(out, wf.load_image(&path)?);
                let caption = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                out.push(AppMessage::Log(format!("🖼 Loaded {caption} ({}x{})", image.width(), image.height())));
                out.push(AppMessage::WorkingImage { image, caption });
            }
            ImageCommand::ApplyMorphology { op, kernel } => {
                let image = audited(out, wf.apply_morphology(op, kernel)?);
                let caption = format!("{op} {kernel}");
                out.push(AppMessage::Log(format!("🔧 Applied {caption}")));
                out.push(AppMessage::WorkingImage { image, caption });
            }
            ImageCommand::CountCells => {
                let counted = audited(out, wf.count_cells()?);
                out.push(AppMessage::Log(format!("🔬 Cells detected: {}", counted.count)));
                out.push(AppMessage::CellCount { count: counted.count, labels: counted.labels });
            }
            ImageCommand::SaveImage(path) => {
                let path = audited(out, wf.save_image(&path)?);
                out.push(AppMessage::Notice(Notice::info(format!("Image saved to {}", path.display()))));
            }
        }
        Ok(())
    }

    fn signal(&mut self, cmd: SignalCommand, out: &mut Vec<AppMessage>) -> Result<(), EngineError> {
        let wf = self.session.signal_workflow()?;
        match cmd {
            SignalCommand::LoadMat(path) => {
                let names = audited(out, wf.load_mat(&path)?);
                out.push(AppMessage::Log(format!("📂 MAT {} ({} arrays)", path.display(), names.len())));
                out.push(AppMessage::MatArrays(names));
            }
            SignalCommand::PlotArray(name) => {
                let figure = audited(out, wf.plot_array(&name)?);
                out.push(AppMessage::Figure(figure));
            }
            SignalCommand::AnalyzeArray(name) => {
                let text = audited(out, wf.analyze_array(&name)?);
                out.push(AppMessage::Report { title: format!("Analysis of {name}"), text });
            }
            SignalCommand::LoadTable(path) => {
                let preview = audited(out, wf.load_table(&path)?);
                out.push(AppMessage::Log(format!("📂 CSV {} ({} rows)", path.display(), preview.total_rows)));
                out.push(AppMessage::Table(preview));
            }
            SignalCommand::PlotColumns { x, y } => {
                let figure = audited(out, wf.plot_columns(&x, &y)?);
                out.push(AppMessage::Figure(figure));
            }
            SignalCommand::AnalyzeColumn(name) => {
                let text = audited(out, wf.analyze_column(&name)?);
                out.push(AppMessage::Report { title: format!("Analysis of {name}"), text });
            }
            SignalCommand::ExportPlot(path) => {
                let path = audited(out, wf.export_plot(&path)?);
                out.push(AppMessage::Notice(Notice::info(format!("Plot exported to {}", path.display()))));
            }
        }
        Ok(())
    }
}

// 操作已生效; 审计写入失败只提示警告
fn audited<T>(out: &mut Vec<AppMessage>, result: Audited<T>) -> T {
    if let Err(err) = result.audit {
        warn!("audit record not written: {err}");
        out.push(AppMessage::Notice(Notice::warning(format!("The analysis was not recorded: {err}"))));
    }
    result.value
}

pub fn spawn_thread(mut engine: Engine, tx: Sender<AppMessage>, rx_cmd: Receiver<AppCommand>) -> JoinHandle<()> {
    thread::spawn(move || {
        tx.send(AppMessage::Log("⚙️ Analysis engine ready.".to_owned())).ok();
        // GUI 关闭后通道断开, 线程随之退出
        while let Ok(cmd) = rx_cmd.recv() {
            for msg in engine.handle(cmd) {
                if tx.send(msg).is_err() {
                    return;
                }
            }
        }
        info!("engine thread stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::mpsc::channel;
    use crate::imaging::{KernelSize, MorphOp};

    fn engine_with(users: &[(&str, Role)]) -> (Engine, Database) {
        let db = Database::open_in_memory().unwrap();
        let creds = CredentialStore::new(db.clone());
        for (name, role) in users {
            creds.register(name, "pw", *role).unwrap();
        }
        (Engine::new(db.clone()), db)
    }

    fn login(engine: &mut Engine, name: &str) -> Vec<AppMessage> {
        engine.handle(AppCommand::Login { username: name.into(), password: "pw".into() })
    }

    fn notices(msgs: &[AppMessage]) -> Vec<&Notice> {
        msgs.iter()
            .filter_map(|m| match m {
                AppMessage::Notice(n) => Some(n),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn login_reports_role_and_history() {
        let (mut engine, _) = engine_with(&[("img", Role::ImageExpert)]);
        let msgs = login(&mut engine, "img");
        assert!(msgs.iter().any(|m| matches!(m, AppMessage::LoggedIn { role: Role::ImageExpert, .. })));
        assert!(msgs.iter().any(|m| matches!(m, AppMessage::History(h) if h.is_empty())));
        assert!(notices(&msgs).is_empty());
    }

    #[test]
    fn bad_credentials_give_one_warning() {
        let (mut engine, _) = engine_with(&[("img", Role::ImageExpert)]);
        for (user, pw) in [("img", "wrong"), ("nobody", "pw")] {
            let msgs = engine.handle(AppCommand::Login { username: user.into(), password: pw.into() });
            assert_eq!(notices(&msgs), [&Notice::warning("Invalid credentials")]);
        }
    }

    #[test]
    fn duplicate_registration_is_a_warning() {
        let (mut engine, _) = engine_with(&[("img", Role::ImageExpert)]);
        let msgs = engine.handle(AppCommand::Register {
            username: "img".into(),
            password: "x".into(),
            role: Role::SignalExpert,
        });
        assert_eq!(notices(&msgs)[0].level, NoticeLevel::Warning);
        assert!(!msgs.iter().any(|m| matches!(m, AppMessage::Registered { .. })));
    }

    #[test]
    fn commands_outside_the_role_are_input_errors() {
        let (mut engine, _) = engine_with(&[("sig", Role::SignalExpert)]);
        let before = engine.handle(AppCommand::Signal(SignalCommand::AnalyzeColumn("v".into())));
        assert_eq!(notices(&before)[0].level, NoticeLevel::Error);
        login(&mut engine, "sig");
        let msgs = engine.handle(AppCommand::Image(ImageCommand::CountCells));
        let notice = notices(&msgs)[0];
        assert_eq!(notice.level, NoticeLevel::Error);
        assert!(notice.text.contains("not available"));
    }

    #[test]
    fn signal_flow_produces_table_and_report() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("rec.csv");
        fs::write(&csv, "t,v\n0,1\n1,2\n2,3\n3,4\n").unwrap();
        let (mut engine, _) = engine_with(&[("sig", Role::SignalExpert)]);
        login(&mut engine, "sig");
        let msgs = engine.handle(AppCommand::Signal(SignalCommand::LoadTable(csv)));
        assert!(msgs.iter().any(|m| matches!(m, AppMessage::Table(t) if t.total_rows == 4)));
        let msgs = engine.handle(AppCommand::Signal(SignalCommand::AnalyzeColumn("v".into())));
        assert!(msgs.iter().any(|m| matches!(m, AppMessage::Report { text, .. } if text.ends_with("Count: 4"))));
        let msgs = engine.handle(AppCommand::RefreshHistory);
        assert!(msgs.iter().any(|m| matches!(m, AppMessage::History(h) if h.signal_analyses.len() == 2)));
    }

    #[test]
    fn failed_audit_write_is_a_warning_after_the_operation() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("cells.png");
        image::GrayImage::from_pixel(12, 12, image::Luma([200])).save(&png).unwrap();
        let (mut engine, db) = engine_with(&[("img", Role::ImageExpert)]);
        login(&mut engine, "img");
        db.lock().unwrap().execute_batch("DROP TABLE image_analysis").unwrap();
        let msgs = engine.handle(AppCommand::Image(ImageCommand::LoadImage(png)));
        assert!(msgs.iter().any(|m| matches!(m, AppMessage::WorkingImage { .. })));
        assert_eq!(notices(&msgs)[0].level, NoticeLevel::Warning);
        let msgs = engine.handle(AppCommand::Image(ImageCommand::ApplyMorphology {
            op: MorphOp::Closing,
            kernel: KernelSize::K3,
        }));
        assert!(msgs.iter().any(|m| matches!(m, AppMessage::WorkingImage { caption, .. } if caption == "closing 3x3")));
    }

    #[test]
    fn thread_answers_over_channels() {
        let (engine, _) = engine_with(&[("img", Role::ImageExpert)]);
        let (tx, rx) = channel();
        let (tx_cmd, rx_cmd) = channel();
        let handle = spawn_thread(engine, tx, rx_cmd);
        tx_cmd.send(AppCommand::Login { username: "img".into(), password: "pw".into() }).unwrap();
        drop(tx_cmd);
        handle.join().unwrap();
        let msgs: Vec<_> = rx.try_iter().collect();
        assert!(matches!(msgs[0], AppMessage::Log(_)));
        assert!(msgs.iter().any(|m| matches!(m, AppMessage::LoggedIn { .. })));
    }
}
