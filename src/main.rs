// src/main.rs
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]
mod config;
mod engine;
mod gui;
mod imaging;
mod session;
mod signals;
mod store;
mod types;
use anyhow::{anyhow, Context};
use eframe::egui;
use crate::config::AppConfig;
use crate::engine::Engine;
use crate::store::{CredentialStore, Database};

// 入口函数
fn main() -> anyhow::Result<()> {
    env_logger::init();
    let config = AppConfig::load()?;

    // 数据库打不开则直接退出
    let db = Database::open(&config.database_path)
        .with_context(|| format!("cannot open database {}", config.database_path.display()))?;
    let created = CredentialStore::new(db.clone())
        .ensure_seed_accounts(&config.seed_accounts, &config.seed_password)?;
    if created > 0 {
        log::info!("🌱 created {created} default account(s)");
    }

    let viewport = egui::ViewportBuilder::default()
        .with_inner_size(config.window_size)
        .with_min_inner_size([900.0, 600.0])
        .with_title("Biomedical Analyzer");
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };
    let engine = Engine::new(db);
    eframe::run_native(
        "BiomedAnalyzer",
        options,
        Box::new(|_cc| Box::new(gui::BiomedApp::new(engine))),
    )
    .map_err(|e| anyhow!("window system error: {e}"))
}
