// src/main.rs
mod config;
mod drivers;
mod engine;
mod gui;
mod recorder;
mod scheduler;
mod types;
mod visualizer;
use anyhow::{anyhow, Context};
use eframe::egui;
// 入口函数
fn main() -> anyhow::Result<()> {
    env_logger::init();
    // 配置: 第一个命令行参数, 或 BRAINWAVE_CONFIG, 或默认值
    let config = config::DashboardConfig::resolve(std::env::args().nth(1))?;
    let source = config
        .build_source()
        .context("failed to open data source")?;
    log::info!("source: {:?}", config.source);
    let viewport = egui::ViewportBuilder::default()
        .with_inner_size([1280.0, 820.0])
        .with_min_inner_size([960.0, 640.0])
        .with_title("Brainwave Dashboard");
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };
    eframe::run_native(
        "Brainwave Dashboard",
        options,
        Box::new(move |_cc| Box::new(gui::DashboardApp::new(config, source))),
    )
    .map_err(|err| anyhow!("failed to start the window: {err}"))
}
