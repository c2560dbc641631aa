// src/gui.rs
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use eframe::egui;
use egui::{Color32, RichText, Stroke};
use egui_plot::{Legend, Line, Plot, PlotPoints};

use crate::config::DashboardConfig;
use crate::drivers::{render_trend_png, render_window_png, DataSource, PlotStyle, ScalarTrend, WindowFrame};
use crate::engine;
use crate::types::*;
use crate::visualizer::{band_color, draw_gauge};

const TREND_POINTS: usize = 600;
const LOG_LINES: usize = 8;

pub struct DashboardApp {
    // 系统状态
    is_running: bool,
    started: Instant,

    // 数据
    frame: WindowFrame,
    attention: f64,
    meditation: f64,
    noise: Option<f64>,
    attention_trend: VecDeque<(f64, f64)>,
    meditation_trend: VecDeque<(f64, f64)>,
    noise_trend: VecDeque<(f64, f64)>,
    // 通道名 -> 是否显示
    visible_bands: Vec<(String, bool)>,

    export_dir: PathBuf,
    log_messages: Vec<String>,

    // 通讯管道
    rx: Receiver<DashMessage>,
    tx_cmd: Sender<DashCommand>,
    engine: Option<JoinHandle<()>>,
}

impl DashboardApp {
    pub fn new(config: DashboardConfig, source: Arc<dyn DataSource>) -> Self {
        let (tx, rx) = channel();
        let (tx_cmd, rx_cmd) = channel();
        let export_dir = config.export_dir.clone();

        // 启动后台引擎
        let handle = engine::spawn_thread(config, source, tx, rx_cmd);

        let mut app = Self::with_channels(rx, tx_cmd, export_dir);
        app.engine = Some(handle);
        app
    }

    fn with_channels(rx: Receiver<DashMessage>, tx_cmd: Sender<DashCommand>, export_dir: PathBuf) -> Self {
        Self {
            is_running: false,
            started: Instant::now(),
            frame: WindowFrame::default(),
            attention: 0.0,
            meditation: 0.0,
            noise: None,
            attention_trend: VecDeque::new(),
            meditation_trend: VecDeque::new(),
            noise_trend: VecDeque::new(),
            visible_bands: Vec::new(),
            export_dir,
            log_messages: vec!["Brainwave Dashboard Ready.".to_owned()],
            rx,
            tx_cmd,
            engine: None,
        }
    }

    fn log(&mut self, msg: &str) {
        self.log_messages.push(format!("> {}", msg));
        if self.log_messages.len() > LOG_LINES {
            self.log_messages.remove(0);
        }
    }

    fn push_trend(trend: &mut VecDeque<(f64, f64)>, t: f64, value: f64) {
        if trend.len() == TREND_POINTS {
            trend.pop_front();
        }
        trend.push_back((t, value));
    }

    fn drain_messages(&mut self) {
        while let Ok(msg) = self.rx.try_recv() {
            let t = self.started.elapsed().as_secs_f64();
            match msg {
                DashMessage::Log(s) => self.log(&s),
                DashMessage::Status(running) => self.is_running = running,
                DashMessage::Stream(frame) => {
                    // 新通道默认显示, 已有通道保留开关状态
                    for label in &frame.channel_labels {
                        if !self.visible_bands.iter().any(|(l, _)| l == label) {
                            self.visible_bands.push((label.clone(), true));
                        }
                    }
                    self.frame = frame;
                }
                DashMessage::Attention(v) => {
                    self.attention = v;
                    Self::push_trend(&mut self.attention_trend, t, v);
                }
                DashMessage::Meditation(v) => {
                    self.meditation = v;
                    Self::push_trend(&mut self.meditation_trend, t, v);
                }
                DashMessage::Noise(v) => {
                    self.noise = Some(v);
                    Self::push_trend(&mut self.noise_trend, t, v);
                }
            }
        }
    }

    fn is_band_visible(&self, label: &str) -> bool {
        self.visible_bands
            .iter()
            .find(|(l, _)| l == label)
            .map_or(true, |(_, on)| *on)
    }

    fn toggle_band(&mut self, label: &str) {
        if let Some((_, on)) = self.visible_bands.iter_mut().find(|(l, _)| l == label) {
            *on = !*on;
        }
    }

    fn trends(&self) -> Vec<ScalarTrend> {
        vec![
            ScalarTrend { label: "Attention".to_owned(), points: self.attention_trend.iter().copied().collect() },
            ScalarTrend { label: "Meditation".to_owned(), points: self.meditation_trend.iter().copied().collect() },
        ]
    }

    fn export_png(&mut self) {
        let mut exports = vec![
            ("brainwaves.png", render_window_png(&self.frame, PlotStyle::default())),
            (
                "attention_meditation.png",
                render_trend_png("Attention vs Meditation", &self.trends(), PlotStyle::default()),
            ),
        ];
        // 只有启用信号质量时才导出
        if !self.noise_trend.is_empty() {
            let noise = ScalarTrend { label: "Noise".to_owned(), points: self.noise_trend.iter().copied().collect() };
            exports.push(("noise.png", render_trend_png("Poor Signal Quality", &[noise], PlotStyle::default())));
        }
        for (name, rendered) in exports {
            let path = self.export_dir.join(name);
            let result = rendered.map_err(anyhow::Error::from).and_then(|png| {
                std::fs::write(&path, png)?;
                Ok(())
            });
            match result {
                Ok(()) => self.log(&format!("🖼 Saved {}", path.display())),
                Err(err) => self.log(&format!("❌ Export {} failed: {}", name, err)),
            }
        }
    }

    fn draw_bands(&mut self, ui: &mut egui::Ui) {
        ui.vertical_centered(|ui| {
            ui.heading(RichText::new("Brainwave Frequencies").color(Color32::from_rgb(216, 180, 254)));
        });

        let mut clicked = None;
        ui.horizontal_wrapped(|ui| {
            for (idx, (label, on)) in self.visible_bands.iter().enumerate() {
                let color = band_color(label, idx);
                let (fill, border, text) = if *on {
                    (color, color, Color32::BLACK)
                } else {
                    (Color32::from_rgb(55, 65, 81), Color32::from_rgb(75, 85, 99), Color32::from_rgb(156, 163, 175))
                };
                let button = egui::Button::new(RichText::new(label.as_str()).color(text))
                    .fill(fill)
                    .stroke(Stroke::new(2.0, border));
                if ui.add(button).clicked() {
                    clicked = Some(label.clone());
                }
            }
        });
        if let Some(label) = clicked {
            self.toggle_band(&label);
        }

        let frame = &self.frame;
        let lines: Vec<Line> = frame
            .channel_labels
            .iter()
            .enumerate()
            .filter(|(_, label)| self.is_band_visible(label))
            .map(|(idx, label)| {
                let points: Vec<[f64; 2]> = frame
                    .timestamps
                    .iter()
                    .zip(&frame.values[idx])
                    .map(|(&t, &v)| [t, v])
                    .collect();
                Line::new(PlotPoints::from(points)).color(band_color(label, idx)).name(label)
            })
            .collect();
        Plot::new("bands_plot")
            .height(320.0)
            .legend(Legend::default())
            .show(ui, |plot_ui| {
                for line in lines {
                    plot_ui.line(line);
                }
            });
    }
}

impl eframe::App for DashboardApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_messages();

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading(RichText::new("Brainwave Dashboard").color(Color32::from_rgb(244, 114, 182)));
                ui.separator();
                let (status, color) = if self.is_running {
                    ("● Streaming", Color32::GREEN)
                } else {
                    ("● Stopped", Color32::GRAY)
                };
                ui.colored_label(color, status);
                ui.separator();
                if ui.button("🔄 Refresh").clicked() {
                    for kind in TriggerKind::ALL {
                        self.tx_cmd.send(DashCommand::Refresh(kind)).ok();
                    }
                }
                if ui.button("🖼 Export PNG").clicked() {
                    self.export_png();
                }
            });
        });

        egui::TopBottomPanel::bottom("log").show(ctx, |ui| {
            for line in &self.log_messages {
                ui.monospace(line);
            }
        });

        egui::SidePanel::right("gauges").min_width(240.0).show(ctx, |ui| {
            ui.add_space(12.0);
            draw_gauge(ui, "Attention", self.attention);
            ui.add_space(24.0);
            draw_gauge(ui, "Meditation", self.meditation);
            if let Some(noise) = self.noise {
                ui.add_space(24.0);
                let color = if noise > 0.0 { Color32::from_rgb(248, 113, 113) } else { Color32::GREEN };
                ui.colored_label(color, format!("Signal noise: {noise:.0}"));
            }
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.draw_bands(ui);
        });

        ctx.request_repaint_after(Duration::from_millis(100));
    }
}

impl Drop for DashboardApp {
    fn drop(&mut self) {
        self.tx_cmd.send(DashCommand::Shutdown).ok();
        if let Some(handle) = self.engine.take() {
            handle.join().ok();
        }
    }
}
