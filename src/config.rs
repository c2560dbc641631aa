// src/config.rs
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::drivers::thinkgear::DEFAULT_BAUD_RATE;
use crate::drivers::{CsvDirectorySource, DataSource, SimulatedSource, StreamError, ThinkGearSource};
use crate::types::TriggerKind;

pub const CONFIG_ENV: &str = "BRAINWAVE_CONFIG";

// 数据源
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    Simulated {
        #[serde(default)]
        seed: Option<u64>,
        #[serde(default = "default_history")]
        history: u64,
    },
    CsvDirectory {
        path: PathBuf,
    },
    Thinkgear {
        port: String,
        #[serde(default = "default_baud_rate")]
        baud_rate: u32,
        #[serde(default = "default_log_rows")]
        history: usize,
    },
}

fn default_history() -> u64 { 30 }
fn default_baud_rate() -> u32 { DEFAULT_BAUD_RATE }
fn default_log_rows() -> usize { 200 }

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Simulated { seed: None, history: default_history() }
    }
}

// 多通道图表
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct StreamConfig {
    pub dataset: String,
    pub capacity: usize,
    /// 图表上显示的最新样本数
    pub visible: usize,
    pub refresh_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self { dataset: "brainwaves".to_owned(), capacity: 100, visible: 30, refresh_ms: 1000 }
    }
}

// 专注度 / 放松度
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MetricConfig {
    pub dataset: String,
    pub channels: Vec<String>,
    #[serde(default = "default_smoothing_window")]
    pub smoothing_window: usize,
    #[serde(default = "default_metric_capacity")]
    pub capacity: usize,
    #[serde(default = "default_refresh_ms")]
    pub refresh_ms: u64,
}

fn default_smoothing_window() -> usize { 5 }
fn default_metric_capacity() -> usize { 30 }
fn default_refresh_ms() -> u64 { 1000 }

impl MetricConfig {
    pub fn single(dataset: &str) -> Self {
        Self {
            dataset: dataset.to_owned(),
            channels: vec![dataset.to_owned()],
            smoothing_window: default_smoothing_window(),
            capacity: default_metric_capacity(),
            refresh_ms: default_refresh_ms(),
        }
    }
}

// 信号质量 (poor signal), 0 为最好
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct NoiseConfig {
    pub dataset: String,
    pub capacity: usize,
    pub refresh_ms: u64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self { dataset: "noise".to_owned(), capacity: default_metric_capacity(), refresh_ms: default_refresh_ms() }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DashboardConfig {
    pub source: SourceConfig,
    pub stream: StreamConfig,
    pub attention: MetricConfig,
    pub meditation: MetricConfig,
    pub noise: Option<NoiseConfig>,
    pub fetch_timeout_ms: u64,
    /// 设置后把新样本追加写入 `<dir>/<dataset>.csv`
    pub record_dir: Option<PathBuf>,
    pub export_dir: PathBuf,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            stream: StreamConfig::default(),
            attention: MetricConfig::single("attention"),
            meditation: MetricConfig::single("meditation"),
            noise: None,
            fetch_timeout_ms: 5000,
            record_dir: None,
            export_dir: PathBuf::from("."),
        }
    }
}

impl DashboardConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("invalid config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// 优先命令行参数, 其次环境变量, 否则使用默认值
    pub fn resolve(arg: Option<String>) -> Result<Self> {
        let path = arg.or_else(|| std::env::var(CONFIG_ENV).ok());
        match path {
            Some(path) => Self::load(Path::new(&path)),
            None => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.fetch_timeout_ms > 0, "fetch_timeout_ms must be greater than zero");
        ensure!(!self.stream.dataset.is_empty(), "stream.dataset must not be empty");
        ensure!(self.stream.capacity > 0, "stream.capacity must be greater than zero");
        ensure!(self.stream.refresh_ms > 0, "stream.refresh_ms must be greater than zero");
        for (name, metric) in [("attention", &self.attention), ("meditation", &self.meditation)] {
            ensure!(!metric.dataset.is_empty(), "{name}.dataset must not be empty");
            ensure!(metric.capacity > 0, "{name}.capacity must be greater than zero");
            ensure!(metric.smoothing_window > 0, "{name}.smoothing_window must be greater than zero");
            ensure!(metric.refresh_ms > 0, "{name}.refresh_ms must be greater than zero");
        }
        if let Some(noise) = &self.noise {
            ensure!(!noise.dataset.is_empty(), "noise.dataset must not be empty");
            ensure!(noise.capacity > 0, "noise.capacity must be greater than zero");
            ensure!(noise.refresh_ms > 0, "noise.refresh_ms must be greater than zero");
        }
        Ok(())
    }

    /// Triggers the engine schedules; `noise` only when configured.
    pub fn triggers(&self) -> Vec<TriggerKind> {
        TriggerKind::ALL
            .into_iter()
            .filter(|&kind| kind != TriggerKind::Noise || self.noise.is_some())
            .collect()
    }

    pub fn period(&self, kind: TriggerKind) -> Duration {
        let ms = match kind {
            TriggerKind::Stream => self.stream.refresh_ms,
            TriggerKind::Attention => self.attention.refresh_ms,
            TriggerKind::Meditation => self.meditation.refresh_ms,
            TriggerKind::Noise => self.noise.as_ref().map_or(default_refresh_ms(), |n| n.refresh_ms),
        };
        Duration::from_millis(ms)
    }

    pub fn dataset(&self, kind: TriggerKind) -> &str {
        match kind {
            TriggerKind::Stream => &self.stream.dataset,
            TriggerKind::Attention => &self.attention.dataset,
            TriggerKind::Meditation => &self.meditation.dataset,
            TriggerKind::Noise => self.noise.as_ref().map_or("noise", |n| n.dataset.as_str()),
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn build_source(&self) -> Result<Arc<dyn DataSource>, StreamError> {
        let source: Arc<dyn DataSource> = match &self.source {
            SourceConfig::Simulated { seed, history } => {
                Arc::new(SimulatedSource::new(*seed).with_history(*history))
            }
            SourceConfig::CsvDirectory { path } => Arc::new(CsvDirectorySource::new(path)),
            SourceConfig::Thinkgear { port, baud_rate, history } => {
                Arc::new(ThinkGearSource::open(port, *baud_rate, *history)?)
            }
        };
        Ok(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = DashboardConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.period(TriggerKind::Stream), Duration::from_millis(1000));
        assert_eq!(config.dataset(TriggerKind::Meditation), "meditation");
    }

    #[test]
    fn classic_five_band_layout_parses() {
        let json = r#"{
            "source": { "kind": "csv_directory", "path": "data" },
            "stream": { "dataset": "bands", "capacity": 100 },
            "attention": { "dataset": "bands", "channels": ["beta", "gamma"], "smoothing_window": 10, "refresh_ms": 10000 },
            "meditation": { "dataset": "bands", "channels": ["alpha", "theta"], "smoothing_window": 10, "refresh_ms": 10000 }
        }"#;
        let config: DashboardConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.source, SourceConfig::CsvDirectory { path: PathBuf::from("data") });
        assert_eq!(config.stream.visible, 30);
        assert_eq!(config.attention.capacity, 30);
        assert_eq!(config.period(TriggerKind::Attention), Duration::from_secs(10));
    }

    #[test]
    fn thinkgear_source_defaults_baud_rate() {
        let json = r#"{ "source": { "kind": "thinkgear", "port": "/dev/ttyACM1" } }"#;
        let config: DashboardConfig = serde_json::from_str(json).unwrap();
        assert_eq!(
            config.source,
            SourceConfig::Thinkgear { port: "/dev/ttyACM1".into(), baud_rate: 57_600, history: 200 }
        );
    }

    #[test]
    fn noise_trigger_is_opt_in() {
        let config = DashboardConfig::default();
        assert!(!config.triggers().contains(&TriggerKind::Noise));
        let json = r#"{ "source": { "kind": "thinkgear", "port": "COM3" }, "noise": { "refresh_ms": 500 } }"#;
        let config: DashboardConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.triggers(), TriggerKind::ALL.to_vec());
        assert_eq!(config.dataset(TriggerKind::Noise), "noise");
        assert_eq!(config.period(TriggerKind::Noise), Duration::from_millis(500));
    }

    #[test]
    fn zero_values_are_rejected() {
        let mut config = DashboardConfig::default();
        config.attention.smoothing_window = 0;
        assert!(config.validate().is_err());
        let mut config = DashboardConfig::default();
        config.stream.capacity = 0;
        assert!(config.validate().is_err());
        let mut config = DashboardConfig::default();
        config.noise = Some(NoiseConfig { capacity: 0, ..NoiseConfig::default() });
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = DashboardConfig::load(Path::new("/nonexistent/brainwave.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read config"));
    }
}
