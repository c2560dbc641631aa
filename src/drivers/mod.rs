// src/drivers/mod.rs
// 数据通路: 数据源 -> 解析 -> 窗口 -> 平滑
pub mod error;
pub mod plot;
pub mod sample;
pub mod smoother;
pub mod smoothing;
pub mod source;
pub mod table;
pub mod thinkgear;
pub mod window;
// 公开导出常用类型
pub use error::StreamError;
pub use plot::{render_trend_png, render_window_png, PlotStyle, ScalarTrend};
pub use sample::{ChannelSelector, Sample};
pub use smoother::StreamingSmoother;
pub use smoothing::{gauge_percent, smooth_tail};
pub use source::{Batch, CsvDirectorySource, DataSource, SimulatedSource};
#[cfg(test)]
pub use source::ManualSource;
pub use thinkgear::ThinkGearSource;
pub use window::{SampleWindow, WindowFrame};
