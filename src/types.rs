// src/types.rs
use crate::drivers::WindowFrame;

// 独立的定时刷新; Noise 仅在配置后启用
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub enum TriggerKind {
    Stream,
    Attention,
    Meditation,
    Noise,
}

impl TriggerKind {
    pub const ALL: [TriggerKind; 4] = [
        TriggerKind::Stream,
        TriggerKind::Attention,
        TriggerKind::Meditation,
        TriggerKind::Noise,
    ];

    pub fn label(self) -> &'static str {
        match self {
            TriggerKind::Stream => "stream",
            TriggerKind::Attention => "attention",
            TriggerKind::Meditation => "meditation",
            TriggerKind::Noise => "noise",
        }
    }
}

// GUI 发给后台的命令
#[derive(Clone, Debug, PartialEq)]
pub enum DashCommand {
    Refresh(TriggerKind),
    Shutdown,
}

// 后台发给 GUI 的消息
#[derive(Clone, Debug, PartialEq)]
pub enum DashMessage {
    Log(String),
    Status(bool),          // 引擎运行状态
    Stream(WindowFrame),   // 图表数据
    Attention(f64),        // 平滑后的专注度
    Meditation(f64),       // 平滑后的放松度
    Noise(f64),            // 最新的信号质量读数
}
