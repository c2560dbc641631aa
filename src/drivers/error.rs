use thiserror::Error;
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("window capacity must be greater than zero")]
    InvalidCapacity,
    #[error("smoothing window must be greater than zero")]
    InvalidSmoothingWindow,
    #[error("channel count mismatch: expected {expected}, got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },
    #[error("unknown channel `{name}` (available: {available})")]
    UnknownChannel { name: String, available: String },
    #[error("unknown dataset `{0}`")]
    UnknownDataset(String),
    #[error("parse error on line {line}: {reason}")]
    Parse { line: usize, reason: String },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
    #[error("failed to render plot: {0}")]
    Plot(String),
}
impl StreamError {
    pub fn parse(line: usize, reason: impl Into<String>) -> Self {
        StreamError::Parse {
            line,
            reason: reason.into(),
        }
    }
}
impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for StreamError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        StreamError::Plot(format!("{value:?}"))
    }
}
impl From<image::ImageError> for StreamError {
    fn from(value: image::ImageError) -> Self {
        StreamError::Plot(value.to_string())
    }
}
