use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("frame belongs to renderer generation {requested}, current generation is {current}")]
    StaleFrame { requested: u64, current: u64 },
    #[error("renderer has been torn down")]
    TornDown,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("rendering surface unavailable: {0}")]
    SurfaceUnavailable(String),
    #[error("failed to render scene: {0}")]
    Plot(String),
}

impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for MonitorError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        MonitorError::Plot(format!("{value:?}"))
    }
}

impl From<image::ImageError> for MonitorError {
    fn from(value: image::ImageError) -> Self {
        MonitorError::Plot(value.to_string())
    }
}
