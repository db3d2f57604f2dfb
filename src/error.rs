use std::io;

use thiserror::Error;

use crate::input::DeviceKind;

/// Validation failures when creating or changing shapes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    #[error("shape id must be provided")]
    MissingId,
    #[error("duplicate shape id '{0}'")]
    DuplicateId(String),
    #[error("unknown shape type: {0}")]
    UnknownShapeKind(String),
    #[error("no shape with id '{0}'")]
    UnknownShape(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimerError {
    #[error("invalid timer duration: {0}")]
    InvalidTimerValue(String),
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("input device '{0}' is not available")]
    Unavailable(DeviceKind),
    #[error("unknown input device: {0}")]
    UnknownDevice(String),
    #[error("failed to start input thread: {0}")]
    Spawn(#[source] io::Error),
}

/// Errors raised while reading a layout file. None of them touch the
/// session that was loaded before.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read layout: {0}")]
    Io(#[from] io::Error),
    #[error("malformed layout: {0}")]
    Json(#[from] serde_json::Error),
    #[error("layout does not include the 'shapes' key")]
    MissingShapes,
    #[error("invalid shape in layout: {0}")]
    InvalidShape(#[from] ShapeError),
}

/// Everything a command sent to the state machine can fail with.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error(transparent)]
    Timer(#[from] TimerError),
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("export failed: {0}")]
    Export(#[source] io::Error),
}
