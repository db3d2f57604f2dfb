use std::{fs, path::Path};

use include_dir::{include_dir, Dir};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, warn};

use crate::{error::ConfigError, shape::ShapeRecord};

pub const DEFAULT_TIMER_SECS: u32 = 10;

static LAYOUT_DIR: Dir = include_dir!("layouts");

/// A test layout: how long a run lasts and which shapes take part, in
/// rotation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    pub timer_duration: u32,
    pub shapes: Vec<ShapeRecord>,
}

impl Layout {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let bytes = fs::read(path.as_ref())?;
        let value: Value = serde_json::from_slice(&bytes)?;
        Self::from_value(value)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Self::from_value(serde_json::from_str(json)?)
    }

    /// Lenient on the timer, strict on the shapes: a missing or malformed
    /// `timer_duration` falls back to the default, a missing `shapes` key
    /// rejects the whole layout.
    pub fn from_value(mut value: Value) -> Result<Self, ConfigError> {
        let timer_duration = match value.get("timer_duration") {
            None => {
                warn!(
                    "layout does not include 'timer_duration', assuming {}s",
                    DEFAULT_TIMER_SECS
                );
                DEFAULT_TIMER_SECS
            }
            Some(raw) => timer_from_value(raw).unwrap_or_else(|| {
                error!(
                    "invalid 'timer_duration' {}: expected a non-negative number, assuming {}s",
                    raw, DEFAULT_TIMER_SECS
                );
                DEFAULT_TIMER_SECS
            }),
        };

        let shapes = match value.get_mut("shapes") {
            None | Some(Value::Null) => return Err(ConfigError::MissingShapes),
            Some(shapes) => serde_json::from_value::<Vec<ShapeRecord>>(shapes.take())?,
        };
        if shapes.is_empty() {
            warn!("the 'shapes' key exists, but no shapes are defined");
        }

        Ok(Self {
            timer_duration,
            shapes,
        })
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Names of the layouts shipped with the binary, sorted.
pub fn builtin_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = LAYOUT_DIR
        .files()
        .filter_map(|file| file.path().file_stem()?.to_str())
        .collect();
    names.sort_unstable();
    names
}

/// Loads a shipped layout by name, `None` if there is no such layout.
pub fn builtin(name: &str) -> Option<Result<Layout, ConfigError>> {
    let file = LAYOUT_DIR.get_file(format!("{name}.json"))?;
    let json = match file.contents_utf8() {
        Some(json) => json,
        None => {
            return Some(Err(ConfigError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("layout '{name}' is not UTF-8"),
            ))))
        }
    };
    Some(Layout::from_json(json))
}

fn timer_from_value(value: &Value) -> Option<u32> {
    if let Some(secs) = value.as_u64() {
        return u32::try_from(secs).ok();
    }
    let secs = value.as_f64()?;
    (secs.is_finite() && secs >= 0.0 && secs <= f64::from(u32::MAX)).then(|| secs.round() as u32)
}
