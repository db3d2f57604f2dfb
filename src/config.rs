use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::app_dirs::AppDirs;
use crate::geometry::Surface;
use crate::input::{gamepad::GamepadSettings, gesture::GestureSettings, DeviceKind};

/// User settings persisted between runs. Unknown or missing fields fall back
/// to their defaults so older files keep loading.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub device: DeviceKind,
    pub surface_width: f64,
    pub surface_height: f64,
    pub gamepad: GamepadSettings,
    pub gesture: GestureSettings,
    /// Layout loaded at startup when none is given on the command line.
    pub last_layout: Option<PathBuf>,
    pub export_dir: Option<PathBuf>,
    /// Recording replayed as the hand tracking device.
    pub hand_replay: Option<PathBuf>,
    /// Recording replayed as the gamepad device.
    pub gamepad_replay: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        let surface = Surface::default();
        Self {
            device: DeviceKind::Pointer,
            surface_width: surface.width,
            surface_height: surface.height,
            gamepad: GamepadSettings::default(),
            gesture: GestureSettings::default(),
            last_layout: None,
            export_dir: None,
            hand_replay: None,
            gamepad_replay: None,
        }
    }
}

impl Settings {
    pub fn surface(&self) -> Surface {
        Surface::new(self.surface_width, self.surface_height)
    }
}

pub trait SettingsStore {
    fn load(&self) -> Settings;
    fn save(&self, settings: &Settings) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            path: AppDirs::settings_path(),
        }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileSettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self) -> Settings {
        let Ok(bytes) = fs::read(&self.path) else {
            return Settings::default();
        };
        serde_json::from_slice::<Settings>(&bytes).unwrap_or_else(|err| {
            warn!("ignoring unreadable settings {}: {err}", self.path.display());
            Settings::default()
        })
    }

    fn save(&self, settings: &Settings) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(settings)?;
        fs::write(&self.path, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let store = FileSettingsStore::with_path(dir.path().join("settings.json"));
        assert_eq!(store.load(), Settings::default());
    }

    #[test]
    fn test_corrupt_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, b"{ nope").unwrap();
        assert_eq!(FileSettingsStore::with_path(&path).load(), Settings::default());
    }

    #[test]
    fn test_save_and_load_custom_settings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let store = FileSettingsStore::with_path(&path);
        let settings = Settings {
            device: DeviceKind::Gamepad,
            surface_width: 1024.0,
            surface_height: 768.0,
            gamepad: GamepadSettings {
                sensitivity: 0.08,
                deadzone: 0.2,
                update_interval_ms: 20,
            },
            gesture: GestureSettings {
                fist_radius: 0.12,
                frame_interval_ms: 10,
            },
            last_layout: Some("layouts/small.json".into()),
            export_dir: Some("/tmp/exports".into()),
            hand_replay: None,
            gamepad_replay: Some("pad.jsonl".into()),
        };
        store.save(&settings).unwrap();
        assert_eq!(store.load(), settings);
    }

    #[test]
    fn test_partial_file_fills_in_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, br#"{"device": "Hand Tracking", "gamepad": {"deadzone": 0.3}}"#).unwrap();

        let settings = FileSettingsStore::with_path(&path).load();
        assert_eq!(settings.device, DeviceKind::Gesture);
        assert_eq!(settings.gamepad.deadzone, 0.3);
        assert_eq!(settings.gamepad.sensitivity, 0.05);
        assert_eq!(settings.surface(), Surface::default());
    }
}
