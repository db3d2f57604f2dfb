use directories::ProjectDirs;
use std::path::PathBuf;

const APP_NAME: &str = "reflex";

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    fn project() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", APP_NAME)
    }

    pub fn settings_path() -> PathBuf {
        Self::project()
            .map(|pd| pd.config_dir().join("settings.json"))
            .unwrap_or_else(|| PathBuf::from("reflex_settings.json"))
    }

    /// Log files live under the XDG state dir when `HOME` is known.
    pub fn log_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(
                PathBuf::from(home)
                    .join(".local")
                    .join("state")
                    .join(APP_NAME),
            )
        } else {
            Self::project().map(|pd| pd.data_local_dir().join("logs"))
        }
    }

    pub fn log_path() -> Option<PathBuf> {
        Self::log_dir().map(|dir| dir.join("reflex.log"))
    }

    /// Default destination for click-log and layout exports.
    pub fn export_dir() -> PathBuf {
        Self::project()
            .map(|pd| pd.data_dir().join("exports"))
            .unwrap_or_else(|| PathBuf::from("exports"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_are_app_specific() {
        assert!(AppDirs::settings_path().ends_with("settings.json"));
        assert!(AppDirs::export_dir().ends_with("exports"));
        if let Some(log) = AppDirs::log_path() {
            assert!(log.to_string_lossy().contains(APP_NAME));
        }
    }
}
