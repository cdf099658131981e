//! Persistent host settings (JSON file in the user data directory).

use std::fs;
use std::path::{Path, PathBuf};

use bandscope_core::TransformKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    pub preferred_input_device: Option<String>,
    pub volume: f32,
    pub muted: bool,
    pub transform: TransformKind,
    pub meter_interval_ms: u64,
    /// Stop after this many seconds; `None` runs until Ctrl-C.
    pub run_for_secs: Option<u64>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            preferred_input_device: None,
            volume: 1.0,
            muted: false,
            transform: TransformKind::Radix2,
            meter_interval_ms: 250,
            run_for_secs: None,
        }
    }
}

impl AppSettings {
    pub fn normalize(&mut self) {
        self.volume = if self.volume.is_finite() {
            self.volume.clamp(0.0, 1.0)
        } else {
            1.0
        };
        self.meter_interval_ms = self.meter_interval_ms.clamp(50, 10_000);
        self.run_for_secs = self.run_for_secs.filter(|&s| s > 0);
        self.preferred_input_device = self
            .preferred_input_device
            .as_ref()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
    }
}

pub fn default_settings_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Bandscope")
            .join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".local")
                    .join("share")
            })
            .join("bandscope")
            .join("settings.json")
    }
}

/// Missing or unreadable files fall back to defaults.
pub fn load_settings(path: &Path) -> AppSettings {
    let mut settings = match fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str::<AppSettings>(&raw).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), "ignoring malformed settings: {e}");
            AppSettings::default()
        }),
        Err(_) => AppSettings::default(),
    };
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("bandscope-settings-{}-{name}", std::process::id()))
            .join("settings.json")
    }

    #[test]
    fn missing_file_yields_defaults() {
        let settings = load_settings(&scratch_path("missing"));
        assert_eq!(settings, AppSettings::default());
    }

    #[test]
    fn partial_json_keeps_defaults_for_the_rest() {
        let settings: AppSettings =
            serde_json::from_str(r#"{"volume": 0.3, "transform": "planned"}"#).expect("parse");
        assert_eq!(settings.volume, 0.3);
        assert_eq!(settings.transform, TransformKind::Planned);
        assert!(!settings.muted);
        assert_eq!(settings.meter_interval_ms, 250);
    }

    #[test]
    fn normalize_clamps_and_trims() {
        let mut settings = AppSettings {
            preferred_input_device: Some("   ".into()),
            volume: 4.0,
            muted: true,
            transform: TransformKind::Radix2,
            meter_interval_ms: 1,
            run_for_secs: Some(0),
        };
        settings.normalize();
        assert_eq!(settings.preferred_input_device, None);
        assert_eq!(settings.volume, 1.0);
        assert_eq!(settings.meter_interval_ms, 50);
        assert_eq!(settings.run_for_secs, None);

        settings.preferred_input_device = Some("  USB Mic ".into());
        settings.volume = f32::NAN;
        settings.normalize();
        assert_eq!(settings.preferred_input_device.as_deref(), Some("USB Mic"));
        assert_eq!(settings.volume, 1.0);
    }

    #[test]
    fn save_then_load_preserves_values() {
        let path = scratch_path("roundtrip");
        let settings = AppSettings {
            preferred_input_device: Some("Line In".into()),
            volume: 0.25,
            muted: true,
            transform: TransformKind::Planned,
            meter_interval_ms: 500,
            run_for_secs: Some(10),
        };
        save_settings(&path, &settings).expect("save");
        let loaded = load_settings(&path);
        assert_eq!(loaded, settings);
        if let Some(dir) = path.parent() {
            let _ = fs::remove_dir_all(dir);
        }
    }
}
