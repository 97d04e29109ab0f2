//! Loading and saving detection settings as JSON.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use pitch_core::DetectionSettings;

/// Saves settings to a pretty-printed JSON file.
pub fn save_settings(settings: &DetectionSettings, path: &Path) -> Result<()> {
    let json_string = serde_json::to_string_pretty(settings)?;
    let mut file =
        File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    file.write_all(json_string.as_bytes())?;
    Ok(())
}

/// Loads settings from a JSON file. Missing fields take the values of
/// `DetectionSettings::default()`; the result is validated before it is
/// returned.
pub fn load_settings(path: &Path) -> Result<DetectionSettings> {
    let mut file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let mut data = String::new();
    file.read_to_string(&mut data)?;
    let settings: DetectionSettings = serde_json::from_str(&data)
        .with_context(|| format!("{} is not a valid settings file", path.display()))?;
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("vocal-pitch-{}-{}", std::process::id(), name))
    }

    #[test]
    fn settings_survive_a_save_and_load() {
        let path = temp_path("settings.json");
        let settings = DetectionSettings {
            confidence_threshold: 0.6,
            ..DetectionSettings::offline()
        };
        save_settings(&settings, &path).unwrap();
        let loaded = load_settings(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn invalid_settings_are_refused() {
        let path = temp_path("bad.json");
        std::fs::write(&path, r#"{ "min_frequency_hz": 900.0, "max_frequency_hz": 100.0 }"#)
            .unwrap();
        let result = load_settings(&path);
        std::fs::remove_file(&path).ok();
        assert!(result.is_err());
    }
}
