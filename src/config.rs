//! Configuration management for testloom
//!
//! Stores settings in ~/.config/testloom/config.json; the API key lives in
//! the system keychain when one is available.

use keyring::Entry;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use crate::llm::Model;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Plaintext API key fallback for systems without a usable keychain.
    pub openrouter_api_key: Option<String>,
    /// Generation model: a tier name ("speed", "smart") or a raw model id.
    pub model: Option<String>,
    /// Similarity ratio above which two test names count as duplicates.
    pub similarity_threshold: Option<f64>,
    /// Smallest multiplier the variation pass may draw.
    pub variation_multiplier_min: Option<u32>,
    /// Largest multiplier the variation pass may draw.
    pub variation_multiplier_max: Option<u32>,
    /// Generation rounds before the pipeline falls back to variations.
    pub max_rounds: Option<u32>,
    /// Tests to aim for when the CLI does not say.
    pub default_count: Option<usize>,
}

/// Knobs the repair pipeline reads on every run, resolved from config with
/// built-in defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineTuning {
    pub similarity_threshold: f64,
    pub multiplier_min: u32,
    pub multiplier_max: u32,
}

impl Default for PipelineTuning {
    fn default() -> Self {
        PipelineTuning {
            similarity_threshold: 0.8,
            multiplier_min: 2,
            multiplier_max: 5,
        }
    }
}

const KEYRING_SERVICE: &str = "testloom";
const KEYRING_USERNAME: &str = "openrouter_api_key";

fn keyring_entry() -> Result<Entry, keyring::Error> {
    Entry::new(KEYRING_SERVICE, KEYRING_USERNAME)
}

fn read_keyring_key() -> Result<Option<String>, keyring::Error> {
    let entry = keyring_entry()?;
    match entry.get_password() {
        Ok(key) => Ok(Some(key)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(err) => Err(err),
    }
}

fn write_keyring_key(key: &str) -> Result<(), keyring::Error> {
    let entry = keyring_entry()?;
    entry.set_password(key)
}

impl Config {
    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("testloom"))
    }

    fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.json"))
    }

    /// Load config from disk, or return default
    pub fn load() -> Self {
        if let Some(path) = Self::config_path() {
            if let Ok(content) = fs::read_to_string(&path) {
                match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(err) => {
                        preserve_corrupt_config(&path, &content);
                        eprintln!(
                            "  Warning: Config file was corrupted ({}). A backup was saved and defaults were loaded.",
                            err
                        );
                    }
                }
            }
        }
        Self::default()
    }

    /// Save config to disk
    pub fn save(&self) -> Result<(), String> {
        let dir = Self::config_dir()
            .ok_or_else(|| "Could not determine config directory".to_string())?;

        fs::create_dir_all(&dir)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) = fs::set_permissions(&dir, fs::Permissions::from_mode(0o700)) {
                eprintln!("  Warning: Failed to set config directory permissions: {}", e);
            }
        }

        let path = dir.join("config.json");
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        #[cfg(unix)]
        {
            write_config_atomic(&path, &content)
                .map_err(|e| format!("Failed to write config: {}", e))?;
        }

        #[cfg(not(unix))]
        {
            fs::write(&path, content)
                .map_err(|e| format!("Failed to write config: {}", e))?;
        }

        Ok(())
    }

    /// Resolve pipeline tuning from config overrides. Out-of-range values
    /// are clamped rather than rejected: the threshold stays within [0, 1]
    /// and the multiplier range stays ordered with a floor of 1.
    pub fn tuning(&self) -> PipelineTuning {
        let defaults = PipelineTuning::default();
        let threshold = self
            .similarity_threshold
            .unwrap_or(defaults.similarity_threshold)
            .clamp(0.0, 1.0);
        let mut min = self.variation_multiplier_min.unwrap_or(defaults.multiplier_min).max(1);
        let mut max = self.variation_multiplier_max.unwrap_or(defaults.multiplier_max).max(1);
        if min > max {
            std::mem::swap(&mut min, &mut max);
        }
        PipelineTuning {
            similarity_threshold: threshold,
            multiplier_min: min,
            multiplier_max: max,
        }
    }

    /// Model for generation, config override first. Tier names ("speed",
    /// "smart") resolve to their pinned ids; any other non-empty value is
    /// passed through as a raw OpenRouter model id.
    pub fn model_id(&self) -> String {
        match self.model.as_deref().map(str::trim) {
            None | Some("") => Model::default().id().to_string(),
            Some(raw) => match raw.to_lowercase().as_str() {
                "speed" => Model::Speed.id().to_string(),
                "smart" => Model::Smart.id().to_string(),
                _ => raw.to_string(),
            },
        }
    }

    /// Get the OpenRouter API key (environment, then keychain, then the
    /// plaintext fallback field).
    pub fn get_api_key(&self) -> Option<String> {
        if let Ok(key) = std::env::var("OPENROUTER_API_KEY") {
            if !key.trim().is_empty() {
                return Some(key);
            }
        }

        match read_keyring_key() {
            Ok(Some(key)) => return Some(key),
            Ok(None) => {}
            Err(err) => {
                eprintln!(
                    "  Warning: Failed to read API key from system keychain: {}",
                    err
                );
                eprintln!("  Tip: Set the OPENROUTER_API_KEY environment variable as a workaround.");
            }
        }

        self.openrouter_api_key.clone()
    }

    /// Set and save the API key: keychain first, plaintext config as the
    /// fallback when the keychain write does not stick.
    pub fn set_api_key(&mut self, key: &str) -> Result<(), String> {
        match write_keyring_key(key) {
            Ok(()) => {
                if let Ok(Some(stored)) = read_keyring_key() {
                    if stored == key {
                        self.openrouter_api_key = None;
                        return self.save();
                    }
                }
                eprintln!("  Warning: Keychain write could not be verified; storing key in config file.");
            }
            Err(err) => {
                eprintln!(
                    "  Warning: Failed to store API key in system keychain: {}. Storing in config file.",
                    err
                );
            }
        }
        self.openrouter_api_key = Some(key.to_string());
        self.save()
    }

    /// Check if an API key is available from any source.
    pub fn has_api_key(&self) -> bool {
        if std::env::var("OPENROUTER_API_KEY").is_ok_and(|k| !k.trim().is_empty()) {
            return true;
        }
        match read_keyring_key() {
            Ok(Some(_)) => return true,
            Ok(None) => {}
            Err(err) => {
                eprintln!(
                    "  Warning: Failed to check system keychain for API key: {}",
                    err
                );
            }
        }
        self.openrouter_api_key.is_some()
    }

    /// Validate API key format (should start with sk-)
    pub fn validate_api_key_format(key: &str) -> bool {
        key.starts_with("sk-")
    }

    /// Get the config file location for display
    pub fn config_location() -> String {
        Self::config_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "~/.config/testloom/config.json".to_string())
    }
}

/// Interactive prompt to set up the API key
pub fn setup_api_key_interactive() -> Result<String, String> {
    use std::io::{self, Write};

    println!();
    println!("  ┌─────────────────────────────────────────────────────────┐");
    println!("  │  OPENROUTER SETUP                                       │");
    println!("  └─────────────────────────────────────────────────────────┘");
    println!();
    println!("  testloom calls OpenRouter to draft unit tests for you.");
    println!();
    println!("  1. Get an API key at: https://openrouter.ai/keys");
    println!("  2. Paste it below (saved in your system keychain when available)");
    println!();
    print!("  API Key: ");
    io::stdout().flush().map_err(|e| e.to_string())?;

    let mut key = String::new();
    io::stdin().read_line(&mut key).map_err(|e| e.to_string())?;
    let key = key.trim().to_string();

    if key.is_empty() {
        return Err("No API key provided".to_string());
    }

    if !Config::validate_api_key_format(&key) {
        println!();
        println!("  Warning: Key doesn't look like an OpenRouter key (should start with sk-)");
        println!("     Saving anyway...");
    }

    let mut config = Config::load();
    config.set_api_key(&key)?;

    println!();
    println!("  + API key saved to {}", Config::config_location());
    println!();

    Ok(key)
}

fn preserve_corrupt_config(path: &std::path::Path, content: &str) {
    let corrupt_path = path.with_extension("json.corrupt");
    if fs::rename(path, &corrupt_path).is_err() {
        let _ = fs::write(&corrupt_path, content);
    }
}

#[cfg(unix)]
fn write_config_atomic(path: &std::path::Path, content: &str) -> Result<(), String> {
    use std::fs::OpenOptions;
    use std::os::unix::fs::PermissionsExt;

    let tmp_path = path.with_extension("tmp");
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&tmp_path)
        .map_err(|e| e.to_string())?;

    if let Err(e) = file.set_permissions(fs::Permissions::from_mode(0o600)) {
        eprintln!("  Warning: Failed to set temp config file permissions: {}", e);
    }

    file.write_all(content.as_bytes())
        .map_err(|e| e.to_string())?;

    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err.to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.openrouter_api_key.is_none());
        assert!(config.model.is_none());
    }

    #[test]
    fn test_tuning_defaults() {
        let tuning = Config::default().tuning();
        assert_eq!(tuning, PipelineTuning::default());
        assert!((tuning.similarity_threshold - 0.8).abs() < f64::EPSILON);
        assert_eq!((tuning.multiplier_min, tuning.multiplier_max), (2, 5));
    }

    #[test]
    fn test_tuning_clamps_bad_values() {
        let config = Config {
            similarity_threshold: Some(1.7),
            variation_multiplier_min: Some(6),
            variation_multiplier_max: Some(0),
            ..Config::default()
        };
        let tuning = config.tuning();
        assert!((tuning.similarity_threshold - 1.0).abs() < f64::EPSILON);
        assert_eq!((tuning.multiplier_min, tuning.multiplier_max), (1, 6));
    }

    #[test]
    fn test_model_tier_names_resolve_to_ids() {
        let mut config = Config::default();
        assert_eq!(config.model_id(), Model::Smart.id());

        config.model = Some("speed".to_string());
        assert_eq!(config.model_id(), Model::Speed.id());

        config.model = Some("Smart".to_string());
        assert_eq!(config.model_id(), Model::Smart.id());

        config.model = Some("mistralai/devstral-small".to_string());
        assert_eq!(config.model_id(), "mistralai/devstral-small");

        config.model = Some("  ".to_string());
        assert_eq!(config.model_id(), Model::default().id());
    }

    #[test]
    fn test_key_format_validation() {
        assert!(Config::validate_api_key_format("sk-or-v1-abc"));
        assert!(!Config::validate_api_key_format("not-a-key"));
    }

    #[cfg(unix)]
    #[test]
    fn test_atomic_write_sets_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        write_config_atomic(&path, "{\"model\":\"test\"}").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"model\":\"test\"}");
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert!(!path.with_extension("tmp").exists());

        // Overwrite goes through the same tmp-then-rename path.
        write_config_atomic(&path, "{}").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
    }
}
