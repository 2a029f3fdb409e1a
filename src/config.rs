//! Configuration loaded from `gvbsim.toml`

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use crate::error::ConfigError;

pub const CONFIG_FILE_NAME: &str = "gvbsim.toml";

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub simulator: SimulatorConfig,
    pub editor: EditorConfig,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulatorConfig {
    /// 1: 2x4 pixels per cell, 2: 1x2 pixels per cell
    pub pixel_scale: u8,
    pub foreground: u32,
    pub background: u32,
    pub batch_size: usize,
    pub repaint_interval_ms: u64,
    pub cursor_blink_ms: u64,
    pub min_sleep_ms: u64,
    pub key_release_ms: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            pixel_scale: 2,
            foreground: 0x313132,
            background: 0x7a8870,
            batch_size: 50,
            repaint_interval_ms: 17,
            cursor_blink_ms: 500,
            min_sleep_ms: 1,
            key_release_ms: 80,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EditorConfig {
    pub line_numbers: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self { line_numbers: true }
    }
}

impl Config {
    pub fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let sim = &self.simulator;
        if !matches!(sim.pixel_scale, 1 | 2) {
            return Err(ConfigError::Invalid(format!(
                "simulator.pixel_scale must be 1 or 2, got {}",
                sim.pixel_scale
            )));
        }
        for (name, value) in [
            ("foreground", sim.foreground),
            ("background", sim.background),
        ] {
            if value > 0xffffff {
                return Err(ConfigError::Invalid(format!(
                    "simulator.{} is not an RGB color: {:#x}",
                    name, value
                )));
            }
        }
        if sim.batch_size == 0 {
            return Err(ConfigError::Invalid("simulator.batch_size must be positive".into()));
        }
        for (name, value) in [
            ("repaint_interval_ms", sim.repaint_interval_ms),
            ("cursor_blink_ms", sim.cursor_blink_ms),
            ("min_sleep_ms", sim.min_sleep_ms),
            ("key_release_ms", sim.key_release_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("simulator.{} must be positive", name)));
            }
        }
        Ok(())
    }

    /// Load from `explicit` if given, else the first `gvbsim.toml` found in
    /// the working directory or next to the executable. Defaults when none
    /// exists.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Self::search_paths().into_iter().find(|p| p.is_file()),
        };

        match path {
            Some(path) => {
                let text = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                    path: path.clone(),
                    source,
                })?;
                info!(path = %path.display(), "loaded configuration");
                Self::parse(&text, &path)
            }
            None => {
                info!("no {} found, using defaults", CONFIG_FILE_NAME);
                Ok(Self::default())
            }
        }
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
        if let Some(dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
            paths.push(dir.join(CONFIG_FILE_NAME));
        }
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Config, ConfigError> {
        Config::parse(text, Path::new("test.toml"))
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = parse("").expect("empty config");
        assert_eq!(config, Config::default());
        assert_eq!(config.simulator.batch_size, 50);
        assert_eq!(config.simulator.repaint_interval_ms, 17);
        assert!(config.editor.line_numbers);
    }

    #[test]
    fn test_partial_override() {
        let config = parse(
            "[simulator]\npixel_scale = 1\nforeground = 0x000000\n\n[editor]\nline_numbers = false\n",
        )
        .expect("config");
        assert_eq!(config.simulator.pixel_scale, 1);
        assert_eq!(config.simulator.foreground, 0);
        assert_eq!(config.simulator.background, 0x7a8870);
        assert!(!config.editor.line_numbers);
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(matches!(parse("[simulator]\nspeed = 3\n"), Err(ConfigError::Parse { .. })));
        assert!(matches!(parse("[debugger]\n"), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = parse("[simulator]\npixel_scale = 3\n").unwrap_err();
        assert!(err.to_string().contains("pixel_scale"));
        assert!(matches!(parse("[simulator]\nbatch_size = 0\n"), Err(ConfigError::Invalid(_))));
        assert!(matches!(parse("[simulator]\ncursor_blink_ms = 0\n"), Err(ConfigError::Invalid(_))));
        assert!(matches!(parse("[simulator]\nbackground = 0x1000000\n"), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = Config::load(Some(Path::new("/nonexistent/gvbsim.toml")));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
