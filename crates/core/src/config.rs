//! Configuration loaded from a TOML file.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration:
//!
//! ```toml
//! [window]
//! title = "vkframe"
//! width = 800
//! height = 600
//!
//! [renderer]
//! validation = true
//! device_selection = "first-suitable"   # or "prefer-discrete"
//! clear_color = [0.0, 0.0, 0.0, 1.0]
//!
//! [shaders]
//! vertex = "shaders/spirv/quad.vert.spv"
//! fragment = "shaders/spirv/quad.frag.spv"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;

/// Name of the config file picked up from the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "vkframe.toml";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Window settings
    #[serde(default)]
    pub window: WindowConfig,
    /// GPU and frame loop settings
    #[serde(default)]
    pub renderer: RendererConfig,
    /// SPIR-V locations
    #[serde(default)]
    pub shaders: ShaderConfig,
}

/// Initial window settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Window title (default: "vkframe")
    #[serde(default = "default_title")]
    pub title: String,
    /// Initial inner width in physical pixels (default: 800)
    #[serde(default = "default_width")]
    pub width: u32,
    /// Initial inner height in physical pixels (default: 600)
    #[serde(default = "default_height")]
    pub height: u32,
}

/// How the physical device is chosen among suitable candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceSelection {
    /// First suitable device in enumeration order
    #[default]
    FirstSuitable,
    /// Highest scoring suitable device (discrete GPUs first)
    PreferDiscrete,
}

/// Renderer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RendererConfig {
    /// Enable the Khronos validation layer (default: on in debug builds)
    #[serde(default = "default_validation")]
    pub validation: bool,
    /// Device selection policy (default: first-suitable)
    #[serde(default)]
    pub device_selection: DeviceSelection,
    /// Clear color for the color attachment (default: opaque black)
    #[serde(default = "default_clear_color")]
    pub clear_color: [f32; 4],
}

/// SPIR-V shader paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderConfig {
    /// Vertex shader SPIR-V file
    #[serde(default = "default_vertex_shader")]
    pub vertex: PathBuf,
    /// Fragment shader SPIR-V file
    #[serde(default = "default_fragment_shader")]
    pub fragment: PathBuf,
}

fn default_title() -> String {
    "vkframe".to_string()
}
fn default_width() -> u32 {
    800
}
fn default_height() -> u32 {
    600
}
fn default_validation() -> bool {
    cfg!(debug_assertions)
}
fn default_clear_color() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}
fn default_vertex_shader() -> PathBuf {
    PathBuf::from("shaders/spirv/quad.vert.spv")
}
fn default_fragment_shader() -> PathBuf {
    PathBuf::from("shaders/spirv/quad.frag.spv")
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            width: default_width(),
            height: default_height(),
        }
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            validation: default_validation(),
            device_selection: DeviceSelection::default(),
            clear_color: default_clear_color(),
        }
    }
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            vertex: default_vertex_shader(),
            fragment: default_fragment_shader(),
        }
    }
}

impl Config {
    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the text is not valid
    /// TOML or a field has the wrong type.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if the file cannot be read and
    /// [`Error::Config`](crate::Error::Config) if it cannot be parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Loads `path` if given, else `vkframe.toml` from the working directory
    /// if it exists, else the defaults.
    ///
    /// # Errors
    ///
    /// An explicitly given path that fails to load is an error; a missing
    /// default file is not.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    debug!("No {} found, using default configuration", DEFAULT_CONFIG_FILE);
                    Ok(Self::default())
                }
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(crate::Error::Config(format!(
                "window size must be non-zero, got {}x{}",
                self.window.width, self.window.height
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.renderer.device_selection, DeviceSelection::FirstSuitable);
    }

    #[test]
    fn test_partial_config() {
        let config = Config::from_toml_str(
            r#"
            [window]
            width = 1280

            [renderer]
            device_selection = "prefer-discrete"
            clear_color = [0.1, 0.2, 0.3, 1.0]
            "#,
        )
        .unwrap();

        assert_eq!(config.window.width, 1280);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.window.title, "vkframe");
        assert_eq!(config.renderer.device_selection, DeviceSelection::PreferDiscrete);
        assert_eq!(config.renderer.clear_color, [0.1, 0.2, 0.3, 1.0]);
        assert_eq!(config.shaders, ShaderConfig::default());
    }

    #[test]
    fn test_unknown_selection_is_config_error() {
        let err = Config::from_toml_str("[renderer]\ndevice_selection = \"fastest\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_zero_window_size_rejected() {
        let err = Config::from_toml_str("[window]\nwidth = 0").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = Config::load(Path::new("definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_serialize_round_trip() {
        let config = Config::default();
        let text = toml::to_string(&config).unwrap();
        assert_eq!(Config::from_toml_str(&text).unwrap(), config);
    }
}
