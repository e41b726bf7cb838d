//! Viewer configuration.
//!
//! Stored as RON under the platform config directory:
//!
//! ```text
//! Linux:   ~/.config/ndv/viewer.ron
//! macOS:   ~/Library/Application Support/ndv/viewer.ron
//! Windows: %APPDATA%\ndv\viewer.ron
//! ```
//!
//! A missing file means defaults. A file that exists but does not parse is
//! an error, so a typo never silently resets someone's colors. Every field
//! is optional in the file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use ndv_io::DEFAULT_CACHE_SIZE;
use ndv_lut::{Rgb8, validate_gamma};

use crate::{ViewError, ViewResult};

/// Config file name inside the `ndv` config directory.
pub const CONFIG_FILE: &str = "viewer.ron";

/// Default grace period for worker shutdown.
pub const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 2000;

/// Default canvas size.
pub const DEFAULT_DISPLAY_SIZE: [u32; 2] = [1280, 720];

/// Persistent viewer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Preferred display color per channel name. Unlisted channels are white.
    pub channel_colors: BTreeMap<String, Rgb8>,
    /// Gamma given to newly registered channels.
    pub default_gamma: f64,
    /// How long shutdown waits for each worker before detaching it.
    pub shutdown_grace_ms: u64,
    /// Byte budget of the tile cache.
    pub tile_cache_bytes: usize,
    /// Canvas size used before the presentation layer reports one.
    pub display_size: [u32; 2],
    /// Draw the scale bar overlay.
    pub show_scale_bar: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            channel_colors: BTreeMap::new(),
            default_gamma: 1.0,
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE_MS,
            tile_cache_bytes: DEFAULT_CACHE_SIZE,
            display_size: DEFAULT_DISPLAY_SIZE,
            show_scale_bar: true,
        }
    }
}

impl ViewerConfig {
    /// `<config dir>/ndv/viewer.ron`.
    pub fn default_path() -> ViewResult<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("ndv").join(CONFIG_FILE))
            .ok_or(ViewError::NoConfigDir)
    }

    /// Loads from the default location.
    pub fn load_default() -> ViewResult<Self> {
        Self::load(&Self::default_path()?)
    }

    /// Loads from `path`, falling back to defaults if it does not exist.
    pub fn load(path: &Path) -> ViewResult<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no viewer config, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        let config: Self = ron::from_str(&text).map_err(|source| ViewError::ConfigParse {
            path: path.to_owned(),
            source,
        })?;
        config.validate()?;
        debug!(path = %path.display(), "loaded viewer config");
        Ok(config)
    }

    /// Writes to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> ViewResult<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_ron()?)?;
        debug!(path = %path.display(), "saved viewer config");
        Ok(())
    }

    /// Pretty-printed RON text.
    pub fn to_ron(&self) -> ViewResult<String> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    /// Rejects values the pipeline cannot use.
    pub fn validate(&self) -> ViewResult<()> {
        validate_gamma(self.default_gamma)?;
        if self.display_size[0] == 0 || self.display_size[1] == 0 {
            return Err(ViewError::InvalidConfig(format!(
                "display_size {}x{}",
                self.display_size[0], self.display_size[1]
            )));
        }
        Ok(())
    }

    /// Display color for a newly observed channel.
    pub fn color_for(&self, channel: &str) -> Rgb8 {
        self.channel_colors.get(channel).copied().unwrap_or_default()
    }

    /// Builder-style color preference.
    pub fn with_channel_color(mut self, channel: &str, color: Rgb8) -> Self {
        self.channel_colors.insert(channel.to_owned(), color);
        self
    }

    /// Shutdown grace period.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let config = ViewerConfig::load(&dir.path().join("absent.ron")).unwrap();
        assert_eq!(config, ViewerConfig::default());
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);
        let config = ViewerConfig {
            default_gamma: 0.8,
            shutdown_grace_ms: 500,
            show_scale_bar: false,
            ..ViewerConfig::default()
        }
        .with_channel_color("DAPI", Rgb8::BLUE);

        config.save(&path).unwrap();
        let loaded = ViewerConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.color_for("DAPI"), Rgb8::BLUE);
        assert_eq!(loaded.color_for("GFP"), Rgb8::WHITE);
        assert_eq!(loaded.shutdown_grace(), Duration::from_millis(500));
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "(show_scale_bar: false)").unwrap();
        let config = ViewerConfig::load(&path).unwrap();
        assert!(!config.show_scale_bar);
        assert_eq!(config.shutdown_grace_ms, DEFAULT_SHUTDOWN_GRACE_MS);
    }

    #[test]
    fn malformed_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "(default_gamma: \"bright\")").unwrap();
        assert!(matches!(
            ViewerConfig::load(&path),
            Err(ViewError::ConfigParse { .. })
        ));
    }

    #[test]
    fn bad_values_rejected() {
        let config = ViewerConfig {
            default_gamma: 0.0,
            ..ViewerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ViewError::Display(_))));

        let config = ViewerConfig {
            display_size: [0, 10],
            ..ViewerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ViewError::InvalidConfig(_))));
    }
}
