//! Application configuration, persisted as RON

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use urdf_core::{ReferenceStyle, ViewerOptions};
use urdf_renderer::OrbitCamera;

/// Shared configuration manager type
pub type SharedConfig = Arc<RwLock<ConfigManager>>;

/// Camera input tuning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraConfig {
    pub enable_damping: bool,
    pub damping_factor: f32,
    /// Radians per pixel of drag
    pub rotate_speed: f32,
    /// Zoom steps per scroll point
    pub zoom_speed: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            enable_damping: true,
            damping_factor: OrbitCamera::DEFAULT_DAMPING,
            rotate_speed: 0.005,
            zoom_speed: 0.02,
        }
    }
}

impl CameraConfig {
    pub fn apply(&self, camera: &mut OrbitCamera) {
        camera.enable_damping = self.enable_damping;
        camera.damping_factor = self.damping_factor.clamp(0.0, 1.0);
        camera.rotate_speed = self.rotate_speed;
    }
}

/// Panel visibility
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UiConfig {
    pub show_hierarchy: bool,
    pub show_joints: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            show_hierarchy: true,
            show_joints: true,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppConfig {
    /// Configuration format version
    #[serde(default)]
    pub version: u32,
    /// Options used when a payload is built from a package directory
    #[serde(default)]
    pub viewer: ViewerOptions,
    #[serde(default)]
    pub reference_style: ReferenceStyle,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

impl AppConfig {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            ..Default::default()
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] ron::Error),
}

/// Loads, holds and saves the [`AppConfig`]
pub struct ConfigManager {
    config: AppConfig,
    config_path: PathBuf,
    dirty: bool,
}

impl ConfigManager {
    /// Load from the OS config directory, falling back to defaults
    pub fn new() -> Self {
        Self::with_path(Self::default_path())
    }

    /// Load from `config_path`, falling back to defaults
    pub fn with_path(config_path: PathBuf) -> Self {
        let config = Self::load_from_path(&config_path).unwrap_or_else(|| {
            tracing::info!("No config file found, using defaults");
            AppConfig::new()
        });

        Self {
            config,
            config_path,
            dirty: false,
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("urdf-viewer")
            .join("config.ron")
    }

    #[cfg(target_arch = "wasm32")]
    fn default_path() -> PathBuf {
        PathBuf::from("config.ron")
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn load_from_path(path: &Path) -> Option<AppConfig> {
        let content = std::fs::read_to_string(path).ok()?;
        match ron::from_str(&content) {
            Ok(config) => {
                tracing::info!("Loaded config from {:?}", path);
                Some(config)
            }
            Err(e) => {
                tracing::warn!("Failed to parse config file: {}", e);
                None
            }
        }
    }

    #[cfg(target_arch = "wasm32")]
    fn load_from_path(_path: &Path) -> Option<AppConfig> {
        None
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Mutable access; marks the configuration dirty
    pub fn config_mut(&mut self) -> &mut AppConfig {
        self.dirty = true;
        &mut self.config
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&mut self) -> Result<(), ConfigError> {
        if !self.dirty {
            return Ok(());
        }

        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = ron::ser::to_string_pretty(&self.config, ron::ser::PrettyConfig::default())?;
        std::fs::write(&self.config_path, content)?;

        tracing::info!("Saved config to {:?}", self.config_path);
        self.dirty = false;
        Ok(())
    }

    #[cfg(target_arch = "wasm32")]
    pub fn save(&mut self) -> Result<(), ConfigError> {
        self.dirty = false;
        Ok(())
    }

    pub fn reset_to_defaults(&mut self) {
        self.config = AppConfig::new();
        self.dirty = true;
    }

    pub fn config_file_path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

pub fn create_shared_config() -> SharedConfig {
    Arc::new(RwLock::new(ConfigManager::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use urdf_core::UpAxis;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::with_path(dir.path().join("config.ron"));
        assert_eq!(manager.config(), &AppConfig::new());
        assert!(!manager.is_dirty());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.ron");

        let mut manager = ConfigManager::with_path(path.clone());
        manager.config_mut().viewer.up_axis = UpAxis::Y;
        manager.config_mut().reference_style = ReferenceStyle::DataUrl;
        manager.config_mut().camera.zoom_speed = 0.5;
        manager.save().unwrap();
        assert!(!manager.is_dirty());

        let reloaded = ConfigManager::with_path(path);
        assert_eq!(reloaded.config().viewer.up_axis, UpAxis::Y);
        assert_eq!(reloaded.config().reference_style, ReferenceStyle::DataUrl);
        assert_eq!(reloaded.config().camera.zoom_speed, 0.5);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ron");
        std::fs::write(&path, "(version: 1, ui: (show_joints: false))").unwrap();

        let manager = ConfigManager::with_path(path);
        assert!(!manager.config().ui.show_joints);
        assert!(manager.config().ui.show_hierarchy);
        assert_eq!(manager.config().camera, CameraConfig::default());
    }

    #[test]
    fn test_broken_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ron");
        std::fs::write(&path, "not ron at all (").unwrap();
        let manager = ConfigManager::with_path(path);
        assert_eq!(manager.config(), &AppConfig::new());
    }

    #[test]
    fn test_reset_to_defaults_is_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ron");

        let mut manager = ConfigManager::with_path(path.clone());
        assert_eq!(manager.config_file_path(), path.as_path());
        manager.config_mut().ui.show_hierarchy = false;
        manager.config_mut().camera.rotate_speed = 0.5;
        manager.save().unwrap();

        manager.reset_to_defaults();
        assert!(manager.is_dirty());
        assert_eq!(manager.config(), &AppConfig::new());
        manager.save().unwrap();

        let reloaded = ConfigManager::with_path(path);
        assert!(reloaded.config().ui.show_hierarchy);
        assert_eq!(reloaded.config().camera, CameraConfig::default());
    }

    #[test]
    fn test_camera_config_apply() {
        let mut camera = OrbitCamera::default();
        let config = CameraConfig {
            enable_damping: false,
            damping_factor: 2.0,
            rotate_speed: 0.01,
            zoom_speed: 0.1,
        };
        config.apply(&mut camera);
        assert!(!camera.enable_damping);
        assert_eq!(camera.damping_factor, 1.0);
        assert_eq!(camera.rotate_speed, 0.01);
    }
}
