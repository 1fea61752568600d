//! # Scene Configuration
//!
//! Numeric bounds supplied once when a [`Universe`](crate::scene::Universe) is
//! constructed and shared read-only with every World it creates.

use serde::{Deserialize, Serialize};

use crate::config::{Config, ConfigError};

/// Bounds and switches for the scene graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Maximum nesting depth of the assembly tree (a root has depth 0)
    pub max_depth: usize,

    /// Smallest accepted viewport (width, height) in pixels
    pub min_viewport: (u32, u32),

    /// Largest accepted viewport (width, height) in pixels
    pub max_viewport: (u32, u32),

    /// Number of backend light units; lamps beyond this are not applied
    pub max_lamps: usize,

    /// Sort transparent parts and figures back-to-front each frame
    pub sort_transparent: bool,

    /// Near plane used for new Worlds
    pub default_near: f32,

    /// Far plane used for new Worlds
    pub default_far: f32,

    /// Vertical field of view (degrees) used for new Worlds
    pub default_angle: f32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            max_depth: 16,
            min_viewport: (1, 1),
            max_viewport: (16384, 16384),
            max_lamps: 8,
            sort_transparent: true,
            default_near: 0.1,
            default_far: 1000.0,
            default_angle: 45.0,
        }
    }
}

impl Config for SceneConfig {}

impl SceneConfig {
    /// Check the bounds are self-consistent
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth == 0 {
            return Err(ConfigError::Invalid("max_depth must be at least 1".to_string()));
        }
        if self.max_lamps == 0 {
            return Err(ConfigError::Invalid("max_lamps must be at least 1".to_string()));
        }
        let (min_w, min_h) = self.min_viewport;
        let (max_w, max_h) = self.max_viewport;
        if min_w == 0 || min_h == 0 || min_w > max_w || min_h > max_h {
            return Err(ConfigError::Invalid(format!(
                "viewport bounds {:?}..{:?} are inverted or empty",
                self.min_viewport, self.max_viewport
            )));
        }
        if !(self.default_near > 0.0 && self.default_far > self.default_near) {
            return Err(ConfigError::Invalid(format!(
                "clip planes near={} far={} are not ordered",
                self.default_near, self.default_far
            )));
        }
        if !(self.default_angle > 0.0 && self.default_angle < 180.0) {
            return Err(ConfigError::Invalid(format!(
                "default_angle {} outside (0, 180)",
                self.default_angle
            )));
        }
        Ok(())
    }

    /// Whether a viewport size falls inside the configured bounds
    pub fn accepts_viewport(&self, width: u32, height: u32) -> bool {
        let (min_w, min_h) = self.min_viewport;
        let (max_w, max_h) = self.max_viewport;
        (min_w..=max_w).contains(&width) && (min_h..=max_h).contains(&height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SceneConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_depth() {
        let config = SceneConfig { max_depth: 0, ..SceneConfig::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_viewport_bounds() {
        let config = SceneConfig { max_viewport: (800, 600), ..SceneConfig::default() };
        assert!(config.accepts_viewport(800, 600));
        assert!(!config.accepts_viewport(801, 600));
        assert!(!config.accepts_viewport(0, 10));
    }

    #[test]
    fn test_toml_round_trip_through_file() {
        let path = std::env::temp_dir().join(format!("scene_config_{}.toml", std::process::id()));
        let config = SceneConfig { max_depth: 4, sort_transparent: false, ..SceneConfig::default() };
        config.save_to_file(&path).expect("save");
        let loaded = SceneConfig::load_from_file(&path).expect("load");
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed: SceneConfig = toml::from_str("max_lamps = 2").expect("parse");
        assert_eq!(parsed.max_lamps, 2);
        assert_eq!(parsed.max_depth, SceneConfig::default().max_depth);
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let result = SceneConfig::load_from_file("scene.yaml");
        assert!(result.is_err());
    }
}
