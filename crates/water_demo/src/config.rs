//! Demo configuration (window, camera, lighting, water). Loaded from water.ron at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Persistent demo settings. Loaded from `water.ron` in the current directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemoConfig {
    /// Window width in logical pixels.
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    /// Window height in logical pixels.
    #[serde(default = "default_window_height")]
    pub window_height: u32,
    #[serde(default)]
    pub vsync: bool,
    /// Radians per pixel of mouse motion.
    #[serde(default = "default_mouse_speed")]
    pub mouse_speed: f32,
    /// World units per second.
    #[serde(default = "default_move_speed")]
    pub move_speed: f32,
    #[serde(default = "default_fov")]
    pub fov_degrees: f32,
    #[serde(default = "default_near")]
    pub near: f32,
    #[serde(default = "default_far")]
    pub far: f32,
    #[serde(default = "default_eye")]
    pub eye: [f32; 3],
    #[serde(default = "default_pitch")]
    pub pitch: f32,
    #[serde(default = "default_yaw")]
    pub yaw: f32,
    #[serde(default = "default_light_position")]
    pub light_position: [f32; 3],
    #[serde(default = "default_light_color")]
    pub light_color: [f32; 3],
    #[serde(default = "default_water_height")]
    pub water_height: f32,
    /// Half the side length of one water tile.
    #[serde(default = "default_water_half_size")]
    pub water_half_size: f32,
    #[serde(default = "default_tiles_per_side")]
    pub tiles_per_side: u32,
    /// Scroll added to the dudv offset each frame.
    #[serde(default = "default_scroll_speed")]
    pub scroll_speed: f32,
    /// Lift of the reflection clip plane above the water.
    #[serde(default = "default_reflection_bias")]
    pub reflection_bias: f32,
    #[serde(default = "default_wave_strength")]
    pub wave_strength: f32,
    #[serde(default = "default_skybox_half_size")]
    pub skybox_half_size: f32,
    /// Seed for the generated pool and textures.
    #[serde(default)]
    pub seed: u64,
    /// Directory searched for `dudv.png`, `normal.png` and `stone.png`.
    #[serde(default = "default_asset_dir")]
    pub asset_dir: PathBuf,
    #[serde(default = "default_capture_dir")]
    pub capture_dir: PathBuf,
}

fn default_window_width() -> u32 {
    800
}
fn default_window_height() -> u32 {
    600
}
fn default_mouse_speed() -> f32 {
    0.005
}
fn default_move_speed() -> f32 {
    5.0
}
fn default_fov() -> f32 {
    45.0
}
fn default_near() -> f32 {
    0.1
}
fn default_far() -> f32 {
    2000.0
}
fn default_eye() -> [f32; 3] {
    [5.7, 9.7, -5.9]
}
fn default_pitch() -> f32 {
    -2.3
}
fn default_yaw() -> f32 {
    5.4
}
fn default_light_position() -> [f32; 3] {
    [3.0, 3.0, 3.0]
}
fn default_light_color() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}
fn default_water_height() -> f32 {
    2.2
}
fn default_water_half_size() -> f32 {
    5.0
}
fn default_tiles_per_side() -> u32 {
    1
}
fn default_scroll_speed() -> f32 {
    0.0005
}
fn default_reflection_bias() -> f32 {
    0.125
}
fn default_wave_strength() -> f32 {
    0.02
}
fn default_skybox_half_size() -> f32 {
    500.0
}
fn default_asset_dir() -> PathBuf {
    PathBuf::from("assets")
}
fn default_capture_dir() -> PathBuf {
    PathBuf::from("result")
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            window_width: default_window_width(),
            window_height: default_window_height(),
            vsync: false,
            mouse_speed: default_mouse_speed(),
            move_speed: default_move_speed(),
            fov_degrees: default_fov(),
            near: default_near(),
            far: default_far(),
            eye: default_eye(),
            pitch: default_pitch(),
            yaw: default_yaw(),
            light_position: default_light_position(),
            light_color: default_light_color(),
            water_height: default_water_height(),
            water_half_size: default_water_half_size(),
            tiles_per_side: default_tiles_per_side(),
            scroll_speed: default_scroll_speed(),
            reflection_bias: default_reflection_bias(),
            wave_strength: default_wave_strength(),
            skybox_half_size: default_skybox_half_size(),
            seed: 0,
            asset_dir: default_asset_dir(),
            capture_dir: default_capture_dir(),
        }
    }
}

impl DemoConfig {
    /// Load config from `water.ron`. If the file is missing or invalid, returns default config.
    pub fn load() -> Self {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(data) => match Self::parse(&data) {
                Ok(c) => {
                    log::info!("Loaded config from {:?}", path);
                    return c;
                }
                Err(e) => log::warn!("Invalid config at {:?}: {}, using defaults", path, e),
            },
            Err(_) => log::debug!("No config at {:?}, using defaults", path),
        }
        Self::default()
    }

    pub fn parse(data: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(data)
    }

    /// Save current config to `water.ron`.
    pub fn save(&self) -> anyhow::Result<PathBuf> {
        let path = config_path();
        let s = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        std::fs::write(&path, s)?;
        Ok(path)
    }
}

fn config_path() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")).join("water.ron")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_struct_takes_every_default() {
        let config = DemoConfig::parse("()").unwrap();
        assert_eq!(config, DemoConfig::default());
        assert_eq!(config.window_width, 800);
        assert_eq!(config.capture_dir, PathBuf::from("result"));
    }

    #[test]
    fn partial_file_overrides_named_fields_only() {
        let config = DemoConfig::parse("(water_height: 1.5, tiles_per_side: 3)").unwrap();
        assert_eq!(config.water_height, 1.5);
        assert_eq!(config.tiles_per_side, 3);
        assert_eq!(config.scroll_speed, 0.0005);
        assert_eq!(config.eye, [5.7, 9.7, -5.9]);
    }

    #[test]
    fn pretty_output_parses_back() {
        let mut config = DemoConfig::default();
        config.seed = 7;
        let text = ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::default()).unwrap();
        assert_eq!(DemoConfig::parse(&text).unwrap(), config);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = DemoConfig::load_from(Path::new("does/not/exist/water.ron"));
        assert_eq!(config, DemoConfig::default());
    }

    #[test]
    fn malformed_file_is_rejected() {
        assert!(DemoConfig::parse("(water_height: \"deep\")").is_err());
    }
}
