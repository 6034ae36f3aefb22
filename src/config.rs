use anyhow::{Context, Result, ensure};
use glam::Vec3;
use orbview_runtime::{ControlsConfig, Light, ViewerConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "orbview.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSection {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowSection {
    fn default() -> Self {
        Self {
            title: "orbview".into(),
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneSection {
    pub background: u32,
}

impl Default for SceneSection {
    fn default() -> Self {
        Self {
            background: 0x8fbcd4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSection {
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
}

impl Default for CameraSection {
    fn default() -> Self {
        Self {
            fov: 35.0,
            near: 1.0,
            far: 3000.0,
            position: [50.0, 100.0, 100.0],
        }
    }
}

impl CameraSection {
    fn validate(&self) -> Result<()> {
        ensure!(
            self.fov > 0.0 && self.fov < 180.0,
            "fov must be between 0 and 180 degrees, got {}",
            self.fov
        );
        ensure!(
            self.near > 0.0 && self.near.is_finite(),
            "near must be positive, got {}",
            self.near
        );
        ensure!(
            self.far > self.near,
            "far ({}) must be greater than near ({})",
            self.far,
            self.near
        );
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsSection {
    pub enabled: bool,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
}

impl Default for ControlsSection {
    fn default() -> Self {
        Self {
            enabled: true,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            pan_speed: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSection {
    pub path: PathBuf,
    pub position: [f32; 3],
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("computer.glb"),
            position: [0.0, 0.0, 0.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HemisphereSection {
    pub sky: u32,
    pub ground: u32,
    pub intensity: f32,
}

impl Default for HemisphereSection {
    fn default() -> Self {
        Self {
            sky: 0xddeeff,
            ground: 0x202020,
            intensity: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectionalSection {
    pub color: u32,
    pub intensity: f32,
    pub position: [f32; 3],
}

impl Default for DirectionalSection {
    fn default() -> Self {
        Self {
            color: 0xffffff,
            intensity: 5.0,
            position: [10.0, 10.0, 10.0],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightsSection {
    pub hemisphere: HemisphereSection,
    pub directional: DirectionalSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlaySection {
    pub enabled: bool,
}

impl Default for OverlaySection {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub window: WindowSection,
    pub scene: SceneSection,
    pub camera: CameraSection,
    pub controls: ControlsSection,
    pub model: ModelSection,
    pub lights: LightsSection,
    pub overlay: OverlaySection,
}

impl AppConfig {
    /// Reads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("{} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.camera.validate().context("invalid [camera] section")?;
        Ok(config)
    }

    pub fn viewer(&self) -> ViewerConfig {
        let hemi = &self.lights.hemisphere;
        let dir = &self.lights.directional;
        ViewerConfig {
            background: self.scene.background,
            fov_y_degrees: self.camera.fov,
            near: self.camera.near,
            far: self.camera.far,
            camera_position: Vec3::from_array(self.camera.position),
            controls: ControlsConfig {
                enabled: self.controls.enabled,
                rotate_speed: self.controls.rotate_speed,
                zoom_speed: self.controls.zoom_speed,
                pan_speed: self.controls.pan_speed,
            },
            model_path: self.model.path.clone(),
            model_position: Vec3::from_array(self.model.position),
            lights: vec![
                Light::hemisphere(hemi.sky, hemi.ground, hemi.intensity),
                Light::directional(dir.color, dir.intensity, Vec3::from_array(dir.position)),
            ],
        }
    }
}
