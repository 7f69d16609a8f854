//! Studio configuration.
//!
//! Defaults match the stock setup; a handful of `CAMQUAD_*` environment
//! variables can override them at startup.

use std::str::FromStr;

use crate::filter::FilterEngine;

/// Requested capture mode. The device may choose the closest mode it supports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraConfig {
    pub index: u32,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            width: 1280,
            height: 720,
            fps: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SourceKind {
    #[default]
    Camera,
    /// Synthetic frames; no device needed.
    TestPattern,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudioConfig {
    pub camera: CameraConfig,
    pub source: SourceKind,
    /// Pixelate tile edge, pixels.
    pub tile_size: u32,
    pub window_title: String,
    pub window_size: (u32, u32),
    /// Linear RGB.
    pub clear_color: [f64; 3],
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            source: SourceKind::default(),
            tile_size: FilterEngine::DEFAULT_TILE_SIZE,
            window_title: "Real-time Video Processing".to_string(),
            window_size: (1024, 768),
            clear_color: [0.1, 0.1, 0.2],
        }
    }
}

impl StudioConfig {
    /// Defaults with overrides from the process environment.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides looked up through `var`. Values that do not parse are
    /// reported and skipped.
    pub fn with_overrides<F>(mut self, var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        override_parsed(&var, "CAMQUAD_CAMERA", &mut self.camera.index);
        override_parsed(&var, "CAMQUAD_WIDTH", &mut self.camera.width);
        override_parsed(&var, "CAMQUAD_HEIGHT", &mut self.camera.height);
        override_parsed(&var, "CAMQUAD_TILE", &mut self.tile_size);

        if let Some(raw) = var("CAMQUAD_SOURCE") {
            match raw.trim().to_ascii_lowercase().as_str() {
                "camera" => self.source = SourceKind::Camera,
                "test" | "pattern" => self.source = SourceKind::TestPattern,
                other => log::warn!("CAMQUAD_SOURCE: unknown source `{other}`; using {:?}", self.source),
            }
        }

        if self.tile_size == 0 {
            log::warn!("CAMQUAD_TILE must be positive; using {}", FilterEngine::DEFAULT_TILE_SIZE);
            self.tile_size = FilterEngine::DEFAULT_TILE_SIZE;
        }
        self
    }
}

fn override_parsed<F, T>(var: &F, key: &str, slot: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + std::fmt::Display,
{
    let Some(raw) = var(key) else { return };
    match raw.trim().parse::<T>() {
        Ok(value) => *slot = value,
        Err(_) => log::warn!("{key}: cannot parse `{raw}`; keeping {slot}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let c = StudioConfig::default();
        assert_eq!(c.camera, CameraConfig { index: 0, width: 1280, height: 720, fps: 30 });
        assert_eq!(c.tile_size, 10);
        assert_eq!(c.window_size, (1024, 768));
        assert_eq!(c.window_title, "Real-time Video Processing");
        assert_eq!(c.source, SourceKind::Camera);
    }

    #[test]
    fn overrides_apply() {
        let c = StudioConfig::default().with_overrides(env(&[
            ("CAMQUAD_CAMERA", "2"),
            ("CAMQUAD_WIDTH", " 640 "),
            ("CAMQUAD_HEIGHT", "480"),
            ("CAMQUAD_TILE", "16"),
            ("CAMQUAD_SOURCE", "test"),
        ]));
        assert_eq!(c.camera.index, 2);
        assert_eq!((c.camera.width, c.camera.height), (640, 480));
        assert_eq!(c.tile_size, 16);
        assert_eq!(c.source, SourceKind::TestPattern);
    }

    #[test]
    fn bad_values_are_ignored() {
        let c = StudioConfig::default().with_overrides(env(&[
            ("CAMQUAD_WIDTH", "wide"),
            ("CAMQUAD_TILE", "0"),
            ("CAMQUAD_SOURCE", "vhs"),
        ]));
        assert_eq!(c.camera.width, 1280);
        assert_eq!(c.tile_size, 10);
        assert_eq!(c.source, SourceKind::Camera);
    }
}
