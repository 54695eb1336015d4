//! Capture configuration.
//!
//! [`CaptureConfig`] is the immutable per-session value the manager
//! resolves at every (re)start. [`ArcamdConfig`] layers the daemon's
//! configuration the usual way: optional JSON config file named by
//! `ARCAM_CONFIG`, then `ARCAM_*` environment overrides, then validation.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;

use crate::error::CaptureError;
use crate::pool::DEFAULT_POOL_SLOTS;
use crate::quirk::DeviceProfile;
use crate::{LensFacing, Orientation, PixelFormat, ResolutionPreset};

const DEFAULT_PRESET: ResolutionPreset = ResolutionPreset::P1280x720;
const DEFAULT_LENS_FACING: LensFacing = LensFacing::Front;
const DEFAULT_ORIENTATION: Orientation = Orientation::Portrait;
const DEFAULT_FRAME_RATE: u32 = 30;
const DEFAULT_MANUFACTURER: &str = "generic";
const DEFAULT_MODEL: &str = "devkit";
const DEFAULT_STUB_ROW_PADDING: usize = 8;

/// Per-session capture parameters. Immutable once a session starts; a
/// restart or lens flip resolves a fresh copy.
#[derive(Clone, Debug)]
pub struct CaptureConfig {
    /// Target resolution, named in landscape orientation.
    pub preset: ResolutionPreset,
    /// Initial lens selection; flips toggle it for the session's lifetime.
    pub lens_facing: LensFacing,
    /// Desired frame layout. Only `Yuv420` is supported.
    pub format: PixelFormat,
    /// Rotating buffer count, at least 2.
    pub pool_slots: usize,
    pub frame_rate: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            preset: DEFAULT_PRESET,
            lens_facing: DEFAULT_LENS_FACING,
            format: PixelFormat::Yuv420,
            pool_slots: DEFAULT_POOL_SLOTS,
            frame_rate: DEFAULT_FRAME_RATE,
        }
    }
}

impl CaptureConfig {
    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.pool_slots < 2 {
            return Err(CaptureError::Configuration(format!(
                "pool_slots must be at least 2, got {}",
                self.pool_slots
            )));
        }
        if self.frame_rate == 0 {
            return Err(CaptureError::Configuration(
                "frame_rate must be greater than zero".to_string(),
            ));
        }
        if self.format != PixelFormat::Yuv420 {
            return Err(CaptureError::Configuration(format!(
                "unsupported capture format {:?}",
                self.format
            )));
        }
        Ok(())
    }
}

// -------------------- Daemon configuration --------------------

#[derive(Debug, Deserialize, Default)]
struct ArcamdConfigFile {
    capture: Option<CaptureSectionFile>,
    device: Option<DeviceSectionFile>,
    stub: Option<StubSectionFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CaptureSectionFile {
    preset: Option<String>,
    lens_facing: Option<String>,
    orientation: Option<String>,
    pool_slots: Option<usize>,
    frame_rate: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DeviceSectionFile {
    manufacturer: Option<String>,
    model: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct StubSectionFile {
    torch: Option<bool>,
    row_padding: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ArcamdConfig {
    pub capture: CaptureConfig,
    pub orientation: Orientation,
    pub device: DeviceProfile,
    pub stub_torch: bool,
    pub stub_row_padding: usize,
}

impl ArcamdConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("ARCAM_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ArcamdConfigFile) -> Result<Self> {
        let capture_file = file.capture.unwrap_or_default();
        let capture = CaptureConfig {
            preset: capture_file
                .preset
                .as_deref()
                .map(parse_preset)
                .transpose()?
                .unwrap_or(DEFAULT_PRESET),
            lens_facing: capture_file
                .lens_facing
                .as_deref()
                .map(parse_lens_facing)
                .transpose()?
                .unwrap_or(DEFAULT_LENS_FACING),
            format: PixelFormat::Yuv420,
            pool_slots: capture_file.pool_slots.unwrap_or(DEFAULT_POOL_SLOTS),
            frame_rate: capture_file.frame_rate.unwrap_or(DEFAULT_FRAME_RATE),
        };
        let orientation = capture_file
            .orientation
            .as_deref()
            .map(parse_orientation)
            .transpose()?
            .unwrap_or(DEFAULT_ORIENTATION);
        let device_file = file.device.unwrap_or_default();
        let device = DeviceProfile::new(
            device_file
                .manufacturer
                .unwrap_or_else(|| DEFAULT_MANUFACTURER.to_string()),
            device_file
                .model
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        );
        let stub = file.stub.unwrap_or_default();
        Ok(Self {
            capture,
            orientation,
            device,
            stub_torch: stub.torch.unwrap_or(true),
            stub_row_padding: stub.row_padding.unwrap_or(DEFAULT_STUB_ROW_PADDING),
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(preset) = std::env::var("ARCAM_PRESET") {
            if !preset.trim().is_empty() {
                self.capture.preset = parse_preset(&preset)?;
            }
        }
        if let Ok(lens) = std::env::var("ARCAM_LENS_FACING") {
            if !lens.trim().is_empty() {
                self.capture.lens_facing = parse_lens_facing(&lens)?;
            }
        }
        if let Ok(orientation) = std::env::var("ARCAM_ORIENTATION") {
            if !orientation.trim().is_empty() {
                self.orientation = parse_orientation(&orientation)?;
            }
        }
        if let Ok(slots) = std::env::var("ARCAM_POOL_SLOTS") {
            self.capture.pool_slots = slots
                .parse()
                .map_err(|_| anyhow!("ARCAM_POOL_SLOTS must be an integer"))?;
        }
        if let Ok(rate) = std::env::var("ARCAM_FRAME_RATE") {
            self.capture.frame_rate = rate
                .parse()
                .map_err(|_| anyhow!("ARCAM_FRAME_RATE must be an integer"))?;
        }
        if let Ok(manufacturer) = std::env::var("ARCAM_DEVICE_MANUFACTURER") {
            if !manufacturer.trim().is_empty() {
                self.device.manufacturer = manufacturer;
            }
        }
        if let Ok(model) = std::env::var("ARCAM_DEVICE_MODEL") {
            if !model.trim().is_empty() {
                self.device.model = model;
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        self.capture.validate().map_err(anyhow::Error::new)?;
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<ArcamdConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn parse_preset(value: &str) -> Result<ResolutionPreset> {
    match value.trim().to_lowercase().as_str() {
        "640x480" | "480p" => Ok(ResolutionPreset::P640x480),
        "1280x720" | "720p" => Ok(ResolutionPreset::P1280x720),
        "1920x1080" | "1080p" => Ok(ResolutionPreset::P1920x1080),
        other => Err(anyhow!("unknown resolution preset '{}'", other)),
    }
}

fn parse_orientation(value: &str) -> Result<Orientation> {
    match value.trim().to_lowercase().as_str() {
        "portrait" => Ok(Orientation::Portrait),
        "landscape" => Ok(Orientation::Landscape),
        "reverse-portrait" => Ok(Orientation::ReversePortrait),
        "reverse-landscape" => Ok(Orientation::ReverseLandscape),
        other => Err(anyhow!("unknown orientation '{}'", other)),
    }
}

fn parse_lens_facing(value: &str) -> Result<LensFacing> {
    match value.trim().to_lowercase().as_str() {
        "front" => Ok(LensFacing::Front),
        "rear" | "back" => Ok(LensFacing::Rear),
        other => Err(anyhow!("unknown lens facing '{}'", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(CaptureConfig::default().validate().is_ok());
    }

    #[test]
    fn too_few_pool_slots_is_a_configuration_error() {
        let config = CaptureConfig {
            pool_slots: 1,
            ..CaptureConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CaptureError::Configuration(_))
        ));
    }

    #[test]
    fn zero_frame_rate_is_a_configuration_error() {
        let config = CaptureConfig {
            frame_rate: 0,
            ..CaptureConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CaptureError::Configuration(_))
        ));
    }

    #[test]
    fn non_planar_format_is_a_configuration_error() {
        let config = CaptureConfig {
            format: PixelFormat::Nv12,
            ..CaptureConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CaptureError::Configuration(_))
        ));
    }

    #[test]
    fn preset_aliases_parse() {
        assert_eq!(parse_preset("720p").unwrap(), ResolutionPreset::P1280x720);
        assert_eq!(
            parse_preset("1920x1080").unwrap(),
            ResolutionPreset::P1920x1080
        );
        assert!(parse_preset("8k").is_err());
    }

    #[test]
    fn lens_facing_accepts_back_alias() {
        assert_eq!(parse_lens_facing("back").unwrap(), LensFacing::Rear);
        assert_eq!(parse_lens_facing("Front").unwrap(), LensFacing::Front);
        assert!(parse_lens_facing("sideways").is_err());
    }
}
