use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

const DEFAULT_THRESHOLD: f32 = 0.4;
const DEFAULT_SOURCE_KIND: SourceKind = SourceKind::Camera;
const DEFAULT_INPUT: &str = "stub://cam";
const DEFAULT_BACKEND: &str = "stub";
const DEFAULT_OUTPUT_DIR: &str = "helmwatch_out";
const DEFAULT_MODEL_INPUT: (u32, u32) = (640, 640);

/// Which kind of frame source a session runs over.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Image,
    Video,
    Directory,
    Camera,
}

impl FromStr for SourceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(SourceKind::Image),
            "video" => Ok(SourceKind::Video),
            "directory" | "dir" | "folder" => Ok(SourceKind::Directory),
            "camera" | "cam" | "live" => Ok(SourceKind::Camera),
            other => Err(anyhow!(
                "unknown source kind '{}', expected image|video|directory|camera",
                other
            )),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct HelmwatchConfigFile {
    confidence_threshold: Option<f32>,
    source: Option<String>,
    input: Option<String>,
    display_size: Option<String>,
    backend: Option<String>,
    model_path: Option<String>,
    model_input: Option<String>,
    output: Option<String>,
}

/// Resolved runtime configuration: config file, then env overrides, then
/// validation. CLI flags are applied on top by the binary.
#[derive(Debug, Clone)]
pub struct HelmwatchConfig {
    /// Detections pass only strictly above this. Range (0, 1].
    pub confidence_threshold: f32,
    pub source_kind: SourceKind,
    /// Path, directory, camera index, or stub:// origin, per source kind.
    pub input: String,
    /// Fixed presentation size for annotated output, e.g. 1280x720.
    pub display_size: Option<(u32, u32)>,
    /// Detector backend name ("stub" or "tract").
    pub backend: String,
    /// ONNX model path for the tract backend.
    pub model_path: Option<String>,
    /// Model input size for the tract backend.
    pub model_input: (u32, u32),
    /// Output directory for the PNG sink.
    pub output: String,
}

impl HelmwatchConfig {
    /// Load from the optional `HELMWATCH_CONFIG` JSON file plus
    /// `HELMWATCH_*` env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("HELMWATCH_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: HelmwatchConfigFile) -> Result<Self> {
        let source_kind = match file.source.as_deref() {
            Some(kind) => kind.parse()?,
            None => DEFAULT_SOURCE_KIND,
        };
        let display_size = file
            .display_size
            .as_deref()
            .map(parse_display_size)
            .transpose()?;
        let model_input = file
            .model_input
            .as_deref()
            .map(parse_display_size)
            .transpose()?
            .unwrap_or(DEFAULT_MODEL_INPUT);
        Ok(Self {
            confidence_threshold: file.confidence_threshold.unwrap_or(DEFAULT_THRESHOLD),
            source_kind,
            input: file.input.unwrap_or_else(|| DEFAULT_INPUT.to_string()),
            display_size,
            backend: file.backend.unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
            model_path: file.model_path,
            model_input,
            output: file.output.unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string()),
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(value) = std::env::var("HELMWATCH_THRESHOLD") {
            self.confidence_threshold = value
                .parse()
                .map_err(|_| anyhow!("HELMWATCH_THRESHOLD must be a number"))?;
        }
        if let Ok(value) = std::env::var("HELMWATCH_SOURCE") {
            if !value.trim().is_empty() {
                self.source_kind = value.parse()?;
            }
        }
        if let Ok(value) = std::env::var("HELMWATCH_INPUT") {
            if !value.trim().is_empty() {
                self.input = value;
            }
        }
        if let Ok(value) = std::env::var("HELMWATCH_DISPLAY_SIZE") {
            if !value.trim().is_empty() {
                self.display_size = Some(parse_display_size(&value)?);
            }
        }
        if let Ok(value) = std::env::var("HELMWATCH_BACKEND") {
            if !value.trim().is_empty() {
                self.backend = value;
            }
        }
        if let Ok(value) = std::env::var("HELMWATCH_MODEL") {
            if !value.trim().is_empty() {
                self.model_path = Some(value);
            }
        }
        if let Ok(value) = std::env::var("HELMWATCH_OUTPUT") {
            if !value.trim().is_empty() {
                self.output = value;
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if !(self.confidence_threshold > 0.0 && self.confidence_threshold <= 1.0) {
            return Err(anyhow!(
                "confidence threshold {} out of range (0, 1]",
                self.confidence_threshold
            ));
        }
        match self.backend.as_str() {
            "stub" => {}
            "tract" => {
                if self.model_path.is_none() {
                    return Err(anyhow!("backend 'tract' requires a model path"));
                }
            }
            other => return Err(anyhow!("unknown backend '{}'", other)),
        }
        if self.input.trim().is_empty() {
            return Err(anyhow!("input must not be empty"));
        }
        Ok(())
    }
}

/// Resolve the `camera_index_or_path` convention: an all-digit value is a
/// device index ("0" -> /dev/video0), anything else is a device path or
/// stub:// origin used verbatim.
pub fn camera_device(input: &str) -> String {
    let trimmed = input.trim();
    if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        format!("/dev/video{trimmed}")
    } else {
        trimmed.to_string()
    }
}

/// Parse "WIDTHxHEIGHT" (e.g. "1280x720").
pub fn parse_display_size(value: &str) -> Result<(u32, u32)> {
    let (w, h) = value
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| anyhow!("display size must look like 1280x720, got '{}'", value))?;
    let width: u32 = w
        .parse()
        .map_err(|_| anyhow!("invalid display width '{}'", w))?;
    let height: u32 = h
        .parse()
        .map_err(|_| anyhow!("invalid display height '{}'", h))?;
    if width == 0 || height == 0 {
        return Err(anyhow!("display size must be non-zero"));
    }
    Ok((width, height))
}

fn read_config_file(path: &Path) -> Result<HelmwatchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
