use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ingest::Origin;
use crate::logbook::TriggerRule;

const DEFAULT_LOG_PATH: &str = "violations.csv";
const DEFAULT_MODEL_PATH: &str = "stub://ppe";
const DEFAULT_SOURCE_KIND: &str = "stream";
const DEFAULT_SOURCE_LOCATOR: &str = "stub://front_camera";
const DEFAULT_TRIGGER_SUBSTRING: &str = "NO";
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
const DEFAULT_PACING_MS: u64 = 30;
const DEFAULT_SOURCE_FPS: u32 = 10;
const DEFAULT_SOURCE_WIDTH: u32 = 640;
const DEFAULT_SOURCE_HEIGHT: u32 = 480;

#[derive(Debug, Deserialize, Default)]
struct SentinelConfigFile {
    log_path: Option<String>,
    source: Option<SourceConfigFile>,
    detector: Option<DetectorConfigFile>,
    trigger: Option<TriggerConfigFile>,
    pacing_ms: Option<u64>,
    alert_command: Option<AlertConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    kind: Option<String>,
    locator: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    model_path: Option<String>,
    confidence_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct TriggerConfigFile {
    substring: Option<String>,
    allowlist: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
struct AlertConfigFile {
    program: Option<String>,
    args: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct SentinelConfig {
    pub log_path: PathBuf,
    pub source: SourceProfile,
    pub detector: DetectorSettings,
    pub trigger: TriggerRule,
    pub pacing: Duration,
    pub alert_command: Option<AlertSettings>,
}

#[derive(Debug, Clone)]
pub struct SourceProfile {
    pub kind: String,
    pub locator: String,
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub model_path: String,
    pub confidence_threshold: f32,
}

#[derive(Debug, Clone)]
pub struct AlertSettings {
    pub program: String,
    pub args: Vec<String>,
}

impl SentinelConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SENTINEL_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: SentinelConfigFile) -> Self {
        let log_path = PathBuf::from(
            file.log_path
                .unwrap_or_else(|| DEFAULT_LOG_PATH.to_string()),
        );
        let source = SourceProfile {
            kind: file
                .source
                .as_ref()
                .and_then(|source| source.kind.clone())
                .unwrap_or_else(|| DEFAULT_SOURCE_KIND.to_string()),
            locator: file
                .source
                .as_ref()
                .and_then(|source| source.locator.clone())
                .unwrap_or_else(|| DEFAULT_SOURCE_LOCATOR.to_string()),
            target_fps: file
                .source
                .as_ref()
                .and_then(|source| source.target_fps)
                .unwrap_or(DEFAULT_SOURCE_FPS),
            width: file
                .source
                .as_ref()
                .and_then(|source| source.width)
                .unwrap_or(DEFAULT_SOURCE_WIDTH),
            height: file
                .source
                .as_ref()
                .and_then(|source| source.height)
                .unwrap_or(DEFAULT_SOURCE_HEIGHT),
        };
        let detector = DetectorSettings {
            model_path: file
                .detector
                .as_ref()
                .and_then(|detector| detector.model_path.clone())
                .unwrap_or_else(|| DEFAULT_MODEL_PATH.to_string()),
            confidence_threshold: file
                .detector
                .and_then(|detector| detector.confidence_threshold)
                .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
        };
        let trigger = match file.trigger {
            Some(TriggerConfigFile {
                allowlist: Some(labels),
                ..
            }) if !labels.is_empty() => TriggerRule::Allowlist(labels),
            Some(TriggerConfigFile {
                substring: Some(substring),
                ..
            }) => TriggerRule::LabelSubstring(substring),
            _ => TriggerRule::LabelSubstring(DEFAULT_TRIGGER_SUBSTRING.to_string()),
        };
        let pacing = Duration::from_millis(file.pacing_ms.unwrap_or(DEFAULT_PACING_MS));
        let alert_command = file.alert_command.and_then(|alert| {
            alert.program.map(|program| AlertSettings {
                program,
                args: alert.args.unwrap_or_default(),
            })
        });
        Self {
            log_path,
            source,
            detector,
            trigger,
            pacing,
            alert_command,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("SENTINEL_LOG_PATH") {
            if !path.trim().is_empty() {
                self.log_path = PathBuf::from(path);
            }
        }
        if let Ok(kind) = std::env::var("SENTINEL_SOURCE_KIND") {
            if !kind.trim().is_empty() {
                self.source.kind = kind;
            }
        }
        if let Ok(locator) = std::env::var("SENTINEL_SOURCE_LOCATOR") {
            if !locator.trim().is_empty() {
                self.source.locator = locator;
            }
        }
        if let Ok(model) = std::env::var("SENTINEL_MODEL_PATH") {
            if !model.trim().is_empty() {
                self.detector.model_path = model;
            }
        }
        if let Ok(substring) = std::env::var("SENTINEL_TRIGGER_SUBSTRING") {
            if !substring.trim().is_empty() {
                self.trigger = TriggerRule::LabelSubstring(substring);
            }
        }
        if let Ok(pacing) = std::env::var("SENTINEL_PACING_MS") {
            let millis: u64 = pacing
                .parse()
                .map_err(|_| anyhow!("SENTINEL_PACING_MS must be an integer number of ms"))?;
            self.pacing = Duration::from_millis(millis);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.detector.confidence_threshold) {
            return Err(anyhow!(
                "confidence threshold {} must be within [0, 1]",
                self.detector.confidence_threshold
            ));
        }
        if self.source.target_fps == 0 {
            return Err(anyhow!("source target_fps must be greater than zero"));
        }
        if let TriggerRule::LabelSubstring(substring) = &self.trigger {
            if substring.is_empty() {
                return Err(anyhow!("trigger substring must not be empty"));
            }
        }
        self.origin()?;
        Ok(())
    }

    /// Resolve the source profile into an ingestion origin.
    pub fn origin(&self) -> Result<Origin> {
        match self.source.kind.as_str() {
            "file" => Ok(Origin::File(PathBuf::from(&self.source.locator))),
            "camera" => {
                let index: u32 = self.source.locator.parse().map_err(|_| {
                    anyhow!(
                        "camera locator '{}' must be a device index",
                        self.source.locator
                    )
                })?;
                Ok(Origin::Camera(index))
            }
            "stream" => Ok(Origin::Stream(self.source.locator.clone())),
            "image" => Ok(Origin::Image(PathBuf::from(&self.source.locator))),
            other => Err(anyhow!(
                "unknown source kind '{}', expected file|camera|stream|image",
                other
            )),
        }
    }
}

fn read_config_file(path: &Path) -> Result<SentinelConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
