//! Settings management for Prisma Server
//!
//! Handles loading/saving of the XML settings file and environment overrides.

use quick_xml::de::from_str;
use quick_xml::se::to_string;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default prompt used for the installation's stylization
pub const DEFAULT_PROMPT: &str = "A futuristic human figure inspired by Da Vinci's Vitruvian Man, \
reimagined through neon-lit cybernetic anatomy, radiating blue and teal energy, with futuristic \
neon circular patterns in the background, advanced technology aesthetic, sharp details";

/// Network and asset settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Bind address
    #[serde(rename = "host")]
    pub host: String,

    /// HTTP/WebSocket port
    #[serde(rename = "port")]
    pub port: u16,

    /// Directory served under /static
    #[serde(rename = "staticDir")]
    pub static_dir: String,

    /// Directory holding the ONNX tracking models
    #[serde(rename = "modelDir")]
    pub model_dir: String,

    /// JPEG quality for transformed results (1-100)
    #[serde(rename = "jpegQuality")]
    pub jpeg_quality: u8,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            static_dir: "static".to_string(),
            model_dir: "models".to_string(),
            jpeg_quality: 85,
        }
    }
}

/// Regeneration timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegenerationSection {
    /// Seconds between auto-regenerations
    #[serde(rename = "intervalSecs")]
    pub interval_secs: u64,

    /// Wake-up period of the regeneration loop in milliseconds
    #[serde(rename = "tickMillis")]
    pub tick_millis: u64,

    /// Whether auto-regeneration starts enabled
    #[serde(rename = "autoRegenerate")]
    pub auto_regenerate: bool,
}

impl Default for RegenerationSection {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            tick_millis: 1000,
            auto_regenerate: true,
        }
    }
}

impl RegenerationSection {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_millis)
    }
}

/// Body tracking and mask post-processing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingSection {
    /// Foreground probability above which a pixel belongs to the person
    #[serde(rename = "maskThreshold")]
    pub mask_threshold: f32,

    /// Landmarks at or below this visibility are not reported
    #[serde(rename = "visibilityThreshold")]
    pub visibility_threshold: f32,

    /// Minimum pose presence score for a pose to count
    #[serde(rename = "minPoseConfidence")]
    pub min_pose_confidence: f32,

    /// Square kernel size for mask close/open (odd)
    #[serde(rename = "morphKernel")]
    pub morph_kernel: u32,

    /// ONNX Runtime intra-op threads
    #[serde(rename = "intraThreads")]
    pub intra_threads: usize,
}

impl Default for TrackingSection {
    fn default() -> Self {
        Self {
            mask_threshold: 0.5,
            visibility_threshold: 0.5,
            min_pose_confidence: 0.5,
            morph_kernel: 5,
            intra_threads: 2,
        }
    }
}

/// Diffusion service parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffusionSection {
    /// img2img endpoint URL
    #[serde(rename = "endpoint")]
    pub endpoint: String,

    /// Checkpoint requested from the service
    #[serde(rename = "modelId")]
    pub model_id: String,

    /// Base prompt
    #[serde(rename = "prompt")]
    pub prompt: String,

    /// How far the result may drift from the input (0-1)
    #[serde(rename = "strength")]
    pub strength: f32,

    /// Prompt adherence
    #[serde(rename = "guidanceScale")]
    pub guidance_scale: f32,

    /// Working width
    #[serde(rename = "width")]
    pub width: u32,

    /// Working height
    #[serde(rename = "height")]
    pub height: u32,

    /// Inference steps for the very first generation
    #[serde(rename = "firstRunSteps")]
    pub first_run_steps: u32,

    /// Inference steps afterwards
    #[serde(rename = "steps")]
    pub steps: u32,

    /// HTTP request timeout in seconds
    #[serde(rename = "timeoutSecs")]
    pub timeout_secs: u64,
}

impl Default for DiffusionSection {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:7860/sdapi/v1/img2img".to_string(),
            model_id: "runwayml/stable-diffusion-v1-5".to_string(),
            prompt: DEFAULT_PROMPT.to_string(),
            strength: 0.75,
            guidance_scale: 7.5,
            width: 512,
            height: 512,
            first_run_steps: 15,
            steps: 30,
            timeout_secs: 120,
        }
    }
}

/// Complete server settings stored in settings.xml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename = "PrismaSettings", default)]
pub struct ServerSettings {
    #[serde(rename = "server")]
    pub server: ServerSection,

    #[serde(rename = "regeneration")]
    pub regeneration: RegenerationSection,

    #[serde(rename = "tracking")]
    pub tracking: TrackingSection,

    #[serde(rename = "diffusion")]
    pub diffusion: DiffusionSection,
}

impl ServerSettings {
    /// Default settings file location in the user config directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("PrismaServer");
            p.push("settings.xml");
            p
        })
    }

    /// Load settings from an explicit path, the default location, or defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self, SettingsError> {
        let mut settings = match explicit {
            Some(path) => Self::load_from_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::load_from_file(&path)?,
                None => Self::default(),
            },
        };
        settings.apply_env_overrides(|key| std::env::var(key).ok());
        settings.clamp();
        Ok(settings)
    }

    /// Load settings from an XML file
    pub fn load_from_file(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path).map_err(SettingsError::Io)?;
        Self::from_xml(&contents)
    }

    /// Parse settings from XML text
    pub fn from_xml(contents: &str) -> Result<Self, SettingsError> {
        let mut settings: Self = from_str(contents).map_err(SettingsError::XmlParse)?;
        settings.clamp();
        Ok(settings)
    }

    /// Save settings to an XML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), SettingsError> {
        let xml = to_string(self).map_err(SettingsError::XmlWrite)?;
        let formatted = format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}", xml);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(SettingsError::Io)?;
            }
        }
        fs::write(path, formatted).map_err(SettingsError::Io)?;
        Ok(())
    }

    /// Apply PRISMA_* overrides from the given lookup
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("PRISMA_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PRISMA_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid PRISMA_PORT"),
            }
        }
        if let Some(url) = lookup("PRISMA_DIFFUSION_URL") {
            self.diffusion.endpoint = url;
        }
        if let Some(dir) = lookup("PRISMA_MODEL_DIR") {
            self.server.model_dir = dir;
        }
    }

    /// Clamp values into their valid ranges
    pub fn clamp(&mut self) {
        self.server.jpeg_quality = self.server.jpeg_quality.clamp(1, 100);
        self.regeneration.interval_secs = self.regeneration.interval_secs.max(1);
        self.regeneration.tick_millis = self.regeneration.tick_millis.clamp(50, 10_000);
        self.tracking.mask_threshold = self.tracking.mask_threshold.clamp(0.0, 1.0);
        self.tracking.visibility_threshold = self.tracking.visibility_threshold.clamp(0.0, 1.0);
        self.tracking.min_pose_confidence = self.tracking.min_pose_confidence.clamp(0.0, 1.0);
        self.tracking.morph_kernel = self.tracking.morph_kernel.clamp(1, 15) | 1;
        self.tracking.intra_threads = self.tracking.intra_threads.max(1);
        self.diffusion.strength = self.diffusion.strength.clamp(0.0, 1.0);
        self.diffusion.width = self.diffusion.width.max(64);
        self.diffusion.height = self.diffusion.height.max(64);
        self.diffusion.first_run_steps = self.diffusion.first_run_steps.max(1);
        self.diffusion.steps = self.diffusion.steps.max(1);
        self.diffusion.timeout_secs = self.diffusion.timeout_secs.max(1);
    }
}

/// Settings-related errors
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(std::io::Error),
    #[error("XML parse error: {0}")]
    XmlParse(quick_xml::DeError),
    #[error("XML write error: {0}")]
    XmlWrite(quick_xml::SeError),
}
