use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::error::{MirageError, Result};
use crate::modes::{
    FieldRule, ModeSpec, ASPECT_RATIOS, DEFAULT_NEGATIVE_PROMPT, DURATIONS, FRAME_SIZES,
    RESOLUTIONS,
};

/// Seed sentinel for "let the service pick"; the field is omitted entirely.
pub const RANDOM_SEED: i64 = -1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationForm {
    pub prompt: String,
    pub negative_prompt: String,
    pub seed: i64,
    pub aspect_ratio: String,
    pub resolution: String,
    pub duration: String,
    pub enable_prompt_expansion: bool,
    pub audio_url: Option<String>,
    pub frame_size: String,
    pub strength: f64,
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for GenerationForm {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            negative_prompt: DEFAULT_NEGATIVE_PROMPT.to_string(),
            seed: RANDOM_SEED,
            aspect_ratio: ASPECT_RATIOS[0].to_string(),
            resolution: RESOLUTIONS[0].to_string(),
            duration: DURATIONS[0].to_string(),
            enable_prompt_expansion: true,
            audio_url: None,
            frame_size: FRAME_SIZES[0].to_string(),
            strength: 0.8,
            api_key: None,
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct StagedBytes {
    pub data: Vec<u8>,
    pub content_type: String,
}

impl fmt::Debug for StagedBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagedBytes")
            .field("len", &self.data.len())
            .field("content_type", &self.content_type)
            .finish()
    }
}

/// A public URL or raw bytes pending upload, last write wins; the URL
/// outranks bytes at resolution time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedImage {
    pub url: Option<String>,
    pub bytes: Option<StagedBytes>,
}

impl StagedImage {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            bytes: None,
        }
    }

    pub fn from_bytes(data: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            url: None,
            bytes: Some(StagedBytes {
                data,
                content_type: content_type.into(),
            }),
        }
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = Some(url.into());
        self.bytes = None;
    }

    pub fn set_bytes(&mut self, data: Vec<u8>, content_type: impl Into<String>) {
        self.bytes = Some(StagedBytes {
            data,
            content_type: content_type.into(),
        });
        self.url = None;
    }

    pub fn clear(&mut self) {
        self.url = None;
        self.bytes = None;
    }

    pub fn is_empty(&self) -> bool {
        self.url.is_none() && self.bytes.is_none()
    }

    pub fn describe(&self) -> String {
        match (&self.url, &self.bytes) {
            (Some(url), _) => url.clone(),
            (None, Some(bytes)) if bytes.content_type.is_empty() => {
                format!("{} bytes", bytes.data.len())
            }
            (None, Some(bytes)) => format!("{} bytes ({})", bytes.data.len(), bytes.content_type),
            (None, None) => "none".to_string(),
        }
    }
}

pub fn build_request(
    mode: &ModeSpec,
    form: &GenerationForm,
    staged: &StagedImage,
) -> Result<Map<String, Value>> {
    let prompt = form.prompt.trim();
    if prompt.is_empty() {
        return Err(MirageError::validation("a prompt is required"));
    }
    if mode.requires_image() && staged.is_empty() {
        return Err(MirageError::validation(format!(
            "{} needs an input image: stage a URL or raw bytes first",
            mode.name
        )));
    }

    let mut payload = Map::new();
    payload.insert("prompt".to_string(), Value::String(prompt.to_string()));

    let negative = form.negative_prompt.trim();
    if !negative.is_empty() {
        payload.insert(
            "negative_prompt".to_string(),
            Value::String(negative.to_string()),
        );
    }
    if form.seed != RANDOM_SEED {
        if form.seed < 0 {
            return Err(MirageError::validation(format!(
                "seed must be {RANDOM_SEED} (random) or a non-negative integer, got {}",
                form.seed
            )));
        }
        payload.insert("seed".to_string(), Value::Number(form.seed.into()));
    }

    for rule in mode.field_rules() {
        apply_rule(*rule, form, &mut payload)?;
    }

    // Always disabled, every mode, every submission; not user-configurable.
    payload.insert("enable_safety_checker".to_string(), Value::Bool(false));

    Ok(payload)
}

fn apply_rule(
    rule: FieldRule,
    form: &GenerationForm,
    payload: &mut Map<String, Value>,
) -> Result<()> {
    match rule {
        FieldRule::AspectRatio => {
            payload.insert(
                "aspect_ratio".to_string(),
                Value::String(form.aspect_ratio.clone()),
            );
        }
        FieldRule::Resolution => {
            payload.insert(
                "resolution".to_string(),
                Value::String(form.resolution.clone()),
            );
        }
        FieldRule::Duration => {
            // String-encoded seconds, per the endpoint contract.
            payload.insert("duration".to_string(), Value::String(form.duration.clone()));
        }
        FieldRule::PromptExpansion => {
            payload.insert(
                "enable_prompt_expansion".to_string(),
                Value::Bool(form.enable_prompt_expansion),
            );
        }
        FieldRule::AudioUrl => {
            let audio = form
                .audio_url
                .as_deref()
                .map(str::trim)
                .filter(|url| !url.is_empty());
            if let Some(url) = audio {
                payload.insert("audio_url".to_string(), Value::String(url.to_string()));
            }
        }
        FieldRule::FrameDims => {
            let (width, height) = parse_frame_size(&form.frame_size)?;
            payload.insert("width".to_string(), Value::Number(width.into()));
            payload.insert("height".to_string(), Value::Number(height.into()));
        }
        FieldRule::Strength => {
            if !form.strength.is_finite() || !(0.0..=1.0).contains(&form.strength) {
                return Err(MirageError::validation(format!(
                    "strength must be between 0.0 and 1.0, got {}",
                    form.strength
                )));
            }
            let strength = Number::from_f64(form.strength)
                .ok_or_else(|| MirageError::validation("strength is not representable"))?;
            payload.insert("strength".to_string(), Value::Number(strength));
        }
        FieldRule::ImageSlot => {}
    }
    Ok(())
}

pub fn merge_image_url(payload: &mut Map<String, Value>, url: &str) {
    payload.insert("image_url".to_string(), Value::String(url.to_string()));
}

pub fn parse_frame_size(selection: &str) -> Result<(u32, u32)> {
    let token = selection.split_whitespace().next().unwrap_or("");
    let parsed = token.split_once('x').and_then(|(width, height)| {
        let width = width.trim().parse::<u32>().ok()?;
        let height = height.trim().parse::<u32>().ok()?;
        (width > 0 && height > 0).then_some((width, height))
    });
    parsed.ok_or_else(|| {
        MirageError::validation(format!(
            "frame size must look like 1280x720, got {selection:?}"
        ))
    })
}
