use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{MirageError, Result};
use crate::modes::{ModeSpec, OutputKind};

pub const UNKNOWN_SEED_LABEL: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub url: String,
    pub kind: OutputKind,
    pub seed: Option<i64>,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expanded_prompt: Option<String>,
    pub mode: String,
    pub created_at: String,
}

impl ResultRecord {
    pub fn seed_label(&self) -> String {
        match self.seed {
            Some(seed) => seed.to_string(),
            None => UNKNOWN_SEED_LABEL.to_string(),
        }
    }
}

pub fn normalize_response(
    mode: &ModeSpec,
    response: &Value,
    original_prompt: &str,
) -> Result<ResultRecord> {
    let url = match mode.output {
        OutputKind::Video => response
            .get("video")
            .and_then(|video| video.get("url"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| MirageError::malformed("no video.url in the response"))?,
        OutputKind::Image => response
            .get("images")
            .and_then(Value::as_array)
            .and_then(|images| images.first())
            .and_then(|image| image.get("url"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| MirageError::malformed("no images[0].url in the response"))?,
    };

    let expanded_prompt = match mode.output {
        OutputKind::Video => response
            .get("actual_prompt")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string),
        OutputKind::Image => None,
    };

    Ok(ResultRecord {
        url: url.to_string(),
        kind: mode.output,
        seed: response.get("seed").and_then(Value::as_i64),
        prompt: original_prompt.to_string(),
        expanded_prompt,
        mode: mode.name.clone(),
        created_at: now_utc_iso(),
    })
}

/// Finished generations, newest first.
#[derive(Debug, Clone, Default)]
pub struct SessionHistory {
    records: Vec<ResultRecord>,
}

impl SessionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prepend(&mut self, record: ResultRecord) {
        self.records.insert(0, record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Newest to oldest.
    pub fn iter(&self) -> impl Iterator<Item = &ResultRecord> {
        self.records.iter()
    }

    pub fn latest(&self) -> Option<&ResultRecord> {
        self.records.first()
    }

    /// Index 0 is the newest record.
    pub fn get(&self, index: usize) -> Option<&ResultRecord> {
        self.records.get(index)
    }
}

fn now_utc_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, false)
}
