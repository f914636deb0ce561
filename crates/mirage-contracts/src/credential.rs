use std::fmt;

use crate::error::{MirageError, Result};

/// A fal.ai credential in `key_id:key_secret` form; Display and Debug redact
/// the secret half.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey {
    key_id: String,
    key_secret: String,
}

impl ApiKey {
    pub fn parse(raw: &str) -> Result<Self> {
        let (key_id, key_secret) = raw
            .trim()
            .split_once(':')
            .ok_or_else(Self::shape_error)?;
        let key_id = key_id.trim();
        let key_secret = key_secret.trim();
        if key_id.is_empty() || key_secret.is_empty() {
            return Err(Self::shape_error());
        }
        Ok(Self {
            key_id: key_id.to_string(),
            key_secret: key_secret.to_string(),
        })
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn header_value(&self) -> String {
        format!("Key {}:{}", self.key_id, self.key_secret)
    }

    fn shape_error() -> MirageError {
        MirageError::validation("API key must have the shape key_id:key_secret")
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:***", self.key_id)
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKey")
            .field("key_id", &self.key_id)
            .field("key_secret", &"***")
            .finish()
    }
}
