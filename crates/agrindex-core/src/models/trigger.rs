//! Inbound trigger: the storage location of a field-boundary document

use serde::Deserialize;

use crate::error::{AgrindexError, Result};

/// Bucket and decoded key of the document that triggered a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerRef {
    pub bucket: String,
    pub key: String,
}

impl TriggerRef {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self { bucket: bucket.into(), key: key.into() }
    }

    /// Parse the first record of a storage event notification.
    ///
    /// Event keys arrive form-encoded (`+` for space, `%XX` escapes).
    pub fn from_event_json(event: &str) -> Result<Self> {
        let event: StorageEvent =
            serde_json::from_str(event).map_err(|e| AgrindexError::MalformedTrigger {
                reason: format!("not a storage event: {}", e),
            })?;

        let record = event.records.into_iter().next().ok_or_else(|| {
            AgrindexError::MalformedTrigger { reason: "event has no records".to_string() }
        })?;

        let key = decode_event_key(&record.s3.object.key)?;
        Ok(Self::new(record.s3.bucket.name, key))
    }

    /// The key without its `.geojson` suffix (or other extension)
    pub fn file_stem(&self) -> &str {
        if let Some(stem) = self.key.strip_suffix(".geojson") {
            return stem;
        }
        let name_start = self.key.rfind('/').map(|i| i + 1).unwrap_or(0);
        match self.key[name_start..].rfind('.') {
            Some(dot) if dot > 0 => &self.key[..name_start + dot],
            _ => &self.key,
        }
    }

    /// Base execution identity: the stem with each whitespace run replaced by `_`
    pub fn base_execution_identity(&self) -> String {
        let mut identity = String::with_capacity(self.key.len());
        let mut in_space = false;
        for c in self.file_stem().chars() {
            if c.is_whitespace() {
                if !in_space {
                    identity.push('_');
                }
                in_space = true;
            } else {
                identity.push(c);
                in_space = false;
            }
        }
        identity
    }
}

fn decode_event_key(raw: &str) -> Result<String> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|key| key.into_owned())
        .map_err(|e| AgrindexError::MalformedTrigger {
            reason: format!("object key is not valid UTF-8 after decoding: {}", e),
        })
}

#[derive(Debug, Deserialize)]
struct StorageEvent {
    #[serde(rename = "Records", default)]
    records: Vec<StorageRecord>,
}

#[derive(Debug, Deserialize)]
struct StorageRecord {
    s3: StorageEntity,
}

#[derive(Debug, Deserialize)]
struct StorageEntity {
    bucket: StorageBucket,
    object: StorageObject,
}

#[derive(Debug, Deserialize)]
struct StorageBucket {
    name: String,
}

#[derive(Debug, Deserialize)]
struct StorageObject {
    key: String,
}
