//! The selection record: the JSON document an external automation reads to
//! perform the actual profile-image change.

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::{Result, RotatorError};
use crate::types::{SelectionMode, SelectionStatus};

/// Well-known repository path of the record.
pub const SELECTION_RECORD_PATH: &str = "selected_avatar.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SelectionRecord {
    pub avatar_name: String,
    /// RFC 3339 / ISO-8601 instant.
    pub timestamp: String,
    pub mode: SelectionMode,
    pub status: SelectionStatus,
}

impl SelectionRecord {
    pub fn new(
        avatar_name: &str,
        mode: SelectionMode,
        status: SelectionStatus,
        at: OffsetDateTime,
    ) -> Result<Self> {
        let timestamp = at
            .format(&Rfc3339)
            .map_err(|e| RotatorError::Record(e.to_string()))?;
        Ok(Self {
            avatar_name: avatar_name.to_string(),
            timestamp,
            mode,
            status,
        })
    }

    /// Parse and validate a record document.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let record: SelectionRecord = serde_json::from_slice(bytes)?;
        if record.avatar_name.trim().is_empty() {
            return Err(RotatorError::Record("avatarName is empty".into()));
        }
        record.parsed_timestamp()?;
        Ok(record)
    }

    pub fn parsed_timestamp(&self) -> Result<OffsetDateTime> {
        OffsetDateTime::parse(&self.timestamp, &Rfc3339)
            .map_err(|e| RotatorError::Record(format!("timestamp `{}`: {e}", self.timestamp)))
    }

    /// Pretty JSON with a trailing newline, as committed to the repository.
    pub fn to_document(&self) -> Result<String> {
        let mut doc = serde_json::to_string_pretty(self)?;
        doc.push('\n');
        Ok(doc)
    }

    pub fn with_status(mut self, status: SelectionStatus) -> Self {
        self.status = status;
        self
    }
}
