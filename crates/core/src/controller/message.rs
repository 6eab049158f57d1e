//! Out-of-band control messages posted by the hosting page.

use serde::{Deserialize, Serialize};

use crate::Error;

/// Commands a page can post to a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Activate a waiting worker now instead of waiting for clients to close.
    SkipWaiting,
}

impl ControlMessage {
    /// Parse a posted message body.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for anything other than a known
    /// `{ "type": ... }` command.
    pub fn parse(value: &serde_json::Value) -> Result<Self, Error> {
        serde_json::from_value(value.clone())
            .map_err(|e| Error::InvalidInput(format!("unsupported control message {value}: {e}")))
    }
}
