//! Playback Actions
//!
//! Defines the control actions viewers exchange, their wire text, and the
//! Server-Sent Events frame used to push them to every other viewer.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::SyncError;

/// A playback control action triggered by one viewer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PlaybackAction {
    /// Resume playback
    Resume,
    /// Pause playback
    Hold,
    /// Jump to a position; the value is forwarded verbatim
    Seek(String),
}

impl PlaybackAction {
    /// Build a seek action, rejecting an empty position or one that would
    /// break the single-line frame
    pub fn seek(position: impl Into<String>) -> Result<Self, SyncError> {
        let position = position.into();
        if position.trim().is_empty() {
            return Err(SyncError::InvalidAction("seek requires a position".to_string()));
        }
        if position.contains(['\r', '\n']) {
            return Err(SyncError::InvalidAction(
                "seek position must be a single line".to_string(),
            ));
        }
        Ok(Self::Seek(position))
    }

    /// Parse the wire form (`resume`, `hold`, `seek:<value>`)
    pub fn parse(text: &str) -> Result<Self, SyncError> {
        match text {
            "resume" => Ok(Self::Resume),
            "hold" => Ok(Self::Hold),
            other => match other.strip_prefix("seek:") {
                Some(position) => Self::seek(position),
                None => Err(SyncError::InvalidAction(other.to_string())),
            },
        }
    }

    /// Wire form of the action
    pub fn as_wire(&self) -> String {
        match self {
            Self::Resume => "resume".to_string(),
            Self::Hold => "hold".to_string(),
            Self::Seek(position) => format!("seek:{}", position),
        }
    }

    /// Short name used in log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Resume => "resume",
            Self::Hold => "hold",
            Self::Seek(_) => "seek",
        }
    }
}

impl fmt::Display for PlaybackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_wire())
    }
}

impl TryFrom<String> for PlaybackAction {
    type Error = SyncError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PlaybackAction> for String {
    fn from(action: PlaybackAction) -> Self {
        action.as_wire()
    }
}

/// Frame a wire message as a Server-Sent Events message: `data: <message>\n\n`
pub fn frame(message: &str) -> String {
    format!("data: {}\n\n", message)
}
