// Sound clip model
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::hotkey::Hotkey;

/// A playable clip.
///
/// The path is the clip's identity; nickname, start offset and hotkey are
/// editable metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sound {
    path: PathBuf,
    #[serde(default)]
    pub nickname: String,
    /// Offset playback starts from, used to trim silence at the head of a clip
    #[serde(default, with = "duration_ms")]
    pub start_time: Duration,
    #[serde(default)]
    pub hotkey: Hotkey,
}

impl Sound {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            nickname: String::new(),
            start_time: Duration::ZERO,
            hotkey: Hotkey::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name without directories
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Nickname when set, file name otherwise
    pub fn display_name(&self) -> String {
        if self.nickname.trim().is_empty() {
            self.file_name()
        } else {
            self.nickname.clone()
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
