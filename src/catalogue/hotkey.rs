// Hotkey chords and the hotkey -> sound binding table
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Modifier keys in the order they are displayed
const MODIFIERS: &[&str] = &["Ctrl", "Shift", "Alt", "Win"];

/// A set of keys pressed together, e.g. `Ctrl + Shift + F1`.
///
/// Keys are stored in canonical order (modifiers first) so two chords made of
/// the same keys compare equal regardless of press order. An empty hotkey is
/// "unbound".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Hotkey {
    keys: Vec<String>,
}

impl Hotkey {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key to the chord; repeated keys are ignored.
    pub fn add(&mut self, key: &str) {
        let key = canonical_key(key);
        if key.is_empty() || self.keys.contains(&key) {
            return;
        }
        self.keys.push(key);
        self.keys.sort_by_key(|k| modifier_rank(k));
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

/// Stored key lists go through `add`, so hand-edited files canonicalize too
impl From<Vec<String>> for Hotkey {
    fn from(keys: Vec<String>) -> Self {
        let mut hotkey = Hotkey::new();
        for key in &keys {
            hotkey.add(key);
        }
        hotkey
    }
}

impl From<Hotkey> for Vec<String> {
    fn from(hotkey: Hotkey) -> Self {
        hotkey.keys
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.keys.join(" + "))
    }
}

impl FromStr for Hotkey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut hotkey = Hotkey::new();
        for part in s.split('+') {
            let part = part.trim();
            if part.is_empty() {
                return Err(Error::Hotkey(format!("empty key in '{}'", s)));
            }
            hotkey.add(part);
        }
        Ok(hotkey)
    }
}

fn canonical_key(key: &str) -> String {
    let key = key.trim();
    let lower = key.to_ascii_lowercase();
    let canonical = match lower.as_str() {
        "ctrl" | "control" | "lcontrol" | "rcontrol" => "Ctrl",
        "shift" | "lshift" | "rshift" => "Shift",
        "alt" | "menu" | "lmenu" | "rmenu" => "Alt",
        "win" | "lwin" | "rwin" | "super" | "meta" => "Win",
        _ => return key.to_ascii_uppercase(),
    };
    canonical.to_string()
}

/// Modifiers sort by display order; all other keys keep insertion order
fn modifier_rank(key: &str) -> usize {
    MODIFIERS
        .iter()
        .position(|m| *m == key)
        .unwrap_or(MODIFIERS.len())
}

/// Hotkey -> sound path table.
///
/// One sound per hotkey; binding a hotkey that is already taken moves it.
#[derive(Debug, Clone, Default)]
pub struct HotkeyMap {
    bindings: HashMap<Hotkey, PathBuf>,
}

impl HotkeyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `hotkey` to `path`. Empty hotkeys are never stored.
    /// Returns the path it was previously bound to, if any.
    pub fn bind(&mut self, hotkey: &Hotkey, path: &Path) -> Option<PathBuf> {
        if hotkey.is_empty() {
            return None;
        }
        self.bindings.insert(hotkey.clone(), path.to_path_buf())
    }

    pub fn unbind(&mut self, hotkey: &Hotkey) -> Option<PathBuf> {
        self.bindings.remove(hotkey)
    }

    /// Drop every binding pointing at `path`
    pub fn unbind_path(&mut self, path: &Path) {
        self.bindings.retain(|_, bound| bound != path);
    }

    pub fn lookup(&self, hotkey: &Hotkey) -> Option<&Path> {
        self.bindings.get(hotkey).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
