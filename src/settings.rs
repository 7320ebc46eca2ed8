use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

use crate::models::CallerId;

pub const DEFAULT_AUTO_REPLY: &str = "I'm currently driving and will call you back when it's \
safe. If this is urgent, please call again.";

/// User-facing configuration consumed by the disposition policy. Mutated
/// only through explicit user actions and persisted after every mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub auto_reply_message: String,
    pub vip_numbers: Vec<String>,
    pub auto_decline: bool,
    pub voice_confirm: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_reply_message: DEFAULT_AUTO_REPLY.to_string(),
            vip_numbers: Vec::new(),
            auto_decline: false,
            voice_confirm: false,
        }
    }
}

impl Settings {
    /// VIP membership uses the same suffix-containment matching as call
    /// history, and a withheld caller id is never a VIP.
    pub fn is_vip(&self, caller: &CallerId) -> bool {
        caller.is_known() && self.vip_numbers.iter().any(|n| caller.matches_number(n))
    }

    /// Returns false when an equivalent number is already listed.
    pub fn add_vip(&mut self, number: &str) -> bool {
        let candidate = CallerId::from_raw(Some(number));
        if !candidate.is_known() || self.is_vip(&candidate) {
            return false;
        }
        self.vip_numbers.push(number.trim().to_string());
        true
    }

    pub fn remove_vip(&mut self, number: &str) -> bool {
        let candidate = CallerId::from_raw(Some(number));
        let before = self.vip_numbers.len();
        self.vip_numbers.retain(|n| !candidate.matches_number(n));
        self.vip_numbers.len() != before
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<Settings>,
}

impl SettingsStore {
    /// Loads settings from `path`, falling back to defaults when the file
    /// is missing or malformed — a broken settings blob must never stop
    /// driving-mode monitoring from starting.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            Settings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn current(&self) -> Settings {
        self.data.read().unwrap().clone()
    }

    /// Applies a mutation and persists the result, returning the updated
    /// settings.
    pub fn update<F>(&self, mutate: F) -> Result<Settings>
    where
        F: FnOnce(&mut Settings),
    {
        let mut guard = self.data.write().unwrap();
        mutate(&mut guard);
        self.persist(&guard)?;
        Ok(guard.clone())
    }

    fn persist(&self, data: &Settings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
