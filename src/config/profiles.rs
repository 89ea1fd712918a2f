// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Named playback profiles persisted as YAML.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use super::PlaybackConfig;

/// Profile name used when a file holds a single unnamed setup
pub const DEFAULT_PROFILE: &str = "default";

/// Mapping from profile name to playback configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ProfileStore {
    /// Saved profiles, ordered by name
    #[serde(default)]
    pub profiles: BTreeMap<String, PlaybackConfig>,
}

impl ProfileStore {
    /// Store holding one default profile
    pub fn with_default_profile() -> Self {
        let mut store = Self::default();
        store.insert(DEFAULT_PROFILE, PlaybackConfig::default());
        store
    }

    /// Load profiles from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read profile file: {:?}", path.as_ref()))?;
        Self::from_yaml(&contents)
    }

    /// Parse profiles from a YAML string, recomputing each song layout.
    ///
    /// Songs too long to lay out are refused here; the rest of a profile
    /// is checked by `PlaybackConfig::validate`.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut store: Self =
            serde_yaml::from_str(yaml).context("Failed to parse profile YAML")?;
        for (name, config) in store.profiles.iter_mut() {
            config
                .check_song_length()
                .map_err(|e| anyhow!("Profile '{}': {}", name, e))?;
            config.relayout();
        }
        Ok(store)
    }

    /// Serialize to YAML string
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize profiles to YAML")
    }

    /// Save profiles to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = self.to_yaml()?;
        fs::write(path.as_ref(), yaml)
            .with_context(|| format!("Failed to write profile file: {:?}", path.as_ref()))
    }

    /// Profile names in order
    pub fn names(&self) -> Vec<&str> {
        self.profiles.keys().map(String::as_str).collect()
    }

    /// Get a profile by name
    pub fn get(&self, name: &str) -> Option<&PlaybackConfig> {
        self.profiles.get(name)
    }

    /// Save a profile under a name, replacing any existing one
    pub fn insert(&mut self, name: impl Into<String>, mut config: PlaybackConfig) {
        config.relayout();
        self.profiles.insert(name.into(), config);
    }

    /// Delete a profile
    pub fn remove(&mut self, name: &str) -> Option<PlaybackConfig> {
        self.profiles.remove(name)
    }

    /// Pick a profile by name, or the only/default one when no name is given
    pub fn select(&self, name: Option<&str>) -> Result<&PlaybackConfig> {
        let name = self.resolve_name(name)?;
        self.get(name)
            .ok_or_else(|| anyhow!("Profile '{}' not found", name))
    }

    /// Name of the profile `select` would pick
    pub fn resolve_name<'a>(&'a self, name: Option<&'a str>) -> Result<&'a str> {
        match name {
            Some(name) if self.profiles.contains_key(name) => Ok(name),
            Some(name) => Err(anyhow!("Profile '{}' not found", name)),
            None if self.profiles.contains_key(DEFAULT_PROFILE) => Ok(DEFAULT_PROFILE),
            None => self
                .profiles
                .keys()
                .next()
                .map(String::as_str)
                .ok_or_else(|| anyhow!("Profile file contains no profiles")),
        }
    }
}
