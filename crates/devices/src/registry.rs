//! Registry mapping device names to their profiles.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use log::info;

use stream_types::{DeviceProfile, ProfileResult};

use crate::muse2016;

/// A registry of validated device profiles, keyed by device name.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    profiles: HashMap<String, Arc<DeviceProfile>>,
}

impl DeviceRegistry {
    /// Creates a new, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with every profile shipped in this crate.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry
            .profiles
            .insert(muse2016::NAME.to_string(), Arc::new(muse2016::profile()));
        registry
    }

    /// Validates and registers a profile, replacing any profile of the same name.
    pub fn register(&mut self, profile: DeviceProfile) -> ProfileResult<Arc<DeviceProfile>> {
        profile.validate()?;
        let profile = Arc::new(profile);
        if self
            .profiles
            .insert(profile.name.clone(), profile.clone())
            .is_some()
        {
            info!("Replaced device profile '{}'", profile.name);
        }
        Ok(profile)
    }

    /// Loads a JSON or TOML profile file and registers it.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> ProfileResult<Arc<DeviceProfile>> {
        let profile = DeviceProfile::from_file(path)?;
        self.register(profile)
    }

    pub fn get(&self, name: &str) -> Option<Arc<DeviceProfile>> {
        self.profiles.get(name).cloned()
    }

    /// Registered device names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.profiles.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn profiles(&self) -> impl Iterator<Item = &Arc<DeviceProfile>> {
        self.profiles.values()
    }
}
