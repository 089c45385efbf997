//! Satellite registry
//!
//! The registry maps satellite names to clients. Each generation of the map is
//! immutable; a reload builds a new map and swaps it in atomically, so
//! in-flight requests keep the generation they started with.

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::SatelliteConfig;

use super::satellite::{HttpSatellite, Satellite, SatelliteError};

/// One immutable generation of registered satellites
pub struct Generation {
    pub number: u64,
    pub loaded_at: DateTime<Utc>,
    satellites: HashMap<String, Arc<dyn Satellite>>,
}

impl Generation {
    fn new(number: u64, satellites: Vec<Arc<dyn Satellite>>) -> Self {
        Self {
            number,
            loaded_at: Utc::now(),
            satellites: satellites
                .into_iter()
                .map(|s| (s.name().to_string(), s))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Satellite>> {
        self.satellites.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.satellites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.satellites.is_empty()
    }

    /// Sorted satellite names
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.satellites.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Registry of satellites, cheap to clone and share
#[derive(Clone)]
pub struct SatelliteRegistry {
    current: Arc<ArcSwap<Generation>>,
}

impl SatelliteRegistry {
    /// Create a registry holding the given satellites
    pub fn new(satellites: Vec<Arc<dyn Satellite>>) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(Generation::new(0, satellites))),
        }
    }

    /// Create HTTP satellite clients for the configured satellites
    pub fn from_config(configs: &[SatelliteConfig]) -> Result<Self, SatelliteError> {
        Ok(Self::new(build_satellites(configs)?))
    }

    /// Look up a satellite by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Satellite>> {
        self.current.load().get(name)
    }

    /// Snapshot of the current generation
    pub fn snapshot(&self) -> Arc<Generation> {
        self.current.load_full()
    }

    /// Current generation number
    pub fn generation(&self) -> u64 {
        self.current.load().number
    }

    /// Sorted names of all registered satellites
    pub fn names(&self) -> Vec<String> {
        self.current.load().names()
    }

    /// Replace all satellites with a new generation.
    ///
    /// Concurrent reloads each get their own, strictly increasing number.
    pub fn reload(&self, satellites: Vec<Arc<dyn Satellite>>) -> u64 {
        let count = satellites.len();
        let previous = self.current.rcu(|current| {
            Arc::new(Generation::new(current.number + 1, satellites.clone()))
        });
        let number = previous.number + 1;

        tracing::info!(generation = number, satellites = count, "Satellite registry reloaded");
        number
    }

    /// Rebuild the registry from configuration
    pub fn reload_from_config(&self, configs: &[SatelliteConfig]) -> Result<u64, SatelliteError> {
        Ok(self.reload(build_satellites(configs)?))
    }

    /// Summary of the registry
    pub fn info(&self) -> RegistryInfo {
        let current = self.current.load();
        RegistryInfo {
            generation: current.number,
            loaded_at: current.loaded_at,
            satellites: current.names(),
        }
    }
}

fn build_satellites(
    configs: &[SatelliteConfig],
) -> Result<Vec<Arc<dyn Satellite>>, SatelliteError> {
    configs
        .iter()
        .map(|c| HttpSatellite::new(c).map(|s| Arc::new(s) as Arc<dyn Satellite>))
        .collect()
}

/// Registry summary returned by the API
#[derive(Debug, Clone, Serialize)]
pub struct RegistryInfo {
    pub generation: u64,
    pub loaded_at: DateTime<Utc>,
    pub satellites: Vec<String>,
}

// ============================================================================
// Tests
// ============================================================================
