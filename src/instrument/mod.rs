//! Instruments and their declared capabilities.
//!
//! Trigger nodes are bound to one instrument and only accept streams from
//! that instrument. Optional trigger features are gated on capability
//! flags the instrument declares up front.

pub mod cache;

pub use cache::SettingsCache;

use crate::graph::id::InstrumentId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Optional feature an instrument may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// Edge trigger can alternate between rising and falling.
    AlternatingEdge,
    /// Window trigger supports crossing edge, condition and time limit.
    TimedWindow,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    pub alternating_edge: bool,
    pub timed_window: bool,
}

impl Capabilities {
    pub fn all() -> Self {
        Self {
            alternating_edge: true,
            timed_window: true,
        }
    }

    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::AlternatingEdge => self.alternating_edge,
            Capability::TimedWindow => self.timed_window,
        }
    }
}

/// Handle to one physical instrument. Cheap to clone; clones share the
/// settings cache.
#[derive(Debug, Clone)]
pub struct Instrument {
    id: InstrumentId,
    name: String,
    capabilities: Capabilities,
    cache: Arc<SettingsCache>,
}

impl Instrument {
    pub fn new(id: InstrumentId, name: impl Into<String>, capabilities: Capabilities) -> Self {
        Self {
            id,
            name: name.into(),
            capabilities,
            cache: Arc::new(SettingsCache::new()),
        }
    }

    pub fn id(&self) -> InstrumentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.has(capability)
    }

    pub fn cache(&self) -> &SettingsCache {
        &self.cache
    }
}
