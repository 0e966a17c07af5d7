//! Node type enumeration for dynamic node creation.
//!
//! Session documents store a node's type by name; the factory turns it
//! back into a node. Acquisition channels belong to their instrument and
//! are never created here.

use crate::error::{Result, ScopeFlowError};
use crate::graph::node::{AnyNode, BuiltinNode};
use crate::graph::nodes::triggers::{EdgeTrigger, NthEdgeBurstTrigger, WindowTrigger};
use crate::graph::nodes::{EthernetDecoder, GateFilter};
use crate::graph::id::InstrumentId;
use crate::instrument::Instrument;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    Channel,
    Gate,
    Ethernet,
    EdgeTrigger,
    WindowTrigger,
    NthEdgeBurstTrigger,
}

impl NodeType {
    /// Get the display name for this node type.
    pub fn display_name(&self) -> &'static str {
        match self {
            NodeType::Channel => "Channel",
            NodeType::Gate => "Gate",
            NodeType::Ethernet => "Ethernet",
            NodeType::EdgeTrigger => "Edge Trigger",
            NodeType::WindowTrigger => "Window Trigger",
            NodeType::NthEdgeBurstTrigger => "Nth Edge Burst Trigger",
        }
    }

    pub fn all() -> &'static [NodeType] {
        &[
            NodeType::Channel,
            NodeType::Gate,
            NodeType::Ethernet,
            NodeType::EdgeTrigger,
            NodeType::WindowTrigger,
            NodeType::NthEdgeBurstTrigger,
        ]
    }

    /// Trigger types need an instrument to be created.
    pub fn is_trigger(&self) -> bool {
        matches!(
            self,
            NodeType::EdgeTrigger | NodeType::WindowTrigger | NodeType::NthEdgeBurstTrigger
        )
    }

    /// Type of an existing node. `None` for plugins.
    pub fn of(node: &AnyNode) -> Option<NodeType> {
        match node {
            AnyNode::Builtin(builtin) => Some(match builtin {
                BuiltinNode::Channel(_) => NodeType::Channel,
                BuiltinNode::Gate(_) => NodeType::Gate,
                BuiltinNode::Ethernet(_) => NodeType::Ethernet,
                BuiltinNode::EdgeTrigger(_) => NodeType::EdgeTrigger,
                BuiltinNode::WindowTrigger(_) => NodeType::WindowTrigger,
                BuiltinNode::NthEdgeBurstTrigger(_) => NodeType::NthEdgeBurstTrigger,
            }),
            AnyNode::Plugin(_) => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            NodeType::Channel => "Hardware acquisition channel.",
            NodeType::Gate => {
                "Passes an analog waveform while the enable input is non-zero.\n\
                 Latch mode holds the last waveform while disabled."
            }
            NodeType::Ethernet => {
                "Decodes a byte stream into Ethernet frames.\n\
                 Checks the FCS and extracts MAC, VLAN and ethertype headers."
            }
            NodeType::EdgeTrigger => "Triggers when the input crosses a level.",
            NodeType::WindowTrigger => "Triggers on entering or leaving a voltage window.",
            NodeType::NthEdgeBurstTrigger => "Triggers on the Nth edge of a burst after an idle period.",
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Factory for creating nodes dynamically.
///
/// Triggers are bound to an instrument at construction, so the factory
/// holds the instruments it may hand out.
#[derive(Debug, Clone, Default)]
pub struct NodeFactory {
    instruments: Vec<Instrument>,
}

impl NodeFactory {
    pub fn new(instruments: Vec<Instrument>) -> Self {
        Self { instruments }
    }

    pub fn instrument(&self, id: InstrumentId) -> Option<&Instrument> {
        self.instruments.iter().find(|i| i.id() == id)
    }

    /// Create a node of `node_type`. Triggers need `instrument`.
    pub fn create(&self, node_type: NodeType, instrument: Option<InstrumentId>) -> Result<AnyNode> {
        let bound = || -> Result<Instrument> {
            let id = instrument.ok_or_else(|| {
                ScopeFlowError::Config(format!("{} needs an instrument", node_type))
            })?;
            self.instrument(id)
                .cloned()
                .ok_or_else(|| ScopeFlowError::Config(format!("Unknown instrument {:?}", id)))
        };

        let node: AnyNode = match node_type {
            NodeType::Channel => {
                return Err(ScopeFlowError::Config(
                    "Channels are created by their instrument".to_string(),
                ))
            }
            NodeType::Gate => GateFilter::new().into(),
            NodeType::Ethernet => EthernetDecoder::new().into(),
            NodeType::EdgeTrigger => EdgeTrigger::new(bound()?).into(),
            NodeType::WindowTrigger => WindowTrigger::new(bound()?).into(),
            NodeType::NthEdgeBurstTrigger => NthEdgeBurstTrigger::new(bound()?).into(),
        };
        Ok(node)
    }
}
