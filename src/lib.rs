//! # scopeflow: incremental signal flow graph engine
//!
//! The execution core of a test-and-measurement signal-processing stack.
//! Acquisition channels feed typed sample streams into a directed acyclic
//! graph of filters, protocol decoders and triggers, which re-evaluates
//! incrementally as new data arrives or wiring changes.
//!
//! ## Architecture
//!
//! - **Graph**: nodes, streams, parameters and the evaluation scheduler
//! - **Nodes**: acquisition channels, a gate filter, the Ethernet decoder
//!   and Edge / Window / Nth-edge-burst triggers
//! - **Engine**: runs the graph on its own thread behind a crossbeam bridge
//! - **Config**: TOML engine settings and JSON session documents
//!
//! ## Example
//!
//! ```ignore
//! use scopeflow::graph::{FlowGraph, nodes::EthernetDecoder};
//!
//! let mut graph = FlowGraph::new();
//! let decoder = graph.add_node(EthernetDecoder::new());
//! graph.connect(channel, 0, decoder, 0)?;
//! graph.ingest(channel, 0, bytes)?;
//! graph.run_cycle(false);
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod instrument;

// Re-export commonly used types
pub use config::{EngineConfig, SessionDocument};
pub use error::{Result, ScopeFlowError};
pub use graph::{Engine, FlowGraph, GraphBridge, GraphCommand, GraphEvent, NodeId};
pub use instrument::{Capabilities, Capability, Instrument};
