//! Incremental dataflow graph.
//!
//! Nodes consume typed streams produced by acquisition channels or other
//! nodes and publish new streams. Wiring is stored on the consumer side as
//! one `StreamDescriptor` per input; the compiler derives the evaluation
//! order from those bindings.
//!
//! # Architecture
//!
//! ```text
//! [Channel CH1] ──► [Ethernet] ──► packets
//! [Channel CH2] ──► [Gate] ◄── [Channel EN]
//! [Channel CH1] ──► [Edge Trigger]
//! ```
//!
//! # Design
//!
//! - **Enum dispatch** for built-in nodes, `NodePlugin` trait objects for the rest.
//! - **Incremental** evaluation: only nodes downstream of dirty ones refresh.
//! - **Shared waveforms** published as new `Arc`s; readers never see partial writes.
//! - **Dedicated thread** with a command/event bridge for cross-thread changes.

pub mod bridge;
pub mod compiled_plan;
pub mod compiler;
pub mod engine;
pub mod executor;
pub mod gpu;
pub mod id;
pub mod node;
pub mod node_type;
pub mod nodes;
pub mod packet;
pub mod parameter;
pub mod signal;
pub mod stream;
pub mod unit;
pub mod waveform;

pub use bridge::{GraphBridge, GraphCommand, GraphEvent};
pub use compiled_plan::{CompiledPlan, PlanStats};
pub use engine::Engine;
pub use executor::{CycleReport, FlowGraph};
pub use gpu::{CommandBuffer, DataLocation, GpuCommand, QueueHandle};
pub use id::{InstrumentId, NodeId};
pub use node::{AnyNode, BuiltinNode, NodeCategory, NodePlugin, RefreshContext};
pub use node_type::{NodeFactory, NodeType};
pub use packet::{Packet, PacketDecoder, ProtocolColor};
pub use parameter::{FilterParameter, ParameterType, ParameterValue};
pub use stream::{ChannelKind, Stream, StreamDescriptor, StreamInfo, StreamType};
pub use unit::Unit;
pub use waveform::{AnyWaveform, Waveform};
