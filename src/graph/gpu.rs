//! GPU command recording boundary.
//!
//! Nodes that prefer GPU execution record commands into a `CommandBuffer`
//! during refresh. Only the graph submits: it hands the finished buffer to
//! the `QueueHandle` after the node returns. Shader internals live behind
//! this boundary and are not modelled here.

use crate::graph::id::NodeId;

/// Where a node wants its input data to live at refresh time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataLocation {
    #[default]
    Cpu,
    Gpu,
    /// Either works; the graph picks.
    DontCare,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GpuCommand {
    BindPipeline(String),
    /// Copy a buffer to the device.
    Upload { buffer: String, bytes: usize },
    Dispatch { x: u32, y: u32, z: u32 },
    Barrier,
    /// Copy a buffer back to host memory.
    Download { buffer: String, bytes: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandBufferState {
    Recording,
    Executable,
}

#[derive(Debug, Clone)]
pub struct CommandBuffer {
    commands: Vec<GpuCommand>,
    state: CommandBufferState,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            state: CommandBufferState::Recording,
        }
    }

    /// Clear and reopen for recording.
    pub fn begin(&mut self) {
        self.commands.clear();
        self.state = CommandBufferState::Recording;
    }

    /// Returns false if the buffer was already closed.
    pub fn record(&mut self, command: GpuCommand) -> bool {
        if self.state != CommandBufferState::Recording {
            tracing::warn!("Command recorded into a closed buffer: {:?}", command);
            return false;
        }
        self.commands.push(command);
        true
    }

    pub fn end(&mut self) {
        self.state = CommandBufferState::Executable;
    }

    pub fn state(&self) -> CommandBufferState {
        self.state
    }

    pub fn commands(&self) -> &[GpuCommand] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl Default for CommandBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// One submitted batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub node: NodeId,
    pub cycle: u64,
    pub commands: Vec<GpuCommand>,
}

/// Compute queue the graph submits to.
#[derive(Debug, Clone)]
pub struct QueueHandle {
    family: u32,
    submissions: Vec<Submission>,
}

impl QueueHandle {
    pub fn new(family: u32) -> Self {
        Self {
            family,
            submissions: Vec::new(),
        }
    }

    pub fn family(&self) -> u32 {
        self.family
    }

    /// Submit a closed buffer. Empty buffers are dropped.
    pub(crate) fn submit(&mut self, node: NodeId, cycle: u64, buffer: &CommandBuffer) {
        if buffer.is_empty() {
            return;
        }
        debug_assert_eq!(buffer.state(), CommandBufferState::Executable);
        self.submissions.push(Submission {
            node,
            cycle,
            commands: buffer.commands().to_vec(),
        });
    }

    /// Batches submitted during the most recent cycle that ran. The graph
    /// clears the log at the start of every cycle.
    pub fn submissions(&self) -> &[Submission] {
        &self.submissions
    }

    pub fn clear_submissions(&mut self) {
        self.submissions.clear();
    }
}
