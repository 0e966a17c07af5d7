//! Flow graph executor: owns the nodes and drives evaluation cycles.
//!
//! Each cycle:
//! 1. Recompile the plan if wiring changed.
//! 2. Collect the nodes downstream of anything dirty.
//! 3. Refresh those nodes in topological order, on the GPU path when
//!    enabled and the node does not insist on CPU data.
//! 4. Publish outputs so later nodes in the same cycle see them.

use crate::error::{Result, ScopeFlowError};
use crate::graph::compiled_plan::CompiledPlan;
use crate::graph::compiler::GraphCompiler;
use crate::graph::gpu::{CommandBuffer, DataLocation, QueueHandle};
use crate::graph::id::NodeId;
use crate::graph::node::{AnyNode, InputData, RefreshContext};
use crate::graph::parameter::ParameterValue;
use crate::graph::stream::{Cardinality, StreamDescriptor, StreamInfo};
use crate::graph::waveform::AnyWaveform;
use std::sync::Arc;

/// A slot holding a node and its scheduling state.
pub struct NodeSlot {
    pub node: AnyNode,
    /// Whether this node has been deleted (slot is empty).
    pub deleted: bool,
    /// Needs a refresh on the next cycle.
    pub dirty: bool,
}

impl NodeSlot {
    pub fn new(node: AnyNode) -> Self {
        Self {
            node,
            deleted: false,
            dirty: true,
        }
    }
}

/// What one call to [`FlowGraph::run_cycle`] did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    /// Cycle number, `None` when nothing was dirty and the call was a no-op.
    pub cycle: Option<u64>,
    /// Refreshed nodes in the order they ran.
    pub refreshed: Vec<NodeId>,
    /// Nodes that ran on the GPU path.
    pub gpu_nodes: Vec<NodeId>,
}

/// The flow graph and its evaluation scheduler.
pub struct FlowGraph {
    nodes: Vec<NodeSlot>,
    /// Cached compiled evaluation plan
    compiled_plan: CompiledPlan,
    /// Generation counter for cache invalidation
    graph_generation: u64,
    /// Whether plan needs recompilation
    compiled_plan_dirty: bool,
    cycle: u64,
    gpu_enabled: bool,
    queue: QueueHandle,
}

impl FlowGraph {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            compiled_plan: CompiledPlan::new(),
            graph_generation: 0,
            compiled_plan_dirty: true,
            cycle: 0,
            gpu_enabled: false,
            queue: QueueHandle::new(0),
        }
    }

    /// Graph that refreshes GPU-capable nodes through `queue`.
    pub fn with_gpu(queue: QueueHandle) -> Self {
        Self {
            gpu_enabled: true,
            queue,
            ..Self::new()
        }
    }

    pub fn gpu_enabled(&self) -> bool {
        self.gpu_enabled
    }

    pub fn set_gpu_enabled(&mut self, enabled: bool) {
        self.gpu_enabled = enabled;
    }

    pub fn queue(&self) -> &QueueHandle {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut QueueHandle {
        &mut self.queue
    }

    /// Number of cycles run so far.
    pub fn cycle_count(&self) -> u64 {
        self.cycle
    }

    // ── Graph building ──

    /// Add a node to the graph. Returns its NodeId.
    pub fn add_node(&mut self, node: impl Into<AnyNode>) -> NodeId {
        let node = node.into();
        let id = NodeId(self.nodes.len() as u32);
        tracing::info!("Added node {:?} '{}' ({})", id, node.name(), node.protocol_name());
        self.nodes.push(NodeSlot::new(node));
        self.invalidate_compiled_plan();
        id
    }

    /// Delete a node. Its own inputs are detached and its output buffers
    /// released. Consumers bound to it lose those bindings and are
    /// refreshed on the next cycle.
    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        self.slot(id)?;
        let removed = &mut self.nodes[id.index()];
        removed.node.detach_inputs();
        for stream in removed.node.core_mut().streams_mut() {
            stream.waveform = None;
        }
        removed.deleted = true;
        removed.dirty = false;

        for slot in self.nodes.iter_mut().filter(|s| !s.deleted) {
            let bound: Vec<usize> = slot
                .node
                .core()
                .inputs()
                .iter()
                .enumerate()
                .filter(|(_, d)| d.node == Some(id))
                .map(|(i, _)| i)
                .collect();
            for i in &bound {
                slot.node.clear_input(*i);
            }
            if !bound.is_empty() {
                slot.dirty = true;
            }
        }

        self.invalidate_compiled_plan();
        tracing::info!("Removed node {:?}", id);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|s| !s.deleted).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live node ids in insertion order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.deleted)
            .map(|(i, _)| NodeId(i as u32))
    }

    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        self.node_ids().find(|&id| self.nodes[id.index()].node.name() == name)
    }

    pub fn node(&self, id: NodeId) -> Result<&AnyNode> {
        self.slot(id).map(|s| &s.node)
    }

    /// Mutable access to a node. The node is assumed changed: it is marked
    /// dirty and the plan is recompiled before the next cycle.
    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut AnyNode> {
        self.slot(id)?;
        self.invalidate_compiled_plan();
        let slot = &mut self.nodes[id.index()];
        slot.dirty = true;
        Ok(&mut slot.node)
    }

    fn slot(&self, id: NodeId) -> Result<&NodeSlot> {
        self.nodes
            .get(id.index())
            .filter(|s| !s.deleted)
            .ok_or(ScopeFlowError::UnknownNode(id))
    }

    /// Descriptor for stream `stream` of `node`, with its capability snapshot.
    pub fn stream(&self, node: NodeId, stream: usize) -> Result<StreamDescriptor> {
        let slot = self.slot(node)?;
        let s = slot
            .node
            .core()
            .stream(stream)
            .ok_or(ScopeFlowError::UnknownStream { node, stream })?;
        Ok(StreamDescriptor::new(
            node,
            stream,
            StreamInfo {
                stream_type: s.stream_type,
                unit: s.unit,
                instrument: slot.node.instrument().map(|i| i.id()),
                channel_kind: slot.node.channel_kind(),
            },
        ))
    }

    // ── Wiring ──

    /// Bind `stream` to input `index` of `node`.
    ///
    /// The descriptor's capability snapshot is refreshed from the graph
    /// before validation. Bindings that would close a cycle are refused
    /// even when forced.
    pub fn set_input(
        &mut self,
        node: NodeId,
        index: usize,
        stream: StreamDescriptor,
        force: bool,
    ) -> Result<()> {
        self.slot(node)?;

        let stream = match stream.node {
            Some(producer) => {
                let resolved = self.stream(producer, stream.stream)?;
                if self.would_create_cycle(producer, node) {
                    tracing::warn!(
                        "Refusing to bind {} to input {} of {:?}: would create a cycle",
                        resolved,
                        index,
                        node
                    );
                    return Err(ScopeFlowError::CycleDetected);
                }
                resolved
            }
            None => StreamDescriptor::null(),
        };

        let slot = &mut self.nodes[node.index()];
        slot.node
            .set_input(index, stream, force)
            .map_err(|e| match e {
                ScopeFlowError::InvalidWiring { input, stream, .. } => {
                    ScopeFlowError::InvalidWiring { node, input, stream }
                }
                other => other,
            })?;
        slot.dirty = true;
        self.invalidate_compiled_plan();

        tracing::info!("Bound {} to input {} of {:?}", stream, index, node);
        Ok(())
    }

    pub fn set_input_by_name(
        &mut self,
        node: NodeId,
        name: &str,
        stream: StreamDescriptor,
        force: bool,
    ) -> Result<()> {
        let index = self
            .slot(node)?
            .node
            .core()
            .input_index(name)
            .ok_or_else(|| ScopeFlowError::UnknownInput(name.to_string()))?;
        self.set_input(node, index, stream, force)
    }

    /// Validated binding of `producer`'s stream to `consumer`'s input.
    pub fn connect(
        &mut self,
        producer: NodeId,
        stream: usize,
        consumer: NodeId,
        input: usize,
    ) -> Result<()> {
        let desc = self.stream(producer, stream)?;
        self.set_input(consumer, input, desc, false)
    }

    pub fn detach_inputs(&mut self, node: NodeId) -> Result<()> {
        self.slot(node)?;
        let slot = &mut self.nodes[node.index()];
        slot.node.detach_inputs();
        slot.dirty = true;
        self.invalidate_compiled_plan();
        Ok(())
    }

    /// Whether `node` consumes, directly or transitively, any node in `set`.
    pub fn is_downstream_of(&self, node: NodeId, set: &[NodeId]) -> bool {
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = self.producers(node);

        while let Some(current) = stack.pop() {
            if set.contains(&current) {
                return true;
            }
            let idx = current.index();
            if idx >= self.nodes.len() || visited[idx] {
                continue;
            }
            visited[idx] = true;
            stack.extend(self.producers(current));
        }
        false
    }

    fn producers(&self, node: NodeId) -> Vec<NodeId> {
        match self.slot(node) {
            Ok(slot) => slot
                .node
                .core()
                .inputs()
                .iter()
                .filter_map(|d| d.node)
                .filter(|p| self.slot(*p).is_ok())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Check if binding an output of `producer` into `consumer` would create a cycle.
    fn would_create_cycle(&self, producer: NodeId, consumer: NodeId) -> bool {
        producer == consumer || self.is_downstream_of(producer, &[consumer])
    }

    // ── Parameters and data ──

    /// Set a parameter through the graph so the node is re-evaluated.
    pub fn set_parameter(&mut self, node: NodeId, name: &str, value: &ParameterValue) -> Result<bool> {
        self.slot(node)?;
        let slot = &mut self.nodes[node.index()];
        let changed = slot.node.set_parameter_value(name, value)?;
        if changed {
            slot.dirty = true;
            tracing::debug!("{:?}: '{}' = {}", node, name, value);
        }
        Ok(changed)
    }

    /// Deliver a new acquisition to a stream and mark its node dirty.
    pub fn ingest(&mut self, node: NodeId, stream: usize, waveform: AnyWaveform) -> Result<()> {
        self.ingest_shared(node, stream, Some(Arc::new(waveform)))
    }

    pub fn ingest_shared(
        &mut self,
        node: NodeId,
        stream: usize,
        waveform: Option<Arc<AnyWaveform>>,
    ) -> Result<()> {
        self.slot(node)?;
        let slot = &mut self.nodes[node.index()];
        let s = slot
            .node
            .core_mut()
            .streams_mut()
            .get_mut(stream)
            .ok_or(ScopeFlowError::UnknownStream { node, stream })?;
        s.waveform = waveform;
        slot.dirty = true;
        Ok(())
    }

    pub fn ingest_scalar(&mut self, node: NodeId, stream: usize, value: f64) -> Result<()> {
        self.slot(node)?;
        let slot = &mut self.nodes[node.index()];
        let s = slot
            .node
            .core_mut()
            .streams_mut()
            .get_mut(stream)
            .ok_or(ScopeFlowError::UnknownStream { node, stream })?;
        s.value = value;
        slot.dirty = true;
        Ok(())
    }

    /// Current waveform on an output stream.
    pub fn output(&self, node: NodeId, stream: usize) -> Option<Arc<AnyWaveform>> {
        self.slot(node).ok()?.node.core().stream(stream)?.waveform.clone()
    }

    pub fn scalar(&self, node: NodeId, stream: usize) -> Option<f64> {
        Some(self.slot(node).ok()?.node.core().stream(stream)?.value)
    }

    /// Waveform currently visible through input `index` of `node`.
    pub fn input_waveform(&self, node: NodeId, index: usize) -> Option<Arc<AnyWaveform>> {
        let desc = self.slot(node).ok()?.node.input(index);
        self.output(desc.node?, desc.stream)
    }

    fn input_data(&self, desc: StreamDescriptor) -> InputData {
        let Some(stream) = desc
            .node
            .and_then(|id| self.slot(id).ok())
            .and_then(|slot| slot.node.core().stream(desc.stream))
        else {
            return InputData {
                descriptor: desc,
                ..Default::default()
            };
        };

        InputData {
            descriptor: desc,
            waveform: stream.waveform.clone(),
            scalar: (stream.stream_type.cardinality() == Cardinality::Scalar).then_some(stream.value),
        }
    }

    // ── Evaluation ──

    /// Compiled plan, recompiling first if the wiring changed.
    pub fn plan(&mut self) -> &CompiledPlan {
        self.recompile_if_needed();
        &self.compiled_plan
    }

    /// Invalidate the compiled evaluation plan (called when wiring changes).
    fn invalidate_compiled_plan(&mut self) {
        self.compiled_plan_dirty = true;
        self.graph_generation += 1;
    }

    /// Recompile the evaluation plan if needed (lazy recompilation).
    fn recompile_if_needed(&mut self) {
        if self.compiled_plan_dirty {
            self.compiled_plan = GraphCompiler::compile(&self.nodes, self.graph_generation);
            self.compiled_plan_dirty = false;

            tracing::debug!(
                "Flow graph recompiled: {} scheduled / {} total (gen {}, {} us)",
                self.compiled_plan.stats.scheduled_nodes,
                self.compiled_plan.stats.total_nodes,
                self.compiled_plan.generation,
                self.compiled_plan.stats.compile_time_us,
            );
        }
    }

    /// Run one evaluation cycle.
    ///
    /// Only dirty nodes and everything downstream of them refresh. With
    /// nothing dirty the call does nothing unless `force` is set, in which
    /// case every node refreshes.
    pub fn run_cycle(&mut self, force: bool) -> CycleReport {
        self.recompile_if_needed();

        let dirty: Vec<bool> = self
            .nodes
            .iter()
            .map(|s| !s.deleted && (force || s.dirty))
            .collect();
        if !dirty.iter().any(|&d| d) {
            return CycleReport::default();
        }

        let scheduled = self.compiled_plan.downstream_of(&dirty);
        let cycle = self.cycle;
        self.queue.clear_submissions();
        let mut report = CycleReport {
            cycle: Some(cycle),
            ..Default::default()
        };

        let order = self.compiled_plan.order.clone();
        for idx in order {
            if !scheduled[idx] {
                continue;
            }
            let id = NodeId(idx as u32);

            let inputs: Vec<InputData> = self.nodes[idx]
                .node
                .core()
                .inputs()
                .iter()
                .map(|d| self.input_data(*d))
                .collect();

            let gpu = self.gpu_enabled && self.nodes[idx].node.input_location() != DataLocation::Cpu;
            let slot = &mut self.nodes[idx];
            let mut ctx = RefreshContext::new(inputs, slot.node.core().streams(), cycle);

            if gpu {
                let mut cmd = CommandBuffer::new();
                cmd.begin();
                slot.node.refresh_gpu(&mut ctx, &mut cmd, &self.queue);
                cmd.end();
                self.queue.submit(id, cycle, &cmd);
                report.gpu_nodes.push(id);
            } else {
                slot.node.refresh(&mut ctx);
            }

            ctx.publish(slot.node.core_mut().streams_mut());
            report.refreshed.push(id);
        }

        for slot in &mut self.nodes {
            slot.dirty = false;
        }
        self.cycle += 1;

        tracing::debug!(
            "Cycle {}: refreshed {} node(s), {} on GPU",
            cycle,
            report.refreshed.len(),
            report.gpu_nodes.len()
        );
        report
    }
}

impl Default for FlowGraph {
    fn default() -> Self {
        Self::new()
    }
}
