use super::compiled_plan::{CompiledPlan, PlanStats};
use super::executor::NodeSlot;
use std::collections::VecDeque;

/// Compiles a flow graph into an evaluation plan
pub struct GraphCompiler;

impl GraphCompiler {
    /// Compile the graph into a plan.
    ///
    /// Edges are not stored separately: every bound input descriptor is an
    /// edge from the producing node to the consumer. Deleted slots and
    /// descriptors pointing at them are ignored.
    pub fn compile(nodes: &[NodeSlot], generation: u64) -> CompiledPlan {
        let start_time = std::time::Instant::now();
        let n = nodes.len();

        let edges = Self::collect_edges(nodes);

        let mut consumers = vec![Vec::new(); n];
        for &(from, to) in &edges {
            // A node reading two streams of the same producer is one dependency.
            if !consumers[from].contains(&to) {
                consumers[from].push(to);
            }
        }

        let order = Self::topological_sort(nodes, &consumers);

        let total_nodes = nodes.iter().filter(|slot| !slot.deleted).count();
        if order.len() != total_nodes {
            tracing::warn!(
                "Flow graph has a cycle! Only {} of {} nodes scheduled.",
                order.len(),
                total_nodes
            );
        }

        let live = || nodes.iter().filter(|slot| !slot.deleted);
        let stats = PlanStats {
            total_nodes,
            scheduled_nodes: order.len(),
            source_nodes: live().filter(|s| s.node.input_count() == 0).count(),
            sink_nodes: live().filter(|s| s.node.core().stream_count() == 0).count(),
            compile_time_us: start_time.elapsed().as_micros() as u64,
        };

        CompiledPlan {
            order,
            consumers,
            edges,
            generation,
            stats,
        }
    }

    /// (producer, consumer) pairs for every live binding
    fn collect_edges(nodes: &[NodeSlot]) -> Vec<(usize, usize)> {
        let n = nodes.len();
        let mut edges = Vec::new();

        for (to, slot) in nodes.iter().enumerate() {
            if slot.deleted {
                continue;
            }
            for input in slot.node.core().inputs() {
                let Some(from) = input.node.map(|id| id.index()) else {
                    continue;
                };
                if from >= n || nodes[from].deleted {
                    continue;
                }
                edges.push((from, to));
            }
        }

        edges
    }

    /// Kahn's algorithm over live nodes. Ties resolve by slot index so the
    /// order is stable across recompiles.
    fn topological_sort(nodes: &[NodeSlot], consumers: &[Vec<usize>]) -> Vec<usize> {
        let n = nodes.len();
        let mut in_degree = vec![0usize; n];
        for targets in consumers {
            for &to in targets {
                in_degree[to] += 1;
            }
        }

        let mut queue: VecDeque<usize> = (0..n)
            .filter(|&i| !nodes[i].deleted && in_degree[i] == 0)
            .collect();
        let mut order = Vec::with_capacity(n);

        while let Some(node) = queue.pop_front() {
            order.push(node);
            for &next in &consumers[node] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    queue.push_back(next);
                }
            }
        }

        order
    }
}
