/// Compiled evaluation plan for a flow graph.
/// Lists every live node in topological order, producers before consumers.
#[derive(Debug, Clone)]
pub struct CompiledPlan {
    /// Live node indices in topological order
    pub order: Vec<usize>,

    /// Consumers of each node, indexed like the graph's node slots
    pub consumers: Vec<Vec<usize>>,

    /// Pre-computed edge routing (producer_idx, consumer_idx)
    pub edges: Vec<(usize, usize)>,

    /// Cache invalidation generation number
    pub generation: u64,

    /// Compilation statistics
    pub stats: PlanStats,
}

/// Statistics about the compiled plan
#[derive(Debug, Clone, Default)]
pub struct PlanStats {
    /// Number of live nodes in the graph
    pub total_nodes: usize,

    /// Number of nodes that made it into `order`
    pub scheduled_nodes: usize,

    /// Nodes without inputs (acquisition channels)
    pub source_nodes: usize,

    /// Nodes without output streams (triggers)
    pub sink_nodes: usize,

    /// Compilation time in microseconds
    pub compile_time_us: u64,
}

impl CompiledPlan {
    /// Create a new empty compiled plan
    pub fn new() -> Self {
        Self {
            order: Vec::new(),
            consumers: Vec::new(),
            edges: Vec::new(),
            generation: 0,
            stats: PlanStats::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Every node reachable downstream of a `true` entry in `dirty`,
    /// including the dirty nodes themselves.
    pub fn downstream_of(&self, dirty: &[bool]) -> Vec<bool> {
        let n = self.consumers.len();
        let mut reached = vec![false; n];
        let mut stack: Vec<usize> = dirty
            .iter()
            .enumerate()
            .filter(|&(i, &d)| d && i < n)
            .map(|(i, _)| i)
            .collect();
        for &i in &stack {
            reached[i] = true;
        }

        while let Some(node) = stack.pop() {
            for &next in &self.consumers[node] {
                if !reached[next] {
                    reached[next] = true;
                    stack.push(next);
                }
            }
        }

        reached
    }
}

impl Default for CompiledPlan {
    fn default() -> Self {
        Self::new()
    }
}
