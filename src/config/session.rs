//! Saved flow graphs.
//!
//! A session document lists processing nodes with their parameters and
//! wiring. Channels are recorded by name only; on restore they are matched
//! against channels already present in the target graph, since channels
//! come from instruments rather than from the document.
//!
//! Restoring is lenient: anything that cannot be applied is skipped and
//! reported as a warning, and the rest of the document still loads.

use crate::error::{Result, ScopeFlowError};
use crate::graph::executor::FlowGraph;
use crate::graph::id::{InstrumentId, NodeId};
use crate::graph::node_type::{NodeFactory, NodeType};
use crate::graph::parameter::{ParameterType, ParameterValue};
use crate::graph::unit::Unit;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const SESSION_VERSION: u32 = 1;

fn default_version() -> u32 {
    SESSION_VERSION
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDocument {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub nodes: Vec<NodeDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDocument {
    /// Id in the graph the document was captured from
    pub id: u32,

    /// `None` for plugin nodes, which cannot be recreated
    #[serde(default)]
    pub kind: Option<NodeType>,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument: Option<InstrumentId>,

    #[serde(default)]
    pub parameters: BTreeMap<String, ParameterDocument>,

    #[serde(default)]
    pub inputs: Vec<InputDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDocument {
    pub value: ParameterValue,

    /// Unit name, informational
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputDocument {
    pub name: String,

    /// Producing node, by document id. `None` for an unbound input.
    #[serde(default)]
    pub node: Option<u32>,

    #[serde(default)]
    pub stream: usize,
}

/// Outcome of [`SessionDocument::restore`].
#[derive(Debug, Clone, Default)]
pub struct RestoreReport {
    /// Document id to id in the target graph
    pub id_map: BTreeMap<u32, NodeId>,
    pub warnings: Vec<String>,
}

impl RestoreReport {
    fn warn(&mut self, message: String) {
        tracing::warn!("Session restore: {}", message);
        self.warnings.push(message);
    }
}

impl Default for SessionDocument {
    fn default() -> Self {
        Self {
            version: SESSION_VERSION,
            nodes: Vec::new(),
        }
    }
}

impl SessionDocument {
    /// Snapshot every live node of `graph`.
    pub fn capture(graph: &FlowGraph) -> Self {
        let nodes = graph
            .node_ids()
            .filter_map(|id| {
                let node = graph.node(id).ok()?;
                let core = node.core();

                let parameters = core
                    .parameters()
                    .map(|(name, p)| {
                        let unit = match p.kind() {
                            ParameterType::Int | ParameterType::Float => Some(p.unit().name().to_string()),
                            _ => None,
                        };
                        (name.to_string(), ParameterDocument { value: p.value(), unit })
                    })
                    .collect();

                let inputs = (0..core.input_count())
                    .map(|i| {
                        let desc = core.input(i);
                        InputDocument {
                            name: core.input_name(i).unwrap_or_default().to_string(),
                            node: desc.node.map(|n| n.0),
                            stream: desc.stream,
                        }
                    })
                    .collect();

                Some(NodeDocument {
                    id: id.0,
                    kind: NodeType::of(node),
                    name: node.name().to_string(),
                    instrument: node.instrument().map(|i| i.id()),
                    parameters,
                    inputs,
                })
            })
            .collect();

        Self {
            version: SESSION_VERSION,
            nodes,
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ScopeFlowError::Config(format!("Failed to read session {:?}: {}", path, e))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            ScopeFlowError::Serialization(format!("Failed to parse session {:?}: {}", path, e))
        })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ScopeFlowError::Config(format!("Failed to create session directory: {}", e))
            })?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| {
            ScopeFlowError::Config(format!("Failed to write session {:?}: {}", path, e))
        })
    }

    /// Human-readable warnings about what loading this document into
    /// `graph` would do to the hardware. Nodes are matched by name.
    /// Nothing is changed.
    pub fn preflight(&self, graph: &FlowGraph) -> Vec<String> {
        let mut warnings = Vec::new();

        for doc in &self.nodes {
            let Some(node) = graph.find_node(&doc.name).and_then(|id| graph.node(id).ok()) else {
                continue;
            };
            if node.instrument().is_none() {
                continue;
            }

            for (name, pd) in &doc.parameters {
                let Some(param) = node.parameter(name) else {
                    continue;
                };
                if param.kind() != ParameterType::Float || !is_power_unit(param.unit()) {
                    continue;
                }
                let new = match pd.value {
                    ParameterValue::Float(v) => v,
                    ParameterValue::Int(v) => v as f64,
                    _ => continue,
                };
                let old = param.as_float();
                if new > old {
                    let unit = param.unit().name();
                    warnings.push(format!(
                        "{}: this will increase {} from {:.3} {} to {:.3} {}",
                        doc.name, name, old, unit, new, unit
                    ));
                }
            }
        }

        warnings
    }

    /// Recreate the document's nodes in `graph`.
    ///
    /// Channel entries bind to existing channels of the same name. Every
    /// input is re-validated through the normal binding path, so a
    /// document edited by hand cannot produce wiring the nodes reject.
    pub fn restore(&self, graph: &mut FlowGraph, factory: &NodeFactory) -> RestoreReport {
        let mut report = RestoreReport::default();

        if self.version > SESSION_VERSION {
            report.warn(format!(
                "document version {} is newer than supported version {}",
                self.version, SESSION_VERSION
            ));
        }

        // Nodes
        for doc in &self.nodes {
            let Some(kind) = doc.kind else {
                report.warn(format!("'{}' is a plugin node, skipped", doc.name));
                continue;
            };

            if kind == NodeType::Channel {
                match graph.find_node(&doc.name) {
                    Some(id) => {
                        report.id_map.insert(doc.id, id);
                    }
                    None => report.warn(format!("channel '{}' not present", doc.name)),
                }
                continue;
            }

            match factory.create(kind, doc.instrument) {
                Ok(mut node) => {
                    node.core_mut().set_display_name(doc.name.clone());
                    let id = graph.add_node(node);
                    report.id_map.insert(doc.id, id);
                }
                Err(e) => report.warn(format!("cannot create '{}': {}", doc.name, e)),
            }
        }

        // Parameters
        for doc in &self.nodes {
            let Some(&id) = report.id_map.get(&doc.id) else {
                continue;
            };
            for (name, pd) in &doc.parameters {
                let skip = match graph.node(id).map(|n| (n.parameter(name), n.instrument())) {
                    Ok((None, _)) => Some(format!("'{}' has no parameter '{}'", doc.name, name)),
                    Ok((Some(p), instrument)) => match p.required_capability() {
                        Some(cap) if !instrument.is_some_and(|i| i.has(cap)) => Some(format!(
                            "'{}': parameter '{}' needs {:?}, skipped",
                            doc.name, name, cap
                        )),
                        _ => None,
                    },
                    Err(e) => Some(e.to_string()),
                };
                if let Some(message) = skip {
                    report.warn(message);
                    continue;
                }
                if let Err(e) = graph.set_parameter(id, name, &pd.value) {
                    report.warn(format!("'{}': {}", doc.name, e));
                }
            }
        }

        // Wiring
        for doc in &self.nodes {
            let Some(&id) = report.id_map.get(&doc.id) else {
                continue;
            };
            for input in &doc.inputs {
                let Some(source) = input.node else {
                    continue;
                };
                let Some(&producer) = report.id_map.get(&source) else {
                    report.warn(format!(
                        "'{}' input '{}': source node {} was not restored",
                        doc.name, input.name, source
                    ));
                    continue;
                };
                let bound = graph
                    .stream(producer, input.stream)
                    .and_then(|desc| graph.set_input_by_name(id, &input.name, desc, false));
                if let Err(e) = bound {
                    report.warn(format!("'{}' input '{}': {}", doc.name, input.name, e));
                }
            }
        }

        tracing::info!(
            "Restored {} node(s) with {} warning(s)",
            report.id_map.len(),
            report.warnings.len()
        );
        report
    }
}

fn is_power_unit(unit: Unit) -> bool {
    matches!(
        unit,
        Unit::Volts | Unit::Amps | Unit::Watts | Unit::Microvolts | Unit::Microamps
    )
}
