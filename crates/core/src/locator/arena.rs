//! Index-based [`RenderGraph`] for native hosts, snapshots and tests.
//!
//! Nodes own their controllers; handles handed out by the locator hold only
//! a [`Weak`] reference, so dropping or replacing the graph invalidates them
//! the way a page reload does in a browser.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};

use super::{Edge, RenderGraph, RestoreCapability};
use crate::error::{Error, Result};
use crate::protocol::RESTORE_ENTRY_POINT;

/// The application object a render node points at (`stateNode`).
pub trait Controller: Send + Sync {
	/// Whether the object exposes a callable restore entry point.
	fn can_restore(&self) -> bool;

	fn restore_save_state(&self) -> std::result::Result<(), String>;
}

/// Node index inside an [`ArenaGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Host element index inside an [`ArenaGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostId(pub usize);

#[derive(Default)]
struct ArenaNode {
	edges: [Option<NodeId>; 4],
	controller: Option<Arc<dyn Controller>>,
}

#[derive(Default)]
struct ArenaHost {
	properties: Vec<(String, Option<NodeId>)>,
}

#[derive(Default)]
pub struct ArenaGraph {
	hosts: Vec<ArenaHost>,
	nodes: Vec<ArenaNode>,
}

fn edge_slot(edge: Edge) -> usize {
	match edge {
		Edge::Child => 0,
		Edge::Sibling => 1,
		Edge::Return => 2,
		Edge::Alternate => 3,
	}
}

impl ArenaGraph {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn node_count(&self) -> usize {
		self.nodes.len()
	}

	pub fn add_node(&mut self) -> NodeId {
		self.nodes.push(ArenaNode::default());
		NodeId(self.nodes.len() - 1)
	}

	pub fn add_host(&mut self) -> HostId {
		self.hosts.push(ArenaHost::default());
		HostId(self.hosts.len() - 1)
	}

	/// Sets `key` on a host. `None` models a property holding `null`.
	pub fn set_property(&mut self, host: HostId, key: impl Into<String>, node: Option<NodeId>) {
		self.hosts[host.0].properties.push((key.into(), node));
	}

	pub fn link(&mut self, from: NodeId, edge: Edge, to: NodeId) {
		self.nodes[from.0].edges[edge_slot(edge)] = Some(to);
	}

	pub fn set_controller(&mut self, node: NodeId, controller: Arc<dyn Controller>) {
		self.nodes[node.0].controller = Some(controller);
	}

	/// Builds a graph from its JSON snapshot form.
	pub fn from_snapshot(snapshot: GraphSnapshot) -> Result<Self> {
		let count = snapshot.nodes.len();
		let check = |index: Option<usize>, what: &str| -> Result<Option<NodeId>> {
			match index {
				Some(i) if i >= count => Err(Error::Snapshot(format!(
					"{what} points at node {i} but only {count} nodes exist"
				))),
				other => Ok(other.map(NodeId)),
			}
		};

		let mut graph = ArenaGraph::new();
		for _ in 0..count {
			graph.add_node();
		}

		for (i, node) in snapshot.nodes.into_iter().enumerate() {
			let id = NodeId(i);
			for (edge, target) in [
				(Edge::Child, node.child),
				(Edge::Sibling, node.sibling),
				(Edge::Return, node.return_),
				(Edge::Alternate, node.alternate),
			] {
				if let Some(to) = check(target, &format!("node {i}.{}", edge.field()))? {
					graph.link(id, edge, to);
				}
			}
			if let Some(state_node) = node.state_node {
				graph.set_controller(id, Arc::new(state_node));
			}
		}

		for (h, host) in snapshot.hosts.into_iter().enumerate() {
			let id = graph.add_host();
			for (key, target) in host.properties {
				let target = check(target, &format!("host {h}.{key}"))?;
				graph.set_property(id, key, target);
			}
		}

		Ok(graph)
	}

	pub fn from_snapshot_file(path: &Path) -> Result<Self> {
		let content = std::fs::read_to_string(path)?;
		Self::from_snapshot(serde_json::from_str(&content)?)
	}
}

/// Non-owning handle to an arena controller.
#[derive(Clone)]
pub struct ControllerRef(Weak<dyn Controller>);

impl RestoreCapability for ControllerRef {
	fn is_live(&self) -> bool {
		self.0.strong_count() > 0
	}

	fn restore(&self) -> std::result::Result<(), String> {
		match self.0.upgrade() {
			Some(controller) => controller.restore_save_state(),
			None => Err("controller was torn down".to_string()),
		}
	}
}

impl RenderGraph for ArenaGraph {
	type Host = HostId;
	type Node = NodeId;
	type Capability = ControllerRef;

	fn hosts(&self) -> Vec<HostId> {
		(0..self.hosts.len()).map(HostId).collect()
	}

	fn property_keys(&self, host: &HostId) -> Vec<String> {
		self.hosts[host.0].properties.iter().map(|(k, _)| k.clone()).collect()
	}

	fn property(&self, host: &HostId, key: &str) -> Option<NodeId> {
		self.hosts[host.0]
			.properties
			.iter()
			.find(|(k, _)| k == key)
			.and_then(|(_, node)| *node)
	}

	fn identity(&self, node: &NodeId) -> u64 {
		node.0 as u64
	}

	fn edge(&self, node: &NodeId, edge: Edge) -> Option<NodeId> {
		self.nodes[node.0].edges[edge_slot(edge)]
	}

	fn capability(&self, node: &NodeId) -> Option<ControllerRef> {
		let controller = self.nodes[node.0].controller.as_ref()?;
		controller
			.can_restore()
			.then(|| ControllerRef(Arc::downgrade(controller)))
	}
}

/// Serialized render graph, as captured from a page for offline diagnosis.
///
/// ```json
/// {
///   "hosts": [{"tag": "div", "properties": {"__reactFiber$x1": 0}}],
///   "nodes": [{"child": 1, "return": null, "stateNode": {"methods": ["handleRestoreSaveState"]}}]
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
	#[serde(default)]
	pub hosts: Vec<HostSnapshot>,
	#[serde(default)]
	pub nodes: Vec<NodeSnapshot>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostSnapshot {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub tag: Option<String>,
	/// Own properties; values are node indices or `null`.
	#[serde(default)]
	pub properties: BTreeMap<String, Option<usize>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSnapshot {
	#[serde(default)]
	pub child: Option<usize>,
	#[serde(default)]
	pub sibling: Option<usize>,
	#[serde(default, rename = "return")]
	pub return_: Option<usize>,
	#[serde(default)]
	pub alternate: Option<usize>,
	#[serde(default)]
	pub state_node: Option<StateNodeSnapshot>,
}

/// Controller recorded in a snapshot: only its callable member names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateNodeSnapshot {
	#[serde(default)]
	pub methods: Vec<String>,
}

impl Controller for StateNodeSnapshot {
	fn can_restore(&self) -> bool {
		self.methods.iter().any(|m| m == RESTORE_ENTRY_POINT)
	}

	fn restore_save_state(&self) -> std::result::Result<(), String> {
		Err("snapshot controllers cannot restore".to_string())
	}
}
