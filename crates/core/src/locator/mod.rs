//! Search for the application's controller inside its render graph.
//!
//! The rendering framework hangs an internal node off each DOM element under
//! an own property named `__reactFiber$<suffix>`. Those nodes link to one
//! another through `child`, `sibling`, `return` and `alternate` edges; the
//! last two point back up and across, so the structure is a cyclic graph,
//! not a tree.
//!
//! [`find_controller_capability`] walks it iteratively with a visited set
//! shared by every root of one search, so each node is inspected at most once
//! and the walk ends after at most as many visits as the graph has nodes. The
//! first node whose controller exposes [`RESTORE_ENTRY_POINT`] wins.
//!
//! Callers only ever see the resulting [`RestoreCapability`]; the graph's
//! shape stays behind [`RenderGraph`].
//!
//! [`RESTORE_ENTRY_POINT`]: crate::protocol::RESTORE_ENTRY_POINT

pub mod arena;
#[cfg(test)]
mod tests;

use std::collections::HashSet;

use crate::clock::{Clock, elapsed_ms};
use crate::protocol::{FIBER_KEY_PREFIX, InstanceStatus};

/// Edges followed from a render node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
	Child,
	Sibling,
	/// Parent link.
	Return,
	/// The node's other snapshot (current vs. work-in-progress).
	Alternate,
}

impl Edge {
	/// Push order onto the search stack. The stack pops in reverse.
	pub const TRAVERSAL_ORDER: [Edge; 4] = [Edge::Child, Edge::Sibling, Edge::Return, Edge::Alternate];

	/// Property name of the edge on a framework node.
	pub fn field(self) -> &'static str {
		match self {
			Edge::Child => "child",
			Edge::Sibling => "sibling",
			Edge::Return => "return",
			Edge::Alternate => "alternate",
		}
	}
}

/// A located controller that can reload the board from storage.
///
/// Handles are not owning: a page reload can tear the controller down while
/// a handle is cached, so callers check [`is_live`](Self::is_live) first.
pub trait RestoreCapability {
	fn is_live(&self) -> bool {
		true
	}

	/// Invokes the controller's restore entry point.
	fn restore(&self) -> Result<(), String>;
}

/// Read-only view over a page's render graph.
pub trait RenderGraph {
	/// A DOM element.
	type Host;
	/// A framework node.
	type Node;
	type Capability: RestoreCapability + Clone;

	/// Every host element, in document order.
	fn hosts(&self) -> Vec<Self::Host>;

	/// Own property names of a host element.
	fn property_keys(&self, host: &Self::Host) -> Vec<String>;

	/// The framework node stored under `key`, if the value is a node.
	fn property(&self, host: &Self::Host, key: &str) -> Option<Self::Node>;

	/// Stable identity of a node for the visited set.
	fn identity(&self, node: &Self::Node) -> u64;

	fn edge(&self, node: &Self::Node, edge: Edge) -> Option<Self::Node>;

	/// The node's controller, when it exposes the restore entry point.
	fn capability(&self, node: &Self::Node) -> Option<Self::Capability>;

	/// Called once a capability is captured, e.g. to pin it on the page.
	fn on_captured(&self, _capability: &Self::Capability) {}
}

/// Search diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LocateReport {
	/// Host elements examined, all of them when the search misses.
	pub hosts_scanned: usize,
	/// Framework roots found on those hosts.
	pub fibers_checked: usize,
	/// Distinct framework nodes inspected.
	pub nodes_visited: usize,
	pub duration_ms: u64,
}

#[derive(Debug, Clone)]
pub enum Located<C> {
	Captured { handle: C, report: LocateReport },
	Missing(LocateReport),
}

impl<C> Located<C> {
	pub fn report(&self) -> &LocateReport {
		match self {
			Located::Captured { report, .. } | Located::Missing(report) => report,
		}
	}

	pub fn handle(self) -> Option<C> {
		match self {
			Located::Captured { handle, .. } => Some(handle),
			Located::Missing(_) => None,
		}
	}

	/// Status message for the bridge channel.
	pub fn status(&self) -> InstanceStatus {
		match self {
			Located::Captured { report, .. } => InstanceStatus::Captured {
				duration_ms: report.duration_ms,
				fibers_checked: report.fibers_checked,
				nodes_visited: report.nodes_visited,
			},
			Located::Missing(report) => InstanceStatus::Missing {
				nodes_checked: report.hosts_scanned,
				fibers_checked: report.fibers_checked,
				nodes_visited: report.nodes_visited,
				duration_ms: report.duration_ms,
			},
		}
	}
}

/// Finds the first controller exposing the restore capability.
pub fn find_controller_capability<G, C>(graph: &G, clock: &C) -> Located<G::Capability>
where
	G: RenderGraph,
	C: Clock + ?Sized,
{
	let started = clock.now_ms();
	let hosts = graph.hosts();
	let mut report = LocateReport::default();
	let mut visited = HashSet::new();
	let mut stack = Vec::new();

	for host in &hosts {
		report.hosts_scanned += 1;
		for key in graph.property_keys(host) {
			if !key.starts_with(FIBER_KEY_PREFIX) {
				continue;
			}
			let Some(root) = graph.property(host, &key) else {
				continue;
			};
			report.fibers_checked += 1;

			if let Some(handle) = walk(graph, root, &mut visited, &mut stack) {
				report.nodes_visited = visited.len();
				report.duration_ms = elapsed_ms(started, clock.now_ms());
				graph.on_captured(&handle);
				return Located::Captured { handle, report };
			}
		}
	}

	report.nodes_visited = visited.len();
	report.duration_ms = elapsed_ms(started, clock.now_ms());
	Located::Missing(report)
}

fn walk<G: RenderGraph>(
	graph: &G,
	root: G::Node,
	visited: &mut HashSet<u64>,
	stack: &mut Vec<G::Node>,
) -> Option<G::Capability> {
	stack.clear();
	stack.push(root);

	while let Some(node) = stack.pop() {
		if !visited.insert(graph.identity(&node)) {
			continue;
		}
		if let Some(capability) = graph.capability(&node) {
			return Some(capability);
		}
		for edge in Edge::TRAVERSAL_ORDER {
			if let Some(next) = graph.edge(&node, edge) {
				if !visited.contains(&graph.identity(&next)) {
					stack.push(next);
				}
			}
		}
	}

	None
}
