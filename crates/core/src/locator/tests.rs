use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::arena::{ArenaGraph, Controller, GraphSnapshot, NodeId};
use super::*;

const FIBER_KEY: &str = "__reactFiber$k3j9";

#[derive(Default)]
struct Playtester {
	restores: AtomicUsize,
}

impl Controller for Playtester {
	fn can_restore(&self) -> bool {
		true
	}

	fn restore_save_state(&self) -> Result<(), String> {
		self.restores.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}
}

struct Inert;

impl Controller for Inert {
	fn can_restore(&self) -> bool {
		false
	}

	fn restore_save_state(&self) -> Result<(), String> {
		unreachable!("inert controllers are never captured")
	}
}

fn no_clock() -> f64 {
	0.0
}

/// root -> a -> b, with every node pointing back up and an alternate ring.
fn cyclic_tree(graph: &mut ArenaGraph) -> (NodeId, NodeId, NodeId) {
	let root = graph.add_node();
	let a = graph.add_node();
	let b = graph.add_node();
	graph.link(root, Edge::Child, a);
	graph.link(a, Edge::Child, b);
	graph.link(a, Edge::Return, root);
	graph.link(b, Edge::Return, a);
	graph.link(root, Edge::Alternate, b);
	graph.link(b, Edge::Alternate, root);
	(root, a, b)
}

#[test]
fn captures_controller_below_host_fiber() {
	let mut graph = ArenaGraph::new();
	let (root, _, b) = cyclic_tree(&mut graph);
	let app = Arc::new(Playtester::default());
	graph.set_controller(b, app.clone());
	let host = graph.add_host();
	graph.set_property(host, FIBER_KEY, Some(root));

	let located = find_controller_capability(&graph, &no_clock);
	let report = *located.report();
	let handle = located.handle().expect("controller should be captured");

	handle.restore().unwrap();
	assert_eq!(app.restores.load(Ordering::SeqCst), 1);
	assert_eq!(report.fibers_checked, 1);
	assert!(report.nodes_visited <= graph.node_count());
}

#[test]
fn cyclic_graph_without_controller_terminates() {
	let mut graph = ArenaGraph::new();
	let (root, a, _) = cyclic_tree(&mut graph);
	graph.set_controller(a, Arc::new(Inert));
	let host = graph.add_host();
	graph.set_property(host, FIBER_KEY, Some(root));

	let located = find_controller_capability(&graph, &no_clock);
	assert!(matches!(located, Located::Missing(_)));
	assert_eq!(located.report().nodes_visited, graph.node_count());
}

#[test]
fn visited_set_is_shared_across_hosts() {
	let mut graph = ArenaGraph::new();
	let (root, a, b) = cyclic_tree(&mut graph);
	for node in [root, a, b] {
		let host = graph.add_host();
		graph.set_property(host, FIBER_KEY, Some(node));
	}

	let located = find_controller_capability(&graph, &no_clock);
	let report = located.report();
	assert_eq!(report.hosts_scanned, 3);
	assert_eq!(report.fibers_checked, 3);
	assert_eq!(report.nodes_visited, 3);
}

#[test]
fn only_fiber_prefixed_properties_are_roots() {
	let mut graph = ArenaGraph::new();
	let node = graph.add_node();
	graph.set_controller(node, Arc::new(Playtester::default()));
	let host = graph.add_host();
	graph.set_property(host, "__reactProps$k3j9", Some(node));
	graph.set_property(host, FIBER_KEY, None);

	let located = find_controller_capability(&graph, &no_clock);
	assert!(located.handle().is_none());
}

#[test]
fn first_host_in_document_order_wins() {
	let mut graph = ArenaGraph::new();
	let first = graph.add_node();
	let second = graph.add_node();
	let app_first = Arc::new(Playtester::default());
	let app_second = Arc::new(Playtester::default());
	graph.set_controller(first, app_first.clone());
	graph.set_controller(second, app_second.clone());
	for node in [first, second] {
		let host = graph.add_host();
		graph.set_property(host, FIBER_KEY, Some(node));
	}

	let handle = find_controller_capability(&graph, &no_clock).handle().unwrap();
	handle.restore().unwrap();
	assert_eq!(app_first.restores.load(Ordering::SeqCst), 1);
	assert_eq!(app_second.restores.load(Ordering::SeqCst), 0);
}

#[test]
fn missing_status_reports_scanned_hosts() {
	let mut graph = ArenaGraph::new();
	graph.add_host();
	graph.add_host();

	let status = find_controller_capability(&graph, &no_clock).status();
	assert_eq!(
		status,
		crate::protocol::InstanceStatus::Missing {
			nodes_checked: 2,
			fibers_checked: 0,
			nodes_visited: 0,
			duration_ms: 0,
		}
	);
}

#[test]
fn duration_comes_from_clock() {
	let graph = ArenaGraph::new();
	let ticks = std::cell::Cell::new(0.0);
	let clock = || {
		ticks.set(ticks.get() + 7.4);
		ticks.get()
	};
	assert_eq!(find_controller_capability(&graph, &clock).report().duration_ms, 7);
}

#[test]
fn handle_dies_with_its_graph() {
	let mut graph = ArenaGraph::new();
	let node = graph.add_node();
	graph.set_controller(node, Arc::new(Playtester::default()));
	let host = graph.add_host();
	graph.set_property(host, FIBER_KEY, Some(node));

	let handle = find_controller_capability(&graph, &no_clock).handle().unwrap();
	assert!(handle.is_live());
	drop(graph);
	assert!(!handle.is_live());
	assert!(handle.restore().is_err());
}

#[test]
fn snapshot_with_restore_method_is_captured() {
	let snapshot: GraphSnapshot = serde_json::from_value(serde_json::json!({
		"hosts": [
			{"tag": "div", "properties": {"__reactFiber$ab": 0, "__reactProps$ab": null}}
		],
		"nodes": [
			{"child": 1},
			{"return": 0, "sibling": 2, "stateNode": {"methods": ["render"]}},
			{"return": 0, "stateNode": {"methods": ["render", "handleRestoreSaveState"]}}
		]
	}))
	.unwrap();
	let graph = ArenaGraph::from_snapshot(snapshot).unwrap();

	let located = find_controller_capability(&graph, &no_clock);
	assert!(located.status().is_captured());
	assert_eq!(located.report().nodes_visited, 3);
}

#[test]
fn snapshot_with_dangling_edge_is_rejected() {
	let snapshot: GraphSnapshot = serde_json::from_value(serde_json::json!({
		"nodes": [{"child": 5}]
	}))
	.unwrap();
	assert!(ArenaGraph::from_snapshot(snapshot).is_err());
}
