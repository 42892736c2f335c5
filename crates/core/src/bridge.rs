//! The page-context bridge.
//!
//! Runs where the render graph is reachable, answers [`BridgeCommand`]s from
//! the sandbox relay and reports back through an [`EventSink`]. Results are
//! broadcast, never returned, because the relay lives in another context.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::clock::Clock;
use crate::locator::{Located, RenderGraph, RestoreCapability, find_controller_capability};
use crate::protocol::{ApplyResult, BridgeCommand, BridgeEvent, StateBlob};
use crate::store::{BlobAccessor, BlobStore};

/// Outbound half of the bridge channel.
pub trait EventSink {
	fn emit(&self, event: BridgeEvent);
}

impl EventSink for RefCell<Vec<BridgeEvent>> {
	fn emit(&self, event: BridgeEvent) {
		self.borrow_mut().push(event);
	}
}

impl<T: EventSink + ?Sized> EventSink for Rc<T> {
	fn emit(&self, event: BridgeEvent) {
		(**self).emit(event)
	}
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
	fn emit(&self, event: BridgeEvent) {
		(**self).emit(event)
	}
}

pub struct PageBridge<G: RenderGraph, S, C, E> {
	graph: G,
	accessor: BlobAccessor<S>,
	clock: C,
	sink: E,
	cached: Option<G::Capability>,
}

impl<G, S, C, E> PageBridge<G, S, C, E>
where
	G: RenderGraph,
	S: BlobStore,
	C: Clock,
	E: EventSink,
{
	pub fn new(graph: G, accessor: BlobAccessor<S>, clock: C, sink: E) -> Self {
		Self {
			graph,
			accessor,
			clock,
			sink,
			cached: None,
		}
	}

	pub fn handle(&mut self, command: BridgeCommand) {
		match command {
			BridgeCommand::FindRequest => {
				self.find_instance();
			}
			BridgeCommand::ApplyBlob { blob } => {
				self.apply_blob(blob.as_deref());
			}
		}
	}

	/// Searches the graph, caches a hit and broadcasts the status.
	pub fn find_instance(&mut self) -> Option<G::Capability> {
		let located = find_controller_capability(&self.graph, &self.clock);
		let status = located.status();
		debug!(?status, "instance search finished");
		self.sink.emit(BridgeEvent::InstanceStatus(status));

		match located {
			Located::Captured { handle, .. } => {
				self.cached = Some(handle.clone());
				Some(handle)
			}
			Located::Missing(_) => None,
		}
	}

	/// Persists `blob` and asks the controller to restore from it.
	///
	/// Empty or missing blobs are ignored without emitting anything. Returns
	/// whether the restore call succeeded.
	pub fn apply_blob(&mut self, blob: Option<&str>) -> bool {
		let Some(blob) = blob.and_then(|b| StateBlob::new(b).ok()) else {
			return false;
		};

		let handle = match self.cached.as_ref().filter(|h| h.is_live()) {
			Some(handle) => Some(handle.clone()),
			None => {
				self.cached = None;
				self.find_instance()
			}
		};
		let Some(handle) = handle else {
			warn!("controller instance not available");
			self.sink.emit(BridgeEvent::ApplyResult(ApplyResult::instance_unavailable()));
			return false;
		};

		if let Err(err) = self.accessor.write(&blob) {
			warn!(error = %err, "failed to persist blob");
			self.sink.emit(BridgeEvent::ApplyResult(ApplyResult::restore_failed(err.to_string())));
			return false;
		}

		match handle.restore() {
			Ok(()) => {
				debug!(len = blob.len(), "blob applied");
				self.sink.emit(BridgeEvent::ApplyResult(ApplyResult::applied()));
				true
			}
			Err(message) => {
				warn!(%message, "failed to apply blob");
				self.sink.emit(BridgeEvent::ApplyResult(ApplyResult::restore_failed(message)));
				false
			}
		}
	}

	pub fn cached(&self) -> Option<&G::Capability> {
		self.cached.as_ref()
	}

	pub fn accessor(&self) -> &BlobAccessor<S> {
		&self.accessor
	}

	pub fn graph(&self) -> &G {
		&self.graph
	}

	/// Mutable access to the graph, e.g. to model a page re-render.
	pub fn graph_mut(&mut self) -> &mut G {
		&mut self.graph
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicUsize, Ordering};

	use super::*;
	use crate::locator::arena::{ArenaGraph, Controller};
	use crate::protocol::{ApplyFailure, InstanceStatus};
	use crate::store::MemoryStore;

	const FIBER_KEY: &str = "__reactFiber$zz";

	#[derive(Default)]
	struct Playtester {
		restores: AtomicUsize,
		fail_with: Option<String>,
	}

	impl Controller for Playtester {
		fn can_restore(&self) -> bool {
			true
		}

		fn restore_save_state(&self) -> Result<(), String> {
			self.restores.fetch_add(1, Ordering::SeqCst);
			match &self.fail_with {
				Some(msg) => Err(msg.clone()),
				None => Ok(()),
			}
		}
	}

	fn board_with(app: Arc<Playtester>) -> ArenaGraph {
		let mut graph = ArenaGraph::new();
		let root = graph.add_node();
		let node = graph.add_node();
		graph.link(root, crate::locator::Edge::Child, node);
		graph.link(node, crate::locator::Edge::Return, root);
		graph.set_controller(node, app);
		let host = graph.add_host();
		graph.set_property(host, FIBER_KEY, Some(root));
		graph
	}

	type TestBridge = PageBridge<ArenaGraph, Arc<MemoryStore>, fn() -> f64, Rc<RefCell<Vec<BridgeEvent>>>>;

	fn bridge(graph: ArenaGraph) -> (TestBridge, Arc<MemoryStore>, Rc<RefCell<Vec<BridgeEvent>>>) {
		let store = Arc::new(MemoryStore::new());
		let events = Rc::new(RefCell::new(Vec::new()));
		let zero: fn() -> f64 = || 0.0;
		let bridge = PageBridge::new(graph, BlobAccessor::new(store.clone()), zero, events.clone());
		(bridge, store, events)
	}

	fn apply_results(events: &RefCell<Vec<BridgeEvent>>) -> Vec<ApplyResult> {
		events
			.borrow()
			.iter()
			.filter_map(|e| match e {
				BridgeEvent::ApplyResult(r) => Some(r.clone()),
				_ => None,
			})
			.collect()
	}

	#[test]
	fn empty_or_missing_blob_is_ignored_silently() {
		let app = Arc::new(Playtester::default());
		let (mut bridge, store, events) = bridge(board_with(app.clone()));

		assert!(!bridge.apply_blob(Some("")));
		assert!(!bridge.apply_blob(None));
		bridge.handle(BridgeCommand::ApplyBlob { blob: None });

		assert_eq!(app.restores.load(Ordering::SeqCst), 0);
		assert!(events.borrow().is_empty());
		assert_eq!(store.get_item(crate::protocol::SAVE_STATE_KEY).unwrap(), None);
	}

	#[test]
	fn apply_writes_store_then_restores() {
		let app = Arc::new(Playtester::default());
		let (mut bridge, store, events) = bridge(board_with(app.clone()));

		assert!(bridge.apply_blob(Some("AAA")));

		assert_eq!(
			store.get_item(crate::protocol::SAVE_STATE_KEY).unwrap().as_deref(),
			Some("AAA")
		);
		assert_eq!(app.restores.load(Ordering::SeqCst), 1);
		assert_eq!(apply_results(&events), vec![ApplyResult::applied()]);
		// The synchronous search reported its capture first.
		assert!(matches!(
			events.borrow()[0],
			BridgeEvent::InstanceStatus(InstanceStatus::Captured { .. })
		));
	}

	#[test]
	fn cached_handle_skips_search() {
		let app = Arc::new(Playtester::default());
		let (mut bridge, _, events) = bridge(board_with(app.clone()));

		bridge.handle(BridgeCommand::FindRequest);
		assert!(bridge.cached().is_some());
		events.borrow_mut().clear();

		bridge.apply_blob(Some("AAA"));
		assert_eq!(events.borrow().len(), 1);
		assert_eq!(app.restores.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn missing_instance_is_reported_not_retried() {
		let (mut bridge, store, events) = bridge(ArenaGraph::new());

		assert!(!bridge.apply_blob(Some("AAA")));

		let results = apply_results(&events);
		assert_eq!(results, vec![ApplyResult::instance_unavailable()]);
		assert_eq!(results[0].reason, Some(ApplyFailure::InstanceUnavailable));
		assert_eq!(store.get_item(crate::protocol::SAVE_STATE_KEY).unwrap(), None);
	}

	#[test]
	fn restore_error_is_reported_with_message() {
		let app = Arc::new(Playtester {
			fail_with: Some("board not mounted".into()),
			..Default::default()
		});
		let (mut bridge, _, events) = bridge(board_with(app));

		assert!(!bridge.apply_blob(Some("AAA")));
		assert_eq!(
			apply_results(&events),
			vec![ApplyResult::restore_failed("board not mounted")]
		);
	}

	#[test]
	fn stale_cache_is_relocated_after_rerender() {
		let first = Arc::new(Playtester::default());
		let (mut bridge, _, _) = bridge(board_with(first.clone()));
		bridge.find_instance();
		drop(first);

		let second = Arc::new(Playtester::default());
		*bridge.graph_mut() = board_with(second.clone());

		assert!(bridge.apply_blob(Some("BBB")));
		assert_eq!(second.restores.load(Ordering::SeqCst), 1);
	}
}
