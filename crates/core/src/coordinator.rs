//! Process-wide routing of board changes between sandboxes.
//!
//! Delivery is best effort: a notification for a partition with no live
//! sandbox is dropped on the floor. The publishing relay already coalesces to
//! "latest wins", so the next change after the target comes up will carry the
//! current board anyway.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::protocol::{ChangeNotification, PartitionKey, StateUpdate};

/// Sending half towards one sandbox relay.
pub trait SandboxLink {
	/// Queues `update`; `false` when the sandbox end has gone away.
	fn deliver(&self, update: StateUpdate) -> bool;
}

/// Live sandboxes by partition. At most one link per partition.
#[derive(Debug)]
pub struct SandboxRegistry<L> {
	links: HashMap<PartitionKey, L>,
}

impl<L> Default for SandboxRegistry<L> {
	fn default() -> Self {
		Self {
			links: HashMap::new(),
		}
	}
}

impl<L> SandboxRegistry<L> {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a live sandbox, refusing a partition that already has one.
	pub fn register(&mut self, partition: PartitionKey, link: L) -> Result<()> {
		if self.links.contains_key(&partition) {
			return Err(Error::AlreadyRegistered(partition));
		}
		info!(%partition, "sandbox registered");
		self.links.insert(partition, link);
		Ok(())
	}

	pub fn unregister(&mut self, partition: &PartitionKey) -> Option<L> {
		let link = self.links.remove(partition);
		if link.is_some() {
			info!(%partition, "sandbox closed");
		}
		link
	}

	pub fn get(&self, partition: &PartitionKey) -> Option<&L> {
		self.links.get(partition)
	}

	pub fn contains(&self, partition: &PartitionKey) -> bool {
		self.links.contains_key(partition)
	}

	pub fn len(&self) -> usize {
		self.links.len()
	}

	pub fn is_empty(&self) -> bool {
		self.links.is_empty()
	}

	/// Registered partitions in sorted order.
	pub fn partitions(&self) -> Vec<PartitionKey> {
		let mut keys: Vec<_> = self.links.keys().cloned().collect();
		keys.sort();
		keys
	}
}

/// What happened to a routed notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
	Delivered,
	Dropped,
}

pub struct Coordinator<L> {
	registry: SandboxRegistry<L>,
	now: fn() -> u64,
}

#[cfg(not(all(target_arch = "wasm32", target_os = "unknown")))]
impl<L: SandboxLink> Default for Coordinator<L> {
	fn default() -> Self {
		Self::with_clock(crate::clock::unix_millis)
	}
}

impl<L: SandboxLink> Coordinator<L> {
	#[cfg(not(all(target_arch = "wasm32", target_os = "unknown")))]
	pub fn new() -> Self {
		Self::default()
	}

	/// Coordinator stamping updates with `now()` (Unix milliseconds).
	pub fn with_clock(now: fn() -> u64) -> Self {
		Self {
			registry: SandboxRegistry::new(),
			now,
		}
	}

	pub fn registry(&self) -> &SandboxRegistry<L> {
		&self.registry
	}

	pub fn registry_mut(&mut self) -> &mut SandboxRegistry<L> {
		&mut self.registry
	}

	pub fn register(&mut self, partition: PartitionKey, link: L) -> Result<()> {
		self.registry.register(partition, link)
	}

	pub fn unregister(&mut self, partition: &PartitionKey) -> Option<L> {
		self.registry.unregister(partition)
	}

	/// Forwards a notification to its target sandbox.
	///
	/// Unknown targets are dropped silently. A link that reports itself
	/// closed is removed from the registry.
	pub fn route(&mut self, notification: ChangeNotification) -> Delivery {
		let ChangeNotification {
			blob,
			target_partition_key: target,
		} = notification;

		let Some(link) = self.registry.get(&target) else {
			return Delivery::Dropped;
		};

		let update = StateUpdate {
			blob,
			timestamp: (self.now)(),
		};
		if link.deliver(update) {
			debug!(%target, "forwarded board state");
			Delivery::Delivered
		} else {
			self.registry.unregister(&target);
			Delivery::Dropped
		}
	}
}

#[cfg(test)]
mod tests {
	use std::cell::RefCell;
	use std::rc::Rc;

	use super::*;
	use crate::protocol::StateBlob;

	#[derive(Clone, Default)]
	struct Inbox {
		received: Rc<RefCell<Vec<StateUpdate>>>,
		closed: bool,
	}

	impl SandboxLink for Inbox {
		fn deliver(&self, update: StateUpdate) -> bool {
			if self.closed {
				return false;
			}
			self.received.borrow_mut().push(update);
			true
		}
	}

	fn note(blob: &str, target: &str) -> ChangeNotification {
		ChangeNotification {
			blob: StateBlob::new(blob).unwrap(),
			target_partition_key: target.into(),
		}
	}

	fn coordinator() -> Coordinator<Inbox> {
		Coordinator::with_clock(|| 42)
	}

	#[test]
	fn forwards_blob_with_timestamp() {
		let mut coord = coordinator();
		let remote = Inbox::default();
		coord.register("persist:remote-board".into(), remote.clone()).unwrap();

		assert_eq!(coord.route(note("AAA", "persist:remote-board")), Delivery::Delivered);

		let received = remote.received.borrow();
		assert_eq!(received.len(), 1);
		assert_eq!(received[0].blob.as_str(), "AAA");
		assert_eq!(received[0].timestamp, 42);
	}

	#[test]
	fn unknown_target_is_dropped_without_delivery() {
		let mut coord = coordinator();
		let remote = Inbox::default();
		coord.register("persist:remote-board".into(), remote.clone()).unwrap();

		assert_eq!(coord.route(note("AAA", "persist:nobody")), Delivery::Dropped);
		assert!(remote.received.borrow().is_empty());
	}

	#[test]
	fn duplicate_registration_is_refused() {
		let mut coord = coordinator();
		coord.register("persist:local-board".into(), Inbox::default()).unwrap();
		let err = coord.register("persist:local-board".into(), Inbox::default());
		assert!(matches!(err, Err(Error::AlreadyRegistered(_))));
		assert_eq!(coord.registry().len(), 1);
	}

	#[test]
	fn closed_link_is_unregistered() {
		let mut coord = coordinator();
		let closed = Inbox {
			closed: true,
			..Default::default()
		};
		coord.register("persist:remote-board".into(), closed).unwrap();

		assert_eq!(coord.route(note("AAA", "persist:remote-board")), Delivery::Dropped);
		assert!(coord.registry().is_empty());
	}

	#[test]
	fn reregistration_after_close_is_allowed() {
		let mut coord = coordinator();
		let key: PartitionKey = "persist:remote-board".into();
		coord.register(key.clone(), Inbox::default()).unwrap();
		assert!(coord.unregister(&key).is_some());
		assert!(coord.register(key.clone(), Inbox::default()).is_ok());
		assert_eq!(coord.registry().partitions(), vec![key]);
	}
}
