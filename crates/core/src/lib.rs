//! State relay between two sandboxed copies of a board application.
//!
//! The pipeline, leaf-first:
//!
//! - [`store`]: the sandbox-scoped slot holding the serialized board
//! - [`locator`]: finds the application's controller in its render graph
//! - [`bridge`]: page-context side that applies blobs through the controller
//! - [`relay`]: per-sandbox change detection and inbound de-duplication
//! - [`coordinator`]: process-wide routing of changes to the target sandbox
//!
//! Everything above is synchronous, single-owner state. The [`runtime`]
//! module (feature `runtime`) drives it on tokio with the intervals from
//! [`relay::RelayTuning`]. Browser builds drive the same types from the JS
//! event loop instead.

pub mod bridge;
pub mod clock;
pub mod coordinator;
pub mod error;
pub mod locator;
pub mod relay;
#[cfg(feature = "runtime")]
pub mod runtime;
pub mod sandbox;
pub mod store;

pub use board_mirror_protocol as protocol;
pub use bridge::{EventSink, PageBridge};
pub use coordinator::{Coordinator, Delivery, SandboxLink, SandboxRegistry};
pub use error::{Error, Result, StoreError};
pub use locator::{Located, LocateReport, RenderGraph, RestoreCapability, find_controller_capability};
pub use relay::{InboundRelay, OutboundRelay, RelayTuning};
pub use sandbox::{RelayRole, SandboxDescriptor, WindowOpenPolicy};
pub use store::{BlobAccessor, BlobStore, FileStore, MemoryStore};
