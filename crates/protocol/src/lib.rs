//! Wire types for the board-mirror state relay.
//!
//! This crate holds the serde-serializable shapes exchanged between the three
//! execution contexts of a mirrored board:
//!
//! - the coordinator process and each sandbox relay ([`relay`]),
//! - a sandbox relay and the bridge running inside the page ([`bridge`]).
//!
//! It also owns the state blob itself ([`StateBlob`]) and the permissive
//! decoder for the third-party application's historical storage encoding
//! ([`decode`]).
//!
//! Types here are pure data. Behaviour lives in `board-mirror-core`.

pub mod bridge;
pub mod decode;
pub mod relay;
pub mod types;

pub use bridge::*;
pub use decode::{DecodeError, DecodedState, decode_state};
pub use relay::*;
pub use types::*;

/// Storage key under which the third-party application persists its board.
pub const SAVE_STATE_KEY: &str = "playtester_savestate";

/// Name of the restore entry point exposed by the application's controller.
pub const RESTORE_ENTRY_POINT: &str = "handleRestoreSaveState";

/// Own-property prefix the rendering framework uses to attach its internal
/// node to a DOM element.
pub const FIBER_KEY_PREFIX: &str = "__reactFiber$";

/// Partition the local board publishes to unless told otherwise.
pub const DEFAULT_TARGET_PARTITION: &str = "persist:remote-board";

/// Outbound relay poll period.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Inbound relay find-instance retry period.
pub const DEFAULT_FIND_RETRY_MS: u64 = 1000;

/// Default coordinator host.
pub const COORDINATOR_HOST: &str = "127.0.0.1";

/// Default coordinator port.
pub const COORDINATOR_PORT: u16 = 19989;
