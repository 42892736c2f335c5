//! Console output with a per-context prefix.

pub const RELAY: &str = "[SandboxRelay]";
pub const PAGE: &str = "[PageBridge]";

pub fn info(prefix: &str, message: &str) {
    web_sys::console::log_1(&format!("{prefix} {message}").into());
}

pub fn warn(prefix: &str, message: &str) {
    web_sys::console::warn_1(&format!("{prefix} {message}").into());
}
