//! Isolated-world half: samples the board, talks to the coordinator and
//! drives the page bridge.

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::{Function, Object};
use mirror::protocol::{
    BridgeCommand, BridgeEnvelope, BridgeEvent, ChangeNotification, CoordinatorMessage, PartitionKey,
    SandboxMessage, StateBlob, StateUpdate, COORDINATOR_HOST, COORDINATOR_PORT, DEFAULT_TARGET_PARTITION,
    STATE_UPDATE_CHANNEL,
};
use mirror::{BlobAccessor, InboundRelay, OutboundRelay, RelayRole, RelayTuning};
use serde::Deserialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CloseEvent, ErrorEvent, MessageEvent, WebSocket};

use crate::storage::{read_board, LocalStorageStore};
use crate::{log, stringify_js_error, to_js, window};

/// Options passed to [`start_sandbox_relay`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayOptions {
    pub partition: PartitionKey,
    #[serde(flatten)]
    pub role: RelayRole,
    #[serde(default = "default_coordinator_url")]
    pub coordinator_url: String,
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
    #[serde(default)]
    pub find_retry_ms: Option<u64>,
}

impl RelayOptions {
    pub fn tuning(&self) -> RelayTuning {
        let defaults = RelayTuning::default();
        RelayTuning {
            poll_interval_ms: self.poll_interval_ms.unwrap_or(defaults.poll_interval_ms),
            find_retry_ms: self.find_retry_ms.unwrap_or(defaults.find_retry_ms),
        }
    }
}

fn default_coordinator_url() -> String {
    format!("ws://{COORDINATOR_HOST}:{COORDINATOR_PORT}/{STATE_UPDATE_CHANNEL}")
}

/// Callbacks registered through [`SandboxRelay::on_state_update`].
struct Subscribers<F> {
    next_id: u32,
    entries: Vec<(u32, F)>,
}

impl<F: Clone> Subscribers<F> {
    fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    fn add(&mut self, callback: F) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push((id, callback));
        id
    }

    fn remove(&mut self, id: u32) {
        self.entries.retain(|(entry, _)| *entry != id);
    }

    /// Copies the callbacks out so they can run without holding the relay.
    fn snapshot(&self) -> Vec<F> {
        self.entries.iter().map(|(_, callback)| callback.clone()).collect()
    }
}

/// Socket event handlers, created once and attached to every socket the
/// relay opens.
struct SocketHandlers {
    onopen: Function,
    onmessage: Function,
    onerror: Function,
    onclose: Function,
}

impl SocketHandlers {
    fn attach(&self, socket: &WebSocket) {
        socket.set_onopen(Some(&self.onopen));
        socket.set_onmessage(Some(&self.onmessage));
        socket.set_onerror(Some(&self.onerror));
        socket.set_onclose(Some(&self.onclose));
    }
}

/// A socket in this state is gone for good and has to be replaced.
fn needs_reconnect(ready_state: Option<u16>) -> bool {
    ready_state.map_or(true, |state| state == WebSocket::CLOSED)
}

fn describe_update(update: &StateUpdate) -> String {
    format!("received {} chars stamped {}", update.blob.len(), update.timestamp)
}

/// Notification for a manual publish. Blank targets fall back to the
/// configured one, then to the remote board.
fn manual_notification(
    blob: &str,
    target: Option<&str>,
    configured: Option<&PartitionKey>,
) -> Option<ChangeNotification> {
    let blob = StateBlob::new(blob).ok()?;
    let target = target
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(PartitionKey::from)
        .or_else(|| configured.cloned())
        .unwrap_or_else(|| PartitionKey::from(DEFAULT_TARGET_PARTITION));
    Some(ChangeNotification {
        blob,
        target_partition_key: target,
    })
}

struct Relay {
    window: web_sys::Window,
    url: String,
    partition: PartitionKey,
    socket: Option<WebSocket>,
    handlers: Option<SocketHandlers>,
    accessor: BlobAccessor<LocalStorageStore>,
    outbound: Option<OutboundRelay>,
    inbound: InboundRelay,
    mirror_incoming: bool,
    subscribers: Subscribers<Function>,
}

impl Relay {
    fn is_open(&self) -> bool {
        self.socket
            .as_ref()
            .is_some_and(|socket| socket.ready_state() == WebSocket::OPEN)
    }

    fn connect(&mut self) -> Result<(), JsValue> {
        let socket = WebSocket::new(&self.url)?;
        if let Some(handlers) = &self.handlers {
            handlers.attach(&socket);
        }
        self.socket = Some(socket);
        Ok(())
    }

    fn reconnect_if_closed(&mut self) {
        if !needs_reconnect(self.socket.as_ref().map(WebSocket::ready_state)) {
            return;
        }
        log::info(log::RELAY, &format!("reconnecting to {}", self.url));
        if let Err(err) = self.connect() {
            log::warn(log::RELAY, &format!("reconnect failed: {}", stringify_js_error(&err)));
        }
    }

    fn poll(&mut self) {
        // Sample only while connected, so a change made while offline is
        // still published once the socket opens.
        if !self.is_open() || self.outbound.is_none() {
            return;
        }
        let current = read_board(&self.accessor, |msg| log::warn(log::RELAY, msg));
        let Some(outbound) = self.outbound.as_mut() else {
            return;
        };
        if let Some(notification) = outbound.observe(current) {
            self.publish(notification);
        }
    }

    fn publish(&self, notification: ChangeNotification) {
        log::info(
            log::RELAY,
            &format!("publishing {} chars to {}", notification.blob.len(), notification.target_partition_key),
        );
        self.send(&SandboxMessage::StateUpdate(notification));
    }

    fn send(&self, message: &SandboxMessage) {
        let Some(socket) = self.socket.as_ref() else {
            return;
        };
        let sent = serde_json::to_string(message)
            .map_err(|err| JsValue::from_str(&err.to_string()))
            .and_then(|text| socket.send_with_str(&text));
        if let Err(err) = sent {
            log::warn(log::RELAY, &format!("send failed: {}", stringify_js_error(&err)));
        }
    }

    fn post(&self, command: BridgeCommand) {
        let posted = to_js(&BridgeEnvelope::new(command)).and_then(|message| self.window.post_message(&message, "*"));
        if let Err(err) = posted {
            log::warn(log::RELAY, &format!("failed to post command: {}", stringify_js_error(&err)));
        }
    }

    fn on_coordinator_message(&mut self, message: CoordinatorMessage) {
        match message {
            CoordinatorMessage::Registered { partition } => {
                log::info(log::RELAY, &format!("registered as {partition}"));
            }
            CoordinatorMessage::Rejected { reason } => {
                log::warn(log::RELAY, &format!("registration rejected: {reason}"));
            }
            CoordinatorMessage::StateUpdate(update) => {
                if !self.mirror_incoming {
                    return;
                }
                log::info(log::RELAY, &describe_update(&update));
                if let Some(command) = self.inbound.accept(Some(update.blob.as_str())) {
                    self.post(command);
                }
            }
        }
    }

    fn on_bridge_event(&self, event: BridgeEvent) {
        match event {
            BridgeEvent::InstanceStatus(status) if status.is_captured() => {
                log::info(log::RELAY, "page reports controller captured");
            }
            BridgeEvent::InstanceStatus(_) => log::info(log::RELAY, "page reports controller missing"),
            BridgeEvent::ApplyResult(result) if !result.ok => log::warn(
                log::RELAY,
                &format!(
                    "page failed to apply blob: {:?} {}",
                    result.reason,
                    result.message.as_deref().unwrap_or("")
                ),
            ),
            BridgeEvent::ApplyResult(_) => {}
        }
    }
}

/// Runs subscriber callbacks for an update, outside any relay borrow so a
/// callback may unsubscribe.
fn notify_subscribers(relay: &Rc<RefCell<Relay>>, update: &StateUpdate) {
    let callbacks = relay.borrow().subscribers.snapshot();
    if callbacks.is_empty() {
        return;
    }
    let payload = match to_js(update) {
        Ok(payload) => payload,
        Err(err) => {
            log::warn(log::RELAY, &format!("failed to convert update: {}", stringify_js_error(&err)));
            return;
        }
    };
    for callback in callbacks {
        if let Err(err) = callback.call1(&JsValue::NULL, &payload) {
            log::warn(log::RELAY, &format!("state update callback threw: {}", stringify_js_error(&err)));
        }
    }
}

fn socket_handlers(relay: &Rc<RefCell<Relay>>) -> SocketHandlers {
    let inner = relay.clone();
    let onopen = Closure::<dyn FnMut()>::new(move || {
        let relay = inner.borrow();
        relay.send(&SandboxMessage::Register {
            partition: relay.partition.clone(),
        });
    });

    let inner = relay.clone();
    let onmessage = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
        let Some(text) = event.data().as_string() else {
            return;
        };
        match serde_json::from_str::<CoordinatorMessage>(&text) {
            Ok(message) => {
                if let CoordinatorMessage::StateUpdate(update) = &message {
                    notify_subscribers(&inner, update);
                }
                inner.borrow_mut().on_coordinator_message(message);
            }
            Err(err) => log::warn(log::RELAY, &format!("ignoring coordinator message: {err}")),
        }
    });

    let onerror = Closure::<dyn FnMut(ErrorEvent)>::new(|e: ErrorEvent| {
        log::warn(log::RELAY, &format!("coordinator socket error: {}", e.message()));
    });

    let onclose = Closure::<dyn FnMut(CloseEvent)>::new(|e: CloseEvent| {
        log::warn(log::RELAY, &format!("coordinator disconnected ({}), will retry", e.code()));
    });

    SocketHandlers {
        onopen: onopen.into_js_value().unchecked_into(),
        onmessage: onmessage.into_js_value().unchecked_into(),
        onerror: onerror.into_js_value().unchecked_into(),
        onclose: onclose.into_js_value().unchecked_into(),
    }
}

/// Handle to a running sandbox relay for manual control.
#[wasm_bindgen]
pub struct SandboxRelay {
    inner: Rc<RefCell<Relay>>,
}

#[wasm_bindgen]
impl SandboxRelay {
    /// The raw blob currently saved in this sandbox, if any.
    pub fn read_save_state_raw(&self) -> Option<String> {
        let relay = self.inner.borrow();
        read_board(&relay.accessor, |msg| log::warn(log::RELAY, msg)).map(StateBlob::into_string)
    }

    /// Sends `blob` to `target` right away, bypassing change detection.
    /// Returns `false` for an empty blob or while disconnected.
    pub fn publish_state(&self, blob: String, target: Option<String>) -> bool {
        let relay = self.inner.borrow();
        let configured = relay.outbound.as_ref().map(OutboundRelay::target);
        let Some(notification) = manual_notification(&blob, target.as_deref(), configured) else {
            return false;
        };
        if !relay.is_open() {
            log::warn(log::RELAY, "not connected, manual publish dropped");
            return false;
        }
        relay.publish(notification);
        true
    }

    /// Applies `blob` to this sandbox's page as if the coordinator had sent
    /// it. Returns `false` for an empty blob or a repeat of the last one.
    pub fn inject_state(&self, blob: String) -> bool {
        let mut relay = self.inner.borrow_mut();
        match relay.inbound.accept(Some(blob.as_str())) {
            Some(command) => {
                relay.post(command);
                true
            }
            None => false,
        }
    }

    /// Calls `callback({ blob, timestamp })` for every update the coordinator
    /// sends this sandbox. Returns a function that removes the callback.
    pub fn on_state_update(&self, callback: Function) -> Function {
        let id = self.inner.borrow_mut().subscribers.add(callback);
        let inner = self.inner.clone();
        let unsubscribe = Closure::<dyn FnMut()>::new(move || inner.borrow_mut().subscribers.remove(id));
        unsubscribe.into_js_value().unchecked_into()
    }
}

/// Starts the relay for one sandbox. `options` is a plain object matching
/// [`RelayOptions`], e.g. `{ partition: "persist:local-board", publishTo:
/// "persist:remote-board" }`.
#[wasm_bindgen]
pub fn start_sandbox_relay(options: JsValue) -> Result<SandboxRelay, JsValue> {
    let options: RelayOptions = serde_wasm_bindgen::from_value(options)?;
    let tuning = options.tuning();
    let window = window()?;

    let relay = Rc::new(RefCell::new(Relay {
        window: window.clone(),
        url: options.coordinator_url.clone(),
        partition: options.partition.clone(),
        socket: None,
        handlers: None,
        accessor: BlobAccessor::new(LocalStorageStore::new()?),
        outbound: options.role.publish_to.clone().map(OutboundRelay::new),
        inbound: InboundRelay::new(),
        mirror_incoming: options.role.mirror_incoming,
        subscribers: Subscribers::new(),
    }));

    let handlers = socket_handlers(&relay);
    relay.borrow_mut().handlers = Some(handlers);
    relay.borrow_mut().connect()?;

    // Reports from the page bridge
    if options.role.mirror_incoming {
        let inner = relay.clone();
        let own_window = window.clone();
        let onmessage = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
            let from_self = event
                .source()
                .is_some_and(|source| Object::is(&source, &own_window));
            if !from_self {
                return;
            }
            let Ok(value) = serde_wasm_bindgen::from_value::<serde_json::Value>(event.data()) else {
                return;
            };
            if let Some(bridge_event) = BridgeEnvelope::<BridgeEvent>::parse(value) {
                inner.borrow().on_bridge_event(bridge_event);
            }
        });
        window.add_event_listener_with_callback("message", onmessage.as_ref().unchecked_ref())?;
        onmessage.forget();
    }

    // Timers
    if options.role.publish_to.is_some() {
        let inner = relay.clone();
        let poll = Closure::<dyn FnMut()>::new(move || inner.borrow_mut().poll());
        window.set_interval_with_callback_and_timeout_and_arguments_0(
            poll.as_ref().unchecked_ref(),
            clamp_ms(tuning.poll_interval_ms),
        )?;
        poll.forget();
    }
    if options.role.mirror_incoming {
        relay.borrow().post(BridgeCommand::FindRequest);
    }
    {
        let inner = relay.clone();
        let mirror_incoming = options.role.mirror_incoming;
        let retry = Closure::<dyn FnMut()>::new(move || {
            let mut relay = inner.borrow_mut();
            relay.reconnect_if_closed();
            if mirror_incoming {
                relay.post(BridgeCommand::FindRequest);
            }
        });
        window.set_interval_with_callback_and_timeout_and_arguments_0(
            retry.as_ref().unchecked_ref(),
            clamp_ms(tuning.find_retry_ms),
        )?;
        retry.forget();
    }

    log::info(
        log::RELAY,
        &format!("started for {} via {}", options.partition, options.coordinator_url),
    );
    Ok(SandboxRelay { inner: relay })
}

fn clamp_ms(ms: u64) -> i32 {
    ms.clamp(1, i32::MAX as u64) as i32
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn options_fill_defaults() {
        let options: RelayOptions = serde_json::from_value(json!({
            "partition": "persist:remote-board",
            "mirrorIncoming": true
        }))
        .unwrap();

        assert!(options.role.mirror_incoming);
        assert_eq!(options.role.publish_to, None);
        assert_eq!(options.coordinator_url, "ws://127.0.0.1:19989/state-update");
        assert_eq!(options.tuning(), RelayTuning::default());
    }

    #[test]
    fn options_accept_publish_target_and_intervals() {
        let options: RelayOptions = serde_json::from_value(json!({
            "partition": "persist:local-board",
            "publishTo": "persist:remote-board",
            "pollIntervalMs": 200
        }))
        .unwrap();

        assert_eq!(options.role.publish_to, Some(PartitionKey::from("persist:remote-board")));
        assert_eq!(options.tuning().poll_interval_ms, 200);
        assert_eq!(options.tuning().find_retry_ms, 1000);
    }

    #[test]
    fn interval_is_clamped_for_timers() {
        assert_eq!(clamp_ms(0), 1);
        assert_eq!(clamp_ms(u64::MAX), i32::MAX);
        assert_eq!(clamp_ms(500), 500);
    }

    #[test]
    fn only_closed_or_missing_sockets_reconnect() {
        assert!(needs_reconnect(None));
        assert!(needs_reconnect(Some(WebSocket::CLOSED)));
        assert!(!needs_reconnect(Some(WebSocket::CONNECTING)));
        assert!(!needs_reconnect(Some(WebSocket::OPEN)));
        assert!(!needs_reconnect(Some(WebSocket::CLOSING)));
    }

    #[test]
    fn received_update_log_carries_length_and_timestamp() {
        let update = StateUpdate {
            blob: StateBlob::new("QUJD").unwrap(),
            timestamp: 1_700_000_000_123,
        };
        assert_eq!(describe_update(&update), "received 4 chars stamped 1700000000123");
    }

    #[test]
    fn manual_publish_picks_target() {
        let configured = PartitionKey::from("persist:configured");

        let explicit = manual_notification("AAA", Some("persist:other"), Some(&configured)).unwrap();
        assert_eq!(explicit.target_partition_key, PartitionKey::from("persist:other"));

        let fallback = manual_notification("AAA", Some("  "), Some(&configured)).unwrap();
        assert_eq!(fallback.target_partition_key, configured);

        let default = manual_notification("AAA", None, None).unwrap();
        assert_eq!(default.target_partition_key, PartitionKey::from(DEFAULT_TARGET_PARTITION));
        assert_eq!(default.blob.as_str(), "AAA");
    }

    #[test]
    fn manual_publish_ignores_empty_blob() {
        assert_eq!(manual_notification("", None, None), None);
    }

    #[test]
    fn unsubscribed_callbacks_are_not_snapshotted() {
        let mut subscribers = Subscribers::new();
        let first = subscribers.add("first");
        subscribers.add("second");
        assert_eq!(subscribers.snapshot(), vec!["first", "second"]);

        subscribers.remove(first);
        subscribers.remove(first);
        assert_eq!(subscribers.snapshot(), vec!["second"]);
        assert_eq!(subscribers.add("third"), 2);
    }
}
