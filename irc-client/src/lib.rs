//! An IRC client library core: session engine, event dispatcher, and state
//! model for writing bots and interactive clients. Wire parsing/
//! serialisation lives in `irc-wire`; this crate owns the socket, the
//! connection state machine, and dispatch to user-supplied handlers.
//!
//! TLS handshake and X.509 verification, high-level bot-command routing,
//! persistence, and a logging *backend* for chat transcripts are outside
//! this crate's scope — see each module's doc comment for what it does
//! carry.

#[macro_use]
extern crate log;

mod config;
mod dispatch;
mod error;
mod event;
mod handlers;
mod logging;
mod queue;
mod session;
mod state;
mod stream;

pub use irc_wire as wire;

pub use config::{
    connect, connect_, default_on_connect, default_on_disconnect, default_version_string,
    ConnectionConfig, OnConnect, OnDisconnect, DEFAULT_FLOOD_COOLDOWN, DEFAULT_READ_TIMEOUT,
};
#[cfg(feature = "tls-rustls")]
pub use config::{
    connect_tls, connect_tls_, connect_tls_with_config, connect_tls_with_config_,
    connect_tls_with_verifier, connect_tls_with_verifier_,
};
#[cfg(feature = "tls-native")]
pub use config::{connect_tls_native, connect_tls_native_};
pub use error::{ConnectError, DisconnectCause, SendError};
pub use event::{classify, source_of, Event, EventHandler, EventKind, EventSource};
pub use logging::{file_logger, noop_logger, stdout_logger, LogFn, Origin};
pub use queue::{SendQueue, SendQueueReceiver, DEFAULT_QUEUE_CAPACITY};
pub use state::{ConnectionState, InstanceConfig, IrcState};
#[cfg(feature = "tls-rustls")]
pub use stream::CertVerifyFn;
pub use stream::Connector;

use std::rc::Rc;

use irc_common::{ChanName, ChanNameRef};
use irc_wire::Cmd;

/// Build `InstanceConfig` with the nine default handlers installed
/// (spec.md §4.3, §6 "Default handler list"). User handlers registered
/// afterwards via [`IrcState::add_handler`] run before these, since
/// registration inserts at the head.
pub fn default_instance_config<S: 'static>(
    nick: String,
    auto_join: Vec<ChanName>,
    version: String,
) -> InstanceConfig<S> {
    let mut iconf = InstanceConfig::new(nick, auto_join, version);
    for handler in default_handlers() {
        iconf.add_handler(handler);
    }
    iconf
}

fn default_handlers<S: 'static>() -> Vec<EventHandler<S>> {
    vec![
        EventHandler::new(EventKind::EPing, handlers::ping_handler),
        EventHandler::new(EventKind::ECTCP, handlers::ctcp_ping_handler),
        EventHandler::new(EventKind::ECTCP, handlers::ctcp_version_handler),
        EventHandler::new(EventKind::ECTCP, handlers::ctcp_time_handler),
        EventHandler::new(EventKind::ENumeric, handlers::welcome_nick),
        EventHandler::new(EventKind::ENumeric, handlers::join_on_welcome),
        EventHandler::new(EventKind::ENumeric, handlers::nick_mangler),
        EventHandler::new(EventKind::ENumeric, handlers::join_handler),
        EventHandler::new(EventKind::EKick, handlers::kick_handler),
    ]
}

/// `start` (spec.md §6): build the shared state, spawn the session task on
/// the current `LocalSet`, and return the `IrcState` handle immediately so
/// the caller can `send`/`disconnect`/`add_handler` while the session
/// runs. The spawned task itself runs to completion, i.e. until the state
/// has cycled back to `Disconnected`.
///
/// Must be called from within a `tokio::task::LocalSet` (the session and
/// every handler invocation use `spawn_local`, since `EventHandler`'s
/// action is not `Send` — see spec.md §9 "Cyclic references").
pub fn start<S: 'static>(
    cconf: Rc<ConnectionConfig<S>>,
    iconf: InstanceConfig<S>,
    user_state: S,
) -> IrcState<S> {
    let (queue, queue_rx) = SendQueue::new(DEFAULT_QUEUE_CAPACITY);
    let state = IrcState::new(cconf, iconf, user_state, queue);

    let run_state = state.clone();
    tokio::task::spawn_local(session::run(run_state, queue_rx));

    state
}

/// Enqueue a pre-serialised wire frame.
pub async fn send_bs<S>(state: &IrcState<S>, bytes: Vec<u8>) -> Result<(), SendError> {
    state.queue.send_bs(bytes).await
}

/// Enqueue a wire line (no trailing CRLF required).
pub async fn send<S>(state: &IrcState<S>, line: String) -> Result<(), SendError> {
    state.queue.send(line).await
}

/// Initiate orderly shutdown (spec.md §4.1). Idempotent.
pub async fn disconnect<S>(state: &IrcState<S>, reason: Option<String>) {
    session::disconnect(state, reason).await
}

/// Register a handler for `kind` (spec.md §6 "eventHandler"). Thin
/// wrapper over [`EventHandler::new`] kept at crate level to match the
/// public-surface vocabulary.
pub fn event_handler<S, F, Fut>(kind: EventKind, action: F) -> EventHandler<S>
where
    F: Fn(IrcState<S>, Event) -> Fut + 'static,
    Fut: std::future::Future<Output = ()> + 'static,
{
    EventHandler::new(kind, action)
}

/// `matchType` (spec.md §6): the parsed command, if `event`'s kind is
/// `kind`, else `None`. Lets a handler registered for a broad kind recover
/// the specific `Cmd` variant without re-deriving the classification.
pub fn match_type(kind: EventKind, event: &Event) -> Option<&Cmd> {
    if event.kind == kind {
        Some(&event.msg.cmd)
    } else {
        None
    }
}

/// Reply in the channel or to the user an event came from; a no-op for
/// server-sourced events (there is nowhere to reply to).
pub async fn reply<S>(
    state: &IrcState<S>,
    event: &Event,
    msg: &str,
) -> Result<(), SendError> {
    let target = match &event.source {
        EventSource::Channel(chan) => chan.display().to_owned(),
        EventSource::User(nick) => nick.clone(),
        EventSource::Server => return Ok(()),
    };
    state.queue.send(irc_wire::privmsg(&target, msg)).await
}

/// Send a CTCP request to `target`.
pub async fn ctcp<S>(
    state: &IrcState<S>,
    target: &str,
    verb: &str,
    args: &[&str],
) -> Result<(), SendError> {
    let payload = irc_wire::encode_ctcp(verb, args);
    state.queue.send(irc_wire::privmsg(target, &payload)).await
}

/// Send a CTCP reply, as a NOTICE, to the user who sent `event` (CTCP
/// replies never go to a channel, spec.md §8.8/§4.3). A no-op if `event`
/// has no nick-bearing prefix.
pub async fn ctcp_reply<S>(
    state: &IrcState<S>,
    event: &Event,
    verb: &str,
    args: &[&str],
) -> Result<(), SendError> {
    let target = match event.msg.pfx.as_ref().and_then(|pfx| pfx.nick()) {
        Some(nick) => nick.to_owned(),
        None => return Ok(()),
    };
    let payload = irc_wire::encode_ctcp(verb, args);
    state.queue.send(irc_wire::notice(&target, &payload)).await
}

/// Set the nick (spec.md §6 "setNick"): updates the instance config cell
/// and emits exactly one `NICK n` message.
pub async fn set_nick<S>(state: &IrcState<S>, nick: String) -> Result<(), SendError> {
    state.set_nick(nick.clone());
    state.queue.send(irc_wire::nick(&nick)).await
}

/// Remove a channel from the in-memory auto-join list, without sending a
/// PART (spec.md §6 "leaveChannel" is bookkeeping only; send a PART first
/// if one is wanted).
pub fn leave_channel<S>(state: &IrcState<S>, chan: &ChanNameRef) {
    state.leave_channel(chan);
}

/// Register a user handler. Newly added handlers run first among those
/// matching the same kind (insertion is at the head, spec.md §3).
pub fn add_handler<S>(state: &IrcState<S>, handler: EventHandler<S>) {
    state.add_handler(handler);
}
