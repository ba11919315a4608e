use std::cell::RefCell;
use std::rc::Rc;

use irc_common::{nick_eq, ChanName, ChanNameRef};

use crate::config::ConnectionConfig;
use crate::event::EventHandler;
use crate::queue::SendQueue;

/// The connection state machine (spec.md §3/§4.1). Strictly monotonic
/// forward for the lifetime of one session: `Disconnected -> Connected ->
/// Disconnecting -> Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    Disconnecting,
}

/// Mutable per-instance configuration: nick, auto-join list, handler
/// table, version string, and ignore list. Held behind its own lock
/// (`RefCell`), independent of [`ConnectionState`] and the user state
/// cell.
pub struct InstanceConfig<S> {
    pub nick: String,
    pub auto_join: Vec<ChanName>,
    pub version: String,
    handlers: Vec<EventHandler<S>>,
    /// `(nick, Some(chan))` ignores `nick` only in `chan`; `(nick, None)`
    /// ignores `nick` everywhere. Compared case-insensitively via
    /// [`irc_common::nick_eq`], matching IRC nick-equality rules rather
    /// than a `HashMap`'s exact-match semantics.
    ignore: Vec<(String, Option<ChanName>)>,
    /// Set by `welcome_nick` when the server echoes back a nick shorter
    /// than the one we asked for. `nick_mangler` then clamps every
    /// subsequently generated candidate to this many characters, keeping
    /// the *last* N rather than the first (spec.md §4.3/§8.10).
    nick_clamp_len: Option<usize>,
}

impl<S> InstanceConfig<S> {
    pub fn new(nick: String, auto_join: Vec<ChanName>, version: String) -> Self {
        InstanceConfig {
            nick,
            auto_join,
            version,
            handlers: Vec::new(),
            ignore: Vec::new(),
            nick_clamp_len: None,
        }
    }

    pub fn handlers(&self) -> &[EventHandler<S>] {
        &self.handlers
    }

    /// Register a handler. Per spec.md §3, "insertion is at the head": a
    /// handler added later runs no differently than one added earlier
    /// (dispatch is concurrent and unordered), but it is visible first to
    /// any code that iterates `handlers()`, mirroring the source's
    /// insertion discipline.
    pub fn add_handler(&mut self, handler: EventHandler<S>) {
        self.handlers.insert(0, handler);
    }

    /// Ignore `nick`, optionally scoped to a single channel. Idempotent:
    /// adding the same pair twice leaves the list's *effect* unchanged
    /// (spec.md §8.4), though for simplicity duplicate entries are not
    /// deduplicated in storage.
    pub fn ignore(&mut self, nick: String, chan: Option<ChanName>) {
        if !self.is_ignored(&nick, chan.as_deref()) {
            self.ignore.push((nick, chan));
        }
    }

    pub fn unignore(&mut self, nick: &str, chan: Option<&ChanNameRef>) {
        self.ignore
            .retain(|(n, c)| !(nick_eq(n, nick) && c.as_deref() == chan));
    }

    /// True if `nick` should be dropped before dispatch for an event
    /// sourced from `chan` (or `None` for a non-channel event).
    pub fn is_ignored(&self, nick: &str, chan: Option<&ChanNameRef>) -> bool {
        self.ignore.iter().any(|(n, c)| {
            nick_eq(n, nick)
                && match (c, chan) {
                    (None, _) => true,
                    (Some(c), Some(chan)) => c.as_ref() == chan,
                    (Some(_), None) => false,
                }
        })
    }
}

/// The bundle of state cells plus the send queue, constructed once per
/// session and shared by reference with every handler invocation
/// (spec.md §3 "IRCState"). Cheaply `Clone`: every field is an `Rc`.
///
/// Cells are `Rc<RefCell<_>>` rather than `Arc<Mutex<_>>`: the reader,
/// writer, dispatcher, and every spawned handler for one session run on
/// the same `tokio::task::LocalSet` (see DESIGN.md's Open Question
/// resolution), so there is never cross-thread contention to guard
/// against.
pub struct IrcState<S> {
    pub conn_config: Rc<ConnectionConfig<S>>,
    instance: Rc<RefCell<InstanceConfig<S>>>,
    conn_state: Rc<RefCell<ConnectionState>>,
    user_state: Rc<RefCell<S>>,
    pub queue: SendQueue,
}

impl<S> Clone for IrcState<S> {
    fn clone(&self) -> Self {
        IrcState {
            conn_config: self.conn_config.clone(),
            instance: self.instance.clone(),
            conn_state: self.conn_state.clone(),
            user_state: self.user_state.clone(),
            queue: self.queue.clone(),
        }
    }
}

impl<S> IrcState<S> {
    pub fn new(
        conn_config: Rc<ConnectionConfig<S>>,
        instance: InstanceConfig<S>,
        user_state: S,
        queue: SendQueue,
    ) -> Self {
        IrcState {
            conn_config,
            instance: Rc::new(RefCell::new(instance)),
            conn_state: Rc::new(RefCell::new(ConnectionState::Disconnected)),
            user_state: Rc::new(RefCell::new(user_state)),
            queue,
        }
    }

    // --- ConnectionState cell ---

    pub fn connection_state(&self) -> ConnectionState {
        *self.conn_state.borrow()
    }

    pub fn set_connection_state(&self, state: ConnectionState) {
        *self.conn_state.borrow_mut() = state;
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    pub fn is_disconnecting(&self) -> bool {
        self.connection_state() == ConnectionState::Disconnecting
    }

    pub fn is_disconnected(&self) -> bool {
        self.connection_state() == ConnectionState::Disconnected
    }

    // --- InstanceConfig cell ---

    pub fn get_nick(&self) -> String {
        self.instance.borrow().nick.clone()
    }

    pub fn set_nick(&self, nick: String) {
        self.instance.borrow_mut().nick = nick;
    }

    pub fn channels(&self) -> Vec<ChanName> {
        self.instance.borrow().auto_join.clone()
    }

    pub fn has_channel(&self, chan: &ChanNameRef) -> bool {
        self.instance.borrow().auto_join.iter().any(|c| c.as_ref() == chan)
    }

    pub fn prepend_channel(&self, chan: ChanName) {
        let mut inst = self.instance.borrow_mut();
        if !inst.auto_join.iter().any(|c| *c == chan) {
            inst.auto_join.insert(0, chan);
        }
    }

    pub fn leave_channel(&self, chan: &ChanNameRef) {
        self.instance.borrow_mut().auto_join.retain(|c| c.as_ref() != chan);
    }

    pub fn version(&self) -> String {
        self.instance.borrow().version.clone()
    }

    pub fn clamp_len(&self) -> Option<usize> {
        self.instance.borrow().nick_clamp_len
    }

    pub fn set_clamp_len(&self, len: Option<usize>) {
        self.instance.borrow_mut().nick_clamp_len = len;
    }

    pub fn is_ignored(&self, nick: &str, chan: Option<&ChanNameRef>) -> bool {
        self.instance.borrow().is_ignored(nick, chan)
    }

    pub fn ignore(&self, nick: String, chan: Option<ChanName>) {
        self.instance.borrow_mut().ignore(nick, chan);
    }

    pub fn add_handler(&self, handler: EventHandler<S>) {
        self.instance.borrow_mut().add_handler(handler);
    }

    /// `snapshotModify` (spec.md §4.5/§9): read-transform-write the
    /// `InstanceConfig` cell under its lock, atomically with respect to
    /// other borrows of the same cell.
    pub fn snapshot_modify_instance<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut InstanceConfig<S>) -> R,
    {
        f(&mut self.instance.borrow_mut())
    }

    pub fn handlers_matching(&self, kind: crate::event::EventKind) -> Vec<EventHandler<S>> {
        self.instance
            .borrow()
            .handlers()
            .iter()
            .filter(|h| h.kind == kind)
            .cloned()
            .collect()
    }

    // --- User state cell ---

    pub fn user_state(&self) -> Rc<RefCell<S>> {
        self.user_state.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::connect;
    use crate::queue::SendQueue;

    fn test_state() -> IrcState<()> {
        let cconf = Rc::new(connect::<()>("irc.example.org", 6667, Duration::from_millis(1)));
        let iconf = InstanceConfig::new("tester".to_owned(), Vec::new(), "0.1".to_owned());
        let (queue, _rx) = SendQueue::new(16);
        IrcState::new(cconf, iconf, (), queue)
    }

    #[test]
    fn test_connection_state_starts_disconnected() {
        let state = test_state();
        assert!(state.is_disconnected());
        state.set_connection_state(ConnectionState::Connected);
        assert!(state.is_connected());
    }

    #[test]
    fn test_prepend_channel_is_idempotent() {
        let state = test_state();
        let chan = ChanName::new("#foo".to_owned());
        state.prepend_channel(chan.clone());
        state.prepend_channel(chan.clone());
        assert_eq!(state.channels(), vec![chan]);
    }

    #[test]
    fn test_leave_channel_removes_case_insensitively() {
        let state = test_state();
        state.prepend_channel(ChanName::new("#Foo".to_owned()));
        state.leave_channel(ChanNameRef::new("#foo"));
        assert!(state.channels().is_empty());
    }

    #[test]
    fn test_ignore_is_case_insensitive_and_scoped() {
        let state = test_state();
        let chan = ChanName::new("#foo".to_owned());
        state.ignore("Nick".to_owned(), Some(chan.clone()));
        assert!(state.is_ignored("nick", Some(chan.as_ref())));
        assert!(!state.is_ignored("nick", None));
        assert!(!state.is_ignored("other", Some(chan.as_ref())));
    }

    #[test]
    fn test_clamp_len_round_trip() {
        let state = test_state();
        assert_eq!(state.clamp_len(), None);
        state.set_clamp_len(Some(5));
        assert_eq!(state.clamp_len(), Some(5));
    }
}
