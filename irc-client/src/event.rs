use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use irc_common::ChanName;
use irc_wire::{Cmd, Ctcp, Msg, MsgTarget, Pfx};

use crate::state::IrcState;

/// The kind of event a parsed message was classified into. Used both to
/// select matching handlers and, via [`Event::kind`], by handlers that
/// register for more than one kind (none of the defaults do, but user
/// handlers may).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    EPing,
    ECTCP,
    ENumeric,
    EPrivmsg,
    ENotice,
    EJoin,
    EPart,
    EQuit,
    EMode,
    ETopic,
    EInvite,
    EKick,
    ENick,
    ERaw,
}

/// Where an event originated, per spec.md §4.2: a channel message is
/// attributed to the channel it targeted, a private message to the
/// sending user, and anything with a bare server prefix (or no prefix at
/// all) to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventSource {
    Server,
    Channel(ChanName),
    User(String),
}

/// One dispatched event: its classification, provenance, the parsed
/// message, and the original bytes (for handlers that want to log or
/// re-display the raw line).
#[derive(Debug, Clone)]
pub struct Event {
    pub kind: EventKind,
    pub source: EventSource,
    pub msg: Rc<Msg>,
    pub raw: Rc<[u8]>,
}

/// Classify a parsed message into an event kind, per spec.md §4.2.
pub fn classify(msg: &Msg) -> EventKind {
    match &msg.cmd {
        Cmd::PING { .. } => EventKind::EPing,
        Cmd::Reply { .. } => EventKind::ENumeric,
        Cmd::PRIVMSG {
            ctcp: Some(_), ..
        } => EventKind::ECTCP,
        Cmd::PRIVMSG { is_notice: false, .. } => EventKind::EPrivmsg,
        Cmd::PRIVMSG { is_notice: true, .. } => EventKind::ENotice,
        Cmd::JOIN { .. } => EventKind::EJoin,
        Cmd::PART { .. } => EventKind::EPart,
        Cmd::QUIT { .. } => EventKind::EQuit,
        Cmd::MODE { .. } => EventKind::EMode,
        Cmd::TOPIC { .. } => EventKind::ETopic,
        Cmd::INVITE { .. } => EventKind::EInvite,
        Cmd::KICK { .. } => EventKind::EKick,
        Cmd::NICK { .. } => EventKind::ENick,
        _ => EventKind::ERaw,
    }
}

/// Extract the event source from a message's prefix and, for channel
/// messages, its target. A message with no prefix, or an unqualified
/// server prefix, is attributed to the server.
pub fn source_of(own_nick: &str, msg: &Msg) -> EventSource {
    if let Cmd::PRIVMSG { target, .. } = &msg.cmd {
        if let MsgTarget::Chan(chan) = target {
            return EventSource::Channel(chan.clone());
        }
    }

    match &msg.pfx {
        Some(Pfx::User { nick, .. }) => EventSource::User(nick.clone()),
        Some(Pfx::Ambiguous(s)) if irc_common::nick_eq(s, own_nick) => {
            EventSource::User(s.clone())
        }
        Some(Pfx::Ambiguous(s)) => EventSource::User(s.clone()),
        Some(Pfx::Server(_)) | None => EventSource::Server,
    }
}

/// A verb+args CTCP payload extracted from an `ECTCP` event, with the
/// convenience accessors handlers need (see `ctcp_ping_handler` et al.).
pub fn event_ctcp(msg: &Msg) -> Option<&Ctcp> {
    match &msg.cmd {
        Cmd::PRIVMSG { ctcp: Some(c), .. } => Some(c),
        _ => None,
    }
}

/// A boxed, non-`Send` future, matching the single-threaded `LocalSet`
/// execution model the session engine uses (spec.md §9's cyclic-reference
/// note: handlers take `IrcState` explicitly rather than closing over it).
pub type HandlerFuture = Pin<Box<dyn Future<Output = ()>>>;

/// A registered event handler: a `kind` selector plus the action to run
/// for matching events.
pub struct EventHandler<S> {
    pub kind: EventKind,
    pub action: Rc<dyn Fn(IrcState<S>, Event) -> HandlerFuture>,
}

impl<S> Clone for EventHandler<S> {
    fn clone(&self) -> Self {
        EventHandler {
            kind: self.kind,
            action: self.action.clone(),
        }
    }
}

impl<S> EventHandler<S> {
    pub fn new<F, Fut>(kind: EventKind, action: F) -> Self
    where
        F: Fn(IrcState<S>, Event) -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        EventHandler {
            kind,
            action: Rc::new(move |state, event| Box::pin(action(state, event))),
        }
    }
}
