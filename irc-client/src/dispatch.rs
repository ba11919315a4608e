//! The event dispatcher (spec.md §4.2, §5): classifies a parsed message,
//! consults the ignore list, and spawns each matching handler as an
//! independent, fire-and-forget task.

use std::rc::Rc;

use irc_wire::{Msg, Pfx};

use crate::event::{classify, source_of, Event, EventSource};
use crate::state::IrcState;

/// Build an `Event` from a freshly-parsed message and dispatch it to every
/// handler registered for its kind. Returns immediately; handlers run as
/// independently spawned tasks (spec.md §4.1 "the dispatcher does not wait
/// for handlers to complete").
pub fn dispatch<S: 'static>(state: &IrcState<S>, msg: Msg, raw: Rc<[u8]>) {
    let own_nick = state.get_nick();
    let source = source_of(&own_nick, &msg);
    let kind = classify(&msg);

    if is_ignored(state, &msg, &source) {
        return;
    }

    let event = Event {
        kind,
        source,
        msg: Rc::new(msg),
        raw,
    };

    for handler in state.handlers_matching(kind) {
        let state = state.clone();
        let event = event.clone();
        tokio::task::spawn_local(async move {
            (handler.action)(state, event).await;
        });
    }
}

/// spec.md §4.2 "Ignore filtering": before matching, drop events whose
/// sending user appears in the ignore list, either globally or scoped to
/// the channel the event targeted.
fn is_ignored<S>(state: &IrcState<S>, msg: &Msg, source: &EventSource) -> bool {
    let sender = match &msg.pfx {
        Some(Pfx::User { nick, .. }) => nick.as_str(),
        Some(Pfx::Ambiguous(nick)) => nick.as_str(),
        _ => return false,
    };

    match source {
        EventSource::Channel(chan) => state.is_ignored(sender, Some(chan.as_ref())),
        _ => state.is_ignored(sender, None),
    }
}
