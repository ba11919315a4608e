//! The mandatory default handler set (spec.md §4.3): PING/PONG keepalive,
//! CTCP PING/VERSION/TIME, nick negotiation on connect, and channel
//! membership bookkeeping. Registered by `start` before any user handler,
//! so a user handler added later (via `add_handler`'s head-insertion) runs
//! first but never instead of these.

use irc_wire::Cmd;

use crate::event::{Event, EventKind};
use crate::state::IrcState;

/// PING keepalive: spec.md §4.3 "reply PONG, echoing the server's token if
/// present, else our own nick".
pub async fn ping_handler<S>(state: IrcState<S>, event: Event) {
    if let Cmd::PING { server, server2 } = &event.msg.cmd {
        let token = server2.as_ref().unwrap_or(server);
        let _ = state.queue.send(irc_wire::pong(token)).await;
    }
}

/// CTCP PING: echo the arguments back unchanged.
pub async fn ctcp_ping_handler<S>(state: IrcState<S>, event: Event) {
    if let Cmd::PRIVMSG {
        ctcp: Some(ctcp), ..
    } = &event.msg.cmd
    {
        if ctcp.verb.eq_ignore_ascii_case("PING") {
            if let Some(reply_to) = ctcp_reply_target(&event) {
                let args: Vec<&str> = ctcp.args.iter().map(String::as_str).collect();
                let payload = irc_wire::encode_ctcp("PING", &args);
                let _ = state
                    .queue
                    .send(irc_wire::notice(&reply_to, &payload))
                    .await;
            }
        }
    }
}

/// CTCP VERSION: reply with the configured version string.
pub async fn ctcp_version_handler<S>(state: IrcState<S>, event: Event) {
    if let Cmd::PRIVMSG {
        ctcp: Some(ctcp), ..
    } = &event.msg.cmd
    {
        if ctcp.verb.eq_ignore_ascii_case("VERSION") {
            if let Some(reply_to) = ctcp_reply_target(&event) {
                let version = state.version();
                let payload = irc_wire::encode_ctcp("VERSION", &[version.as_str()]);
                let _ = state
                    .queue
                    .send(irc_wire::notice(&reply_to, &payload))
                    .await;
            }
        }
    }
}

/// CTCP TIME: reply with the current local time.
pub async fn ctcp_time_handler<S>(state: IrcState<S>, event: Event) {
    if let Cmd::PRIVMSG {
        ctcp: Some(ctcp), ..
    } = &event.msg.cmd
    {
        if ctcp.verb.eq_ignore_ascii_case("TIME") {
            if let Some(reply_to) = ctcp_reply_target(&event) {
                let now = time::OffsetDateTime::now_utc();
                let fmt = time::macros::format_description!(
                    "[weekday repr:short] [month repr:short] [day padding:space] \
                     [hour]:[minute]:[second] [year]"
                );
                let formatted = now.format(&fmt).unwrap_or_else(|_| now.to_string());
                let payload = irc_wire::encode_ctcp("TIME", &[formatted.as_str()]);
                let _ = state
                    .queue
                    .send(irc_wire::notice(&reply_to, &payload))
                    .await;
            }
        }
    }
}

/// `PRIVMSG`/`NOTICE` CTCP replies go back to the sender, never the
/// channel, even when the original CTCP arrived on one (spec.md §8.8).
fn ctcp_reply_target(event: &Event) -> Option<String> {
    event.msg.pfx.as_ref().and_then(|pfx| pfx.nick()).map(str::to_owned)
}

/// Numeric 001 (RPL_WELCOME): the server's echoed nick is authoritative
/// (spec.md §4.3 "welcome_nick"); this may differ from what we asked for
/// (truncation, case folding).
pub async fn welcome_nick<S>(state: IrcState<S>, event: Event) {
    if let Cmd::Reply { num: 1, params } = &event.msg.cmd {
        if let Some(nick) = params.first() {
            if nick.len() < state.get_nick().len() {
                state.set_clamp_len(Some(nick.len()));
            }
            state.set_nick(nick.clone());
        }
    }
}

/// Numeric 001: join every auto-join channel (spec.md §4.3; a deliberate
/// divergence from joining on 376/RPL_ENDOFMOTD since 001 is guaranteed
/// to arrive exactly once and strictly before normal traffic).
pub async fn join_on_welcome<S>(state: IrcState<S>, event: Event) {
    if let EventKind::ENumeric = event.kind {
        if matches!(event.msg.cmd, Cmd::Reply { num: 1, .. }) {
            let chans = state.channels();
            if !chans.is_empty() {
                let line = irc_wire::join(chans.iter().map(|c| c.as_ref()));
                let _ = state.queue.send(line).await;
            }
        }
    }
}

/// Substring-substitution table applied, in order, to mangle a nick that
/// the server rejected as already in use (spec.md §4.3/§8.10). Only the
/// first occurrence of the first matching substring is replaced.
const MANGLE_TABLE: &[(&str, &str)] = &[
    ("i", "1"),
    ("I", "1"),
    ("l", "1"),
    ("L", "1"),
    ("o", "0"),
    ("O", "0"),
    ("A", "4"),
    ("0", "1"),
    ("1", "2"),
    ("2", "3"),
    ("3", "4"),
    ("4", "5"),
    ("5", "6"),
    ("6", "7"),
    ("7", "8"),
    ("8", "9"),
    ("9", "-"),
];

fn mangle(nick: &str) -> String {
    for &(from, to) in MANGLE_TABLE {
        if let Some(idx) = nick.find(from) {
            let mut out = String::with_capacity(nick.len());
            out.push_str(&nick[..idx]);
            out.push_str(to);
            out.push_str(&nick[idx + from.len()..]);
            return out;
        }
    }
    format!("{}1", nick)
}

/// Numerics 432 (ERR_ERRONEOUSNICKNAME), 433 (ERR_NICKNAMEINUSE), 436
/// (ERR_NICKCOLLISION): generate a fresh candidate nick and resend NICK.
pub async fn nick_mangler<S>(state: IrcState<S>, event: Event) {
    let num = match &event.msg.cmd {
        Cmd::Reply { num, .. } => *num,
        _ => return,
    };
    if num != 432 && num != 433 && num != 436 {
        return;
    }

    let current = state.get_nick();
    let mut candidate = if num == 432 {
        let sanitized: String = current.chars().filter(|c| c.is_alphanumeric()).collect();
        if sanitized.is_empty() {
            "f".to_owned()
        } else {
            sanitized
        }
    } else {
        mangle(&current)
    };

    if let Some(len) = state.clamp_len() {
        if candidate.len() > len {
            let start = candidate.len() - len;
            candidate = candidate[start..].to_owned();
        }
    }

    state.set_nick(candidate.clone());
    let _ = state.queue.send(irc_wire::nick(&candidate)).await;
}

/// Numeric 332 (RPL_TOPIC) doubles, in this design, as the channel-list
/// membership signal: prepend the channel if it is not already tracked
/// (spec.md Open Question resolution: "prepend when absent"). Like 001,
/// the target nick is `params[0]`; the channel is `params[1]`.
pub async fn join_handler<S>(state: IrcState<S>, event: Event) {
    if let Cmd::Reply { num: 332, params } = &event.msg.cmd {
        if let Some(chan) = params.get(1) {
            state.prepend_channel(irc_common::ChanName::new(chan.clone()));
        }
    }
}

/// KICK: if we were the one kicked, drop the channel from our list.
pub async fn kick_handler<S>(state: IrcState<S>, event: Event) {
    if let Cmd::KICK { chan, nick, .. } = &event.msg.cmd {
        if irc_common::nick_eq(nick, &state.get_nick()) {
            state.leave_channel(chan);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;
    use std::time::Duration;

    use irc_wire::Msg;

    use super::*;
    use crate::config::connect;
    use crate::event::EventKind;
    use crate::queue::SendQueue;
    use crate::state::{InstanceConfig, IrcState};

    fn test_state() -> IrcState<()> {
        let cconf = Rc::new(connect::<()>("irc.example.org", 6667, Duration::from_millis(1)));
        let iconf = InstanceConfig::new("alice".to_owned(), Vec::new(), "0.1".to_owned());
        let (queue, _rx) = SendQueue::new(16);
        IrcState::new(cconf, iconf, (), queue)
    }

    fn numeric_event(num: u16, params: Vec<String>) -> Event {
        let msg = Rc::new(Msg {
            pfx: None,
            cmd: Cmd::Reply { num, params },
        });
        Event {
            kind: EventKind::ENumeric,
            source: crate::event::EventSource::Server,
            msg,
            raw: Rc::from(Vec::new().into_boxed_slice()),
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_join_handler_reads_channel_from_second_param() {
        let state = test_state();
        // `:srv 332 alice #foo :topic text` parses to params
        // ["alice", "#foo", "topic text"] — the nick first, like numeric 001.
        let event = numeric_event(
            332,
            vec!["alice".to_owned(), "#foo".to_owned(), "topic text".to_owned()],
        );
        join_handler(state.clone(), event).await;
        assert!(state.has_channel(irc_common::ChanNameRef::new("#foo")));
        assert!(!state.has_channel(irc_common::ChanNameRef::new("alice")));
    }

    #[test]
    fn test_mangle_substitutes_first_match_only() {
        assert_eq!(mangle("tiny"), "t1ny");
        assert_eq!(mangle("Tiny"), "T1ny");
        assert_eq!(mangle("LLL"), "1LL");
        assert_eq!(mangle("oOo"), "0Oo");
    }

    #[test]
    fn test_mangle_falls_back_to_append() {
        // No substring in MANGLE_TABLE matches a nick made entirely of
        // characters the table doesn't touch.
        assert_eq!(mangle("xyz"), "xyz1");
    }

    #[test]
    fn test_mangle_cycles_through_digits() {
        assert_eq!(mangle("xy9"), "xy-");
    }
}
