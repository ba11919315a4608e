//! An echo bot that repeats anything sent to it, either in a channel
//! (when addressed by nick) or as a direct PRIVMSG.

use std::process::exit;
use std::rc::Rc;
use std::time::Duration;

use irc_client::wire::{Cmd, MsgTarget};
use irc_client::{Event, EventKind, EventSource, IrcState};
use irc_common::ChanNameRef;

static NICK_SEP: [&str; 4] = [": ", ", ", ":", ","];

fn main() {
    let mut args: Vec<String> = std::env::args().collect();
    if args.len() < 4 {
        println!("echo <nick> <server> <port> [<chan_1> .. <chan_N>]");
        exit(1);
    }

    let nick = args.remove(1);
    let server = args.remove(1);
    let port: u16 = args.remove(1).parse().unwrap_or_else(|e| {
        eprintln!("can't parse port: {}", e);
        exit(1);
    });
    let chans = args[1..]
        .iter()
        .map(|c| ChanNameRef::new(c).to_owned())
        .collect::<Vec<_>>();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let local = tokio::task::LocalSet::new();
    local.block_on(&runtime, run(nick, server, port, chans));
}

async fn run(nick: String, server: String, port: u16, chans: Vec<irc_common::ChanName>) {
    let cconf = Rc::new(irc_client::connect::<()>(
        &server,
        port,
        Duration::from_millis(500),
    ));
    let iconf = irc_client::default_instance_config(nick, chans, "echo-bot".to_owned());
    let state = irc_client::start(cconf, iconf, ());

    state.add_handler(irc_client::event_handler(
        EventKind::EPrivmsg,
        echo_handler,
    ));

    // Block for the lifetime of the process; the session task drives
    // everything else.
    std::future::pending::<()>().await;
}

async fn echo_handler(state: IrcState<()>, event: Event) {
    let Cmd::PRIVMSG { target, msg, .. } = &event.msg.cmd else {
        return;
    };

    let reply = match (&event.source, target) {
        (EventSource::User(nick), MsgTarget::User(_)) => Some((nick.clone(), msg.clone())),
        (EventSource::Channel(chan), MsgTarget::Chan(_)) => {
            let our_nick = state.get_nick();
            if let Some(rest) = msg.strip_prefix(our_nick.as_str()) {
                let mut rest = rest;
                for &sep in NICK_SEP.iter() {
                    if let Some(r) = rest.strip_prefix(sep) {
                        rest = r;
                        break;
                    }
                }
                Some((chan.display().to_owned(), rest.to_owned()))
            } else {
                None
            }
        }
        _ => None,
    };

    if let Some((target, msg)) = reply {
        let _ = state
            .queue
            .send(irc_client::wire::privmsg(&target, &msg))
            .await;
    }
}
