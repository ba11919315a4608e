#![allow(clippy::write_with_newline)]

//! IRC wire protocol message parsers and generators. Incomplete; new
//! messages are added as needed.
//!
//! This library is for implementing clients rather than servers or
//! services, and does not support the IRC message format in full
//! generality.

mod utils;

use std::fmt;

use irc_common::{ChanName, ChanNameRef};

pub use utils::{find_idx, split_iterator};

pub fn pass(pass: &str) -> String {
    format!("PASS {}\r\n", pass)
}

pub fn quit(reason: Option<String>) -> String {
    match reason {
        None => "QUIT\r\n".to_string(),
        Some(reason) => format!("QUIT :{}\r\n", reason),
    }
}

pub fn user(hostname: &str, realname: &str) -> String {
    format!("USER {} 8 * :{}\r\n", hostname, realname)
}

pub fn nick(arg: &str) -> String {
    format!("NICK {}\r\n", arg)
}

pub fn ping(arg: &str) -> String {
    format!("PING {}\r\n", arg)
}

pub fn pong(arg: &str) -> String {
    format!("PONG {}\r\n", arg)
}

pub fn join<'a, I>(chans: I) -> String
where
    I: Iterator<Item = &'a ChanNameRef> + 'a,
{
    let chans = chans.map(|c| c.display()).collect::<Vec<_>>();
    format!("JOIN {}\r\n", chans.join(","))
}

pub fn part(chan: &ChanNameRef) -> String {
    format!("PART {}\r\n", chan.display())
}

pub fn privmsg(msgtarget: &str, msg: &str) -> String {
    // IRC messages need to be shorter than 512 bytes (RFC 1459/2812).
    // Callers that may exceed this should split with `split_iterator` first.
    assert!(msgtarget.len() + msg.len() + 12 <= 512);
    format!("PRIVMSG {} :{}\r\n", msgtarget, msg)
}

pub fn notice(msgtarget: &str, msg: &str) -> String {
    assert!(msgtarget.len() + msg.len() + 11 <= 512);
    format!("NOTICE {} :{}\r\n", msgtarget, msg)
}

pub fn action(msgtarget: &str, msg: &str) -> String {
    assert!(msgtarget.len() + msg.len() + 21 <= 512); // See comment in `privmsg`.
    format!("PRIVMSG {} :\x01ACTION {}\x01\r\n", msgtarget, msg)
}

pub fn away(msg: Option<&str>) -> String {
    match msg {
        None => "AWAY\r\n".to_string(),
        Some(msg) => format!("AWAY :{}\r\n", msg),
    }
}

pub fn topic(chan: &ChanNameRef, topic: Option<&str>) -> String {
    match topic {
        None => format!("TOPIC {}\r\n", chan.display()),
        Some(topic) => format!("TOPIC {} :{}\r\n", chan.display(), topic),
    }
}

pub fn mode(target: &str, modestring: &str, params: &[&str]) -> String {
    if params.is_empty() {
        format!("MODE {} {}\r\n", target, modestring)
    } else {
        format!("MODE {} {} {}\r\n", target, modestring, params.join(" "))
    }
}

pub fn kick(chan: &ChanNameRef, nick: &str, comment: Option<&str>) -> String {
    match comment {
        None => format!("KICK {} {}\r\n", chan.display(), nick),
        Some(comment) => format!("KICK {} {} :{}\r\n", chan.display(), nick, comment),
    }
}

pub fn invite(nick: &str, chan: &ChanNameRef) -> String {
    format!("INVITE {} {}\r\n", nick, chan.display())
}

pub fn cap_ls() -> String {
    "CAP LS\r\n".to_string()
}

pub fn cap_req(cap_identifiers: &[&str]) -> String {
    format!("CAP REQ :{}\r\n", cap_identifiers.join(" "))
}

pub fn cap_end() -> String {
    "CAP END\r\n".to_string()
}

pub fn authenticate(msg: &str) -> String {
    format!("AUTHENTICATE {}\r\n", msg)
}

/// Sender of a message ("prefix" in the RFC). Parsed rather than kept as a
/// raw string, since callers often need to distinguish a server from a
/// user (e.g. to pick a tab, or an `EventSource`, to show the message in).
///
/// (Note that the ambiguity in the RFC makes this a best-effort thing. When
/// we get a message from e.g. "foo" it's not possible to know whether "foo"
/// is a server or a user.)
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Pfx {
    /// Sender is a server.
    Server(String),

    /// Sender is a nick.
    User {
        /// Nick of the sender.
        nick: String,
        /// `user@host` part.
        user: String,
    },

    /// Could be a server or a nick, it's unclear. According to the RFC, if
    /// we have something like "localhost" which doesn't have '!', '@', or
    /// a character that 'servername' can have but 'nickname' cannot, we
    /// can't tell whether the sender is a server or a nick.
    Ambiguous(String),
}

impl Pfx {
    /// The sender's nick, when the prefix identifies one. `Server` prefixes
    /// and ambiguous prefixes that turn out to be servers have no nick.
    pub fn nick(&self) -> Option<&str> {
        match self {
            Pfx::Server(_) => None,
            Pfx::User { nick, .. } => Some(nick),
            Pfx::Ambiguous(s) => Some(s),
        }
    }

    fn serialize(&self) -> String {
        match self {
            Pfx::Server(s) => s.clone(),
            Pfx::User { nick, user } => {
                if user.is_empty() {
                    nick.clone()
                } else {
                    format!("{}!{}", nick, user)
                }
            }
            Pfx::Ambiguous(s) => s.clone(),
        }
    }
}

// RFC 2812 section 2.3.1
pub fn parse_pfx(pfx: &str) -> Pfx {
    match pfx.find(['!', '@']) {
        Some(idx) => Pfx::User {
            nick: pfx[0..idx].to_owned(),
            user: pfx[idx + 1..].to_owned(),
        },
        None => {
            // Chars that nicks can have but servernames cannot.
            match pfx.find(['[', ']', '\\', '`', '_', '^', '{', '|', '}']) {
                Some(_) => Pfx::User {
                    nick: pfx.to_owned(),
                    user: "".to_owned(),
                },
                None => {
                    // Nicks can't have '.'.
                    match pfx.find('.') {
                        Some(_) => Pfx::Server(pfx.to_owned()),
                        None => Pfx::Ambiguous(pfx.to_owned()),
                    }
                }
            }
        }
    }
}

/// Target of a message.
///
/// Masks are not parsed, as rules for masks are not clear in RFC 2812 (for
/// example, `#x.y` can be a channel name or a host mask, there is no way to
/// disambiguate), and in practice servers use masks that are not valid
/// according to the RFC. The rule we follow is: if a target starts with `#`
/// it's a `Chan`, otherwise it's a `User`.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum MsgTarget {
    Chan(ChanName),
    User(String),
}

impl MsgTarget {
    fn serialize(&self) -> String {
        match self {
            MsgTarget::Chan(c) => c.display().to_owned(),
            MsgTarget::User(n) => n.clone(),
        }
    }
}

/// An IRC message.
#[derive(Debug, PartialEq, Eq)]
pub struct Msg {
    /// Sender of a message. According to RFC 2812 it's optional:
    ///
    /// > If the prefix is missing from the message, it is assumed to have
    /// > originated from the connection from which it was received from.
    pub pfx: Option<Pfx>,
    pub cmd: Cmd,
}

/// A Client-To-Client Protocol message: a verb with zero or more
/// space-separated arguments, carried inside a PRIVMSG or NOTICE payload
/// delimited by `\x01` bytes. See <https://defs.ircdocs.horse/defs/ctcp.html>.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Ctcp {
    pub verb: String,
    pub args: Vec<String>,
}

/// Wrap a CTCP verb and its arguments in the `\x01...\x01` delimiters used
/// inside a PRIVMSG/NOTICE payload.
pub fn encode_ctcp(verb: &str, args: &[&str]) -> String {
    if args.is_empty() {
        format!("\x01{}\x01", verb)
    } else {
        format!("\x01{} {}\x01", verb, args.join(" "))
    }
}

/// Parse a CTCP payload (the part between, or that would be between, the
/// `\x01` delimiters) into a verb and its arguments. Returns `None` only
/// for an empty payload.
pub fn decode_ctcp(payload: &str) -> Option<Ctcp> {
    if payload.is_empty() {
        return None;
    }
    match payload.find(' ') {
        Some(idx) => Some(Ctcp {
            verb: payload[..idx].to_owned(),
            args: payload[idx + 1..]
                .split(' ')
                .map(|s| s.to_owned())
                .collect(),
        }),
        None => Some(Ctcp {
            verb: payload.to_owned(),
            args: Vec::new(),
        }),
    }
}

/// An IRC command or reply.
#[derive(Debug, PartialEq, Eq)]
pub enum Cmd {
    /// A PRIVMSG or NOTICE. Check `is_notice`.
    PRIVMSG {
        target: MsgTarget,
        msg: String,
        is_notice: bool,
        ctcp: Option<Ctcp>,
    },

    JOIN {
        chan: ChanName,
    },

    PART {
        chan: ChanName,
        msg: Option<String>,
    },

    QUIT {
        msg: Option<String>,
        /// Channels the user who quit shared with us. Not part of the wire
        /// message; filled in by the session engine for handlers'
        /// convenience.
        chans: Vec<ChanName>,
    },

    NICK {
        nick: String,
        /// As with `QUIT::chans`, filled in by the session engine.
        chans: Vec<ChanName>,
    },

    PING {
        server: String,
        /// A second server argument, present when the server is relaying a
        /// ping between two servers; `pingHandler` (spec.md §4.3) replies
        /// with this when present, the first argument otherwise.
        server2: Option<String>,
    },

    PONG {
        server: String,
    },

    ERROR {
        msg: String,
    },

    TOPIC {
        chan: ChanName,
        topic: String,
    },

    MODE {
        target: String,
        modestring: String,
        params: Vec<String>,
    },

    KICK {
        chan: ChanName,
        nick: String,
        comment: Option<String>,
    },

    INVITE {
        nick: String,
        chan: ChanName,
    },

    CAP {
        client: String,
        subcommand: String,
        params: Vec<String>,
    },

    AUTHENTICATE {
        param: String,
    },

    /// An IRC message other than the ones listed above.
    Other { cmd: String, params: Vec<String> },

    /// Numeric replies are kept generic as there are too many to enumerate
    /// and most clients only handle a small subset.
    Reply { num: u16, params: Vec<String> },
}

/// An intermediate type used during parsing.
enum MsgType<'a> {
    Cmd(&'a str),
    Num(u16),
}

static CRLF: [u8; 2] = [b'\r', b'\n'];

/// A wire-format error: the frame was not valid IRC syntax. Carries the raw
/// (lossily-decoded) line for diagnostics.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct WireError {
    pub msg: String,
    pub line: String,
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (in {:?})", self.msg, self.line)
    }
}

impl std::error::Error for WireError {}

/// Try to read one IRC message off a buffer. Drops the message (and its
/// trailing CRLF) from the buffer whether parsing succeeds or fails; if no
/// complete frame is available yet, returns `None` and leaves the buffer
/// unchanged.
pub fn parse_irc_msg(buf: &mut Vec<u8>) -> Option<Result<Msg, WireError>> {
    // Find "\r\n" before lossily decoding, since replacing invalid UTF-8
    // with U+FFFD can change byte offsets relative to the raw buffer.
    let crlf_idx = buf.windows(2).position(|sub| sub == CRLF)?;

    let msg_owned: String = String::from_utf8_lossy(&buf[0..crlf_idx]).to_string();
    let ret = parse_one_message(&msg_owned).map_err(|msg| WireError {
        msg,
        line: msg_owned.clone(),
    });
    buf.drain(0..crlf_idx + 2);

    Some(ret)
}

// NB. 'msg' does not contain the '\r\n' suffix.
fn parse_one_message(mut msg: &str) -> Result<Msg, String> {
    let pfx: Option<Pfx> = {
        if let Some(':') = msg.chars().next() {
            let ws_idx = msg
                .find(' ')
                .ok_or_else(|| format!("Can't find prefix terminator (' ') in msg: {:?}", msg))?;
            let pfx = &msg[1..ws_idx]; // consume ':'
            msg = &msg[ws_idx + 1..]; // consume ' '
            Some(parse_pfx(pfx))
        } else {
            None
        }
    };

    let msg_ty: MsgType = {
        let ws_idx = msg.find(' ').ok_or_else(|| {
            format!("Can't find message type terminator (' ') in msg: {:?}", msg)
        })?;
        let cmd = &msg[..ws_idx];
        msg = &msg[ws_idx + 1..]; // Consume ' '
        match cmd.parse::<u16>() {
            Ok(num) => MsgType::Num(num),
            Err(_) => MsgType::Cmd(cmd),
        }
    };

    let params = parse_params(msg);
    let cmd = match msg_ty {
        MsgType::Cmd("PRIVMSG") | MsgType::Cmd("NOTICE") if params.len() == 2 => {
            let is_notice = matches!(msg_ty, MsgType::Cmd("NOTICE"));
            let target = params[0];
            let mut msg = params[1];
            let target = if target.starts_with('#') {
                MsgTarget::Chan(ChanName::new(target.to_owned()))
            } else {
                MsgTarget::User(target.to_owned())
            };

            let mut ctcp: Option<Ctcp> = None;
            if !msg.is_empty() && msg.as_bytes()[0] == 0x01 {
                msg = &msg[1..]; // Drop leading 0x01.
                if !msg.is_empty() && msg.as_bytes()[msg.len() - 1] == 0x01 {
                    msg = &msg[..msg.len() - 1]; // Drop trailing 0x01, if present.
                }
                ctcp = decode_ctcp(msg);
                msg = "";
            }

            Cmd::PRIVMSG {
                target,
                msg: msg.to_owned(),
                is_notice,
                ctcp,
            }
        }
        MsgType::Cmd("JOIN") if params.len() == 1 => Cmd::JOIN {
            chan: ChanName::new(params[0].to_owned()),
        },
        MsgType::Cmd("PART") if params.len() == 1 || params.len() == 2 => {
            let mb_msg = if params.len() == 2 {
                Some(params[1].to_owned())
            } else {
                None
            };
            Cmd::PART {
                chan: ChanName::new(params[0].to_owned()),
                msg: mb_msg,
            }
        }
        MsgType::Cmd("QUIT") if params.is_empty() || params.len() == 1 => Cmd::QUIT {
            msg: params.first().map(|s| (*s).to_owned()),
            chans: Vec::new(),
        },
        MsgType::Cmd("NICK") if params.len() == 1 => Cmd::NICK {
            nick: params[0].to_owned(),
            chans: Vec::new(),
        },
        MsgType::Cmd("PING") if params.len() == 1 || params.len() == 2 => Cmd::PING {
            server: params[0].to_owned(),
            server2: params.get(1).map(|s| (*s).to_owned()),
        },
        MsgType::Cmd("PONG") if !params.is_empty() => Cmd::PONG {
            server: params[0].to_owned(),
        },
        MsgType::Cmd("ERROR") if params.len() == 1 => Cmd::ERROR {
            msg: params[0].to_owned(),
        },
        MsgType::Cmd("TOPIC") if params.len() == 2 => Cmd::TOPIC {
            chan: ChanName::new(params[0].to_owned()),
            topic: params[1].to_owned(),
        },
        MsgType::Cmd("MODE") if !params.is_empty() => Cmd::MODE {
            target: params[0].to_owned(),
            modestring: params.get(1).map(|s| (*s).to_owned()).unwrap_or_default(),
            params: params[2.min(params.len())..]
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
        },
        MsgType::Cmd("KICK") if params.len() == 2 || params.len() == 3 => Cmd::KICK {
            chan: ChanName::new(params[0].to_owned()),
            nick: params[1].to_owned(),
            comment: params.get(2).map(|s| (*s).to_owned()),
        },
        MsgType::Cmd("INVITE") if params.len() == 2 => Cmd::INVITE {
            nick: params[0].to_owned(),
            chan: ChanName::new(params[1].to_owned()),
        },
        MsgType::Cmd("CAP") if params.len() == 3 => Cmd::CAP {
            client: params[0].to_owned(),
            subcommand: params[1].to_owned(),
            params: params[2].split(' ').map(|s| s.to_owned()).collect(),
        },
        MsgType::Cmd("AUTHENTICATE") if params.len() == 1 => Cmd::AUTHENTICATE {
            param: params[0].to_owned(),
        },
        MsgType::Num(n) => Cmd::Reply {
            num: n,
            params: params.into_iter().map(|s| s.to_owned()).collect(),
        },
        MsgType::Cmd(cmd) => Cmd::Other {
            cmd: cmd.to_owned(),
            params: params.into_iter().map(|s| s.to_owned()).collect(),
        },
    };

    Ok(Msg { pfx, cmd })
}

fn parse_params(chrs: &str) -> Vec<&str> {
    // Spec:
    //
    //     params     =  *14( SPACE middle ) [ SPACE ":" trailing ]
    //                =/ 14( SPACE middle ) [ SPACE [ ":" ] trailing ]
    //
    //     nospcrlfcl =  %x01-09 / %x0B-0C / %x0E-1F / %x21-39 / %x3B-FF
    //                     ; any octet except NUL, CR, LF, " " and ":"
    //     middle     =  nospcrlfcl *( ":" / nospcrlfcl )
    //     trailing   =  *( ":" / " " / nospcrlfcl )

    let mut params = Vec::new();
    let mut char_indices = chrs.char_indices();

    while let Some((idx, c)) = char_indices.next() {
        if c == ':' {
            params.push(&chrs[idx + 1..]); // Skip ':'
            break;
        }

        if params.len() == 14 {
            params.push(&chrs[idx..]);
            break;
        }

        if c == ' ' {
            continue;
        }

        loop {
            match char_indices.next() {
                Some((idx_, c)) => {
                    if c == ' ' {
                        params.push(&chrs[idx..idx_]);
                        break;
                    }
                }
                None => {
                    params.push(&chrs[idx..]);
                    break;
                }
            }
        }
    }

    params
}

/// Serialise a parsed message back into wire bytes (including the
/// trailing `\r\n`). The structural inverse of [`parse_irc_msg`].
pub fn serialize(msg: &Msg) -> String {
    let mut out = String::new();
    if let Some(pfx) = &msg.pfx {
        out.push(':');
        out.push_str(&pfx.serialize());
        out.push(' ');
    }

    match &msg.cmd {
        Cmd::PRIVMSG {
            target,
            msg,
            is_notice,
            ctcp,
        } => {
            out.push_str(if *is_notice { "NOTICE" } else { "PRIVMSG" });
            out.push(' ');
            out.push_str(&target.serialize());
            out.push_str(" :");
            match ctcp {
                Some(Ctcp { verb, args }) => {
                    let args_ref: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
                    out.push_str(&encode_ctcp(verb, &args_ref));
                }
                None => out.push_str(msg),
            }
        }
        Cmd::JOIN { chan } => {
            out.push_str("JOIN ");
            out.push_str(chan.display());
        }
        Cmd::PART { chan, msg } => {
            out.push_str("PART ");
            out.push_str(chan.display());
            if let Some(msg) = msg {
                out.push_str(" :");
                out.push_str(msg);
            }
        }
        Cmd::QUIT { msg, .. } => {
            out.push_str("QUIT");
            if let Some(msg) = msg {
                out.push_str(" :");
                out.push_str(msg);
            }
        }
        Cmd::NICK { nick, .. } => {
            out.push_str("NICK ");
            out.push_str(nick);
        }
        Cmd::PING { server, server2 } => {
            out.push_str("PING ");
            out.push_str(server);
            if let Some(server2) = server2 {
                out.push(' ');
                out.push_str(server2);
            }
        }
        Cmd::PONG { server } => {
            out.push_str("PONG ");
            out.push_str(server);
        }
        Cmd::ERROR { msg } => {
            out.push_str("ERROR :");
            out.push_str(msg);
        }
        Cmd::TOPIC { chan, topic } => {
            out.push_str("TOPIC ");
            out.push_str(chan.display());
            out.push_str(" :");
            out.push_str(topic);
        }
        Cmd::MODE {
            target,
            modestring,
            params,
        } => {
            out.push_str("MODE ");
            out.push_str(target);
            out.push(' ');
            out.push_str(modestring);
            for p in params {
                out.push(' ');
                out.push_str(p);
            }
        }
        Cmd::KICK {
            chan,
            nick,
            comment,
        } => {
            out.push_str("KICK ");
            out.push_str(chan.display());
            out.push(' ');
            out.push_str(nick);
            if let Some(comment) = comment {
                out.push_str(" :");
                out.push_str(comment);
            }
        }
        Cmd::INVITE { nick, chan } => {
            out.push_str("INVITE ");
            out.push_str(nick);
            out.push(' ');
            out.push_str(chan.display());
        }
        Cmd::CAP {
            client,
            subcommand,
            params,
        } => {
            out.push_str("CAP ");
            out.push_str(client);
            out.push(' ');
            out.push_str(subcommand);
            out.push_str(" :");
            out.push_str(&params.join(" "));
        }
        Cmd::AUTHENTICATE { param } => {
            out.push_str("AUTHENTICATE ");
            out.push_str(param);
        }
        Cmd::Other { cmd, params } => {
            out.push_str(cmd);
            serialize_params(&mut out, params);
        }
        Cmd::Reply { num, params } => {
            out.push_str(&format!("{:03}", num));
            serialize_params(&mut out, params);
        }
    }

    out.push_str("\r\n");
    out
}

fn serialize_params(out: &mut String, params: &[String]) {
    if params.is_empty() {
        return;
    }
    for p in &params[..params.len() - 1] {
        out.push(' ');
        out.push_str(p);
    }
    let last = &params[params.len() - 1];
    out.push_str(" :");
    out.push_str(last);
}

/// Nicks may have a leading membership prefix, indicating an operator,
/// founder, or similar. See <http://modern.ircdocs.horse/#channel-membership-prefixes>.
/// Returns the nick without any such prefix.
pub fn drop_nick_prefix(nick: &str) -> &str {
    static PREFIXES: [char; 5] = ['~', '&', '@', '%', '+'];

    match nick.chars().next() {
        Some(c) if PREFIXES.contains(&c) => &nick[1..],
        _ => nick,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_params() {
        assert_eq!(parse_params("p1 p2 p3"), vec!["p1", "p2", "p3"]);
        let empty: Vec<&str> = vec![];
        assert_eq!(parse_params(""), empty);
        assert_eq!(parse_params(":foo bar baz "), vec!["foo bar baz "]);
        assert_eq!(
            parse_params(":foo : bar : baz :"),
            vec!["foo : bar : baz :"]
        );
        assert_eq!(parse_params(":"), vec![""]);
        assert_eq!(parse_params("x:"), vec!["x:"]);
        assert_eq!(parse_params("x:y"), vec!["x:y"]);
        assert_eq!(parse_params("x:y:z"), vec!["x:y:z"]);
        assert_eq!(parse_params(":::::"), vec!["::::"]);

        let params = parse_params("1 2 3 4 5 6 7 8 9 10 11 12 13 14 blah blah blah");
        assert_eq!(params.len(), 15);
        assert_eq!(params[params.len() - 1], "blah blah blah");

        assert_eq!(parse_params("   "), empty);
        assert_eq!(parse_params(":  "), vec!["  "]);
        assert_eq!(parse_params(": : :"), vec![" : :"]);
        assert_eq!(parse_params("x y : : :"), vec!["x", "y", " : :"]);
        assert_eq!(parse_params("aaa://aaa"), vec!["aaa://aaa"]);
    }

    #[test]
    fn test_privmsg_parsing() {
        let mut buf = vec![];
        write!(
            &mut buf,
            ":nick!~nick@unaffiliated/nick PRIVMSG tiny :a b c\r\n"
        )
        .unwrap();
        assert_eq!(
            parse_irc_msg(&mut buf).unwrap().unwrap(),
            Msg {
                pfx: Some(Pfx::User {
                    nick: "nick".to_owned(),
                    user: "~nick@unaffiliated/nick".to_owned(),
                }),
                cmd: Cmd::PRIVMSG {
                    target: MsgTarget::User("tiny".to_owned()),
                    msg: "a b c".to_owned(),
                    is_notice: false,
                    ctcp: None,
                },
            }
        );
        assert_eq!(buf.len(), 0);
    }

    #[test]
    fn test_notice_parsing() {
        let mut buf = vec![];
        write!(
            &mut buf,
            ":barjavel.freenode.net NOTICE * :*** Looking up your hostname...\r\n"
        )
        .unwrap();
        assert_eq!(
            parse_irc_msg(&mut buf).unwrap().unwrap(),
            Msg {
                pfx: Some(Pfx::Server("barjavel.freenode.net".to_owned())),
                cmd: Cmd::PRIVMSG {
                    target: MsgTarget::User("*".to_owned()),
                    msg: "*** Looking up your hostname...".to_owned(),
                    is_notice: true,
                    ctcp: None,
                },
            }
        );
    }

    #[test]
    fn test_numeric_parsing() {
        let mut buf = vec![];
        write!(
            &mut buf,
            ":barjavel.freenode.net 001 tiny :Welcome to the freenode Internet Relay Chat Network tiny\r\n"
        ).unwrap();
        write!(
            &mut buf,
            ":barjavel.freenode.net 002 tiny :Your host is barjavel.freenode.net[123.123.123.123/8001], \
             running version ircd-seven-1.1.4\r\n"
        ).unwrap();

        let mut msgs = vec![];
        while let Some(Ok(msg)) = parse_irc_msg(&mut buf) {
            assert_eq!(
                msg.pfx,
                Some(Pfx::Server("barjavel.freenode.net".to_owned()))
            );
            msgs.push(msg);
        }

        assert_eq!(msgs.len(), 2);
    }

    #[test]
    fn test_part_parsing() {
        let mut buf = vec![];
        write!(&mut buf, ":tiny!~tiny@123.123.123.123 PART #haskell\r\n").unwrap();
        assert_eq!(
            parse_irc_msg(&mut buf).unwrap().unwrap(),
            Msg {
                pfx: Some(Pfx::User {
                    nick: "tiny".to_owned(),
                    user: "~tiny@123.123.123.123".to_owned(),
                }),
                cmd: Cmd::PART {
                    chan: ChanName::new("#haskell".to_owned()),
                    msg: None,
                },
            }
        );
    }

    #[test]
    fn test_ping_parsing() {
        let mut buf = vec![];
        write!(&mut buf, "PING :tolsun.oulu.fi\r\n").unwrap();
        assert_eq!(
            parse_irc_msg(&mut buf).unwrap().unwrap(),
            Msg {
                pfx: None,
                cmd: Cmd::PING {
                    server: "tolsun.oulu.fi".to_owned(),
                    server2: None,
                },
            }
        );

        let mut buf = vec![];
        write!(&mut buf, "PING hub.example relay.example\r\n").unwrap();
        assert_eq!(
            parse_irc_msg(&mut buf).unwrap().unwrap(),
            Msg {
                pfx: None,
                cmd: Cmd::PING {
                    server: "hub.example".to_owned(),
                    server2: Some("relay.example".to_owned()),
                },
            }
        );
    }

    #[test]
    fn test_join_parsing() {
        let mut buf = vec![];
        write!(&mut buf, ":tiny!~tiny@192.168.0.1 JOIN #haskell\r\n").unwrap();
        assert_eq!(
            parse_irc_msg(&mut buf).unwrap().unwrap(),
            Msg {
                pfx: Some(Pfx::User {
                    nick: "tiny".to_owned(),
                    user: "~tiny@192.168.0.1".to_owned(),
                }),
                cmd: Cmd::JOIN {
                    chan: ChanName::new("#haskell".to_owned()),
                },
            }
        );
        assert_eq!(buf.len(), 0);
    }

    #[test]
    fn test_kick_parsing() {
        let mut buf = vec![];
        write!(
            &mut buf,
            ":op!o@h KICK #haskell nick :be nice\r\n"
        )
        .unwrap();
        assert_eq!(
            parse_irc_msg(&mut buf).unwrap().unwrap().cmd,
            Cmd::KICK {
                chan: ChanName::new("#haskell".to_owned()),
                nick: "nick".to_owned(),
                comment: Some("be nice".to_owned()),
            }
        );
    }

    #[test]
    fn test_mode_parsing() {
        let mut buf = vec![];
        write!(&mut buf, ":op!o@h MODE #haskell +o nick\r\n").unwrap();
        assert_eq!(
            parse_irc_msg(&mut buf).unwrap().unwrap().cmd,
            Cmd::MODE {
                target: "#haskell".to_owned(),
                modestring: "+o".to_owned(),
                params: vec!["nick".to_owned()],
            }
        );
    }

    #[test]
    fn test_invite_parsing() {
        let mut buf = vec![];
        write!(&mut buf, ":a!b@c INVITE nick #haskell\r\n").unwrap();
        assert_eq!(
            parse_irc_msg(&mut buf).unwrap().unwrap().cmd,
            Cmd::INVITE {
                nick: "nick".to_owned(),
                chan: ChanName::new("#haskell".to_owned()),
            }
        );
    }

    // Example from https://tools.ietf.org/id/draft-oakley-irc-ctcp-01.html
    #[test]
    fn test_ctcp_action_parsing_1() {
        let mut buf = vec![];
        write!(
            &mut buf,
            ":dan!u@localhost PRIVMSG #ircv3 :\x01ACTION writes some specs!\x01\r\n"
        )
        .unwrap();
        assert_eq!(
            parse_irc_msg(&mut buf).unwrap().unwrap(),
            Msg {
                pfx: Some(Pfx::User {
                    nick: "dan".to_owned(),
                    user: "u@localhost".to_owned(),
                }),
                cmd: Cmd::PRIVMSG {
                    target: MsgTarget::Chan(ChanName::new("#ircv3".to_owned())),
                    msg: "".to_owned(),
                    is_notice: false,
                    ctcp: Some(Ctcp {
                        verb: "ACTION".to_owned(),
                        args: vec![
                            "writes".to_owned(),
                            "some".to_owned(),
                            "specs!".to_owned()
                        ],
                    }),
                },
            }
        );
        assert_eq!(buf.len(), 0);
    }

    #[test]
    fn test_ctcp_action_parsing_missing_trailing_delim() {
        // From https://modern.ircdocs.horse/ctcp.html:
        //
        // > The final <delim> MUST be sent, but parsers SHOULD accept
        // > incoming messages which lack it (particularly for CTCP
        // > ACTION). This is due to how some software incorrectly
        // > implements message splitting.
        let mut buf = vec![];
        write!(
            &mut buf,
            ":a!b@c PRIVMSG target :\x01ACTION msg contents\r\n"
        )
        .unwrap();
        assert_eq!(
            parse_irc_msg(&mut buf).unwrap().unwrap().cmd,
            Cmd::PRIVMSG {
                target: MsgTarget::User("target".to_owned()),
                msg: "".to_owned(),
                is_notice: false,
                ctcp: Some(Ctcp {
                    verb: "ACTION".to_owned(),
                    args: vec!["msg".to_owned(), "contents".to_owned()],
                }),
            }
        );
        assert_eq!(buf.len(), 0);

        // Regression test: a message body made entirely of multi-byte
        // UTF-8 characters must not be mistaken for a CTCP payload when it
        // doesn't start with 0x01.
        let mut buf = vec![];
        write!(&mut buf, ":a!b@c PRIVMSG target :’’’’’’’\r\n").unwrap();
        assert_eq!(
            parse_irc_msg(&mut buf).unwrap().unwrap().cmd,
            Cmd::PRIVMSG {
                target: MsgTarget::User("target".to_owned()),
                msg: "’’’’’’’".to_owned(),
                is_notice: false,
                ctcp: None,
            }
        );
        assert_eq!(buf.len(), 0);
    }

    #[test]
    fn test_ctcp_version_parsing() {
        let mut buf = vec![];
        write!(&mut buf, ":a!b@c PRIVMSG target :\x01VERSION\x01\r\n").unwrap();
        assert_eq!(
            parse_irc_msg(&mut buf).unwrap().unwrap().cmd,
            Cmd::PRIVMSG {
                target: MsgTarget::User("target".to_owned()),
                msg: "".to_owned(),
                is_notice: false,
                ctcp: Some(Ctcp {
                    verb: "VERSION".to_owned(),
                    args: vec![],
                }),
            }
        );
    }

    #[test]
    fn test_error_parsing() {
        let mut buf = vec![];
        write!(
            &mut buf,
            "ERROR :Closing Link: 212.252.143.51 (Excess Flood)\r\n"
        )
        .unwrap();
        assert_eq!(
            parse_irc_msg(&mut buf).unwrap().unwrap(),
            Msg {
                pfx: None,
                cmd: Cmd::ERROR {
                    msg: "Closing Link: 212.252.143.51 (Excess Flood)".to_owned(),
                },
            },
        );
    }

    #[test]
    fn test_parse_pfx() {
        use Pfx::*;
        assert_eq!(parse_pfx("xyz"), Ambiguous("xyz".to_string()));
        assert_eq!(parse_pfx("xy-z"), Ambiguous("xy-z".to_string()));
        assert_eq!(parse_pfx("xy.z"), Server("xy.z".to_string()));
        assert_eq!(
            parse_pfx("xyz[m]"),
            User {
                nick: "xyz[m]".to_string(),
                user: "".to_string()
            }
        );
        assert_eq!(
            parse_pfx("osa1!osa1@x.y.im"),
            User {
                nick: "osa1".to_string(),
                user: "osa1@x.y.im".to_string(),
            }
        );
    }

    #[test]
    fn test_ctcp_round_trip() {
        for (verb, args) in [
            ("VERSION", vec![]),
            ("PING", vec!["123456".to_owned()]),
            ("ACTION", vec!["waves".to_owned(), "hello".to_owned()]),
        ] {
            let args_ref: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
            let encoded = encode_ctcp(verb, &args_ref);
            // `encoded` includes the `\x01` delimiters; strip them the way
            // the parser does before calling `decode_ctcp`.
            let payload = &encoded[1..encoded.len() - 1];
            let decoded = decode_ctcp(payload).unwrap();
            assert_eq!(decoded.verb, verb);
            assert_eq!(decoded.args, args);
        }
    }

    #[test]
    fn test_msg_round_trip() {
        let cases = vec![
            ":tiny!~tiny@host PRIVMSG #chan :hello there\r\n",
            ":tiny!~tiny@host NOTICE nick :hi\r\n",
            ":tiny!~tiny@host JOIN #chan\r\n",
            ":tiny!~tiny@host PART #chan :bye\r\n",
            "PING :server.example\r\n",
            "PING server1.example server2.example\r\n",
            "PONG :server.example\r\n",
            ":op!o@h KICK #chan nick :reason\r\n",
            ":op!o@h MODE #chan +o nick\r\n",
            ":a!b@c INVITE nick #chan\r\n",
            ":srv.example 001 nick :Welcome\r\n",
        ];
        for raw in cases {
            let mut buf = raw.as_bytes().to_vec();
            let msg = parse_irc_msg(&mut buf).unwrap().unwrap();
            let reserialized = serialize(&msg);
            let mut buf2 = reserialized.into_bytes();
            let msg2 = parse_irc_msg(&mut buf2).unwrap().unwrap();
            assert_eq!(msg, msg2, "round trip mismatch for {:?}", raw);
        }
    }

    #[test]
    fn test_drop_nick_prefix() {
        assert_eq!(drop_nick_prefix("@nick"), "nick");
        assert_eq!(drop_nick_prefix("+nick"), "nick");
        assert_eq!(drop_nick_prefix("nick"), "nick");
    }
}
