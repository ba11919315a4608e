//! Raw-wire-frame logging callbacks.
//!
//! This is distinct from the ambient diagnostic logging the rest of the
//! crate does through the `log` crate facade (`debug!`/`info!`/...):
//! these callbacks see exactly the bytes that crossed the wire, tagged
//! with direction, and nothing else. A chat-transcript logger (per
//! channel, per user) is a "logging backend" in the sense the core treats
//! as an external collaborator, and is not provided here.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::rc::Rc;

/// Direction a logged frame travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    FromServer,
    FromClient,
}

/// The shape every log callback implements: origin tag plus the raw bytes
/// of one wire frame (without the trailing CRLF).
pub type LogFn = Rc<dyn Fn(Origin, &[u8])>;

/// Discards every frame. The default.
pub fn noop_logger() -> LogFn {
    Rc::new(|_origin, _bytes| {})
}

/// Writes every frame to stdout, prefixed with `>>` (FromClient) or `<<`
/// (FromServer).
pub fn stdout_logger() -> LogFn {
    Rc::new(|origin, bytes| {
        let prefix = match origin {
            Origin::FromServer => "<<",
            Origin::FromClient => ">>",
        };
        println!("{} {}", prefix, String::from_utf8_lossy(bytes));
    })
}

/// Appends every frame to the file at `path`, creating parent directories
/// as needed. Errors opening or writing the file are reported to stderr
/// rather than panicking, since a logging failure should not take down the
/// session.
pub fn file_logger(path: impl AsRef<Path>) -> LogFn {
    let path = path.as_ref().to_owned();
    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            eprintln!("irc-client: could not create log directory {:?}: {}", parent, e);
        }
    }

    Rc::new(move |origin, bytes| {
        let prefix = match origin {
            Origin::FromServer => "<<",
            Origin::FromClient => ">>",
        };
        let now = time::OffsetDateTime::now_utc();
        let line = format!(
            "[{:02}:{:02}:{:02}] {} {}\n",
            now.hour(),
            now.minute(),
            now.second(),
            prefix,
            String::from_utf8_lossy(bytes)
        );

        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(mut file) => {
                if let Err(e) = file.write_all(line.as_bytes()) {
                    eprintln!("irc-client: could not write to log file {:?}: {}", path, e);
                }
            }
            Err(e) => {
                eprintln!("irc-client: could not open log file {:?}: {}", path, e);
            }
        }
    })
}
