use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::time::Duration;

use crate::error::DisconnectCause;
use crate::logging::{noop_logger, LogFn};
use crate::state::IrcState;
use crate::stream::Connector;

/// Default flood cooldown: the minimum wall-clock gap the writer leaves
/// between two successive writes (spec.md §4.4).
pub const DEFAULT_FLOOD_COOLDOWN: Duration = Duration::from_millis(500);

/// Default read timeout: how long the reader waits for a frame before
/// the session transitions to Disconnecting with cause `Timeout`.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(180);

/// An action run once Connected, before any user traffic (spec.md §4.1).
/// The default sends `NICK <configured nick>`.
pub type OnConnect<S> = Rc<dyn Fn(IrcState<S>) -> Pin<Box<dyn Future<Output = ()>>>>;

/// An action run once the session has fully stopped, receiving the cause
/// (`None` for a clean disconnect).
pub type OnDisconnect<S> =
    Rc<dyn Fn(Option<DisconnectCause>) -> Pin<Box<dyn Future<Output = ()>>>>;

/// Immutable per-session configuration (spec.md §3 "ConnectionConfig"),
/// built once by [`connect`]/[`connect_tls`]/... and shared by `Rc`
/// reference with the rest of the session.
pub struct ConnectionConfig<S> {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub realname: String,
    pub password: Option<String>,
    pub flood_cooldown: Duration,
    pub read_timeout: Duration,
    pub connector: Connector,
    pub log_fn: LogFn,
    pub on_connect: OnConnect<S>,
    pub on_disconnect: OnDisconnect<S>,
}

fn default_version() -> String {
    format!("irc-client-{}", env!("CARGO_PKG_VERSION"))
}

/// Default version string reported by `ctcp_version_handler` (spec.md §6).
pub fn default_version_string() -> String {
    default_version()
}

/// The default on-connect action: send `NICK <nick>` (spec.md §4.1).
pub fn default_on_connect<S: 'static>() -> OnConnect<S> {
    Rc::new(|state: IrcState<S>| {
        Box::pin(async move {
            let nick = state.get_nick();
            let _ = state.queue.send(irc_wire::nick(&nick)).await;
        })
    })
}

/// The default on-disconnect action: does nothing.
pub fn default_on_disconnect<S: 'static>() -> OnDisconnect<S> {
    Rc::new(|_cause: Option<DisconnectCause>| Box::pin(async move {}))
}

struct Builder<S> {
    host: String,
    port: u16,
    username: String,
    realname: String,
    password: Option<String>,
    flood_cooldown: Duration,
    read_timeout: Duration,
    on_connect: OnConnect<S>,
    on_disconnect: OnDisconnect<S>,
}

impl<S: 'static> Builder<S> {
    fn new(host: &str, port: u16, cooldown: Duration) -> Self {
        Builder {
            host: host.to_owned(),
            port,
            username: "irc-client".to_owned(),
            realname: "irc-client".to_owned(),
            password: None,
            flood_cooldown: cooldown,
            read_timeout: DEFAULT_READ_TIMEOUT,
            on_connect: default_on_connect(),
            on_disconnect: default_on_disconnect(),
        }
    }

    fn build(self, connector: Connector, log_fn: LogFn) -> ConnectionConfig<S> {
        ConnectionConfig {
            host: self.host,
            port: self.port,
            username: self.username,
            realname: self.realname,
            password: self.password,
            flood_cooldown: self.flood_cooldown,
            read_timeout: self.read_timeout,
            connector,
            log_fn,
            on_connect: self.on_connect,
            on_disconnect: self.on_disconnect,
        }
    }
}

/// Plaintext TCP, default logger (`noop_logger`).
pub fn connect<S: 'static>(host: &str, port: u16, cooldown: Duration) -> ConnectionConfig<S> {
    connect_(host, port, cooldown, noop_logger())
}

/// Plaintext TCP with an explicit log callback.
pub fn connect_<S: 'static>(
    host: &str,
    port: u16,
    cooldown: Duration,
    log_fn: LogFn,
) -> ConnectionConfig<S> {
    Builder::new(host, port, cooldown).build(Connector::Plain, log_fn)
}

#[cfg(feature = "tls-rustls")]
pub fn connect_tls<S: 'static>(host: &str, port: u16, cooldown: Duration) -> ConnectionConfig<S> {
    connect_tls_(host, port, cooldown, noop_logger())
}

#[cfg(feature = "tls-rustls")]
pub fn connect_tls_<S: 'static>(
    host: &str,
    port: u16,
    cooldown: Duration,
    log_fn: LogFn,
) -> ConnectionConfig<S> {
    Builder::new(host, port, cooldown).build(Connector::TlsDefault, log_fn)
}

#[cfg(feature = "tls-rustls")]
pub fn connect_tls_with_config<S: 'static>(
    host: &str,
    port: u16,
    cooldown: Duration,
    config: std::sync::Arc<tokio_rustls::rustls::ClientConfig>,
) -> ConnectionConfig<S> {
    connect_tls_with_config_(host, port, cooldown, config, noop_logger())
}

#[cfg(feature = "tls-rustls")]
pub fn connect_tls_with_config_<S: 'static>(
    host: &str,
    port: u16,
    cooldown: Duration,
    config: std::sync::Arc<tokio_rustls::rustls::ClientConfig>,
    log_fn: LogFn,
) -> ConnectionConfig<S> {
    Builder::new(host, port, cooldown).build(Connector::TlsConfig(config), log_fn)
}

#[cfg(feature = "tls-rustls")]
pub fn connect_tls_with_verifier<S: 'static>(
    host: &str,
    port: u16,
    cooldown: Duration,
    verify: crate::stream::CertVerifyFn,
) -> ConnectionConfig<S> {
    connect_tls_with_verifier_(host, port, cooldown, verify, noop_logger())
}

#[cfg(feature = "tls-rustls")]
pub fn connect_tls_with_verifier_<S: 'static>(
    host: &str,
    port: u16,
    cooldown: Duration,
    verify: crate::stream::CertVerifyFn,
    log_fn: LogFn,
) -> ConnectionConfig<S> {
    Builder::new(host, port, cooldown).build(Connector::TlsVerifier(verify), log_fn)
}

/// TLS via the `native-tls` backend (`tls-native` feature), default
/// platform trust store.
#[cfg(feature = "tls-native")]
pub fn connect_tls_native<S: 'static>(
    host: &str,
    port: u16,
    cooldown: Duration,
) -> ConnectionConfig<S> {
    connect_tls_native_(host, port, cooldown, noop_logger())
}

#[cfg(feature = "tls-native")]
pub fn connect_tls_native_<S: 'static>(
    host: &str,
    port: u16,
    cooldown: Duration,
    log_fn: LogFn,
) -> ConnectionConfig<S> {
    Builder::new(host, port, cooldown).build(Connector::TlsNative, log_fn)
}
