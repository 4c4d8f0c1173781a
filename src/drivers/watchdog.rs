//! systemd watchdog driver.
//!
//! Speaks the `sd_notify` datagram protocol over `$NOTIFY_SOCKET`:
//! `READY=1` once start-up is done, `WATCHDOG=1` after every successful
//! cycle.  If the pings stop for longer than the unit's `WatchdogSec=`,
//! systemd restarts the process.
//!
//! Without `$NOTIFY_SOCKET` (not started by systemd, or disabled in
//! config) every call is a no-op.

use std::path::PathBuf;

use log::{debug, info, warn};

use crate::app::ports::Liveness;

pub struct Watchdog {
    socket: Option<PathBuf>,
}

impl Watchdog {
    /// Read `$NOTIFY_SOCKET` if `enabled`.
    pub fn from_env(enabled: bool) -> Self {
        let socket = if enabled {
            std::env::var_os("NOTIFY_SOCKET").map(PathBuf::from)
        } else {
            None
        };
        match &socket {
            Some(path) => info!("Watchdog: notifying {}", path.display()),
            None => info!("Watchdog: disabled (no NOTIFY_SOCKET)"),
        }
        Self { socket }
    }

    pub fn disabled() -> Self {
        Self { socket: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.socket.is_some()
    }

    /// Tell systemd start-up is complete.
    pub fn ready(&self) {
        self.notify("READY=1");
    }

    /// Keep-alive ping.
    pub fn feed(&self) {
        self.notify("WATCHDOG=1");
    }

    fn notify(&self, state: &str) {
        let Some(path) = &self.socket else {
            return;
        };
        match send(path, state) {
            Ok(()) => debug!("Watchdog: sent {state}"),
            Err(e) => warn!("Watchdog: {state} failed: {e}"),
        }
    }
}

impl Liveness for Watchdog {
    fn ping(&self) {
        self.feed();
    }
}

#[cfg(unix)]
fn send(path: &std::path::Path, state: &str) -> std::io::Result<()> {
    use std::os::unix::net::UnixDatagram;

    let sock = UnixDatagram::unbound()?;

    #[cfg(target_os = "linux")]
    {
        use std::os::linux::net::SocketAddrExt;
        use std::os::unix::ffi::OsStrExt;
        use std::os::unix::net::SocketAddr;

        // '@' prefix: abstract namespace.
        if let Some(name) = path.as_os_str().as_bytes().strip_prefix(b"@") {
            let addr = SocketAddr::from_abstract_name(name)?;
            sock.send_to_addr(state.as_bytes(), &addr)?;
            return Ok(());
        }
    }

    sock.send_to(state.as_bytes(), path)?;
    Ok(())
}

#[cfg(not(unix))]
fn send(_path: &std::path::Path, _state: &str) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "sd_notify needs unix sockets",
    ))
}
