//! Service-manager liveness notifications

use sd_notify::NotifyState;

/// Liveness hooks called by the control loop
pub trait Watchdog {
    /// The loop is about to take its first sample
    fn ready(&mut self) {}

    /// A tick completed
    fn notify_alive(&mut self);

    /// The loop is shutting down
    fn stopping(&mut self) {}
}

/// Sends READY/WATCHDOG/STOPPING over `$NOTIFY_SOCKET`
///
/// Outside systemd the socket is absent and every call is a no-op.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemdWatchdog;

impl SystemdWatchdog {
    fn send(state: NotifyState<'_>) {
        if let Err(e) = sd_notify::notify(false, &[state]) {
            log::debug!("sd_notify failed: {}", e);
        }
    }
}

impl Watchdog for SystemdWatchdog {
    fn ready(&mut self) {
        Self::send(NotifyState::Ready);
    }

    fn notify_alive(&mut self) {
        Self::send(NotifyState::Watchdog);
    }

    fn stopping(&mut self) {
        Self::send(NotifyState::Stopping);
    }
}

/// Watchdog that does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoWatchdog;

impl Watchdog for NoWatchdog {
    fn notify_alive(&mut self) {}
}
