//! Host lifecycle events mapped to sync decisions.
//!
//! The host calls these on open, save, close and every timer tick, and
//! performs the returned [`HookAction`]. Nothing here touches the network.

use crate::scheduler::{AutoSyncTimer, TimerTick};
use crate::settings::SyncSettings;
use std::time::Instant;
use tracing::debug;

/// Prefix of countdown status lines.
pub const AUTO_SYNC_STATUS: &str = "Auto-Synchronize";

/// What the host should do in response to an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookAction {
    /// Nothing.
    None,
    /// Replace the status line.
    ShowStatus(String),
    /// Run one sync attempt.
    Synchronize {
        /// Whether the user can be prompted.
        attended: bool,
    },
}

/// Sync behaviour for one open vault.
#[derive(Debug, Clone)]
pub struct SyncHooks {
    timer: AutoSyncTimer,
    sync_on_save: bool,
    open: bool,
}

impl Default for SyncHooks {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncHooks {
    /// Creates hooks with no vault open.
    pub fn new() -> Self {
        Self {
            timer: AutoSyncTimer::new(0),
            sync_on_save: false,
            open: false,
        }
    }

    /// The auto-sync timer.
    pub fn timer(&self) -> &AutoSyncTimer {
        &self.timer
    }

    /// Returns true between open and close.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// A vault was opened with `settings`.
    ///
    /// Starts the timer when an interval is set and asks for an attended
    /// attempt when sync-on-open is enabled.
    pub fn on_database_opened(&mut self, settings: &SyncSettings, now: Instant) -> HookAction {
        self.open = true;
        self.sync_on_save = settings.sync_on_save;
        self.timer.set_interval(settings.interval_minutes, now);
        debug!(
            interval_minutes = settings.interval_minutes,
            sync_on_open = settings.sync_on_open,
            sync_on_save = settings.sync_on_save,
            "vault opened"
        );

        if settings.sync_on_open {
            HookAction::Synchronize { attended: true }
        } else {
            HookAction::None
        }
    }

    /// The vault was saved. `interactive` is false while the UI is
    /// minimized or locked.
    pub fn on_database_saved(&mut self, interactive: bool) -> HookAction {
        if self.open && self.sync_on_save {
            HookAction::Synchronize {
                attended: interactive,
            }
        } else {
            HookAction::None
        }
    }

    /// The vault was closed. Stops the timer and forgets the settings.
    pub fn on_database_closed(&mut self) {
        self.open = false;
        self.sync_on_save = false;
        self.timer = AutoSyncTimer::new(0);
        debug!("vault closed");
    }

    /// Settings changed while the vault is open.
    pub fn on_settings_changed(&mut self, settings: &SyncSettings, now: Instant) -> HookAction {
        self.sync_on_save = settings.sync_on_save;
        self.set_interval(settings.interval_minutes, now)
    }

    /// Changes the auto-sync interval.
    pub fn set_interval(&mut self, minutes: u32, now: Instant) -> HookAction {
        if minutes == self.timer.interval_minutes() && self.timer.is_running() {
            return HookAction::None;
        }
        self.timer.set_interval(minutes, now);
        if minutes == 0 {
            HookAction::ShowStatus(format!("{AUTO_SYNC_STATUS} disabled"))
        } else {
            HookAction::None
        }
    }

    /// Called about once a second.
    pub fn on_tick(&mut self, now: Instant) -> HookAction {
        if !self.open {
            return HookAction::None;
        }
        match self.timer.tick(now) {
            TimerTick::Idle | TimerTick::Countdown { status: None, .. } => HookAction::None,
            TimerTick::Countdown {
                status: Some(text), ..
            } => HookAction::ShowStatus(format!("{AUTO_SYNC_STATUS}: {text}")),
            TimerTick::Due => HookAction::Synchronize { attended: false },
        }
    }

    /// Must be called right before any attempt starts.
    pub fn before_attempt(&mut self) {
        self.timer.stop();
    }

    /// Must be called once the attempt has its terminal code, whatever it is.
    pub fn after_attempt(&mut self, now: Instant) {
        if self.open {
            self.timer.reset(now);
        }
    }
}
