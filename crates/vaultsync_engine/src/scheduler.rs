//! Countdown timer for automatic synchronization.
//!
//! The timer does not own a thread. The host calls [`AutoSyncTimer::tick`]
//! about once a second and acts on the returned [`TimerTick`].

use std::time::{Duration, Instant};

/// Intervals offered to the user, in minutes.
pub const INTERVAL_PRESETS: [u32; 8] = [0, 30, 60, 120, 240, 360, 720, 1440];

/// Short label for an interval: `Off`, `30m`, `1h`, `12h`.
pub fn interval_label(minutes: u32) -> String {
    match minutes {
        0 => "Off".to_string(),
        m if m % 60 == 0 => format!("{}h", m / 60),
        m if m > 60 => format!("{}h{:02}", m / 60, m % 60),
        m => format!("{m}m"),
    }
}

/// What the host should do after a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerTick {
    /// The timer is not running.
    Idle,
    /// Still counting down. `status` is set when the shown text changes.
    Countdown {
        /// Time left until the next attempt.
        remaining: Duration,
        /// New countdown text, if any.
        status: Option<String>,
    },
    /// The interval elapsed. The timer stops until restarted.
    Due,
}

/// Countdown to the next unattended attempt.
#[derive(Debug, Clone)]
pub struct AutoSyncTimer {
    interval: Duration,
    deadline: Option<Instant>,
    shown: Option<(u64, u64)>,
}

impl AutoSyncTimer {
    /// Creates a stopped timer.
    pub fn new(interval_minutes: u32) -> Self {
        Self {
            interval: minutes(interval_minutes),
            deadline: None,
            shown: None,
        }
    }

    /// Configured interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Configured interval in whole minutes.
    pub fn interval_minutes(&self) -> u32 {
        (self.interval.as_secs() / 60) as u32
    }

    /// Returns true if the interval is non-zero.
    pub fn is_enabled(&self) -> bool {
        !self.interval.is_zero()
    }

    /// Returns true while counting down.
    pub fn is_running(&self) -> bool {
        self.deadline.is_some()
    }

    /// Starts counting down from `now`. Does nothing when disabled.
    pub fn start(&mut self, now: Instant) {
        self.shown = None;
        self.deadline = self.is_enabled().then(|| now + self.interval);
    }

    /// Stops the countdown.
    pub fn stop(&mut self) {
        self.deadline = None;
        self.shown = None;
    }

    /// Restarts the countdown from `now`.
    pub fn reset(&mut self, now: Instant) {
        self.stop();
        self.start(now);
    }

    /// Changes the interval and restarts; 0 stops the timer.
    pub fn set_interval(&mut self, interval_minutes: u32, now: Instant) {
        self.interval = minutes(interval_minutes);
        self.reset(now);
    }

    /// Advances the timer to `now`.
    ///
    /// Above a minute the text only changes when the displayed hours or
    /// minutes change; in the last minute it is refreshed on every tick.
    pub fn tick(&mut self, now: Instant) -> TimerTick {
        let Some(deadline) = self.deadline else {
            return TimerTick::Idle;
        };

        let remaining = deadline.saturating_duration_since(now);
        if remaining.is_zero() {
            self.stop();
            return TimerTick::Due;
        }

        let secs = remaining.as_secs();
        let (hours, mins) = (secs / 3600, (secs % 3600) / 60);
        let status = if hours > 0 || mins > 0 {
            if self.shown == Some((hours, mins)) {
                None
            } else {
                self.shown = Some((hours, mins));
                Some(format!("{hours}h{mins:02}"))
            }
        } else {
            self.shown = None;
            Some(format!("{secs}s"))
        };

        TimerTick::Countdown { remaining, status }
    }
}

fn minutes(m: u32) -> Duration {
    Duration::from_secs(u64::from(m) * 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels() {
        let labels: Vec<String> = INTERVAL_PRESETS.iter().map(|m| interval_label(*m)).collect();
        assert_eq!(labels, ["Off", "30m", "1h", "2h", "4h", "6h", "12h", "24h"]);
        assert_eq!(interval_label(90), "1h30");
    }

    #[test]
    fn disabled_timer_stays_idle() {
        let now = Instant::now();
        let mut timer = AutoSyncTimer::new(0);
        timer.start(now);
        assert!(!timer.is_running());
        assert_eq!(timer.tick(now + Duration::from_secs(3600)), TimerTick::Idle);
    }

    #[test]
    fn countdown_text_changes_only_with_minutes() {
        let now = Instant::now();
        let mut timer = AutoSyncTimer::new(120);
        timer.start(now);

        match timer.tick(now + Duration::from_secs(1)) {
            TimerTick::Countdown { status, .. } => assert_eq!(status.as_deref(), Some("1h59")),
            other => panic!("unexpected {other:?}"),
        }
        match timer.tick(now + Duration::from_secs(2)) {
            TimerTick::Countdown { status, .. } => assert_eq!(status, None),
            other => panic!("unexpected {other:?}"),
        }
        match timer.tick(now + Duration::from_secs(61)) {
            TimerTick::Countdown { status, .. } => assert_eq!(status.as_deref(), Some("1h58")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn last_minute_shows_seconds_every_tick() {
        let now = Instant::now();
        let mut timer = AutoSyncTimer::new(1);
        timer.start(now);

        for elapsed in [15, 16] {
            match timer.tick(now + Duration::from_secs(elapsed)) {
                TimerTick::Countdown { status, .. } => {
                    assert_eq!(status, Some(format!("{}s", 60 - elapsed)))
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn fires_once_then_stops() {
        let now = Instant::now();
        let mut timer = AutoSyncTimer::new(30);
        timer.start(now);

        assert_eq!(timer.tick(now + Duration::from_secs(30 * 60)), TimerTick::Due);
        assert!(!timer.is_running());
        assert_eq!(timer.tick(now + Duration::from_secs(31 * 60)), TimerTick::Idle);

        timer.reset(now + Duration::from_secs(31 * 60));
        assert!(timer.is_running());
    }

    #[test]
    fn set_interval_zero_stops() {
        let now = Instant::now();
        let mut timer = AutoSyncTimer::new(60);
        timer.start(now);
        timer.set_interval(0, now);
        assert!(!timer.is_running());
        assert!(!timer.is_enabled());
    }
}
