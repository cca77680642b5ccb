//! Chess clocks and time controls.
//!
//! Clocks never read the wall clock themselves. Every operation takes the
//! current `Instant`, which callers get from a `TimeSource`.

use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::ChessError;
use crate::piece::Color;
use crate::utils::split_on;

/// Starting time and per-move increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeControlSettings {
    pub initial: Duration,
    pub increment: Duration,
}

impl TimeControlSettings {
    pub fn new(initial: Duration, increment: Duration) -> Self {
        TimeControlSettings { initial, increment }
    }

    pub fn from_minutes(minutes: u64, increment_secs: u64) -> Self {
        TimeControlSettings {
            initial: Duration::from_secs(minutes * 60),
            increment: Duration::from_secs(increment_secs),
        }
    }
}

fn parse_count(part: &str) -> Option<u64> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

impl FromStr for TimeControlSettings {
    type Err = ChessError;

    /// Parses `<minutes>[:<incrementSeconds>]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ChessError::InvalidTimeControlFormat(s.to_string());
        let (minutes, increment) = split_on(s.trim(), ':');
        let minutes = parse_count(minutes).ok_or_else(invalid)?;
        let increment = match increment {
            None => 0,
            Some(increment) => parse_count(increment).ok_or_else(invalid)?,
        };
        let initial = minutes
            .checked_mul(60)
            .map(Duration::from_secs)
            .ok_or_else(invalid)?;
        Ok(TimeControlSettings::new(initial, Duration::from_secs(increment)))
    }
}

impl fmt::Display for TimeControlSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_duration(self.initial))?;
        if !self.increment.is_zero() {
            write!(f, " +{}s", self.increment.as_secs())?;
        }
        Ok(())
    }
}

/// Source of the current instant.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to, for simulations and tests.
#[derive(Debug)]
pub struct ManualTimeSource {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualTimeSource {
    pub fn new() -> Self {
        ManualTimeSource {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        *offset += by;
    }
}

impl Default for ManualTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> Instant {
        let offset = *self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        self.base + offset
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerClock {
    remaining: Duration,
    running_since: Option<Instant>,
}

impl PlayerClock {
    fn new(initial: Duration) -> Self {
        PlayerClock {
            remaining: initial,
            running_since: None,
        }
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        match self.running_since {
            Some(since) => self.remaining.saturating_sub(now.saturating_duration_since(since)),
            None => self.remaining,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running_since.is_some()
    }

    fn pause(&mut self, now: Instant) {
        self.remaining = self.remaining(now);
        self.running_since = None;
    }

    fn resume(&mut self, now: Instant) {
        if self.running_since.is_none() {
            self.running_since = Some(now);
        }
    }
}

/// A pair of player clocks. At most one runs at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChessClock {
    settings: TimeControlSettings,
    clocks: [PlayerClock; 2],
    expiry_reported: bool,
    stopped: bool,
}

impl ChessClock {
    pub fn new(settings: TimeControlSettings) -> Self {
        ChessClock {
            settings,
            clocks: [PlayerClock::new(settings.initial); 2],
            expiry_reported: false,
            stopped: false,
        }
    }

    pub fn settings(&self) -> TimeControlSettings {
        self.settings
    }

    pub fn start(&mut self, side_to_move: Color, now: Instant) {
        if !self.stopped {
            self.clocks[side_to_move.index()].resume(now);
        }
    }

    /// Charges the mover for the time spent, adds the increment and hands
    /// the move over to the opponent.
    pub fn complete_move(&mut self, mover: Color, now: Instant) {
        if self.stopped {
            return;
        }
        let clock = &mut self.clocks[mover.index()];
        clock.pause(now);
        clock.remaining += self.settings.increment;
        self.clocks[mover.opposite().index()].resume(now);
    }

    pub fn remaining(&self, color: Color, now: Instant) -> Duration {
        self.clocks[color.index()].remaining(now)
    }

    pub fn active(&self) -> Option<Color> {
        Color::ALL.into_iter().find(|c| self.clocks[c.index()].is_running())
    }

    /// Whether `color`'s flag has fallen, without consuming the report.
    pub fn is_flagged(&self, color: Color, now: Instant) -> bool {
        self.clocks[color.index()].is_running() && self.remaining(color, now).is_zero()
    }

    /// Reports the side whose flag has fallen. Only the first call after
    /// flag-fall reports it.
    pub fn check_expired(&mut self, now: Instant) -> Option<Color> {
        if self.expiry_reported {
            return None;
        }
        let flagged = self.active().filter(|color| self.is_flagged(*color, now))?;
        self.expiry_reported = true;
        Some(flagged)
    }

    /// Freezes both clocks for good.
    pub fn stop(&mut self, now: Instant) {
        for clock in self.clocks.iter_mut() {
            clock.pause(now);
        }
        self.stopped = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Overwrites the remaining times, e.g. when reloading a saved game.
    /// Both clocks end up paused.
    pub fn restore(&mut self, white: Duration, black: Duration) {
        self.clocks[Color::White.index()] = PlayerClock::new(white);
        self.clocks[Color::Black.index()] = PlayerClock::new(black);
    }
}

/// Formats as `m:ss`, or `h:mm:ss` from one hour up.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total / 60) % 60, total % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn parses_time_controls() {
        let tc: TimeControlSettings = "5".parse().unwrap();
        assert_eq!(tc, TimeControlSettings::new(secs(300), Duration::ZERO));
        let tc: TimeControlSettings = "3:2".parse().unwrap();
        assert_eq!(tc, TimeControlSettings::from_minutes(3, 2));
        assert_eq!(tc.to_string(), "3:00 +2s");
    }

    #[test]
    fn rejects_malformed_time_controls() {
        for bad in ["", "x", "5:", ":2", "-1", "+5", "5:x", "1:2:3", "5.5"] {
            let err = bad.parse::<TimeControlSettings>().unwrap_err();
            assert_eq!(err, ChessError::InvalidTimeControlFormat(bad.to_string()), "{}", bad);
        }
    }

    #[test]
    fn increment_applied_after_move() {
        let time = ManualTimeSource::new();
        let mut clock = ChessClock::new(TimeControlSettings::new(secs(300), secs(2)));
        clock.start(Color::White, time.now());

        time.advance(secs(10));
        clock.complete_move(Color::White, time.now());

        assert_eq!(clock.remaining(Color::White, time.now()), secs(292));
        assert_eq!(clock.remaining(Color::Black, time.now()), secs(300));
        assert_eq!(clock.active(), Some(Color::Black));

        time.advance(secs(5));
        assert_eq!(clock.remaining(Color::Black, time.now()), secs(295));
        assert_eq!(clock.remaining(Color::White, time.now()), secs(292));
    }

    #[test]
    fn expiry_reported_once() {
        let time = ManualTimeSource::new();
        let mut clock = ChessClock::new(TimeControlSettings::new(secs(1), Duration::ZERO));
        clock.start(Color::White, time.now());
        assert_eq!(clock.check_expired(time.now()), None);

        time.advance(secs(2));
        assert!(clock.is_flagged(Color::White, time.now()));
        assert_eq!(clock.check_expired(time.now()), Some(Color::White));
        assert_eq!(clock.check_expired(time.now()), None);
        assert_eq!(clock.remaining(Color::White, time.now()), Duration::ZERO);
    }

    #[test]
    fn stop_freezes_both_sides() {
        let time = ManualTimeSource::new();
        let mut clock = ChessClock::new(TimeControlSettings::from_minutes(1, 0));
        clock.start(Color::White, time.now());
        time.advance(secs(20));
        clock.stop(time.now());
        time.advance(secs(20));
        assert_eq!(clock.remaining(Color::White, time.now()), secs(40));
        assert_eq!(clock.active(), None);
        clock.complete_move(Color::White, time.now());
        assert_eq!(clock.active(), None);
    }

    #[test]
    fn formats_durations() {
        assert_eq!(format_duration(secs(0)), "0:00");
        assert_eq!(format_duration(secs(65)), "1:05");
        assert_eq!(format_duration(secs(3725)), "1:02:05");
        assert_eq!(format_duration(Duration::from_millis(59_999)), "0:59");
    }
}
