//! Time structures.
//!
//! The protocol core never reads a clock of its own. The caller samples
//! whatever time source the surrounding system has (kernel time, a TSC, a
//! test counter) and passes an [`Instant`] into every entry point. Durations
//! between such instants back the interval statistics of the live state
//! record.
//!
//! [`Instant`]: struct.Instant.html
// Copyright (C) 2016 whitequark@whitequark.org
use core::{fmt, ops};

/// A representation of an absolute time value.
///
/// The `Instant` type is a wrapper around a `i64` value that represents a
/// number of milliseconds, monotonically increasing since an arbitrary
/// moment in time, such as system startup.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct Instant {
    millis: i64,
}

impl Instant {
    /// Create a new `Instant` from a number of milliseconds.
    pub const fn from_millis(millis: i64) -> Instant {
        Instant { millis }
    }

    /// Create a new `Instant` from a number of seconds.
    pub const fn from_secs(secs: i64) -> Instant {
        Instant { millis: secs * 1000 }
    }

    /// The fractional number of milliseconds that have passed since the
    /// beginning of time.
    pub const fn millis(&self) -> i64 {
        self.millis % 1000
    }

    /// The number of whole seconds that have passed since the beginning of
    /// time.
    pub const fn secs(&self) -> i64 {
        self.millis / 1000
    }

    /// The total number of milliseconds that have passed since the beginning
    /// of time.
    pub const fn total_millis(&self) -> i64 {
        self.millis
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{:03}s", self.secs(), self.millis())
    }
}

impl ops::Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, rhs: Duration) -> Instant {
        Instant::from_millis(self.millis + rhs.total_millis() as i64)
    }
}

impl ops::AddAssign<Duration> for Instant {
    fn add_assign(&mut self, rhs: Duration) {
        self.millis += rhs.total_millis() as i64;
    }
}

impl ops::Sub<Duration> for Instant {
    type Output = Instant;

    fn sub(self, rhs: Duration) -> Instant {
        Instant::from_millis(self.millis - rhs.total_millis() as i64)
    }
}

impl ops::Sub<Instant> for Instant {
    type Output = Duration;

    fn sub(self, rhs: Instant) -> Duration {
        Duration::from_millis((self.millis - rhs.millis).max(0) as u64)
    }
}

/// A relative amount of time.
///
/// The `Duration` type is a wrapper around a `u64` value that represents a
/// number of milliseconds.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct Duration {
    millis: u64,
}

impl Duration {
    /// The zero-length duration.
    pub const ZERO: Duration = Duration::from_millis(0);

    /// Create a new `Duration` from a number of milliseconds.
    pub const fn from_millis(millis: u64) -> Duration {
        Duration { millis }
    }

    /// Create a new `Duration` from a number of seconds.
    pub const fn from_secs(secs: u64) -> Duration {
        Duration { millis: secs * 1000 }
    }

    /// The fractional number of milliseconds in this `Duration`.
    pub const fn millis(&self) -> u64 {
        self.millis % 1000
    }

    /// The number of whole seconds in this `Duration`.
    pub const fn secs(&self) -> u64 {
        self.millis / 1000
    }

    /// The total number of milliseconds in this `Duration`.
    pub const fn total_millis(&self) -> u64 {
        self.millis
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{:03}s", self.secs(), self.millis())
    }
}

impl ops::Add<Duration> for Duration {
    type Output = Duration;

    fn add(self, rhs: Duration) -> Duration {
        Duration::from_millis(self.millis + rhs.total_millis())
    }
}

impl ops::Sub<Duration> for Duration {
    type Output = Duration;

    fn sub(self, rhs: Duration) -> Duration {
        Duration::from_millis(
            self.millis.checked_sub(rhs.total_millis())
                .expect("overflow when subtracting durations"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instant_arithmetic() {
        let a = Instant::from_millis(1_500);
        let b = Instant::from_secs(1);
        assert_eq!(a - b, Duration::from_millis(500));
        assert_eq!(b - a, Duration::ZERO);
        assert_eq!(a + Duration::from_millis(250), Instant::from_millis(1_750));
        assert_eq!(a.secs(), 1);
        assert_eq!(a.millis(), 500);
    }

    #[test]
    fn duration_arithmetic() {
        let d = Duration::from_secs(2) + Duration::from_millis(20);
        assert_eq!(d.total_millis(), 2_020);
        assert_eq!(d - Duration::from_millis(20), Duration::from_secs(2));
    }
}
