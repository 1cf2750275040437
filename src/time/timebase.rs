//! Process Timebase
//!
//! Microsecond timestamps measured from a process-wide monotonic epoch.
//! The epoch is fixed the first time it is touched.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Process epoch, initialized once
static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Monotonic process timebase
#[derive(Debug, Clone, Copy)]
pub struct Timebase;

impl Timebase {
    /// Fix the epoch. Calling it early makes the first timestamps small.
    pub fn init() {
        EPOCH.get_or_init(Instant::now);
    }

    /// Instant the epoch was fixed at.
    #[inline]
    pub fn epoch() -> Instant {
        *EPOCH.get_or_init(Instant::now)
    }

    /// Microseconds elapsed since the epoch.
    #[inline]
    pub fn now_micros() -> u64 {
        Self::epoch().elapsed().as_micros() as u64
    }

    /// Check if two values maintain monotonicity.
    #[inline]
    pub fn is_monotonic(t1: u64, t2: u64) -> bool {
        t2 >= t1
    }
}

/// A point in time, in microseconds since the process epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Capture the current timestamp.
    #[inline]
    pub fn now() -> Self {
        Self(Timebase::now_micros())
    }

    #[inline]
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    /// Build a timestamp from milliseconds. Handy for scripted event sequences.
    #[inline]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis.saturating_mul(1_000))
    }

    #[inline]
    pub const fn as_micros(&self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn as_millis(&self) -> u64 {
        self.0 / 1_000
    }

    /// Duration since an earlier timestamp, zero if `earlier` is later.
    #[inline]
    pub fn duration_since(&self, earlier: Timestamp) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }

    /// Timestamp shifted forward by `duration`, saturating.
    #[inline]
    pub fn saturating_add(&self, duration: Duration) -> Timestamp {
        Timestamp(self.0.saturating_add(duration.as_micros() as u64))
    }

    #[inline]
    pub fn is_after(&self, other: Timestamp) -> bool {
        self.0 > other.0
    }
}

impl serde::Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u64(self.0)
    }
}

impl<'de> serde::Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let micros = u64::deserialize(deserializer)?;
        Ok(Timestamp(micros))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_ordering() {
        Timebase::init();
        let t1 = Timestamp::now();
        std::thread::sleep(Duration::from_micros(200));
        let t2 = Timestamp::now();

        assert!(t2.is_after(t1));
        assert!(t2.duration_since(t1) >= Duration::from_micros(200));
    }

    #[test]
    fn test_millis_conversion() {
        let ts = Timestamp::from_millis(1_500);
        assert_eq!(ts.as_micros(), 1_500_000);
        assert_eq!(ts.as_millis(), 1_500);
    }

    #[test]
    fn test_duration_since_saturating() {
        let t1 = Timestamp::from_millis(10);
        let t2 = Timestamp::from_millis(5);
        assert_eq!(t2.duration_since(t1), Duration::ZERO);
    }

    #[test]
    fn test_saturating_add() {
        let ts = Timestamp::from_millis(100);
        assert_eq!(ts.saturating_add(Duration::from_millis(400)), Timestamp::from_millis(500));

        let max = Timestamp::from_micros(u64::MAX);
        assert_eq!(max.saturating_add(Duration::from_secs(1)), max);
    }

    #[test]
    fn test_is_monotonic_edge_cases() {
        assert!(Timebase::is_monotonic(100, 100));
        assert!(Timebase::is_monotonic(100, 200));
        assert!(!Timebase::is_monotonic(200, 100));
    }

    #[test]
    fn test_timestamp_serialization() {
        let ts = Timestamp::from_micros(123_456_789);
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "123456789");

        let back: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ts);
    }
}
