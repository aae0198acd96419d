//! Per-target failure counters and cooldown windows.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use dockbay_core::FailureKind;

/// Upper bound for configured cooldowns (100 years).
const MAX_COOLDOWN_SECONDS: u64 = 100 * 365 * 24 * 3600;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(start) }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock() = at;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct TargetHealth {
    failures: u32,
    cooldown_until: Option<DateTime<Utc>>,
    last_failure: Option<FailureKind>,
}

/// Diagnostic view of one target's health.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub id: String,
    pub failures: u32,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub cooling_down: bool,
    pub last_failure: Option<FailureKind>,
}

/// Outcome of recording a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FailureRecord {
    pub failures: u32,
    pub cooldown_until: Option<DateTime<Utc>>,
}

pub(crate) struct HealthTable {
    entries: Mutex<Vec<TargetHealth>>,
    max_failures: u32,
    cooldown: Duration,
}

impl HealthTable {
    pub(crate) fn new(targets: usize, max_failures: u32, cooldown_seconds: u64) -> Self {
        let seconds = i64::try_from(cooldown_seconds.min(MAX_COOLDOWN_SECONDS)).unwrap_or(0);
        Self {
            entries: Mutex::new(vec![TargetHealth::default(); targets]),
            max_failures: max_failures.max(1),
            cooldown: Duration::seconds(seconds),
        }
    }

    pub(crate) fn is_cooling(&self, index: usize, now: DateTime<Utc>) -> bool {
        self.entries
            .lock()
            .get(index)
            .and_then(|h| h.cooldown_until)
            .is_some_and(|until| now < until)
    }

    pub(crate) fn record_success(&self, index: usize) {
        if let Some(h) = self.entries.lock().get_mut(index) {
            *h = TargetHealth::default();
        }
    }

    /// Opens (or re-opens) the cooldown once the failure count reaches the limit.
    pub(crate) fn record_failure(&self, index: usize, kind: FailureKind, now: DateTime<Utc>) -> FailureRecord {
        let mut entries = self.entries.lock();
        let Some(h) = entries.get_mut(index) else {
            return FailureRecord { failures: 0, cooldown_until: None };
        };
        h.failures = h.failures.saturating_add(1);
        h.last_failure = Some(kind);
        let opened = if h.failures >= self.max_failures {
            let until = now.checked_add_signed(self.cooldown).unwrap_or(DateTime::<Utc>::MAX_UTC);
            h.cooldown_until = Some(until);
            Some(until)
        } else {
            None
        };
        FailureRecord { failures: h.failures, cooldown_until: opened }
    }

    pub(crate) fn snapshot(&self, ids: &[String], now: DateTime<Utc>) -> Vec<HealthSnapshot> {
        let entries = self.entries.lock();
        ids.iter()
            .zip(entries.iter())
            .map(|(id, h)| HealthSnapshot {
                id: id.clone(),
                failures: h.failures,
                cooldown_until: h.cooldown_until,
                cooling_down: h.cooldown_until.is_some_and(|until| now < until),
                last_failure: h.last_failure,
            })
            .collect()
    }
}
