//! Per-category alert cooldown

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

use super::alert::AlertCategory;

/// Admits at most one alert per category per interval.
///
/// Rejected attempts leave the clock untouched.
#[derive(Debug, Clone)]
pub struct CooldownGate {
    interval: Duration,
    last_admitted: HashMap<AlertCategory, DateTime<Utc>>,
}

impl CooldownGate {
    pub fn new(interval: std::time::Duration) -> Self {
        Self {
            interval: Duration::from_std(interval).unwrap_or(Duration::MAX),
            last_admitted: HashMap::new(),
        }
    }

    /// Returns true and records `now` when the category is open
    pub fn admit(&mut self, category: AlertCategory, now: DateTime<Utc>) -> bool {
        if !self.is_open(category, now) {
            return false;
        }
        self.last_admitted.insert(category, now);
        true
    }

    /// Whether `admit` would succeed, without recording anything
    pub fn is_open(&self, category: AlertCategory, now: DateTime<Utc>) -> bool {
        match self.last_admitted.get(&category) {
            Some(last) => now.signed_duration_since(*last) >= self.interval,
            None => true,
        }
    }

    pub fn last_admitted(&self, category: AlertCategory) -> Option<DateTime<Utc>> {
        self.last_admitted.get(&category).copied()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}
