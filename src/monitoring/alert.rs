//! Alert events and their presentation

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::access_log::Observation;
use super::pool_tracker::PoolTransition;

/// Alert category; cooldowns are tracked per category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    Failover,
    ErrorRate,
    Recovery,
}

impl AlertCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertCategory::Failover => "failover",
            AlertCategory::ErrorRate => "error_rate",
            AlertCategory::Recovery => "recovery",
        }
    }

    /// Attachment color
    pub fn color(&self) -> &'static str {
        match self {
            AlertCategory::Failover => colors::FAILOVER,
            AlertCategory::ErrorRate => colors::ERROR,
            AlertCategory::Recovery => colors::RECOVERY,
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            AlertCategory::Failover => "🔄",
            AlertCategory::ErrorRate => "🚨",
            AlertCategory::Recovery => "✅",
        }
    }
}

impl fmt::Display for AlertCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attachment colors (hex)
pub mod colors {
    /// Failover - orange
    pub const FAILOVER: &str = "#FF9800";
    /// High error rate - red
    pub const ERROR: &str = "#F44336";
    /// Recovery - green
    pub const RECOVERY: &str = "#4CAF50";
}

/// An alert ready for dispatch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEvent {
    pub id: Uuid,
    pub category: AlertCategory,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl AlertEvent {
    pub fn new(category: AlertCategory, message: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            category,
            message: message.into(),
            created_at: now,
        }
    }

    pub fn failover(
        transition: &PoolTransition,
        observation: &Observation,
        now: DateTime<Utc>,
    ) -> Self {
        let message = format!(
            "*Failover Detected!*\n\
             • From: `{}`\n\
             • To: `{}`\n\
             • Release: `{}`\n\
             • Upstream: `{}`\n\
             • Time: {}",
            transition.from,
            transition.to,
            observation.release,
            observation.upstream_address,
            now.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
        );
        Self::new(AlertCategory::Failover, message, now)
    }

    pub fn error_rate(
        rate: f64,
        threshold: f64,
        window_size: usize,
        pool: &str,
        now: DateTime<Utc>,
    ) -> Self {
        let message = format!(
            "*High Error Rate Detected!*\n\
             • Error Rate: `{:.2}%` (threshold: {}%)\n\
             • Window Size: {} requests\n\
             • Current Pool: `{}`\n\
             • Action Required: Check upstream health",
            rate, threshold, window_size, pool,
        );
        Self::new(AlertCategory::ErrorRate, message, now)
    }

    pub fn recovery(rate: f64, threshold: f64, pool: &str, now: DateTime<Utc>) -> Self {
        let message = format!(
            "*Error Rate Recovered*\n\
             • Error Rate: `{:.2}%` (threshold: {}%)\n\
             • Current Pool: `{}`",
            rate, threshold, pool,
        );
        Self::new(AlertCategory::Recovery, message, now)
    }

    /// Title shown above the alert body
    pub fn title(&self) -> String {
        format!("{} Blue/Green Deployment Alert", self.category.icon())
    }
}
