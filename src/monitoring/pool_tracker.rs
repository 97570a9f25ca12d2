//! Detects changes of the pool actively serving traffic.

use super::access_log::is_known_pool;

/// A change of serving pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolTransition {
    pub from: String,
    pub to: String,
}

/// Remembers the last known pool and reports every change.
///
/// No debouncing happens here; rapid oscillation yields one transition per
/// alternation and the cooldown gate decides what gets sent.
#[derive(Debug, Clone, Default)]
pub struct PoolTracker {
    last_pool: Option<String>,
}

impl PoolTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the pool of one observation.
    ///
    /// Unknown pools are ignored entirely. The first known pool is adopted
    /// without reporting a transition.
    pub fn observe(&mut self, pool: &str) -> Option<PoolTransition> {
        if !is_known_pool(pool) {
            return None;
        }

        let transition = match self.last_pool.as_deref() {
            Some(last) if last != pool => Some(PoolTransition {
                from: last.to_string(),
                to: pool.to_string(),
            }),
            _ => None,
        };

        if self.last_pool.as_deref() != Some(pool) {
            self.last_pool = Some(pool.to_string());
        }

        transition
    }

    pub fn last_pool(&self) -> Option<&str> {
        self.last_pool.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_not_report_first_pool() {
        // Arrange
        let mut tracker = PoolTracker::new();

        // Act
        let transition = tracker.observe("blue");

        // Assert
        assert!(transition.is_none());
        assert_eq!(tracker.last_pool(), Some("blue"));
    }

    #[test]
    fn should_report_single_transition_for_blue_blue_green() {
        // Arrange
        let mut tracker = PoolTracker::new();

        // Act
        let signals: Vec<_> = ["blue", "blue", "green"]
            .iter()
            .map(|pool| tracker.observe(pool))
            .collect();

        // Assert
        assert_eq!(signals[0], None);
        assert_eq!(signals[1], None);
        assert_eq!(
            signals[2],
            Some(PoolTransition {
                from: "blue".to_string(),
                to: "green".to_string()
            })
        );
    }

    #[test]
    fn should_ignore_unknown_pool() {
        // Arrange
        let mut tracker = PoolTracker::new();
        tracker.observe("blue");

        // Act
        let as_target = tracker.observe("unknown");
        let after = tracker.observe("blue");

        // Assert
        assert!(as_target.is_none());
        assert!(after.is_none());
        assert_eq!(tracker.last_pool(), Some("blue"));
    }

    #[test]
    fn should_not_adopt_unknown_as_first_pool() {
        // Arrange
        let mut tracker = PoolTracker::new();

        // Act
        tracker.observe("unknown");
        let first_known = tracker.observe("green");

        // Assert
        assert!(first_known.is_none());
        assert_eq!(tracker.last_pool(), Some("green"));
    }

    #[test]
    fn should_report_every_alternation() {
        // Arrange
        let mut tracker = PoolTracker::new();
        tracker.observe("blue");

        // Act
        let count = ["green", "blue", "green", "blue"]
            .iter()
            .filter_map(|pool| tracker.observe(pool))
            .count();

        // Assert
        assert_eq!(count, 4);
    }
}
