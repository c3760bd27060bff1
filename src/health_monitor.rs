/// Tick-counted health of the landmark source.
///
/// A tracker that loses the player stops delivering samples without any
/// error. Analyzers treat a missing tick as a no-op, so this is the only
/// place repeated absence becomes visible.
#[derive(Clone, Debug)]
pub struct SourceHealth {
    pub name: String,
    warn_after_ticks: u32,
    missing_streak: u32,
    total_missing: u64,
    total_received: u64,
    warned: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HealthReport {
    pub healthy: bool,
    pub missing_streak: u32,
    pub total_missing: u64,
    pub total_received: u64,
}

impl SourceHealth {
    pub fn new(name: &str, warn_after_ticks: u32) -> Self {
        SourceHealth {
            name: name.to_string(),
            warn_after_ticks: warn_after_ticks.max(1),
            missing_streak: 0,
            total_missing: 0,
            total_received: 0,
            warned: false,
        }
    }

    /// Record whether this tick carried a usable sample. Returns current health.
    pub fn record(&mut self, received: bool) -> bool {
        if received {
            self.total_received += 1;
            if self.warned {
                log::info!("{} resumed after {} missing ticks", self.name, self.missing_streak);
            }
            self.missing_streak = 0;
            self.warned = false;
        } else {
            self.total_missing += 1;
            self.missing_streak = self.missing_streak.saturating_add(1);
            if !self.warned && self.missing_streak >= self.warn_after_ticks {
                log::warn!("{} silent for {} ticks", self.name, self.missing_streak);
                self.warned = true;
            }
        }
        self.is_healthy()
    }

    pub fn is_healthy(&self) -> bool {
        self.missing_streak < self.warn_after_ticks
    }

    pub fn check_health(&self) -> HealthReport {
        HealthReport {
            healthy: self.is_healthy(),
            missing_streak: self.missing_streak,
            total_missing: self.total_missing,
            total_received: self.total_received,
        }
    }

    /// One-line status for periodic console output.
    pub fn format_status(&self) -> String {
        let report = self.check_health();
        if report.healthy {
            format!("{}: ✓ ({} samples)", self.name, report.total_received)
        } else {
            format!("{}: ⚠ (silent {} ticks)", self.name, report.missing_streak)
        }
    }

    pub fn reset(&mut self) {
        self.missing_streak = 0;
        self.total_missing = 0;
        self.total_received = 0;
        self.warned = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_transitions() {
        let mut health = SourceHealth::new("Landmarks", 3);
        assert!(health.record(true));
        assert!(health.record(false));
        assert!(health.record(false));
        assert!(!health.record(false));
        assert!(!health.record(false));
        assert!(health.format_status().contains("silent 4 ticks"));

        assert!(health.record(true));
        let report = health.check_health();
        assert_eq!(report.missing_streak, 0);
        assert_eq!(report.total_missing, 4);
        assert_eq!(report.total_received, 2);
    }

    #[test]
    fn test_zero_threshold_treated_as_one() {
        let mut health = SourceHealth::new("Landmarks", 0);
        assert!(health.record(true));
        assert!(!health.record(false));
    }
}
