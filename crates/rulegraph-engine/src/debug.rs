//! Dry-run display slots.
//!
//! The host runs the emitted script elsewhere and drops the outcome here for
//! display. The engine never reads these.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DryRunSlots {
    pub log: Option<String>,
    pub error: Option<String>,
    pub last_run: Option<DateTime<Utc>>,
}

impl DryRunSlots {
    pub fn record_log(&mut self, log: impl Into<String>, at: DateTime<Utc>) {
        self.log = Some(log.into());
        self.last_run = Some(at);
    }

    pub fn record_error(&mut self, error: impl Into<String>, at: DateTime<Utc>) {
        self.error = Some(error.into());
        self.last_run = Some(at);
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_independent() {
        let mut slots = DryRunSlots::default();
        let at = Utc::now();
        slots.record_error("boom", at);
        assert_eq!(slots.error.as_deref(), Some("boom"));
        assert!(slots.log.is_none());
        assert_eq!(slots.last_run, Some(at));
        slots.clear();
        assert_eq!(slots, DryRunSlots::default());
    }
}
