//! Debounce, max-delay and rate-limit bookkeeping.
//!
//! Pure state: every method takes the current instant, so the rules can be
//! tested with synthetic clocks.

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::mutation::{is_relevant, MutationRecord};
use crate::config::SchedulerConfig;

/// Which timer fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
    Debounce,
    MaxDelay,
}

/// Outcome of asking to start a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Begin,
    /// A pass is already running.
    Busy,
    /// The previous pass started less than the minimum interval ago.
    TooSoon,
}

/// Snapshot of scheduler state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerStatus {
    pub observing: bool,
    pub extracting: bool,
    pub debounce_remaining_ms: Option<u64>,
    pub max_delay_remaining_ms: Option<u64>,
    pub since_last_start_ms: Option<u64>,
    pub passes_started: u64,
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    config: SchedulerConfig,
    observing: bool,
    extracting: bool,
    last_started: Option<Instant>,
    debounce_deadline: Option<Instant>,
    max_deadline: Option<Instant>,
    passes_started: u64,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            observing: config.observe_mutations,
            config,
            extracting: false,
            last_started: None,
            debounce_deadline: None,
            max_deadline: None,
            passes_started: 0,
        }
    }

    pub fn is_observing(&self) -> bool {
        self.observing
    }

    pub fn is_extracting(&self) -> bool {
        self.extracting
    }

    pub fn debounce_deadline(&self) -> Option<Instant> {
        self.debounce_deadline
    }

    pub fn max_deadline(&self) -> Option<Instant> {
        self.max_deadline
    }

    pub fn start_observing(&mut self) {
        self.observing = true;
    }

    /// Stop reacting to mutations and drop pending deadlines.
    pub fn stop_observing(&mut self) {
        self.observing = false;
        self.clear_deadlines();
    }

    pub fn set_visible(&mut self, visible: bool) {
        if visible {
            self.start_observing();
        } else {
            self.stop_observing();
        }
    }

    /// Feed a mutation batch. Returns true when it (re)armed the timers.
    pub fn on_mutations(&mut self, records: &[MutationRecord], now: Instant) -> bool {
        if !self.observing || !is_relevant(records, self.config.bulk_mutation_limit) {
            return false;
        }
        self.debounce_deadline = Some(now + self.config.debounce());
        if self.max_deadline.is_none() {
            self.max_deadline = Some(now + self.config.max_delay());
        }
        true
    }

    /// Consume a fired deadline and try to start a pass.
    pub fn on_deadline(&mut self, deadline: Deadline, now: Instant) -> Attempt {
        match deadline {
            Deadline::Debounce => self.debounce_deadline = None,
            Deadline::MaxDelay => self.max_deadline = None,
        }
        self.try_begin(now)
    }

    /// Explicit extraction request: pending deadlines are dropped, guards apply.
    pub fn force(&mut self, now: Instant) -> Attempt {
        self.clear_deadlines();
        self.try_begin(now)
    }

    /// Mark the running pass as finished.
    pub fn finish(&mut self) {
        self.extracting = false;
    }

    fn try_begin(&mut self, now: Instant) -> Attempt {
        if self.extracting {
            return Attempt::Busy;
        }
        if let Some(last) = self.last_started {
            if now.saturating_duration_since(last) < self.config.min_interval() {
                return Attempt::TooSoon;
            }
        }
        self.extracting = true;
        self.last_started = Some(now);
        self.passes_started += 1;
        self.clear_deadlines();
        Attempt::Begin
    }

    fn clear_deadlines(&mut self) {
        self.debounce_deadline = None;
        self.max_deadline = None;
    }

    pub fn status(&self, now: Instant) -> SchedulerStatus {
        let remaining =
            |d: Option<Instant>| d.map(|d| d.saturating_duration_since(now).as_millis() as u64);
        SchedulerStatus {
            observing: self.observing,
            extracting: self.extracting,
            debounce_remaining_ms: remaining(self.debounce_deadline),
            max_delay_remaining_ms: remaining(self.max_deadline),
            since_last_start_ms: self
                .last_started
                .map(|t| now.saturating_duration_since(t).as_millis() as u64),
            passes_started: self.passes_started,
        }
    }
}
