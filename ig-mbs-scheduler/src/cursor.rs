//! Cron-driven cursors over future publishing slots.
//!
//! A [`ScheduleCursor`] is a cron rule plus an anchor instant. Peeking is a
//! pure read of the first occurrence strictly after the anchor; advancing moves
//! the anchor onto that occurrence. Because the whole mutable state is the
//! anchor, a [`CursorCheckpoint`] is a plain copy of it and restoring one puts
//! the cursor back exactly where it was.

use std::str::FromStr;

use chrono::{Duration, Local};
use cron::Schedule;
use interfaces::Timestamp;
use tracing::debug;

use crate::types::{Result, SchedulerError};

/// Snapshot of a cursor's position, taken with [`ScheduleCursor::checkpoint`].
///
/// Only meaningful for the cursor it was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorCheckpoint {
    anchor: Timestamp,
}

#[derive(Debug, Clone)]
pub struct ScheduleCursor {
    expression: String,
    schedule: Schedule,
    anchor: Timestamp,
}

impl ScheduleCursor {
    /// Parse `expression` and anchor the cursor at the current time.
    ///
    /// Accepts standard 5-field cron as well as the 6/7-field form with
    /// seconds (and year).
    pub fn new(expression: &str) -> Result<Self> {
        Self::with_anchor(expression, Local::now())
    }

    pub fn with_anchor(expression: &str, anchor: Timestamp) -> Result<Self> {
        let normalized = normalize_cron(expression);
        let schedule = Schedule::from_str(&normalized).map_err(|e| SchedulerError::InvalidCronSpec {
            expression: expression.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            expression: expression.trim().to_string(),
            schedule,
            anchor,
        })
    }

    /// Seed the anchor from the remote queue, measured from the current time.
    pub fn initialize(&mut self, remote: &[Timestamp], safety_margin_minutes: u32, jitter_bound_minutes: u32) -> Timestamp {
        self.initialize_at(remote, Local::now(), safety_margin_minutes, jitter_bound_minutes)
    }

    /// Seed the anchor from the remote queue.
    ///
    /// The anchor becomes the later of `now + safety_margin` and the latest
    /// remote time, pushed forward by the jitter bound so that a slot jittered
    /// backwards can never land before it.
    pub fn initialize_at(
        &mut self,
        remote: &[Timestamp],
        now: Timestamp,
        safety_margin_minutes: u32,
        jitter_bound_minutes: u32,
    ) -> Timestamp {
        let earliest = now + Duration::minutes(i64::from(safety_margin_minutes));
        let latest_remote = remote.iter().max().copied().unwrap_or(now);
        self.anchor = earliest.max(latest_remote) + Duration::minutes(i64::from(jitter_bound_minutes));

        debug!(
            "Cursor '{}' anchored at {} ({} remote entries)",
            self.expression,
            self.anchor,
            remote.len()
        );
        self.anchor
    }

    /// Next occurrence strictly after the anchor, without consuming it.
    pub fn peek_next(&self) -> Result<Timestamp> {
        self.schedule
            .after(&self.anchor)
            .next()
            .ok_or_else(|| SchedulerError::ScheduleExhausted {
                expression: self.expression.clone(),
                after: self.anchor.to_rfc3339(),
            })
    }

    /// Consume the next occurrence and move the anchor onto it.
    pub fn advance(&mut self) -> Result<Timestamp> {
        let next = self.peek_next()?;
        self.anchor = next;
        Ok(next)
    }

    pub fn checkpoint(&self) -> CursorCheckpoint {
        CursorCheckpoint { anchor: self.anchor }
    }

    pub fn restore(&mut self, checkpoint: CursorCheckpoint) {
        self.anchor = checkpoint.anchor;
    }

    pub fn anchor(&self) -> Timestamp {
        self.anchor
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }
}

/// Prepend a seconds field to standard 5-field cron; the `cron` crate wants 6 or 7.
pub fn normalize_cron(expression: &str) -> String {
    let trimmed = expression.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {}", trimmed)
    } else {
        trimmed.to_string()
    }
}
