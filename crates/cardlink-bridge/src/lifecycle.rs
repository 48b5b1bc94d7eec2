//! Reader and license lifecycle.
//!
//! Tracks what the bridge believes about the reader, for logging and
//! diagnostics. The lifecycle never gates dispatch: a read issued while the
//! reader is inactive is still forwarded to the driver, which is the authority
//! and reports its own failure.
//!
//! # Reader transitions
//!
//! - Uninitialized/Inactive → ReaderActive on a successful activation
//!   (idempotent when already active or pending)
//! - ReaderActive → ReadPending / WritePending when a read or write is issued
//! - ReadPending / WritePending → ReaderActive on the completion event
//! - any → Inactive on deactivation
//!
//! License state is orthogonal and only follows license results.

use cardlink_core::{LicenseStatus, ResultCode};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::debug;

/// Maximum number of reader transitions kept in history.
const MAX_HISTORY_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ReaderState {
    /// Nothing has been attempted yet.
    Uninitialized,
    Inactive,
    ReaderActive,
    ReadPending,
    WritePending,
}

impl ReaderState {
    /// Whether the reader has been activated, with or without work pending.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::ReaderActive | Self::ReadPending | Self::WritePending
        )
    }
}

impl fmt::Display for ReaderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "Uninitialized",
            Self::Inactive => "Inactive",
            Self::ReaderActive => "ReaderActive",
            Self::ReadPending => "ReadPending",
            Self::WritePending => "WritePending",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LicenseState {
    Unknown,
    Valid,
    Invalid,
}

/// One recorded reader transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    pub from: ReaderState,
    pub to: ReaderState,
    pub at: Instant,
}

impl StateTransition {
    pub fn new(from: ReaderState, to: ReaderState) -> Self {
        Self {
            from,
            to,
            at: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.at.elapsed()
    }
}

/// Reader and license state with a bounded transition history.
///
/// # Examples
///
/// ```
/// use cardlink_bridge::{ReaderLifecycle, ReaderState};
/// use cardlink_core::ResultCode;
///
/// let mut lifecycle = ReaderLifecycle::new();
/// lifecycle.activation_reported(ResultCode::Success);
/// assert!(lifecycle.read_issued());
/// assert_eq!(lifecycle.reader_state(), ReaderState::ReadPending);
///
/// lifecycle.read_completed();
/// assert_eq!(lifecycle.reader_state(), ReaderState::ReaderActive);
/// assert_eq!(lifecycle.history().len(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct ReaderLifecycle {
    reader: ReaderState,
    license: LicenseState,
    history: VecDeque<StateTransition>,
}

impl ReaderLifecycle {
    pub fn new() -> Self {
        Self {
            reader: ReaderState::Uninitialized,
            license: LicenseState::Unknown,
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
        }
    }

    pub fn reader_state(&self) -> ReaderState {
        self.reader
    }

    pub fn license_state(&self) -> LicenseState {
        self.license
    }

    pub fn history(&self) -> &VecDeque<StateTransition> {
        &self.history
    }

    /// Record the result code of an activation call.
    ///
    /// Non-success codes leave the state unchanged.
    pub fn activation_reported(&mut self, code: ResultCode) {
        if code.is_success() && !self.reader.is_active() {
            self.transition(ReaderState::ReaderActive);
        }
    }

    pub fn deactivated(&mut self) {
        if self.reader != ReaderState::Inactive {
            self.transition(ReaderState::Inactive);
        }
    }

    /// Record that a read was handed to the driver.
    ///
    /// Returns `false` if the reader was not idle and active; the read is
    /// forwarded regardless.
    pub fn read_issued(&mut self) -> bool {
        self.issued(ReaderState::ReadPending)
    }

    /// Record that a write was handed to the driver. See
    /// [`read_issued`](Self::read_issued).
    pub fn write_issued(&mut self) -> bool {
        self.issued(ReaderState::WritePending)
    }

    pub fn read_completed(&mut self) {
        self.completed(ReaderState::ReadPending);
    }

    pub fn write_completed(&mut self) {
        self.completed(ReaderState::WritePending);
    }

    pub fn license_reported(&mut self, status: &LicenseStatus) {
        self.license = if status.is_valid() {
            LicenseState::Valid
        } else {
            LicenseState::Invalid
        };
    }

    fn issued(&mut self, pending: ReaderState) -> bool {
        if self.reader == ReaderState::ReaderActive {
            self.transition(pending);
            true
        } else {
            false
        }
    }

    fn completed(&mut self, pending: ReaderState) {
        if self.reader == pending {
            self.transition(ReaderState::ReaderActive);
        }
    }

    fn transition(&mut self, to: ReaderState) {
        let transition = StateTransition::new(self.reader, to);
        debug!(from = %transition.from, to = %transition.to, "reader state changed");
        self.reader = to;
        self.history.push_back(transition);
        if self.history.len() > MAX_HISTORY_SIZE {
            self.history.pop_front();
        }
    }
}

impl Default for ReaderLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
