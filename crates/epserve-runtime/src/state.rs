//! Connection state machine.
//!
//! ```text
//!            Finished                      Finished + keep-alive
//!   ReadingRequest ──────▶ WritingResponse ─────────────────────▶ ReadingRequest
//!        │                      │
//!        │ Failed               │ Failed, or Finished without keep-alive
//!        ▼                      ▼
//!      Close                  Close
//! ```
//!
//! `step` is pure; `Connection` applies the result to itself and the
//! worker applies the matching multiplexer interest.

use epserve_core::multiplexer::Interest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    ReadingRequest,
    WritingResponse,
}

impl ConnState {
    /// The single interest registered while in this state.
    #[inline]
    pub fn interest(self) -> Interest {
        match self {
            ConnState::ReadingRequest => Interest::Readable,
            ConnState::WritingResponse => Interest::Writable,
        }
    }
}

/// What one readiness-driven I/O attempt achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Nothing to conclude yet (need more data / not done writing).
    Pending,
    /// Request head read, or response fully written.
    Finished,
    /// EOF, I/O error, or a zero-length transfer of a non-empty remainder.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Remain,
    Enter(ConnState),
    Close,
}

pub fn step(state: ConnState, progress: Progress, keep_alive: bool) -> Step {
    match (state, progress) {
        (_, Progress::Failed) => Step::Close,
        (_, Progress::Pending) => Step::Remain,
        (ConnState::ReadingRequest, Progress::Finished) => Step::Enter(ConnState::WritingResponse),
        (ConnState::WritingResponse, Progress::Finished) if keep_alive => {
            Step::Enter(ConnState::ReadingRequest)
        }
        (ConnState::WritingResponse, Progress::Finished) => Step::Close,
    }
}
