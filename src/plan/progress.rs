// src/plan/progress.rs

//! Progress shared by tasks, actions and execution units.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// `New -> Running -> {Succeeded | Failed}`.
///
/// There is no transition out of a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Progress {
    New,
    Running,
    Succeeded,
    Failed,
}

impl Progress {
    pub fn is_terminal(self) -> bool {
        matches!(self, Progress::Succeeded | Progress::Failed)
    }

    /// Fold child progress values into an aggregate.
    ///
    /// - any `Failed` wins,
    /// - all `Succeeded` is `Succeeded`,
    /// - all `New` (or nothing at all) is `New`,
    /// - anything else is `Running`.
    pub fn aggregate<I>(children: I) -> Progress
    where
        I: IntoIterator<Item = Progress>,
    {
        let mut saw_any = false;
        let mut all_new = true;
        let mut all_succeeded = true;

        for p in children {
            saw_any = true;
            match p {
                Progress::Failed => return Progress::Failed,
                Progress::Succeeded => all_new = false,
                Progress::Running => {
                    all_new = false;
                    all_succeeded = false;
                }
                Progress::New => all_succeeded = false,
            }
        }

        if !saw_any || all_new {
            Progress::New
        } else if all_succeeded {
            Progress::Succeeded
        } else {
            Progress::Running
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Progress::New => "NEW",
            Progress::Running => "RUNNING",
            Progress::Succeeded => "SUCCEEDED",
            Progress::Failed => "FAILED",
        }
    }

    /// ANSI-coloured rendering for the terminal progress report.
    pub fn colored(self) -> String {
        let code = match self {
            Progress::New => "37",
            Progress::Running => "33",
            Progress::Succeeded => "32",
            Progress::Failed => "31",
        };
        format!("\x1b[{code}m{}\x1b[0m", self.as_str())
    }

    fn to_u8(self) -> u8 {
        match self {
            Progress::New => 0,
            Progress::Running => 1,
            Progress::Succeeded => 2,
            Progress::Failed => 3,
        }
    }

    fn from_u8(raw: u8) -> Progress {
        match raw {
            0 => Progress::New,
            1 => Progress::Running,
            2 => Progress::Succeeded,
            _ => Progress::Failed,
        }
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lock-free progress slot that can be written from executor workers and
/// read by the scheduler loop.
#[derive(Debug)]
pub struct ProgressCell(AtomicU8);

impl ProgressCell {
    pub fn new(progress: Progress) -> Self {
        Self(AtomicU8::new(progress.to_u8()))
    }

    pub fn load(&self) -> Progress {
        Progress::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, progress: Progress) {
        self.0.store(progress.to_u8(), Ordering::Release);
    }

    /// Move from `from` to `to` only if the cell currently holds `from`.
    pub fn transition(&self, from: Progress, to: Progress) -> bool {
        self.0
            .compare_exchange(from.to_u8(), to.to_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for ProgressCell {
    fn default() -> Self {
        Self::new(Progress::New)
    }
}
