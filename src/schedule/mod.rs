//! Frame-aligned recompute scheduling
//!
//! Many change notifications inside one frame collapse into a single pass.
//! The scheduler never runs anything itself; the host asks for a frame when
//! told to and calls [`RecomputeScheduler::run_frame`] from it.

use crate::error::GeometryUnstable;

/// Why a recompute was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    DocumentChanged,
    ContainerResized,
    PaginationMutated,
}

impl Trigger {
    /// Parse the host's trigger name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "documentChanged" | "document" => Some(Self::DocumentChanged),
            "containerResized" | "resize" => Some(Self::ContainerResized),
            "paginationMutated" | "pagination" => Some(Self::PaginationMutated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerState {
    #[default]
    Idle,
    Scheduled,
    Computing,
}

/// Answer to [`RecomputeScheduler::request`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Host must schedule one animation frame
    RequestFrame,
    /// A frame is already pending
    Absorbed,
    /// A pass is running; another frame will be requested when it ends
    Deferred,
}

/// Answer to [`RecomputeScheduler::run_frame`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Nothing was scheduled
    Skipped,
    /// Pass ran; scheduler is idle
    Done,
    /// Pass ran or failed and another frame is needed
    RequestFrame,
    /// Geometry stayed unstable past the retry budget; waiting for a trigger
    Parked,
}

#[derive(Debug, Clone)]
pub struct RecomputeScheduler {
    state: SchedulerState,
    pending: Option<Trigger>,
    unstable_streak: u32,
    max_unstable_retries: u32,
}

impl RecomputeScheduler {
    pub fn new(max_unstable_retries: u32) -> Self {
        Self {
            state: SchedulerState::Idle,
            pending: None,
            unstable_streak: 0,
            max_unstable_retries,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Trigger that arrived while a pass was running, if any
    pub fn pending(&self) -> Option<Trigger> {
        self.pending
    }

    /// Consecutive frames that ended with unstable geometry
    pub fn unstable_streak(&self) -> u32 {
        self.unstable_streak
    }

    pub fn request(&mut self, trigger: Trigger) -> RequestOutcome {
        match self.state {
            SchedulerState::Idle => {
                log::trace!("{:?}: scheduling frame", trigger);
                self.state = SchedulerState::Scheduled;
                self.unstable_streak = 0;
                RequestOutcome::RequestFrame
            }
            SchedulerState::Scheduled => RequestOutcome::Absorbed,
            SchedulerState::Computing => {
                self.pending.get_or_insert(trigger);
                RequestOutcome::Deferred
            }
        }
    }

    /// Enter `Computing` if a frame was scheduled
    pub fn begin_frame(&mut self) -> bool {
        if self.state != SchedulerState::Scheduled {
            return false;
        }
        self.state = SchedulerState::Computing;
        true
    }

    /// Leave `Computing` with the pass result
    pub fn finish_frame(&mut self, result: Result<(), GeometryUnstable>) -> FrameOutcome {
        if self.state != SchedulerState::Computing {
            return FrameOutcome::Skipped;
        }

        let deferred = self.pending.take();
        match result {
            Ok(()) => {
                self.unstable_streak = 0;
                if deferred.is_some() {
                    self.state = SchedulerState::Scheduled;
                    FrameOutcome::RequestFrame
                } else {
                    self.state = SchedulerState::Idle;
                    FrameOutcome::Done
                }
            }
            Err(err) => {
                self.unstable_streak += 1;
                if deferred.is_some() {
                    // Fresh geometry is on its way; the streak starts over.
                    self.unstable_streak = 0;
                    self.state = SchedulerState::Scheduled;
                    FrameOutcome::RequestFrame
                } else if self.unstable_streak <= self.max_unstable_retries {
                    log::debug!(
                        "pass aborted ({}), retry {}/{}",
                        err,
                        self.unstable_streak,
                        self.max_unstable_retries
                    );
                    self.state = SchedulerState::Scheduled;
                    FrameOutcome::RequestFrame
                } else {
                    log::debug!("pass aborted ({}), parking until next change", err);
                    self.state = SchedulerState::Idle;
                    FrameOutcome::Parked
                }
            }
        }
    }

    /// Run `pass` if a frame is scheduled.
    ///
    /// The pass receives the scheduler so that changes it causes itself are
    /// recorded as deferred triggers.
    pub fn run_frame<F>(&mut self, pass: F) -> FrameOutcome
    where
        F: FnOnce(&mut Self) -> Result<(), GeometryUnstable>,
    {
        if !self.begin_frame() {
            return FrameOutcome::Skipped;
        }
        let result = pass(self);
        self.finish_frame(result)
    }
}

impl Default for RecomputeScheduler {
    fn default() -> Self {
        Self::new(3)
    }
}
