//! Bounded driving loop.
//!
//! Every loop that drives a converter owns a [`ProgressMonitor`]. Whoever
//! consumes input or produces output during an iteration calls
//! [`ProgressMonitor::report_progress`]; the loop calls
//! [`ProgressMonitor::check`] once per iteration. An iteration that did
//! neither counts against the bound, and reaching the bound fails the
//! document instead of spinning forever.

use tracing::debug;

use crate::ConversionError;

/// Progress flag plus the count of consecutive iterations without progress.
#[derive(Debug, Clone)]
pub struct ProgressMonitor {
    made_progress: bool,
    loops_without_progress: u32,
    max_loops_without_progress: u32,
}

impl ProgressMonitor {
    /// Creates a monitor failing after `max_loops_without_progress`
    /// consecutive idle iterations.
    #[must_use]
    pub fn new(max_loops_without_progress: u32) -> Self {
        Self {
            made_progress: false,
            loops_without_progress: 0,
            max_loops_without_progress: max_loops_without_progress.max(1),
        }
    }

    /// Records that the current iteration moved data.
    pub fn report_progress(&mut self) {
        self.made_progress = true;
    }

    /// Returns `true` if progress was reported since the last check.
    #[must_use]
    pub fn made_progress(&self) -> bool {
        self.made_progress
    }

    /// Consecutive idle iterations so far.
    #[must_use]
    pub fn loops_without_progress(&self) -> u32 {
        self.loops_without_progress
    }

    /// Ends an iteration: clears the flag, or counts an idle iteration.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError::TooComplex`] when the idle count reaches
    /// the bound.
    pub fn check(&mut self) -> Result<(), ConversionError> {
        if self.made_progress {
            self.made_progress = false;
            self.loops_without_progress = 0;
            return Ok(());
        }
        self.loops_without_progress += 1;
        if self.loops_without_progress >= self.max_loops_without_progress {
            debug!(loops = self.loops_without_progress, "no progress, giving up");
            return Err(ConversionError::TooComplex {
                loops: self.loops_without_progress,
            });
        }
        Ok(())
    }

    /// Forgets the idle count, for the next external call.
    pub fn reset(&mut self) {
        self.made_progress = false;
        self.loops_without_progress = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_loop_fails_exactly_at_the_bound() {
        let mut monitor = ProgressMonitor::new(5);
        for _ in 0..4 {
            monitor.check().unwrap();
        }
        let err = monitor.check().unwrap_err();
        assert!(matches!(err, ConversionError::TooComplex { loops: 5 }));
    }

    #[test]
    fn progress_resets_the_count() {
        let mut monitor = ProgressMonitor::new(3);
        for _ in 0..100 {
            monitor.check().unwrap();
            monitor.report_progress();
            monitor.check().unwrap();
        }
        assert_eq!(monitor.loops_without_progress(), 0);
    }
}
