//! Periodic motor task.
//!
//! The task wakes on absolute deadlines: each deadline is the previous one
//! plus the period, so time spent in the loop body does not push later cycles
//! back. A cycle that overruns its deadline starts the next one immediately.

use crate::config::TaskConfig;
use crate::traits::{Clock, DebugSink, Severity};

/// Tick counter and deadline bookkeeping of the motor loop.
///
/// # Example
///
/// ```rust
/// use rs_motorboard::config::TaskConfig;
/// use rs_motorboard::hal::{MockClock, NullSink};
/// use rs_motorboard::task::MotorTask;
///
/// let mut clock = MockClock::new();
/// let mut task = MotorTask::new(&TaskConfig::default());
/// task.start(&clock, &NullSink);
///
/// clock.advance(120); // loop body took 120 ms
/// let wait = task.delay_until_next(&clock);
/// assert_eq!(wait, 880);
///
/// task.run_cycle(&NullSink);
/// assert_eq!(task.ticks(), 1);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MotorTask {
    period_ms: u32,
    /// Absolute time of the last wake-up.
    cycle_tick: u64,
    ticks: u64,
}

impl MotorTask {
    /// Creates a stopped task.
    pub fn new(config: &TaskConfig) -> Self {
        Self {
            period_ms: config.period_ms,
            cycle_tick: 0,
            ticks: 0,
        }
    }

    /// Cycle period in milliseconds.
    pub fn period_ms(&self) -> u32 {
        self.period_ms
    }

    /// Completed cycles.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Absolute time of the next wake-up.
    pub fn next_deadline(&self) -> u64 {
        self.cycle_tick + u64::from(self.period_ms)
    }

    /// Anchors the deadline sequence at the current time.
    pub fn start<C: Clock, K: DebugSink>(&mut self, clock: &C, sink: &K) {
        self.cycle_tick = clock.now_ms();
        sink.info(format_args!("motor task started, period {} ms", self.period_ms));
    }

    /// Advances to the next deadline and returns how long to sleep until it.
    /// Returns 0 when the deadline has already passed.
    pub fn delay_until_next<C: Clock>(&mut self, clock: &C) -> u64 {
        self.cycle_tick = self.next_deadline();
        self.cycle_tick.saturating_sub(clock.now_ms())
    }

    /// Loop body.
    pub fn run_cycle<K: DebugSink>(&mut self, sink: &K) {
        self.ticks += 1;
        sink.emit(Severity::Debug, format_args!("motor loop"));
    }
}

#[cfg(feature = "std")]
mod runner {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread::{self, JoinHandle};
    use std::time::{Duration, Instant};

    use super::MotorTask;
    use crate::traits::{Clock, DebugSink};

    /// Milliseconds since the runner was spawned.
    struct ThreadClock(Instant);

    impl Clock for ThreadClock {
        fn now_ms(&self) -> u64 {
            self.0.elapsed().as_millis() as u64
        }
    }

    impl MotorTask {
        /// Runs the task on its own thread until `stop` is raised.
        ///
        /// `body` is called after the tick counter has advanced in each cycle.
        /// The task is handed back when the thread exits.
        pub fn spawn<K, F>(
            mut self,
            sink: K,
            stop: Arc<AtomicBool>,
            mut body: F,
        ) -> std::io::Result<JoinHandle<MotorTask>>
        where
            K: DebugSink + Send + 'static,
            F: FnMut(&MotorTask) + Send + 'static,
        {
            thread::Builder::new()
                .name("motor".into())
                .spawn(move || {
                    let clock = ThreadClock(Instant::now());
                    self.start(&clock, &sink);
                    while !stop.load(Ordering::Acquire) {
                        self.run_cycle(&sink);
                        body(&self);
                        let wait = self.delay_until_next(&clock);
                        if wait > 0 {
                            thread::sleep(Duration::from_millis(wait));
                        }
                    }
                    self
                })
        }
    }
}
