// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! Clock and backoff sleeper, injectable so tests never wait for real time

use std::time::{Duration, Instant};

/// Source of "now" for cooldown decisions
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Blocking wait used for reconnect backoff
pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Clock that moves only when told to
    #[derive(Clone)]
    pub struct ManualClock {
        now: Rc<Cell<Instant>>,
    }

    impl ManualClock {
        pub fn new() -> Self {
            Self {
                now: Rc::new(Cell::new(Instant::now())),
            }
        }

        pub fn advance(&self, d: Duration) {
            self.now.set(self.now.get() + d);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.now.get()
        }
    }

    /// Sleeper that records requested waits and returns immediately
    #[derive(Clone, Default)]
    pub struct RecordingSleeper {
        pub calls: Rc<Cell<usize>>,
        pub total: Rc<Cell<Duration>>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&mut self, duration: Duration) {
            self.calls.set(self.calls.get() + 1);
            self.total.set(self.total.get() + duration);
        }
    }
}
