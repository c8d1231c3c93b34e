use std::thread;
use std::time::{Duration, Instant};

/// Paces frame delivery for software cameras at a fixed rate.
#[derive(Debug)]
pub(crate) struct FrameCadence {
    period: Duration,
    next_frame_at: Option<Instant>,
}

impl FrameCadence {
    pub(crate) fn new(frame_rate_hz: f64) -> Self {
        Self {
            period: Duration::from_secs_f64(1.0 / frame_rate_hz),
            next_frame_at: None,
        }
    }

    pub(crate) fn set_rate(&mut self, frame_rate_hz: f64) {
        self.period = Duration::from_secs_f64(1.0 / frame_rate_hz);
    }

    pub(crate) fn start(&mut self) {
        self.next_frame_at = Some(Instant::now() + self.period);
    }

    pub(crate) fn stop(&mut self) {
        self.next_frame_at = None;
    }

    /// Blocks until the next frame is due. Returns `false` after sleeping the
    /// full `timeout` when it is not due in time or the cadence is stopped.
    pub(crate) fn wait_next(&mut self, timeout: Duration) -> bool {
        let Some(due) = self.next_frame_at else {
            thread::sleep(timeout);
            return false;
        };

        let now = Instant::now();
        if due > now + timeout {
            thread::sleep(timeout);
            return false;
        }
        if due > now {
            thread::sleep(due - now);
        }
        self.next_frame_at = Some(due + self.period);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stopped_cadence_times_out() {
        let mut cadence = FrameCadence::new(1000.0);
        assert!(!cadence.wait_next(Duration::from_millis(2)));
    }

    #[test]
    fn test_slow_rate_times_out_then_fast_rate_delivers() {
        let mut cadence = FrameCadence::new(0.5);
        cadence.start();
        assert!(!cadence.wait_next(Duration::from_millis(5)));

        cadence.set_rate(1000.0);
        cadence.start();
        assert!(cadence.wait_next(Duration::from_millis(50)));
        assert!(cadence.wait_next(Duration::from_millis(50)));
    }
}
