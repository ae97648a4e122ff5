use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// One iteration's request: how long the operation may take and how many
/// bytes to attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferWindow {
    pub deadline: Duration,
    pub size: usize,
}

impl TransferWindow {
    pub fn new(deadline: Duration, size: usize) -> Self {
        Self { deadline, size }
    }
}

/// Exclusive upper bounds for the sampled deadline and window size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleBounds {
    pub max_deadline: Duration,
    pub max_window: usize,
}

/// Source of per-iteration windows.
pub trait Schedule {
    fn next_window(&mut self) -> TransferWindow;
}

/// Uniform scheduler over an injected random generator.
#[derive(Debug, Clone)]
pub struct Scheduler<R = StdRng> {
    bounds: ScheduleBounds,
    rng: R,
}

impl Scheduler<StdRng> {
    /// Seeds from the system clock, so two processes started together still
    /// draw independent streams.
    pub fn from_time(bounds: ScheduleBounds) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        Self::seeded(bounds, nanos)
    }

    pub fn seeded(bounds: ScheduleBounds, seed: u64) -> Self {
        Self::with_rng(bounds, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> Scheduler<R> {
    pub fn with_rng(bounds: ScheduleBounds, rng: R) -> Self {
        Self { bounds, rng }
    }

    pub fn bounds(&self) -> ScheduleBounds {
        self.bounds
    }
}

impl<R: Rng> Schedule for Scheduler<R> {
    fn next_window(&mut self) -> TransferWindow {
        let max_micros = self.bounds.max_deadline.as_micros() as u64;
        let micros = if max_micros == 0 { 0 } else { self.rng.gen_range(0..max_micros) };
        let size = if self.bounds.max_window == 0 {
            0
        } else {
            self.rng.gen_range(0..self.bounds.max_window)
        };
        TransferWindow::new(Duration::from_micros(micros), size)
    }
}

impl<S: Schedule + ?Sized> Schedule for &mut S {
    fn next_window(&mut self) -> TransferWindow {
        (**self).next_window()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_bounds() -> ScheduleBounds {
        ScheduleBounds {
            max_deadline: Duration::from_micros(200),
            max_window: 1024 * 1024,
        }
    }

    #[test]
    fn test_windows_stay_in_bounds() {
        let mut scheduler = Scheduler::seeded(default_bounds(), 1);

        for _ in 0..10_000 {
            let window = scheduler.next_window();
            assert!(window.deadline < Duration::from_micros(200));
            assert!(window.size < 1024 * 1024);
        }
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = Scheduler::seeded(default_bounds(), 99);
        let mut b = Scheduler::seeded(default_bounds(), 99);

        let left: Vec<_> = (0..64).map(|_| a.next_window()).collect();
        let right: Vec<_> = (0..64).map(|_| b.next_window()).collect();
        assert_eq!(left, right);
    }

    #[test]
    fn test_different_seeds_diverge() {
        let mut a = Scheduler::seeded(default_bounds(), 1);
        let mut b = Scheduler::seeded(default_bounds(), 2);

        let left: Vec<_> = (0..64).map(|_| a.next_window()).collect();
        let right: Vec<_> = (0..64).map(|_| b.next_window()).collect();
        assert_ne!(left, right);
    }

    #[test]
    fn test_small_bounds_reach_zero() {
        let bounds = ScheduleBounds {
            max_deadline: Duration::from_micros(2),
            max_window: 2,
        };
        let mut scheduler = Scheduler::seeded(bounds, 5);

        let windows: Vec<_> = (0..256).map(|_| scheduler.next_window()).collect();
        assert!(windows.iter().any(|w| w.size == 0));
        assert!(windows.iter().any(|w| w.deadline.is_zero()));
        assert!(windows.iter().all(|w| w.size < 2));
    }

    #[test]
    fn test_degenerate_bounds_yield_zero_windows() {
        let bounds = ScheduleBounds {
            max_deadline: Duration::ZERO,
            max_window: 0,
        };
        let mut scheduler = Scheduler::seeded(bounds, 3);
        assert_eq!(scheduler.next_window(), TransferWindow::new(Duration::ZERO, 0));
    }

    #[test]
    fn test_time_seeded_scheduler_keeps_bounds() {
        let mut scheduler = Scheduler::from_time(default_bounds());
        assert_eq!(scheduler.bounds(), default_bounds());
        let window = scheduler.next_window();
        assert!(window.size < 1024 * 1024);
    }
}
