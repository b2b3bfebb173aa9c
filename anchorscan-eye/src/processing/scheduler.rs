//! Admission control for recognition submissions
//!
//! Recognition is far more expensive than the frame rate allows, so only one
//! frame in every `skip_cycles + 1` is considered, and never while another
//! recognition is still outstanding. Dropped frames are not buffered.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Single-flight slot shared between the frame-delivery context and the
/// detection task.
#[derive(Debug, Clone, Default)]
pub struct InFlightSlot {
    busy: Arc<AtomicBool>,
}

impl InFlightSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot. Returns `None` while a permit is outstanding.
    pub fn try_acquire(&self) -> Option<SlotPermit> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SlotPermit {
                busy: self.busy.clone(),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Proof of ownership of the in-flight slot.
///
/// The slot is released when the permit is dropped, which happens exactly
/// once whichever way the recognition ends.
#[derive(Debug)]
pub struct SlotPermit {
    busy: Arc<AtomicBool>,
}

impl Drop for SlotPermit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Why a frame was not submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Pipeline is not `Ready` (or the session is paused)
    NotReady,
    /// A recognition is already outstanding
    Busy,
    /// Still inside the throttle window
    Throttled,
}

/// Outcome of evaluating one frame
#[derive(Debug)]
pub enum Admission {
    Admit(SlotPermit),
    Reject(Rejection),
}

/// Per-frame throttle plus single-flight gate
#[derive(Debug)]
pub struct DetectionScheduler {
    skip_cycles: u32,
    cycle_counter: u32,
    slot: InFlightSlot,
}

impl DetectionScheduler {
    pub fn new(skip_cycles: u32, slot: InFlightSlot) -> Self {
        Self {
            skip_cycles,
            cycle_counter: 0,
            slot,
        }
    }

    /// Decide whether the frame just delivered should be recognized.
    ///
    /// Frames seen before the pipeline is ready count towards the throttle
    /// window (saturating), so the first ready frame can be admitted
    /// immediately once the session has been warm for long enough.
    pub fn evaluate(&mut self, ready: bool) -> Admission {
        if !ready {
            self.cycle_counter = self.cycle_counter.saturating_add(1).min(self.skip_cycles);
            return Admission::Reject(Rejection::NotReady);
        }

        if self.slot.is_busy() {
            return Admission::Reject(Rejection::Busy);
        }

        if self.cycle_counter < self.skip_cycles {
            self.cycle_counter += 1;
            trace!(cycle = self.cycle_counter, "frame throttled");
            return Admission::Reject(Rejection::Throttled);
        }

        match self.slot.try_acquire() {
            Some(permit) => {
                self.cycle_counter = 0;
                Admission::Admit(permit)
            }
            None => Admission::Reject(Rejection::Busy),
        }
    }

    pub fn cycle_counter(&self) -> u32 {
        self.cycle_counter
    }

    pub fn skip_cycles(&self) -> u32 {
        self.skip_cycles
    }

    pub fn slot(&self) -> &InFlightSlot {
        &self.slot
    }

    /// Forget the throttle window.
    pub fn reset(&mut self) {
        self.cycle_counter = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admitted(admission: &Admission) -> bool {
        matches!(admission, Admission::Admit(_))
    }

    #[test]
    fn test_slot_single_permit() {
        let slot = InFlightSlot::new();
        let permit = slot.try_acquire();
        assert!(permit.is_some());
        assert!(slot.is_busy());
        assert!(slot.try_acquire().is_none());

        drop(permit);
        assert!(!slot.is_busy());
        assert!(slot.try_acquire().is_some());
    }

    #[test]
    fn test_not_ready_never_admits() {
        let mut scheduler = DetectionScheduler::new(0, InFlightSlot::new());
        for _ in 0..100 {
            let admission = scheduler.evaluate(false);
            assert!(matches!(admission, Admission::Reject(Rejection::NotReady)));
        }
        assert!(!scheduler.slot().is_busy());
    }

    #[test]
    fn test_throttle_admits_every_n_plus_one() {
        let mut scheduler = DetectionScheduler::new(20, InFlightSlot::new());
        let mut admitted_at = Vec::new();
        for frame in 0..105 {
            if let Admission::Admit(permit) = scheduler.evaluate(true) {
                admitted_at.push(frame);
                drop(permit);
            }
        }
        assert_eq!(admitted_at, vec![20, 41, 62, 83, 104]);
    }

    #[test]
    fn test_throttle_upper_bound() {
        let n = 20u32;
        for frame_count in [1usize, 20, 21, 22, 100, 500] {
            let mut scheduler = DetectionScheduler::new(n, InFlightSlot::new());
            let submissions = (0..frame_count)
                .filter(|_| admitted(&scheduler.evaluate(true)))
                .count();
            let bound = frame_count.div_ceil(n as usize + 1);
            assert!(submissions <= bound, "{} > {} for {}", submissions, bound, frame_count);
        }
    }

    #[test]
    fn test_busy_drops_without_queueing() {
        let mut scheduler = DetectionScheduler::new(0, InFlightSlot::new());
        let permit = match scheduler.evaluate(true) {
            Admission::Admit(permit) => permit,
            other => panic!("expected admission, got {:?}", other),
        };

        for _ in 0..50 {
            assert!(matches!(
                scheduler.evaluate(true),
                Admission::Reject(Rejection::Busy)
            ));
        }

        drop(permit);
        assert!(admitted(&scheduler.evaluate(true)));
    }

    #[test]
    fn test_busy_does_not_advance_counter() {
        let slot = InFlightSlot::new();
        let mut scheduler = DetectionScheduler::new(3, slot.clone());
        let held = slot.try_acquire();
        for _ in 0..10 {
            scheduler.evaluate(true);
        }
        assert_eq!(scheduler.cycle_counter(), 0);
        drop(held);
    }

    #[test]
    fn test_warmup_counts_towards_window() {
        let mut scheduler = DetectionScheduler::new(5, InFlightSlot::new());
        for _ in 0..50 {
            scheduler.evaluate(false);
        }
        assert_eq!(scheduler.cycle_counter(), 5);
        assert!(admitted(&scheduler.evaluate(true)));
        assert_eq!(scheduler.cycle_counter(), 0);
    }

    #[test]
    fn test_reset_clears_window() {
        let mut scheduler = DetectionScheduler::new(5, InFlightSlot::new());
        for _ in 0..3 {
            scheduler.evaluate(true);
        }
        scheduler.reset();
        assert_eq!(scheduler.cycle_counter(), 0);
    }
}
