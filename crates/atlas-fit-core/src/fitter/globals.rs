use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::trace;

use super::{FittedArea, LocalBound};
use crate::model::OutImage;

/// Calls handed to a worker per refill, so workers do not hit the shared
/// lock on every search step.
pub(crate) const REFILL_SLICE: i32 = 512;

/// The best complete placement found so far, published as one unit.
#[derive(Debug, Clone)]
pub(crate) struct BestFit {
    pub out_size: i32,
    pub image_count: i32,
    pub fitted: Vec<FittedArea>,
    pub out_images: Vec<OutImage>,
}

#[derive(Debug, Default)]
struct SharedState {
    calls_left: i32,
    improvements: u32,
    best: Option<BestFit>,
}

impl SharedState {
    /// Pruning bounds; an empty best reads as unbounded.
    fn bounds(&self) -> (i32, i32) {
        match &self.best {
            Some(b) => (b.out_size, b.image_count),
            None => (i32::MAX, i32::MAX),
        }
    }
}

/// Search state shared among all workers: the remaining call budget and the
/// best placement found so far. All access goes through one short critical
/// section, so a reader sees either the old best entirely or the new best
/// entirely.
#[derive(Debug)]
pub(crate) struct SharedBest {
    state: Mutex<SharedState>,
}

/// Outcome of a worker's budget-refill request.
pub(crate) enum Refill {
    /// This many calls were granted; keep searching.
    Granted(i32),
    /// Another worker holds a tighter best; the local bound was updated and
    /// the current frame is no longer worth exploring.
    Tightened,
    /// The shared pool is empty; the search is over for this worker.
    Exhausted,
}

impl SharedBest {
    pub fn new(call_budget: i32) -> Self {
        Self {
            state: Mutex::new(SharedState {
                calls_left: call_budget,
                improvements: 0,
                best: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SharedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Draws the next budget slice, first syncing the worker's bound with
    /// any improvement published since the last refill.
    pub fn refill(&self, bound: &mut LocalBound) -> Refill {
        let mut g = self.lock();
        let (best_size, best_count) = g.bounds();
        if bound.out_size > best_size || bound.image_count > best_count {
            bound.out_size = best_size;
            bound.image_count = best_count;
            return Refill::Tightened;
        }
        if g.calls_left == 0 {
            return Refill::Exhausted;
        }
        let take = g.calls_left.min(REFILL_SLICE);
        g.calls_left -= take;
        Refill::Granted(take)
    }

    /// Offers a complete placement. Publishes it if it beats the shared best
    /// on size without using more images; otherwise pulls the shared bounds
    /// into the worker's local bound.
    pub fn offer(
        &self,
        out_size: i32,
        image_count: i32,
        fitted: &[FittedArea],
        out_images: &[OutImage],
        bound: &mut LocalBound,
    ) {
        let mut g = self.lock();
        let (best_size, best_count) = g.bounds();
        if out_size < best_size && image_count <= best_count {
            bound.out_size = out_size;
            bound.image_count = image_count;
            g.best = Some(BestFit {
                out_size,
                image_count,
                fitted: fitted.to_vec(),
                out_images: out_images.to_vec(),
            });
            g.improvements += 1;
            trace!(out_size, image_count, "improved best fit");
        } else {
            bound.out_size = best_size;
            bound.image_count = best_count;
        }
    }

    /// Returns a worker's unused calls to the pool.
    pub fn hand_back(&self, calls: i32) {
        self.lock().calls_left += calls;
    }

    /// Consumes the shared state: best fit, remaining budget, improvement
    /// count.
    pub fn finish(self) -> (Option<BestFit>, i32, u32) {
        let state = self
            .state
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        (state.best, state.calls_left, state.improvements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refill_slices_budget_then_exhausts() {
        let shared = SharedBest::new(700);
        let mut bound = LocalBound::unbounded();
        match shared.refill(&mut bound) {
            Refill::Granted(n) => assert_eq!(n, REFILL_SLICE),
            _ => panic!("expected a full slice"),
        }
        match shared.refill(&mut bound) {
            Refill::Granted(n) => assert_eq!(n, 188),
            _ => panic!("expected the remainder"),
        }
        assert!(matches!(shared.refill(&mut bound), Refill::Exhausted));
    }

    #[test]
    fn refill_reports_foreign_improvement_once() {
        let shared = SharedBest::new(1000);
        let mut publisher = LocalBound::unbounded();
        shared.offer(500, 1, &[], &[], &mut publisher);

        let mut bound = LocalBound::unbounded();
        assert!(matches!(shared.refill(&mut bound), Refill::Tightened));
        assert_eq!(bound.out_size, 500);
        assert_eq!(bound.image_count, 1);
        // bound now matches the shared best, so the next refill grants calls
        assert!(matches!(shared.refill(&mut bound), Refill::Granted(_)));
    }

    #[test]
    fn offer_rejects_worse_or_wider_fits() {
        let shared = SharedBest::new(0);
        let mut bound = LocalBound::unbounded();
        shared.offer(500, 2, &[], &[], &mut bound);
        // bigger size: rejected, bound refreshed
        let mut other = LocalBound::unbounded();
        shared.offer(600, 1, &[], &[], &mut other);
        assert_eq!(other.out_size, 500);
        assert_eq!(other.image_count, 2);
        // smaller size but more images: rejected
        shared.offer(400, 3, &[], &[], &mut other);
        assert_eq!(other.out_size, 500);
        // smaller size, fewer images: published
        shared.offer(400, 1, &[], &[], &mut other);
        let (best, _, improvements) = shared.finish();
        assert_eq!(best.unwrap().out_size, 400);
        assert_eq!(improvements, 2);
    }
}
