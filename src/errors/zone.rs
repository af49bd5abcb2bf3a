//! Error code zones.
//!
//! Codes are issued from in-memory atomic counters. Nothing is persisted:
//! issuance starts over on every process start, so zones must be carved out
//! in the same order at startup, before the codes are used concurrently.

use std::sync::atomic::{AtomicU32, Ordering};

use super::biz::BizError;

/// A contiguous range `[start, stop)` of error codes issued sequentially.
#[derive(Debug)]
pub struct Zone {
    cursor: AtomicU32,
    stop: Option<u32>,
}

impl Zone {
    /// A zone issuing codes from `start` up to, but excluding, `stop`.
    pub fn new(start: u32, stop: u32) -> Self {
        Self {
            cursor: AtomicU32::new(start),
            stop: Some(stop),
        }
    }

    /// A zone with no upper bound.
    pub fn unbounded(start: u32) -> Self {
        Self {
            cursor: AtomicU32::new(start),
            stop: None,
        }
    }

    /// Issue a new business error with the next code of this zone.
    ///
    /// # Panics
    ///
    /// Panics when the zone is exhausted. Zones are sized when the error
    /// catalogue is declared, so running out is a build-time mistake.
    pub fn error(&self, status: u16, message: impl Into<String>) -> BizError {
        let code = self.cursor.fetch_add(1, Ordering::SeqCst);
        if let Some(stop) = self.stop {
            if code >= stop {
                panic!("too many errors in zone: code {code} reaches stop {stop}");
            }
        }
        BizError::new(code, status, message)
    }
}

/// Issues successive, disjoint zones of a fixed width.
#[derive(Debug)]
pub struct Step {
    curr: AtomicU32,
    width: u32,
}

/// Zones of 1000 codes, the first one starting at 1000.
pub static THOUSAND_STEP: Step = Step::new(1000, 1000);

/// Zones of 10000 codes, the first one starting at 10000.
pub static TEN_THOUSAND_STEP: Step = Step::new(10_000, 10_000);

impl Step {
    pub const fn new(start: u32, width: u32) -> Self {
        Self {
            curr: AtomicU32::new(start),
            width,
        }
    }

    /// Move the start of the next zone to `curr`.
    pub fn reset(&self, curr: u32) {
        self.curr.store(curr, Ordering::SeqCst);
    }

    /// Carve out the next zone.
    pub fn next(&self) -> Zone {
        let start = self.curr.fetch_add(self.width, Ordering::SeqCst);
        Zone::new(start, start.saturating_add(self.width))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn unbounded_zone_issues_sequential_codes() {
        let zone = Zone::unbounded(10_000);
        assert_eq!(zone.error(400, "bad user").code(), 10_000);
        assert_eq!(zone.error(400, "bad pass").code(), 10_001);
    }

    #[test]
    fn single_code_zone_issues_once() {
        let zone = Zone::new(10_000, 10_001);
        assert_eq!(zone.error(401, "bad user").code(), 10_000);
    }

    #[test]
    #[should_panic(expected = "too many errors in zone")]
    fn exhausted_zone_panics() {
        let zone = Zone::new(10_000, 10_001);
        let _ = zone.error(401, "bad user");
        let _ = zone.error(401, "bad pass");
    }

    #[test]
    fn steps_never_overlap() {
        let step = Step::new(1000, 100);
        let a = step.next();
        let b = step.next();

        assert_eq!(a.error(400, "a").code(), 1000);
        assert_eq!(b.error(400, "b").code(), 1100);
    }

    #[test]
    fn reset_moves_next_zone() {
        let step = Step::new(1000, 1000);
        step.reset(50_000);
        assert_eq!(step.next().error(400, "x").code(), 50_000);
    }

    #[test]
    fn concurrent_issuance_is_distinct() {
        let zone = Arc::new(Zone::new(0, 10_000));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let zone = Arc::clone(&zone);
                std::thread::spawn(move || {
                    (0..500).map(|_| zone.error(400, "x").code()).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for code in handle.join().unwrap() {
                assert!(seen.insert(code), "duplicate code {code}");
            }
        }
        assert_eq!(seen.len(), 4000);
    }
}
