use std::sync::Mutex;

use super::unit::UnitOutcome;

/// Barrier over a fixed number of work units.
///
/// Every unit reports exactly once through [`FanIn::arrive`]; the arrival that
/// completes the set receives all outcomes, and no other call ever does.
#[derive(Debug)]
pub struct FanIn {
    expected: usize,
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    outcomes: Vec<UnitOutcome>,
    fired: bool,
}

impl FanIn {
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            state: Mutex::new(State::default()),
        }
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn arrive(&self, outcome: UnitOutcome) -> Option<Vec<UnitOutcome>> {
        let mut s = match self.state.lock() {
            Ok(s) => s,
            Err(poisoned) => poisoned.into_inner(),
        };
        if s.fired {
            tracing::warn!("arrival after fan-in already fired; ignored");
            return None;
        }
        s.outcomes.push(outcome);
        if s.outcomes.len() >= self.expected {
            s.fired = true;
            return Some(std::mem::take(&mut s.outcomes));
        }
        None
    }

    /// Fire an empty barrier. Only succeeds when zero units are expected.
    pub fn fire_empty(&self) -> Option<Vec<UnitOutcome>> {
        let mut s = match self.state.lock() {
            Ok(s) => s,
            Err(poisoned) => poisoned.into_inner(),
        };
        if self.expected == 0 && !s.fired {
            s.fired = true;
            return Some(Vec::new());
        }
        None
    }

    pub fn has_fired(&self) -> bool {
        match self.state.lock() {
            Ok(s) => s.fired,
            Err(poisoned) => poisoned.into_inner().fired,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn done(case_id: i64) -> UnitOutcome {
        UnitOutcome::Completed {
            case_id,
            result_id: case_id,
            skipped: 0,
        }
    }

    #[test]
    fn fires_on_last_arrival_only() {
        let f = FanIn::new(3);
        assert!(f.arrive(done(1)).is_none());
        assert!(f.arrive(UnitOutcome::Cancelled { case_id: 2 }).is_none());
        assert!(!f.has_fired());
        let all = f.arrive(done(3)).unwrap();
        assert_eq!(all.len(), 3);
        assert!(f.has_fired());
        assert!(f.arrive(done(4)).is_none());
    }

    #[test]
    fn empty_barrier_fires_once() {
        let f = FanIn::new(0);
        assert_eq!(f.fire_empty(), Some(vec![]));
        assert_eq!(f.fire_empty(), None);
        assert_eq!(FanIn::new(2).fire_empty(), None);
    }

    #[test]
    fn concurrent_arrivals_fire_exactly_once() {
        let f = Arc::new(FanIn::new(64));
        let handles: Vec<_> = (0..64)
            .map(|i| {
                let f = f.clone();
                std::thread::spawn(move || f.arrive(done(i)).map(|v| v.len()))
            })
            .collect();
        let fired: Vec<usize> = handles
            .into_iter()
            .filter_map(|h| h.join().unwrap())
            .collect();
        assert_eq!(fired, vec![64]);
    }
}
