// Copyright (c) The trove Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Classification of a test case's run history into a trend label.
//!
//! The tracker is a pure Moore machine: the next `(state, streak)` pair is
//! computed from exactly the previous pair and the newest outcome. A case
//! is [`New`](TrackState::New) the first time it fails, settles into
//! [`Consistent`](TrackState::Consistent) while it keeps failing, and
//! moves through [`Passing`](TrackState::Passing) to
//! [`Resolved`](TrackState::Resolved) once it passes long enough.
//! Alternation between pass and fail is tracked as
//! [`Flaky`](TrackState::Flaky) with a hysteresis threshold so short-lived
//! alternation does not re-trigger notifications forever.

use crate::errors::RunOutcomeParseError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The outcome of one execution of one named test case.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    /// The case passed.
    Passed,

    /// The case failed.
    Failed,
}

impl RunOutcome {
    /// String representations of all known variants.
    pub fn variants() -> &'static [&'static str] {
        &["passed", "failed"]
    }
}

impl FromStr for RunOutcome {
    type Err = RunOutcomeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let val = match s {
            "passed" => RunOutcome::Passed,
            "failed" => RunOutcome::Failed,
            other => return Err(RunOutcomeParseError::new(other)),
        };
        Ok(val)
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Passed => write!(f, "passed"),
            RunOutcome::Failed => write!(f, "failed"),
        }
    }
}

/// Trend classification of a test case across consecutive observed runs.
#[derive(
    Copy, Clone, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TrackState {
    /// No signal: the case has never failed, or its history was reset.
    #[default]
    None,

    /// The case failed for the first time.
    New,

    /// The case is failing on every consecutive run.
    Consistent,

    /// The case is alternating between passing and failing.
    Flaky,

    /// The case is passing again after a failure.
    Passing,

    /// The case has passed long enough to be considered fixed.
    Resolved,
}

/// Streak at which an alternating or recovering case settles: `Flaky`
/// folds back to `Consistent` (failing) or `Resolved` (passing), and
/// `Passing` graduates to `Resolved`.
const SETTLE_STREAK: u32 = 4;

/// The `(state, streak)` pair tracked for one case.
///
/// `streak` counts consecutive runs that produced the current label. The
/// default record, `(None, 0)`, is both the starting point for a case
/// with no history and the reset value for transitions outside the
/// defined table.
#[derive(
    Copy, Clone, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize,
)]
pub struct TrackRecord {
    /// Current classification.
    pub state: TrackState,

    /// Consecutive runs that produced this classification.
    pub streak: u32,
}

impl TrackRecord {
    /// Creates a record from a state and streak.
    pub fn new(state: TrackState, streak: u32) -> Self {
        Self { state, streak }
    }

    /// Feeds one outcome through the tracker, producing the next record.
    ///
    /// Total over all inputs: any `(outcome, state)` pair without a defined
    /// transition resets to the default record. In particular a pass with
    /// no history stays at `(None, 0)`, and *any* outcome observed while
    /// `Resolved` resets the history rather than staying resolved.
    #[must_use]
    pub fn advance(self, outcome: RunOutcome) -> TrackRecord {
        use RunOutcome::{Failed, Passed};
        use TrackState::{Consistent, Flaky, New, Passing, Resolved};

        let (state, streak) = match (outcome, self.state) {
            (Failed, TrackState::None) => (New, 1),
            (Failed, New) => (Consistent, 2),
            (Failed, Consistent) => (Consistent, self.streak + 1),
            (Failed, Flaky) if self.streak == SETTLE_STREAK => {
                (Consistent, SETTLE_STREAK + 1)
            }
            (Failed, Flaky) => (Flaky, self.streak + 1),
            (Failed, Passing) => (Flaky, 1),
            (Passed, New) => (Passing, 2),
            (Passed, Consistent) => (Passing, 1),
            (Passed, Flaky) if self.streak == SETTLE_STREAK => {
                (Resolved, SETTLE_STREAK + 1)
            }
            (Passed, Flaky) => (Flaky, self.streak + 1),
            (Passed, Passing) if self.streak == SETTLE_STREAK => {
                (Resolved, SETTLE_STREAK + 1)
            }
            (Passed, Passing) => (Passing, self.streak + 1),
            _ => (TrackState::None, 0),
        };
        TrackRecord { state, streak }
    }

    /// Replays a whole outcome sequence from the default record.
    pub fn replay(outcomes: impl IntoIterator<Item = RunOutcome>) -> TrackRecord {
        outcomes
            .into_iter()
            .fold(TrackRecord::default(), TrackRecord::advance)
    }
}

/// Per-case trend records across successive runs.
///
/// The ledger mirrors how runs are folded: each recorded run rebuilds the
/// table from that run's cases, consulting only the previous run's table.
/// Cases absent from the newest run drop out.
#[derive(Clone, Debug, Default)]
pub struct CaseLedger {
    records: IndexMap<String, TrackRecord>,
    has_run: bool,
}

impl CaseLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one run's per-case outcomes into the ledger.
    ///
    /// In the first recorded run every case advances from the default
    /// record, so a failing case starts out `New`. In later runs a case
    /// advances from its previous record if it was present in the previous
    /// run, and otherwise starts at the default record without advancing.
    pub fn record_run(
        &mut self,
        outcomes: impl IntoIterator<Item = (String, RunOutcome)>,
    ) {
        let previous = std::mem::take(&mut self.records);
        let first_run = !self.has_run;
        for (name, outcome) in outcomes {
            let record = if first_run {
                TrackRecord::default().advance(outcome)
            } else if let Some(prev) = previous.get(&name) {
                prev.advance(outcome)
            } else {
                TrackRecord::default()
            };
            self.records.insert(name, record);
        }
        self.has_run = true;
    }

    /// Returns the record for the named case, if it was part of the most
    /// recent run.
    pub fn get(&self, name: &str) -> Option<TrackRecord> {
        self.records.get(name).copied()
    }

    /// Iterates over `(case name, record)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, TrackRecord)> + '_ {
        self.records.iter().map(|(name, record)| (name.as_str(), *record))
    }

    /// The number of cases in the most recent run.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no cases are tracked.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::{
        RunOutcome::{Failed, Passed},
        TrackState::{Consistent, Flaky, New, Passing, Resolved},
    };
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case(Passed, TrackState::None, 0 => (TrackState::None, 0); "pass with no history stays reset")]
    #[test_case(Passed, TrackState::None, 7 => (TrackState::None, 0); "pass with no history discards the streak")]
    #[test_case(Failed, TrackState::None, 0 => (New, 1); "first failure is new")]
    #[test_case(Failed, New, 1 => (Consistent, 2); "second failure is consistent")]
    #[test_case(Failed, Consistent, 2 => (Consistent, 3); "consistent keeps counting failures")]
    #[test_case(Failed, Consistent, 9 => (Consistent, 10); "consistent streak is unbounded")]
    #[test_case(Failed, Flaky, 2 => (Flaky, 3); "failing while flaky keeps flaky below threshold")]
    #[test_case(Failed, Flaky, 4 => (Consistent, 5); "failing at the flaky threshold settles to consistent")]
    #[test_case(Failed, Passing, 3 => (Flaky, 1); "failure after passing is flaky")]
    #[test_case(Passed, New, 1 => (Passing, 2); "pass after a new failure is passing")]
    #[test_case(Passed, Consistent, 5 => (Passing, 1); "pass after consistent failures restarts at one")]
    #[test_case(Passed, Flaky, 3 => (Flaky, 4); "passing while flaky keeps flaky below threshold")]
    #[test_case(Passed, Flaky, 4 => (Resolved, 5); "passing at the flaky threshold resolves")]
    #[test_case(Passed, Passing, 2 => (Passing, 3); "passing keeps counting passes")]
    #[test_case(Passed, Passing, 4 => (Resolved, 5); "passing at the threshold resolves")]
    #[test_case(Passed, Resolved, 5 => (TrackState::None, 0); "pass while resolved resets")]
    #[test_case(Failed, Resolved, 5 => (TrackState::None, 0); "failure while resolved resets rather than reopening")]
    fn transition(outcome: RunOutcome, state: TrackState, streak: u32) -> (TrackState, u32) {
        let next = TrackRecord::new(state, streak).advance(outcome);
        (next.state, next.streak)
    }

    #[test]
    fn threshold_check_is_exact() {
        // The settle check compares for equality, so a synthetic streak
        // past the threshold keeps growing instead of settling.
        let next = TrackRecord::new(Flaky, 7).advance(Failed);
        assert_eq!(next, TrackRecord::new(Flaky, 8));
    }

    #[test]
    fn replay_reaches_resolved() {
        // fail, then pass four times: New -> Passing x3 -> Resolved.
        let record =
            TrackRecord::replay([Failed, Passed, Passed, Passed, Passed]);
        assert_eq!(record, TrackRecord::new(Resolved, 5));
    }

    #[test]
    fn replay_alternation_settles_to_consistent() {
        // Alternation builds a flaky streak; the fourth flaky observation
        // arrives on a failure, so the case settles as consistent.
        let record =
            TrackRecord::replay([Failed, Failed, Passed, Failed, Passed, Failed]);
        assert_eq!(record, TrackRecord::new(Consistent, 5));
    }

    #[test]
    fn replay_of_nothing_is_default() {
        assert_eq!(TrackRecord::replay([]), TrackRecord::default());
    }

    #[test]
    fn ledger_first_run_advances_from_default() {
        let mut ledger = CaseLedger::new();
        ledger.record_run([
            ("a".to_owned(), Passed),
            ("b".to_owned(), Failed),
        ]);
        assert_eq!(ledger.get("a"), Some(TrackRecord::default()));
        assert_eq!(ledger.get("b"), Some(TrackRecord::new(New, 1)));
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn ledger_advances_known_cases_and_defaults_new_ones() {
        let mut ledger = CaseLedger::new();
        ledger.record_run([("b".to_owned(), Failed)]);
        ledger.record_run([
            ("b".to_owned(), Failed),
            // Unseen in the previous run: default record, no advance.
            ("c".to_owned(), Failed),
        ]);
        assert_eq!(ledger.get("b"), Some(TrackRecord::new(Consistent, 2)));
        assert_eq!(ledger.get("c"), Some(TrackRecord::default()));
    }

    #[test]
    fn ledger_drops_cases_absent_from_the_newest_run() {
        let mut ledger = CaseLedger::new();
        ledger.record_run([("a".to_owned(), Failed)]);
        ledger.record_run([("z".to_owned(), Passed)]);
        assert_eq!(ledger.get("a"), None);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn ledger_empty_run_empties_the_table() {
        let mut ledger = CaseLedger::new();
        ledger.record_run([("a".to_owned(), Failed)]);
        ledger.record_run([]);
        assert!(ledger.is_empty());
    }

    #[test]
    fn ledger_iterates_in_run_order() {
        let mut ledger = CaseLedger::new();
        ledger.record_run([
            ("m".to_owned(), Failed),
            ("a".to_owned(), Failed),
            ("z".to_owned(), Passed),
        ]);
        let names: Vec<_> = ledger.iter().map(|(name, _)| name.to_owned()).collect();
        assert_eq!(names, ["m", "a", "z"]);
    }

    fn outcome_strategy() -> impl Strategy<Value = RunOutcome> {
        prop_oneof![Just(Passed), Just(Failed)]
    }

    proptest! {
        // Streak bounds reachable from the default record. Only the
        // consistent streak is unbounded; everything else is capped by
        // the settle threshold.
        #[test]
        fn replay_streaks_stay_in_bounds(
            outcomes in proptest::collection::vec(outcome_strategy(), 0..200)
        ) {
            let record = TrackRecord::replay(outcomes);
            match record.state {
                TrackState::None => prop_assert_eq!(record.streak, 0),
                New => prop_assert_eq!(record.streak, 1),
                Consistent => prop_assert!(record.streak >= 2),
                Flaky | Passing => {
                    prop_assert!((1..=SETTLE_STREAK).contains(&record.streak))
                }
                Resolved => prop_assert_eq!(record.streak, SETTLE_STREAK + 1),
            }
        }

        // Totality: advance never panics, whatever record it starts from.
        #[test]
        fn advance_is_total(
            state in prop_oneof![
                Just(TrackState::None),
                Just(New),
                Just(Consistent),
                Just(Flaky),
                Just(Passing),
                Just(Resolved),
            ],
            streak in 0u32..100,
            outcome in outcome_strategy(),
        ) {
            let _ = TrackRecord::new(state, streak).advance(outcome);
        }
    }

    #[test]
    fn outcome_round_trips_through_strings() {
        for outcome in [Passed, Failed] {
            assert_eq!(
                outcome.to_string().parse::<RunOutcome>().unwrap(),
                outcome
            );
        }
        "errored".parse::<RunOutcome>().unwrap_err();
    }
}
