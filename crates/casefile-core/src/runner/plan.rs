//! Execution planning.
//!
//! Free cases (no fixture or a per-case fixture) are independent units. All
//! per-suite cases of one `(suite, fixture)` pair form a single serial
//! unit. Measured kinds are planned apart so they can run after the
//! parallel phase.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use casefile_types::{CaseKind, FixtureLifetime};

use crate::emit::RegistrationRecord;

/// Cases that run in order on one worker.
#[derive(Debug, Clone)]
pub struct ExecutionUnit<'r> {
    pub suite: String,
    /// Per-suite fixture shared by every member.
    pub shared_fixture: Option<String>,
    pub cases: Vec<&'r RegistrationRecord>,
}

impl<'r> ExecutionUnit<'r> {
    fn single(record: &'r RegistrationRecord) -> Self {
        Self {
            suite: record.case.id.suite.clone(),
            shared_fixture: None,
            cases: vec![record],
        }
    }

    fn has_baseline(&self) -> bool {
        self.cases.iter().any(|r| r.case.kind == CaseKind::Baseline)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Plan<'r> {
    /// Tests and fuzz targets; units may run concurrently.
    pub parallel: Vec<ExecutionUnit<'r>>,
    /// Benchmark, Jitter and Baseline units, run serially in this order.
    pub measured: Vec<ExecutionUnit<'r>>,
}

impl Plan<'_> {
    pub fn case_count(&self) -> usize {
        self.parallel
            .iter()
            .chain(self.measured.iter())
            .map(|u| u.cases.len())
            .sum()
    }
}

#[derive(Default)]
struct SuitePlan<'r> {
    suite: String,
    free: Vec<&'r RegistrationRecord>,
    groups: Vec<(String, Vec<&'r RegistrationRecord>)>,
}

/// Build the plan for `records`, given in registry order. With a shuffle
/// seed, free cases and the members of each group are shuffled; groups
/// themselves are never split or merged.
pub fn build_plan<'r>(records: &[&'r RegistrationRecord], shuffle_seed: Option<u64>) -> Plan<'r> {
    let (measured, regular): (Vec<&RegistrationRecord>, Vec<&RegistrationRecord>) =
        records.iter().copied().partition(|r| r.case.kind.is_measured());

    let mut plan = Plan::default();
    for suite in group_by_suite(&regular, shuffle_seed) {
        plan.parallel
            .extend(suite.free.into_iter().map(ExecutionUnit::single));
        plan.parallel.extend(suite.groups.into_iter().map(|(fixture, cases)| ExecutionUnit {
            suite: suite.suite.clone(),
            shared_fixture: Some(fixture),
            cases,
        }));
    }

    for suite in group_by_suite(&measured, shuffle_seed) {
        let mut units: Vec<ExecutionUnit<'r>> = suite
            .free
            .into_iter()
            .map(ExecutionUnit::single)
            .collect();
        units.extend(suite.groups.into_iter().map(|(fixture, mut cases)| {
            cases.sort_by_key(|r| r.case.kind != CaseKind::Baseline);
            ExecutionUnit {
                suite: suite.suite.clone(),
                shared_fixture: Some(fixture),
                cases,
            }
        }));
        // Stable: baselines first, otherwise planned order.
        units.sort_by_key(|u| !u.has_baseline());
        plan.measured.extend(units);
    }
    plan
}

fn group_by_suite<'r>(
    records: &[&'r RegistrationRecord],
    shuffle_seed: Option<u64>,
) -> Vec<SuitePlan<'r>> {
    let mut suites: Vec<SuitePlan<'r>> = Vec::new();
    for &record in records {
        let suite_name = record.case.suite();
        let idx = match suites.iter().position(|s| s.suite == suite_name) {
            Some(i) => i,
            None => {
                suites.push(SuitePlan {
                    suite: suite_name.to_string(),
                    ..Default::default()
                });
                suites.len() - 1
            }
        };
        let suite = &mut suites[idx];
        match (&record.case.fixture, record.case.fixture_lifetime) {
            (Some(fixture), FixtureLifetime::PerSuite) => {
                match suite.groups.iter_mut().find(|(name, _)| *name == fixture.name) {
                    Some((_, members)) => members.push(record),
                    None => suite.groups.push((fixture.name.clone(), vec![record])),
                }
            }
            _ => suite.free.push(record),
        }
    }

    if let Some(base) = shuffle_seed {
        for suite in &mut suites {
            let suite_seed = base ^ (stable_hash(&suite.suite) << 1);
            suite
                .free
                .shuffle(&mut StdRng::seed_from_u64(suite_seed));
            for (fixture, members) in &mut suite.groups {
                let group_seed = suite_seed.wrapping_add(stable_hash(fixture));
                members.shuffle(&mut StdRng::seed_from_u64(group_seed));
            }
        }
    }
    suites
}

fn stable_hash(s: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    s.hash(&mut hasher);
    hasher.finish()
}
