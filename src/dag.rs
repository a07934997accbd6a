//! The file-to-rule graph of one workflow plan.
//!
//! Edges run from the rule producing a path to every rule consuming it.
//! Building the graph enforces the single-producer rule, resolves every input
//! to either an upstream output or an existing file, and rejects cycles.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fs;
use std::time::SystemTime;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::debug;

use crate::error::KiraError;
use crate::rule::Rule;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct JobId(pub usize);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Why a job has to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum StaleReason {
    Forced,
    MissingOutput(Utf8PathBuf),
    NewerInput(Utf8PathBuf),
    Upstream(String),
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleReason::Forced => write!(f, "forced"),
            StaleReason::MissingOutput(path) => write!(f, "missing output {path}"),
            StaleReason::NewerInput(path) => write!(f, "input {path} is newer"),
            StaleReason::Upstream(job) => write!(f, "upstream {job} will run"),
        }
    }
}

#[derive(Debug)]
pub struct Dag {
    rules: Vec<Rule>,
    producers: HashMap<Utf8PathBuf, JobId>,
    upstream: Vec<BTreeSet<JobId>>,
    downstream: Vec<BTreeSet<JobId>>,
}

impl Dag {
    pub fn build(rules: Vec<Rule>) -> Result<Self, KiraError> {
        let mut producers: HashMap<Utf8PathBuf, JobId> = HashMap::new();
        for (index, rule) in rules.iter().enumerate() {
            for path in rule.output_paths() {
                if let Some(first) = producers.insert(path.to_path_buf(), JobId(index)) {
                    return Err(KiraError::DuplicateOutput {
                        path: path.to_string(),
                        first: rules[first.0].id(),
                        second: rule.id(),
                    });
                }
            }
        }

        let mut upstream = vec![BTreeSet::new(); rules.len()];
        let mut downstream = vec![BTreeSet::new(); rules.len()];
        for (index, rule) in rules.iter().enumerate() {
            for input in &rule.inputs {
                match producers.get(input) {
                    Some(&producer) => {
                        upstream[index].insert(producer);
                        downstream[producer.0].insert(JobId(index));
                    }
                    None if input.as_std_path().exists() => {
                        debug!(rule = %rule.id(), path = %input, "raw input");
                    }
                    None => {
                        return Err(KiraError::MissingInput {
                            rule: rule.id(),
                            path: input.to_string(),
                        });
                    }
                }
            }
        }

        let dag = Self {
            rules,
            producers,
            upstream,
            downstream,
        };
        let all: BTreeSet<JobId> = (0..dag.rules.len()).map(JobId).collect();
        let ordered = dag.topological(&all);
        if ordered.len() != all.len() {
            let placed: BTreeSet<JobId> = ordered.into_iter().collect();
            let stuck = all
                .difference(&placed)
                .map(|id| dag.rules[id.0].id())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(KiraError::Cycle(stuck));
        }
        Ok(dag)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rule(&self, id: JobId) -> &Rule {
        &self.rules[id.0]
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn producer(&self, path: &Utf8Path) -> Option<JobId> {
        self.producers.get(path).copied()
    }

    pub fn upstream(&self, id: JobId) -> &BTreeSet<JobId> {
        &self.upstream[id.0]
    }

    pub fn downstream(&self, id: JobId) -> &BTreeSet<JobId> {
        &self.downstream[id.0]
    }

    /// Every job needed to bring `targets` into existence, producers first.
    pub fn required_jobs(&self, targets: &[Utf8PathBuf]) -> Result<Vec<JobId>, KiraError> {
        let mut needed = BTreeSet::new();
        let mut stack = Vec::new();
        for target in targets {
            match self.producers.get(target) {
                Some(&id) => stack.push(id),
                None if target.as_std_path().exists() => {}
                None => {
                    return Err(KiraError::MissingInput {
                        rule: "targets".to_string(),
                        path: target.to_string(),
                    });
                }
            }
        }
        while let Some(id) = stack.pop() {
            if needed.insert(id) {
                stack.extend(self.upstream[id.0].iter().copied());
            }
        }
        Ok(self.topological(&needed))
    }

    /// Jobs from `jobs` that must run, in the given order.
    pub fn outdated(&self, jobs: &[JobId], force: bool) -> Vec<JobId> {
        self.staleness(jobs, force)
            .into_iter()
            .filter_map(|(id, reason)| reason.map(|_| id))
            .collect()
    }

    /// Staleness of each job; `jobs` must be in topological order.
    pub fn staleness(&self, jobs: &[JobId], force: bool) -> Vec<(JobId, Option<StaleReason>)> {
        let mut stale: HashMap<JobId, bool> = HashMap::new();
        let mut result = Vec::with_capacity(jobs.len());
        for &id in jobs {
            let reason = if force {
                Some(StaleReason::Forced)
            } else if let Some(up) = self.upstream[id.0]
                .iter()
                .find(|up| stale.get(*up).copied().unwrap_or(false))
            {
                Some(StaleReason::Upstream(self.rules[up.0].id()))
            } else {
                self.own_staleness(&self.rules[id.0])
            };
            stale.insert(id, reason.is_some());
            result.push((id, reason));
        }
        result
    }

    fn own_staleness(&self, rule: &Rule) -> Option<StaleReason> {
        let mut oldest_output: Option<SystemTime> = None;
        for path in rule.output_paths() {
            match modified(path) {
                Some(time) => {
                    oldest_output = Some(oldest_output.map_or(time, |old| old.min(time)));
                }
                None => return Some(StaleReason::MissingOutput(path.to_path_buf())),
            }
        }
        let oldest_output = oldest_output?;

        rule.inputs
            .iter()
            .filter_map(|input| modified(input).map(|time| (input, time)))
            .max_by_key(|(_, time)| *time)
            .filter(|(_, newest)| *newest > oldest_output)
            .map(|(input, _)| StaleReason::NewerInput(input.clone()))
    }

    /// Kahn's algorithm over `subset`; ready jobs are taken in declaration order.
    fn topological(&self, subset: &BTreeSet<JobId>) -> Vec<JobId> {
        let mut pending: HashMap<JobId, usize> = subset
            .iter()
            .map(|&id| {
                let count = self.upstream[id.0]
                    .iter()
                    .filter(|up| subset.contains(*up))
                    .count();
                (id, count)
            })
            .collect();
        let mut ready: BTreeSet<JobId> = pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| *id)
            .collect();

        let mut order = Vec::with_capacity(subset.len());
        while let Some(id) = ready.pop_first() {
            order.push(id);
            for down in &self.downstream[id.0] {
                if let Some(count) = pending.get_mut(down) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(*down);
                    }
                }
            }
        }
        order
    }
}

fn modified(path: &Utf8Path) -> Option<SystemTime> {
    fs::metadata(path.as_std_path())
        .and_then(|meta| meta.modified())
        .ok()
}
