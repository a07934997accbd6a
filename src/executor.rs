//! Runs the jobs of a [`Dag`] as operating-system processes.
//!
//! Jobs start as soon as every upstream job has completed and enough of the
//! core budget is free. A failed job takes its downstream jobs with it; the
//! rest of the graph keeps going only when `keep_going` is set.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fs;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tokio::process::{Child, Command};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::citations::CitationSet;
use crate::dag::{Dag, JobId};
use crate::error::KiraError;
use crate::fs_util;
use crate::rule::{CommandPipeline, CommandSpec, Output, Rule, RuleIo, Shadow};

pub const CITATIONS_FILE: &str = "citations.rst";
pub const SUMMARY_FILE: &str = "run_summary.json";

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub cores: usize,
    pub keep_going: bool,
    pub use_conda: bool,
    pub dry_run: bool,
    pub force_all: bool,
    /// Parent of per-job scratch directories for shadowed rules.
    pub shadow_root: Utf8PathBuf,
}

impl RunOptions {
    pub fn new(cores: usize, shadow_root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            cores: cores.max(1),
            keep_going: false,
            use_conda: false,
            dry_run: false,
            force_all: false,
            shadow_root: shadow_root.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum JobStatus {
    Completed,
    Failed(String),
    /// Not started because an upstream job failed or the run was halted.
    Skipped,
    UpToDate,
    /// Would run; only reported by dry runs.
    Planned(String),
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed(message) => write!(f, "failed: {message}"),
            JobStatus::Skipped => write!(f, "skipped"),
            JobStatus::UpToDate => write!(f, "up-to-date"),
            JobStatus::Planned(reason) => write!(f, "run ({reason})"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job: String,
    pub stage: String,
    pub log: Utf8PathBuf,
    #[serde(flatten)]
    pub status: JobStatus,
    pub elapsed_secs: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: String,
    pub finished_at: String,
    pub cores: usize,
    pub dry_run: bool,
    pub jobs: Vec<JobReport>,
}

impl RunSummary {
    pub fn count(&self, matches: impl Fn(&JobStatus) -> bool) -> usize {
        self.jobs.iter().filter(|job| matches(&job.status)).count()
    }

    pub fn failed(&self) -> usize {
        self.count(|status| matches!(status, JobStatus::Failed(_)))
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.count(|status| *status == JobStatus::Skipped) == 0
    }
}

/// Writes `citations.rst` under `outdir` and `run_summary.json` under `logdir`.
pub fn write_reports(
    summary: &RunSummary,
    citations: &CitationSet,
    outdir: &Utf8Path,
    logdir: &Utf8Path,
) -> Result<(Utf8PathBuf, Utf8PathBuf), KiraError> {
    let citations_path = outdir.join(CITATIONS_FILE);
    fs_util::write_bytes_atomic(&citations_path, citations.render().as_bytes())?;

    let summary_path = logdir.join(SUMMARY_FILE);
    let content = serde_json::to_vec_pretty(summary)
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    fs_util::write_bytes_atomic(&summary_path, &content)?;
    Ok((citations_path, summary_path))
}

enum Outcome {
    NotStarted,
    Finished {
        result: Result<(), KiraError>,
        elapsed: Duration,
    },
}

pub struct Executor {
    dag: Arc<Dag>,
    options: RunOptions,
}

impl Executor {
    pub fn new(dag: Arc<Dag>, options: RunOptions) -> Self {
        Self { dag, options }
    }

    /// Runs `jobs`, which must be in topological order.
    pub async fn run(&self, jobs: &[JobId]) -> Result<RunSummary, KiraError> {
        let started_at = fs_util::iso_timestamp();
        let mut statuses: HashMap<JobId, JobStatus> = HashMap::new();
        let mut elapsed: HashMap<JobId, Duration> = HashMap::new();
        let mut to_run = BTreeSet::new();

        for (id, reason) in self.dag.staleness(jobs, self.options.force_all) {
            match reason {
                None => {
                    statuses.insert(id, JobStatus::UpToDate);
                }
                Some(reason) if self.options.dry_run => {
                    statuses.insert(id, JobStatus::Planned(reason.to_string()));
                }
                Some(reason) => {
                    debug!(job = %self.dag.rule(id).id(), %reason, "job outdated");
                    to_run.insert(id);
                }
            }
        }

        if !to_run.is_empty() {
            info!(jobs = to_run.len(), cores = self.options.cores, "starting jobs");
            self.schedule(&to_run, &mut statuses, &mut elapsed).await?;
        }

        let reports = jobs
            .iter()
            .map(|id| {
                let rule = self.dag.rule(*id);
                JobReport {
                    job: rule.id(),
                    stage: rule.stage.clone(),
                    log: rule.log.clone(),
                    status: statuses.remove(id).unwrap_or(JobStatus::Skipped),
                    elapsed_secs: elapsed.get(id).map(Duration::as_secs_f64),
                }
            })
            .collect();

        Ok(RunSummary {
            started_at,
            finished_at: fs_util::iso_timestamp(),
            cores: self.options.cores,
            dry_run: self.options.dry_run,
            jobs: reports,
        })
    }

    async fn schedule(
        &self,
        to_run: &BTreeSet<JobId>,
        statuses: &mut HashMap<JobId, JobStatus>,
        elapsed: &mut HashMap<JobId, Duration>,
    ) -> Result<(), KiraError> {
        let shadow_root = fs_util::absolute(&self.options.shadow_root)?;
        let semaphore = Arc::new(Semaphore::new(self.options.cores));
        let mut waiting: HashMap<JobId, usize> = to_run
            .iter()
            .map(|&id| {
                let count = self
                    .dag
                    .upstream(id)
                    .iter()
                    .filter(|up| to_run.contains(*up))
                    .count();
                (id, count)
            })
            .collect();
        let mut ready: BTreeSet<JobId> = waiting
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut running = JoinSet::new();
        let mut halted = false;

        loop {
            while !halted {
                let Some(id) = ready.pop_first() else { break };
                let rule = self.dag.rule(id).clone();
                let permits = rule.threads.min(self.options.cores) as u32;
                let semaphore = semaphore.clone();
                let use_conda = self.options.use_conda;
                let shadow_root = shadow_root.clone();
                running.spawn(async move {
                    let Ok(permit) = semaphore.acquire_many_owned(permits).await else {
                        return (id, Outcome::NotStarted, None);
                    };
                    info!(job = %rule.id(), threads = permits, "job started");
                    let started = Instant::now();
                    let result = execute(&rule, use_conda, &shadow_root).await;
                    let elapsed = started.elapsed();
                    (id, Outcome::Finished { result, elapsed }, Some(permit))
                });
            }

            let Some(joined) = running.join_next().await else {
                break;
            };
            // the permit is released only after a failure has closed the semaphore
            let (id, outcome, _permit) =
                joined.map_err(|err| KiraError::Runtime(err.to_string()))?;
            let job = self.dag.rule(id).id();
            match outcome {
                Outcome::NotStarted => {
                    statuses.insert(id, JobStatus::Skipped);
                }
                Outcome::Finished {
                    result: Ok(()),
                    elapsed: took,
                } => {
                    info!(job = %job, elapsed_secs = took.as_secs_f64(), "job completed");
                    statuses.insert(id, JobStatus::Completed);
                    elapsed.insert(id, took);
                    for down in self.dag.downstream(id) {
                        if let Some(count) = waiting.get_mut(down) {
                            *count -= 1;
                            if *count == 0 {
                                ready.insert(*down);
                            }
                        }
                    }
                }
                Outcome::Finished {
                    result: Err(err),
                    elapsed: took,
                } => {
                    error!(job = %job, log = %self.dag.rule(id).log, "{err}");
                    statuses.insert(id, JobStatus::Failed(err.to_string()));
                    elapsed.insert(id, took);
                    if !self.options.keep_going && !halted {
                        warn!("halting: no new jobs will start");
                        halted = true;
                        semaphore.close();
                    }
                }
            }
        }
        Ok(())
    }
}

/// Runs one job to completion, leaving either every declared output or none.
async fn execute(rule: &Rule, use_conda: bool, shadow_root: &Utf8Path) -> Result<(), KiraError> {
    fs_util::ensure_parent(&rule.log)?;
    for output in &rule.outputs {
        fs_util::remove_path(output.path())?;
        fs_util::ensure_parent(output.path())?;
    }

    let result = match rule.shadow {
        Shadow::None => run_in_place(rule, use_conda).await,
        Shadow::Shallow => run_shadowed(rule, use_conda, shadow_root).await,
    }
    .and_then(|()| finish_outputs(rule));

    if result.is_err() {
        for output in &rule.outputs {
            if let Err(err) = fs_util::remove_path(output.path()) {
                warn!(job = %rule.id(), "{err}");
            }
        }
    }
    result
}

async fn run_in_place(rule: &Rule, use_conda: bool) -> Result<(), KiraError> {
    let pipeline = rule.pipeline()?;
    run_pipeline(rule, &pipeline, None, use_conda).await
}

async fn run_shadowed(rule: &Rule, use_conda: bool, shadow_root: &Utf8Path) -> Result<(), KiraError> {
    fs::create_dir_all(shadow_root.as_std_path())
        .map_err(|err| KiraError::Filesystem(format!("create {shadow_root}: {err}")))?;
    let scratch = tempfile::Builder::new()
        .prefix("job-")
        .tempdir_in(shadow_root.as_std_path())
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    let scratch_path = Utf8PathBuf::from_path_buf(scratch.path().to_path_buf())
        .map_err(|_| KiraError::Filesystem("scratch directory is not UTF-8".to_string()))?;

    let mut moves = Vec::new();
    let mut outputs = Vec::with_capacity(rule.outputs.len());
    for output in &rule.outputs {
        let target = fs_util::absolute(output.path())?;
        match output {
            Output::File(_) => {
                let staged = scratch_path.join(relative_form(&target));
                fs_util::ensure_parent(&staged)?;
                outputs.push(staged.clone());
                moves.push((staged, output.path().to_path_buf()));
            }
            Output::Directory(_) => outputs.push(target),
        }
    }
    let io = RuleIo {
        rule: rule.id(),
        inputs: rule
            .inputs
            .iter()
            .map(|input| fs_util::absolute(input))
            .collect::<Result<Vec<_>, KiraError>>()?,
        outputs,
        threads: rule.threads,
    };

    let pipeline = rule.tool.pipeline(&io)?;
    run_pipeline(rule, &pipeline, Some(&scratch_path), use_conda).await?;

    for (staged, target) in moves {
        if staged.as_std_path().exists() {
            fs_util::move_into_place(&staged, &target)?;
        }
    }
    Ok(())
}

/// `/a/b/c` becomes `a/b/c`, so outputs keep their layout inside scratch.
fn relative_form(path: &Utf8Path) -> Utf8PathBuf {
    path.components()
        .filter(|component| matches!(component, Utf8Component::Normal(_)))
        .collect()
}

fn finish_outputs(rule: &Rule) -> Result<(), KiraError> {
    for output in &rule.outputs {
        let path = output.path();
        if path.as_std_path().exists() {
            continue;
        }
        if rule.tolerate_empty && !output.is_dir() {
            debug!(job = %rule.id(), path = %path, "creating empty output");
            fs_util::touch(path)?;
            continue;
        }
        return Err(KiraError::MissingOutput {
            job: rule.id(),
            path: path.to_string(),
        });
    }
    Ok(())
}

async fn run_pipeline(
    rule: &Rule,
    pipeline: &CommandPipeline,
    workdir: Option<&Utf8Path>,
    use_conda: bool,
) -> Result<(), KiraError> {
    let job = rule.id();
    let mut log = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(rule.log.as_std_path())
        .map_err(|err| KiraError::Filesystem(format!("open log {}: {err}", rule.log)))?;
    {
        use std::io::Write;
        writeln!(log, "# {} {job}\n# {}", fs_util::iso_timestamp(), pipeline.render())
            .map_err(|err| KiraError::Filesystem(format!("write log {}: {err}", rule.log)))?;
    }
    let env = if use_conda { rule.conda_env.as_deref() } else { None };

    let mut children: Vec<(String, Child)> = Vec::with_capacity(pipeline.commands.len());
    let last = pipeline.commands.len().saturating_sub(1);
    for (index, spec) in pipeline.commands.iter().enumerate() {
        let mut command = build_command(spec, env);
        command
            .kill_on_drop(true)
            .stderr(log_handle(&log, &rule.log)?);
        if let Some(dir) = workdir {
            command.current_dir(dir.as_std_path());
        }

        if let Some((_, previous)) = children.last_mut() {
            let stdout = previous.stdout.take().ok_or_else(|| KiraError::ToolSpawn {
                program: spec.program.clone(),
                message: "upstream stdout unavailable".to_string(),
            })?;
            let stdin: Stdio = stdout.try_into().map_err(|err: std::io::Error| {
                KiraError::ToolSpawn {
                    program: spec.program.clone(),
                    message: err.to_string(),
                }
            })?;
            command.stdin(stdin);
        } else {
            command.stdin(Stdio::null());
        }

        if index < last {
            command.stdout(Stdio::piped());
        } else if let Some(path) = &pipeline.stdout {
            let file = fs::File::create(path.as_std_path())
                .map_err(|err| KiraError::Filesystem(format!("create {path}: {err}")))?;
            command.stdout(file);
        } else {
            command.stdout(log_handle(&log, &rule.log)?);
        }

        let child = command.spawn().map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => KiraError::MissingTool(spec.program.clone()),
            _ => KiraError::ToolSpawn {
                program: spec.program.clone(),
                message: err.to_string(),
            },
        })?;
        children.push((spec.program.clone(), child));
    }

    let mut statuses = Vec::with_capacity(children.len());
    for (program, mut child) in children {
        let status = child.wait().await.map_err(|err| KiraError::JobFailed {
            job: job.clone(),
            message: format!("waiting for {program}: {err}"),
        })?;
        statuses.push((program, status));
    }

    let failure = if rule.pipefail {
        statuses.iter().find(|(_, status)| !status.success())
    } else {
        statuses.last().filter(|(_, status)| !status.success())
    };
    match failure {
        Some((program, status)) => Err(KiraError::JobFailed {
            job,
            message: format!("{program} exited with {status}"),
        }),
        None => Ok(()),
    }
}

fn build_command(spec: &CommandSpec, conda_env: Option<&str>) -> Command {
    match conda_env {
        Some(env) => {
            let mut command = Command::new("conda");
            command
                .args(["run", "--no-capture-output", "--name", env])
                .arg(&spec.program)
                .args(&spec.args);
            command
        }
        None => {
            let mut command = Command::new(&spec.program);
            command.args(&spec.args);
            command
        }
    }
}

fn log_handle(log: &fs::File, path: &Utf8Path) -> Result<Stdio, KiraError> {
    log.try_clone()
        .map(Stdio::from)
        .map_err(|err| KiraError::Filesystem(format!("log {path}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_form_drops_root() {
        assert_eq!(
            relative_form(Utf8Path::new("/data/out/fastqc/s1_R1_fastqc.zip")),
            Utf8PathBuf::from("data/out/fastqc/s1_R1_fastqc.zip")
        );
        assert_eq!(
            relative_form(Utf8Path::new("out/a.txt")),
            Utf8PathBuf::from("out/a.txt")
        );
    }

    #[test]
    fn summary_counts_failures() {
        let report = |status| JobReport {
            job: "j".to_string(),
            stage: "s".to_string(),
            log: Utf8PathBuf::from("j.log"),
            status,
            elapsed_secs: None,
        };
        let summary = RunSummary {
            started_at: String::new(),
            finished_at: String::new(),
            cores: 1,
            dry_run: false,
            jobs: vec![
                report(JobStatus::Completed),
                report(JobStatus::Failed("boom".to_string())),
                report(JobStatus::Skipped),
            ],
        };
        assert_eq!(summary.failed(), 1);
        assert!(!summary.is_success());
    }
}
