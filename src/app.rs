use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::config::{ResolvedConfig, default_config};
use crate::dag::Dag;
use crate::domain::{ReadPair, SampleName};
use crate::error::KiraError;
use crate::executor::{self, Executor, RunOptions, RunSummary};
use crate::fs_util;
use crate::samples::{self, InputPattern};
use crate::toolcheck::{self, ToolStatus};
use crate::workflow::{Workflow, WorkflowPlan};

#[derive(Debug, Clone, Serialize)]
pub struct SamplesResult {
    pub inputdir: String,
    pub pattern: String,
    pub samples: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetsResult {
    pub stages: Vec<String>,
    pub targets: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CitationsResult {
    pub stages: Vec<String>,
    pub citations: Vec<Vec<String>>,
    pub rendered: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlannedJob {
    pub job: String,
    pub stage: String,
    pub action: String,
    pub reason: Option<String>,
    pub threads: usize,
    pub conda_env: Option<String>,
    pub command: String,
    pub outputs: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanResult {
    pub stages: Vec<String>,
    pub samples: Vec<String>,
    pub jobs: Vec<PlannedJob>,
}

impl PlanResult {
    pub fn to_run(&self) -> usize {
        self.jobs.iter().filter(|job| job.action == "run").count()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub summary: RunSummary,
    pub citations_path: Option<String>,
    pub summary_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadCheck {
    pub path: String,
    pub ok: bool,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub tools: Vec<ToolStatus>,
    pub reads: Vec<ReadCheck>,
}

impl CheckResult {
    pub fn is_ok(&self) -> bool {
        self.tools.iter().all(ToolStatus::found) && self.reads.iter().all(|read| read.ok)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InitResult {
    pub path: String,
    pub written: bool,
}

#[derive(Debug, Clone, Copy)]
pub enum ProgressSinkKind {
    Plan,
    Run,
    Check,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub cores: usize,
    pub keep_going: bool,
    pub use_conda: bool,
    pub force_all: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct App {
    config: ResolvedConfig,
}

impl App {
    pub fn new(config: ResolvedConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn samples(&self, sink: &dyn ProgressSink) -> Result<SamplesResult, KiraError> {
        let samples = self.discover(sink)?;
        Ok(SamplesResult {
            inputdir: self.config.inputdir.to_string(),
            pattern: self.config.input_fn_pattern.clone(),
            samples: samples.iter().map(ToString::to_string).collect(),
        })
    }

    pub fn targets(&self, sink: &dyn ProgressSink) -> Result<TargetsResult, KiraError> {
        let (plan, _) = self.assemble(sink)?;
        Ok(TargetsResult {
            stages: stage_names(&plan),
            targets: plan.targets.iter().map(ToString::to_string).collect(),
        })
    }

    pub fn citations(&self, sink: &dyn ProgressSink) -> Result<CitationsResult, KiraError> {
        let (plan, _) = self.assemble(sink)?;
        Ok(CitationsResult {
            stages: stage_names(&plan),
            citations: plan
                .citations
                .iter()
                .map(|citation| citation.lines().to_vec())
                .collect(),
            rendered: plan.citations.render(),
        })
    }

    /// Resolves the graph and reports, without running anything, which jobs would run.
    pub fn plan(&self, force_all: bool, sink: &dyn ProgressSink) -> Result<PlanResult, KiraError> {
        let (plan, samples) = self.assemble(sink)?;
        let dag = Dag::build(plan.rules.clone())?;
        let jobs = dag.required_jobs(&plan.targets)?;

        let mut planned = Vec::with_capacity(jobs.len());
        for (id, reason) in dag.staleness(&jobs, force_all) {
            let rule = dag.rule(id);
            planned.push(PlannedJob {
                job: rule.id(),
                stage: rule.stage.clone(),
                action: if reason.is_some() { "run" } else { "up-to-date" }.to_string(),
                reason: reason.map(|reason| reason.to_string()),
                threads: rule.threads,
                conda_env: rule.conda_env.clone(),
                command: rule.pipeline()?.render(),
                outputs: rule.output_paths().map(ToString::to_string).collect(),
            });
        }
        sink.event(ProgressEvent {
            message: format!("phase=Plan; {} jobs resolved", planned.len()),
            elapsed: None,
        });

        Ok(PlanResult {
            stages: stage_names(&plan),
            samples: samples.iter().map(ToString::to_string).collect(),
            jobs: planned,
        })
    }

    pub async fn run(
        &self,
        request: RunRequest,
        sink: &dyn ProgressSink,
    ) -> Result<RunResult, KiraError> {
        let (plan, _) = self.assemble(sink)?;
        let dag = Arc::new(Dag::build(plan.rules.clone())?);
        let jobs = dag.required_jobs(&plan.targets)?;

        let mut options = RunOptions::new(request.cores, self.config.outdir.join(".shadow"));
        options.keep_going = request.keep_going;
        options.use_conda = request.use_conda;
        options.force_all = request.force_all;
        options.dry_run = request.dry_run;

        sink.event(ProgressEvent {
            message: format!(
                "phase=Run; {} jobs required, {} cores",
                jobs.len(),
                options.cores
            ),
            elapsed: None,
        });
        let started = Instant::now();
        let summary = Executor::new(dag, options).run(&jobs).await?;
        sink.event(ProgressEvent {
            message: format!("phase=Run; {} failed", summary.failed()),
            elapsed: Some(started.elapsed()),
        });

        if request.dry_run {
            return Ok(RunResult {
                summary,
                citations_path: None,
                summary_path: None,
            });
        }

        let (citations_path, summary_path) = executor::write_reports(
            &summary,
            &plan.citations,
            &self.config.outdir,
            &self.config.logdir,
        )?;
        Ok(RunResult {
            summary,
            citations_path: Some(citations_path.to_string()),
            summary_path: Some(summary_path.to_string()),
        })
    }

    /// Checks that the programs the plan needs are installed and that every read file parses.
    pub fn check(&self, use_conda: bool, sink: &dyn ProgressSink) -> Result<CheckResult, KiraError> {
        let (plan, samples) = self.assemble(sink)?;

        let programs: Vec<String> = if use_conda {
            vec!["conda".to_string()]
        } else {
            plan.programs()?.into_iter().collect()
        };
        sink.event(ProgressEvent {
            message: format!("phase=Check; looking up {} programs", programs.len()),
            elapsed: None,
        });
        let tools = toolcheck::check_programs(&programs);

        let pattern = InputPattern::parse(&self.config.input_fn_pattern)?;
        let mut reads = Vec::new();
        for sample in &samples {
            for pair in ReadPair::BOTH {
                let path = pattern.read_path(&self.config.inputdir, sample, pair)?;
                let outcome = samples::verify_fastq(&path);
                reads.push(ReadCheck {
                    path: path.to_string(),
                    ok: outcome.is_ok(),
                    message: outcome.err().map(|err| err.to_string()),
                });
            }
        }

        Ok(CheckResult { tools, reads })
    }

    pub fn init_config(
        path: &Utf8Path,
        force: bool,
        sink: &dyn ProgressSink,
    ) -> Result<InitResult, KiraError> {
        if path.as_std_path().exists() && !force {
            sink.event(ProgressEvent {
                message: format!("phase=Init; {path} exists, leaving it untouched"),
                elapsed: None,
            });
            return Ok(InitResult {
                path: path.to_string(),
                written: false,
            });
        }
        let content = serde_json::to_vec_pretty(&default_config())
            .map_err(|err| KiraError::ConfigParse(err.to_string()))?;
        fs_util::write_bytes_atomic(path, &content)?;
        sink.event(ProgressEvent {
            message: format!("phase=Init; wrote {path}"),
            elapsed: None,
        });
        Ok(InitResult {
            path: path.to_string(),
            written: true,
        })
    }

    fn discover(&self, sink: &dyn ProgressSink) -> Result<BTreeSet<SampleName>, KiraError> {
        sink.event(ProgressEvent {
            message: format!("phase=Resolve; scanning {}", self.config.inputdir),
            elapsed: None,
        });
        let pattern = InputPattern::parse(&self.config.input_fn_pattern)?;
        samples::discover(&self.config.inputdir, &pattern)
    }

    fn assemble(
        &self,
        sink: &dyn ProgressSink,
    ) -> Result<(WorkflowPlan, BTreeSet<SampleName>), KiraError> {
        let samples = self.discover(sink)?;
        let started = Instant::now();
        let plan = Workflow::assemble(&self.config, &samples)?;
        sink.event(ProgressEvent {
            message: format!(
                "phase=Plan; {} stages, {} rules, {} targets",
                plan.enabled_stages.len(),
                plan.rules.len(),
                plan.targets.len()
            ),
            elapsed: Some(started.elapsed()),
        });
        Ok((plan, samples))
    }
}

fn stage_names(plan: &WorkflowPlan) -> Vec<String> {
    plan.enabled_stages.iter().map(|name| name.to_string()).collect()
}

/// Default location of the config written by `init`.
pub fn default_config_path() -> Utf8PathBuf {
    Utf8PathBuf::from(crate::config::DEFAULT_CONFIG_FILE)
}
