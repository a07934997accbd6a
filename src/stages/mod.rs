//! Stage registry.
//!
//! A stage is a data record: a name, a predicate deciding whether the
//! configuration enables it, a precondition check, and a planner returning
//! the stage's rules, requested outputs and citations as a value.

pub mod host_removal;
pub mod kaiju;
pub mod metaphlan2;
pub mod metawrap;
pub mod read_qc;

use std::collections::BTreeSet;

use camino::{Utf8Path, Utf8PathBuf};

use crate::citations::CitationSet;
use crate::config::ResolvedConfig;
use crate::domain::{ReadPair, SampleName};
use crate::error::KiraError;
use crate::rule::Rule;
use crate::samples::InputPattern;
use crate::template::{PathTemplate, Wildcards};

/// Conda environment shared by the lightweight tools.
pub const BASE_ENV: &str = "kira-mg";

#[derive(Debug, Clone, Default)]
pub struct StagePlan {
    pub rules: Vec<Rule>,
    pub targets: Vec<Utf8PathBuf>,
    pub citations: CitationSet,
}

impl StagePlan {
    pub fn new() -> Self {
        Self::default()
    }
}

pub trait Stage {
    fn name(&self) -> &'static str;

    fn enabled(&self, config: &ResolvedConfig) -> bool;

    /// Checks preconditions that must hold before anything runs.
    fn validate(&self, _config: &ResolvedConfig) -> Result<(), KiraError> {
        Ok(())
    }

    fn plan(&self, ctx: &StageContext<'_>) -> Result<StagePlan, KiraError>;
}

/// All stages in declaration order.
pub fn registry() -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(read_qc::ReadQc),
        Box::new(host_removal::HostRemoval),
        Box::new(kaiju::KaijuStage),
        Box::new(metaphlan2::Metaphlan2Stage),
        Box::new(metawrap::MetawrapStage),
    ]
}

pub struct StageContext<'a> {
    pub config: &'a ResolvedConfig,
    pub samples: &'a BTreeSet<SampleName>,
    pattern: InputPattern,
}

impl<'a> StageContext<'a> {
    pub fn new(
        config: &'a ResolvedConfig,
        samples: &'a BTreeSet<SampleName>,
    ) -> Result<Self, KiraError> {
        Ok(Self {
            config,
            samples,
            pattern: InputPattern::parse(&config.input_fn_pattern)?,
        })
    }

    /// Renders a template; `{outdir}` and `{logdir}` are always available.
    pub fn path(&self, template: &str, wildcards: &Wildcards) -> Result<Utf8PathBuf, KiraError> {
        let wildcards = wildcards
            .clone()
            .with("outdir", &self.config.outdir)
            .with("logdir", &self.config.logdir);
        PathTemplate::new(template)?.render(&wildcards)
    }

    pub fn raw_reads(&self, sample: &SampleName) -> Result<[Utf8PathBuf; 2], KiraError> {
        Ok([
            self.pattern
                .read_path(&self.config.inputdir, sample, ReadPair::R1)?,
            self.pattern
                .read_path(&self.config.inputdir, sample, ReadPair::R2)?,
        ])
    }

    pub fn trimmed_reads(&self, sample: &SampleName) -> Result<[Utf8PathBuf; 2], KiraError> {
        self.pair(read_qc::TRIMMED_READS, sample)
    }

    pub fn host_filtered_reads(&self, sample: &SampleName) -> Result<[Utf8PathBuf; 2], KiraError> {
        self.pair(host_removal::FILTERED_READS, sample)
    }

    /// Reads after whichever cleaning stages are enabled.
    pub fn clean_reads(&self, sample: &SampleName) -> Result<[Utf8PathBuf; 2], KiraError> {
        if self.config.remove_human {
            self.host_filtered_reads(sample)
        } else if self.config.qc_reads {
            self.trimmed_reads(sample)
        } else {
            self.raw_reads(sample)
        }
    }

    fn pair(&self, template: &str, sample: &SampleName) -> Result<[Utf8PathBuf; 2], KiraError> {
        let base = Wildcards::new().with("sample", sample);
        Ok([
            self.path(template, &base.clone().with("readpair", ReadPair::R1))?,
            self.path(template, &base.with("readpair", ReadPair::R2))?,
        ])
    }
}

pub(crate) fn require_exists(stage: &str, path: &Utf8Path) -> Result<(), KiraError> {
    if path.as_std_path().exists() {
        Ok(())
    } else {
        Err(KiraError::MissingDatabase {
            stage: stage.to_string(),
            path: path.to_string(),
        })
    }
}

pub(crate) fn sample_wildcards(sample: &SampleName) -> Wildcards {
    Wildcards::new().with("sample", sample)
}
