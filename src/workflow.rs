use std::collections::BTreeSet;

use camino::Utf8PathBuf;
use tracing::{debug, info};

use crate::citations::CitationSet;
use crate::config::ResolvedConfig;
use crate::domain::SampleName;
use crate::error::KiraError;
use crate::rule::Rule;
use crate::stages::{self, StageContext};

/// Everything the enabled stages contribute, in registry order.
#[derive(Debug, Clone, Default)]
pub struct WorkflowPlan {
    pub enabled_stages: Vec<&'static str>,
    pub rules: Vec<Rule>,
    pub targets: Vec<Utf8PathBuf>,
    pub citations: CitationSet,
}

pub struct Workflow;

impl Workflow {
    pub fn assemble(
        config: &ResolvedConfig,
        samples: &BTreeSet<SampleName>,
    ) -> Result<WorkflowPlan, KiraError> {
        let ctx = StageContext::new(config, samples)?;
        let mut plan = WorkflowPlan::default();

        for stage in stages::registry() {
            if !stage.enabled(config) {
                debug!(stage = stage.name(), "stage disabled");
                continue;
            }
            stage.validate(config)?;
            let stage_plan = stage.plan(&ctx)?;
            info!(
                stage = stage.name(),
                rules = stage_plan.rules.len(),
                targets = stage_plan.targets.len(),
                "stage planned"
            );
            plan.enabled_stages.push(stage.name());
            plan.rules.extend(stage_plan.rules);
            plan.targets.extend(stage_plan.targets);
            plan.citations = plan.citations.union(stage_plan.citations);
        }

        Ok(plan)
    }
}

impl WorkflowPlan {
    pub fn rules_of(&self, stage: &str) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(move |rule| rule.stage == stage)
    }

    /// Distinct program names across every rule, sorted.
    pub fn programs(&self) -> Result<BTreeSet<String>, KiraError> {
        let mut programs = BTreeSet::new();
        for rule in &self.rules {
            programs.extend(rule.pipeline()?.programs().map(str::to_string));
        }
        Ok(programs)
    }
}
