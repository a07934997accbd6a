use crate::citations;
use crate::config::ResolvedConfig;
use crate::error::KiraError;
use crate::rule::{Rule, Shadow};
use crate::tools::BbmapHuman;

use super::{BASE_ENV, Stage, StageContext, StagePlan, require_exists, sample_wildcards};

pub const NAME: &str = "host_removal";
pub const FILTERED_READS: &str =
    "{outdir}/filtered_human/{sample}_R{readpair}.filtered_human.fq.gz";
const HUMAN_READS: &str = "{outdir}/filtered_human/{sample}.human.fq.gz";

/// Maps reads against hg19 with BBMap and keeps the unmapped pairs.
pub struct HostRemoval;

impl Stage for HostRemoval {
    fn name(&self) -> &'static str {
        NAME
    }

    fn enabled(&self, config: &ResolvedConfig) -> bool {
        config.remove_human
    }

    fn validate(&self, config: &ResolvedConfig) -> Result<(), KiraError> {
        require_exists(NAME, &config.host_removal.hg19_path)
    }

    fn plan(&self, ctx: &StageContext<'_>) -> Result<StagePlan, KiraError> {
        let mut plan = StagePlan::new();
        let params = &ctx.config.host_removal;

        for sample in ctx.samples {
            let wildcards = sample_wildcards(sample);
            let reads = if ctx.config.qc_reads {
                ctx.trimmed_reads(sample)?
            } else {
                ctx.raw_reads(sample)?
            };
            let filtered = ctx.host_filtered_reads(sample)?;
            let human = ctx.path(HUMAN_READS, &wildcards)?;

            plan.rules.push(
                Rule::new(
                    "remove_human",
                    NAME,
                    BbmapHuman {
                        params: params.clone(),
                    },
                )
                .wildcards(wildcards.clone())
                .inputs(reads)
                .outputs(filtered.clone())
                .output(human)
                .log(ctx.path("{logdir}/remove_human/{sample}.log", &wildcards)?)
                .threads(params.threads)
                .conda(BASE_ENV)
                .shadow(Shadow::Shallow),
            );
            plan.targets.extend(filtered);
        }

        plan.citations.insert(citations::bbmap());
        Ok(plan)
    }
}
