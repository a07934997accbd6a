use crate::citations;
use crate::config::ResolvedConfig;
use crate::domain::ReadPair;
use crate::error::KiraError;
use crate::rule::{Rule, Shadow};
use crate::template::Wildcards;
use crate::tools::{Bbduk, FastQc, fastqc};

use super::{BASE_ENV, Stage, StageContext, StagePlan, sample_wildcards};

pub const NAME: &str = "read_qc";
pub const TRIMMED_READS: &str = "{outdir}/trimmed_qa/{sample}_R{readpair}.trimmed.fq.gz";

const FASTQC_DIR: &str = "{outdir}/fastqc";
const FASTQC_TRIMMED_DIR: &str = "{outdir}/fastqc_trimmed";
const FASTQC_THREADS: usize = 2;

/// FastQC on raw reads, BBDuk adapter/quality trimming, FastQC on trimmed reads.
pub struct ReadQc;

impl Stage for ReadQc {
    fn name(&self) -> &'static str {
        NAME
    }

    fn enabled(&self, config: &ResolvedConfig) -> bool {
        config.qc_reads
    }

    fn plan(&self, ctx: &StageContext<'_>) -> Result<StagePlan, KiraError> {
        let mut plan = StagePlan::new();
        let no_wildcards = Wildcards::new();
        let raw_dir = ctx.path(FASTQC_DIR, &no_wildcards)?;
        let trimmed_dir = ctx.path(FASTQC_TRIMMED_DIR, &no_wildcards)?;

        for sample in ctx.samples {
            let raw = ctx.raw_reads(sample)?;
            let trimmed = ctx.trimmed_reads(sample)?;
            let by_sample = sample_wildcards(sample);

            for (pair, read) in ReadPair::BOTH.iter().zip(&raw) {
                let wildcards = by_sample.clone().with("readpair", pair);
                let (zip, html) = fastqc::report_paths(read, &raw_dir);
                plan.rules.push(
                    Rule::new("fastqc", NAME, FastQc)
                        .wildcards(wildcards.clone())
                        .input(read.clone())
                        .output(zip.clone())
                        .output(html.clone())
                        .log(ctx.path("{logdir}/fastqc/{sample}_R{readpair}.log", &wildcards)?)
                        .threads(FASTQC_THREADS)
                        .conda(BASE_ENV)
                        .shadow(Shadow::Shallow),
                );
                plan.targets.extend([zip, html]);
            }

            plan.rules.push(
                Rule::new(
                    "bbduk_trim",
                    NAME,
                    Bbduk {
                        params: ctx.config.bbduk.clone(),
                    },
                )
                .wildcards(by_sample.clone())
                .inputs(raw.clone())
                .outputs(trimmed.clone())
                .log(ctx.path("{logdir}/bbduk/{sample}.log", &by_sample)?)
                .threads(ctx.config.bbduk.threads)
                .conda(BASE_ENV),
            );

            for (pair, read) in ReadPair::BOTH.iter().zip(&trimmed) {
                let wildcards = by_sample.clone().with("readpair", pair);
                let (zip, html) = fastqc::report_paths(read, &trimmed_dir);
                plan.rules.push(
                    Rule::new("fastqc_trimmed", NAME, FastQc)
                        .wildcards(wildcards.clone())
                        .input(read.clone())
                        .output(zip.clone())
                        .output(html.clone())
                        .log(ctx.path(
                            "{logdir}/fastqc_trimmed/{sample}_R{readpair}.log",
                            &wildcards,
                        )?)
                        .threads(FASTQC_THREADS)
                        .conda(BASE_ENV)
                        .shadow(Shadow::Shallow),
                );
                plan.targets.extend([zip, html]);
            }
        }

        plan.citations.extend([citations::fastqc(), citations::bbmap()]);
        Ok(plan)
    }
}
