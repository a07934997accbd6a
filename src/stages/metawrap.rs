use crate::citations;
use crate::config::ResolvedConfig;
use crate::error::KiraError;
use crate::rule::Rule;
use crate::tools::{
    Decompress, MetawrapAssembly, MetawrapBinRefinement, MetawrapBinning, MetawrapBlobology,
    MetawrapQuantBins,
};

use super::{BASE_ENV, Stage, StageContext, StagePlan, sample_wildcards};

pub const NAME: &str = "metawrap";
const ENV: &str = "metawrap";

const READS: &str = "{outdir}/metawrap/reads/{sample}_{readpair}.fastq";
const ASSEMBLY: &str = "{outdir}/metawrap/assembly/{sample}/final_assembly.fasta";
const BINS: &str = "{outdir}/metawrap/binning/{sample}/{binner}_bins";
const REFINED: &str =
    "{outdir}/metawrap/bin_refinement/{sample}/metawrap_{completeness}_{contamination}_bins";
const ABUNDANCE: &str = "{outdir}/metawrap/quant_bins/{sample}/bin_abundance_table.tab";
const BLOBOLOGY: &str = "{outdir}/metawrap/blobology/{sample}";

const BINNERS: [&str; 3] = ["metabat2", "maxbin2", "concoct"];

/// MEGAHIT assembly and MetaBAT2/MaxBin2/CONCOCT binning through MetaWRAP.
pub struct MetawrapStage;

impl Stage for MetawrapStage {
    fn name(&self) -> &'static str {
        NAME
    }

    fn enabled(&self, config: &ResolvedConfig) -> bool {
        config.assembly
    }

    fn plan(&self, ctx: &StageContext<'_>) -> Result<StagePlan, KiraError> {
        let mut plan = StagePlan::new();
        let params = &ctx.config.metawrap;

        for sample in ctx.samples {
            let by_sample = sample_wildcards(sample);
            let clean = ctx.clean_reads(sample)?;

            // metawrap only accepts uncompressed reads named *_1.fastq / *_2.fastq
            let mut reads = Vec::with_capacity(2);
            for (index, compressed) in clean.iter().enumerate() {
                let wildcards = by_sample.clone().with("readpair", index + 1);
                let read = ctx.path(READS, &wildcards)?;
                plan.rules.push(
                    Rule::new("metawrap_reads", NAME, Decompress)
                        .wildcards(wildcards.clone())
                        .input(compressed.clone())
                        .output(read.clone())
                        .log(ctx.path("{logdir}/metawrap/reads/{sample}_{readpair}.log", &wildcards)?)
                        .conda(BASE_ENV),
                );
                reads.push(read);
            }

            let assembly = ctx.path(ASSEMBLY, &by_sample)?;
            plan.rules.push(
                Rule::new(
                    "metawrap_assembly",
                    NAME,
                    MetawrapAssembly {
                        params: params.clone(),
                    },
                )
                .wildcards(by_sample.clone())
                .inputs(reads.clone())
                .output(assembly.clone())
                .log(ctx.path("{logdir}/metawrap/assembly/{sample}.log", &by_sample)?)
                .threads(params.threads)
                .conda(ENV),
            );

            let bins = BINNERS
                .iter()
                .map(|binner| ctx.path(BINS, &by_sample.clone().with("binner", binner)))
                .collect::<Result<Vec<_>, KiraError>>()?;
            let mut binning = Rule::new(
                "metawrap_binning",
                NAME,
                MetawrapBinning {
                    params: params.clone(),
                },
            )
            .wildcards(by_sample.clone())
            .input(assembly.clone())
            .inputs(reads.clone())
            .log(ctx.path("{logdir}/metawrap/binning/{sample}.log", &by_sample)?)
            .threads(params.threads)
            .conda(ENV);
            for dir in &bins {
                binning = binning.output_dir(dir.clone());
            }
            plan.rules.push(binning);

            let refined = ctx.path(
                REFINED,
                &by_sample
                    .clone()
                    .with("completeness", params.completeness)
                    .with("contamination", params.contamination),
            )?;
            plan.rules.push(
                Rule::new(
                    "metawrap_bin_refinement",
                    NAME,
                    MetawrapBinRefinement {
                        params: params.clone(),
                    },
                )
                .wildcards(by_sample.clone())
                .inputs(bins)
                .output_dir(refined.clone())
                .log(ctx.path("{logdir}/metawrap/bin_refinement/{sample}.log", &by_sample)?)
                .threads(params.threads)
                .conda(ENV),
            );

            let abundance = ctx.path(ABUNDANCE, &by_sample)?;
            plan.rules.push(
                Rule::new("metawrap_quant_bins", NAME, MetawrapQuantBins)
                    .wildcards(by_sample.clone())
                    .input(refined.clone())
                    .input(assembly.clone())
                    .inputs(reads.clone())
                    .output(abundance.clone())
                    .log(ctx.path("{logdir}/metawrap/quant_bins/{sample}.log", &by_sample)?)
                    .threads(params.threads)
                    .conda(ENV),
            );

            let blobology = ctx.path(BLOBOLOGY, &by_sample)?;
            plan.rules.push(
                Rule::new("metawrap_blobology", NAME, MetawrapBlobology)
                    .wildcards(by_sample.clone())
                    .input(assembly)
                    .input(refined.clone())
                    .inputs(reads)
                    .output_dir(blobology.clone())
                    .log(ctx.path("{logdir}/metawrap/blobology/{sample}.log", &by_sample)?)
                    .threads(params.threads)
                    .conda(ENV),
            );

            plan.targets.extend([abundance, refined, blobology]);
        }

        plan.citations.extend([
            citations::metawrap(),
            citations::megahit(),
            citations::metabat2(),
            citations::maxbin2(),
            citations::concoct(),
            citations::blobology(),
        ]);
        Ok(plan)
    }
}
