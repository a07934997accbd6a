use crate::citations;
use crate::config::ResolvedConfig;
use crate::error::KiraError;
use crate::rule::Rule;
use crate::template::Wildcards;
use crate::tools::{Kaiju, Kaiju2Krona, Kaiju2Table, KronaImportText};

use super::{BASE_ENV, Stage, StageContext, StagePlan, require_exists, sample_wildcards};

pub const NAME: &str = "kaiju";

const ASSIGNMENTS: &str = "{outdir}/kaiju/{sample}.kaiju";
const KRONA_TEXT: &str = "{outdir}/kaiju/{sample}.krona";
const KRONA_HTML: &str = "{outdir}/kaiju/all_samples.kaiju.krona.html";
const REPORT: &str = "{outdir}/kaiju/all_samples.kaiju.{level}.txt";

/// Protein-level read classification with Kaiju, Krona charts and rank tables.
pub struct KaijuStage;

impl Stage for KaijuStage {
    fn name(&self) -> &'static str {
        NAME
    }

    fn enabled(&self, config: &ResolvedConfig) -> bool {
        config.taxonomic_profile.kaiju
    }

    fn validate(&self, config: &ResolvedConfig) -> Result<(), KiraError> {
        require_exists(NAME, &config.kaiju.db)?;
        require_exists(NAME, &config.kaiju.nodes)?;
        require_exists(NAME, &config.kaiju.names)
    }

    fn plan(&self, ctx: &StageContext<'_>) -> Result<StagePlan, KiraError> {
        let mut plan = StagePlan::new();
        let params = &ctx.config.kaiju;
        let mut assignments = Vec::new();
        let mut krona_inputs = Vec::new();
        let mut labels = Vec::new();

        for sample in ctx.samples {
            let wildcards = sample_wildcards(sample);
            let assigned = ctx.path(ASSIGNMENTS, &wildcards)?;
            let krona = ctx.path(KRONA_TEXT, &wildcards)?;

            plan.rules.push(
                Rule::new(
                    "kaiju",
                    NAME,
                    Kaiju {
                        params: params.clone(),
                    },
                )
                .wildcards(wildcards.clone())
                .inputs(ctx.clean_reads(sample)?)
                .output(assigned.clone())
                .log(ctx.path("{logdir}/kaiju/{sample}.kaiju.log", &wildcards)?)
                .threads(params.threads)
                .conda(BASE_ENV),
            );
            plan.rules.push(
                Rule::new(
                    "kaiju2krona",
                    NAME,
                    Kaiju2Krona {
                        params: params.clone(),
                    },
                )
                .wildcards(wildcards.clone())
                .input(assigned.clone())
                .output(krona.clone())
                .log(ctx.path("{logdir}/kaiju/{sample}.kaiju2krona.log", &wildcards)?)
                .conda(BASE_ENV),
            );

            assignments.push(assigned);
            krona_inputs.push(krona);
            labels.push(sample.to_string());
        }

        let html = ctx.path(KRONA_HTML, &Wildcards::new())?;
        plan.rules.push(
            Rule::new("kaiju_krona", NAME, KronaImportText { labels })
                .inputs(krona_inputs)
                .output(html.clone())
                .log(ctx.path("{logdir}/kaiju/all_samples.krona.log", &Wildcards::new())?)
                .conda(BASE_ENV),
        );
        plan.targets.push(html);

        for rank in &params.levels {
            let wildcards = Wildcards::new().with("level", rank);
            let report = ctx.path(REPORT, &wildcards)?;
            plan.rules.push(
                Rule::new(
                    "kaiju_report",
                    NAME,
                    Kaiju2Table {
                        params: params.clone(),
                        rank: *rank,
                    },
                )
                .wildcards(wildcards.clone())
                .inputs(assignments.clone())
                .output(report.clone())
                .log(ctx.path("{logdir}/kaiju/all_samples.{level}.log", &wildcards)?)
                .conda(BASE_ENV),
            );
            plan.targets.push(report);
        }

        plan.citations
            .extend([citations::kaiju(), citations::krona()]);
        Ok(plan)
    }
}
