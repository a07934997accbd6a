use crate::citations;
use crate::config::ResolvedConfig;
use crate::error::KiraError;
use crate::rule::{Rule, Shadow};
use crate::template::Wildcards;
use crate::tools::{
    KronaImportText, MergeMetaphlanTables, Metaphlan2, Metaphlan2Krona, MetaphlanHeatmap,
};

use super::{BASE_ENV, Stage, StageContext, StagePlan, require_exists, sample_wildcards};

pub const NAME: &str = "metaphlan2";
const ENV: &str = "metaphlan2";

const PROFILE: &str = "{outdir}/metaphlan2/{sample}.metaphlan2.txt";
const BOWTIE2_HITS: &str = "{outdir}/metaphlan2/{sample}.bowtie2.bz2";
const KRONA_TEXT: &str = "{outdir}/metaphlan2/{sample}.metaphlan2.krona";
const COMBINED: &str = "{outdir}/metaphlan2/all_samples.metaphlan2.txt";
const HEATMAP: &str = "{outdir}/metaphlan2/all_samples.metaphlan2.{level}.top{top}.pdf";
const KRONA_HTML: &str = "{outdir}/metaphlan2/all_samples.metaphlan2.krona.html";

/// MetaPhlAn2 profiles per sample, a merged table, heatmaps and a Krona chart.
pub struct Metaphlan2Stage;

impl Stage for Metaphlan2Stage {
    fn name(&self) -> &'static str {
        NAME
    }

    fn enabled(&self, config: &ResolvedConfig) -> bool {
        config.taxonomic_profile.metaphlan2
    }

    fn validate(&self, config: &ResolvedConfig) -> Result<(), KiraError> {
        require_exists(NAME, &config.metaphlan2.mpa_pkl)?;
        let db_dir = config
            .metaphlan2
            .bt2_db_prefix
            .parent()
            .filter(|dir| !dir.as_str().is_empty())
            .unwrap_or(camino::Utf8Path::new("."));
        require_exists(NAME, db_dir)
    }

    fn plan(&self, ctx: &StageContext<'_>) -> Result<StagePlan, KiraError> {
        let mut plan = StagePlan::new();
        let params = &ctx.config.metaphlan2;
        let mut profiles = Vec::new();
        let mut krona_inputs = Vec::new();
        let mut labels = Vec::new();

        for sample in ctx.samples {
            let wildcards = sample_wildcards(sample);
            let profile = ctx.path(PROFILE, &wildcards)?;
            let krona = ctx.path(KRONA_TEXT, &wildcards)?;

            plan.rules.push(
                Rule::new(
                    "metaphlan2",
                    NAME,
                    Metaphlan2 {
                        params: params.clone(),
                    },
                )
                .wildcards(wildcards.clone())
                .inputs(ctx.clean_reads(sample)?)
                .output(profile.clone())
                .output(ctx.path(BOWTIE2_HITS, &wildcards)?)
                .log(ctx.path("{logdir}/metaphlan2/{sample}.metaphlan2.log", &wildcards)?)
                .threads(params.threads)
                .conda(ENV)
                .shadow(Shadow::Shallow),
            );
            plan.rules.push(
                Rule::new("metaphlan2_krona", NAME, Metaphlan2Krona)
                    .wildcards(wildcards.clone())
                    .input(profile.clone())
                    .output(krona.clone())
                    .log(ctx.path("{logdir}/metaphlan2/{sample}.krona.log", &wildcards)?)
                    .conda(ENV)
                    .tolerate_empty(),
            );

            profiles.push(profile);
            krona_inputs.push(krona);
            labels.push(sample.to_string());
        }

        let combined = ctx.path(COMBINED, &Wildcards::new())?;
        plan.rules.push(
            Rule::new("combine_metaphlan2_tables", NAME, MergeMetaphlanTables)
                .inputs(profiles)
                .output(combined.clone())
                .log(ctx.path("{logdir}/metaphlan2/combine_tables.log", &Wildcards::new())?)
                .conda(ENV),
        );
        plan.targets.push(combined.clone());

        for level in &params.heatmap.levels {
            let wildcards = Wildcards::new()
                .with("level", level)
                .with("top", params.heatmap.top);
            let heatmap = ctx.path(HEATMAP, &wildcards)?;
            plan.rules.push(
                Rule::new(
                    "metaphlan2_heatmap",
                    NAME,
                    MetaphlanHeatmap {
                        params: params.heatmap.clone(),
                        level: *level,
                    },
                )
                .wildcards(wildcards.clone())
                .input(combined.clone())
                .output(heatmap.clone())
                .log(ctx.path("{logdir}/metaphlan2/heatmap.{level}.top{top}.log", &wildcards)?)
                .conda(ENV),
            );
            plan.targets.push(heatmap);
        }

        let html = ctx.path(KRONA_HTML, &Wildcards::new())?;
        plan.rules.push(
            Rule::new("metaphlan2_krona_html", NAME, KronaImportText { labels })
                .inputs(krona_inputs)
                .output(html.clone())
                .log(ctx.path("{logdir}/metaphlan2/krona_html.log", &Wildcards::new())?)
                .conda(BASE_ENV),
        );
        plan.targets.push(html);

        plan.citations
            .extend([citations::metaphlan2(), citations::krona()]);
        Ok(plan)
    }
}
