use crate::config::{HeatmapParams, Metaphlan2Params};
use crate::domain::MetaphlanLevel;
use crate::error::KiraError;
use crate::rule::{CommandPipeline, CommandSpec, RuleIo, Tool};

/// Profiles a read pair. Inputs: R1, R2. Outputs: profile, bowtie2 hits.
#[derive(Debug, Clone)]
pub struct Metaphlan2 {
    pub params: Metaphlan2Params,
}

impl Tool for Metaphlan2 {
    fn pipeline(&self, io: &RuleIo) -> Result<CommandPipeline, KiraError> {
        let p = &self.params;
        let command = CommandSpec::new("metaphlan2.py")
            .arg(format!("{},{}", io.input(0)?, io.input(1)?))
            .opt("--input_type", "fastq")
            .opt("--nproc", io.threads)
            .opt("--bowtie2db", &p.bt2_db_prefix)
            .opt("--mpa_pkl", &p.mpa_pkl)
            .opt("--bowtie2out", io.output(1)?)
            .opt("-o", io.output(0)?)
            .extra(&p.extra);
        Ok(CommandPipeline::single(command))
    }
}

/// Strips comment lines and converts a profile to Krona text.
///
/// A sample without any hit leaves nothing for `grep` to print, which makes
/// it exit 1; rules using this builder must not run with pipefail.
#[derive(Debug, Clone)]
pub struct Metaphlan2Krona;

impl Tool for Metaphlan2Krona {
    fn pipeline(&self, io: &RuleIo) -> Result<CommandPipeline, KiraError> {
        let grep = CommandSpec::new("grep").arg("-v").arg("^#").arg(io.input(0)?);
        let convert = CommandSpec::new("metaphlan2krona.py")
            .opt("-p", "/dev/stdin")
            .opt("-k", io.output(0)?);
        Ok(CommandPipeline::single(grep).pipe(convert))
    }
}

/// `merge_metaphlan_tables.py IN... > OUT`.
#[derive(Debug, Clone)]
pub struct MergeMetaphlanTables;

impl Tool for MergeMetaphlanTables {
    fn pipeline(&self, io: &RuleIo) -> Result<CommandPipeline, KiraError> {
        io.input(0)?;
        let command = CommandSpec::new("merge_metaphlan_tables.py").args(io.inputs.iter());
        Ok(CommandPipeline::single(command).stdout_to(io.output(0)?))
    }
}

/// Clustered heatmap of the merged table at one level, top N clades.
#[derive(Debug, Clone)]
pub struct MetaphlanHeatmap {
    pub params: HeatmapParams,
    pub level: MetaphlanLevel,
}

impl Tool for MetaphlanHeatmap {
    fn pipeline(&self, io: &RuleIo) -> Result<CommandPipeline, KiraError> {
        let command = CommandSpec::new("metaphlan_hclust_heatmap.py")
            .opt("--in", io.input(0)?)
            .opt("--out", io.output(0)?)
            .opt("--tax_lev", self.level.flag())
            .opt("--top", self.params.top)
            .opt("-m", "average")
            .opt("-d", "braycurtis")
            .opt("-f", "correlation")
            .opt("-s", "log")
            .opt("--minv", "0.1")
            .extra(&self.params.extra);
        Ok(CommandPipeline::single(command))
    }
}
