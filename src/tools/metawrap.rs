use camino::Utf8Path;

use crate::config::MetawrapParams;
use crate::error::KiraError;
use crate::rule::{CommandPipeline, CommandSpec, RuleIo, Tool};

fn parent_dir(path: &Utf8Path) -> &Utf8Path {
    path.parent().unwrap_or(Utf8Path::new("."))
}

/// MEGAHIT assembly of an uncompressed read pair.
///
/// Inputs: R1, R2 (`_1.fastq`, `_2.fastq`). Output: `final_assembly.fasta`.
#[derive(Debug, Clone)]
pub struct MetawrapAssembly {
    pub params: MetawrapParams,
}

impl Tool for MetawrapAssembly {
    fn pipeline(&self, io: &RuleIo) -> Result<CommandPipeline, KiraError> {
        let command = CommandSpec::new("metawrap")
            .arg("assembly")
            .opt("-1", io.input(0)?)
            .opt("-2", io.input(1)?)
            .opt("-m", self.params.assembly_memory_gb)
            .opt("-t", io.threads)
            .arg("--megahit")
            .opt("-o", parent_dir(io.output(0)?))
            .extra(&self.params.assembly_extra);
        Ok(CommandPipeline::single(command))
    }
}

/// MetaBAT2, MaxBin2 and CONCOCT binning of one assembly.
///
/// Inputs: assembly, R1, R2. Outputs: the three `*_bins` directories.
#[derive(Debug, Clone)]
pub struct MetawrapBinning {
    pub params: MetawrapParams,
}

impl Tool for MetawrapBinning {
    fn pipeline(&self, io: &RuleIo) -> Result<CommandPipeline, KiraError> {
        let command = CommandSpec::new("metawrap")
            .arg("binning")
            .opt("-o", parent_dir(io.output(0)?))
            .opt("-t", io.threads)
            .opt("-a", io.input(0)?)
            .arg("--metabat2")
            .arg("--maxbin2")
            .arg("--concoct")
            .extra(&self.params.binning_extra)
            .arg(io.input(1)?)
            .arg(io.input(2)?);
        Ok(CommandPipeline::single(command))
    }
}

/// Consolidates the three bin sets.
///
/// Inputs: metabat2, maxbin2, concoct bin directories. Output: refined bins directory.
#[derive(Debug, Clone)]
pub struct MetawrapBinRefinement {
    pub params: MetawrapParams,
}

impl Tool for MetawrapBinRefinement {
    fn pipeline(&self, io: &RuleIo) -> Result<CommandPipeline, KiraError> {
        let command = CommandSpec::new("metawrap")
            .arg("bin_refinement")
            .opt("-o", parent_dir(io.output(0)?))
            .opt("-t", io.threads)
            .opt("-A", io.input(0)?)
            .opt("-B", io.input(1)?)
            .opt("-C", io.input(2)?)
            .opt("-c", self.params.completeness)
            .opt("-x", self.params.contamination);
        Ok(CommandPipeline::single(command))
    }
}

/// Inputs: refined bins, assembly, R1, R2. Output: `bin_abundance_table.tab`.
#[derive(Debug, Clone)]
pub struct MetawrapQuantBins;

impl Tool for MetawrapQuantBins {
    fn pipeline(&self, io: &RuleIo) -> Result<CommandPipeline, KiraError> {
        let command = CommandSpec::new("metawrap")
            .arg("quant_bins")
            .opt("-b", io.input(0)?)
            .opt("-o", parent_dir(io.output(0)?))
            .opt("-a", io.input(1)?)
            .opt("-t", io.threads)
            .arg(io.input(2)?)
            .arg(io.input(3)?);
        Ok(CommandPipeline::single(command))
    }
}

/// Inputs: assembly, refined bins, R1, R2. Output: blobology directory.
#[derive(Debug, Clone)]
pub struct MetawrapBlobology;

impl Tool for MetawrapBlobology {
    fn pipeline(&self, io: &RuleIo) -> Result<CommandPipeline, KiraError> {
        let command = CommandSpec::new("metawrap")
            .arg("blobology")
            .opt("-a", io.input(0)?)
            .opt("-t", io.threads)
            .opt("-o", io.output(0)?)
            .opt("--bins", io.input(1)?)
            .arg(io.input(2)?)
            .arg(io.input(3)?);
        Ok(CommandPipeline::single(command))
    }
}
