//! Command-line builders for the external programs the workflow drives.
//!
//! Each builder owns its parameters and renders argument vectors for the
//! concrete paths of one rule instantiation. Nothing passes through a shell.

pub mod bbtools;
pub mod fastqc;
pub mod kaiju;
pub mod krona;
pub mod metaphlan2;
pub mod metawrap;

use crate::error::KiraError;
use crate::rule::{CommandPipeline, CommandSpec, RuleIo, Tool};

pub use bbtools::{Bbduk, BbmapHuman};
pub use fastqc::FastQc;
pub use kaiju::{Kaiju, Kaiju2Krona, Kaiju2Table};
pub use krona::KronaImportText;
pub use metaphlan2::{MergeMetaphlanTables, Metaphlan2, Metaphlan2Krona, MetaphlanHeatmap};
pub use metawrap::{
    MetawrapAssembly, MetawrapBinRefinement, MetawrapBinning, MetawrapBlobology,
    MetawrapQuantBins,
};

/// `gzip -dcf IN > OUT`; uncompressed input is copied through.
#[derive(Debug, Clone, Default)]
pub struct Decompress;

impl Tool for Decompress {
    fn pipeline(&self, io: &RuleIo) -> Result<CommandPipeline, KiraError> {
        let command = CommandSpec::new("gzip").arg("-dcf").arg(io.input(0)?);
        Ok(CommandPipeline::single(command).stdout_to(io.output(0)?))
    }
}
