use camino::{Utf8Path, Utf8PathBuf};

use crate::error::KiraError;
use crate::rule::{CommandPipeline, CommandSpec, RuleIo, Tool};

const READ_SUFFIXES: &[&str] = &[".fastq.gz", ".fq.gz", ".fastq", ".fq"];

/// `fastqc --quiet --threads N --outdir DIR READ`
///
/// FastQC names its reports after the read file, so the declared outputs
/// must come from [`report_paths`].
#[derive(Debug, Clone)]
pub struct FastQc;

impl Tool for FastQc {
    fn pipeline(&self, io: &RuleIo) -> Result<CommandPipeline, KiraError> {
        let zip = io.output(0)?;
        let outdir = zip.parent().unwrap_or(Utf8Path::new("."));
        let command = CommandSpec::new("fastqc")
            .arg("--quiet")
            .opt("--threads", io.threads)
            .opt("--outdir", outdir)
            .args(io.inputs.iter());
        Ok(CommandPipeline::single(command))
    }
}

/// The `(zip, html)` pair FastQC writes for `read` into `outdir`.
pub fn report_paths(read: &Utf8Path, outdir: &Utf8Path) -> (Utf8PathBuf, Utf8PathBuf) {
    let name = read.file_name().unwrap_or(read.as_str());
    let stem = READ_SUFFIXES
        .iter()
        .find_map(|suffix| name.strip_suffix(suffix))
        .unwrap_or(name);
    (
        outdir.join(format!("{stem}_fastqc.zip")),
        outdir.join(format!("{stem}_fastqc.html")),
    )
}
