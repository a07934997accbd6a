use crate::config::{BbdukParams, HostRemovalParams};
use crate::error::KiraError;
use crate::rule::{CommandPipeline, CommandSpec, RuleIo, Tool};

/// Adapter and quality trimming of a read pair.
///
/// Inputs: R1, R2. Outputs: trimmed R1, trimmed R2.
#[derive(Debug, Clone)]
pub struct Bbduk {
    pub params: BbdukParams,
}

impl Tool for Bbduk {
    fn pipeline(&self, io: &RuleIo) -> Result<CommandPipeline, KiraError> {
        let p = &self.params;
        let command = CommandSpec::new("bbduk.sh")
            .kv("in1", io.input(0)?)
            .kv("in2", io.input(1)?)
            .kv("out1", io.output(0)?)
            .kv("out2", io.output(1)?)
            .kv("ref", &p.adapters)
            .kv("ktrim", &p.ktrim)
            .kv("k", p.k)
            .kv("mink", p.mink)
            .kv("hdist", p.hdist)
            .arg("tpe")
            .arg("tbo")
            .kv("qtrim", "rl")
            .kv("trimq", p.trimq)
            .kv("minlen", p.minlen)
            .kv("threads", io.threads)
            .extra(&p.extra);
        Ok(CommandPipeline::single(command))
    }
}

/// Maps a read pair against the human reference and keeps what does not map.
///
/// Inputs: R1, R2. Outputs: unmapped R1, unmapped R2, mapped (human) reads.
#[derive(Debug, Clone)]
pub struct BbmapHuman {
    pub params: HostRemovalParams,
}

impl Tool for BbmapHuman {
    fn pipeline(&self, io: &RuleIo) -> Result<CommandPipeline, KiraError> {
        let p = &self.params;
        let command = CommandSpec::new("bbmap.sh")
            .kv("threads", io.threads)
            .kv("minid", p.minid)
            .kv("maxindel", p.maxindel)
            .kv("bwr", p.bwr)
            .kv("bw", p.bw)
            .arg("quickmatch")
            .arg("fast")
            .kv("minhits", 2)
            .kv("path", &p.hg19_path)
            .kv("in1", io.input(0)?)
            .kv("in2", io.input(1)?)
            .kv("outu1", io.output(0)?)
            .kv("outu2", io.output(1)?)
            .kv("outm", io.output(2)?)
            .extra(&p.extra);
        Ok(CommandPipeline::single(command))
    }
}
