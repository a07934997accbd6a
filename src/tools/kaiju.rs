use crate::config::KaijuParams;
use crate::domain::KaijuRank;
use crate::error::KiraError;
use crate::rule::{CommandPipeline, CommandSpec, RuleIo, Tool};

/// Classifies a read pair. Inputs: R1, R2. Output: `.kaiju` assignments.
#[derive(Debug, Clone)]
pub struct Kaiju {
    pub params: KaijuParams,
}

impl Tool for Kaiju {
    fn pipeline(&self, io: &RuleIo) -> Result<CommandPipeline, KiraError> {
        let p = &self.params;
        let command = CommandSpec::new("kaiju")
            .opt("-z", io.threads)
            .opt("-t", &p.nodes)
            .opt("-f", &p.db)
            .opt("-i", io.input(0)?)
            .opt("-j", io.input(1)?)
            .opt("-o", io.output(0)?)
            .extra(&p.extra);
        Ok(CommandPipeline::single(command))
    }
}

/// Converts one `.kaiju` file into Krona text format.
#[derive(Debug, Clone)]
pub struct Kaiju2Krona {
    pub params: KaijuParams,
}

impl Tool for Kaiju2Krona {
    fn pipeline(&self, io: &RuleIo) -> Result<CommandPipeline, KiraError> {
        let command = CommandSpec::new("kaiju2krona")
            .opt("-t", &self.params.nodes)
            .opt("-n", &self.params.names)
            .opt("-i", io.input(0)?)
            .opt("-o", io.output(0)?);
        Ok(CommandPipeline::single(command))
    }
}

/// Summarises all `.kaiju` files at one rank into a single table.
#[derive(Debug, Clone)]
pub struct Kaiju2Table {
    pub params: KaijuParams,
    pub rank: KaijuRank,
}

impl Tool for Kaiju2Table {
    fn pipeline(&self, io: &RuleIo) -> Result<CommandPipeline, KiraError> {
        io.input(0)?;
        let command = CommandSpec::new("kaiju2table")
            .opt("-t", &self.params.nodes)
            .opt("-n", &self.params.names)
            .opt("-r", self.rank)
            .opt("-o", io.output(0)?)
            .args(io.inputs.iter());
        Ok(CommandPipeline::single(command))
    }
}
