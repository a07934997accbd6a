use crate::error::KiraError;
use crate::rule::{CommandPipeline, CommandSpec, RuleIo, Tool};

/// `ktImportText -o OUT IN,label ...`, one chart per input.
#[derive(Debug, Clone)]
pub struct KronaImportText {
    pub labels: Vec<String>,
}

impl Tool for KronaImportText {
    fn pipeline(&self, io: &RuleIo) -> Result<CommandPipeline, KiraError> {
        if self.labels.len() != io.inputs.len() {
            return Err(KiraError::RuleWiring(format!(
                "{}: {} labels for {} krona inputs",
                io.rule,
                self.labels.len(),
                io.inputs.len()
            )));
        }
        let charts = io
            .inputs
            .iter()
            .zip(&self.labels)
            .map(|(path, label)| format!("{path},{label}"));
        let command = CommandSpec::new("ktImportText")
            .opt("-o", io.output(0)?)
            .args(charts);
        Ok(CommandPipeline::single(command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charts_are_labelled_by_sample() {
        let io = RuleIo {
            rule: "kaiju_krona".to_string(),
            inputs: vec!["k/s1.krona".into(), "k/s2.krona".into()],
            outputs: vec!["k/all.html".into()],
            threads: 1,
        };
        let tool = KronaImportText {
            labels: vec!["s1".to_string(), "s2".to_string()],
        };
        assert_eq!(
            tool.pipeline(&io).unwrap().render(),
            "ktImportText -o k/all.html k/s1.krona,s1 k/s2.krona,s2"
        );
    }
}
