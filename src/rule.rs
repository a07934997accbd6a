use std::fmt;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::error::KiraError;
use crate::template::Wildcards;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "lowercase")]
pub enum Output {
    File(Utf8PathBuf),
    Directory(Utf8PathBuf),
}

impl Output {
    pub fn path(&self) -> &Utf8Path {
        match self {
            Output::File(path) | Output::Directory(path) => path,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Output::Directory(_))
    }
}

/// Where a rule's command runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Shadow {
    /// In the invoking directory, writing outputs in place.
    None,
    /// In a scratch directory; only declared file outputs are moved back.
    Shallow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, value: impl ToString) -> Self {
        self.args.push(value.to_string());
        self
    }

    pub fn args<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.args.extend(values.into_iter().map(|v| v.to_string()));
        self
    }

    /// `key=value`, the BBTools argument style.
    pub fn kv(self, key: &str, value: impl fmt::Display) -> Self {
        self.arg(format!("{key}={value}"))
    }

    pub fn opt(self, flag: &str, value: impl ToString) -> Self {
        self.arg(flag).arg(value)
    }

    /// Appends a user-supplied flag string, split on whitespace.
    pub fn extra(self, extra: &str) -> Self {
        self.args(extra.split_whitespace())
    }

    pub fn render(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(quote)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Commands piped stdout to stdin, with the last stdout optionally sent to a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandPipeline {
    pub commands: Vec<CommandSpec>,
    pub stdout: Option<Utf8PathBuf>,
}

impl CommandPipeline {
    pub fn single(command: CommandSpec) -> Self {
        Self {
            commands: vec![command],
            stdout: None,
        }
    }

    pub fn pipe(mut self, command: CommandSpec) -> Self {
        self.commands.push(command);
        self
    }

    pub fn stdout_to(mut self, path: &Utf8Path) -> Self {
        self.stdout = Some(path.to_path_buf());
        self
    }

    pub fn programs(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().map(|command| command.program.as_str())
    }

    pub fn render(&self) -> String {
        let mut line = self
            .commands
            .iter()
            .map(CommandSpec::render)
            .collect::<Vec<_>>()
            .join(" | ");
        if let Some(path) = &self.stdout {
            line.push_str(" > ");
            line.push_str(&quote(path.as_str()));
        }
        line
    }
}

fn quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || "-_./=,:+@%^".contains(ch));
    if plain {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

/// Concrete paths handed to a tool when its command line is rendered.
#[derive(Debug, Clone)]
pub struct RuleIo {
    pub rule: String,
    pub inputs: Vec<Utf8PathBuf>,
    pub outputs: Vec<Utf8PathBuf>,
    pub threads: usize,
}

impl RuleIo {
    pub fn input(&self, index: usize) -> Result<&Utf8Path, KiraError> {
        self.inputs
            .get(index)
            .map(Utf8PathBuf::as_path)
            .ok_or_else(|| KiraError::RuleWiring(format!("{}: missing input #{index}", self.rule)))
    }

    pub fn output(&self, index: usize) -> Result<&Utf8Path, KiraError> {
        self.outputs
            .get(index)
            .map(Utf8PathBuf::as_path)
            .ok_or_else(|| {
                KiraError::RuleWiring(format!("{}: missing output #{index}", self.rule))
            })
    }
}

/// Typed command-line contract of one external program.
pub trait Tool: fmt::Debug + Send + Sync {
    fn pipeline(&self, io: &RuleIo) -> Result<CommandPipeline, KiraError>;
}

/// One rule instantiation: a concrete mapping from input paths to output paths.
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    pub stage: String,
    pub wildcards: Wildcards,
    pub inputs: Vec<Utf8PathBuf>,
    pub outputs: Vec<Output>,
    pub log: Utf8PathBuf,
    pub threads: usize,
    pub conda_env: Option<String>,
    pub shadow: Shadow,
    pub pipefail: bool,
    pub tolerate_empty: bool,
    pub tool: Arc<dyn Tool>,
}

impl Rule {
    pub fn new(name: &str, stage: &str, tool: impl Tool + 'static) -> Self {
        Self {
            name: name.to_string(),
            stage: stage.to_string(),
            wildcards: Wildcards::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            log: Utf8PathBuf::new(),
            threads: 1,
            conda_env: None,
            shadow: Shadow::None,
            pipefail: true,
            tolerate_empty: false,
            tool: Arc::new(tool),
        }
    }

    pub fn wildcards(mut self, wildcards: Wildcards) -> Self {
        self.wildcards = wildcards;
        self
    }

    pub fn input(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.inputs.push(path.into());
        self
    }

    pub fn inputs<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Utf8PathBuf>,
    {
        self.inputs.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn output(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.outputs.push(Output::File(path.into()));
        self
    }

    pub fn outputs<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Utf8PathBuf>,
    {
        self.outputs
            .extend(paths.into_iter().map(|path| Output::File(path.into())));
        self
    }

    pub fn output_dir(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.outputs.push(Output::Directory(path.into()));
        self
    }

    pub fn log(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.log = path.into();
        self
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn conda(mut self, env: &str) -> Self {
        self.conda_env = Some(env.to_string());
        self
    }

    pub fn shadow(mut self, shadow: Shadow) -> Self {
        self.shadow = shadow;
        self
    }

    /// Small inputs may legitimately produce empty output; only the last
    /// command's exit status counts and missing file outputs are created empty.
    pub fn tolerate_empty(mut self) -> Self {
        self.pipefail = false;
        self.tolerate_empty = true;
        self
    }

    /// `name[key=value,...]`, unique per instantiation.
    pub fn id(&self) -> String {
        if self.wildcards.is_empty() {
            self.name.clone()
        } else {
            format!("{}[{}]", self.name, self.wildcards.label())
        }
    }

    pub fn output_paths(&self) -> impl Iterator<Item = &Utf8Path> {
        self.outputs.iter().map(Output::path)
    }

    pub fn io(&self) -> RuleIo {
        self.io_with_outputs(self.outputs.iter().map(|o| o.path().to_path_buf()).collect())
    }

    pub fn io_with_outputs(&self, outputs: Vec<Utf8PathBuf>) -> RuleIo {
        RuleIo {
            rule: self.id(),
            inputs: self.inputs.clone(),
            outputs,
            threads: self.threads,
        }
    }

    pub fn pipeline(&self) -> Result<CommandPipeline, KiraError> {
        self.tool.pipeline(&self.io())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_quotes_only_when_needed() {
        let cmd = CommandSpec::new("grep").arg("-v").arg("^#").arg("my file.txt");
        assert_eq!(cmd.render(), "grep -v '^#' 'my file.txt'");
    }

    #[test]
    fn extra_flags_are_split() {
        let cmd = CommandSpec::new("kaiju").extra("  -a greedy   -e 3 ");
        assert_eq!(cmd.args, vec!["-a", "greedy", "-e", "3"]);
    }

    #[test]
    fn outputs_serialize_with_their_paths() {
        let value = serde_json::to_value(Output::Directory("out/bins".into())).unwrap();
        assert_eq!(value, serde_json::json!({"kind": "directory", "path": "out/bins"}));
    }

    #[test]
    fn missing_slot_is_a_wiring_error() {
        let io = RuleIo {
            rule: "kaiju[sample=s1]".to_string(),
            inputs: vec!["a.fastq".into()],
            outputs: Vec::new(),
            threads: 1,
        };
        assert!(matches!(io.input(1), Err(KiraError::RuleWiring(message)) if message.contains("input #1")));
        assert!(matches!(io.output(0), Err(KiraError::RuleWiring(_))));
    }
}
