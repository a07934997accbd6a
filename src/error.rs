use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum KiraError {
    #[error("missing config file kira-mg.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{stage}: required database not found at {path}")]
    MissingDatabase { stage: String, path: String },

    #[error("invalid input filename pattern: {0}")]
    InvalidPattern(String),

    #[error("invalid sample name: {0}")]
    InvalidSampleName(String),

    #[error("input directory not readable: {0}")]
    InputDir(String),

    #[error("no paired samples matching {pattern} found in {dir}")]
    NoSamples { dir: String, pattern: String },

    #[error("invalid taxonomic level: {0}")]
    InvalidLevel(String),

    #[error("unresolved wildcard {{{wildcard}}} in template {template}")]
    UnresolvedWildcard { template: String, wildcard: String },

    #[error("output {path} is claimed by both {first} and {second}")]
    DuplicateOutput {
        path: String,
        first: String,
        second: String,
    },

    #[error("{rule}: input {path} is neither an existing file nor produced by any rule")]
    MissingInput { rule: String, path: String },

    #[error("dependency cycle between rules: {0}")]
    Cycle(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("failed to start {program}: {message}")]
    ToolSpawn { program: String, message: String },

    #[error("{job} failed: {message}")]
    JobFailed { job: String, message: String },

    #[error("{job} finished but did not produce {path}")]
    MissingOutput { job: String, path: String },

    #[error("{failed} job(s) failed; see logs under {logdir}")]
    RunFailed { failed: usize, logdir: String },

    #[error("rule wiring error: {0}")]
    RuleWiring(String),

    #[error("async runtime error: {0}")]
    Runtime(String),
}
