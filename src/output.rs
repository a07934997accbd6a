use std::io::{self, Write};

use serde::Serialize;

use crate::app::{
    CheckResult, CitationsResult, InitResult, PlanResult, ProgressEvent, ProgressSink,
    ProgressSinkKind, RunResult, SamplesResult, TargetsResult,
};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_plan(result: &PlanResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_run(result: &RunResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_targets(result: &TargetsResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_samples(result: &SamplesResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_citations(result: &CitationsResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_check(result: &CheckResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_init(result: &InitResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Progress lines on stderr for interactive use.
pub struct StderrProgress {
    kind: ProgressSinkKind,
}

impl StderrProgress {
    pub fn new(kind: ProgressSinkKind) -> Self {
        Self { kind }
    }
}

impl ProgressSink for StderrProgress {
    fn event(&self, event: ProgressEvent) {
        let label = match self.kind {
            ProgressSinkKind::Plan => "plan",
            ProgressSinkKind::Run => "run",
            ProgressSinkKind::Check => "check",
        };
        let dim = "\x1b[2m";
        let reset = "\x1b[0m";
        match event.elapsed {
            Some(elapsed) => eprintln!(
                "{dim}[{label}] {} ({:.1}s){reset}",
                event.message,
                elapsed.as_secs_f64()
            ),
            None => eprintln!("{dim}[{label}] {}{reset}", event.message),
        }
    }
}
