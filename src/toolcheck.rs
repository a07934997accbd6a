use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Serialize)]
pub struct ToolStatus {
    pub program: String,
    pub path: Option<String>,
    pub version: Option<String>,
}

impl ToolStatus {
    pub fn found(&self) -> bool {
        self.path.is_some()
    }
}

/// Looks up every program on PATH and asks the ones it finds for a version.
pub fn check_programs<S: AsRef<str>>(programs: &[S]) -> Vec<ToolStatus> {
    programs
        .iter()
        .map(|program| {
            let program = program.as_ref();
            let path = find_in_path(program);
            let version = path
                .as_deref()
                .and_then(|path| version_args(program).and_then(|args| tool_version(path, args)));
            debug!(program, found = path.is_some(), "tool lookup");
            ToolStatus {
                program: program.to_string(),
                path: path.map(|path| path.display().to_string()),
                version,
            }
        })
        .collect()
}

pub fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.is_file() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.is_file() {
            return Some(plain);
        }
    }
    None
}

/// First non-empty line the program prints for `args`, stdout before stderr.
pub fn tool_version(path: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new(path).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    [&output.stdout, &output.stderr]
        .into_iter()
        .flat_map(|bytes| {
            String::from_utf8_lossy(bytes)
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .next()
}

fn version_args(program: &str) -> Option<&'static [&'static str]> {
    match program {
        "fastqc" | "metaphlan2.py" | "bbduk.sh" | "bbmap.sh" | "metawrap" | "conda" | "gzip"
        | "grep" => Some(&["--version"]),
        "kaiju" => Some(&["-h"]),
        _ => None,
    }
}
