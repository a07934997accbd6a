use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{BufReader, Read};

use camino::{Utf8Path, Utf8PathBuf};
use flate2::read::MultiGzDecoder;
use regex::Regex;
use tracing::{debug, warn};

use crate::domain::{ReadPair, SampleName};
use crate::error::KiraError;
use crate::template::{PathTemplate, Wildcards};

/// Compiled `input_fn_pattern`, e.g. `{sample}_R{readpair}.fastq.gz`.
#[derive(Debug, Clone)]
pub struct InputPattern {
    template: PathTemplate,
    matcher: Regex,
}

impl InputPattern {
    pub fn parse(pattern: &str) -> Result<Self, KiraError> {
        let template = PathTemplate::new(pattern)?;
        let mut expr = String::from("^");
        let mut seen_sample = false;
        let mut seen_pair = false;
        for piece in template.pieces() {
            match piece {
                Ok(literal) => expr.push_str(&regex::escape(literal)),
                Err("sample") if !seen_sample => {
                    seen_sample = true;
                    expr.push_str(r"(?P<sample>[^/]+?)");
                }
                Err("readpair") if !seen_pair => {
                    seen_pair = true;
                    expr.push_str(r"(?P<readpair>[12])");
                }
                Err(other) => {
                    return Err(KiraError::InvalidPattern(format!(
                        "unexpected or repeated placeholder {{{other}}} in {pattern}"
                    )));
                }
            }
        }
        if !seen_sample || !seen_pair {
            return Err(KiraError::InvalidPattern(format!(
                "{pattern} must contain {{sample}} and {{readpair}}"
            )));
        }
        expr.push('$');
        let matcher = Regex::new(&expr).map_err(|err| KiraError::InvalidPattern(err.to_string()))?;
        Ok(Self { template, matcher })
    }

    pub fn as_str(&self) -> &str {
        self.template.as_str()
    }

    /// Extracts sample and read pair from a bare file name.
    pub fn match_file_name(&self, file_name: &str) -> Option<(String, ReadPair)> {
        let caps = self.matcher.captures(file_name)?;
        let sample = caps.name("sample")?.as_str().to_string();
        let pair = caps.name("readpair")?.as_str().parse().ok()?;
        Some((sample, pair))
    }

    pub fn read_path(
        &self,
        inputdir: &Utf8Path,
        sample: &SampleName,
        pair: ReadPair,
    ) -> Result<Utf8PathBuf, KiraError> {
        let wildcards = Wildcards::new()
            .with("sample", sample)
            .with("readpair", pair);
        Ok(inputdir.join(self.template.render(&wildcards)?))
    }
}

/// Finds every sample with both read files present in `inputdir`.
pub fn discover(
    inputdir: &Utf8Path,
    pattern: &InputPattern,
) -> Result<BTreeSet<SampleName>, KiraError> {
    let entries = fs::read_dir(inputdir.as_std_path())
        .map_err(|err| KiraError::InputDir(format!("{inputdir}: {err}")))?;

    let mut pairs: BTreeMap<String, BTreeSet<ReadPair>> = BTreeMap::new();
    for entry in entries {
        let entry = entry.map_err(|err| KiraError::InputDir(err.to_string()))?;
        if !entry.path().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if let Some((sample, pair)) = pattern.match_file_name(&name) {
            debug!(file = %name, sample = %sample, readpair = %pair, "matched input file");
            pairs.entry(sample).or_default().insert(pair);
        }
    }

    let mut samples = BTreeSet::new();
    for (sample, found) in pairs {
        if found.len() != ReadPair::BOTH.len() {
            warn!(sample = %sample, "skipping sample without both read files");
            continue;
        }
        samples.insert(sample.parse::<SampleName>()?);
    }

    if samples.is_empty() {
        return Err(KiraError::NoSamples {
            dir: inputdir.to_string(),
            pattern: pattern.as_str().to_string(),
        });
    }
    Ok(samples)
}

/// Checks that a read file looks like FASTQ, reading through gzip when needed.
pub fn verify_fastq(path: &Utf8Path) -> Result<(), KiraError> {
    let mut file = fs::File::open(path.as_std_path())
        .map_err(|err| KiraError::Filesystem(format!("open {path}: {err}")))?;
    let mut magic = [0u8; 2];
    let read = file
        .read(&mut magic)
        .map_err(|err| KiraError::Filesystem(format!("read {path}: {err}")))?;
    let file = fs::File::open(path.as_std_path())
        .map_err(|err| KiraError::Filesystem(format!("open {path}: {err}")))?;

    let mut reader: Box<dyn Read> = if read == 2 && magic == [0x1f, 0x8b] {
        Box::new(MultiGzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };

    let mut first = [0u8; 1];
    let n = reader
        .read(&mut first)
        .map_err(|err| KiraError::Filesystem(format!("decode {path}: {err}")))?;
    if n == 0 {
        return Err(KiraError::Filesystem(format!("{path} is empty")));
    }
    if first[0] != b'@' {
        return Err(KiraError::Filesystem(format!(
            "{path} does not start with a FASTQ record"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_matches_default_layout() {
        let pattern = InputPattern::parse("{sample}_R{readpair}.fastq.gz").unwrap();
        assert_eq!(
            pattern.match_file_name("ABC_01_R2.fastq.gz"),
            Some(("ABC_01".to_string(), ReadPair::R2))
        );
        assert_eq!(pattern.match_file_name("ABC_01_R3.fastq.gz"), None);
        assert_eq!(pattern.match_file_name("ABC_01_R1.fastq"), None);
    }

    #[test]
    fn pattern_requires_both_placeholders() {
        assert!(InputPattern::parse("{sample}.fastq.gz").is_err());
    }
}
