use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::domain::{KaijuRank, MetaphlanLevel};
use crate::error::KiraError;
use crate::fs_util;
use crate::template::{Wildcards, expand};

pub const DEFAULT_CONFIG_FILE: &str = "kira-mg.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub inputdir: Option<String>,
    #[serde(default)]
    pub input_fn_pattern: Option<String>,
    #[serde(default)]
    pub outdir: Option<String>,
    #[serde(default)]
    pub logdir: Option<String>,
    #[serde(default)]
    pub dbdir: Option<String>,
    #[serde(default)]
    pub qc_reads: Option<bool>,
    #[serde(default)]
    pub remove_human: Option<bool>,
    #[serde(default)]
    pub taxonomic_profile: TaxonomicProfile,
    #[serde(default)]
    pub assembly: Option<bool>,
    #[serde(default)]
    pub bbduk: BbdukParams,
    #[serde(default)]
    pub remove_human_params: HostRemovalEntry,
    #[serde(default)]
    pub kaiju: KaijuEntry,
    #[serde(default)]
    pub metaphlan2: Metaphlan2Entry,
    #[serde(default)]
    pub metawrap: MetawrapParams,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct TaxonomicProfile {
    #[serde(default)]
    pub kaiju: bool,
    #[serde(default)]
    pub metaphlan2: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BbdukParams {
    /// Adapter reference; `adapters` selects the set bundled with BBTools.
    pub adapters: String,
    pub ktrim: String,
    pub k: u32,
    pub mink: u32,
    pub hdist: u32,
    pub trimq: u32,
    pub minlen: u32,
    pub threads: usize,
    pub extra: String,
}

impl Default for BbdukParams {
    fn default() -> Self {
        Self {
            adapters: "adapters".to_string(),
            ktrim: "r".to_string(),
            k: 23,
            mink: 11,
            hdist: 1,
            trimq: 10,
            minlen: 31,
            threads: 4,
            extra: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HostRemovalEntry {
    pub hg19_path: String,
    pub minid: f64,
    pub maxindel: u32,
    pub bwr: f64,
    pub bw: u32,
    pub threads: usize,
    pub extra: String,
}

impl Default for HostRemovalEntry {
    fn default() -> Self {
        Self {
            hg19_path: "{dbdir}/hg19".to_string(),
            minid: 0.95,
            maxindel: 3,
            bwr: 0.16,
            bw: 12,
            threads: 8,
            extra: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct KaijuEntry {
    pub db: String,
    pub nodes: String,
    pub names: String,
    pub levels: Vec<String>,
    pub threads: usize,
    pub extra: String,
}

impl Default for KaijuEntry {
    fn default() -> Self {
        Self {
            db: "{dbdir}/kaiju/kaiju_db.fmi".to_string(),
            nodes: "{dbdir}/kaiju/nodes.dmp".to_string(),
            names: "{dbdir}/kaiju/names.dmp".to_string(),
            levels: vec!["species".to_string()],
            threads: 4,
            extra: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Metaphlan2Entry {
    pub mpa_pkl: String,
    pub bt2_db_prefix: String,
    pub threads: usize,
    pub extra: String,
    pub heatmap: HeatmapEntry,
}

impl Default for Metaphlan2Entry {
    fn default() -> Self {
        Self {
            mpa_pkl: "{dbdir}/metaphlan2/mpa_v20_m200.pkl".to_string(),
            bt2_db_prefix: "{dbdir}/metaphlan2/mpa_v20_m200".to_string(),
            threads: 4,
            extra: String::new(),
            heatmap: HeatmapEntry::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HeatmapEntry {
    pub levels: Vec<String>,
    pub top: u32,
    pub extra: String,
}

impl Default for HeatmapEntry {
    fn default() -> Self {
        Self {
            levels: vec!["species".to_string()],
            top: 50,
            extra: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MetawrapParams {
    pub assembly_memory_gb: u32,
    pub threads: usize,
    pub completeness: u32,
    pub contamination: u32,
    pub assembly_extra: String,
    pub binning_extra: String,
}

impl Default for MetawrapParams {
    fn default() -> Self {
        Self {
            assembly_memory_gb: 24,
            threads: 16,
            completeness: 70,
            contamination: 10,
            assembly_extra: String::new(),
            binning_extra: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HostRemovalParams {
    pub hg19_path: Utf8PathBuf,
    pub minid: f64,
    pub maxindel: u32,
    pub bwr: f64,
    pub bw: u32,
    pub threads: usize,
    pub extra: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KaijuParams {
    pub db: Utf8PathBuf,
    pub nodes: Utf8PathBuf,
    pub names: Utf8PathBuf,
    pub levels: Vec<KaijuRank>,
    pub threads: usize,
    pub extra: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeatmapParams {
    pub levels: Vec<MetaphlanLevel>,
    pub top: u32,
    pub extra: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metaphlan2Params {
    pub mpa_pkl: Utf8PathBuf,
    pub bt2_db_prefix: Utf8PathBuf,
    pub threads: usize,
    pub extra: String,
    pub heatmap: HeatmapParams,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub inputdir: Utf8PathBuf,
    pub input_fn_pattern: String,
    pub outdir: Utf8PathBuf,
    pub logdir: Utf8PathBuf,
    pub dbdir: Utf8PathBuf,
    pub qc_reads: bool,
    pub remove_human: bool,
    pub taxonomic_profile: TaxonomicProfile,
    pub assembly: bool,
    pub bbduk: BbdukParams,
    pub host_removal: HostRemovalParams,
    pub kaiju: KaijuParams,
    pub metaphlan2: Metaphlan2Params,
    pub metawrap: MetawrapParams,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, KiraError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Err(KiraError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| KiraError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| KiraError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, KiraError> {
        let schema_version = config.schema_version.unwrap_or(1);

        let input_fn_pattern = config
            .input_fn_pattern
            .unwrap_or_else(|| "{sample}_R{readpair}.fastq.gz".to_string());
        if !input_fn_pattern.contains("{sample}") || !input_fn_pattern.contains("{readpair}") {
            return Err(KiraError::InvalidConfig(format!(
                "input_fn_pattern must contain {{sample}} and {{readpair}}: {input_fn_pattern}"
            )));
        }

        let inputdir = expand_home(config.inputdir.as_deref().unwrap_or("input"));
        let outdir = expand_home(config.outdir.as_deref().unwrap_or("output_dir"));
        let logdir = match config.logdir.as_deref() {
            Some(dir) => expand_home(dir),
            None => outdir.join("logs"),
        };
        // shadowed jobs run from a scratch directory
        let dbdir = fs_util::absolute(&expand_home(config.dbdir.as_deref().unwrap_or("databases")))?;
        let db = Wildcards::new().with("dbdir", &dbdir);

        let host = config.remove_human_params;
        let host_removal = HostRemovalParams {
            hg19_path: resolve_path(&host.hg19_path, &db)?,
            minid: host.minid,
            maxindel: host.maxindel,
            bwr: host.bwr,
            bw: host.bw,
            threads: require_threads("remove_human_params", host.threads)?,
            extra: host.extra,
        };
        if !(0.0..=1.0).contains(&host_removal.minid) {
            return Err(KiraError::InvalidConfig(format!(
                "remove_human_params.minid must be within 0..1, got {}",
                host_removal.minid
            )));
        }

        let kaiju_entry = config.kaiju;
        let kaiju = KaijuParams {
            db: resolve_path(&kaiju_entry.db, &db)?,
            nodes: resolve_path(&kaiju_entry.nodes, &db)?,
            names: resolve_path(&kaiju_entry.names, &db)?,
            levels: parse_levels(&kaiju_entry.levels)?,
            threads: require_threads("kaiju", kaiju_entry.threads)?,
            extra: kaiju_entry.extra,
        };

        let mpa = config.metaphlan2;
        if mpa.heatmap.top == 0 {
            return Err(KiraError::InvalidConfig(
                "metaphlan2.heatmap.top must be at least 1".to_string(),
            ));
        }
        let metaphlan2 = Metaphlan2Params {
            mpa_pkl: resolve_path(&mpa.mpa_pkl, &db)?,
            bt2_db_prefix: resolve_path(&mpa.bt2_db_prefix, &db)?,
            threads: require_threads("metaphlan2", mpa.threads)?,
            extra: mpa.extra,
            heatmap: HeatmapParams {
                levels: parse_levels(&mpa.heatmap.levels)?,
                top: mpa.heatmap.top,
                extra: mpa.heatmap.extra,
            },
        };

        let bbduk = config.bbduk;
        require_threads("bbduk", bbduk.threads)?;

        let metawrap = config.metawrap;
        require_threads("metawrap", metawrap.threads)?;
        if metawrap.completeness > 100 || metawrap.contamination > 100 {
            return Err(KiraError::InvalidConfig(
                "metawrap completeness and contamination are percentages (0..100)".to_string(),
            ));
        }

        Ok(ResolvedConfig {
            schema_version,
            inputdir,
            input_fn_pattern,
            outdir,
            logdir,
            dbdir,
            qc_reads: config.qc_reads.unwrap_or(true),
            remove_human: config.remove_human.unwrap_or(false),
            taxonomic_profile: config.taxonomic_profile,
            assembly: config.assembly.unwrap_or(false),
            bbduk,
            host_removal,
            kaiju,
            metaphlan2,
            metawrap,
        })
    }
}

/// The document written by `kira-mg init`.
pub fn default_config() -> Config {
    Config {
        schema_version: Some(1),
        inputdir: Some("input".to_string()),
        input_fn_pattern: Some("{sample}_R{readpair}.fastq.gz".to_string()),
        outdir: Some("output_dir".to_string()),
        logdir: Some("output_dir/logs".to_string()),
        dbdir: Some("databases".to_string()),
        qc_reads: Some(true),
        remove_human: Some(false),
        taxonomic_profile: TaxonomicProfile {
            kaiju: false,
            metaphlan2: true,
        },
        assembly: Some(false),
        ..Config::default()
    }
}

fn resolve_path(template: &str, db: &Wildcards) -> Result<Utf8PathBuf, KiraError> {
    let rendered = expand(template, db)?;
    fs_util::absolute(&expand_home(rendered.as_str()))
}

fn expand_home(path: &str) -> Utf8PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = BaseDirs::new()
            .and_then(|dirs| Utf8PathBuf::from_path_buf(dirs.home_dir().to_path_buf()).ok())
        {
            return home.join(rest);
        }
    }
    Utf8PathBuf::from(path)
}

fn require_threads(section: &str, threads: usize) -> Result<usize, KiraError> {
    if threads == 0 {
        return Err(KiraError::InvalidConfig(format!(
            "{section}.threads must be at least 1"
        )));
    }
    Ok(threads)
}

fn parse_levels<T>(values: &[String]) -> Result<Vec<T>, KiraError>
where
    T: std::str::FromStr<Err = KiraError> + Ord,
{
    let mut levels = values
        .iter()
        .map(|value| value.parse::<T>())
        .collect::<Result<Vec<_>, KiraError>>()?;
    levels.sort();
    levels.dedup();
    if levels.is_empty() {
        return Err(KiraError::InvalidConfig(
            "at least one taxonomic level is required".to_string(),
        ));
    }
    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_defaults() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved.schema_version, 1);
        assert!(resolved.qc_reads);
        assert!(!resolved.remove_human);
        assert_eq!(resolved.logdir, Utf8PathBuf::from("output_dir/logs"));
        assert!(resolved.dbdir.is_absolute());
        assert_eq!(resolved.host_removal.hg19_path, resolved.dbdir.join("hg19"));
        assert_eq!(resolved.kaiju.levels, vec![KaijuRank::Species]);
    }
}
