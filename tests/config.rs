use std::fs;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use kira_metagenome_workflow::config::{Config, ConfigLoader, default_config};
use kira_metagenome_workflow::domain::{KaijuRank, MetaphlanLevel};
use kira_metagenome_workflow::error::KiraError;

#[test]
fn resolve_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kira-mg.json");
    fs::write(
        &path,
        r#"{
            "inputdir": "reads",
            "outdir": "results",
            "dbdir": "/srv/db",
            "remove_human": true,
            "taxonomic_profile": {"kaiju": true},
            "kaiju": {"levels": ["genus", "phylum", "genus"], "threads": 12},
            "metaphlan2": {"heatmap": {"levels": ["g", "species"], "top": 25}}
        }"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(path.to_str()).unwrap();
    assert_eq!(resolved.inputdir, Utf8PathBuf::from("reads"));
    assert_eq!(resolved.logdir, Utf8PathBuf::from("results/logs"));
    assert!(resolved.remove_human);
    assert!(resolved.taxonomic_profile.kaiju);
    assert!(!resolved.taxonomic_profile.metaphlan2);
    assert_eq!(resolved.kaiju.levels, vec![KaijuRank::Phylum, KaijuRank::Genus]);
    assert_eq!(resolved.kaiju.threads, 12);
    assert_eq!(resolved.kaiju.nodes, Utf8PathBuf::from("/srv/db/kaiju/nodes.dmp"));
    assert_eq!(
        resolved.metaphlan2.heatmap.levels,
        vec![MetaphlanLevel::Genus, MetaphlanLevel::Species]
    );
    assert_eq!(resolved.metaphlan2.heatmap.top, 25);
    assert_eq!(
        resolved.host_removal.hg19_path,
        Utf8PathBuf::from("/srv/db/hg19")
    );
}

#[test]
fn relative_database_paths_become_absolute() {
    let config = Config {
        dbdir: Some("databases".to_string()),
        ..Config::default()
    };
    let resolved = ConfigLoader::resolve_config(config).unwrap();
    let cwd = Utf8PathBuf::from_path_buf(std::env::current_dir().unwrap()).unwrap();
    assert_eq!(resolved.dbdir, cwd.join("databases"));
    assert_eq!(
        resolved.metaphlan2.mpa_pkl,
        cwd.join("databases/metaphlan2/mpa_v20_m200.pkl")
    );
    assert!(resolved.kaiju.names.is_absolute());
    assert!(resolved.host_removal.hg19_path.is_absolute());
}

#[test]
fn unreadable_file_is_config_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.json");
    assert_matches!(
        ConfigLoader::resolve(path.to_str()),
        Err(KiraError::ConfigRead(_))
    );
}

#[test]
fn malformed_json_is_config_parse() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kira-mg.json");
    fs::write(&path, "{ not json").unwrap();
    assert_matches!(
        ConfigLoader::resolve(path.to_str()),
        Err(KiraError::ConfigParse(_))
    );
}

#[test]
fn pattern_without_readpair_is_invalid() {
    let config = Config {
        input_fn_pattern: Some("{sample}.fastq.gz".to_string()),
        ..Config::default()
    };
    assert_matches!(
        ConfigLoader::resolve_config(config),
        Err(KiraError::InvalidConfig(_))
    );
}

#[test]
fn zero_threads_are_invalid() {
    let mut config = Config::default();
    config.metawrap.threads = 0;
    assert_matches!(
        ConfigLoader::resolve_config(config),
        Err(KiraError::InvalidConfig(message)) if message.contains("metawrap")
    );
}

#[test]
fn unknown_level_is_rejected() {
    let mut config = Config::default();
    config.kaiju.levels = vec!["strain".to_string()];
    assert_matches!(
        ConfigLoader::resolve_config(config),
        Err(KiraError::InvalidLevel(_))
    );
}

#[test]
fn out_of_range_refinement_thresholds_are_rejected() {
    let mut config = Config::default();
    config.metawrap.completeness = 120;
    assert_matches!(
        ConfigLoader::resolve_config(config),
        Err(KiraError::InvalidConfig(_))
    );
}

#[test]
fn default_document_round_trips() {
    let json = serde_json::to_string_pretty(&default_config()).unwrap();
    let parsed: Config = serde_json::from_str(&json).unwrap();
    let resolved = ConfigLoader::resolve_config(parsed).unwrap();
    assert!(resolved.qc_reads);
    assert!(resolved.taxonomic_profile.metaphlan2);
    assert!(!resolved.assembly);
    assert_eq!(resolved.bbduk.threads, 4);
}
