#![allow(dead_code)]

use std::collections::BTreeSet;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::TempDir;

use kira_metagenome_workflow::config::{Config, ConfigLoader, ResolvedConfig, TaxonomicProfile};
use kira_metagenome_workflow::domain::SampleName;

/// A project directory with paired reads and stub reference databases.
pub struct Project {
    _dir: TempDir,
    pub root: Utf8PathBuf,
}

impl Project {
    pub fn new(samples: &[&str]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();

        let input = root.join("input");
        fs::create_dir_all(&input).unwrap();
        for sample in samples {
            for pair in [1, 2] {
                fs::write(
                    input.join(format!("{sample}_R{pair}.fastq.gz")),
                    b"@r\nACGT\n+\nIIII\n",
                )
                .unwrap();
            }
        }

        let db = root.join("databases");
        fs::create_dir_all(db.join("hg19")).unwrap();
        fs::create_dir_all(db.join("kaiju")).unwrap();
        fs::create_dir_all(db.join("metaphlan2")).unwrap();
        for file in [
            "kaiju/kaiju_db.fmi",
            "kaiju/nodes.dmp",
            "kaiju/names.dmp",
            "metaphlan2/mpa_v20_m200.pkl",
        ] {
            fs::write(db.join(file), b"").unwrap();
        }

        Self { _dir: dir, root }
    }

    /// QC on, host removal off, MetaPhlAn2 on; `edit` adjusts the rest.
    pub fn config(&self, edit: impl FnOnce(&mut Config)) -> ResolvedConfig {
        let mut config = Config {
            inputdir: Some(self.root.join("input").to_string()),
            outdir: Some(self.root.join("out").to_string()),
            dbdir: Some(self.root.join("databases").to_string()),
            qc_reads: Some(true),
            remove_human: Some(false),
            taxonomic_profile: TaxonomicProfile {
                kaiju: false,
                metaphlan2: true,
            },
            ..Config::default()
        };
        edit(&mut config);
        ConfigLoader::resolve_config(config).unwrap()
    }

    pub fn out(&self, relative: &str) -> Utf8PathBuf {
        self.root.join("out").join(relative)
    }

    pub fn path(&self, relative: &str) -> Utf8PathBuf {
        self.root.join(relative)
    }

    pub fn remove(&self, relative: &str) {
        let path: &Utf8Path = &self.root.join(relative);
        if path.is_dir() {
            fs::remove_dir_all(path).unwrap();
        } else {
            fs::remove_file(path).unwrap();
        }
    }
}

pub fn samples(names: &[&str]) -> BTreeSet<SampleName> {
    names.iter().map(|name| name.parse().unwrap()).collect()
}
