use assert_matches::assert_matches;

use kira_metagenome_workflow::domain::{KaijuRank, MetaphlanLevel, ReadPair, SampleName};
use kira_metagenome_workflow::error::KiraError;

#[test]
fn parse_sample_name_valid() {
    let sample: SampleName = "ABC-01_x".parse().unwrap();
    assert_eq!(sample.as_str(), "ABC-01_x");
}

#[test]
fn parse_sample_name_invalid() {
    for bad in ["", "a/b", "a b", "a,b", "a\\b"] {
        let err = bad.parse::<SampleName>().unwrap_err();
        assert_matches!(err, KiraError::InvalidSampleName(_));
    }
}

#[test]
fn read_pair_numbers() {
    assert_eq!(ReadPair::BOTH.map(ReadPair::number), [1, 2]);
    assert_eq!("2".parse::<ReadPair>().unwrap(), ReadPair::R2);
    assert!("3".parse::<ReadPair>().is_err());
}

#[test]
fn metaphlan_level_accepts_letters_and_names() {
    assert_eq!("g".parse::<MetaphlanLevel>().unwrap(), MetaphlanLevel::Genus);
    assert_eq!(
        "species".parse::<MetaphlanLevel>().unwrap(),
        MetaphlanLevel::Species
    );
    assert_eq!(MetaphlanLevel::Species.flag(), "s");
    assert_eq!(MetaphlanLevel::Family.to_string(), "family");
}

#[test]
fn kaiju_rank_rejects_unknown() {
    assert_eq!("phylum".parse::<KaijuRank>().unwrap(), KaijuRank::Phylum);
    assert_matches!("strain".parse::<KaijuRank>(), Err(KiraError::InvalidLevel(_)));
}
