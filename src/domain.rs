use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::KiraError;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SampleName(String);

impl SampleName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SampleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SampleName {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let is_valid = !value.is_empty()
            && !value
                .chars()
                .any(|ch| ch == '/' || ch == '\\' || ch.is_whitespace() || ch == ',');
        if !is_valid {
            return Err(KiraError::InvalidSampleName(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReadPair {
    R1,
    R2,
}

impl ReadPair {
    pub const BOTH: [ReadPair; 2] = [ReadPair::R1, ReadPair::R2];

    pub fn number(self) -> u8 {
        match self {
            ReadPair::R1 => 1,
            ReadPair::R2 => 2,
        }
    }
}

impl fmt::Display for ReadPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

impl FromStr for ReadPair {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "1" => Ok(ReadPair::R1),
            "2" => Ok(ReadPair::R2),
            other => Err(KiraError::InvalidPattern(format!(
                "readpair must be 1 or 2, got {other}"
            ))),
        }
    }
}

/// Ranks accepted by `kaiju2table -r`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KaijuRank {
    Phylum,
    Class,
    Order,
    Family,
    Genus,
    Species,
}

impl fmt::Display for KaijuRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            KaijuRank::Phylum => "phylum",
            KaijuRank::Class => "class",
            KaijuRank::Order => "order",
            KaijuRank::Family => "family",
            KaijuRank::Genus => "genus",
            KaijuRank::Species => "species",
        };
        write!(f, "{value}")
    }
}

impl FromStr for KaijuRank {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "phylum" => Ok(KaijuRank::Phylum),
            "class" => Ok(KaijuRank::Class),
            "order" => Ok(KaijuRank::Order),
            "family" => Ok(KaijuRank::Family),
            "genus" => Ok(KaijuRank::Genus),
            "species" => Ok(KaijuRank::Species),
            _ => Err(KiraError::InvalidLevel(value.to_string())),
        }
    }
}

/// Taxonomic levels understood by `metaphlan_hclust_heatmap.py --tax_lev`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetaphlanLevel {
    Kingdom,
    Phylum,
    Class,
    Order,
    Family,
    Genus,
    Species,
}

impl MetaphlanLevel {
    pub fn flag(self) -> &'static str {
        match self {
            MetaphlanLevel::Kingdom => "k",
            MetaphlanLevel::Phylum => "p",
            MetaphlanLevel::Class => "c",
            MetaphlanLevel::Order => "o",
            MetaphlanLevel::Family => "f",
            MetaphlanLevel::Genus => "g",
            MetaphlanLevel::Species => "s",
        }
    }
}

impl fmt::Display for MetaphlanLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            MetaphlanLevel::Kingdom => "kingdom",
            MetaphlanLevel::Phylum => "phylum",
            MetaphlanLevel::Class => "class",
            MetaphlanLevel::Order => "order",
            MetaphlanLevel::Family => "family",
            MetaphlanLevel::Genus => "genus",
            MetaphlanLevel::Species => "species",
        };
        write!(f, "{value}")
    }
}

impl FromStr for MetaphlanLevel {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "k" | "kingdom" => Ok(MetaphlanLevel::Kingdom),
            "p" | "phylum" => Ok(MetaphlanLevel::Phylum),
            "c" | "class" => Ok(MetaphlanLevel::Class),
            "o" | "order" => Ok(MetaphlanLevel::Order),
            "f" | "family" => Ok(MetaphlanLevel::Family),
            "g" | "genus" => Ok(MetaphlanLevel::Genus),
            "s" | "species" => Ok(MetaphlanLevel::Species),
            _ => Err(KiraError::InvalidLevel(value.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn sample_name_rejects_separators() {
        assert!("s1".parse::<SampleName>().is_ok());
        let err = "a/b".parse::<SampleName>().unwrap_err();
        assert_matches!(err, KiraError::InvalidSampleName(_));
        assert!("".parse::<SampleName>().is_err());
    }

    #[test]
    fn metaphlan_level_accepts_short_flags() {
        let level: MetaphlanLevel = "g".parse().unwrap();
        assert_eq!(level, MetaphlanLevel::Genus);
        assert_eq!(level.flag(), "g");
        assert_eq!(level.to_string(), "genus");
    }
}
