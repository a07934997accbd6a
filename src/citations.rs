use std::collections::BTreeSet;

use serde::Serialize;

/// One bibliographic record, stored as its lines in print order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Citation(Vec<String>);

impl Citation {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(lines.into_iter().map(Into::into).collect())
    }

    pub fn lines(&self) -> &[String] {
        &self.0
    }
}

/// Ordered and deduplicated; inserting the same record twice keeps one copy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CitationSet(BTreeSet<Citation>);

impl CitationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, citation: Citation) -> bool {
        self.0.insert(citation)
    }

    pub fn extend<I: IntoIterator<Item = Citation>>(&mut self, citations: I) {
        self.0.extend(citations);
    }

    pub fn union(mut self, other: CitationSet) -> Self {
        self.0.extend(other.0);
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Citation> {
        self.0.iter()
    }

    pub fn contains(&self, citation: &Citation) -> bool {
        self.0.contains(citation)
    }

    /// reStructuredText bullet list, one record per bullet.
    pub fn render(&self) -> String {
        let mut out = String::from("Citations\n=========\n\n");
        for citation in &self.0 {
            let mut lines = citation.lines().iter();
            if let Some(first) = lines.next() {
                out.push_str("- ");
                out.push_str(first);
                out.push('\n');
            }
            for line in lines {
                out.push_str("  ");
                out.push_str(line);
                out.push('\n');
            }
            out.push('\n');
        }
        out
    }
}

impl FromIterator<Citation> for CitationSet {
    fn from_iter<I: IntoIterator<Item = Citation>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

pub fn fastqc() -> Citation {
    Citation::new([
        "Andrews, S. (2010).",
        "FastQC: a quality control tool for high throughput sequence data.",
        "Available online at: http://www.bioinformatics.babraham.ac.uk/projects/fastqc",
    ])
}

pub fn bbmap() -> Citation {
    Citation::new([
        "Bushnell, B. (2016).",
        "BBMap short read aligner.",
        "University of California, Berkeley, California.",
        "Available online at: http://sourceforge.net/projects/bbmap",
    ])
}

pub fn kaiju() -> Citation {
    Citation::new([
        "Menzel, P., Ng, K.L., Krogh, A. (2016).",
        "Fast and sensitive taxonomic classification for metagenomics with Kaiju.",
        "Nature Communications 7:11257",
    ])
}

pub fn krona() -> Citation {
    Citation::new([
        "Ondov, B.D., Bergman, N.H., Phillippy, A.M. (2011).",
        "Interactive metagenomic visualization in a Web browser.",
        "BMC Bioinformatics 12:385",
    ])
}

pub fn metaphlan2() -> Citation {
    Citation::new([
        "Truong, D.T., Franzosa, E.A., Tickle, T.L., Scholz, M., Weingart, G., Pasolli, E., Tett, A., Huttenhower, C., Segata, N. (2015).",
        "MetaPhlAn2 for enhanced metagenomic taxonomic profiling.",
        "Nature Methods 12:902-903",
    ])
}

pub fn metawrap() -> Citation {
    Citation::new([
        "Uritskiy, G.V., DiRuggiero, J., Taylor, J. (2018).",
        "MetaWRAP - a flexible pipeline for genome-resolved metagenomic data analysis.",
        "Microbiome 6:158",
    ])
}

pub fn megahit() -> Citation {
    Citation::new([
        "Li, D., Liu, C.M., Luo, R., Sadakane, K., Lam, T.W. (2015).",
        "MEGAHIT: an ultra-fast single-node solution for large and complex metagenomics assembly via succinct de Bruijn graph.",
        "Bioinformatics 31:1674-1676",
    ])
}

pub fn concoct() -> Citation {
    Citation::new([
        "Alneberg, J., Bjarnason, B.S., de Bruijn, I., Schirmer, M., Quick, J., Ijaz, U.Z., Lahti, L., Loman, N.J., Andersson, A.F., Quince, C. (2014).",
        "Binning metagenomic contigs by coverage and composition.",
        "Nature Methods 11:1144-1146",
    ])
}

pub fn metabat2() -> Citation {
    Citation::new([
        "Kang, D.D., Froula, J., Egan, R., Wang, Z. (2015).",
        "MetaBAT, an efficient tool for accurately reconstructing single genomes from complex microbial communities.",
        "PeerJ 3:e1165",
    ])
}

pub fn maxbin2() -> Citation {
    Citation::new([
        "Wu, Y.W., Simmons, B.A., Singer, S.W. (2016).",
        "MaxBin 2.0: an automated binning algorithm to recover genomes from multiple metagenomic datasets.",
        "Bioinformatics 32:605-607",
    ])
}

pub fn blobology() -> Citation {
    Citation::new([
        "Kumar, S., Jones, M., Koutsovoulos, G., Clarke, M., Blaxter, M. (2013).",
        "Blobology: exploring raw genome data for contaminants, symbionts and parasites using taxon-annotated GC-coverage plots.",
        "Frontiers in Genetics 4:237",
    ])
}
