use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A flat-file input of the pipeline.
pub trait Dataset {
    type Output;

    fn load(&self) -> crate::error::Result<Self::Output>;
}

/// Low-complexity-domain class, keyed by the amino acid that dominates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AminoAcid {
    Ala,
    Cys,
    Asp,
    Glu,
    Phe,
    Gly,
    His,
    Ile,
    Lys,
    Leu,
    Met,
    Asn,
    Pro,
    Gln,
    Arg,
    Ser,
    Thr,
    Val,
    Trp,
    Tyr,
}

impl AminoAcid {
    /// All categories in one-letter alphabetical order (`ACDEFGHIKLMNPQRSTVWY`).
    pub const ALL: [AminoAcid; 20] = [
        AminoAcid::Ala,
        AminoAcid::Cys,
        AminoAcid::Asp,
        AminoAcid::Glu,
        AminoAcid::Phe,
        AminoAcid::Gly,
        AminoAcid::His,
        AminoAcid::Ile,
        AminoAcid::Lys,
        AminoAcid::Leu,
        AminoAcid::Met,
        AminoAcid::Asn,
        AminoAcid::Pro,
        AminoAcid::Gln,
        AminoAcid::Arg,
        AminoAcid::Ser,
        AminoAcid::Thr,
        AminoAcid::Val,
        AminoAcid::Trp,
        AminoAcid::Tyr,
    ];

    pub fn letter(self) -> char {
        match self {
            AminoAcid::Ala => 'A',
            AminoAcid::Cys => 'C',
            AminoAcid::Asp => 'D',
            AminoAcid::Glu => 'E',
            AminoAcid::Phe => 'F',
            AminoAcid::Gly => 'G',
            AminoAcid::His => 'H',
            AminoAcid::Ile => 'I',
            AminoAcid::Lys => 'K',
            AminoAcid::Leu => 'L',
            AminoAcid::Met => 'M',
            AminoAcid::Asn => 'N',
            AminoAcid::Pro => 'P',
            AminoAcid::Gln => 'Q',
            AminoAcid::Arg => 'R',
            AminoAcid::Ser => 'S',
            AminoAcid::Thr => 'T',
            AminoAcid::Val => 'V',
            AminoAcid::Trp => 'W',
            AminoAcid::Tyr => 'Y',
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AminoAcid::Ala => "Alanine",
            AminoAcid::Cys => "Cysteine",
            AminoAcid::Asp => "Aspartic Acid",
            AminoAcid::Glu => "Glutamic Acid",
            AminoAcid::Phe => "Phenylalanine",
            AminoAcid::Gly => "Glycine",
            AminoAcid::His => "Histidine",
            AminoAcid::Ile => "Isoleucine",
            AminoAcid::Lys => "Lysine",
            AminoAcid::Leu => "Leucine",
            AminoAcid::Met => "Methionine",
            AminoAcid::Asn => "Asparagine",
            AminoAcid::Pro => "Proline",
            AminoAcid::Gln => "Glutamine",
            AminoAcid::Arg => "Arginine",
            AminoAcid::Ser => "Serine",
            AminoAcid::Thr => "Threonine",
            AminoAcid::Val => "Valine",
            AminoAcid::Trp => "Tryptophan",
            AminoAcid::Tyr => "Tyrosine",
        }
    }

    /// Panel title, e.g. `Alanine (A)`.
    pub fn display_name(self) -> String {
        format!("{} ({})", self.name(), self.letter())
    }

    pub fn from_letter(letter: char) -> Option<AminoAcid> {
        AminoAcid::ALL
            .into_iter()
            .find(|aa| aa.letter() == letter.to_ascii_uppercase())
    }

    /// Position in [`AminoAcid::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for AminoAcid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl FromStr for AminoAcid {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => {
                AminoAcid::from_letter(c).ok_or_else(|| format!("unknown amino acid '{}'", s))
            }
            _ => Err(format!("unknown amino acid '{}'", s)),
        }
    }
}

/// An organism whose proteome was screened, e.g. `Scerevisiae`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organism {
    pub code: String,
    pub proteome: String,
}

impl Organism {
    pub fn new(code: &str, proteome: &str) -> Self {
        Organism {
            code: code.to_string(),
            proteome: proteome.to_string(),
        }
    }
}

/// The seven model eukaryotes of the reference analysis.
pub fn reference_organisms() -> Vec<Organism> {
    vec![
        Organism::new("Scerevisiae", "UP000002311_Scerevisiae_NoIsoforms"),
        Organism::new("Celegans", "UP000001940_6239_Celegans_NoIsoforms"),
        Organism::new("Dmelanogaster", "UP000000803_7227_Dmelanogaster_NoIsoforms"),
        Organism::new("Drerio", "UP000000437_7955_Drerio_NoIsoforms"),
        Organism::new("Xlaevis", "UP000186698_8355_Xlaevis_NoIsoforms"),
        Organism::new("Mmusculus", "UP000000589_10090_Mmusculus_NoIsoforms"),
        Organism::new("Hsapiens", "UP000005640_9606_Hsapiens_NoIsoforms"),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Enrichment,
    Purification,
}

impl Direction {
    pub fn from_flag(flag: &str) -> Option<Direction> {
        match flag {
            "e" => Some(Direction::Enrichment),
            "p" => Some(Direction::Purification),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OntologyBranch {
    BiologicalProcess,
    MolecularFunction,
    CellularComponent,
    Other(String),
}

impl OntologyBranch {
    pub fn from_code(code: &str) -> OntologyBranch {
        match code {
            "BP" => OntologyBranch::BiologicalProcess,
            "MF" => OntologyBranch::MolecularFunction,
            "CC" => OntologyBranch::CellularComponent,
            other => OntologyBranch::Other(other.to_string()),
        }
    }
}

/// A `hits/total` ratio column such as `12/340`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ratio {
    pub hits: u32,
    pub total: u32,
}

impl FromStr for Ratio {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hits, total) = s.trim().split_once('/').ok_or(())?;
        Ok(Ratio {
            hits: hits.trim().parse().map_err(|_| ())?,
            total: total.trim().parse().map_err(|_| ())?,
        })
    }
}

/// One data row of an enrichment report, as written by the upstream GO tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub go_id: String,
    pub branch: OntologyBranch,
    pub direction: Direction,
    pub description: String,
    pub ratio_in_list: Ratio,
    pub ratio_in_population: Ratio,
    pub p_uncorrected: f64,
    pub depth: u32,
    pub n_proteins: u32,
    pub p_bonferroni: f64,
    pub p_sidak: f64,
    pub p_holm: f64,
    /// Empty when the report omits the trailing column.
    pub associated_proteins: Vec<String>,
}

/// A GO term found significantly enriched for one organism and category.
#[derive(Debug, Clone, PartialEq)]
pub struct GoTermRecord {
    pub go_id: String,
    pub description: String,
    pub organism: String,
    pub category: AminoAcid,
    pub branch: OntologyBranch,
    pub p_sidak: f64,
}

impl GoTermRecord {
    pub fn from_row(row: ReportRow, organism: &str, category: AminoAcid) -> Self {
        GoTermRecord {
            go_id: row.go_id,
            description: row.description,
            organism: organism.to_string(),
            category,
            branch: row.branch,
            p_sidak: row.p_sidak,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amino_acids_follow_letter_order() {
        let letters: String = AminoAcid::ALL.iter().map(|aa| aa.letter()).collect();
        assert_eq!(letters, "ACDEFGHIKLMNPQRSTVWY");
        for (i, aa) in AminoAcid::ALL.iter().enumerate() {
            assert_eq!(aa.index(), i);
        }
    }

    #[test]
    fn amino_acid_parsing() {
        assert_eq!("W".parse::<AminoAcid>(), Ok(AminoAcid::Trp));
        assert_eq!(AminoAcid::from_letter('q'), Some(AminoAcid::Gln));
        assert!("B".parse::<AminoAcid>().is_err());
        assert!("AC".parse::<AminoAcid>().is_err());
        assert_eq!(AminoAcid::Asp.display_name(), "Aspartic Acid (D)");
    }

    #[test]
    fn ratio_parsing() {
        assert_eq!("3/120".parse::<Ratio>(), Ok(Ratio { hits: 3, total: 120 }));
        assert!("3-120".parse::<Ratio>().is_err());
        assert!("x/120".parse::<Ratio>().is_err());
    }

    #[test]
    fn direction_flags() {
        assert_eq!(Direction::from_flag("e"), Some(Direction::Enrichment));
        assert_eq!(Direction::from_flag("p"), Some(Direction::Purification));
        assert_eq!(Direction::from_flag("x"), None);
    }
}
