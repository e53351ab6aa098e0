//! Per-organism, per-amino-acid GO enrichment reports.
//!
//! Each report is a tab-separated table with one header line followed by
//! rows of 12 columns, or 13 when the associated-protein list is present:
//!
//! ```text
//! GO  NS  e/p  name  ratio_in_study  ratio_in_pop  p_uncorrected  depth
//! study_count  p_bonferroni  p_sidak  p_holm  [study_items]
//! ```

use std::collections::BTreeMap;
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use csv::{ReaderBuilder, StringRecord};
use tracing::{debug, info};

use crate::error::{Result, SharingError};
use crate::models::{
    AminoAcid, Dataset, Direction, GoTermRecord, OntologyBranch, Organism, Ratio, ReportRow,
};

const REQUIRED_COLUMNS: usize = 12;
const WITH_PROTEINS_COLUMNS: usize = 13;

pub fn report_file_name(organism: &str, category: AminoAcid) -> String {
    format!("{}_{}_GO_RESULTS.tsv", organism, category.letter())
}

/// The enrichment report of one (organism, category) pair.
pub struct EnrichmentReport {
    pub path: PathBuf,
    pub organism: String,
    pub category: AminoAcid,
    pub significance: f64,
}

impl EnrichmentReport {
    pub fn locate(data_dir: &Path, organism: &str, category: AminoAcid, significance: f64) -> Self {
        EnrichmentReport {
            path: data_dir.join(report_file_name(organism, category)),
            organism: organism.to_string(),
            category,
            significance,
        }
    }

    /// Every data row of the report. A missing report means no LCDs of this
    /// class were found in the organism, so it yields no rows.
    pub fn rows(&self) -> Result<Vec<ReportRow>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No report at {}, treating as empty", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(SharingError::io(&self.path, e)),
        };

        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .quoting(false)
            .from_reader(file);

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|source| SharingError::Csv {
                path: self.path.clone(),
                source,
            })?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            rows.push(parse_row(&record, &self.path, line)?);
        }
        Ok(rows)
    }

    fn is_significant(&self, row: &ReportRow) -> bool {
        row.direction == Direction::Enrichment && row.p_sidak < self.significance
    }
}

impl Dataset for EnrichmentReport {
    type Output = Vec<GoTermRecord>;

    fn load(&self) -> Result<Vec<GoTermRecord>> {
        let rows = self.rows()?;
        let total = rows.len();
        let records: Vec<GoTermRecord> = rows
            .into_iter()
            .filter(|row| self.is_significant(row))
            .map(|row| GoTermRecord::from_row(row, &self.organism, self.category))
            .collect();
        debug!(
            "{} {}: {} of {} rows enriched at p_sidak < {}",
            self.organism,
            self.category,
            records.len(),
            total,
            self.significance
        );
        Ok(records)
    }
}

/// Parses one report row, accepting the 12- and 13-column shapes.
pub fn parse_row(record: &StringRecord, path: &Path, line: u64) -> Result<ReportRow> {
    let fields: Vec<&str> = record.iter().collect();
    // trailing empty cells are whitespace, not columns
    let mut len = fields.len();
    while len > REQUIRED_COLUMNS && fields[len - 1].trim().is_empty() {
        len -= 1;
    }
    if len != REQUIRED_COLUMNS && len != WITH_PROTEINS_COLUMNS {
        return Err(SharingError::MalformedRow {
            path: path.to_path_buf(),
            line,
            found: len,
        });
    }

    let invalid = |field: &'static str, value: &str| SharingError::InvalidField {
        path: path.to_path_buf(),
        line,
        field,
        value: value.to_string(),
    };
    fn parse<T: FromStr>(value: &str) -> Option<T> {
        value.trim().parse().ok()
    }

    let flag = fields[2].trim();
    let direction = Direction::from_flag(flag).ok_or_else(|| SharingError::UnknownDirection {
        path: path.to_path_buf(),
        line,
        flag: flag.to_string(),
    })?;

    let associated_proteins = if len == WITH_PROTEINS_COLUMNS {
        fields[12]
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    } else {
        Vec::new()
    };

    Ok(ReportRow {
        go_id: fields[0].trim().to_string(),
        branch: OntologyBranch::from_code(fields[1].trim()),
        direction,
        description: fields[3].trim().to_string(),
        ratio_in_list: parse(fields[4]).ok_or_else(|| invalid("ratio_in_list", fields[4]))?,
        ratio_in_population: parse::<Ratio>(fields[5])
            .ok_or_else(|| invalid("ratio_in_population", fields[5]))?,
        p_uncorrected: parse(fields[6]).ok_or_else(|| invalid("p_uncorrected", fields[6]))?,
        depth: parse(fields[7]).ok_or_else(|| invalid("depth", fields[7]))?,
        n_proteins: parse(fields[8]).ok_or_else(|| invalid("n_proteins", fields[8]))?,
        p_bonferroni: parse(fields[9]).ok_or_else(|| invalid("p_bonferroni", fields[9]))?,
        p_sidak: parse(fields[10]).ok_or_else(|| invalid("p_sidak", fields[10]))?,
        p_holm: parse(fields[11]).ok_or_else(|| invalid("p_holm", fields[11]))?,
        associated_proteins,
    })
}

/// Observed enrichment counts per (category, organism).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichmentCounts {
    counts: BTreeMap<AminoAcid, BTreeMap<String, usize>>,
}

impl EnrichmentCounts {
    pub fn set(&mut self, category: AminoAcid, organism: &str, count: usize) {
        self.counts
            .entry(category)
            .or_default()
            .insert(organism.to_string(), count);
    }

    /// Zero for pairs that were never recorded.
    pub fn get(&self, category: AminoAcid, organism: &str) -> usize {
        self.counts
            .get(&category)
            .and_then(|by_org| by_org.get(organism))
            .copied()
            .unwrap_or(0)
    }

    pub fn total(&self, category: AminoAcid) -> usize {
        self.counts
            .get(&category)
            .map(|by_org| by_org.values().sum())
            .unwrap_or(0)
    }
}

/// Every significant record plus the per-pair counts derived from them.
#[derive(Debug, Clone, Default)]
pub struct ObservedEnrichment {
    pub records: Vec<GoTermRecord>,
    pub counts: EnrichmentCounts,
}

pub fn load_observed(
    data_dir: &Path,
    organisms: &[Organism],
    categories: &[AminoAcid],
    significance: f64,
) -> Result<ObservedEnrichment> {
    info!(
        "Reading enrichment reports for {} organisms x {} categories from {}",
        organisms.len(),
        categories.len(),
        data_dir.display()
    );

    let mut observed = ObservedEnrichment::default();
    for &category in categories {
        for organism in organisms {
            let report = EnrichmentReport::locate(data_dir, &organism.code, category, significance);
            let records = report.load()?;
            observed.counts.set(category, &organism.code, records.len());
            observed.records.extend(records);
        }
        debug!(
            "{}: {} enriched GO terms across organisms",
            category,
            observed.counts.total(category)
        );
    }

    info!("Loaded {} enriched GO-term records", observed.records.len());
    Ok(observed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const HEADER: &str = "GO\tNS\tenrichment\tname\tratio_in_study\tratio_in_pop\tp_uncorrected\tdepth\tstudy_count\tp_bonferroni\tp_sidak\tp_holm\tstudy_items";

    fn write_report(dir: &Path, organism: &str, category: AminoAcid, rows: &[&str]) {
        let mut text = String::from(HEADER);
        for row in rows {
            text.push('\n');
            text.push_str(row);
        }
        text.push('\n');
        fs::write(dir.join(report_file_name(organism, category)), text).unwrap();
    }

    fn record(fields: &[&str]) -> StringRecord {
        StringRecord::from(fields.to_vec())
    }

    const ROW_12: [&str; 12] = [
        "GO:0003723", "MF", "e", "RNA binding", "12/80", "900/6000", "1.2e-08", "4", "12",
        "3.0e-05", "2.9e-05", "3.0e-05",
    ];

    #[test]
    fn twelve_and_thirteen_columns_share_fields() {
        let path = Path::new("Hsapiens_A_GO_RESULTS.tsv");
        let short = parse_row(&record(&ROW_12), path, 2).unwrap();

        let mut long_fields = ROW_12.to_vec();
        long_fields.push("P12345, Q67890");
        let long = parse_row(&record(&long_fields), path, 3).unwrap();

        assert!(short.associated_proteins.is_empty());
        assert_eq!(long.associated_proteins, vec!["P12345", "Q67890"]);
        assert_eq!(
            ReportRow {
                associated_proteins: Vec::new(),
                ..long
            },
            short
        );
        assert_eq!(short.go_id, "GO:0003723");
        assert_eq!(short.branch, OntologyBranch::MolecularFunction);
        assert_eq!(short.ratio_in_list, Ratio { hits: 12, total: 80 });
        assert_eq!(short.depth, 4);
        assert!((short.p_sidak - 2.9e-05).abs() < 1e-12);
    }

    #[test]
    fn trailing_empty_cells_are_ignored() {
        let mut fields = ROW_12.to_vec();
        fields.push("");
        fields.push("");
        let row = parse_row(&record(&fields), Path::new("x.tsv"), 2).unwrap();
        assert!(row.associated_proteins.is_empty());
    }

    #[test]
    fn wrong_column_count_names_file_and_line() {
        let err = parse_row(&record(&ROW_12[..10]), Path::new("Celegans_Q_GO_RESULTS.tsv"), 7)
            .unwrap_err();
        match &err {
            SharingError::MalformedRow { path, line, found } => {
                assert_eq!(path, Path::new("Celegans_Q_GO_RESULTS.tsv"));
                assert_eq!(*line, 7);
                assert_eq!(*found, 10);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(err.to_string().contains("Celegans_Q_GO_RESULTS.tsv:7"));
    }

    #[test]
    fn unknown_direction_flag_is_an_error() {
        let mut fields = ROW_12.to_vec();
        fields[2] = "x";
        let err = parse_row(&record(&fields), Path::new("r.tsv"), 4).unwrap_err();
        assert!(matches!(err, SharingError::UnknownDirection { line: 4, .. }));
    }

    #[test]
    fn bad_p_value_is_an_error() {
        let mut fields = ROW_12.to_vec();
        fields[10] = "n.a.";
        let err = parse_row(&record(&fields), Path::new("r.tsv"), 5).unwrap_err();
        assert!(matches!(
            err,
            SharingError::InvalidField { field: "p_sidak", line: 5, .. }
        ));
    }

    #[test]
    fn only_significant_enrichment_is_kept() {
        let dir = tempdir().unwrap();
        write_report(
            dir.path(),
            "Drerio",
            AminoAcid::Gln,
            &[
                "GO:0000001\tBP\te\tkept\t5/40\t50/9000\t1e-9\t3\t5\t1e-6\t0.01\t1e-6\tA,B",
                "GO:0000002\tBP\tp\tpurified\t0/40\t900/9000\t1e-9\t3\t0\t1e-6\t0.01\t1e-6",
                "GO:0000003\tCC\te\tborderline\t5/40\t50/9000\t1e-4\t3\t5\t0.05\t0.05\t0.05\tC",
                "GO:0000004\tMF\te\talso kept\t5/40\t50/9000\t1e-9\t3\t5\t0.04\t0.049\t0.04",
            ],
        );

        let report = EnrichmentReport::locate(dir.path(), "Drerio", AminoAcid::Gln, 0.05);
        assert_eq!(report.rows().unwrap().len(), 4);
        let records = report.load().unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.go_id.as_str()).collect();
        assert_eq!(ids, vec!["GO:0000001", "GO:0000004"]);
        assert!(records.iter().all(|r| r.organism == "Drerio" && r.category == AminoAcid::Gln));
    }

    #[test]
    fn malformed_file_row_reports_physical_line() {
        let dir = tempdir().unwrap();
        write_report(
            dir.path(),
            "Mmusculus",
            AminoAcid::Ser,
            &[
                "GO:0000001\tBP\te\tfine\t5/40\t50/9000\t1e-9\t3\t5\t1e-6\t0.01\t1e-6",
                "GO:0000002\tBP\te\ttruncated\t5/40",
            ],
        );
        let report = EnrichmentReport::locate(dir.path(), "Mmusculus", AminoAcid::Ser, 0.05);
        let err = report.load().unwrap_err();
        assert!(matches!(err, SharingError::MalformedRow { line: 3, found: 5, .. }));
    }

    #[test]
    fn unreadable_row_names_the_report() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(report_file_name("Drerio", AminoAcid::Asn));
        let mut bytes = format!("{HEADER}\nGO:0000001\tBP\te\t").into_bytes();
        bytes.extend_from_slice(&[0xff, 0xfe]);
        bytes.extend_from_slice(b"\t5/40\t50/9000\t1e-9\t3\t5\t1e-6\t0.01\t1e-6\n");
        fs::write(&path, bytes).unwrap();

        let report = EnrichmentReport::locate(dir.path(), "Drerio", AminoAcid::Asn, 0.05);
        let err = report.load().unwrap_err();
        assert!(matches!(&err, SharingError::Csv { path: p, .. } if p == &path));
        assert!(err.to_string().contains("Drerio_N_GO_RESULTS.tsv"));
    }

    #[test]
    fn missing_report_counts_as_zero() {
        let dir = tempdir().unwrap();
        let organisms = vec![Organism::new("Xlaevis", "UP000186698_8355_Xlaevis_NoIsoforms")];
        let observed =
            load_observed(dir.path(), &organisms, &[AminoAcid::Trp], 0.05).unwrap();
        assert!(observed.records.is_empty());
        assert_eq!(observed.counts.get(AminoAcid::Trp, "Xlaevis"), 0);
    }

    #[test]
    fn counts_follow_filtered_records() {
        let dir = tempdir().unwrap();
        let row = |id: &str, flag: &str| {
            format!("{id}\tBP\t{flag}\tterm\t5/40\t50/9000\t1e-9\t3\t5\t1e-6\t0.001\t1e-6")
        };
        let (a, b, c) = (row("GO:1", "e"), row("GO:2", "e"), row("GO:3", "p"));
        write_report(dir.path(), "Hsapiens", AminoAcid::Ala, &[&a, &b, &c]);
        write_report(dir.path(), "Celegans", AminoAcid::Ala, &[&a]);

        let organisms = vec![
            Organism::new("Hsapiens", "h"),
            Organism::new("Celegans", "c"),
            Organism::new("Xlaevis", "x"),
        ];
        let observed =
            load_observed(dir.path(), &organisms, &[AminoAcid::Ala, AminoAcid::Cys], 0.05)
                .unwrap();
        assert_eq!(observed.counts.get(AminoAcid::Ala, "Hsapiens"), 2);
        assert_eq!(observed.counts.get(AminoAcid::Ala, "Celegans"), 1);
        assert_eq!(observed.counts.get(AminoAcid::Ala, "Xlaevis"), 0);
        assert_eq!(observed.counts.total(AminoAcid::Ala), 3);
        assert_eq!(observed.counts.total(AminoAcid::Cys), 0);
        assert_eq!(observed.records.len(), 3);
    }
}
