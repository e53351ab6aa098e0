//! Cached null-model baseline.
//!
//! The estimator is expensive, so its per-bucket summary is kept as a CSV
//! snapshot (`LCD Class, Number of Organisms, Mean, Std Dev, Std Error,
//! 95% CI`). Next to it, `<snapshot>.meta.json` records the organisms,
//! enrichment counts, trial count and seed the snapshot was computed from;
//! the snapshot is only valid while those are unchanged. Snapshots supplied from elsewhere carry
//! no fingerprint.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::analysis::null_model::{BucketSummary, NullDistribution};
use crate::config::NullModelConfig;
use crate::data_handling::enrichment_report::EnrichmentCounts;
use crate::error::{Result, SharingError};
use crate::helper_functions::{read_csv, write_atomic, write_csv_atomic};
use crate::models::{AminoAcid, Dataset};

pub const SNAPSHOT_COLUMNS: [&str; 6] = [
    "LCD Class",
    "Number of Organisms",
    "Mean",
    "Std Dev",
    "Std Error",
    "95% CI",
];

/// Expected per-trial value of every sharing-count bucket, `k = 1..=N` at
/// index `k - 1`.
pub type Baseline = BTreeMap<AminoAcid, Vec<BucketSummary>>;

pub fn baseline_from_null(distribution: &NullDistribution) -> Result<Baseline> {
    distribution
        .iter()
        .map(|(&category, tally)| Ok((category, tally.summary()?)))
        .collect()
}

/// The inputs a snapshot was computed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub organisms: Vec<String>,
    /// category letter -> organism -> observed enrichment count
    pub counts: BTreeMap<String, BTreeMap<String, usize>>,
    /// Zero in fingerprints written before trials were recorded.
    #[serde(default)]
    pub trials: usize,
    #[serde(default)]
    pub seed: u64,
}

impl Fingerprint {
    pub fn new(
        organisms: &[String],
        categories: &[AminoAcid],
        counts: &EnrichmentCounts,
        null_model: &NullModelConfig,
    ) -> Self {
        let counts = categories
            .iter()
            .map(|&category| {
                let by_org = organisms
                    .iter()
                    .map(|organism| (organism.clone(), counts.get(category, organism)))
                    .collect();
                (category.letter().to_string(), by_org)
            })
            .collect();
        Fingerprint {
            organisms: organisms.to_vec(),
            counts,
            trials: null_model.trials,
            seed: null_model.seed,
        }
    }
}

fn stat_values(b: &BucketSummary) -> [f64; 4] {
    [b.mean, b.std_dev, b.std_error, b.ci95]
}

pub struct BaselineSnapshot {
    pub path: PathBuf,
    pub max_sharing: usize,
}

impl BaselineSnapshot {
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn meta_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".meta.json");
        PathBuf::from(name)
    }

    /// `None` when the snapshot has no fingerprint next to it.
    pub fn fingerprint(&self) -> Result<Option<Fingerprint>> {
        let meta = self.meta_path();
        match File::open(&meta) {
            Ok(file) => Ok(Some(serde_json::from_reader(BufReader::new(file))?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SharingError::io(meta, e)),
        }
    }

    pub fn write(&self, baseline: &Baseline, fingerprint: &Fingerprint) -> Result<()> {
        let rows: Vec<(AminoAcid, &BucketSummary)> = baseline
            .iter()
            .flat_map(|(&category, buckets)| buckets.iter().map(move |b| (category, b)))
            .collect();

        let mut df = DataFrame::default();
        df.with_column(Series::new(
            PlSmallStr::from(SNAPSHOT_COLUMNS[0]),
            rows.iter()
                .map(|(category, _)| category.letter().to_string())
                .collect::<Vec<String>>(),
        ))?;
        df.with_column(Series::new(
            PlSmallStr::from(SNAPSHOT_COLUMNS[1]),
            rows.iter().map(|(_, b)| b.sharing as i64).collect::<Vec<i64>>(),
        ))?;
        for (i, name) in SNAPSHOT_COLUMNS[2..].iter().enumerate() {
            df.with_column(Series::new(
                PlSmallStr::from(*name),
                rows.iter().map(|(_, b)| stat_values(b)[i]).collect::<Vec<f64>>(),
            ))?;
        }

        write_csv_atomic(&mut df, &self.path)?;
        write_atomic(&self.meta_path(), |file| {
            serde_json::to_writer_pretty(file, fingerprint)?;
            Ok(())
        })?;
        info!(
            "Baseline snapshot ({} rows) written to {}",
            rows.len(),
            self.path.display()
        );
        Ok(())
    }

    fn invalid(&self, reason: impl Into<String>) -> SharingError {
        SharingError::Baseline {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }

    fn float_column(&self, df: &DataFrame, idx: usize) -> Result<Vec<f64>> {
        if idx >= df.width() {
            return Ok(vec![0.0; df.height()]);
        }
        let column = df.get_columns()[idx].cast(&DataType::Float64)?;
        column
            .f64()?
            .into_iter()
            .enumerate()
            .map(|(row, v)| {
                v.ok_or_else(|| self.invalid(format!("missing value in column {} row {}", idx + 1, row + 1)))
            })
            .collect()
    }
}

impl Dataset for BaselineSnapshot {
    type Output = Baseline;

    /// Columns are read by position: class, k, mean, SD, and optionally SE
    /// and CI (zero when absent).
    fn load(&self) -> Result<Baseline> {
        info!("Reading baseline snapshot from {}", self.path.display());
        let df = read_csv(&self.path)?;
        if df.width() < 4 {
            return Err(self.invalid(format!("expected at least 4 columns, found {}", df.width())));
        }

        let classes = df.get_columns()[0].cast(&DataType::String)?;
        let classes = classes.str()?;
        let ks = df.get_columns()[1].cast(&DataType::Int64)?;
        let ks = ks.i64()?;
        let means = self.float_column(&df, 2)?;
        let std_devs = self.float_column(&df, 3)?;
        let std_errors = self.float_column(&df, 4)?;
        let cis = self.float_column(&df, 5)?;

        let mut baseline = Baseline::new();
        for row in 0..df.height() {
            let class = classes
                .get(row)
                .ok_or_else(|| self.invalid(format!("missing class in row {}", row + 1)))?;
            let category: AminoAcid = class.parse().map_err(|e: String| self.invalid(e))?;
            let k = ks
                .get(row)
                .ok_or_else(|| self.invalid(format!("missing sharing count in row {}", row + 1)))?;
            if k < 1 || k as usize > self.max_sharing {
                return Err(self.invalid(format!(
                    "sharing count {} outside 1..={} in row {}",
                    k,
                    self.max_sharing,
                    row + 1
                )));
            }
            let k = k as usize;

            let buckets = baseline.entry(category).or_insert_with(|| {
                (1..=self.max_sharing)
                    .map(|sharing| BucketSummary {
                        sharing,
                        mean: 0.0,
                        std_dev: 0.0,
                        std_error: 0.0,
                        ci95: 0.0,
                    })
                    .collect()
            });
            buckets[k - 1] = BucketSummary {
                sharing: k,
                mean: means[row],
                std_dev: std_devs[row],
                std_error: std_errors[row],
                ci95: cis[row],
            };
        }
        debug!("Baseline covers {} categories", baseline.len());
        Ok(baseline)
    }
}

/// Whether `snapshot` may stand in for a fresh estimator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Missing,
    Fresh,
    Stale,
    /// Present but without a fingerprint.
    Unverified,
}

pub fn freshness(snapshot: &BaselineSnapshot, current: &Fingerprint) -> Result<Freshness> {
    if !snapshot.exists() {
        return Ok(Freshness::Missing);
    }
    Ok(match snapshot.fingerprint()? {
        None => Freshness::Unverified,
        Some(stored) if &stored == current => Freshness::Fresh,
        Some(_) => Freshness::Stale,
    })
}

pub fn snapshot_in(path: &Path, max_sharing: usize) -> BaselineSnapshot {
    BaselineSnapshot {
        path: path.to_path_buf(),
        max_sharing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn bucket(sharing: usize, mean: f64, std_dev: f64) -> BucketSummary {
        BucketSummary {
            sharing,
            mean,
            std_dev,
            std_error: std_dev / 10.0,
            ci95: std_dev / 5.0,
        }
    }

    fn sample_baseline() -> Baseline {
        let mut baseline = Baseline::new();
        baseline.insert(
            AminoAcid::Ala,
            vec![bucket(1, 41.5, 3.25), bucket(2, 2.125, 0.5), bucket(3, 0.0, 0.0)],
        );
        baseline.insert(
            AminoAcid::Trp,
            vec![bucket(1, 0.75, 0.125), bucket(2, 0.0, 0.0), bucket(3, 0.0, 0.0)],
        );
        baseline
    }

    fn fingerprint_with(count: usize, trials: usize, seed: u64) -> Fingerprint {
        let mut counts = EnrichmentCounts::default();
        counts.set(AminoAcid::Ala, "A", count);
        let null_model = NullModelConfig {
            trials,
            seed,
            ..NullModelConfig::default()
        };
        Fingerprint::new(
            &["A".to_string(), "B".to_string()],
            &[AminoAcid::Ala, AminoAcid::Trp],
            &counts,
            &null_model,
        )
    }

    fn fingerprint(count: usize) -> Fingerprint {
        fingerprint_with(count, 1000, 42)
    }

    #[test]
    fn write_then_load() {
        let dir = tempdir().unwrap();
        let snapshot = snapshot_in(&dir.path().join("baseline.csv"), 3);
        let baseline = sample_baseline();
        snapshot.write(&baseline, &fingerprint(4)).unwrap();

        let loaded = snapshot.load().unwrap();
        assert_eq!(loaded.len(), 2);
        for (category, buckets) in &baseline {
            for (want, got) in buckets.iter().zip(&loaded[category]) {
                assert_eq!(want.sharing, got.sharing);
                assert!((want.mean - got.mean).abs() < 1e-9);
                assert!((want.std_dev - got.std_dev).abs() < 1e-9);
                assert!((want.ci95 - got.ci95).abs() < 1e-9);
            }
        }
        assert_eq!(snapshot.fingerprint().unwrap(), Some(fingerprint(4)));
    }

    #[test]
    fn freshness_follows_fingerprint() {
        let dir = tempdir().unwrap();
        let snapshot = snapshot_in(&dir.path().join("baseline.csv"), 3);
        assert_eq!(freshness(&snapshot, &fingerprint(4)).unwrap(), Freshness::Missing);

        snapshot.write(&sample_baseline(), &fingerprint(4)).unwrap();
        assert_eq!(freshness(&snapshot, &fingerprint(4)).unwrap(), Freshness::Fresh);
        assert_eq!(freshness(&snapshot, &fingerprint(5)).unwrap(), Freshness::Stale);

        fs::remove_file(snapshot.meta_path()).unwrap();
        assert_eq!(freshness(&snapshot, &fingerprint(4)).unwrap(), Freshness::Unverified);
    }

    #[test]
    fn trial_count_and_seed_are_part_of_the_fingerprint() {
        let dir = tempdir().unwrap();
        let snapshot = snapshot_in(&dir.path().join("baseline.csv"), 3);
        snapshot.write(&sample_baseline(), &fingerprint_with(4, 10, 42)).unwrap();

        assert_eq!(freshness(&snapshot, &fingerprint_with(4, 10, 42)).unwrap(), Freshness::Fresh);
        assert_eq!(freshness(&snapshot, &fingerprint_with(4, 100_000, 42)).unwrap(), Freshness::Stale);
        assert_eq!(freshness(&snapshot, &fingerprint_with(4, 10, 7)).unwrap(), Freshness::Stale);
    }

    #[test]
    fn fingerprint_without_trials_is_stale() {
        let dir = tempdir().unwrap();
        let snapshot = snapshot_in(&dir.path().join("baseline.csv"), 3);
        snapshot.write(&sample_baseline(), &fingerprint(4)).unwrap();
        fs::write(
            snapshot.meta_path(),
            r#"{"organisms": ["A", "B"], "counts": {"A": {"A": 4, "B": 0}, "W": {"A": 0, "B": 0}}}"#,
        )
        .unwrap();

        let stored = snapshot.fingerprint().unwrap().unwrap();
        assert_eq!(stored.trials, 0);
        assert_eq!(freshness(&snapshot, &fingerprint(4)).unwrap(), Freshness::Stale);
    }

    #[test]
    fn reads_externally_supplied_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("external.csv");
        fs::write(
            &path,
            "lcd_class,num_organisms,ave,stdev,sterr,ci\n\
             Q,1,12.5,2.0,0.01,0.02\n\
             Q,2,1.5,0.5,0.002,0.004\n",
        )
        .unwrap();
        let baseline = snapshot_in(&path, 7).load().unwrap();
        let q = &baseline[&AminoAcid::Gln];
        assert_eq!(q.len(), 7);
        assert_eq!(q[0].mean, 12.5);
        assert_eq!(q[1].std_dev, 0.5);
        assert_eq!(q[6].mean, 0.0);
    }

    #[test]
    fn rejects_out_of_range_sharing_count() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "c,k,m,s\nA,9,1.0,0.1\n").unwrap();
        let err = snapshot_in(&path, 7).load().unwrap_err();
        assert!(matches!(err, SharingError::Baseline { .. }));
    }

    #[test]
    fn rejects_unknown_class() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "c,k,m,s\nB,1,1.0,0.1\n").unwrap();
        let err = snapshot_in(&path, 7).load().unwrap_err();
        assert!(err.to_string().contains("unknown amino acid"));
    }

    #[test]
    fn meta_path_appends_suffix() {
        let snapshot = snapshot_in(Path::new("/tmp/x.csv"), 7);
        assert_eq!(snapshot.meta_path(), PathBuf::from("/tmp/x.csv.meta.json"));
    }
}
