//! Resampling null model for cross-organism GO-term sharing.
//!
//! For every amino-acid class and every trial, each organism draws (without
//! replacement) as many GO terms from its own annotation universe as it had
//! enriched terms for that class. The sharing counts of the union of draws are
//! tallied per trial; over `T` trials this gives the distribution of sharing
//! expected by chance, respecting each organism's vocabulary size and overlap.
//!
//! Trials are independent. Each one is seeded from `(seed, class, trial)`, runs
//! against worker-local scratch space, and its bucket values are reduced into
//! the category tally by addition, so parallel and sequential runs agree.

use std::collections::BTreeMap;

use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use rayon::prelude::*;
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::analysis::sharing::SharingHistogram;
use crate::config::NullModelConfig;
use crate::data_handling::enrichment_report::EnrichmentCounts;
use crate::data_handling::go_universe::{GoUniverse, TermIdx};
use crate::error::{Result, SharingError};
use crate::models::AminoAcid;

/// Accumulated bucket values of a run of null trials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NullTally {
    pub trials: u64,
    /// Sum over trials of the number of terms with each sharing count.
    pub totals: SharingHistogram,
    sum_squares: Vec<u64>,
}

/// Per-trial statistics of one sharing-count bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketSummary {
    pub sharing: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub std_error: f64,
    /// Half-width of the 95% confidence interval of the mean.
    pub ci95: f64,
}

impl NullTally {
    pub fn zero(max_sharing: usize) -> Self {
        NullTally {
            trials: 0,
            totals: SharingHistogram::new(max_sharing),
            sum_squares: vec![0; max_sharing],
        }
    }

    fn record_trial(&mut self, per_trial: &[u64]) {
        self.totals.accumulate(per_trial);
        for (squares, &n) in self.sum_squares.iter_mut().zip(per_trial) {
            *squares += n * n;
        }
        self.trials += 1;
    }

    pub fn merge(self, other: NullTally) -> NullTally {
        NullTally {
            trials: self.trials + other.trials,
            totals: self.totals.merge(&other.totals),
            sum_squares: self
                .sum_squares
                .iter()
                .zip(&other.sum_squares)
                .map(|(a, b)| a + b)
                .collect(),
        }
    }

    /// Mean, sample standard deviation, standard error and 95% CI
    /// half-width of every bucket's per-trial value.
    pub fn summary(&self) -> Result<Vec<BucketSummary>> {
        let t = self.trials as f64;
        let t_crit = if self.trials > 1 {
            StudentsT::new(0.0, 1.0, t - 1.0)
                .map_err(|e| SharingError::Statistics(e.to_string()))?
                .inverse_cdf(0.975)
        } else {
            0.0
        };

        Ok(self
            .totals
            .iter()
            .zip(&self.sum_squares)
            .map(|((k, sum), &squares)| {
                if self.trials == 0 {
                    return BucketSummary {
                        sharing: k,
                        mean: 0.0,
                        std_dev: 0.0,
                        std_error: 0.0,
                        ci95: 0.0,
                    };
                }
                let mean = sum as f64 / t;
                let variance = if self.trials > 1 {
                    ((squares as f64 - t * mean * mean) / (t - 1.0)).max(0.0)
                } else {
                    0.0
                };
                let std_dev = variance.sqrt();
                let std_error = std_dev / t.sqrt();
                BucketSummary {
                    sharing: k,
                    mean,
                    std_dev,
                    std_error,
                    ci95: t_crit * std_error,
                }
            })
            .collect())
    }
}

pub type NullDistribution = BTreeMap<AminoAcid, NullTally>;

/// Worker-local buffers reused across trials.
struct TrialScratch {
    hits: Vec<u32>,
    touched: Vec<TermIdx>,
    per_trial: Vec<u64>,
}

impl TrialScratch {
    fn new(term_count: usize, max_sharing: usize) -> Self {
        TrialScratch {
            hits: vec![0; term_count],
            touched: Vec::new(),
            per_trial: vec![0; max_sharing],
        }
    }

    fn run_trial(&mut self, plan: &[Draw<'_>], rng: &mut StdRng, tally: &mut NullTally) {
        for draw in plan {
            if draw.size == 0 {
                continue;
            }
            for i in index::sample(rng, draw.terms.len(), draw.size) {
                let term = draw.terms[i];
                let hits = &mut self.hits[term as usize];
                if *hits == 0 {
                    self.touched.push(term);
                }
                *hits += 1;
            }
        }

        self.per_trial.iter_mut().for_each(|n| *n = 0);
        for term in self.touched.drain(..) {
            let hits = std::mem::take(&mut self.hits[term as usize]) as usize;
            // universes are duplicate-free, so one organism adds at most one hit
            debug_assert!(hits >= 1 && hits <= self.per_trial.len());
            self.per_trial[hits - 1] += 1;
        }
        tally.record_trial(&self.per_trial);
    }
}

/// One organism's draw in a trial.
struct Draw<'a> {
    terms: &'a [TermIdx],
    size: usize,
}

fn trial_rng(seed: u64, category: AminoAcid, trial: u64) -> StdRng {
    StdRng::seed_from_u64(
        seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ ((category.index() as u64) << 48) ^ trial,
    )
}

/// Checks every organism's sample size against its universe before any trial
/// runs.
fn draw_plan<'a>(
    universe: &'a GoUniverse,
    organisms: &[String],
    counts: &EnrichmentCounts,
    category: AminoAcid,
) -> Result<Vec<Draw<'a>>> {
    let mut plan = Vec::with_capacity(organisms.len());
    for organism in organisms {
        let size = counts.get(category, organism);
        if size == 0 {
            continue;
        }
        let terms = universe
            .terms_of(organism)
            .ok_or_else(|| SharingError::MissingUniverse(organism.clone()))?;
        if size > terms.len() {
            return Err(SharingError::SampleExceedsUniverse {
                organism: organism.clone(),
                category,
                requested: size,
                available: terms.len(),
            });
        }
        plan.push(Draw { terms, size });
    }
    Ok(plan)
}

/// Runs `config.trials` null trials for one category.
pub fn estimate_category(
    universe: &GoUniverse,
    organisms: &[String],
    counts: &EnrichmentCounts,
    category: AminoAcid,
    config: &NullModelConfig,
) -> Result<NullTally> {
    let plan = draw_plan(universe, organisms, counts, category)?;
    let max_sharing = organisms.len();
    let term_count = universe.term_count();
    let trials = config.trials as u64;

    if plan.is_empty() {
        debug!("{}: no enriched terms in any organism, all trials empty", category);
        let mut tally = NullTally::zero(max_sharing);
        tally.trials = trials;
        return Ok(tally);
    }

    let tally = if config.parallel {
        (0..trials)
            .into_par_iter()
            .fold(
                || (TrialScratch::new(term_count, max_sharing), NullTally::zero(max_sharing)),
                |(mut scratch, mut tally), trial| {
                    let mut rng = trial_rng(config.seed, category, trial);
                    scratch.run_trial(&plan, &mut rng, &mut tally);
                    (scratch, tally)
                },
            )
            .map(|(_, tally)| tally)
            .reduce(|| NullTally::zero(max_sharing), NullTally::merge)
    } else {
        let mut scratch = TrialScratch::new(term_count, max_sharing);
        let mut tally = NullTally::zero(max_sharing);
        for trial in 0..trials {
            let mut rng = trial_rng(config.seed, category, trial);
            scratch.run_trial(&plan, &mut rng, &mut tally);
        }
        tally
    };

    debug!("{}: null totals {:?}", category, tally.totals.buckets());
    Ok(tally)
}

/// Runs the null model for every category.
pub fn estimate_null(
    universe: &GoUniverse,
    organisms: &[String],
    counts: &EnrichmentCounts,
    categories: &[AminoAcid],
    config: &NullModelConfig,
) -> Result<NullDistribution> {
    info!(
        "Running {} null trials per category for {} categories ({})",
        config.trials,
        categories.len(),
        if config.parallel { "parallel" } else { "sequential" }
    );

    // fail before spending time on any category
    for &category in categories {
        draw_plan(universe, organisms, counts, category)?;
    }

    let mut distribution = NullDistribution::new();
    for &category in categories {
        let tally = estimate_category(universe, organisms, counts, category, config)?;
        info!(
            "{}: {} term-occurrences over {} trials",
            category,
            tally.totals.total(),
            tally.trials
        );
        distribution.insert(category, tally);
    }
    Ok(distribution)
}
