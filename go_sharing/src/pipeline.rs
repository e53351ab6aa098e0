use tracing::{info, warn};

use crate::analysis::figure::{build_panels, render_figure, Panel};
use crate::analysis::null_model::estimate_null;
use crate::analysis::sharing::{tabulate_observed, ObservedSharing};
use crate::config::{Config, NullModelMode};
use crate::data_handling::baseline_snapshot::{
    baseline_from_null, freshness, snapshot_in, Baseline, BaselineSnapshot, Fingerprint,
    Freshness,
};
use crate::data_handling::enrichment_report::{load_observed, EnrichmentCounts};
use crate::data_handling::go_universe::GoUniverseFile;
use crate::error::{Result, SharingError};
use crate::models::{AminoAcid, Dataset};

/// Loads the reports, tabulates observed sharing and obtains the baseline;
/// returns one panel per amino acid.
pub fn analyze(config: &Config) -> Result<Vec<Panel>> {
    let categories = AminoAcid::ALL;
    let organisms = config.organism_codes();
    let max_sharing = organisms.len();

    let observed_enrichment =
        load_observed(&config.data_dir, &config.organisms, &categories, config.significance)?;
    let observed = tabulate_observed(&observed_enrichment.records, &categories, max_sharing)?;

    let baseline = obtain_baseline(config, &organisms, &categories, &observed_enrichment.counts)?;
    log_comparison(&categories, &observed, &baseline);

    Ok(build_panels(&categories, &observed, &baseline, max_sharing))
}

pub fn run(config: &Config) -> Result<()> {
    let panels = analyze(config)?;
    render_figure(
        &config.figure_file,
        (config.figure.width, config.figure.height),
        &panels,
        config.organisms.len(),
    )
}

/// Picks between the cached snapshot and a fresh estimator run according to
/// `null_model.mode` and the snapshot's fingerprint.
pub fn obtain_baseline(
    config: &Config,
    organisms: &[String],
    categories: &[AminoAcid],
    counts: &EnrichmentCounts,
) -> Result<Baseline> {
    let snapshot = snapshot_in(&config.baseline_file, organisms.len());
    let current = Fingerprint::new(organisms, categories, counts, &config.null_model);

    // the snapshot and its fingerprint get overwritten, so neither is read
    if config.null_model.mode == NullModelMode::Recompute {
        return recompute(config, organisms, categories, counts, &snapshot, &current);
    }

    let state = freshness(&snapshot, &current)?;
    match (config.null_model.mode, state) {
        (NullModelMode::Cached, Freshness::Missing) => Err(SharingError::Baseline {
            path: snapshot.path.clone(),
            reason: "snapshot not found and null_model.mode is \"cached\"".into(),
        }),
        (NullModelMode::Cached, Freshness::Stale) => {
            warn!(
                "Baseline snapshot {} was computed from different inputs or trial settings; using it anyway",
                snapshot.path.display()
            );
            snapshot.load()
        }
        (_, Freshness::Unverified) => {
            warn!(
                "Baseline snapshot {} has no fingerprint; assuming it matches the current inputs",
                snapshot.path.display()
            );
            snapshot.load()
        }
        (_, Freshness::Fresh) => {
            info!("Baseline snapshot is up to date");
            snapshot.load()
        }
        (_, Freshness::Missing | Freshness::Stale) => {
            info!("Baseline snapshot missing or stale ({:?}), recomputing", state);
            recompute(config, organisms, categories, counts, &snapshot, &current)
        }
    }
}

fn recompute(
    config: &Config,
    organisms: &[String],
    categories: &[AminoAcid],
    counts: &EnrichmentCounts,
    snapshot: &BaselineSnapshot,
    fingerprint: &Fingerprint,
) -> Result<Baseline> {
    let universe = GoUniverseFile {
        path: config.universe_file.clone(),
    }
    .load()?;
    let distribution = estimate_null(&universe, organisms, counts, categories, &config.null_model)?;
    let baseline = baseline_from_null(&distribution)?;
    snapshot.write(&baseline, fingerprint)?;
    Ok(baseline)
}

fn log_comparison(categories: &[AminoAcid], observed: &ObservedSharing, baseline: &Baseline) {
    info!("--- Observed vs. expected GO-term sharing ---");
    for category in categories {
        let observed = observed
            .get(category)
            .map(|h| format!("{:?}", h.buckets()))
            .unwrap_or_default();
        let expected = baseline
            .get(category)
            .map(|buckets| {
                let means: Vec<String> = buckets.iter().map(|b| format!("{:.2}", b.mean)).collect();
                format!("[{}]", means.join(", "))
            })
            .unwrap_or_else(|| {
                warn!("No baseline for {}", category);
                String::from("-")
            });
        info!("{:<20} observed {:<28} expected {}", category.display_name(), observed, expected);
    }
}
