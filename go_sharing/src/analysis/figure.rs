//! Multi-panel bar chart: observed cross-organism sharing of enriched GO
//! terms next to the resampling expectation, one panel per amino acid.

use std::error::Error;
use std::fs::create_dir_all;
use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use tracing::info;

use crate::analysis::sharing::ObservedSharing;
use crate::data_handling::baseline_snapshot::Baseline;
use crate::error::{Result, SharingError};
use crate::models::AminoAcid;

pub const GRID_ROWS: usize = 5;
pub const GRID_COLS: usize = 4;

const OBSERVED_COLOR: RGBColor = RGBColor(0x1f, 0x77, 0xb4);
const EXPECTED_COLOR: RGBColor = RGBColor(0xd6, 0x27, 0x28);
const BAR_WIDTH: f64 = 0.38;
const Y_HEADROOM: f64 = 1.2;
// the figure is laid out as if it were 10 inches tall
const FIGURE_HEIGHT_IN: f64 = 10.0;

const X_TITLE: &str = "Number of Organisms Sharing Enriched GO Term";
const Y_TITLE: &str = "Frequency (Number of Enriched GO Terms)";

/// Everything drawn in one panel.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub category: AminoAcid,
    /// Observed term counts for `k = 1..=N`.
    pub observed: Vec<u64>,
    /// Expected `(mean, std_dev)` for `k = 1..=N`.
    pub expected: Vec<(f64, f64)>,
}

impl Panel {
    pub fn has_observations(&self) -> bool {
        self.observed.iter().any(|&n| n > 0)
    }

    /// Top of the y axis: 20% above the tallest bar or error bar, at least 1.
    pub fn y_upper(&self) -> f64 {
        let observed = self.observed.iter().map(|&n| n as f64);
        let expected = self.expected.iter().map(|&(mean, sd)| mean + sd);
        let tallest = observed.chain(expected).fold(0.0, f64::max);
        (tallest * Y_HEADROOM).max(1.0)
    }
}

/// One panel per category; a category missing from `baseline` gets a zero
/// expectation.
pub fn build_panels(
    categories: &[AminoAcid],
    observed: &ObservedSharing,
    baseline: &Baseline,
    max_sharing: usize,
) -> Vec<Panel> {
    categories
        .iter()
        .map(|&category| {
            let observed = observed
                .get(&category)
                .map(|h| h.buckets().to_vec())
                .unwrap_or_else(|| vec![0; max_sharing]);
            let expected = (0..max_sharing)
                .map(|i| {
                    baseline
                        .get(&category)
                        .and_then(|buckets| buckets.get(i))
                        .map(|b| (b.mean, b.std_dev))
                        .unwrap_or((0.0, 0.0))
                })
                .collect();
            Panel {
                category,
                observed,
                expected,
            }
        })
        .collect()
}

/// Row and column of a category's fixed slot in the grid.
pub fn grid_position(category: AminoAcid) -> (usize, usize) {
    (category.index() / GRID_COLS, category.index() % GRID_COLS)
}

fn font_px(points: f64, height_px: u32) -> u32 {
    let dpi = height_px as f64 / FIGURE_HEIGHT_IN;
    (points * dpi / 72.0).round().max(1.0) as u32
}

/// Saves the figure; a `.svg` path gets vector output, anything else a bitmap
/// whose format follows the extension.
pub fn render_figure(
    path: &Path,
    size: (u32, u32),
    panels: &[Panel],
    max_sharing: usize,
) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir_all(parent).map_err(|e| SharingError::io(parent, e))?;
    }

    let is_svg = path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("svg"));
    let drawn = if is_svg {
        draw_figure(SVGBackend::new(path, size).into_drawing_area(), panels, max_sharing)
    } else {
        draw_figure(BitMapBackend::new(path, size).into_drawing_area(), panels, max_sharing)
    };
    drawn.map_err(|e| SharingError::Plot(e.to_string()))?;

    info!("Figure with {} panels saved to {}", panels.len(), path.display());
    Ok(())
}

fn draw_figure<DB>(
    root: DrawingArea<DB, Shift>,
    panels: &[Panel],
    max_sharing: usize,
) -> std::result::Result<(), Box<dyn Error>>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;
    let (width, height) = root.dim_in_pixel();
    let axis_font = font_px(16.0, height);

    // shared axis titles live in bands left of and below the grid
    let y_band = width / 20;
    let x_band = height / 30;
    let (y_title_area, rest) = root.split_horizontally(y_band);
    let (grid, x_title_area) = rest.split_vertically(height - x_band);

    let centered = Pos::new(HPos::Center, VPos::Center);
    y_title_area.draw_text(
        Y_TITLE,
        &("sans-serif", axis_font)
            .into_font()
            .transform(FontTransform::Rotate270)
            .color(&BLACK)
            .pos(centered),
        ((y_band / 2) as i32, (height / 2) as i32),
    )?;
    x_title_area.draw_text(
        X_TITLE,
        &("sans-serif", axis_font).into_font().color(&BLACK).pos(centered),
        (((width - y_band) / 2) as i32, (x_band / 2) as i32),
    )?;

    let cells = grid.split_evenly((GRID_ROWS, GRID_COLS));
    for panel in panels {
        let (row, col) = grid_position(panel.category);
        let cell = &cells[row * GRID_COLS + col];
        let with_legend = panel.category == AminoAcid::ALL[0];
        draw_panel(cell, panel, max_sharing, height, with_legend)?;
    }

    root.present()?;
    Ok(())
}

fn draw_panel<DB>(
    area: &DrawingArea<DB, Shift>,
    panel: &Panel,
    max_sharing: usize,
    figure_height: u32,
    with_legend: bool,
) -> std::result::Result<(), Box<dyn Error>>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let title_font = font_px(12.0, figure_height);
    let tick_font = font_px(10.0, figure_height);
    let (_, cell_height) = area.dim_in_pixel();
    let upper = panel.y_upper();

    let mut chart = ChartBuilder::on(area)
        .margin(cell_height / 30)
        .caption(panel.category.display_name(), ("sans-serif", title_font))
        .x_label_area_size(tick_font * 2)
        .y_label_area_size(tick_font * 3)
        .build_cartesian_2d(0.5f64..(max_sharing as f64 + 0.5), 0f64..upper)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(max_sharing)
        .x_label_formatter(&|x| format!("{:.0}", x))
        .y_labels(5)
        .y_label_formatter(&|y| {
            if upper < 10.0 {
                format!("{:.1}", y)
            } else {
                format!("{:.0}", y)
            }
        })
        .label_style(("sans-serif", tick_font))
        .draw()?;

    let observed = chart.draw_series(panel.observed.iter().enumerate().map(|(i, &n)| {
        let x = (i + 1) as f64;
        Rectangle::new([(x - BAR_WIDTH, 0.0), (x, n as f64)], OBSERVED_COLOR.filled())
    }))?;
    if with_legend {
        observed.label("Observed").legend(|(x, y)| {
            Rectangle::new([(x, y - 5), (x + 10, y + 5)], OBSERVED_COLOR.filled())
        });
    }

    let expected = chart.draw_series(panel.expected.iter().enumerate().map(|(i, &(mean, _))| {
        let x = (i + 1) as f64;
        Rectangle::new([(x, 0.0), (x + BAR_WIDTH, mean)], EXPECTED_COLOR.filled())
    }))?;
    if with_legend {
        expected.label("Expected").legend(|(x, y)| {
            Rectangle::new([(x, y - 5), (x + 10, y + 5)], EXPECTED_COLOR.filled())
        });
    }

    let whisker = (tick_font / 2).max(2);
    chart.draw_series(
        panel
            .expected
            .iter()
            .enumerate()
            .filter(|(_, expected)| expected.1 > 0.0)
            .map(|(i, &(mean, sd))| {
                let x = (i + 1) as f64 + BAR_WIDTH / 2.0;
                ErrorBar::new_vertical(x, (mean - sd).max(0.0), mean, mean + sd, BLACK.filled(), whisker)
            }),
    )?;

    if !panel.has_observations() {
        chart.draw_series(std::iter::once(Text::new(
            "no enriched GO terms",
            (max_sharing as f64 / 2.0, upper * 0.85),
            ("sans-serif", tick_font).into_font().color(&BLACK),
        )))?;
    }

    if with_legend {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .label_font(("sans-serif", tick_font))
            .background_style(WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;
    }

    Ok(())
}
