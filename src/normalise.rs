//! Transforms which turn absolute yields into relative indicators.
use crate::error::HazardError;
use crate::hazard::{HazardLayer, IndicatorKind};
use crate::parallel::ProcessingMode;
use anyhow::{Result, ensure};
use log::debug;
use ndarray::{Array1, ArrayView1, ArrayView2};

/// How ties between a score and the reference values are counted.
///
/// With `left` reference values strictly below the score, `right` at or below it and `n` finite
/// reference values in total:
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PercentileKind {
    /// `(left + right + [right > left]) * 50 / n`
    #[default]
    Rank,
    /// `right * 100 / n`, the cumulative distribution function
    Weak,
    /// `left * 100 / n`
    Strict,
    /// `(left + right) * 50 / n`
    Mean,
}

/// Divide every intensity by the baseline of its centroid.
///
/// Centroids with a zero baseline have no relative-yield signal and get NaN. The observed range of
/// the result, ignoring NaN, is recorded in `hazard.intensity_range`.
pub fn relative_yield(hazard: &mut HazardLayer, baseline: ArrayView1<f64>) -> Result<()> {
    if baseline.len() != hazard.n_centroids() {
        return Err(HazardError::format(format!(
            "baseline has {} values but the hazard has {} centroids",
            baseline.len(),
            hazard.n_centroids()
        ))
        .into());
    }

    for mut row in hazard.intensity.rows_mut() {
        row.zip_mut_with(&baseline, |value, &base| {
            *value = if base == 0.0 { f64::NAN } else { *value / base };
        });
    }

    hazard.intensity_range = observed_range(hazard.intensity.iter().copied());
    hazard.indicator = IndicatorKind::RelativeYield;
    debug!(
        "Converted {} hazard to relative yield, range {:?}",
        hazard.crop, hazard.intensity_range
    );

    Ok(())
}

/// Replace every intensity by its percentile within the reference values of the same centroid.
///
/// When `reference` is `None`, each column is ranked against itself. Columns are independent, so
/// they are processed according to `mode`.
pub fn percentile(
    hazard: &mut HazardLayer,
    reference: Option<ArrayView2<f64>>,
    kind: PercentileKind,
    mode: ProcessingMode,
) -> Result<()> {
    let columns = match reference {
        Some(reference) => rank_columns(hazard.intensity.view(), reference, kind, mode)?,
        None => rank_columns(hazard.intensity.view(), hazard.intensity.view(), kind, mode)?,
    };

    for (c, column) in columns.into_iter().enumerate() {
        hazard.intensity.column_mut(c).assign(&column);
    }
    hazard.indicator = IndicatorKind::Percentile;
    debug!("Converted {} hazard to percentiles", hazard.crop);

    Ok(())
}

/// The percentile of every intensity within the matching reference column
fn rank_columns(
    intensity: ArrayView2<f64>,
    reference: ArrayView2<f64>,
    kind: PercentileKind,
    mode: ProcessingMode,
) -> Result<Vec<Array1<f64>>> {
    let n_centroids = intensity.ncols();
    ensure!(
        reference.ncols() == n_centroids,
        "Reference has {} centroids but the hazard has {n_centroids}",
        reference.ncols()
    );

    mode.map(0..n_centroids, |c| {
        percentile_column(intensity.column(c), reference.column(c), kind)
    })
}

/// The percentile of each score within one reference column
fn percentile_column(
    scores: ArrayView1<f64>,
    reference: ArrayView1<f64>,
    kind: PercentileKind,
) -> Array1<f64> {
    let mut sorted: Vec<f64> = reference.iter().copied().filter(|v| !v.is_nan()).collect();
    sorted.sort_by(f64::total_cmp);

    scores.mapv(|score| percentile_of_score(&sorted, score, kind) / 100.0)
}

/// The percentile (0 to 100) of `score` within the ascending, NaN-free `sorted` values.
///
/// Returns NaN if `score` is NaN or there are no reference values.
pub fn percentile_of_score(sorted: &[f64], score: f64, kind: PercentileKind) -> f64 {
    if score.is_nan() || sorted.is_empty() {
        return f64::NAN;
    }

    let left = sorted.partition_point(|&v| v < score) as f64;
    let right = sorted.partition_point(|&v| v <= score) as f64;
    let n = sorted.len() as f64;
    match kind {
        PercentileKind::Rank => {
            let exact = if right > left { 1.0 } else { 0.0 };
            (left + right + exact) * 50.0 / n
        }
        PercentileKind::Weak => right * 100.0 / n,
        PercentileKind::Strict => left * 100.0 / n,
        PercentileKind::Mean => (left + right) * 50.0 / n,
    }
}

/// The (min, max) of the values, ignoring NaN
fn observed_range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values
        .filter(|v| !v.is_nan())
        .fold(None, |range, v| match range {
            None => Some((v, v)),
            Some((min, max)) => Some((min.min(v), max.max(v))),
        })
}
