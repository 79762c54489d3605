//! Historical baselines: per-centroid mean yields over a reference period.
use crate::centroids::Centroids;
use crate::combination::CropIrrigation;
use crate::error::HazardError;
use crate::hazard::HazardLayer;
use crate::output::{BaselineStore, HIST_MEAN_DIR_NAME};
use crate::year::YearRange;
use anyhow::{Result, ensure};
use log::info;
use ndarray::{Array1, Axis, s};
use std::path::Path;
use std::sync::{Arc, OnceLock};

/// Calculate the mean intensity of each centroid over `reference_range`.
///
/// The rows averaged are those from the event named by the start of the range up to and including
/// the event named by its end. Centroids without a finite mean get zero.
pub fn mean_over_range(hazard: &HazardLayer, reference_range: YearRange) -> Result<Array1<f64>> {
    let find_row = |year: u32| {
        let id = year.to_string();
        hazard.events.iter().position(|e| e.id == id).ok_or_else(|| {
            HazardError::range(format!(
                "reference year {year} is not among the hazard's events"
            ))
        })
    };
    let first = find_row(reference_range.start)?;
    let last = find_row(reference_range.end)?;
    ensure!(
        first <= last,
        "Reference years {reference_range} are out of order in the hazard's events"
    );

    let rows = hazard.intensity.slice(s![first..=last, ..]);
    let n_rows = rows.nrows() as f64;
    let mean = rows
        .sum_axis(Axis(0))
        .mapv(|sum| sum / n_rows)
        .mapv(|mean| if mean.is_finite() { mean } else { 0.0 });

    Ok(mean)
}

/// Persist a per-centroid mean to `<output_dir>/Hist_mean/hist_mean_<crop>_<range>`.
///
/// This allows a baseline to be reused without reading the historical rasters again.
pub fn save_mean<S: BaselineStore + ?Sized>(
    store: &S,
    output_dir: &Path,
    crop_irrigation: &CropIrrigation,
    reference_range: YearRange,
    mean: &Array1<f64>,
    centroids: &Centroids,
) -> Result<()> {
    let path = output_dir
        .join(HIST_MEAN_DIR_NAME)
        .join(crop_irrigation.baseline_name(reference_range));
    store.write_baseline(&path, mean, centroids)?;
    info!("Saved baseline {}", path.display());

    Ok(())
}

/// Accumulates the per-file means of all historical files sharing a crop/irrigation key.
///
/// The table has one slot per historical file, assigned in discovery order before any file is
/// processed. Each slot is written exactly once, so files can be processed concurrently without
/// locking.
#[derive(Debug)]
pub struct BaselineAccumulator {
    slots: Vec<OnceLock<Array1<f64>>>,
    centroids: OnceLock<Arc<Centroids>>,
}

impl BaselineAccumulator {
    /// Create an accumulator with `n_files` empty slots
    pub fn new(n_files: usize) -> Self {
        Self {
            slots: (0..n_files).map(|_| OnceLock::new()).collect(),
            centroids: OnceLock::new(),
        }
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether there are no slots
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of slots which have been filled
    pub fn n_filled(&self) -> usize {
        self.slots.iter().filter(|slot| slot.get().is_some()).count()
    }

    /// The number of centroids, once the first slot has been filled
    pub fn n_centroids(&self) -> Option<usize> {
        self.centroids.get().map(|c| c.len())
    }

    /// The grid of the accumulated means, once the first slot has been filled
    pub fn centroids(&self) -> Option<&Arc<Centroids>> {
        self.centroids.get()
    }

    /// Store one file's mean in its slot
    pub fn fill(&self, slot: usize, mean: Array1<f64>, centroids: &Arc<Centroids>) -> Result<()> {
        ensure!(
            mean.len() == centroids.len(),
            "Mean has {} values but there are {} centroids",
            mean.len(),
            centroids.len()
        );
        let n_centroids = self.centroids.get_or_init(|| Arc::clone(centroids)).len();
        if mean.len() != n_centroids {
            return Err(HazardError::format(format!(
                "mean has {} centroids but earlier files of the same crop had {n_centroids}",
                mean.len()
            ))
            .into());
        }

        let cell = self
            .slots
            .get(slot)
            .ok_or_else(|| anyhow::anyhow!("Slot {slot} out of range ({} slots)", self.len()))?;
        ensure!(cell.set(mean).is_ok(), "Slot {slot} filled twice");

        Ok(())
    }

    /// Reduce the filled slots to their column-wise mean
    pub fn reduce(&self) -> Result<Baseline> {
        let filled: Vec<&Array1<f64>> = self.slots.iter().filter_map(OnceLock::get).collect();
        let (Some(centroids), Some(first)) = (self.centroids.get(), filled.first()) else {
            anyhow::bail!("No historical files contributed to the baseline");
        };

        let mut sum = Array1::<f64>::zeros(first.len());
        for mean in &filled {
            sum += *mean;
        }

        Ok(Baseline {
            mean: sum / filled.len() as f64,
            n_files: filled.len(),
            centroids: Arc::clone(centroids),
        })
    }
}

/// The aggregate baseline of a crop/irrigation key
#[derive(Debug, Clone, PartialEq)]
pub struct Baseline {
    /// Mean intensity per centroid
    pub mean: Array1<f64>,
    /// Number of historical files which contributed
    pub n_files: usize,
    /// The grid of the mean values
    pub centroids: Arc<Centroids>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::centroids::BoundingBox;
    use crate::fixture::{assert_error, centroids, hazard};
    use crate::normalise::relative_yield;
    use crate::output::CsvHazardStore;
    use crate::raster::CsvRasterSource;
    use float_cmp::assert_approx_eq;
    use itertools::Itertools;
    use ndarray::array;
    use rstest::rstest;
    use tempfile::tempdir;

    #[rstest]
    fn test_mean_over_range(hazard: HazardLayer) {
        let range = YearRange::new(2000, 2001).unwrap();
        assert_eq!(mean_over_range(&hazard, range).unwrap(), array![2.0, 3.0]);

        let range = YearRange::new(2000, 2002).unwrap();
        assert_eq!(mean_over_range(&hazard, range).unwrap(), array![3.0, 4.0]);
    }

    #[rstest]
    fn test_mean_over_range_scale_covariant(mut hazard: HazardLayer) {
        let range = YearRange::new(2000, 2002).unwrap();
        let mean = mean_over_range(&hazard, range).unwrap();
        hazard.intensity *= 2.5;
        let scaled = mean_over_range(&hazard, range).unwrap();
        for (a, b) in mean.iter().zip(&scaled) {
            assert_approx_eq!(f64, a * 2.5, *b);
        }
    }

    #[rstest]
    fn test_mean_over_range_non_finite(mut hazard: HazardLayer) {
        hazard.intensity.column_mut(1).fill(f64::NAN);
        let range = YearRange::new(2000, 2002).unwrap();
        assert_eq!(mean_over_range(&hazard, range).unwrap(), array![3.0, 0.0]);
    }

    #[test]
    fn test_mean_over_range_missing_cell() {
        // Centroid 0 has no data for 2001, which reads as zero yield
        let dir = tempdir().unwrap();
        let path = dir.path().join("yield.csv");
        std::fs::write(
            &path,
            "lat,lon,2000,2001,2002\n10.0,-1.0,4.0,,2.0\n10.0,1.0,1.0,3.0,5.0\n",
        )
        .unwrap();
        let chunk = YearRange::new(2000, 2002).unwrap();
        let mut hazard = HazardLayer::from_file(
            &CsvRasterSource,
            &path,
            chunk,
            &BoundingBox::default(),
            "whe",
            chunk,
        )
        .unwrap();

        let mean = mean_over_range(&hazard, chunk).unwrap();
        assert_eq!(mean, array![2.0, 3.0]);

        // The centroid keeps its relative-yield signal
        relative_yield(&mut hazard, mean.view()).unwrap();
        assert_eq!(hazard.intensity.column(0), array![2.0, 0.0, 1.0]);
    }

    #[rstest]
    fn test_mean_over_range_missing_year(hazard: HazardLayer) {
        let range = YearRange::new(1999, 2001).unwrap();
        assert_error!(
            mean_over_range(&hazard, range),
            "invalid year range: reference year 1999 is not among the hazard's events"
        );
    }

    #[rstest]
    fn test_accumulator(centroids: Arc<Centroids>) {
        let acc = BaselineAccumulator::new(3);
        acc.fill(2, array![6.0, 4.0], &centroids).unwrap();
        acc.fill(0, array![2.0, 4.0], &centroids).unwrap();
        assert_eq!(acc.n_filled(), 2);
        assert_eq!(acc.n_centroids(), Some(2));

        let baseline = acc.reduce().unwrap();
        assert_eq!(baseline.mean, array![4.0, 4.0]);
        assert_eq!(baseline.n_files, 2);
    }

    #[rstest]
    fn test_accumulator_fill_order_independent(centroids: Arc<Centroids>) {
        let means = [array![1.0, 0.1], array![2.0, 0.2], array![4.5, 0.3]];
        let reduce_in_order = |order: &[usize]| {
            let acc = BaselineAccumulator::new(means.len());
            for &slot in order {
                acc.fill(slot, means[slot].clone(), &centroids).unwrap();
            }
            acc.reduce().unwrap().mean
        };

        let expected = reduce_in_order(&[0, 1, 2]);
        for order in (0..means.len()).permutations(means.len()) {
            assert_eq!(reduce_in_order(&order), expected);
        }
    }

    #[rstest]
    fn test_accumulator_errors(centroids: Arc<Centroids>) {
        let acc = BaselineAccumulator::new(1);
        assert_error!(acc.reduce(), "No historical files contributed to the baseline");
        acc.fill(0, array![1.0, 2.0], &centroids).unwrap();
        assert_error!(
            acc.fill(0, array![1.0, 2.0], &centroids),
            "Slot 0 filled twice"
        );
        assert_error!(
            acc.fill(1, array![1.0, 2.0], &centroids),
            "Slot 1 out of range (1 slots)"
        );

        let other = Arc::new(Centroids {
            lat: vec![0.0],
            lon: vec![0.0],
        });
        assert_error!(
            acc.fill(0, array![1.0], &other),
            "invalid format: mean has 1 centroids but earlier files of the same crop had 2"
        );
    }

    #[rstest]
    fn test_save_mean(centroids: Arc<Centroids>) {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join(HIST_MEAN_DIR_NAME)).unwrap();
        let crop_irrigation = CropIrrigation {
            crop: "whe".into(),
            irrigation: "noirr".into(),
        };
        let range = YearRange::new(1976, 2005).unwrap();
        let mean = array![2.0, 4.0];

        let store = CsvHazardStore;
        save_mean(&store, dir.path(), &crop_irrigation, range, &mean, &centroids).unwrap();

        let path = dir
            .path()
            .join(HIST_MEAN_DIR_NAME)
            .join("hist_mean_whe-noirr_1976-2005");
        let (read_mean, read_centroids) = store.read_baseline(&path).unwrap();
        assert_eq!(read_mean, mean);
        assert_eq!(read_centroids, *centroids);
    }
}
