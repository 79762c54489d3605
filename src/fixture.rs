//! Fixtures for tests
use crate::centroids::Centroids;
use crate::combination::{CombinationKey, CropIrrigation};
use crate::hazard::HazardLayer;
use crate::year::Event;
use ndarray::array;
use rstest::fixture;
use std::sync::Arc;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

#[fixture]
pub fn centroids() -> Arc<Centroids> {
    Arc::new(Centroids {
        lat: vec![10.0, 10.0],
        lon: vec![-1.0, 1.0],
    })
}

/// An absolute-yield hazard with three events (2000-2002) and two centroids
#[fixture]
pub fn hazard(centroids: Arc<Centroids>) -> HazardLayer {
    let events = (2000..=2002)
        .map(|year| Event::for_year(year).unwrap())
        .collect();
    HazardLayer::new(
        "whe",
        events,
        array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]],
        centroids,
    )
    .unwrap()
}

#[fixture]
pub fn key() -> CombinationKey {
    CombinationKey {
        ag_model: "gepic".into(),
        cl_model: "gfdl-esm2m".into(),
        scenario: "historical".into(),
        soc: "2005soc".into(),
        co2: "co2".into(),
        crop_irrigation: CropIrrigation {
            crop: "whe".into(),
            irrigation: "noirr".into(),
        },
    }
}
