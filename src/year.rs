//! Code for working with years and for mapping them onto raster bands.
use crate::error::HazardError;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An inclusive range of calendar years
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[u32; 2]", into = "[u32; 2]")]
pub struct YearRange {
    /// First year of the range
    pub start: u32,
    /// Last year of the range (inclusive)
    pub end: u32,
}

impl YearRange {
    /// Create a new [`YearRange`], checking that `end` is not before `start`
    pub fn new(start: u32, end: u32) -> Result<Self> {
        if end < start {
            return Err(
                HazardError::range(format!("end year {end} is before start year {start}")).into(),
            );
        }

        Ok(Self { start, end })
    }

    /// The number of years in the range
    pub fn len(&self) -> usize {
        (self.end - self.start + 1) as usize
    }

    /// Always false; a valid range covers at least one year
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether `other` lies entirely within this range
    pub fn contains_range(&self, other: &YearRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Iterate over the years in the range
    pub fn iter(&self) -> std::ops::RangeInclusive<u32> {
        self.start..=self.end
    }
}

impl TryFrom<[u32; 2]> for YearRange {
    type Error = anyhow::Error;

    fn try_from([start, end]: [u32; 2]) -> Result<Self> {
        Self::new(start, end)
    }
}

impl From<YearRange> for [u32; 2] {
    fn from(range: YearRange) -> Self {
        [range.start, range.end]
    }
}

impl fmt::Display for YearRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

impl FromStr for YearRange {
    type Err = anyhow::Error;

    /// Parse a range of the form "1976-2005"
    fn from_str(s: &str) -> Result<Self> {
        let (start, end) = s
            .trim()
            .split_once('-')
            .with_context(|| format!("Year range must be of the form START-END, got: {s}"))?;
        let parse_year = |y: &str| {
            y.trim()
                .parse::<u32>()
                .with_context(|| format!("Invalid year: {y}"))
        };

        Self::new(parse_year(start)?, parse_year(end)?)
    }
}

/// A single event of a hazard layer, i.e. one year of crop-model output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// The event identifier: the calendar year as a decimal string
    pub id: String,
    /// The canonical date of the event (1st January of the year)
    pub date: NaiveDate,
}

impl Event {
    /// Create the event for the given year
    pub fn for_year(year: u32) -> Result<Self> {
        let date = i32::try_from(year)
            .ok()
            .and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1))
            .ok_or_else(|| HazardError::range(format!("year {year} has no calendar date")))?;

        Ok(Self {
            id: year.to_string(),
            date,
        })
    }
}

/// The raster bands to extract for a range of years, along with the corresponding events
#[derive(Debug, Clone, PartialEq)]
pub struct BandSelection {
    /// 1-based band indices, one per requested year
    pub bands: Vec<usize>,
    /// Events, one per requested year, in increasing order
    pub events: Vec<Event>,
}

/// Map a requested year range onto the bands of a file whose first band is `chunk_start_year`.
///
/// Bands in the source rasters are numbered from 1, so the band for `year` is
/// `year - chunk_start_year + 1`.
///
/// # Arguments
///
/// * `requested` - The years to extract
/// * `chunk_start_year` - The year stored in the first band of the file
pub fn bands_and_events(requested: YearRange, chunk_start_year: u32) -> Result<BandSelection> {
    if requested.end < requested.start {
        return Err(HazardError::range(format!(
            "end year {} is before start year {}",
            requested.end, requested.start
        ))
        .into());
    }
    if requested.start < chunk_start_year {
        return Err(HazardError::range(format!(
            "requested years {requested} start before the file's first year {chunk_start_year}"
        ))
        .into());
    }

    let first_band = (requested.start - chunk_start_year + 1) as usize;
    let bands = (first_band..first_band + requested.len()).collect();
    let events = requested.iter().map(Event::for_year).collect::<Result<_>>()?;

    Ok(BandSelection { bands, events })
}
