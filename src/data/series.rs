//! Year Series Module
//! Year-keyed value series with calendar lags and trailing means.

use super::schema::YearRange;
use polars::prelude::*;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum SeriesError {
    #[error("Duplicate year {year} in series '{series}'")]
    DuplicateYear { series: String, year: i32 },
}

/// An ascending sequence of `(year, value)` pairs with unique years.
/// A `None` value marks a year that exists in the source but could not be
/// read; it is kept so joins and lags stay aligned.
#[derive(Debug, Clone, PartialEq)]
pub struct YearSeries {
    name: String,
    points: Vec<(i32, Option<f64>)>,
}

impl YearSeries {
    /// Build a series, sorting by year. Repeated years are rejected.
    pub fn new(
        name: impl Into<String>,
        points: impl IntoIterator<Item = (i32, Option<f64>)>,
    ) -> Result<Self, SeriesError> {
        let name = name.into();
        let mut points: Vec<(i32, Option<f64>)> = points.into_iter().collect();
        points.sort_by_key(|(year, _)| *year);

        if let Some(pair) = points.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(SeriesError::DuplicateYear {
                series: name,
                year: pair[0].0,
            });
        }

        Ok(Self { name, points })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[(i32, Option<f64>)] {
        &self.points
    }

    pub fn years(&self) -> impl Iterator<Item = i32> + '_ {
        self.points.iter().map(|(year, _)| *year)
    }

    pub fn contains_year(&self, year: i32) -> bool {
        self.position(year).is_some()
    }

    /// Value at `year`; `None` when the year is absent or its value missing.
    pub fn get(&self, year: i32) -> Option<f64> {
        self.position(year).and_then(|idx| self.points[idx].1)
    }

    fn position(&self, year: i32) -> Option<usize> {
        self.points.binary_search_by_key(&year, |(y, _)| *y).ok()
    }

    /// Same points under a different name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            points: self.points.clone(),
        }
    }

    /// Keep only the years inside `range`.
    pub fn restrict(&self, range: YearRange) -> Self {
        Self {
            name: self.name.clone(),
            points: self
                .points
                .iter()
                .copied()
                .filter(|(year, _)| range.contains(*year))
                .collect(),
        }
    }

    /// Calendar lag: the value at `Y` becomes the original value at `Y - k`.
    /// Years keep their position; a year whose predecessor is absent or
    /// missing gets `None`.
    pub fn lag(&self, k: u32) -> Self {
        let offset = k as i32;
        Self {
            name: format!("{}_lag{}", self.name, k),
            points: self
                .points
                .iter()
                .map(|(year, _)| (*year, self.get(year - offset)))
                .collect(),
        }
    }

    /// Mean of the `window` years ending `lag` years before each year.
    /// Defined only when every year of the window has a value.
    pub fn trailing_mean(&self, window: u32, lag: u32) -> Self {
        let window = window as i32;
        let lag = lag as i32;
        let points = self
            .points
            .iter()
            .map(|(year, _)| {
                if window == 0 {
                    return (*year, None);
                }
                let end = year - lag;
                let values: Option<Vec<f64>> =
                    (end - window + 1..=end).map(|y| self.get(y)).collect();
                let mean = values.map(|v| v.iter().sum::<f64>() / v.len() as f64);
                (*year, mean)
            })
            .collect();

        Self {
            name: format!("{}_lag{}_avg{}", self.name, lag, window),
            points,
        }
    }

    /// Two-column frame: the year column and the series values.
    pub fn to_frame(&self, year_column: &str) -> PolarsResult<DataFrame> {
        let years: Vec<i32> = self.years().collect();
        let values: Vec<Option<f64>> = self.points.iter().map(|(_, v)| *v).collect();
        DataFrame::new(vec![
            Column::new(year_column.into(), years),
            Column::new(self.name.as_str().into(), values),
        ])
    }
}
