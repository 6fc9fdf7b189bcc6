//! Schema Detection Module
//! Year-column detection, locale-aware numeric coercion and column lookup.

use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Lowest and highest calendar year a column name may denote.
pub const YEAR_COLUMN_MIN: i32 = 1900;
pub const YEAR_COLUMN_MAX: i32 = 2100;

/// Decimal separator used by a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecimalSeparator {
    #[default]
    Point,
    Comma,
}

/// Inclusive range of years kept by the normalizers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct YearRange {
    pub min: i32,
    pub max: i32,
}

impl Default for YearRange {
    fn default() -> Self {
        Self {
            min: 1990,
            max: 2025,
        }
    }
}

impl YearRange {
    pub fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, year: i32) -> bool {
        (self.min..=self.max).contains(&year)
    }
}

/// A column addressed by header name or by zero-based position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnRef {
    Index(usize),
    Name(String),
}

impl ColumnRef {
    pub fn name(name: &str) -> Self {
        ColumnRef::Name(name.to_string())
    }

    /// Look the column up in a frame.
    pub fn resolve<'a>(&self, df: &'a DataFrame) -> Option<&'a Column> {
        match self {
            ColumnRef::Index(idx) => df.get_columns().get(*idx),
            ColumnRef::Name(name) => df.column(name).ok(),
        }
    }
}

impl std::fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnRef::Index(idx) => write!(f, "#{idx}"),
            ColumnRef::Name(name) => f.write_str(name),
        }
    }
}

/// Interpret a column header as a calendar year.
///
/// Only four ASCII digits inside [`YEAR_COLUMN_MIN`, `YEAR_COLUMN_MAX`]
/// qualify, so metadata headers such as "Country Code" or an indicator
/// id are never mistaken for data columns.
pub fn parse_year(name: &str) -> Option<i32> {
    let name = name.trim();
    if name.len() != 4 || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = name.parse().ok()?;
    (YEAR_COLUMN_MIN..=YEAR_COLUMN_MAX)
        .contains(&year)
        .then_some(year)
}

/// Columns of a frame whose header passes [`parse_year`], in frame order.
pub fn year_columns(df: &DataFrame) -> Vec<(String, i32)> {
    df.get_column_names()
        .iter()
        .filter_map(|name| parse_year(name).map(|year| (name.to_string(), year)))
        .collect()
}

/// Parse a locale-formatted number. Empty cells, sentinels such as "n/a"
/// or "-", and non-finite results all yield `None`.
pub fn parse_number(raw: &str, decimal: DecimalSeparator) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let value: f64 = match decimal {
        DecimalSeparator::Point => raw.parse().ok()?,
        DecimalSeparator::Comma => raw.replace(',', ".").parse().ok()?,
    };
    value.is_finite().then_some(value)
}

/// Parse an integer cell. Leading zeros are accepted ("01001" is 1001) and
/// so is a decimal rendering with a zero fraction ("1001.0").
pub fn parse_integer(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(value) = raw.parse::<i64>() {
        return Some(value);
    }
    let value: f64 = raw.parse().ok()?;
    (value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64)
        .then_some(value as i64)
}

/// Values of a column as `f64`. String columns are parsed with the given
/// separator, numeric columns are cast.
pub fn numeric_values(
    column: &Column,
    decimal: DecimalSeparator,
) -> PolarsResult<Vec<Option<f64>>> {
    if column.dtype() == &DataType::String {
        return Ok(column
            .str()?
            .into_iter()
            .map(|cell| cell.and_then(|s| parse_number(s, decimal)))
            .collect());
    }

    let cast = column.cast(&DataType::Float64)?;
    Ok(cast
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect())
}

/// Values of a column rendered as trimmed strings; blanks become `None`.
pub fn text_values(column: &Column) -> PolarsResult<Vec<Option<String>>> {
    let cast;
    let column = if column.dtype() == &DataType::String {
        column
    } else {
        cast = column.cast(&DataType::String)?;
        &cast
    };

    Ok(column
        .str()?
        .into_iter()
        .map(|cell| {
            cell.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_predicate_accepts_only_plain_years() {
        assert_eq!(parse_year("2019"), Some(2019));
        assert_eq!(parse_year(" 1990 "), Some(1990));
        assert_eq!(parse_year("Country Code"), None);
        assert_eq!(parse_year("19"), None);
        assert_eq!(parse_year("20190"), None);
        assert_eq!(parse_year("1850"), None);
        assert_eq!(parse_year("2101"), None);
        assert_eq!(parse_year("2O19"), None);
        assert_eq!(parse_year("+201"), None);
    }

    #[test]
    fn year_columns_keep_frame_order() {
        let df = DataFrame::new(vec![
            Column::new("Country Code".into(), ["DEU"]),
            Column::new("2020".into(), ["1"]),
            Column::new("Indicator".into(), ["x"]),
            Column::new("2019".into(), ["2"]),
        ])
        .unwrap();

        assert_eq!(
            year_columns(&df),
            vec![("2020".to_string(), 2020), ("2019".to_string(), 2019)]
        );
    }

    #[test]
    fn numbers_respect_decimal_separator() {
        assert_eq!(parse_number("2.1", DecimalSeparator::Point), Some(2.1));
        assert_eq!(parse_number("-3.5", DecimalSeparator::Point), Some(-3.5));
        assert_eq!(parse_number("5,7", DecimalSeparator::Comma), Some(5.7));
        assert_eq!(parse_number("5,7", DecimalSeparator::Point), None);
        assert_eq!(parse_number("n/a", DecimalSeparator::Point), None);
        assert_eq!(parse_number("", DecimalSeparator::Comma), None);
        assert_eq!(parse_number("-", DecimalSeparator::Comma), None);
        assert_eq!(parse_number("NaN", DecimalSeparator::Point), None);
        assert_eq!(parse_number("inf", DecimalSeparator::Point), None);
    }

    #[test]
    fn integers_tolerate_padding_and_float_rendering() {
        assert_eq!(parse_integer("01001"), Some(1001));
        assert_eq!(parse_integer(" 9162 "), Some(9162));
        assert_eq!(parse_integer("1001.0"), Some(1001));
        assert_eq!(parse_integer("1001.5"), None);
        assert_eq!(parse_integer("DG"), None);
        assert_eq!(parse_integer(""), None);
    }

    #[test]
    fn column_values_from_string_and_numeric_columns() {
        let text = Column::new("v".into(), [Some("1,5"), None, Some("x")]);
        assert_eq!(
            numeric_values(&text, DecimalSeparator::Comma).unwrap(),
            vec![Some(1.5), None, None]
        );

        let ints = Column::new("c".into(), [1001i64, 2000]);
        assert_eq!(
            numeric_values(&ints, DecimalSeparator::Point).unwrap(),
            vec![Some(1001.0), Some(2000.0)]
        );
        assert_eq!(
            text_values(&ints).unwrap(),
            vec![Some("1001".to_string()), Some("2000".to_string())]
        );
    }

    #[test]
    fn column_ref_resolves_by_name_and_index() {
        let df = DataFrame::new(vec![
            Column::new("year".into(), ["2020"]),
            Column::new("value".into(), ["1"]),
        ])
        .unwrap();

        assert_eq!(ColumnRef::Index(1).resolve(&df).unwrap().name().as_str(), "value");
        assert_eq!(ColumnRef::name("year").resolve(&df).unwrap().name().as_str(), "year");
        assert!(ColumnRef::Index(5).resolve(&df).is_none());
        assert!(ColumnRef::name("missing").resolve(&df).is_none());
    }

    #[test]
    fn year_range_is_inclusive() {
        let range = YearRange::new(1990, 2025);
        assert!(range.contains(1990));
        assert!(range.contains(2025));
        assert!(!range.contains(1989));
        assert!(!range.contains(2026));
    }
}
