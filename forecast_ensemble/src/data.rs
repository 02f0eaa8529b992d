//! Feature tables and time series handling

use crate::error::{ForecastError, Result};
use chrono::{Duration, NaiveDate};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

/// Ordered `(date, value)` pairs with strictly increasing dates
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl TimeSeries {
    /// Create a new series, validating ordering and lengths
    pub fn new(dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self> {
        if dates.len() != values.len() {
            return Err(ForecastError::DataError(format!(
                "{} dates for {} values",
                dates.len(),
                values.len()
            )));
        }
        ensure_increasing(&dates)?;
        Ok(Self { dates, values })
    }

    /// Get the dates
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Get the values
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Last observation, if any
    pub fn last(&self) -> Option<(NaiveDate, f64)> {
        Some((*self.dates.last()?, *self.values.last()?))
    }

    /// Length of the series
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the series is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A table of numeric feature columns keyed by date.
///
/// Dates live next to the polars `DataFrame` rather than inside it so row
/// selection never has to round-trip through temporal dtypes.
#[derive(Debug, Clone)]
pub struct FeatureFrame {
    dates: Vec<NaiveDate>,
    df: DataFrame,
}

/// A frame partitioned into a training window `[train_start, cutoff]` and a test
/// window `(cutoff, end]`
#[derive(Debug, Clone)]
pub struct Split {
    pub train: FeatureFrame,
    pub test: FeatureFrame,
}

/// Data loader for feature tables
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load a feature table from a CSV file with a `date` column
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<FeatureFrame> {
        let file = File::open(path)?;
        let df = CsvReader::new(file)
            .infer_schema(Some(1000))
            .has_header(true)
            .finish()?;

        Self::from_dataframe(df)
    }

    /// Load every `<SYMBOL>.csv` in a directory, sorted by symbol.
    ///
    /// Only an unreadable directory fails the call; each file's own outcome is
    /// returned next to its symbol.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Vec<(String, Result<FeatureFrame>)>> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("csv") {
                paths.push(path);
            }
        }
        paths.sort();

        Ok(paths
            .into_iter()
            .map(|path| {
                let symbol = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or_default()
                    .to_string();
                (symbol, Self::from_csv(&path))
            })
            .collect())
    }

    /// Split a DataFrame with a date column into dates and numeric features
    pub fn from_dataframe(df: DataFrame) -> Result<FeatureFrame> {
        let date_column = Self::detect_date_column(&df)?;
        let dates = Self::parse_dates(df.column(&date_column)?)?;

        let numeric: Vec<Series> = df
            .get_columns()
            .iter()
            .filter(|s| s.name() != date_column && s.dtype().is_numeric())
            .cloned()
            .collect();

        FeatureFrame::new(dates, DataFrame::new(numeric)?)
    }

    /// Detect the date column in a DataFrame
    fn detect_date_column(df: &DataFrame) -> Result<String> {
        for name in df.get_column_names() {
            let lower = name.to_lowercase();
            if lower == "date" || lower.contains("time") || lower.contains("date") {
                return Ok(name.to_string());
            }
        }

        if let Some(first) = df.get_columns().first() {
            if first.dtype().is_temporal() {
                return Ok(first.name().to_string());
            }
        }

        Err(ForecastError::DataError(
            "No date column found in data".to_string(),
        ))
    }

    fn parse_dates(column: &Series) -> Result<Vec<NaiveDate>> {
        match column.dtype() {
            DataType::Utf8 => column
                .utf8()?
                .into_iter()
                .enumerate()
                .map(|(row, value)| {
                    let text = value.ok_or_else(|| {
                        ForecastError::DataError(format!("Missing date in row {}", row))
                    })?;
                    parse_date(text)
                })
                .collect(),
            DataType::Date | DataType::Datetime(_, _) => {
                let days = column.cast(&DataType::Date)?.cast(&DataType::Int32)?;
                let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)
                    .ok_or_else(|| ForecastError::DataError("invalid epoch".to_string()))?;
                days.i32()?
                    .into_iter()
                    .enumerate()
                    .map(|(row, value)| {
                        value
                            .map(|d| epoch + Duration::days(i64::from(d)))
                            .ok_or_else(|| {
                                ForecastError::DataError(format!("Missing date in row {}", row))
                            })
                    })
                    .collect()
            }
            other => Err(ForecastError::DataError(format!(
                "Date column has unsupported type {}",
                other
            ))),
        }
    }
}

/// Parse `YYYY-MM-DD`, ignoring any time-of-day suffix
pub fn parse_date(text: &str) -> Result<NaiveDate> {
    let head = text.trim().get(..10).unwrap_or(text);
    NaiveDate::parse_from_str(head, "%Y-%m-%d")
        .map_err(|e| ForecastError::DataError(format!("Invalid date '{}': {}", text, e)))
}

fn ensure_increasing(dates: &[NaiveDate]) -> Result<()> {
    if let Some(w) = dates.windows(2).find(|w| w[0] >= w[1]) {
        return Err(ForecastError::DataError(format!(
            "Dates must be strictly increasing, found {} followed by {}",
            w[0], w[1]
        )));
    }
    Ok(())
}

impl FeatureFrame {
    /// Create a frame from dates and a DataFrame of the same height
    pub fn new(dates: Vec<NaiveDate>, df: DataFrame) -> Result<Self> {
        if df.width() > 0 && df.height() != dates.len() {
            return Err(ForecastError::DataError(format!(
                "{} dates for {} rows",
                dates.len(),
                df.height()
            )));
        }
        ensure_increasing(&dates)?;
        Ok(Self { dates, df })
    }

    /// Create a frame from named columns that may contain gaps
    pub fn from_columns(dates: Vec<NaiveDate>, columns: Vec<(&str, Vec<Option<f64>>)>) -> Result<Self> {
        let series = columns
            .into_iter()
            .map(|(name, values)| Series::new(name, values))
            .collect();
        Self::new(dates, DataFrame::new(series)?)
    }

    /// Create a frame from complete named columns
    pub fn from_dense_columns(dates: Vec<NaiveDate>, columns: Vec<(&str, Vec<f64>)>) -> Result<Self> {
        let series = columns
            .into_iter()
            .map(|(name, values)| Series::new(name, values))
            .collect();
        Self::new(dates, DataFrame::new(series)?)
    }

    /// Get the DataFrame
    pub fn dataframe(&self) -> &DataFrame {
        &self.df
    }

    /// Get the row dates
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Get the column names
    pub fn column_names(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Whether a column exists
    pub fn has_column(&self, name: &str) -> bool {
        self.df.get_column_names().contains(&name)
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Check if the frame has no rows
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// A column as optional floats, nulls and NaNs mapped to `None`
    pub fn column(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let col = self.df.column(name).map_err(|e| {
            ForecastError::DataError(format!("Column '{}' not found: {}", name, e))
        })?;
        let floats = col.cast(&DataType::Float64)?;
        let values = floats
            .f64()?
            .into_iter()
            .map(|v| v.filter(|x| x.is_finite()))
            .collect();
        Ok(values)
    }

    /// A column that must be fully defined
    pub fn required_column(&self, name: &str) -> Result<Vec<f64>> {
        self.column(name)?
            .into_iter()
            .enumerate()
            .map(|(row, v)| {
                v.ok_or_else(|| {
                    ForecastError::DataError(format!(
                        "Column '{}' is undefined at {}",
                        name, self.dates[row]
                    ))
                })
            })
            .collect()
    }

    /// A fully defined column as a dated series
    pub fn series(&self, name: &str) -> Result<TimeSeries> {
        TimeSeries::new(self.dates.clone(), self.required_column(name)?)
    }

    /// Add or replace a column
    pub fn with_column(mut self, name: &str, values: Vec<Option<f64>>) -> Result<Self> {
        if values.len() != self.len() {
            return Err(ForecastError::DataError(format!(
                "Column '{}' has {} values for {} rows",
                name,
                values.len(),
                self.len()
            )));
        }
        self.df.with_column(Series::new(name, values))?;
        Ok(self)
    }

    /// Keep only rows where every listed column is defined
    pub fn drop_incomplete(&self, columns: &[&str]) -> Result<Self> {
        let mut keep = vec![true; self.len()];
        for name in columns {
            for (flag, value) in keep.iter_mut().zip(self.column(name)?) {
                *flag &= value.is_some();
            }
        }
        self.select_rows(&keep)
    }

    /// Rows with `start <= date <= end`
    pub fn between(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Self> {
        let from = start.map_or(0, |s| self.dates.partition_point(|d| *d < s));
        let to = end.map_or(self.len(), |e| self.dates.partition_point(|d| *d <= e));
        let to = to.max(from);

        Ok(Self {
            dates: self.dates[from..to].to_vec(),
            df: self.df.slice(from as i64, to - from),
        })
    }

    /// Partition into `[train_start, cutoff]` and `(cutoff, test_end]`
    pub fn split(
        &self,
        train_start: NaiveDate,
        cutoff: NaiveDate,
        test_end: Option<NaiveDate>,
    ) -> Result<Split> {
        let train = self.between(Some(train_start), Some(cutoff))?;
        let test = self.between(cutoff.succ_opt(), test_end)?;

        if train.is_empty() {
            return Err(ForecastError::InsufficientData(format!(
                "training window {} to {} is empty",
                train_start, cutoff
            )));
        }
        if test.is_empty() {
            return Err(ForecastError::InsufficientData(format!(
                "test window after {} is empty",
                cutoff
            )));
        }
        Ok(Split { train, test })
    }

    fn select_rows(&self, keep: &[bool]) -> Result<Self> {
        let mask = BooleanChunked::from_slice("keep", keep);
        let df = self.df.filter(&mask)?;
        let dates = self
            .dates
            .iter()
            .zip(keep)
            .filter(|(_, k)| **k)
            .map(|(d, _)| *d)
            .collect();
        Ok(Self { dates, df })
    }
}
