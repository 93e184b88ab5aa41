//! Descriptive statistics over loaded table contents.
//!
//! Numeric columns get count, mean, sample standard deviation, min, quartiles
//! and max. Quartiles use linear interpolation between closest ranks. When a
//! table has no numeric column, every column gets a categorical summary
//! (count, unique, top, freq) instead.

use crate::models::QueryResult;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// A column is numeric when every non-null value is a JSON number and at
/// least one value is present.
pub fn is_numeric_column(result: &QueryResult, index: usize) -> bool {
    let mut seen_number = false;
    for value in result.column_values(index) {
        match value {
            JsonValue::Null => {}
            JsonValue::Number(_) => seen_number = true,
            _ => return false,
        }
    }
    seen_number
}

/// Names of the numeric columns, in table order.
pub fn numeric_columns(result: &QueryResult) -> Vec<String> {
    result
        .columns
        .iter()
        .enumerate()
        .filter(|(idx, _)| is_numeric_column(result, *idx))
        .map(|(_, c)| c.name.clone())
        .collect()
}

/// Finite numeric values of one column, nulls dropped.
pub fn numeric_values(result: &QueryResult, index: usize) -> Vec<f64> {
    result
        .column_values(index)
        .filter_map(JsonValue::as_f64)
        .filter(|v| v.is_finite())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub column: String,
    pub count: usize,
    pub mean: f64,
    /// `None` when fewer than two values are present.
    pub std: Option<f64>,
    pub min: f64,
    #[serde(rename = "25%")]
    pub p25: f64,
    #[serde(rename = "50%")]
    pub p50: f64,
    #[serde(rename = "75%")]
    pub p75: f64,
    pub max: f64,
}

impl NumericSummary {
    /// Summarise `values`. Returns `None` for an empty slice.
    pub fn from_values(column: impl Into<String>, values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let mean = sorted.iter().sum::<f64>() / count as f64;
        let std = (count > 1).then(|| {
            let ss: f64 = sorted.iter().map(|v| (v - mean).powi(2)).sum();
            (ss / (count - 1) as f64).sqrt()
        });

        Some(Self {
            column: column.into(),
            count,
            mean,
            std,
            min: sorted[0],
            p25: quantile(&sorted, 0.25),
            p50: quantile(&sorted, 0.5),
            p75: quantile(&sorted, 0.75),
            max: sorted[count - 1],
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoricalSummary {
    pub column: String,
    pub count: usize,
    pub unique: usize,
    pub top: Option<JsonValue>,
    pub freq: Option<usize>,
}

impl CategoricalSummary {
    pub fn from_values<'a>(
        column: impl Into<String>,
        values: impl Iterator<Item = &'a JsonValue>,
    ) -> Self {
        let mut counts: HashMap<String, (usize, usize, &JsonValue)> = HashMap::new();
        let mut count = 0;
        for (order, value) in values.filter(|v| !v.is_null()).enumerate() {
            count += 1;
            counts
                .entry(value.to_string())
                .and_modify(|e| e.0 += 1)
                .or_insert((1, order, value));
        }

        // Most frequent wins; ties go to the value seen first.
        let top = counts
            .values()
            .max_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

        Self {
            column: column.into(),
            count,
            unique: counts.len(),
            top: top.map(|(_, _, v)| (*v).clone()),
            freq: top.map(|(n, _, _)| *n),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "columns", rename_all = "snake_case")]
pub enum Summary {
    Numeric(Vec<NumericSummary>),
    Categorical(Vec<CategoricalSummary>),
}

/// Summarise a non-empty result: numeric columns when there are any,
/// otherwise a categorical summary of every column.
pub fn summarize(result: &QueryResult) -> Summary {
    let numeric: Vec<NumericSummary> = result
        .columns
        .iter()
        .enumerate()
        .filter(|(idx, _)| is_numeric_column(result, *idx))
        .filter_map(|(idx, c)| NumericSummary::from_values(&c.name, &numeric_values(result, idx)))
        .collect();

    if !numeric.is_empty() {
        return Summary::Numeric(numeric);
    }

    Summary::Categorical(
        result
            .columns
            .iter()
            .enumerate()
            .map(|(idx, c)| CategoricalSummary::from_values(&c.name, result.column_values(idx)))
            .collect(),
    )
}

/// Linear-interpolated quantile of an ascending, non-empty slice.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}
