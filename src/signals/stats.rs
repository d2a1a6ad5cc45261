use std::collections::HashMap;
use ndarray::ArrayView1;
/// Divisor used for the standard deviation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StdConvention {
    /// Divide by `n`.
    Population,
    /// Divide by `n - 1`.
    Sample,
}
impl StdConvention {
    fn ddof(self) -> f64 {
        match self {
            StdConvention::Population => 0.0,
            StdConvention::Sample => 1.0,
        }
    }
}
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Summary {
    pub mean: f64,
    pub std: f64,
    pub max: f64,
    pub min: f64,
}
impl Summary {
    /// `None` for an empty slice.
    pub fn of(values: &[f64], convention: StdConvention) -> Option<Self> {
        let view = ArrayView1::from(values);
        let mean = view.mean()?;
        // a single sample has no n-1 spread
        let std = if values.len() as f64 > convention.ddof() {
            view.std(convention.ddof())
        } else {
            f64::NAN
        };
        Some(Self {
            mean,
            std,
            max: view.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v)),
            min: view.fold(f64::INFINITY, |acc, &v| acc.min(v)),
        })
    }
    pub fn report(&self) -> String {
        format!(
            "Mean: {:.2}\nStd: {:.2}\nMax: {:.2}\nMin: {:.2}",
            self.mean, self.std, self.max, self.min
        )
    }
}
pub fn column_report(column: &str, summary: &Summary, rows: usize) -> String {
    format!("Analysis of {column}:\n{}\nCount: {rows}", summary.report())
}
/// Frequency of each distinct value, highest first; ties keep first-seen order.
pub fn value_counts<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for value in values {
        match index.get(value) {
            Some(&pos) => counts[pos].1 += 1,
            None => {
                index.insert(value, counts.len());
                counts.push((value.to_owned(), 1));
            }
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}
pub fn value_counts_report(column: &str, counts: &[(String, usize)]) -> String {
    let mut report = format!("Value counts for {column}:");
    for (value, n) in counts {
        report.push_str(&format!("\n{value}: {n}"));
    }
    report
}
