//! Age-distribution report produced after a load completes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const UNDER_20: &str = "< 20";
pub const FROM_20_TO_40: &str = "20 to 40";
pub const FROM_40_TO_60: &str = "40 to 60";
pub const OVER_60: &str = "> 60";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgeBucket {
    pub age_group: String,
    pub percentage: f64,
}

/// Buckets ordered by label text, the way the store orders them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AgeReport {
    pub rows: Vec<AgeBucket>,
}

/// Bucket label for one stored age. Unknown ages fall through to the last bucket.
pub fn age_group(age: Option<i64>) -> &'static str {
    match age {
        Some(a) if a < 20 => UNDER_20,
        Some(a) if a <= 40 => FROM_20_TO_40,
        Some(a) if a <= 60 => FROM_40_TO_60,
        _ => OVER_60,
    }
}

impl AgeReport {
    /// Compute the distribution in-process from stored ages.
    pub fn from_ages<I>(ages: I) -> Self
    where
        I: IntoIterator<Item = Option<i64>>,
    {
        let mut counts: BTreeMap<&'static str, u64> = BTreeMap::new();
        let mut total = 0u64;
        for age in ages {
            *counts.entry(age_group(age)).or_insert(0) += 1;
            total += 1;
        }

        let rows = counts
            .into_iter()
            .map(|(group, count)| AgeBucket {
                age_group: group.to_string(),
                percentage: round2(count as f64 * 100.0 / total as f64),
            })
            .collect();

        Self { rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl fmt::Display for AgeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rows.is_empty() {
            return writeln!(f, "(no rows)");
        }

        let width = self
            .rows
            .iter()
            .map(|r| r.age_group.len())
            .max()
            .unwrap_or(0)
            .max("age_group".len());

        writeln!(f, "{:<width$} | {:>10}", "age_group", "percentage", width = width)?;
        writeln!(f, "{}-+-{}", "-".repeat(width), "-".repeat(10))?;
        for row in &self.rows {
            writeln!(
                f,
                "{:<width$} | {:>10.2}",
                row.age_group,
                row.percentage,
                width = width
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_age_group_boundaries() {
        assert_eq!(age_group(Some(19)), UNDER_20);
        assert_eq!(age_group(Some(20)), FROM_20_TO_40);
        assert_eq!(age_group(Some(40)), FROM_20_TO_40);
        assert_eq!(age_group(Some(41)), FROM_40_TO_60);
        assert_eq!(age_group(Some(60)), FROM_40_TO_60);
        assert_eq!(age_group(Some(61)), OVER_60);
        assert_eq!(age_group(None), OVER_60);
    }

    #[test]
    fn test_distribution_sorted_by_label() {
        let report =
            AgeReport::from_ages(vec![Some(10), Some(25), Some(30), Some(70), None, Some(50)]);
        let groups: Vec<&str> = report.rows.iter().map(|r| r.age_group.as_str()).collect();
        assert_eq!(groups, vec![FROM_20_TO_40, FROM_40_TO_60, UNDER_20, OVER_60]);

        let pct: Vec<f64> = report.rows.iter().map(|r| r.percentage).collect();
        assert_eq!(pct, vec![33.33, 16.67, 16.67, 33.33]);
    }

    #[test]
    fn test_empty_report() {
        let report = AgeReport::from_ages(Vec::new());
        assert!(report.is_empty());
        assert_eq!(report.to_string(), "(no rows)\n");
    }

    #[test]
    fn test_render_table() {
        let report = AgeReport::from_ages(vec![Some(10)]);
        let rendered = report.to_string();
        assert!(rendered.starts_with("age_group | percentage"));
        assert!(rendered.contains("< 20      |     100.00"));
    }
}
