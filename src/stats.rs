//! Small numeric helpers shared by the generator and the renderers.

/// Rounds half away from zero to `decimals` places, matching SQLite `ROUND`.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Whole currency units with thousands separators, e.g. `$18,250`.
pub fn format_currency(amount: f64) -> String {
    let units = amount.round() as i64;
    let digits = units.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if units < 0 {
        format!("-${grouped}")
    } else {
        format!("${grouped}")
    }
}

/// Five-number summary used to draw a box plot.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxSummary {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    /// Lowest value within `q1 - 1.5 * IQR`
    pub lower_whisker: f64,
    /// Highest value within `q3 + 1.5 * IQR`
    pub upper_whisker: f64,
    pub outliers: Vec<f64>,
}

impl BoxSummary {
    /// Returns `None` for an empty sample.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let q1 = quantile(&sorted, 0.25);
        let median = quantile(&sorted, 0.5);
        let q3 = quantile(&sorted, 0.75);
        let reach = 1.5 * (q3 - q1);
        let (low_fence, high_fence) = (q1 - reach, q3 + reach);

        let inside = || sorted.iter().copied().filter(|v| *v >= low_fence && *v <= high_fence);
        let lower_whisker = inside().fold(f64::INFINITY, f64::min).min(q1);
        let upper_whisker = inside().fold(f64::NEG_INFINITY, f64::max).max(q3);
        let outliers = sorted
            .iter()
            .copied()
            .filter(|v| *v < low_fence || *v > high_fence)
            .collect();

        Some(Self {
            q1,
            median,
            q3,
            lower_whisker,
            upper_whisker,
            outliers,
        })
    }
}

/// Linear-interpolated quantile of an ascending, non-empty slice.
fn quantile(sorted: &[f64], p: f64) -> f64 {
    let position = p * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (position - lower as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(2.345_678, 2), 2.35);
        assert_eq!(round_to(7.25, 1), 7.3);
        assert_eq!(round_to(0.04, 1), 0.0);
        assert_eq!(round_to(1234.5, 0), 1235.0);
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(0.0), "$0");
        assert_eq!(format_currency(600.4), "$600");
        assert_eq!(format_currency(4_512.7), "$4,513");
        assert_eq!(format_currency(35_000.0), "$35,000");
        assert_eq!(format_currency(1_234_567.0), "$1,234,567");
        assert_eq!(format_currency(-1_500.0), "-$1,500");
    }

    #[test]
    fn test_box_summary_quartiles() {
        let summary = BoxSummary::from_values(&[4.0, 1.0, 3.0, 2.0, 5.0]).unwrap();
        assert_eq!(summary.q1, 2.0);
        assert_eq!(summary.median, 3.0);
        assert_eq!(summary.q3, 4.0);
        assert_eq!(summary.lower_whisker, 1.0);
        assert_eq!(summary.upper_whisker, 5.0);
        assert!(summary.outliers.is_empty());

        let summary = BoxSummary::from_values(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert!((summary.q1 - 1.75).abs() < 1e-12);
        assert!((summary.median - 2.5).abs() < 1e-12);
        assert!((summary.q3 - 3.25).abs() < 1e-12);
    }

    #[test]
    fn test_box_summary_outliers() {
        let summary = BoxSummary::from_values(&[3.0, 3.1, 3.2, 3.3, 9.0]).unwrap();
        assert_eq!(summary.outliers, vec![9.0]);
        assert_eq!(summary.upper_whisker, 3.3);
    }

    #[test]
    fn test_box_summary_single_and_empty() {
        let summary = BoxSummary::from_values(&[2.5]).unwrap();
        assert_eq!(summary.q1, 2.5);
        assert_eq!(summary.q3, 2.5);
        assert_eq!(summary.lower_whisker, 2.5);
        assert_eq!(summary.upper_whisker, 2.5);
        assert!(BoxSummary::from_values(&[]).is_none());
    }
}
