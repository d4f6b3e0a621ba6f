//! Small display helpers used across modules.

/// `MM:SS`; fractional seconds are truncated and negatives clamp to zero.
pub fn format_time(seconds: f64) -> String {
  let total = if seconds.is_finite() && seconds > 0.0 { seconds as u64 } else { 0 };
  format!("{:02}:{:02}", total / 60, total % 60)
}

/// Compact score: `1.5M`, `2.3K`, or the plain number below a thousand.
pub fn format_score(score: u64) -> String {
  if score >= 1_000_000 {
    format!("{:.1}M", score as f64 / 1_000_000.0)
  } else if score >= 1_000 {
    format!("{:.1}K", score as f64 / 1_000.0)
  } else {
    score.to_string()
  }
}
