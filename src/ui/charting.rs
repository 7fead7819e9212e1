/// Compute X (session number) and Y (WPM) bounds for the progress chart
pub fn compute_chart_params(points: &[(f64, f64)]) -> (f64, f64) {
    let highest_wpm = points.iter().map(|&(_, wpm)| wpm).fold(0.0, f64::max);

    let overall = match points.last() {
        Some(&(x, _)) => x.max(1.0),
        None => 1.0,
    };

    (overall, highest_wpm.ceil())
}

/// Number a WPM series 1..=n so sessions sit evenly on the X axis
pub fn indexed(values: impl IntoIterator<Item = f64>) -> Vec<(f64, f64)> {
    values
        .into_iter()
        .enumerate()
        .map(|(i, v)| ((i + 1) as f64, v))
        .collect()
}

/// Format a simple numeric label consistently
pub fn format_label(val: f64) -> String {
    if (val - val.round()).abs() < f64::EPSILON {
        format!("{}", val.round())
    } else {
        format!("{val:.2}")
    }
}
