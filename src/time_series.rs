use serde::{Deserialize, Serialize};

/// A sample on a progress chart: `t` is a unix timestamp in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressPoint {
    #[serde(rename = "x")]
    pub t: f64,
    #[serde(rename = "y")]
    pub value: f64,
}

impl ProgressPoint {
    pub fn new(t: f64, value: f64) -> Self {
        Self { t, value }
    }
}

impl From<(f64, f64)> for ProgressPoint {
    fn from(v: (f64, f64)) -> Self {
        ProgressPoint { t: v.0, value: v.1 }
    }
}

impl From<ProgressPoint> for (f64, f64) {
    fn from(p: ProgressPoint) -> Self {
        (p.t, p.value)
    }
}

/// WPM and accuracy over time, oldest sample first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressData {
    pub wpm: Vec<ProgressPoint>,
    pub accuracy: Vec<ProgressPoint>,
}
