//! Labelled histogram with fixed buckets

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use super::encode;

/// Default bucket upper bounds in seconds (`+Inf` is implicit)
pub const DEFAULT_BUCKETS: [f64; 14] = [
    0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0, 7.5, 10.0,
];

#[derive(Debug, Clone)]
struct Series {
    /// Per-bucket hits (not cumulative); last slot is `+Inf`
    buckets: Vec<u64>,
    sum: f64,
    count: u64,
}

impl Series {
    fn new(bucket_count: usize) -> Self {
        Self {
            buckets: vec![0; bucket_count + 1],
            sum: 0.0,
            count: 0,
        }
    }
}

/// Histogram family partitioned by label values
pub struct HistogramVec {
    name: String,
    help: String,
    label_names: &'static [&'static str],
    bounds: Vec<f64>,
    series: Mutex<BTreeMap<Vec<String>, Series>>,
}

impl HistogramVec {
    pub fn new(name: &str, help: &str, label_names: &'static [&'static str]) -> Self {
        Self::with_buckets(name, help, label_names, &DEFAULT_BUCKETS)
    }

    pub fn with_buckets(
        name: &str,
        help: &str,
        label_names: &'static [&'static str],
        bounds: &[f64],
    ) -> Self {
        Self {
            name: name.to_string(),
            help: help.to_string(),
            label_names,
            bounds: bounds.to_vec(),
            series: Mutex::new(BTreeMap::new()),
        }
    }

    /// Record one observation
    pub fn observe(&self, labels: &[&str], value: f64) {
        debug_assert_eq!(labels.len(), self.label_names.len());
        let key: Vec<String> = labels.iter().map(ToString::to_string).collect();
        let slot = self
            .bounds
            .iter()
            .position(|&bound| value <= bound)
            .unwrap_or(self.bounds.len());

        let mut series = self.series.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = series
            .entry(key)
            .or_insert_with(|| Series::new(self.bounds.len()));
        entry.buckets[slot] += 1;
        entry.sum += value;
        entry.count += 1;
    }

    /// Number of observations for one series
    pub fn count(&self, labels: &[&str]) -> u64 {
        let key: Vec<String> = labels.iter().map(ToString::to_string).collect();
        let series = self.series.lock().unwrap_or_else(PoisonError::into_inner);
        series.get(&key).map_or(0, |s| s.count)
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn encode(&self, out: &mut String) {
        encode::write_header(out, &self.name, &self.help, "histogram");

        let bucket_name = format!("{}_bucket", self.name);
        let sum_name = format!("{}_sum", self.name);
        let count_name = format!("{}_count", self.name);

        let series = self.series.lock().unwrap_or_else(PoisonError::into_inner);
        for (values, s) in series.iter() {
            let mut cumulative = 0;
            for (i, hits) in s.buckets.iter().enumerate() {
                cumulative += hits;
                let le = self
                    .bounds
                    .get(i)
                    .map_or_else(|| "+Inf".to_string(), |b| encode::format_float(*b));
                let labels = encode::format_labels(self.label_names, values, Some(("le", &le)));
                encode::write_sample(out, &bucket_name, &labels, cumulative as f64);
            }

            let labels = encode::format_labels(self.label_names, values, None);
            encode::write_sample(out, &count_name, &labels, s.count as f64);
            encode::write_sample(out, &sum_name, &labels, s.sum);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_counts() {
        let h = HistogramVec::new("latency", "Latency", &["endpoint"]);
        h.observe(&["/"], 0.001);
        h.observe(&["/"], 0.2);
        h.observe(&["/result"], 30.0);
        assert_eq!(h.count(&["/"]), 2);
        assert_eq!(h.count(&["/result"]), 1);
        assert_eq!(h.count(&["/vote"]), 0);
    }

    #[test]
    fn test_buckets_are_cumulative() {
        let h = HistogramVec::with_buckets("latency", "Latency", &["endpoint"], &[0.1, 1.0]);
        h.observe(&["/"], 0.0625);
        h.observe(&["/"], 0.5);
        h.observe(&["/"], 4.0);

        let mut out = String::new();
        h.encode(&mut out);

        assert!(out.contains("# TYPE latency histogram\n"));
        assert!(out.contains("latency_bucket{endpoint=\"/\",le=\"0.1\"} 1.0\n"));
        assert!(out.contains("latency_bucket{endpoint=\"/\",le=\"1.0\"} 2.0\n"));
        assert!(out.contains("latency_bucket{endpoint=\"/\",le=\"+Inf\"} 3.0\n"));
        assert!(out.contains("latency_count{endpoint=\"/\"} 3.0\n"));
        assert!(out.contains("latency_sum{endpoint=\"/\"} 4.5625\n"));
    }

    #[test]
    fn test_boundary_value_lands_in_its_bucket() {
        let h = HistogramVec::with_buckets("latency", "Latency", &["endpoint"], &[0.1, 1.0]);
        h.observe(&["/"], 1.0);

        let mut out = String::new();
        h.encode(&mut out);
        assert!(out.contains("latency_bucket{endpoint=\"/\",le=\"0.1\"} 0.0\n"));
        assert!(out.contains("latency_bucket{endpoint=\"/\",le=\"1.0\"} 1.0\n"));
    }
}
