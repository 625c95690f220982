//! Labelled monotonic counter

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use super::encode;

/// Counter family partitioned by label values
pub struct CounterVec {
    name: String,
    help: String,
    label_names: &'static [&'static str],
    series: Mutex<BTreeMap<Vec<String>, u64>>,
}

impl CounterVec {
    /// `name` is the family name without the `_total` suffix
    pub fn new(name: &str, help: &str, label_names: &'static [&'static str]) -> Self {
        Self {
            name: format!("{name}_total"),
            help: help.to_string(),
            label_names,
            series: Mutex::new(BTreeMap::new()),
        }
    }

    /// Increment the series for `labels` by one
    pub fn inc(&self, labels: &[&str]) {
        debug_assert_eq!(labels.len(), self.label_names.len());
        let key: Vec<String> = labels.iter().map(ToString::to_string).collect();
        let mut series = self.series.lock().unwrap_or_else(PoisonError::into_inner);
        *series.entry(key).or_insert(0) += 1;
    }

    /// Current value of one series (0 when never incremented)
    pub fn get(&self, labels: &[&str]) -> u64 {
        let key: Vec<String> = labels.iter().map(ToString::to_string).collect();
        let series = self.series.lock().unwrap_or_else(PoisonError::into_inner);
        series.get(&key).copied().unwrap_or(0)
    }

    pub fn encode(&self, out: &mut String) {
        encode::write_header(out, &self.name, &self.help, "counter");
        let series = self.series.lock().unwrap_or_else(PoisonError::into_inner);
        for (values, count) in series.iter() {
            let labels = encode::format_labels(self.label_names, values, None);
            #[allow(clippy::cast_precision_loss)]
            encode::write_sample(out, &self.name, &labels, *count as f64);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inc_per_label_set() {
        let c = CounterVec::new("requests", "Requests", &["endpoint", "method"]);
        c.inc(&["/", "GET"]);
        c.inc(&["/", "GET"]);
        c.inc(&["/vote", "POST"]);
        assert_eq!(c.get(&["/", "GET"]), 2);
        assert_eq!(c.get(&["/vote", "POST"]), 1);
        assert_eq!(c.get(&["/result", "GET"]), 0);
    }

    #[test]
    fn test_encode() {
        let c = CounterVec::new("requests", "Requests", &["endpoint", "method"]);
        c.inc(&["/vote", "POST"]);
        let mut out = String::new();
        c.encode(&mut out);
        assert_eq!(
            out,
            "# HELP requests_total Requests\n\
             # TYPE requests_total counter\n\
             requests_total{endpoint=\"/vote\",method=\"POST\"} 1.0\n"
        );
    }
}
