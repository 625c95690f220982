//! Prometheus text exposition helpers (format 0.0.4)

use std::fmt::Write;

/// Content type served on the metrics endpoint
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Write the `# HELP` and `# TYPE` header of a metric family
pub fn write_header(out: &mut String, name: &str, help: &str, kind: &str) {
    let _ = writeln!(out, "# HELP {name} {}", escape_help(help));
    let _ = writeln!(out, "# TYPE {name} {kind}");
}

/// Write a single sample line
pub fn write_sample(out: &mut String, name: &str, labels: &str, value: f64) {
    let _ = writeln!(out, "{name}{labels} {}", format_float(value));
}

/// Render a label set as `{a="x",b="y"}`, empty string when there are no labels
pub fn format_labels(names: &[&str], values: &[String], extra: Option<(&str, &str)>) -> String {
    let mut pairs: Vec<String> = names
        .iter()
        .zip(values)
        .map(|(n, v)| format!("{n}=\"{}\"", escape_label_value(v)))
        .collect();

    if let Some((n, v)) = extra {
        pairs.push(format!("{n}=\"{}\"", escape_label_value(v)));
    }

    if pairs.is_empty() {
        String::new()
    } else {
        format!("{{{}}}", pairs.join(","))
    }
}

/// Format a sample value; whole numbers keep one decimal (`1.0`), infinity is `+Inf`
pub fn format_float(value: f64) -> String {
    if value.is_infinite() {
        if value.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else if value.is_nan() {
        "NaN".to_string()
    } else if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

fn escape_label_value(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn escape_help(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(0.005), "0.005");
        assert_eq!(format_float(2.5), "2.5");
        assert_eq!(format_float(f64::INFINITY), "+Inf");
        assert_eq!(format_float(f64::NAN), "NaN");
    }

    #[test]
    fn test_format_labels() {
        let values = vec!["/vote".to_string(), "POST".to_string()];
        assert_eq!(
            format_labels(&["endpoint", "method"], &values, None),
            r#"{endpoint="/vote",method="POST"}"#
        );
        assert_eq!(
            format_labels(&["endpoint"], &values[..1], Some(("le", "+Inf"))),
            r#"{endpoint="/vote",le="+Inf"}"#
        );
        assert_eq!(format_labels(&[], &[], None), "");
    }

    #[test]
    fn test_label_values_are_escaped() {
        let values = vec!["a\"b\\c\nd".to_string()];
        assert_eq!(
            format_labels(&["x"], &values, None),
            r#"{x="a\"b\\c\nd"}"#
        );
    }
}
