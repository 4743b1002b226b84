//! Prometheus text exposition (format 0.0.4).

use std::fmt::Write;

use crate::aggregator::SampleSet;
use crate::sample::{Metric, MetricSample};

/// Content type of [`render`]'s output.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Render a sample set.
///
/// Families appear in catalog order, each with one HELP/TYPE block; samples
/// keep their set order within a family. The output is a pure function of
/// the set, so rendering the same set twice is byte-identical.
pub fn render(set: &SampleSet) -> String {
    let mut order: Vec<&MetricSample> = set.samples().iter().collect();
    order.sort_by_key(|s| s.metric);

    let mut out = String::with_capacity(order.len() * 128);
    for family in order.chunk_by(|a, b| a.metric == b.metric) {
        push_header(&mut out, family[0].metric);
        for sample in family {
            push_sample(&mut out, sample);
        }
    }
    out
}

fn push_header(out: &mut String, metric: Metric) {
    let name = metric.name();
    out.extend(["# HELP ", name, " ", metric.help(), "\n"]);
    out.extend(["# TYPE ", name, " ", metric.metric_type(), "\n"]);
}

/// `name{k="v",...} value`; the braces are omitted when there are no labels.
fn push_sample(out: &mut String, sample: &MetricSample) {
    out.push_str(sample.metric.name());

    let pairs = sample.label_pairs();
    for (i, (name, value)) in pairs.iter().enumerate() {
        out.push(if i == 0 { '{' } else { ',' });
        out.push_str(name);
        out.push_str("=\"");
        push_escaped(out, value);
        out.push('"');
    }
    if !pairs.is_empty() {
        out.push('}');
    }

    out.push(' ');
    push_value(out, sample.value);
    out.push('\n');
}

/// Label values escape backslash, double quote and line feed.
fn push_escaped(out: &mut String, value: &str) {
    let mut rest = value;
    while let Some(at) = rest.find(['\\', '"', '\n']) {
        out.push_str(&rest[..at]);
        out.push_str(match rest.as_bytes()[at] {
            b'\\' => "\\\\",
            b'"' => "\\\"",
            _ => "\\n",
        });
        rest = &rest[at + 1..];
    }
    out.push_str(rest);
}

fn push_value(out: &mut String, value: f64) {
    match value {
        v if v.is_nan() => out.push_str("NaN"),
        v if v == f64::INFINITY => out.push_str("+Inf"),
        v if v == f64::NEG_INFINITY => out.push_str("-Inf"),
        // Display never uses an exponent and drops a zero fraction.
        v => {
            let _ = write!(out, "{v}");
        }
    }
}
