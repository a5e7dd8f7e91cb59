//! Metrics Analyzer
//!
//! Statistics, anomaly detection and resource-pressure ratios over the
//! resource metric series returned by `get_component_resource_metrics`,
//! plus the Markdown rendering of the resulting report.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{EvidenceError, EvidenceResult};
use crate::models::telemetry::{MetricPoint, MetricSeries};

/// Series names in the order they are read from a metrics payload
pub const CPU_USAGE: &str = "cpuUsage";
pub const CPU_REQUESTS: &str = "cpuRequests";
pub const CPU_LIMITS: &str = "cpuLimits";
pub const MEMORY: &str = "memory";
pub const MEMORY_REQUESTS: &str = "memoryRequests";
pub const MEMORY_LIMITS: &str = "memoryLimits";

const SERIES_NAMES: [&str; 6] = [
    CPU_USAGE,
    CPU_REQUESTS,
    CPU_LIMITS,
    MEMORY,
    MEMORY_REQUESTS,
    MEMORY_LIMITS,
];

/// Guards percentage-change and ratio denominators against zero
const EPSILON: f64 = 1e-10;
/// Consecutive-point change, in percent, that counts as a spike
const PCT_CHANGE_THRESHOLD: f64 = 50.0;
/// Memory drops smaller than this (in bytes) are not worth reporting
const MEMORY_DROP_REPORT_BYTES: f64 = -1_000_000.0;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricStats {
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,
    pub coefficient_of_variation: f64,
    pub p90: f64,
    pub p95: f64,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnomalyReport {
    pub spike_count: usize,
    pub max_spike_magnitude: f64,
    pub largest_drop: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResourcePressure {
    pub avg_usage_to_request_ratio: f64,
    pub avg_usage_to_limit_ratio: f64,
    pub exceeded_requests: bool,
    pub exceeded_limits: bool,
}

/// Full statistics for one usage series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageAnalysis {
    pub stats: MetricStats,
    pub anomalies: AnomalyReport,
}

/// Analysis of one metrics payload. Absent series stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsReport {
    pub cpu_usage: Option<UsageAnalysis>,
    pub memory: Option<UsageAnalysis>,
    pub cpu_requests: Option<f64>,
    pub cpu_limits: Option<f64>,
    pub memory_requests: Option<f64>,
    pub memory_limits: Option<f64>,
    pub cpu_pressure: Option<ResourcePressure>,
    pub memory_pressure: Option<ResourcePressure>,
    pub cpu_memory_correlation: Option<f64>,
}

// ============================================================================
// Plain statistics
// ============================================================================

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
fn std_dev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (sum_squares / values.len() as f64).sqrt()
}

fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    match n {
        0 => 0.0,
        _ if n % 2 == 0 => (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0,
        _ => sorted[n / 2],
    }
}

/// Linearly interpolated percentile of a sorted slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let index = (p / 100.0) * (sorted.len() - 1) as f64;
    let lower = index.floor() as usize;
    let upper = index.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    sorted[lower] + (index - lower as f64) * (sorted[upper] - sorted[lower])
}

/// Mean of `usage[i] / (reference[i] + EPSILON)` over the aligned prefix,
/// and whether usage ever exceeded the reference.
fn aligned_ratio(usage: &[f64], reference: &[f64]) -> (f64, bool) {
    let len = usage.len().min(reference.len());
    if len == 0 {
        return (0.0, false);
    }
    let ratios: Vec<f64> = usage[..len]
        .iter()
        .zip(&reference[..len])
        .map(|(u, r)| u / (r + EPSILON))
        .collect();
    let exceeded = usage[..len].iter().zip(&reference[..len]).any(|(u, r)| u > r);
    (mean(&ratios), exceeded)
}

// ============================================================================
// Analyzer
// ============================================================================

/// Stateless analyzer configured with the spike z-score threshold.
#[derive(Debug, Clone)]
pub struct MetricsAnalyzer {
    z_threshold: f64,
}

impl Default for MetricsAnalyzer {
    fn default() -> Self {
        Self::new(3.0)
    }
}

impl MetricsAnalyzer {
    pub fn new(z_threshold: f64) -> Self {
        Self { z_threshold }
    }

    pub fn z_threshold(&self) -> f64 {
        self.z_threshold
    }

    /// Summary statistics; `None` for an empty series.
    pub fn stats(&self, values: &[f64], timestamps: &[String]) -> Option<MetricStats> {
        if values.is_empty() {
            return None;
        }

        let mean = mean(values);
        let std_dev = std_dev(values, mean);
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        Some(MetricStats {
            mean,
            median: median(&sorted),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            std_dev,
            coefficient_of_variation: if mean != 0.0 { std_dev / mean } else { 0.0 },
            p90: percentile(&sorted, 90.0),
            p95: percentile(&sorted, 95.0),
            start_time: timestamps.first().cloned(),
            end_time: timestamps.last().cloned(),
        })
    }

    /// Count z-score outliers and sharp consecutive changes.
    ///
    /// The two flagged index sets are unioned, so a point that is both an
    /// outlier and the start of a sharp change counts once.
    pub fn detect_anomalies(&self, values: &[f64]) -> AnomalyReport {
        if values.len() < 2 {
            return AnomalyReport::default();
        }

        let mean = mean(values);
        let std_dev = std_dev(values, mean);
        // A constant series can still leave rounding noise in std_dev.
        let constant = values.iter().all(|v| *v == values[0]);
        let z_scores: Vec<f64> = if !constant && std_dev > 0.0 {
            values.iter().map(|v| ((v - mean) / std_dev).abs()).collect()
        } else {
            vec![0.0; values.len()]
        };

        let mut flagged: BTreeSet<usize> = z_scores
            .iter()
            .enumerate()
            .filter(|(_, z)| **z > self.z_threshold)
            .map(|(i, _)| i)
            .collect();

        let diffs: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
        for (i, diff) in diffs.iter().enumerate() {
            let pct_change = (diff / (values[i] + EPSILON)).abs() * 100.0;
            if pct_change > PCT_CHANGE_THRESHOLD {
                flagged.insert(i);
            }
        }

        AnomalyReport {
            spike_count: flagged.len(),
            max_spike_magnitude: z_scores.iter().copied().fold(0.0, f64::max),
            largest_drop: diffs.iter().copied().fold(f64::INFINITY, f64::min),
        }
    }

    /// Usage relative to configured requests and limits; `None` without usage.
    pub fn resource_pressure(
        &self,
        usage: &[f64],
        requests: &[f64],
        limits: &[f64],
    ) -> Option<ResourcePressure> {
        if usage.is_empty() {
            return None;
        }
        let (avg_usage_to_request_ratio, exceeded_requests) = aligned_ratio(usage, requests);
        let (avg_usage_to_limit_ratio, exceeded_limits) = aligned_ratio(usage, limits);
        Some(ResourcePressure {
            avg_usage_to_request_ratio,
            avg_usage_to_limit_ratio,
            exceeded_requests,
            exceeded_limits,
        })
    }

    /// Pearson correlation over the aligned prefix.
    ///
    /// `None` when fewer than two aligned points exist; `0.0` when either side
    /// has no variance.
    pub fn correlation(&self, x: &[f64], y: &[f64]) -> Option<f64> {
        let len = x.len().min(y.len());
        if len < 2 {
            return None;
        }
        let (x, y) = (&x[..len], &y[..len]);
        let (mean_x, mean_y) = (mean(x), mean(y));

        let (mut sum_xy, mut sum_x2, mut sum_y2) = (0.0, 0.0, 0.0);
        for (a, b) in x.iter().zip(y) {
            let (dx, dy) = (a - mean_x, b - mean_y);
            sum_xy += dx * dy;
            sum_x2 += dx * dx;
            sum_y2 += dy * dy;
        }

        if sum_x2 == 0.0 || sum_y2 == 0.0 {
            return Some(0.0);
        }
        Some(sum_xy / (sum_x2 * sum_y2).sqrt())
    }

    fn usage(&self, series: &MetricSeries) -> Option<UsageAnalysis> {
        let values = series.values();
        let stats = self.stats(&values, &series.timestamps())?;
        Some(UsageAnalysis {
            stats,
            anomalies: self.detect_anomalies(&values),
        })
    }

    /// Analyze the series present in a metrics payload.
    ///
    /// Returns `Ok(None)` when none of the six known series is present and
    /// non-empty.
    pub fn analyze(&self, content: &Map<String, Value>) -> EvidenceResult<Option<MetricsReport>> {
        let series = extract_series(content)?;
        if series.is_empty() {
            return Ok(None);
        }

        let find = |name: &str| series.iter().find(|s| s.name == name);
        let values_of = |name: &str| find(name).map(MetricSeries::values).unwrap_or_default();
        let first_value = |name: &str| find(name).and_then(|s| s.points.first()).map(|p| p.value);

        let cpu_usage = values_of(CPU_USAGE);
        let memory = values_of(MEMORY);

        let cpu_pressure = find(CPU_USAGE).and_then(|_| {
            self.resource_pressure(&cpu_usage, &values_of(CPU_REQUESTS), &values_of(CPU_LIMITS))
        });
        let memory_pressure = find(MEMORY).and_then(|_| {
            self.resource_pressure(
                &memory,
                &values_of(MEMORY_REQUESTS),
                &values_of(MEMORY_LIMITS),
            )
        });

        Ok(Some(MetricsReport {
            cpu_usage: find(CPU_USAGE).and_then(|s| self.usage(s)),
            memory: find(MEMORY).and_then(|s| self.usage(s)),
            cpu_requests: first_value(CPU_REQUESTS),
            cpu_limits: first_value(CPU_LIMITS),
            memory_requests: first_value(MEMORY_REQUESTS),
            memory_limits: first_value(MEMORY_LIMITS),
            cpu_pressure,
            memory_pressure,
            cpu_memory_correlation: self.correlation(&cpu_usage, &memory),
        }))
    }

    /// Render a metrics payload as a Markdown digest.
    pub fn digest(&self, content: &Map<String, Value>) -> EvidenceResult<String> {
        Ok(match self.analyze(content)? {
            Some(report) => render_report(&report),
            None => "No metrics data available".to_string(),
        })
    }
}

/// Read every known, non-empty series from a payload.
fn extract_series(content: &Map<String, Value>) -> EvidenceResult<Vec<MetricSeries>> {
    let mut series = Vec::new();
    for name in SERIES_NAMES {
        let Some(raw) = content.get(name) else {
            continue;
        };
        let points = match raw {
            Value::Null => continue,
            Value::Array(items) if items.is_empty() => continue,
            Value::Array(_) => Vec::<MetricPoint>::deserialize(raw)?,
            other => {
                return Err(EvidenceError::InvalidShape(format!(
                    "'{}' must be a list of points, got {}",
                    name, other
                )))
            }
        };
        series.push(MetricSeries {
            name: name.to_string(),
            points,
        });
    }
    Ok(series)
}

// ============================================================================
// Rendering
// ============================================================================

fn mb(bytes: f64) -> f64 {
    bytes / BYTES_PER_MB
}

fn render_pressure(out: &mut String, resource: &str, pressure: &ResourcePressure, limit_note: &str) {
    let _ = writeln!(out, "**{} Resource Pressure:**", resource);
    let _ = writeln!(
        out,
        "- Usage to Request ratio: {:.2}%",
        pressure.avg_usage_to_request_ratio * 100.0
    );
    let _ = writeln!(
        out,
        "- Usage to Limit ratio: {:.2}%",
        pressure.avg_usage_to_limit_ratio * 100.0
    );
    if pressure.exceeded_requests {
        let _ = writeln!(out, "- **{} usage exceeded requests at some point**", resource);
    }
    if pressure.exceeded_limits {
        let _ = writeln!(
            out,
            "- **{} usage exceeded limits at some point ({})**",
            resource, limit_note
        );
    }
    out.push('\n');
}

/// Render a report as Markdown.
pub fn render_report(report: &MetricsReport) -> String {
    let mut out = String::from("## Resource Metrics Analysis\n");

    if let Some(cpu) = &report.cpu_usage {
        let _ = writeln!(
            out,
            "Time Range: {} to {}\n",
            cpu.stats.start_time.as_deref().unwrap_or(""),
            cpu.stats.end_time.as_deref().unwrap_or("")
        );
    }

    // ── CPU ──
    out.push_str("### CPU Metrics\n\n");

    if let Some(cpu) = &report.cpu_usage {
        let s = &cpu.stats;
        out.push_str("**CPU Usage:**\n");
        let _ = writeln!(out, "- Mean: {:.4} cores ({:.2}m)", s.mean, s.mean * 1000.0);
        let _ = writeln!(out, "- Median: {:.4} cores", s.median);
        let _ = writeln!(out, "- Range: {:.4} - {:.4} cores", s.min, s.max);
        let _ = writeln!(out, "- Std Dev: {:.4}, CV: {:.2}", s.std_dev, s.coefficient_of_variation);
        let _ = writeln!(out, "- P90: {:.4} cores, P95: {:.4} cores", s.p90, s.p95);
        if cpu.anomalies.spike_count > 0 {
            let _ = writeln!(
                out,
                "- **Anomalies Detected:** {} spike(s)",
                cpu.anomalies.spike_count
            );
            let _ = writeln!(
                out,
                "  - Max spike magnitude: {:.2} σ (standard deviations)",
                cpu.anomalies.max_spike_magnitude
            );
        }
        out.push('\n');
    }

    for (label, value) in [("Requests", report.cpu_requests), ("Limits", report.cpu_limits)] {
        if let Some(v) = value {
            let _ = writeln!(out, "**CPU {} (configured):**", label);
            let _ = writeln!(out, "- Value: {:.4} cores ({:.2}m)\n", v, v * 1000.0);
        }
    }

    if let Some(pressure) = &report.cpu_pressure {
        render_pressure(&mut out, "CPU", pressure, "throttling likely occurred");
    }

    // ── Memory ──
    out.push_str("### Memory Metrics\n\n");

    if let Some(memory) = &report.memory {
        let s = &memory.stats;
        out.push_str("**Memory Usage:**\n");
        let _ = writeln!(out, "- Mean: {:.0} bytes ({:.2} MB)", s.mean, mb(s.mean));
        let _ = writeln!(out, "- Median: {:.0} bytes ({:.2} MB)", s.median, mb(s.median));
        let _ = writeln!(
            out,
            "- Range: {:.0} - {:.0} bytes ({:.2} - {:.2} MB)",
            s.min,
            s.max,
            mb(s.min),
            mb(s.max)
        );
        let _ = writeln!(
            out,
            "- Std Dev: {:.0} bytes, CV: {:.2}",
            s.std_dev, s.coefficient_of_variation
        );
        let _ = writeln!(out, "- P90: {:.2} MB, P95: {:.2} MB", mb(s.p90), mb(s.p95));
        let a = &memory.anomalies;
        if a.spike_count > 0 {
            let _ = writeln!(out, "- **Anomalies Detected:** {} spike(s)", a.spike_count);
            let _ = writeln!(out, "  - Max spike magnitude: {:.2} σ", a.max_spike_magnitude);
            if a.largest_drop < MEMORY_DROP_REPORT_BYTES {
                let _ = writeln!(out, "  - Largest drop: {:.2} MB", mb(a.largest_drop));
            }
        }
        out.push('\n');
    }

    for (label, value) in [
        ("Requests", report.memory_requests),
        ("Limits", report.memory_limits),
    ] {
        if let Some(v) = value {
            let _ = writeln!(out, "**Memory {} (configured):**", label);
            let _ = writeln!(out, "- Value: {:.0} bytes ({:.2} MB)\n", v, mb(v));
        }
    }

    if let Some(pressure) = &report.memory_pressure {
        render_pressure(&mut out, "Memory", pressure, "OOM risk/occurred");
    }

    if let Some(corr) = report.cpu_memory_correlation {
        out.push_str("### Correlations\n");
        let _ = writeln!(out, "- CPU Usage vs Memory: {:.3}\n", corr);
    }

    out
}
