//! Gauge registry that owns published series and renders them for scraping.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

/// Registry errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("duplicate metrics collector registration attempted: {name}")]
    DuplicateRegistration { name: String },

    #[error("invalid metric name: {0:?}")]
    InvalidMetricName(String),

    #[error("invalid label name {label:?} for metric {name}")]
    InvalidLabelName { name: String, label: String },

    #[error("metric {name} expects {expected} label values, got {got}")]
    LabelCardinality {
        name: String,
        expected: usize,
        got: usize,
    },
}

/// A named gauge with a fixed, ordered set of label names.
#[derive(Debug)]
pub struct GaugeFamily {
    name: String,
    help: String,
    label_names: Vec<String>,
    /// Label value tuple -> current value. Entries are never removed.
    samples: RwLock<HashMap<Vec<String>, f64>>,
}

/// Shared handle to a registered family.
pub type FamilyHandle = Arc<GaugeFamily>;

impl GaugeFamily {
    /// Fully qualified metric name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }

    /// Insert or overwrite the sample for `label_values`.
    pub fn set(&self, label_values: &[&str], value: f64) -> Result<(), RegistryError> {
        self.check_cardinality(label_values)?;
        let key: Vec<String> = label_values.iter().map(|v| v.to_string()).collect();
        self.samples.write().insert(key, value);
        Ok(())
    }

    /// Current value for `label_values`, if that series was ever set.
    pub fn get(&self, label_values: &[&str]) -> Option<f64> {
        if label_values.len() != self.label_names.len() {
            return None;
        }
        let key: Vec<String> = label_values.iter().map(|v| v.to_string()).collect();
        self.samples.read().get(&key).copied()
    }

    /// Number of label tuples ever set on this family.
    pub fn sample_count(&self) -> usize {
        self.samples.read().len()
    }

    fn check_cardinality(&self, label_values: &[&str]) -> Result<(), RegistryError> {
        if label_values.len() != self.label_names.len() {
            return Err(RegistryError::LabelCardinality {
                name: self.name.clone(),
                expected: self.label_names.len(),
                got: label_values.len(),
            });
        }
        Ok(())
    }

    fn render_into(&self, output: &mut Vec<u8>) {
        writeln!(output, "# HELP {} {}", self.name, escape_help(&self.help)).ok();
        writeln!(output, "# TYPE {} gauge", self.name).ok();

        let samples = self.samples.read();
        let mut series: Vec<_> = samples.iter().collect();
        series.sort_by(|a, b| a.0.cmp(b.0));

        for (values, value) in series {
            let labels: Vec<(&str, &str)> = self
                .label_names
                .iter()
                .map(String::as_str)
                .zip(values.iter().map(String::as_str))
                .collect();
            writeln!(
                output,
                "{}{} {}",
                self.name,
                format_labels(&labels),
                format_value(*value)
            )
            .ok();
        }
    }
}

/// Owns every gauge family of one bridge.
///
/// Families are registered once and live as long as the registry. Samples
/// are only ever upserted, so series for devices that disappear from the hub
/// keep their last value.
#[derive(Debug, Default)]
pub struct MetricRegistry {
    namespace: String,
    subsystem: String,
    families: RwLock<Vec<FamilyHandle>>,
}

impl MetricRegistry {
    /// Create an empty registry. Empty `namespace`/`subsystem` are omitted from names.
    pub fn new(namespace: impl Into<String>, subsystem: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            subsystem: subsystem.into(),
            families: RwLock::new(Vec::new()),
        }
    }

    /// Join namespace, subsystem and `name` with underscores, skipping empty parts.
    pub fn qualified_name(&self, name: &str) -> String {
        [self.namespace.as_str(), self.subsystem.as_str(), name]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("_")
    }

    /// Register a new gauge family.
    pub fn register(
        &self,
        name: &str,
        help: &str,
        label_names: &[&str],
    ) -> Result<FamilyHandle, RegistryError> {
        let name = self.qualified_name(name);
        if !is_valid_metric_name(&name) {
            return Err(RegistryError::InvalidMetricName(name));
        }

        for (i, label) in label_names.iter().enumerate() {
            if !is_valid_label_name(label) || label_names[..i].contains(label) {
                return Err(RegistryError::InvalidLabelName {
                    name,
                    label: label.to_string(),
                });
            }
        }

        let mut families = self.families.write();
        if families.iter().any(|f| f.name == name) {
            return Err(RegistryError::DuplicateRegistration { name });
        }

        let family = Arc::new(GaugeFamily {
            name,
            help: help.to_string(),
            label_names: label_names.iter().map(|l| l.to_string()).collect(),
            samples: RwLock::new(HashMap::new()),
        });
        families.push(family.clone());

        Ok(family)
    }

    /// Upsert one sample on a registered family.
    pub fn set(
        &self,
        family: &FamilyHandle,
        label_values: &[&str],
        value: f64,
    ) -> Result<(), RegistryError> {
        family.set(label_values, value)
    }

    /// Look up a family by its fully qualified name.
    pub fn family(&self, qualified_name: &str) -> Option<FamilyHandle> {
        self.families
            .read()
            .iter()
            .find(|f| f.name == qualified_name)
            .cloned()
    }

    pub fn family_count(&self) -> usize {
        self.families.read().len()
    }

    /// Total number of series across all families.
    pub fn series_count(&self) -> usize {
        self.families.read().iter().map(|f| f.sample_count()).sum()
    }

    /// Render every family in Prometheus text exposition format.
    ///
    /// Families appear in registration order. A family with no samples
    /// renders only its HELP and TYPE lines.
    pub fn render(&self) -> String {
        let families = self.families.read();
        let mut output = Vec::with_capacity(families.len() * 256);

        for family in families.iter() {
            family.render_into(&mut output);
        }

        String::from_utf8(output).unwrap_or_default()
    }
}

/// Check a metric name against `[a-zA-Z_:][a-zA-Z0-9_:]*`.
pub fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// Check a label name against `[a-zA-Z_][a-zA-Z0-9_]*`, rejecting the reserved `__` prefix.
pub fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    !name.starts_with("__") && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Escape special characters in label values.
fn escape_label_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}

/// Escape HELP text (backslash and newline only).
fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

/// Format a floating point value for Prometheus.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

fn format_labels(labels: &[(&str, &str)]) -> String {
    if labels.is_empty() {
        return String::new();
    }

    let parts: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
        .collect();

    format!("{{{}}}", parts.join(","))
}
