//! Bridge between hub snapshots and the metric registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use homeseer_status::{Device, StatusClient, StatusReport};
use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use crate::classify::{
    ClassificationTable, FamilyDescriptor, builtin_families, classification_key, normalize_value,
};
use crate::config::{ExporterConfig, LabelConfig};
use crate::error::{BridgeError, Result};
use crate::registry::{FamilyHandle, MetricRegistry, RegistryError};

/// Where snapshots come from.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Retrieve one validated snapshot.
    async fn fetch(&self) -> homeseer_status::Result<StatusReport>;

    /// Human-readable target, used in error messages.
    fn target(&self) -> &str;

    /// Username presented to the target, if any.
    fn username(&self) -> Option<&str> {
        None
    }
}

#[async_trait]
impl StatusSource for StatusClient {
    async fn fetch(&self) -> homeseer_status::Result<StatusReport> {
        StatusClient::fetch(self).await
    }

    fn target(&self) -> &str {
        self.host_port()
    }

    fn username(&self) -> Option<&str> {
        StatusClient::username(self)
    }
}

/// Callback informed of every failed poll.
pub type ErrorCallback = Arc<dyn Fn(&BridgeError) + Send + Sync>;

/// Settings that shape the exported families.
#[derive(Debug, Clone, Default)]
pub struct BridgeOptions {
    pub namespace: String,
    pub subsystem: String,
    pub labels: LabelConfig,
    /// Appended to the built-in classifications.
    pub classifications: Vec<FamilyDescriptor>,
}

impl From<&ExporterConfig> for BridgeOptions {
    fn from(config: &ExporterConfig) -> Self {
        Self {
            namespace: config.prometheus.namespace.clone(),
            subsystem: config.prometheus.subsystem.clone(),
            labels: config.labels.clone(),
            classifications: config.classifications.clone(),
        }
    }
}

/// Bridge counters.
#[derive(Debug, Clone, Default)]
pub struct BridgeStats {
    pub polls_attempted: u64,
    pub polls_failed: u64,
    pub devices_published: u64,
    pub devices_skipped: u64,
    pub last_success: Option<DateTime<Utc>>,
}

/// Outcome of one successful poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub published: usize,
    pub skipped: usize,
}

/// Fetches snapshots and publishes them as gauges.
pub struct Bridge {
    registry: MetricRegistry,
    table: ClassificationTable,
    current_time: FamilyHandle,
    source: Arc<dyn StatusSource>,
    on_error: ErrorCallback,
    stats: RwLock<BridgeStats>,
}

impl Bridge {
    /// Validate options and register every family.
    ///
    /// Nothing is fetched here; a configuration or registration error is
    /// returned before the hub is ever contacted.
    pub fn new<F>(options: BridgeOptions, source: Arc<dyn StatusSource>, on_error: F) -> Result<Self>
    where
        F: Fn(&BridgeError) + Send + Sync + 'static,
    {
        options.labels.validate()?;

        let registry = MetricRegistry::new(options.namespace, options.subsystem);
        let label_names = options.labels.label_names();

        let table = ClassificationTable::build(
            &registry,
            builtin_families().into_iter().chain(options.classifications),
            &label_names,
        )?;

        let current_time = registry.register(
            "current_time_seconds",
            "Wall clock time of the last poll, in epoch seconds",
            &[],
        )?;

        debug!(
            families = registry.family_count(),
            classifications = table.len(),
            target = source.target(),
            "Bridge created"
        );

        Ok(Self {
            registry,
            table,
            current_time,
            source,
            on_error: Arc::new(on_error),
            stats: RwLock::new(BridgeStats::default()),
        })
    }

    pub fn registry(&self) -> &MetricRegistry {
        &self.registry
    }

    pub fn stats(&self) -> BridgeStats {
        self.stats.read().clone()
    }

    /// Fetch one snapshot and publish it.
    ///
    /// On fetch failure nothing is published, the error callback is invoked
    /// exactly once and the error is returned.
    pub async fn poll_once(&self) -> Result<PollSummary> {
        let started = Utc::now();
        self.stats.write().polls_attempted += 1;

        let report = match self.source.fetch().await {
            Ok(report) => report,
            Err(source) => {
                let err = BridgeError::Fetch {
                    target: self.source.target().to_string(),
                    user: self.source.username().unwrap_or_default().to_string(),
                    source,
                };
                self.stats.write().polls_failed += 1;
                warn!(error = %err, "Poll failed");
                (self.on_error)(&err);
                return Err(err);
            }
        };

        let summary = self.publish(&report, started)?;

        let mut stats = self.stats.write();
        stats.devices_published += summary.published as u64;
        stats.devices_skipped += summary.skipped as u64;
        stats.last_success = Some(started);
        drop(stats);

        debug!(
            devices = report.devices.len(),
            published = summary.published,
            skipped = summary.skipped,
            "Poll complete"
        );

        Ok(summary)
    }

    /// Publish a snapshot taken at `now`.
    pub fn publish(
        &self,
        report: &StatusReport,
        now: DateTime<Utc>,
    ) -> std::result::Result<PollSummary, RegistryError> {
        self.current_time.set(&[], now.timestamp() as f64)?;

        let names = report.names_by_reference();
        let mut summary = PollSummary::default();

        for device in &report.devices {
            let key = classification_key(device);
            let Some(classification) = self.table.lookup(&key) else {
                trace!(device = %device.name, key = %key, "Skipping unclassified device");
                summary.skipped += 1;
                continue;
            };

            let labels = [
                device.location2.as_str(),
                device.location.as_str(),
                device.name.as_str(),
                resolve_parent(device, &names),
            ];

            classification
                .value
                .set(&labels, normalize_value(&key, device.value))?;
            classification
                .last_change
                .set(&labels, device.last_change.timestamp() as f64)?;
            summary.published += 1;
        }

        Ok(summary)
    }
}

/// Name of a device's parent, or `""`.
///
/// Only a single association that resolves to a device in the same
/// snapshot counts; multiple associations are not guessed at.
pub fn resolve_parent<'a>(device: &Device, names: &HashMap<i64, &'a str>) -> &'a str {
    match device.associated_devices.as_slice() {
        [only] => names.get(only).copied().unwrap_or(""),
        _ => "",
    }
}
