//! Device classification: which devices are exported, and into which family.
//!
//! The hub reports a free-form type string per device. Only allow-listed
//! classifications are exported; everything else is skipped so that new or
//! exotic device types cannot flood the metrics surface.

use std::collections::HashMap;

use homeseer_status::Device;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::registry::{FamilyHandle, MetricRegistry, RegistryError};

/// Technology prefix the hub puts in front of Z-Wave type strings.
pub const ZWAVE_PREFIX: &str = "Z-Wave ";

/// Type string shared by every electric meter sub-measurement.
pub const ELECTRIC_METER: &str = "Electric Meter";

/// Suffix of the last-update family paired with each value family.
pub const LAST_CHANGE_SUFFIX: &str = "_last_change_seconds";

/// One exported gauge family and the classification keys routed to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyDescriptor {
    /// Classification keys, e.g. `"Temperature"` or `"Electric Meter:Watts"`.
    pub keys: Vec<String>,
    /// Family name before namespace/subsystem qualification.
    pub name: String,
    /// HELP text.
    pub help: String,
}

impl FamilyDescriptor {
    pub fn new(keys: &[&str], name: &str, help: &str) -> Self {
        Self {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            name: name.to_string(),
            help: help.to_string(),
        }
    }
}

/// The built-in allow-list.
pub fn builtin_families() -> Vec<FamilyDescriptor> {
    vec![
        FamilyDescriptor::new(
            &["Temperature"],
            "temperature_degreesf",
            "A temperature reading in degrees Fahrenheit",
        ),
        FamilyDescriptor::new(
            &["Relative Humidity"],
            "relative_humidity_percent",
            "Relative Humidity, 0 to 100%",
        ),
        FamilyDescriptor::new(
            &["Battery"],
            "battery_percent",
            "Percent of charge remaining in a battery",
        ),
        FamilyDescriptor::new(
            &["Luminance"],
            "luminance_lux",
            "A measure of light intensity",
        ),
        FamilyDescriptor::new(
            &["Ultraviolet"],
            "ultraviolet_index",
            "A measure of ultraviolet light exposure",
        ),
        FamilyDescriptor::new(&["Watts"], "power_watts", "Instantaneous power consumption"),
        FamilyDescriptor::new(
            &["kW Hours"],
            "cumulative_power_kwhours",
            "Total power consumption over time",
        ),
        FamilyDescriptor::new(
            &["Volts"],
            "potential_volts",
            "A measure of electrical potential",
        ),
        FamilyDescriptor::new(
            &["Amperes"],
            "current_amperes",
            "Instantaneous electrical current",
        ),
        FamilyDescriptor::new(
            &["Sensor Binary"],
            "sensor_binary",
            "A sensor that can be either on or off",
        ),
        FamilyDescriptor::new(
            &["Switch", "Switch Binary"],
            "switch_binary",
            "A switch that is either on or off",
        ),
        FamilyDescriptor::new(&["Switch Multilevel"], "switch_multilevel", "A dimmable switch"),
        FamilyDescriptor::new(
            &["Electric Meter:Watts"],
            "electric_meter_power_watts",
            "Electric meter instantaneous power",
        ),
        FamilyDescriptor::new(
            &["Electric Meter:kWh"],
            "electric_meter_energy_kwhours",
            "Electric meter cumulative energy",
        ),
        FamilyDescriptor::new(
            &["Electric Meter:Volts"],
            "electric_meter_potential_volts",
            "Electric meter electrical potential",
        ),
        FamilyDescriptor::new(
            &["Electric Meter:Amperes"],
            "electric_meter_current_amperes",
            "Electric meter electrical current",
        ),
    ]
}

/// Classification key of a device.
///
/// The `"Z-Wave "` prefix is dropped. Electric meters overload one type
/// string for several measurements, so their key also carries the device
/// name: `"Electric Meter:<name>"`.
pub fn classification_key(device: &Device) -> String {
    let type_string = device
        .device_type_string
        .strip_prefix(ZWAVE_PREFIX)
        .unwrap_or(&device.device_type_string);

    if type_string == ELECTRIC_METER {
        format!("{}:{}", ELECTRIC_METER, device.name)
    } else {
        type_string.to_string()
    }
}

/// Whether `key` names a binary switch.
pub fn is_binary_switch(key: &str) -> bool {
    key == "Switch" || key == "Switch Binary"
}

/// Value to publish for a device with classification `key`.
///
/// Binary switches report "on" as a non-unit value (usually 255); any
/// nonzero reading becomes 1.
pub fn normalize_value(key: &str, value: f64) -> f64 {
    if is_binary_switch(key) && value != 0.0 {
        1.0
    } else {
        value
    }
}

/// A registered value family and its last-update counterpart.
#[derive(Debug, Clone)]
pub struct Classification {
    pub value: FamilyHandle,
    pub last_change: FamilyHandle,
}

/// Classification key -> families, built once per bridge.
#[derive(Debug, Default)]
pub struct ClassificationTable {
    entries: HashMap<String, Classification>,
}

impl ClassificationTable {
    /// Register every descriptor's families and index them by key.
    ///
    /// Each descriptor registers two families (`<name>` and
    /// `<name>_last_change_seconds`), so two descriptors with the same name
    /// fail with [`RegistryError::DuplicateRegistration`]. When two
    /// descriptors claim the same key, the later one wins. A descriptor
    /// whose keys are all claimed by later ones is dropped before
    /// registration, so an overridden family never shows up empty.
    pub fn build<I>(
        registry: &MetricRegistry,
        descriptors: I,
        label_names: &[&str],
    ) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = FamilyDescriptor>,
    {
        let descriptors: Vec<FamilyDescriptor> = descriptors.into_iter().collect();
        let mut entries = HashMap::new();

        for (i, descriptor) in descriptors.iter().enumerate() {
            let later = &descriptors[i + 1..];
            let shadowed = descriptor
                .keys
                .iter()
                .all(|key| later.iter().any(|d| d.keys.contains(key)));
            if shadowed {
                debug!(family = %descriptor.name, "Skipping overridden classification");
                continue;
            }

            let value = registry.register(&descriptor.name, &descriptor.help, label_names)?;
            let last_change = registry.register(
                &format!("{}{}", descriptor.name, LAST_CHANGE_SUFFIX),
                &format!("Last time the hub saw a change in {}, in epoch seconds", descriptor.name),
                label_names,
            )?;

            let classification = Classification { value, last_change };
            for key in &descriptor.keys {
                entries.insert(key.clone(), classification.clone());
            }
        }

        Ok(Self { entries })
    }

    pub fn lookup(&self, key: &str) -> Option<&Classification> {
        self.entries.get(key)
    }

    /// Number of classification keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
