//! Data model for the `getstatus` response envelope.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

use crate::date::decode_last_change;
use crate::error::{DateError, FetchError, Result};

/// One complete device snapshot as returned by the hub.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StatusReport {
    #[serde(rename = "Name", default, deserialize_with = "null_as_default")]
    pub name: String,

    #[serde(rename = "Version", default, deserialize_with = "null_as_default")]
    pub version: String,

    #[serde(rename = "Devices", default, deserialize_with = "null_as_default")]
    pub devices: Vec<Device>,

    /// Free-form response text. Starts with "Error" when the hub rejects the request.
    #[serde(rename = "Response", default, deserialize_with = "null_as_default")]
    pub response: String,
}

impl StatusReport {
    /// Parse a response body and validate it.
    ///
    /// Fails if the body is not a status envelope, if the hub reported an
    /// error, or if any device carries a malformed `last_change`.
    pub fn from_json(body: &str) -> Result<Self> {
        let mut report: StatusReport = serde_json::from_str(body)?;

        if report.response.starts_with("Error") {
            return Err(FetchError::Remote(report.response));
        }

        report.decode_last_changes()?;
        Ok(report)
    }

    /// Decode every device's raw `last_change` into [`Device::last_change`].
    pub fn decode_last_changes(&mut self) -> std::result::Result<(), DateError> {
        for device in &mut self.devices {
            device.last_change = decode_last_change(&device.last_change_raw)?;
        }
        Ok(())
    }

    /// Map of device reference to device name across the whole snapshot.
    pub fn names_by_reference(&self) -> HashMap<i64, &str> {
        self.devices
            .iter()
            .map(|d| (d.reference, d.name.as_str()))
            .collect()
    }
}

/// A single device reading.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Device {
    /// Reference number, unique within a snapshot.
    #[serde(rename = "ref")]
    pub reference: i64,

    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,

    /// HomeSeer "Location1", usually the room.
    #[serde(default, deserialize_with = "null_as_default")]
    pub location: String,

    /// HomeSeer "Location2", usually the floor.
    #[serde(default, deserialize_with = "null_as_default")]
    pub location2: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub value: f64,

    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,

    #[serde(rename = "device_type_string", default, deserialize_with = "null_as_default")]
    pub device_type_string: String,

    /// Raw `/Date(...)/` string as sent by the hub.
    #[serde(rename = "last_change", default, deserialize_with = "null_as_default")]
    pub last_change_raw: String,

    /// Decoded form of `last_change_raw`.
    #[serde(skip)]
    pub last_change: DateTime<Utc>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub relationship: Relationship,

    #[serde(default, deserialize_with = "null_as_default")]
    pub hide_from_view: bool,

    /// References of associated devices. May point at devices missing from the snapshot.
    #[serde(default, deserialize_with = "null_as_default")]
    pub associated_devices: Vec<i64>,

    #[serde(rename = "device_type", default, deserialize_with = "null_as_default")]
    pub device_type: DeviceType,

    #[serde(rename = "status_image", default, deserialize_with = "null_as_default")]
    pub image: String,
}

/// Detailed device type information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DeviceType {
    #[serde(rename = "Device_API", default, deserialize_with = "null_as_default")]
    pub api: i64,

    #[serde(rename = "Device_API_Description", default, deserialize_with = "null_as_default")]
    pub api_description: String,

    #[serde(rename = "Device_Type", default, deserialize_with = "null_as_default")]
    pub device_type: i64,

    #[serde(rename = "Device_Type_Description", default, deserialize_with = "null_as_default")]
    pub type_description: String,

    #[serde(rename = "Device_SubType", default, deserialize_with = "null_as_default")]
    pub sub_type: i64,

    #[serde(rename = "Device_SubType_Description", default, deserialize_with = "null_as_default")]
    pub sub_type_description: String,
}

/// Position of a device in the hub's parent/child grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "i64")]
pub enum Relationship {
    Root,
    Standalone,
    Child,
    Unknown(i64),
}

impl Default for Relationship {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl From<i64> for Relationship {
    fn from(code: i64) -> Self {
        match code {
            2 => Self::Root,
            3 => Self::Standalone,
            4 => Self::Child,
            other => Self::Unknown(other),
        }
    }
}

/// Decode a JSON `null` as the field's zero value.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
