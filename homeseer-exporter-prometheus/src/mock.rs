//! Scripted status source for testing.
//!
//! Lets the bridge, the poll worker and the HTTP layer run against canned
//! snapshots and failures without a hub on the network.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use homeseer_status::{Device, FetchError, Relationship, StatusReport, decode_last_change};
use parking_lot::Mutex;

use crate::bridge::StatusSource;

/// Raw last-change used by [`device`].
pub const SAMPLE_LAST_CHANGE: &str = "/Date(1463147447280)/";

/// A [`StatusSource`] that replays queued responses.
///
/// Queued responses are returned in order. Once the queue is empty the
/// repeating snapshot is returned if one was set, otherwise a
/// [`FetchError::Remote`].
pub struct ScriptedSource {
    target: String,
    username: Option<String>,
    queue: Mutex<VecDeque<homeseer_status::Result<StatusReport>>>,
    repeat: Option<StatusReport>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            username: None,
            queue: Mutex::new(VecDeque::new()),
            repeat: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// A source that returns `report` on every fetch.
    pub fn repeating(report: StatusReport) -> Self {
        Self {
            repeat: Some(report),
            ..Self::new("mock-hub:80")
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn push_ok(&self, report: StatusReport) {
        self.queue.lock().push_back(Ok(report));
    }

    pub fn push_err(&self, err: FetchError) {
        self.queue.lock().push_back(Err(err));
    }

    /// Number of fetches so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusSource for ScriptedSource {
    async fn fetch(&self) -> homeseer_status::Result<StatusReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(next) = self.queue.lock().pop_front() {
            return next;
        }

        match &self.repeat {
            Some(report) => Ok(report.clone()),
            None => Err(FetchError::Remote("Error, no scripted response".to_string())),
        }
    }

    fn target(&self) -> &str {
        &self.target
    }

    fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }
}

/// A standalone device on the ground floor living room.
pub fn device(reference: i64, name: &str, type_string: &str, value: f64) -> Device {
    Device {
        reference,
        name: name.to_string(),
        location: "Living Room".to_string(),
        location2: "Ground Floor".to_string(),
        value,
        device_type_string: type_string.to_string(),
        last_change_raw: SAMPLE_LAST_CHANGE.to_string(),
        last_change: decode_last_change(SAMPLE_LAST_CHANGE).unwrap_or_default(),
        relationship: Relationship::Standalone,
        ..Default::default()
    }
}

/// A snapshot holding `devices`.
pub fn snapshot(devices: Vec<Device>) -> StatusReport {
    StatusReport {
        name: "HomeSeer Devices".to_string(),
        version: "1.0".to_string(),
        devices,
        response: String::new(),
    }
}
