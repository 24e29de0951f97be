//! End-to-end tests: fake hub -> StatusClient -> Bridge -> HTTP /metrics.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use homeseer_status::{Credentials, StatusClient};
use tokio_util::sync::CancellationToken;

use homeseer_exporter_prometheus::config::LabelConfig;
use homeseer_exporter_prometheus::{
    Bridge, BridgeOptions, ExporterConfig, HttpServer, PollMode, Scheduler,
};

const SNAPSHOT: &str = r#"{"Name":"HomeSeer Devices","Version":"1.0","Devices":[
    {"ref":10,"name":"Multi Sensor","location":"Kitchen","location2":"Ground Floor","value":0,"device_type_string":"Z-Wave Root Device","last_change":"\/Date(1463147447280)\/","relationship":2,"associated_devices":[11,12,13]},
    {"ref":11,"name":"Multi Sensor Temperature","location":"Kitchen","location2":"Ground Floor","value":68.2,"device_type_string":"Z-Wave Temperature","last_change":"\/Date(1613971427719-0500)\/","relationship":4,"associated_devices":[10]},
    {"ref":12,"name":"Multi Sensor Humidity","location":"Kitchen","location2":"Ground Floor","value":41,"device_type_string":"Z-Wave Relative Humidity","last_change":"\/Date(1613971427719)\/","relationship":4,"associated_devices":[10]},
    {"ref":13,"name":"Multi Sensor Luminance","location":"Kitchen","location2":"Ground Floor","value":120,"device_type_string":"Z-Wave Luminance","last_change":"\/Date(-62135596800000)\/","relationship":4,"associated_devices":[10,99]},
    {"ref":20,"name":"Porch Light","location":"Porch","location2":"Outside","value":255,"device_type_string":"Z-Wave Switch Binary","last_change":"\/Date(1613971427719)\/","relationship":3,"associated_devices":null},
    {"ref":30,"name":"Watts","location":"Garage","location2":"Outside","value":1200.5,"device_type_string":"Z-Wave Electric Meter","last_change":"\/Date(1613971427719)\/","relationship":4,"associated_devices":[31]},
    {"ref":31,"name":"kWh","location":"Garage","location2":"Outside","value":5321,"device_type_string":"Z-Wave Electric Meter","last_change":"\/Date(1613971427719)\/","relationship":4,"associated_devices":[30]},
    {"ref":40,"name":"Front Door Scene","location":"Hall","location2":"Ground Floor","value":3,"device_type_string":"Z-Wave Central Scene","last_change":"\/Date(1613971427719)\/","relationship":3,"associated_devices":[]}
],"Response":""}"#;

/// A hub that serves `SNAPSHOT` for the first `healthy` requests, then 503.
#[derive(Clone)]
struct Hub {
    healthy: usize,
    requests: Arc<AtomicUsize>,
}

async fn status_handler(State(hub): State<Hub>) -> (StatusCode, &'static str) {
    let n = hub.requests.fetch_add(1, Ordering::SeqCst);
    if n < hub.healthy {
        (StatusCode::OK, SNAPSHOT)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "busy")
    }
}

async fn spawn_hub(healthy: usize) -> (SocketAddr, Arc<AtomicUsize>) {
    let requests = Arc::new(AtomicUsize::new(0));
    let hub = Hub {
        healthy,
        requests: requests.clone(),
    };
    let router = Router::new()
        .route("/JSON", get(status_handler))
        .with_state(hub);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (addr, requests)
}

struct Exporter {
    url: String,
    bridge: Arc<Bridge>,
    errors: Arc<AtomicUsize>,
    shutdown: CancellationToken,
    server: tokio::task::JoinHandle<anyhow::Result<()>>,
}

async fn spawn_exporter(hub: SocketAddr, options: BridgeOptions, mode: PollMode) -> Exporter {
    let client = StatusClient::new(
        hub.to_string(),
        Some(Credentials::new("admin", "secret").unwrap()),
    );
    let errors = Arc::new(AtomicUsize::new(0));
    let counter = errors.clone();
    let bridge = Arc::new(
        Bridge::new(options, Arc::new(client), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap(),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let server = HttpServer::new(bridge.clone(), addr, "/metrics".to_string(), mode);
    let server = tokio::spawn(server.serve(listener, shutdown.clone()));

    Exporter {
        url: format!("http://{}/metrics", addr),
        bridge,
        errors,
        shutdown,
        server,
    }
}

async fn scrape(url: &str) -> (u16, String) {
    let response = reqwest::get(url).await.unwrap();
    let status = response.status().as_u16();
    (status, response.text().await.unwrap())
}

#[tokio::test]
async fn test_on_demand_scrape_end_to_end() {
    let (hub, requests) = spawn_hub(usize::MAX).await;
    let exporter = spawn_exporter(hub, BridgeOptions::default(), PollMode::OnDemand).await;

    let (status, body) = scrape(&exporter.url).await;
    assert_eq!(status, 200);
    assert_eq!(requests.load(Ordering::SeqCst), 1);

    // Parent resolved through a single association
    assert!(body.contains(
        "temperature_degreesf{floor=\"Ground Floor\",room=\"Kitchen\",device=\"Multi Sensor Temperature\",parentDevice=\"Multi Sensor\"} 68.2\n"
    ));
    assert!(body.contains(
        "relative_humidity_percent{floor=\"Ground Floor\",room=\"Kitchen\",device=\"Multi Sensor Humidity\",parentDevice=\"Multi Sensor\"} 41\n"
    ));
    // Two associations: no parent. Negative millis: epoch.
    assert!(body.contains(
        "luminance_lux{floor=\"Ground Floor\",room=\"Kitchen\",device=\"Multi Sensor Luminance\",parentDevice=\"\"} 120\n"
    ));
    assert!(body.contains(
        "luminance_lux_last_change_seconds{floor=\"Ground Floor\",room=\"Kitchen\",device=\"Multi Sensor Luminance\",parentDevice=\"\"} 0\n"
    ));
    // Timezone offset ignored
    assert!(body.contains(
        "temperature_degreesf_last_change_seconds{floor=\"Ground Floor\",room=\"Kitchen\",device=\"Multi Sensor Temperature\",parentDevice=\"Multi Sensor\"} 1613971427\n"
    ));
    // Binary switch normalized
    assert!(body.contains(
        "switch_binary{floor=\"Outside\",room=\"Porch\",device=\"Porch Light\",parentDevice=\"\"} 1\n"
    ));
    // Electric meters split by name
    assert!(body.contains(
        "electric_meter_power_watts{floor=\"Outside\",room=\"Garage\",device=\"Watts\",parentDevice=\"kWh\"} 1200.5\n"
    ));
    assert!(body.contains(
        "electric_meter_energy_kwhours{floor=\"Outside\",room=\"Garage\",device=\"kWh\",parentDevice=\"Watts\"} 5321\n"
    ));
    // Unclassified devices are skipped
    assert!(!body.contains("Front Door Scene"));
    assert!(!body.contains("device=\"Multi Sensor\""));
    assert!(body.contains("# TYPE current_time_seconds gauge\ncurrent_time_seconds "));

    let stats = exporter.bridge.stats();
    assert_eq!(stats.devices_published, 6);
    assert_eq!(stats.devices_skipped, 2);

    exporter.shutdown.cancel();
    exporter.server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_on_demand_hub_failure_keeps_prior_values() {
    let (hub, _) = spawn_hub(1).await;
    let exporter = spawn_exporter(hub, BridgeOptions::default(), PollMode::OnDemand).await;

    let (status, before) = scrape(&exporter.url).await;
    assert_eq!(status, 200);

    let (status, body) = scrape(&exporter.url).await;
    assert_eq!(status, 500);
    assert!(body.contains("503"));
    assert!(body.contains("admin"));
    assert!(!body.contains("secret"));
    assert!(!body.contains("temperature_degreesf"));
    assert_eq!(exporter.errors.load(Ordering::SeqCst), 1);

    // Values from the last good poll are untouched
    let after = exporter.bridge.registry().render();
    let strip_clock = |s: &str| {
        s.lines()
            .filter(|l| !l.starts_with("current_time_seconds "))
            .collect::<Vec<_>>()
            .join("\n")
    };
    assert_eq!(strip_clock(&before), strip_clock(&after));

    exporter.shutdown.cancel();
    exporter.server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_interval_worker_serves_published_state() {
    let (hub, requests) = spawn_hub(1).await;
    let exporter = spawn_exporter(hub, BridgeOptions::default(), PollMode::Interval).await;

    let scheduler = Scheduler::start(
        PollMode::Interval,
        exporter.bridge.clone(),
        Duration::from_millis(50),
        &exporter.shutdown,
    );

    // First poll succeeds, the second hits a 503 and ends the worker
    tokio::time::timeout(Duration::from_secs(5), async {
        while exporter.errors.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(requests.load(Ordering::SeqCst), 2);
    assert_eq!(exporter.errors.load(Ordering::SeqCst), 1);

    // Scrapes keep serving the last published values without polling
    let (status, body) = scrape(&exporter.url).await;
    assert_eq!(status, 200);
    assert!(body.contains("device=\"Porch Light\""));
    assert_eq!(requests.load(Ordering::SeqCst), 2);

    exporter.shutdown.cancel();
    scheduler.close().await;
    exporter.server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_custom_labels_and_namespace() {
    let (hub, _) = spawn_hub(usize::MAX).await;
    let options = BridgeOptions {
        namespace: "homeseer".to_string(),
        labels: LabelConfig {
            location1: "area".to_string(),
            location2: "level".to_string(),
        },
        ..Default::default()
    };
    let exporter = spawn_exporter(hub, options, PollMode::OnDemand).await;

    let (_, body) = scrape(&exporter.url).await;
    assert!(body.contains(
        "homeseer_switch_binary{level=\"Outside\",area=\"Porch\",device=\"Porch Light\",parentDevice=\"\"} 1\n"
    ));
    assert!(body.contains("homeseer_current_time_seconds "));

    exporter.shutdown.cancel();
    exporter.server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_extra_classification_from_config() {
    let config = ExporterConfig::parse(
        r#"{
            classifications: [
                { keys: ["Central Scene"], name: "central_scene", help: "Last scene activated" },
            ],
        }"#,
    )
    .unwrap();
    let (hub, _) = spawn_hub(usize::MAX).await;
    let exporter = spawn_exporter(hub, BridgeOptions::from(&config), PollMode::OnDemand).await;

    let (_, body) = scrape(&exporter.url).await;
    assert!(body.contains(
        "central_scene{floor=\"Ground Floor\",room=\"Hall\",device=\"Front Door Scene\",parentDevice=\"\"} 3\n"
    ));

    exporter.shutdown.cancel();
    exporter.server.await.unwrap().unwrap();
}
