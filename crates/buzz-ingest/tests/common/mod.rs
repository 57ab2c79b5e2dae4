//! In-process stand-in for the upstream analytics API.
//! Counts every request and records what the client sent.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::routing::{get, post};
use buzz_ingest::IngestConfig;
use tokio::task::JoinHandle;

pub const EXPLORE_BODY: &str = r#")]}'{"widgets":[
    {"id":"TIMESERIES","token":"ts-token","request":{"time":"now 7-d","resolution":"HOUR","locale":"en-US"}},
    {"id":"GEO_MAP","token":"geo-token","request":{"resolution":"REGION"}},
    {"id":"RELATED_TOPICS","token":"rt-token","request":{}}
]}"#;

pub const TIMELINE_BODY: &str = r#")]}',
{"default":{"timelineData":[
    {"time":"1700000000","formattedTime":"a","value":[10]},
    {"time":"1700003600","formattedTime":"b","value":[20]},
    {"time":"1700007200","formattedTime":"c","value":[30]}
]}}"#;

pub const REGION_BODY: &str = r#")]}',
{"default":{"geoMapData":[
    {"geoName":"Texas","geoCode":"US-TX","value":[100]},
    {"geoName":"Ohio","geoCode":"US-OH","value":[55]}
]}}"#;

pub struct FakeState {
    pub bootstrap_calls: AtomicUsize,
    pub explore_calls: AtomicUsize,
    pub widget_calls: AtomicUsize,
    pub region_calls: AtomicUsize,
    pub throttle_explore: AtomicBool,
    pub throttle_widget: AtomicBool,
    /// Status forced on explore replies; 0 serves the body normally.
    pub explore_status: AtomicU16,
    /// Status forced on widget-data replies; 0 serves the body normally.
    pub widget_status: AtomicU16,
    pub explore_body: Mutex<String>,
    pub timeline_body: Mutex<String>,
    pub region_body: Mutex<String>,
    /// `Cookie` header of every protocol request, in arrival order.
    pub cookies_seen: Mutex<Vec<Option<String>>>,
    pub explore_queries: Mutex<Vec<HashMap<String, String>>>,
    pub widget_queries: Mutex<Vec<HashMap<String, String>>>,
    /// Arrival time of every protocol request.
    pub arrivals: Mutex<Vec<Instant>>,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            bootstrap_calls: AtomicUsize::new(0),
            explore_calls: AtomicUsize::new(0),
            widget_calls: AtomicUsize::new(0),
            region_calls: AtomicUsize::new(0),
            throttle_explore: AtomicBool::new(false),
            throttle_widget: AtomicBool::new(false),
            explore_status: AtomicU16::new(0),
            widget_status: AtomicU16::new(0),
            explore_body: Mutex::new(EXPLORE_BODY.to_string()),
            timeline_body: Mutex::new(TIMELINE_BODY.to_string()),
            region_body: Mutex::new(REGION_BODY.to_string()),
            cookies_seen: Mutex::new(Vec::new()),
            explore_queries: Mutex::new(Vec::new()),
            widget_queries: Mutex::new(Vec::new()),
            arrivals: Mutex::new(Vec::new()),
        }
    }
}

impl FakeState {
    fn record(&self, headers: &HeaderMap) {
        let cookie = headers
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.cookies_seen.lock().unwrap().push(cookie);
        self.arrivals.lock().unwrap().push(Instant::now());
    }
}

fn forced_status(slot: &AtomicU16) -> Option<StatusCode> {
    match slot.load(Ordering::SeqCst) {
        0 => None,
        code => StatusCode::from_u16(code).ok(),
    }
}

pub struct FakeUpstream {
    pub url: String,
    pub state: Arc<FakeState>,
    handle: JoinHandle<()>,
}

impl FakeUpstream {
    pub async fn start() -> Self {
        let state = Arc::new(FakeState::default());
        let app = Router::new()
            .route("/", get(bootstrap))
            .route("/trends/api/explore", post(explore))
            .route("/trends/api/widgetdata/multiline", get(widget_data))
            .route("/trends/api/widgetdata/comparedgeo", get(region_data))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}"),
            state,
            handle,
        }
    }

    /// Settings pointed at this server with no artificial delays.
    pub fn config(&self) -> IngestConfig {
        IngestConfig {
            upstream_url: self.url.clone(),
            min_delay_ms: 0,
            inter_target_delay_ms: 0,
            request_timeout_secs: 5,
            ..IngestConfig::default()
        }
    }

    pub fn bootstrap_calls(&self) -> usize {
        self.state.bootstrap_calls.load(Ordering::SeqCst)
    }

    pub fn explore_calls(&self) -> usize {
        self.state.explore_calls.load(Ordering::SeqCst)
    }

    pub fn widget_calls(&self) -> usize {
        self.state.widget_calls.load(Ordering::SeqCst)
    }

    pub fn region_calls(&self) -> usize {
        self.state.region_calls.load(Ordering::SeqCst)
    }

    /// Protocol requests served, bootstraps excluded.
    pub fn protocol_calls(&self) -> usize {
        self.explore_calls() + self.widget_calls() + self.region_calls()
    }

    pub fn throttle_explore(&self, on: bool) {
        self.state.throttle_explore.store(on, Ordering::SeqCst);
    }

    pub fn throttle_widget(&self, on: bool) {
        self.state.throttle_widget.store(on, Ordering::SeqCst);
    }

    /// Answer every explore request with `status`; `None` restores normal replies.
    pub fn fail_explore_with(&self, status: Option<u16>) {
        self.state.explore_status.store(status.unwrap_or(0), Ordering::SeqCst);
    }

    /// Answer every widget-data request with `status`; `None` restores normal replies.
    pub fn fail_widget_with(&self, status: Option<u16>) {
        self.state.widget_status.store(status.unwrap_or(0), Ordering::SeqCst);
    }

    pub fn set_explore_body(&self, body: &str) {
        *self.state.explore_body.lock().unwrap() = body.to_string();
    }

    pub fn set_timeline_body(&self, body: &str) {
        *self.state.timeline_body.lock().unwrap() = body.to_string();
    }
}

impl Drop for FakeUpstream {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn bootstrap(State(state): State<Arc<FakeState>>) -> impl IntoResponse {
    state.bootstrap_calls.fetch_add(1, Ordering::SeqCst);
    (
        AppendHeaders([
            (header::SET_COOKIE, "NID=fake-nid; expires=Fri, 01-Jan-2100 00:00:00 GMT; Path=/; HttpOnly"),
            (header::SET_COOKIE, "AEC=fake-aec; Secure"),
        ]),
        "<html></html>",
    )
}

async fn explore(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    state.explore_calls.fetch_add(1, Ordering::SeqCst);
    state.record(&headers);
    state.explore_queries.lock().unwrap().push(query);
    if state.throttle_explore.load(Ordering::SeqCst) {
        return (StatusCode::TOO_MANY_REQUESTS, "slow down").into_response();
    }
    if let Some(status) = forced_status(&state.explore_status) {
        return (status, "upstream error").into_response();
    }
    let body = state.explore_body.lock().unwrap().clone();
    (StatusCode::OK, body).into_response()
}

async fn widget_data(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    state.widget_calls.fetch_add(1, Ordering::SeqCst);
    state.record(&headers);
    state.widget_queries.lock().unwrap().push(query);
    if state.throttle_widget.load(Ordering::SeqCst) {
        return (StatusCode::TOO_MANY_REQUESTS, "slow down").into_response();
    }
    if let Some(status) = forced_status(&state.widget_status) {
        return (status, "upstream error").into_response();
    }
    let body = state.timeline_body.lock().unwrap().clone();
    (StatusCode::OK, body).into_response()
}

async fn region_data(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    state.region_calls.fetch_add(1, Ordering::SeqCst);
    state.record(&headers);
    state.widget_queries.lock().unwrap().push(query);
    let body = state.region_body.lock().unwrap().clone();
    (StatusCode::OK, body).into_response()
}
