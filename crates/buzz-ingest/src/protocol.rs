//! Two-step upstream protocol: negotiate widget tokens, then fetch widget data.
//!
//! Both responses are JSON behind a short anti-hijacking prefix. The explore
//! response carries 4 junk characters, the widget-data responses carry 5.
//! The framing helpers are pure functions so they can be exercised against
//! fixtures without a server.

use buzz_core::{RawTimelineEntry, Timeframe};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::config::{Endpoints, IngestConfig};
use crate::error::{ConfigError, FetchError};
use crate::rate_limit::RateLimiter;
use crate::session::SessionManager;

pub const EXPLORE_PREFIX_LEN: usize = 4;
pub const WIDGET_PREFIX_LEN: usize = 5;

pub const TIMESERIES_WIDGET_ID: &str = "TIMESERIES";
pub const GEO_MAP_WIDGET_ID: &str = "GEO_MAP";

const STAGE_EXPLORE: &str = "explore";
const STAGE_TIMESERIES: &str = "widget data";
const STAGE_REGIONS: &str = "region data";

/// An upstream-issued request template plus its opaque token.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Widget {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub request: Value,
}

/// The widgets kept from a negotiation; everything else is discarded.
#[derive(Clone, Debug, PartialEq)]
pub struct WidgetSet {
    pub timeseries: Widget,
    pub geo_map: Option<Widget>,
}

/// Interest for one region, 0-100 relative to the strongest region.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RegionScore {
    pub geo_name: String,
    pub geo_code: String,
    pub value: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRegionEntry {
    #[serde(default)]
    geo_name: String,
    #[serde(default)]
    geo_code: String,
    #[serde(default)]
    value: Vec<f64>,
}

/// Serialized protocol access for one service instance.
///
/// Every request goes through the rate limiter first and reuses the current
/// session. Methods take `&mut self`, so two requests can never be in flight
/// through the same client.
pub struct ProtocolClient {
    session: SessionManager,
    limiter: RateLimiter,
    endpoints: Endpoints,
    tz_offset: i32,
    requests_sent: u64,
}

impl ProtocolClient {
    pub fn new(config: &IngestConfig) -> Result<Self, ConfigError> {
        let endpoints = config.endpoints();
        let session = SessionManager::new(
            &endpoints.cookie_bootstrap,
            config.session_lifetime(),
            config.request_timeout(),
        )?;
        Ok(Self {
            session,
            limiter: RateLimiter::new(config.min_delay(), config.max_delay()),
            endpoints,
            tz_offset: config.tz_offset,
            requests_sent: 0,
        })
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Protocol requests issued so far (session bootstraps excluded).
    pub fn requests_sent(&self) -> u64 {
        self.requests_sent
    }

    pub fn close(&mut self) {
        self.session.close_session();
    }

    /// Exchange a comparison descriptor for widget tokens.
    pub async fn negotiate_tokens(
        &mut self,
        terms: &[&str],
        timeframe: Timeframe,
        geo: &str,
        locale: &str,
    ) -> Result<WidgetSet, FetchError> {
        let req = comparison_request(terms, timeframe, geo).to_string();
        let query = [
            ("hl", locale.to_string()),
            ("tz", self.tz_offset.to_string()),
            ("req", req),
        ];

        let session = self.session.ensure_session().await?;
        let request = session.apply(session.client().post(&self.endpoints.explore).query(&query));
        self.requests_sent += 1;
        tracing::debug!(terms = ?terms, %timeframe, geo, "negotiating widget tokens");

        let body = self.read_body(request, STAGE_EXPLORE).await?;
        parse_explore_body(&body)
    }

    /// Fetch the raw timeline for a timeseries widget.
    pub async fn fetch_timeseries(
        &mut self,
        widget: &Widget,
    ) -> Result<Vec<RawTimelineEntry>, FetchError> {
        let url = self.endpoints.widget_data.clone();
        let body = self.fetch_widget(&url, widget, STAGE_TIMESERIES).await?;
        parse_timeseries_body(&body)
    }

    /// Fetch per-region interest for a geo-map widget.
    pub async fn fetch_region_breakdown(
        &mut self,
        widget: &Widget,
    ) -> Result<Vec<RegionScore>, FetchError> {
        let url = self.endpoints.region_data.clone();
        let body = self.fetch_widget(&url, widget, STAGE_REGIONS).await?;
        parse_region_body(&body)
    }

    async fn fetch_widget(
        &mut self,
        url: &str,
        widget: &Widget,
        stage: &'static str,
    ) -> Result<String, FetchError> {
        let req = serde_json::to_string(&widget.request)
            .map_err(|e| FetchError::malformed(stage, format!("cannot re-encode widget request: {e}")))?;
        let query = [
            ("req", req),
            ("token", widget.token.clone()),
            ("tz", self.tz_offset.to_string()),
        ];

        let session = self.session.ensure_session().await?;
        let request = session.apply(session.client().get(url).query(&query));
        self.requests_sent += 1;
        tracing::debug!(widget = %widget.id, "fetching {stage}");

        self.read_body(request, stage).await
    }

    /// Send, classify the status, and read the body as text.
    async fn read_body(
        &mut self,
        request: reqwest::RequestBuilder,
        stage: &'static str,
    ) -> Result<String, FetchError> {
        self.limiter.await_slot().await;
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                self.session.invalidate();
                return Err(FetchError::network(stage, e));
            }
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            self.limiter.on_throttled();
            return Err(FetchError::Throttled { stage });
        }
        if !status.is_success() {
            // Rejected credentials mean the cookie set is no longer accepted.
            if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
                self.session.invalidate();
            }
            return Err(FetchError::UpstreamStatus {
                stage,
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| {
            self.session.invalidate();
            FetchError::network(stage, e)
        })
    }
}

/// The `req` descriptor for the explore endpoint.
pub fn comparison_request(terms: &[&str], timeframe: Timeframe, geo: &str) -> Value {
    let items: Vec<Value> = terms
        .iter()
        .map(|term| json!({ "keyword": term, "time": timeframe.as_str(), "geo": geo }))
        .collect();
    json!({
        "comparisonItem": items,
        "category": 0,
        "property": "",
    })
}

/// Drop `prefix_len` leading characters and decode the rest as JSON.
pub fn strip_and_decode(body: &str, prefix_len: usize, stage: &'static str) -> Result<Value, FetchError> {
    let offset = match body.char_indices().nth(prefix_len) {
        Some((offset, _)) => offset,
        None => {
            return Err(FetchError::malformed(
                stage,
                format!("body shorter than {prefix_len}-character prefix"),
            ));
        }
    };
    serde_json::from_str(&body[offset..]).map_err(|e| FetchError::malformed(stage, e.to_string()))
}

pub fn parse_explore_body(body: &str) -> Result<WidgetSet, FetchError> {
    let payload = strip_and_decode(body, EXPLORE_PREFIX_LEN, STAGE_EXPLORE)?;
    let Some(raw_widgets) = payload.get("widgets").and_then(Value::as_array) else {
        return Err(FetchError::malformed(STAGE_EXPLORE, "missing 'widgets' array"));
    };

    let widgets: Vec<Widget> = raw_widgets
        .iter()
        .filter_map(|w| serde_json::from_value(w.clone()).ok())
        .collect();

    let timeseries = widgets
        .iter()
        .find(|w| w.id == TIMESERIES_WIDGET_ID)
        .cloned()
        .ok_or_else(|| FetchError::malformed(STAGE_EXPLORE, "no TIMESERIES widget"))?;
    let geo_map = widgets
        .iter()
        .find(|w| w.id.starts_with(GEO_MAP_WIDGET_ID))
        .cloned();

    tracing::debug!(
        widgets = widgets.len(),
        geo_map = geo_map.is_some(),
        "selected widgets"
    );
    Ok(WidgetSet { timeseries, geo_map })
}

pub fn parse_timeseries_body(body: &str) -> Result<Vec<RawTimelineEntry>, FetchError> {
    let payload = strip_and_decode(body, WIDGET_PREFIX_LEN, STAGE_TIMESERIES)?;
    let Some(entries) = payload
        .get("default")
        .and_then(|d| d.get("timelineData"))
        .and_then(Value::as_array)
    else {
        return Err(FetchError::malformed(
            STAGE_TIMESERIES,
            "missing 'default.timelineData'",
        ));
    };

    let mut skipped = 0usize;
    let raw: Vec<RawTimelineEntry> = entries
        .iter()
        .filter_map(|entry| match serde_json::from_value(entry.clone()) {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                skipped += 1;
                None
            }
        })
        .collect();
    if skipped > 0 {
        tracing::debug!("skipped {skipped} undecodable timeline entries");
    }
    Ok(raw)
}

pub fn parse_region_body(body: &str) -> Result<Vec<RegionScore>, FetchError> {
    let payload = strip_and_decode(body, WIDGET_PREFIX_LEN, STAGE_REGIONS)?;
    let Some(entries) = payload
        .get("default")
        .and_then(|d| d.get("geoMapData"))
        .and_then(Value::as_array)
    else {
        return Err(FetchError::malformed(STAGE_REGIONS, "missing 'default.geoMapData'"));
    };

    Ok(entries
        .iter()
        .filter_map(|entry| serde_json::from_value::<RawRegionEntry>(entry.clone()).ok())
        .filter_map(|entry| {
            let value = *entry.value.first()?;
            Some(RegionScore {
                geo_name: entry.geo_name,
                geo_code: entry.geo_code,
                value,
            })
        })
        .collect())
}
