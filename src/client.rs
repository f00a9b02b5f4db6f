use reqwest::blocking::{Client, Request};
use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::{AwattarError, AwattarResponse, AwattarZone, PriceRecord};

/// Blocking client for the market data endpoint of one zone.
#[derive(Debug, Clone)]
pub struct PriceClient {
    zone: AwattarZone,
    base_url: String,
    http: Client,
}

impl PriceClient {
    /// Creates a client for a country code, `"de"` or `"at"`.
    pub fn new(country_code: &str) -> Result<Self, AwattarError> {
        Ok(Self::for_zone(country_code.parse()?))
    }

    pub fn for_zone(zone: AwattarZone) -> Self {
        Self {
            zone,
            base_url: zone.api_endpoint().to_owned(),
            http: Client::new(),
        }
    }

    /// Sends requests to `base_url` instead of the zone's public endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sends requests through `http`, e.g. a client built with custom proxy
    /// or TLS settings.
    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    pub fn zone(&self) -> AwattarZone {
        self.zone
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Builds the GET request for the given range without sending it.
    ///
    /// Only the bounds that are `Some` end up in the query string.
    pub fn build_request(
        &self,
        start_timestamp_ms: Option<i64>,
        end_timestamp_ms: Option<i64>,
    ) -> Result<Request, AwattarError> {
        let query_params = [
            ("start_timestamp", start_timestamp_ms),
            ("end_timestamp", end_timestamp_ms),
        ]
        .into_iter()
        .filter_map(|(param, timestamp)| Some((param, timestamp?.to_string())))
        .collect::<Vec<_>>();

        Ok(self.http.get(&self.base_url).query(&query_params).build()?)
    }

    /// Query prices between the optional `start_timestamp_ms` and
    /// `end_timestamp_ms` (milliseconds since the Unix epoch).
    ///
    /// Supplying neither returns every price the API currently publishes.
    pub fn request(
        &self,
        start_timestamp_ms: Option<i64>,
        end_timestamp_ms: Option<i64>,
    ) -> Result<Vec<PriceRecord>, AwattarError> {
        let request = self.build_request(start_timestamp_ms, end_timestamp_ms)?;
        debug!(url = %request.url(), zone = %self.zone, "requesting market data");

        let response = self.http.execute(request)?;
        let status = response.status();
        let body = response.text()?;

        parse_response(status, &body)
    }

    /// This is a shortcut for `request(None, None)`.
    pub fn request_now(&self) -> Result<Vec<PriceRecord>, AwattarError> {
        self.request(None, None)
    }
}

impl Default for PriceClient {
    fn default() -> Self {
        Self::for_zone(AwattarZone::default())
    }
}

/// Maps a raw API response to price records, keeping the order of the `data` array.
pub(crate) fn parse_response(
    status: StatusCode,
    body: &str,
) -> Result<Vec<PriceRecord>, AwattarError> {
    if status != StatusCode::OK {
        warn!(%status, "market data request failed");
        return Err(AwattarError::UpstreamRequestFailed {
            status: status.as_u16(),
            body: body.to_owned(),
        });
    }

    let response = serde_json::from_str::<AwattarResponse>(body)
        .map_err(|e| AwattarError::MalformedResponse(e.to_string()))?;

    let records = response
        .data
        .into_iter()
        .map(PriceRecord::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    debug!(count = records.len(), "received price records");

    Ok(records)
}
