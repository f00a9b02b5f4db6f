use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod client;
pub mod time;

pub use client::PriceClient;
pub use time::{datetime_to_millis, millis_to_datetime};

/// One hourly price quotation as published by the market data API.
///
/// The validity interval is half-open: it includes `start` and excludes `end`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceRecord {
    #[serde(rename = "marketprice")]
    market_price: f64,
    unit: String,
    #[serde(rename = "start_timestamp")]
    start_timestamp_ms: i64,
    #[serde(rename = "end_timestamp")]
    end_timestamp_ms: i64,
    #[serde(skip)]
    start: DateTime<Utc>,
    #[serde(skip)]
    end: DateTime<Utc>,
    /// Keys of the API entry besides the four above.
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

impl PriceRecord {
    /// Market price in `unit`, passed through unchanged from the API.
    pub fn market_price(&self) -> f64 {
        self.market_price
    }

    /// Unit of the market price, usually `Eur/MWh`.
    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn start_timestamp_ms(&self) -> i64 {
        self.start_timestamp_ms
    }

    pub fn end_timestamp_ms(&self) -> i64 {
        self.end_timestamp_ms
    }

    /// Start of this price slot in UTC.
    pub fn start_date(&self) -> DateTime<Utc> {
        self.start
    }

    /// End of this price slot in UTC.
    pub fn end_date(&self) -> DateTime<Utc> {
        self.end
    }

    /// Start of this price slot in the given time zone.
    pub fn start_in<TZ: TimeZone>(&self, tz: &TZ) -> DateTime<TZ> {
        self.start.with_timezone(tz)
    }

    /// End of this price slot in the given time zone.
    pub fn end_in<TZ: TimeZone>(&self, tz: &TZ) -> DateTime<TZ> {
        self.end.with_timezone(tz)
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Returns `true` if `instant` lies within `[start, end)`.
    pub fn contains<TZ: TimeZone>(&self, instant: &DateTime<TZ>) -> bool {
        let instant = instant.with_timezone(&Utc);
        self.start <= instant && instant < self.end
    }

    /// Converts the price to Euro per kWh. Returns `None` for any unit other
    /// than `Eur/MWh`.
    pub fn price_eur_per_kwh(&self) -> Option<f64> {
        match self.unit.as_str() {
            "Eur/MWh" => Some(self.market_price / 1000.0),
            _ => None,
        }
    }

    /// Returns the entry as it appeared in the API response, including keys
    /// this crate does not interpret.
    pub fn to_json(&self) -> serde_json::Value {
        let mut entry = self.extra.clone();
        entry.insert("marketprice".to_owned(), self.market_price.into());
        entry.insert("unit".to_owned(), self.unit.clone().into());
        entry.insert("start_timestamp".to_owned(), self.start_timestamp_ms.into());
        entry.insert("end_timestamp".to_owned(), self.end_timestamp_ms.into());
        serde_json::Value::Object(entry)
    }
}

impl TryFrom<AwattarDataItem> for PriceRecord {
    type Error = AwattarError;

    fn try_from(item: AwattarDataItem) -> Result<Self, Self::Error> {
        let to_datetime = |ms: i64| {
            millis_to_datetime(ms).ok_or_else(|| {
                AwattarError::MalformedResponse(format!("timestamp {ms} out of range"))
            })
        };

        Ok(Self {
            start: to_datetime(item.start_timestamp)?,
            end: to_datetime(item.end_timestamp)?,
            market_price: item.marketprice,
            unit: item.unit,
            start_timestamp_ms: item.start_timestamp,
            end_timestamp_ms: item.end_timestamp,
            extra: item.extra,
        })
    }
}

#[derive(Deserialize)]
struct AwattarDataItem {
    start_timestamp: i64,
    end_timestamp: i64,
    marketprice: f64,
    unit: String,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct AwattarResponse {
    data: Vec<AwattarDataItem>,
}

#[derive(Error, Debug)]
pub enum AwattarError {
    #[error("http request error")]
    Reqwest(#[from] reqwest::Error),
    #[error("unknown country code {0:?}, expected \"de\" or \"at\"")]
    UnknownCountryCode(String),
    #[error("api responded with status {status}")]
    UpstreamRequestFailed { status: u16, body: String },
    #[error("api responded with a malformed response: {0}")]
    MalformedResponse(String),
}

/// Zone for awattar prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AwattarZone {
    Austria,
    #[default]
    Germany,
}

impl AwattarZone {
    /// Returns the API endpoint for the given zone.
    pub const fn api_endpoint(&self) -> &'static str {
        match self {
            AwattarZone::Austria => "https://api.awattar.at/v1/marketdata",
            AwattarZone::Germany => "https://api.awattar.de/v1/marketdata",
        }
    }

    pub const fn country_code(&self) -> &'static str {
        match self {
            AwattarZone::Austria => "at",
            AwattarZone::Germany => "de",
        }
    }

    /// Local time zone of the market.
    pub const fn timezone(&self) -> chrono_tz::Tz {
        match self {
            AwattarZone::Austria => chrono_tz::Europe::Vienna,
            AwattarZone::Germany => chrono_tz::Europe::Berlin,
        }
    }
}

impl FromStr for AwattarZone {
    type Err = AwattarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "de" => Ok(AwattarZone::Germany),
            "at" => Ok(AwattarZone::Austria),
            _ => Err(AwattarError::UnknownCountryCode(s.to_owned())),
        }
    }
}

impl fmt::Display for AwattarZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.country_code())
    }
}

/// Query prices for `country_code` (`"de"` or `"at"`) with an optional `start`
/// and `end` DateTime.
///
/// Supplying neither `start` nor `end` returns the full horizon the API
/// currently publishes. Better use `get_prices_now()` as a convenience
/// function in this case.
pub fn get_prices<TZ>(
    country_code: &str,
    start: Option<DateTime<TZ>>,
    end: Option<DateTime<TZ>>,
) -> Result<Vec<PriceRecord>, AwattarError>
where
    TZ: TimeZone,
{
    let zone = country_code.parse::<AwattarZone>()?;

    get_prices_with(&PriceClient::for_zone(zone), start, end)
}

/// Like [`get_prices`], but sends the request through an existing `client`.
pub fn get_prices_with<TZ>(
    client: &PriceClient,
    start: Option<DateTime<TZ>>,
    end: Option<DateTime<TZ>>,
) -> Result<Vec<PriceRecord>, AwattarError>
where
    TZ: TimeZone,
{
    client.request(
        start.as_ref().map(datetime_to_millis),
        end.as_ref().map(datetime_to_millis),
    )
}

/// This is a shortcut for `get_prices::<Utc>(country_code, None, None)`.
pub fn get_prices_now(country_code: &str) -> Result<Vec<PriceRecord>, AwattarError> {
    get_prices::<Utc>(country_code, None, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(marketprice: f64, unit: &str) -> AwattarDataItem {
        AwattarDataItem {
            start_timestamp: 1700000000000,
            end_timestamp: 1700003600000,
            marketprice,
            unit: unit.to_owned(),
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn test_record_from_item() {
        let record = PriceRecord::try_from(item(45.67, "Eur/MWh")).unwrap();

        assert_eq!(record.market_price(), 45.67);
        assert_eq!(record.unit(), "Eur/MWh");
        assert_eq!(record.start_timestamp_ms(), 1700000000000);
        assert_eq!(record.end_timestamp_ms(), 1700003600000);
        assert_eq!(
            record.start_date(),
            Utc.with_ymd_and_hms(2023, 11, 14, 22, 13, 20).unwrap()
        );
        assert_eq!(
            record.end_date(),
            Utc.with_ymd_and_hms(2023, 11, 14, 23, 13, 20).unwrap()
        );
        assert_eq!(record.duration(), Duration::hours(1));
    }

    #[test]
    fn test_record_keeps_unknown_unit() {
        let record = PriceRecord::try_from(item(4.2, "Eur/kWh")).unwrap();

        assert_eq!(record.unit(), "Eur/kWh");
        assert_eq!(record.price_eur_per_kwh(), None);
    }

    #[test]
    fn test_record_out_of_range_timestamp() {
        let mut raw = item(1.0, "Eur/MWh");
        raw.end_timestamp = i64::MAX;

        assert!(matches!(
            PriceRecord::try_from(raw),
            Err(AwattarError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_price_conversion() {
        let record = PriceRecord::try_from(item(-42.09, "Eur/MWh")).unwrap();
        let kwh = record.price_eur_per_kwh().unwrap();

        assert!((kwh - -0.04209).abs() < 1e-12);
    }

    #[test]
    fn test_record_contains_half_open() {
        let record = PriceRecord::try_from(item(1.0, "Eur/MWh")).unwrap();

        assert!(record.contains(&record.start_date()));
        assert!(record.contains(&(record.start_date() + Duration::minutes(59))));
        assert!(!record.contains(&record.end_date()));
        assert!(!record.contains(&(record.start_date() - Duration::milliseconds(1))));
    }

    #[test]
    fn test_record_local_time() {
        let record = PriceRecord::try_from(item(1.0, "Eur/MWh")).unwrap();
        let local = record.start_in(&AwattarZone::Germany.timezone());

        assert_eq!(local.to_rfc3339(), "2023-11-14T23:13:20+01:00");
        assert_eq!(local, record.start_date());
    }

    #[test]
    fn test_record_to_json() {
        let record = PriceRecord::try_from(item(45.67, "Eur/MWh")).unwrap();
        let expected = serde_json::json!({
            "marketprice": 45.67,
            "unit": "Eur/MWh",
            "start_timestamp": 1700000000000i64,
            "end_timestamp": 1700003600000i64,
        });

        assert_eq!(record.to_json(), expected);
        assert_eq!(serde_json::to_value(&record).unwrap(), expected);
    }

    #[test]
    fn test_record_to_json_keeps_extra_keys() {
        let raw: AwattarDataItem = serde_json::from_str(
            r#"{"start_timestamp": 0, "end_timestamp": 3600000, "marketprice": 50, "unit": "Eur/MWh", "region": "DE-LU"}"#,
        )
        .unwrap();
        let record = PriceRecord::try_from(raw).unwrap();

        assert_eq!(record.market_price(), 50.0);
        assert_eq!(record.to_json()["region"], "DE-LU");
        assert_eq!(record.to_json()["marketprice"], 50.0);
        assert_eq!(serde_json::to_value(&record).unwrap(), record.to_json());
    }

    #[test]
    fn test_zone_from_str() {
        assert_eq!("de".parse::<AwattarZone>().unwrap(), AwattarZone::Germany);
        assert_eq!("at".parse::<AwattarZone>().unwrap(), AwattarZone::Austria);
        assert_eq!(AwattarZone::default(), AwattarZone::Germany);

        for code in ["ch", "DE", "", " de"] {
            match code.parse::<AwattarZone>() {
                Err(AwattarError::UnknownCountryCode(c)) => assert_eq!(c, code),
                other => panic!("unexpected result for {code:?}: {other:?}"),
            }
        }
    }

    #[test]
    fn test_zone_endpoints() {
        assert_eq!(
            AwattarZone::Germany.api_endpoint(),
            "https://api.awattar.de/v1/marketdata"
        );
        assert_eq!(
            AwattarZone::Austria.api_endpoint(),
            "https://api.awattar.at/v1/marketdata"
        );
        assert_eq!(AwattarZone::Austria.to_string(), "at");
    }

    #[test]
    fn test_get_prices_unknown_country() {
        let result = get_prices::<Utc>("fr", Some(Utc::now()), None);

        assert!(matches!(result, Err(AwattarError::UnknownCountryCode(c)) if c == "fr"));
        assert!(matches!(
            get_prices_now("xx"),
            Err(AwattarError::UnknownCountryCode(_))
        ));
    }
}
