use crate::error::{GeoError, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Public French address API, CSV batch endpoint
pub const DEFAULT_GEOCODE_ENDPOINT: &str = "https://api-adresse.data.gouv.fr/search/csv/";

const NOT_FOUND_MARKER: &str = "not-found";
const PAYLOAD_FILE_NAME: &str = "zipCodes.csv";

/// One place to geocode: a postal code and a display-cased place name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeocodeRequest {
    pub postcode: String,
    pub city: String,
}

/// A successfully geocoded row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodedPlace {
    pub postcode: String,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
}

/// Remote geocoding service.
///
/// Implementations return only the rows they could resolve; misses are not errors.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, requests: &[GeocodeRequest]) -> Result<Vec<GeocodedPlace>>;
}

/// Encode requests as a `postcode,city` CSV document.
pub fn encode_payload(requests: &[GeocodeRequest]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::NonNumeric)
        .from_writer(Vec::new());
    writer.write_record(["postcode", "city"])?;
    for request in requests {
        writer.write_record([request.postcode.as_str(), request.city.as_str()])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| GeoError::Other(format!("failed to flush CSV payload: {err}")))?;
    String::from_utf8(bytes).map_err(|err| GeoError::Other(err.to_string()))
}

struct Columns {
    postcode: usize,
    name: usize,
    lng: usize,
    lat: usize,
}

impl Columns {
    /// Named columns when the header carries them, `postcode,name,longitude,latitude` otherwise.
    fn from_header(header: &csv::StringRecord) -> Self {
        let find = |names: &[&str]| {
            header
                .iter()
                .position(|field| names.iter().any(|name| field.trim().eq_ignore_ascii_case(name)))
        };
        Self {
            postcode: find(&["postcode"]).unwrap_or(0),
            name: find(&["city", "name", "commune"]).unwrap_or(1),
            lng: find(&["longitude", "lng"]).unwrap_or(2),
            lat: find(&["latitude", "lat"]).unwrap_or(3),
        }
    }
}

fn parse_coordinate(raw: Option<&str>) -> Option<f64> {
    raw?.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Parse a geocoder CSV answer.
///
/// The first line is a header. Rows flagged `not-found`, repeated header lines and rows
/// whose coordinates do not parse to finite numbers are dropped.
pub fn parse_response(body: &str) -> Vec<GeocodedPlace> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(body.as_bytes());

    let columns = match reader.headers() {
        Ok(header) => Columns::from_header(header),
        Err(err) => {
            log::warn!("Unreadable geocoder response header: {err}");
            return Vec::new();
        }
    };

    let mut places = Vec::new();
    let mut dropped = 0usize;
    for row in reader.records() {
        let row = match row {
            Ok(row) => row,
            Err(err) => {
                log::debug!("Skipping malformed geocoder row: {err}");
                dropped += 1;
                continue;
            }
        };
        if row.iter().any(|field| field.trim() == NOT_FOUND_MARKER) {
            dropped += 1;
            continue;
        }
        let (Some(lat), Some(lng)) = (
            parse_coordinate(row.get(columns.lat)),
            parse_coordinate(row.get(columns.lng)),
        ) else {
            dropped += 1;
            continue;
        };
        let Some(postcode) = row.get(columns.postcode).map(str::trim).filter(|c| !c.is_empty())
        else {
            dropped += 1;
            continue;
        };
        places.push(GeocodedPlace {
            postcode: postcode.to_string(),
            name: row
                .get(columns.name)
                .unwrap_or_default()
                .replace('"', "")
                .trim()
                .to_string(),
            lat,
            lng,
        });
    }

    if dropped > 0 {
        log::debug!("Geocoder response: {} resolved, {dropped} dropped", places.len());
    }
    places
}

/// [`Geocoder`] backed by the CSV batch endpoint of an address API
#[derive(Clone)]
pub struct HttpGeocoder {
    client: Client,
    endpoint: String,
}

impl HttpGeocoder {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(Client::new(), endpoint)
    }

    pub fn with_client(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Default for HttpGeocoder {
    fn default() -> Self {
        Self::new(DEFAULT_GEOCODE_ENDPOINT)
    }
}

#[async_trait]
impl Geocoder for HttpGeocoder {
    async fn geocode(&self, requests: &[GeocodeRequest]) -> Result<Vec<GeocodedPlace>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let payload = encode_payload(requests)?;
        let part = Part::text(payload)
            .file_name(PAYLOAD_FILE_NAME)
            .mime_str("text/csv")?;
        let form = Form::new()
            .part("data", part)
            .text("postcode", "postcode");

        log::debug!(
            "Geocoding {} places via {}",
            requests.len(),
            self.endpoint
        );
        let response = self.client.post(&self.endpoint).multipart(form).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(GeoError::bad_status(status.as_u16(), body));
        }
        Ok(parse_response(&body))
    }
}
