// src/provider/mod.rs
// External hotel search provider: request model, canonical record shape,
// and the resilient client that talks to it

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::cache::key::{ParamValue, Params};
use crate::error::FetchError;

pub mod classifier;
pub mod client;
pub mod fallback;
pub mod normalize;
pub mod rate_limiter;
pub mod response_cache;
pub mod transport;

pub use classifier::{HotelClassifier, KeywordClassifier};
pub use client::{ProviderMetrics, ResilientFetchClient};
pub use normalize::Normalizer;
pub use rate_limiter::RateLimiter;
pub use response_cache::ResponseCache;
pub use transport::{HttpTransport, ProviderTransport, TransportError, TransportResponse};

// ============ Endpoints ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endpoint {
    SimpleHotelSearch,
    HotelDetailSearch,
    VacantHotelSearch,
    KeywordHotelSearch,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::SimpleHotelSearch => "SimpleHotelSearch",
            Endpoint::HotelDetailSearch => "HotelDetailSearch",
            Endpoint::VacantHotelSearch => "VacantHotelSearch",
            Endpoint::KeywordHotelSearch => "KeywordHotelSearch",
        }
    }

    /// Versioned path segment appended to the provider base URL
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::SimpleHotelSearch => "SimpleHotelSearch/20170426",
            Endpoint::HotelDetailSearch => "HotelDetailSearch/20170426",
            Endpoint::VacantHotelSearch => "VacantHotelSearch/20170426",
            Endpoint::KeywordHotelSearch => "KeywordHotelSearch/20170426",
        }
    }

    fn required_params(&self) -> &'static [&'static str] {
        match self {
            Endpoint::SimpleHotelSearch => &[],
            Endpoint::HotelDetailSearch => &["hotelNo"],
            Endpoint::VacantHotelSearch => &["checkinDate", "checkoutDate"],
            Endpoint::KeywordHotelSearch => &["keyword"],
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Endpoint {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SimpleHotelSearch" => Ok(Endpoint::SimpleHotelSearch),
            "HotelDetailSearch" => Ok(Endpoint::HotelDetailSearch),
            "VacantHotelSearch" => Ok(Endpoint::VacantHotelSearch),
            "KeywordHotelSearch" => Ok(Endpoint::KeywordHotelSearch),
            other => Err(FetchError::MalformedInput(format!("unknown endpoint: {:?}", other))),
        }
    }
}

// ============ Request Context ============

/// One logical request to the provider: endpoint plus parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalRequestContext {
    pub endpoint: Endpoint,
    pub params: Params,
}

impl ExternalRequestContext {
    /// Parse `endpoint` and check its required parameters.
    pub fn new(endpoint: &str, params: &Params) -> Result<Self, FetchError> {
        let endpoint: Endpoint = endpoint.parse()?;
        for required in endpoint.required_params() {
            if !params.contains_key(*required) {
                return Err(FetchError::MalformedInput(format!(
                    "{} requires parameter {:?}",
                    endpoint, required
                )));
            }
        }
        Ok(Self {
            endpoint,
            params: params.clone(),
        })
    }

    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.params
            .iter()
            .map(|(k, v)| (k.clone(), ParamValue::as_query_value(v)))
            .collect()
    }
}

// ============ Normalized Record ============

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HotelType {
    Resort,
    Business,
    Ryokan,
    Hostel,
    Pension,
    Hotel,
    #[default]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Amenity {
    Wifi,
    Parking,
    Onsen,
    OpenAirBath,
    Breakfast,
    Pool,
    Restaurant,
    Fitness,
    Spa,
    PetFriendly,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub postal_code: String,
    pub line1: String,
    pub line2: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: u64,
    pub max: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingBreakdown {
    pub overall: f64,
    pub service: f64,
    pub location: f64,
    pub room: f64,
    pub equipment: f64,
    pub bath: f64,
    pub meal: f64,
    pub review_count: u64,
}

/// Canonical hotel shape. Every field has a zero/empty default so partial
/// upstream data still yields a complete record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedHotelRecord {
    pub id: String,
    pub name: String,
    pub hotel_type: HotelType,
    pub description: String,
    pub address: Address,
    pub location: GeoPoint,
    pub nearest_stations: Vec<String>,
    pub price: PriceRange,
    pub rating: RatingBreakdown,
    pub amenities: Vec<Amenity>,
    pub check_in: String,
    pub check_out: String,
    pub image_url: String,
    pub available: bool,
    pub last_refreshed: DateTime<Utc>,
}

// ============ Fetch Outcome ============

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "origin", rename_all = "snake_case")]
pub enum ResultOrigin {
    Live,
    Cached,
    /// Reduced-fidelity built-in data, served because the provider failed
    Fallback { kind: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchOutcome {
    pub hotels: Vec<NormalizedHotelRecord>,
    pub origin: ResultOrigin,
}

impl FetchOutcome {
    pub fn is_fallback(&self) -> bool {
        matches!(self.origin, ResultOrigin::Fallback { .. })
    }
}
