//! Maps provider payloads onto [`NormalizedHotelRecord`].
//!
//! The provider nests each hotel as a list of single-key info blocks
//! (`hotelBasicInfo`, `hotelRatingInfo`, `hotelDetailInfo`, `roomInfo`),
//! which are merged into one flat field map before extraction. Flat hotel
//! objects are accepted as well. Missing or mistyped fields fall back to
//! zero/empty values, so extraction never fails.

use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;

use super::classifier::{HotelClassifier, KeywordClassifier};
use super::{Address, GeoPoint, NormalizedHotelRecord, PriceRange, RatingBreakdown};

#[derive(Clone)]
pub struct Normalizer {
    classifier: Arc<dyn HotelClassifier>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(Arc::new(KeywordClassifier::japanese()))
    }
}

#[derive(Default)]
struct MergedHotel {
    fields: Map<String, Value>,
    rooms: Vec<Value>,
}

impl Normalizer {
    pub fn new(classifier: Arc<dyn HotelClassifier>) -> Self {
        Self { classifier }
    }

    /// Normalize every hotel in a search payload (`{"hotels": [...]}`).
    pub fn normalize(&self, payload: &Value) -> Vec<NormalizedHotelRecord> {
        payload
            .get("hotels")
            .and_then(Value::as_array)
            .map(|hotels| hotels.iter().map(|h| self.normalize_hotel(h)).collect())
            .unwrap_or_default()
    }

    /// Normalize a single hotel entry, nested or flat.
    pub fn normalize_hotel(&self, entry: &Value) -> NormalizedHotelRecord {
        let merged = merge_blocks(entry);
        let f = &merged.fields;

        let name = text(f, "hotelName");
        let description = first_text(f, &["hotelSpecial", "hotelComment", "description"]);
        let access = text(f, "access");
        let nearest = text(f, "nearestStation");

        let mut station_text = access;
        if !nearest.is_empty() {
            station_text.push(' ');
            station_text.push_str(&nearest);
            if !nearest.ends_with('駅') {
                station_text.push('駅');
            }
        }

        let amenity_text = format!("{} {}", description, text(f, "parkingInformation"));

        NormalizedHotelRecord {
            id: text(f, "hotelNo"),
            hotel_type: self.classifier.hotel_type(&name, &description),
            amenities: self.classifier.amenities(&amenity_text),
            nearest_stations: self.classifier.stations(&station_text),
            address: Address {
                postal_code: text(f, "postalCode"),
                line1: text(f, "address1"),
                line2: text(f, "address2"),
            },
            location: GeoPoint {
                latitude: number(f, "latitude"),
                longitude: number(f, "longitude"),
            },
            price: price_range(f, &merged.rooms),
            rating: RatingBreakdown {
                overall: number(f, "reviewAverage"),
                service: number(f, "serviceAverage"),
                location: number(f, "locationAverage"),
                room: number(f, "roomAverage"),
                equipment: number(f, "equipmentAverage"),
                bath: number(f, "bathAverage"),
                meal: number(f, "mealAverage"),
                review_count: number(f, "reviewCount").max(0.0) as u64,
            },
            check_in: text(f, "checkinTime"),
            check_out: text(f, "checkoutTime"),
            image_url: text(f, "hotelImageUrl"),
            available: !merged.rooms.is_empty(),
            last_refreshed: Utc::now(),
            name,
            description,
        }
    }
}

fn merge_blocks(entry: &Value) -> MergedHotel {
    let mut merged = MergedHotel::default();
    match entry.get("hotel") {
        Some(Value::Array(blocks)) => {
            for block in blocks {
                merge_object(&mut merged, block);
            }
        }
        Some(inner @ Value::Object(_)) => merge_object(&mut merged, inner),
        _ => merge_object(&mut merged, entry),
    }
    merged
}

fn merge_object(merged: &mut MergedHotel, block: &Value) {
    let Some(obj) = block.as_object() else {
        return;
    };
    for (k, v) in obj {
        match v {
            _ if k == "roomInfo" => match v {
                Value::Array(rooms) => merged.rooms.extend(rooms.iter().cloned()),
                other => merged.rooms.push(other.clone()),
            },
            Value::Object(inner) if k.ends_with("Info") => {
                for (ik, iv) in inner {
                    merged.fields.insert(ik.clone(), iv.clone());
                }
            }
            _ => {
                merged.fields.insert(k.clone(), v.clone());
            }
        }
    }
}

/// Room blocks are lists of `{roomBasicInfo}` / `{dailyCharge}` objects.
fn room_charges(rooms: &[Value]) -> Vec<f64> {
    let mut charges = Vec::new();
    for room in rooms {
        let parts: Vec<&Value> = match room {
            Value::Array(parts) => parts.iter().collect(),
            other => vec![other],
        };
        for part in parts {
            if let Some(charge) = part.get("dailyCharge").and_then(Value::as_object) {
                let total = number(charge, "total");
                let amount = if total > 0.0 { total } else { number(charge, "rakutenCharge") };
                if amount > 0.0 {
                    charges.push(amount);
                }
            }
        }
    }
    charges
}

fn price_range(fields: &Map<String, Value>, rooms: &[Value]) -> PriceRange {
    let charges = room_charges(rooms);
    let listed_min = number(fields, "hotelMinCharge");
    let room_min = charges.iter().cloned().fold(f64::INFINITY, f64::min);
    let room_max = charges.iter().cloned().fold(0.0, f64::max);

    let min = if listed_min > 0.0 {
        listed_min
    } else if room_min.is_finite() {
        room_min
    } else {
        0.0
    };
    let max = room_max.max(min);

    PriceRange {
        min: min as u64,
        max: max as u64,
    }
}

fn text(fields: &Map<String, Value>, key: &str) -> String {
    match fields.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn first_text(fields: &Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .map(|k| text(fields, k))
        .find(|s| !s.is_empty())
        .unwrap_or_default()
}

fn number(fields: &Map<String, Value>, key: &str) -> f64 {
    let n = match fields.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    };
    if n.is_finite() {
        n
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{Amenity, HotelType};
    use serde_json::json;

    fn vacant_payload() -> Value {
        json!({
            "pagingInfo": {"recordCount": 1, "page": 1},
            "hotels": [{
                "hotel": [
                    {"hotelBasicInfo": {
                        "hotelNo": 136197,
                        "hotelName": "箱根リゾートホテル",
                        "hotelSpecial": "源泉かけ流しの温泉と露天風呂。全館Wi-Fi対応",
                        "hotelMinCharge": 12000,
                        "latitude": 35.2323,
                        "longitude": 139.1069,
                        "postalCode": "250-0311",
                        "address1": "神奈川県",
                        "address2": "足柄下郡箱根町湯本",
                        "access": "箱根登山鉄道線箱根湯本駅より徒歩5分",
                        "nearestStation": "箱根湯本",
                        "parkingInformation": "駐車場有り",
                        "hotelImageUrl": "https://img.example/136197.jpg",
                        "reviewCount": 412,
                        "reviewAverage": 4.38
                    }},
                    {"hotelRatingInfo": {
                        "serviceAverage": 4.5,
                        "locationAverage": 4.1,
                        "roomAverage": 4.2,
                        "equipmentAverage": 3.9,
                        "bathAverage": 4.7,
                        "mealAverage": 4.4
                    }},
                    {"hotelDetailInfo": {"checkinTime": "15:00", "checkoutTime": "10:00"}},
                    {"roomInfo": [
                        {"roomBasicInfo": {"roomName": "和室"}},
                        {"dailyCharge": {"rakutenCharge": 14000, "total": 28000}}
                    ]},
                    {"roomInfo": [
                        {"roomBasicInfo": {"roomName": "露天風呂付き客室"}},
                        {"dailyCharge": {"rakutenCharge": 30000, "total": 60000}}
                    ]}
                ]
            }]
        })
    }

    #[test]
    fn test_nested_payload_merged() {
        let hotels = Normalizer::default().normalize(&vacant_payload());
        assert_eq!(hotels.len(), 1);
        let h = &hotels[0];

        assert_eq!(h.id, "136197");
        assert_eq!(h.name, "箱根リゾートホテル");
        assert_eq!(h.hotel_type, HotelType::Resort);
        assert_eq!(h.address.line2, "足柄下郡箱根町湯本");
        assert_eq!(h.location.latitude, 35.2323);
        assert_eq!(h.nearest_stations, vec!["箱根湯本駅".to_string()]);
        assert_eq!(h.price, PriceRange { min: 12000, max: 60000 });
        assert_eq!(h.rating.bath, 4.7);
        assert_eq!(h.rating.review_count, 412);
        assert_eq!(h.check_in, "15:00");
        assert!(h.available);
        assert!(h.amenities.contains(&Amenity::Onsen));
        assert!(h.amenities.contains(&Amenity::OpenAirBath));
        assert!(h.amenities.contains(&Amenity::Wifi));
        assert!(h.amenities.contains(&Amenity::Parking));
    }

    #[test]
    fn test_flat_entry_and_string_numbers() {
        let entry = json!({
            "hotelNo": "42",
            "hotelName": "ビジネスホテル駅前",
            "hotelMinCharge": "6500",
            "reviewAverage": "3.9"
        });
        let h = Normalizer::default().normalize_hotel(&entry);
        assert_eq!(h.id, "42");
        assert_eq!(h.hotel_type, HotelType::Business);
        assert_eq!(h.price, PriceRange { min: 6500, max: 6500 });
        assert_eq!(h.rating.overall, 3.9);
        assert!(!h.available);
    }

    #[test]
    fn test_partial_data_gets_defaults() {
        let h = Normalizer::default().normalize_hotel(&json!({"hotel": [{"hotelBasicInfo": {}}]}));
        assert!(h.id.is_empty());
        assert!(h.name.is_empty());
        assert_eq!(h.hotel_type, HotelType::Other);
        assert_eq!(h.price, PriceRange::default());
        assert_eq!(h.rating, RatingBreakdown::default());
        assert!(h.nearest_stations.is_empty());
    }

    #[test]
    fn test_mistyped_fields_ignored() {
        let entry = json!({"hotelName": ["not", "a", "string"], "latitude": {"deg": 35}, "reviewCount": -3});
        let h = Normalizer::default().normalize_hotel(&entry);
        assert!(h.name.is_empty());
        assert_eq!(h.location.latitude, 0.0);
        assert_eq!(h.rating.review_count, 0);
    }

    #[test]
    fn test_payload_without_hotels_is_empty() {
        let normalizer = Normalizer::default();
        assert!(normalizer.normalize(&json!({})).is_empty());
        assert!(normalizer.normalize(&json!({"hotels": "nope"})).is_empty());
        assert!(normalizer.normalize(&Value::Null).is_empty());
    }
}
