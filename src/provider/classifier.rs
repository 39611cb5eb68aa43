//! Heuristic classification of free-text hotel data.
//!
//! Matching is plain, case-sensitive substring search against keyword
//! lists, so a rule set is tied to the language of the provider's text.
//! Swap in another [`HotelClassifier`] to change rules without touching
//! the normalization pipeline.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{Amenity, HotelType};

pub trait HotelClassifier: Send + Sync {
    fn hotel_type(&self, name: &str, description: &str) -> HotelType;
    fn amenities(&self, description: &str) -> Vec<Amenity>;
    /// Station names found in `text`, de-duplicated in order of appearance.
    fn stations(&self, text: &str) -> Vec<String>;
}

static JA_STATION_PATTERN: Lazy<Regex> =
    Lazy::new(|| station_pattern("駅").expect("static station pattern"));

fn station_pattern(suffix: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(r"[^\s、。,，()（）「」『』/]+?{}", regex::escape(suffix)))
}

/// Keyword rules, checked in order; the first matching type wins.
pub struct KeywordClassifier {
    type_rules: Vec<(HotelType, Vec<String>)>,
    amenity_rules: Vec<(Amenity, Vec<String>)>,
    station_suffix: String,
    station_pattern: Regex,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl KeywordClassifier {
    pub fn new(
        type_rules: Vec<(HotelType, Vec<String>)>,
        amenity_rules: Vec<(Amenity, Vec<String>)>,
        station_suffix: &str,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            type_rules,
            amenity_rules,
            station_suffix: station_suffix.to_string(),
            station_pattern: station_pattern(station_suffix)?,
        })
    }

    /// Rule set for Japanese-language provider text.
    pub fn japanese() -> Self {
        Self {
            type_rules: vec![
                (HotelType::Resort, words(&["リゾート", "Resort"])),
                (HotelType::Business, words(&["ビジネス", "Business"])),
                (HotelType::Ryokan, words(&["旅館", "Ryokan"])),
                (HotelType::Hostel, words(&["ホステル", "ゲストハウス", "Hostel"])),
                (HotelType::Pension, words(&["ペンション", "Pension"])),
                (HotelType::Hotel, words(&["ホテル", "Hotel"])),
            ],
            amenity_rules: vec![
                (Amenity::Wifi, words(&["Wi-Fi", "WiFi", "無線LAN"])),
                (Amenity::Parking, words(&["駐車場"])),
                (Amenity::Onsen, words(&["温泉"])),
                (Amenity::OpenAirBath, words(&["露天風呂"])),
                (Amenity::Breakfast, words(&["朝食"])),
                (Amenity::Pool, words(&["プール"])),
                (Amenity::Restaurant, words(&["レストラン"])),
                (Amenity::Fitness, words(&["フィットネス", "ジム"])),
                (Amenity::Spa, words(&["スパ", "エステ"])),
                (Amenity::PetFriendly, words(&["ペット"])),
            ],
            station_suffix: "駅".to_string(),
            station_pattern: JA_STATION_PATTERN.clone(),
        }
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::japanese()
    }
}

impl HotelClassifier for KeywordClassifier {
    fn hotel_type(&self, name: &str, description: &str) -> HotelType {
        let text = format!("{} {}", name, description);
        self.type_rules
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| text.contains(k.as_str())))
            .map(|(t, _)| *t)
            .unwrap_or_default()
    }

    fn amenities(&self, description: &str) -> Vec<Amenity> {
        self.amenity_rules
            .iter()
            .filter(|(_, keywords)| keywords.iter().any(|k| description.contains(k.as_str())))
            .map(|(a, _)| *a)
            .collect()
    }

    fn stations(&self, text: &str) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();
        for m in self.station_pattern.find_iter(text) {
            // "JR山手線渋谷駅" -> "渋谷駅"
            let name = match m.as_str().rfind('線') {
                Some(pos) => &m.as_str()[pos + '線'.len_utf8()..],
                None => m.as_str(),
            };
            if name.len() <= self.station_suffix.len() {
                continue;
            }
            if !found.iter().any(|s| s == name) {
                found.push(name.to_string());
            }
        }
        found
    }
}
