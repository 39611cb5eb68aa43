// src/provider/fallback.rs
// Built-in hotel set served when the provider cannot answer

use serde_json::{json, Value};

use super::normalize::Normalizer;
use super::NormalizedHotelRecord;

/// Provider-shaped payload, so fallback records go through the same
/// normalization as live ones.
fn mock_payload() -> Value {
    json!({
        "hotels": [
            {"hotel": [
                {"hotelBasicInfo": {
                    "hotelNo": 900001,
                    "hotelName": "サンプルビジネスホテル東京",
                    "hotelSpecial": "全室無線LAN完備。朝食無料",
                    "hotelMinCharge": 7800,
                    "latitude": 35.6812,
                    "longitude": 139.7671,
                    "postalCode": "100-0005",
                    "address1": "東京都",
                    "address2": "千代田区丸の内1-1",
                    "access": "東京駅丸の内北口より徒歩3分",
                    "reviewCount": 120,
                    "reviewAverage": 4.1
                }},
                {"hotelDetailInfo": {"checkinTime": "15:00", "checkoutTime": "11:00"}}
            ]},
            {"hotel": [
                {"hotelBasicInfo": {
                    "hotelNo": 900002,
                    "hotelName": "サンプル温泉旅館 箱根",
                    "hotelSpecial": "源泉かけ流しの温泉と露天風呂。無料駐車場あり",
                    "hotelMinCharge": 18000,
                    "latitude": 35.2329,
                    "longitude": 139.1055,
                    "postalCode": "250-0311",
                    "address1": "神奈川県",
                    "address2": "足柄下郡箱根町湯本",
                    "access": "箱根湯本駅より徒歩8分",
                    "reviewCount": 86,
                    "reviewAverage": 4.5
                }},
                {"hotelDetailInfo": {"checkinTime": "15:00", "checkoutTime": "10:00"}}
            ]},
            {"hotel": [
                {"hotelBasicInfo": {
                    "hotelNo": 900003,
                    "hotelName": "サンプルリゾート沖縄",
                    "hotelSpecial": "オーシャンビューのプールとレストラン",
                    "hotelMinCharge": 24000,
                    "latitude": 26.2124,
                    "longitude": 127.6809,
                    "postalCode": "900-0015",
                    "address1": "沖縄県",
                    "address2": "那覇市久茂地1-1",
                    "access": "ゆいレール県庁前駅より徒歩5分",
                    "reviewCount": 54,
                    "reviewAverage": 4.3
                }},
                {"hotelDetailInfo": {"checkinTime": "14:00", "checkoutTime": "11:00"}}
            ]}
        ]
    })
}

pub fn mock_hotels(normalizer: &Normalizer) -> Vec<NormalizedHotelRecord> {
    normalizer.normalize(&mock_payload())
}
