//! Pickup point models, listing read model and DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::product::Product;
use super::reception::Reception;

/// Cities a pickup point may be opened in
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum City {
    #[serde(rename = "Москва")]
    Moscow,
    #[serde(rename = "Санкт-Петербург")]
    SaintPetersburg,
    #[serde(rename = "Казань")]
    Kazan,
}

impl City {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Moscow => "Москва",
            Self::SaintPetersburg => "Санкт-Петербург",
            Self::Kazan => "Казань",
        }
    }
}

impl std::fmt::Display for City {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for City {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Москва" => Ok(Self::Moscow),
            "Санкт-Петербург" => Ok(Self::SaintPetersburg),
            "Казань" => Ok(Self::Kazan),
            _ => Err(format!("Unknown city: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickupPoint {
    pub id: Uuid,
    pub registration_date: DateTime<Utc>,
    pub city: City,
}

/// A reception together with its products, newest product first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceptionDetails {
    #[serde(flatten)]
    pub reception: Reception,
    pub products: Vec<Product>,
}

/// A pickup point together with its receptions, newest reception first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickupPointDetails {
    #[serde(flatten)]
    pub pvz: PickupPoint,
    pub receptions: Vec<ReceptionDetails>,
}

/// Normalized listing parameters.
///
/// `page` is 1-based and `limit` is already clamped by the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub page: u32,
    pub limit: u32,
}

impl ListQuery {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }

    /// Whether a reception created at `ts` falls inside the requested range
    pub fn includes(&self, ts: &DateTime<Utc>) -> bool {
        self.start_date.map_or(true, |start| *ts >= start)
            && self.end_date.map_or(true, |end| *ts <= end)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatePvzRequest {
    pub city: String,
}

/// Raw `GET /pvz` query string, parsed leniently and validated by the handler
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPvzParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListPvzResponse {
    pub pvzs: Vec<PickupPointDetails>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_city_round_trip() {
        for city in [City::Moscow, City::SaintPetersburg, City::Kazan] {
            assert_eq!(city.as_str().parse::<City>().unwrap(), city);
        }
        assert!("Новосибирск".parse::<City>().is_err());
        assert_eq!(serde_json::to_string(&City::Kazan).unwrap(), "\"Казань\"");
    }

    #[test]
    fn test_offset() {
        let query = ListQuery {
            start_date: None,
            end_date: None,
            page: 3,
            limit: 10,
        };
        assert_eq!(query.offset(), 20);
    }

    #[test]
    fn test_includes_is_inclusive() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap();
        let query = ListQuery {
            start_date: Some(start),
            end_date: Some(end),
            page: 1,
            limit: 30,
        };
        assert!(query.includes(&start));
        assert!(query.includes(&end));
        assert!(!query.includes(&(end + chrono::Duration::seconds(1))));
        assert!(!query.includes(&(start - chrono::Duration::seconds(1))));
    }
}
