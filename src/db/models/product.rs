//! Product models and DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ProductType {
    #[serde(rename = "электроника")]
    Electronics,
    #[serde(rename = "одежда")]
    Clothes,
    #[serde(rename = "обувь")]
    Shoes,
}

impl ProductType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Electronics => "электроника",
            Self::Clothes => "одежда",
            Self::Shoes => "обувь",
        }
    }
}

impl std::fmt::Display for ProductType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProductType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "электроника" => Ok(Self::Electronics),
            "одежда" => Ok(Self::Clothes),
            "обувь" => Ok(Self::Shoes),
            _ => Err(format!("Unknown product type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub date_time: DateTime<Utc>,
    #[serde(rename = "type")]
    pub product_type: ProductType,
    pub reception_id: Uuid,
    /// 1-based append position inside the reception
    #[serde(skip)]
    pub seq: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    #[serde(rename = "pvzId", alias = "pvz_id")]
    pub pvz_id: String,
    #[serde(rename = "type")]
    pub product_type: String,
}
