//! Reception models and DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reception lifecycle: `InProgress` -> `Closed`, never back
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReceptionStatus {
    #[serde(rename = "in_progress")]
    InProgress,
    #[serde(rename = "close")]
    Closed,
}

impl ReceptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Closed => "close",
        }
    }
}

impl std::fmt::Display for ReceptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReceptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(Self::InProgress),
            "close" => Ok(Self::Closed),
            _ => Err(format!("Unknown reception status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reception {
    pub id: Uuid,
    pub date_time: DateTime<Utc>,
    pub pvz_id: Uuid,
    pub status: ReceptionStatus,
}

impl Reception {
    pub fn is_open(&self) -> bool {
        self.status == ReceptionStatus::InProgress
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateReceptionRequest {
    #[serde(rename = "pvzId", alias = "pvz_id")]
    pub pvz_id: String,
}
