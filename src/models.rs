//! Row and response types shared between the relational read layer and the
//! HTTP handlers. Fields whose source column may be absent are `Option`,
//! never a zero default.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Route {
    pub route_id: String,
    pub short_name: String,
    pub long_name: String,
    pub route_type: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Stop {
    pub stop_id: String,
    pub stop_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Trip {
    pub trip_id: String,
    pub route_id: String,
    pub service_id: String,
    pub trip_headsign: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// The two kinds of item a user may favorite. Enforced at the API boundary;
/// storage keeps plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FavoriteKind {
    Route,
    Stop,
}

impl FavoriteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FavoriteKind::Route => "route",
            FavoriteKind::Stop => "stop",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "route" => Some(FavoriteKind::Route),
            "stop" => Some(FavoriteKind::Stop),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Favorite {
    pub id: i32,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: String,
    pub item_id: String,
    /// Display name, resolved against routes for route favorites.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn favorite_kind_parse_accepts_only_route_and_stop() {
        assert_eq!(FavoriteKind::parse("route"), Some(FavoriteKind::Route));
        assert_eq!(FavoriteKind::parse("stop"), Some(FavoriteKind::Stop));
        assert_eq!(FavoriteKind::parse("bus"), None);
        assert_eq!(FavoriteKind::parse(""), None);
        assert_eq!(FavoriteKind::parse("Route"), None);
    }

    #[test]
    fn favorite_kind_serde_round_trip_is_lowercase() {
        let json = serde_json::to_string(&FavoriteKind::Route).unwrap();
        assert_eq!(json, "\"route\"");
        let back: FavoriteKind = serde_json::from_str("\"stop\"").unwrap();
        assert_eq!(back, FavoriteKind::Stop);
        assert!(serde_json::from_str::<FavoriteKind>("\"bus\"").is_err());
    }

    #[test]
    fn stop_omits_absent_coordinates() {
        let stop = Stop {
            stop_id: "place-a".into(),
            stop_name: "Alewife".into(),
            lat: None,
            lon: None,
        };
        let json = serde_json::to_value(&stop).unwrap();
        assert!(json.get("lat").is_none());
        assert!(json.get("lon").is_none());

        let stop = Stop {
            lat: Some(42.39),
            lon: Some(-71.14),
            ..stop
        };
        let json = serde_json::to_value(&stop).unwrap();
        assert_eq!(json["lat"], 42.39);
        assert_eq!(json["lon"], -71.14);
    }
}
