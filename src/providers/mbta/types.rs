//! Wire types for the MBTA enhanced JSON real-time feeds, plus the flat
//! shapes the API serves.
//!
//! Every feed struct takes `#[serde(default)]` so an absent upstream field
//! decodes to its default instead of failing the whole feed; only malformed
//! JSON discards a fetch. Alerts and trip updates are passed through to
//! clients, so these types serialize as well as deserialize.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// --- Vehicle positions ---

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VehicleFeed {
    pub entity: Vec<VehicleEntity>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VehicleEntity {
    pub id: String,
    pub vehicle: VehiclePayload,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VehiclePayload {
    pub current_status: String,
    pub current_stop_sequence: i32,
    pub occupancy_percentage: i32,
    pub occupancy_status: String,
    pub stop_id: String,
    pub timestamp: i64,
    pub position: Position,
    pub trip: VehicleTrip,
    pub vehicle: VehicleDescriptor,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub bearing: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VehicleTrip {
    pub start_time: String,
    pub route_id: String,
    pub direction_id: i32,
    pub trip_id: String,
    pub schedule_relationship: String,
    pub start_date: String,
    pub last_trip: bool,
    pub revenue: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VehicleDescriptor {
    pub id: String,
    pub label: String,
}

/// Flat projection of one vehicle-positions entity. Derived per cache
/// refresh; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LiveVehicle {
    pub vehicle_id: String,
    pub label: String,
    pub route_id: String,
    pub trip_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub bearing: f64,
    pub occupancy_status: String,
    pub occupancy_percentage: i32,
    pub stop_id: String,
    pub current_stop_sequence: i32,
    pub direction_id: i32,
    pub timestamp: i64,
    pub status: String,
}

/// Filter entities to the requested route and flatten them.
pub fn project_vehicles(feed: VehicleFeed, route_id: &str) -> Vec<LiveVehicle> {
    feed.entity
        .into_iter()
        .filter(|e| e.vehicle.trip.route_id == route_id)
        .map(|e| {
            let v = e.vehicle;
            LiveVehicle {
                vehicle_id: v.vehicle.id,
                label: v.vehicle.label,
                route_id: v.trip.route_id,
                trip_id: v.trip.trip_id,
                latitude: v.position.latitude,
                longitude: v.position.longitude,
                bearing: v.position.bearing,
                occupancy_status: v.occupancy_status,
                occupancy_percentage: v.occupancy_percentage,
                stop_id: v.stop_id,
                current_stop_sequence: v.current_stop_sequence,
                direction_id: v.trip.direction_id,
                timestamp: v.timestamp,
                status: v.current_status,
            }
        })
        .collect()
}

// --- Alerts ---

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AlertFeed {
    pub entity: Vec<AlertEntity>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct AlertEntity {
    pub id: String,
    pub alert: Alert,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct Alert {
    pub header_text: TranslatedText,
    pub description_text: TranslatedText,
    pub effect: String,
    pub informed_entity: Vec<InformedEntity>,
    pub active_period: Vec<ActivePeriod>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct TranslatedText {
    pub translation: Vec<Translation>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct Translation {
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct InformedEntity {
    pub route_id: String,
    pub stop_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct ActivePeriod {
    pub start: i64,
    pub end: i64,
}

// --- Trip updates ---

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TripUpdateFeed {
    pub entity: Vec<TripUpdateEntity>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct TripUpdateEntity {
    pub trip_update: TripUpdate,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct TripUpdate {
    pub trip: UpdateTrip,
    pub stop_time_update: Vec<StopTimeUpdate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct UpdateTrip {
    pub trip_id: String,
    pub route_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct StopTimeUpdate {
    pub stop_id: String,
    pub arrival: ArrivalEstimate,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct ArrivalEstimate {
    pub time: i64,
    pub uncertainty: i32,
}

/// Keep only updates for the requested route; entities pass through
/// otherwise unreshaped.
pub fn filter_trip_updates(feed: TripUpdateFeed, route_id: &str) -> Vec<TripUpdateEntity> {
    feed.entity
        .into_iter()
        .filter(|e| e.trip_update.trip.route_id == route_id)
        .collect()
}
