//! Cache key construction. Every key is a pure function of the data kind
//! and the parameters that affect the result, so identical requests collide
//! and distinct requests never do.

pub fn live_vehicles(route_id: &str) -> String {
    format!("live:{route_id}")
}

pub fn alerts() -> String {
    "alerts:all".to_string()
}

pub fn trip_updates(route_id: &str) -> String {
    format!("trip-updates:{route_id}")
}

pub fn route_list() -> String {
    "routes:all".to_string()
}

pub fn route_trips(route_id: &str) -> String {
    format!("routes:{route_id}:trips")
}

pub fn route_stops(route_id: &str) -> String {
    format!("routes:{route_id}:stops")
}

pub fn connectivity(from_stop: &str, to_stop: &str) -> String {
    format!("stop_connectivity:{from_stop}:{to_stop}")
}
