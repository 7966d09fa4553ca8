//! GTFS static-data bulk loader.
//!
//! Reads the four tabular files from a local directory and upserts rows
//! into Postgres with `ON CONFLICT DO NOTHING`, so re-running ingestion
//! against an unchanged file is a no-op. Columns are resolved by header
//! name. A bad row is logged and counted, never fatal to the file; each
//! file load returns an aggregate [`LoadSummary`] so callers can tell
//! "loaded all rows" from "loaded all but five".

use std::path::Path;

use csv::StringRecord;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("{file} missing required column {column}")]
    MissingColumn {
        file: &'static str,
        column: &'static str,
    },
}

/// Per-file outcome counts. `inserted + skipped + failed` equals the number
/// of data rows read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// Rows newly inserted.
    pub inserted: u64,
    /// Rows dropped by a natural-key conflict (already present).
    pub skipped: u64,
    /// Rows that could not be read, parsed, or inserted.
    pub failed: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GtfsLoadReport {
    pub stops: LoadSummary,
    pub routes: LoadSummary,
    pub trips: LoadSummary,
    pub stop_times: LoadSummary,
}

impl GtfsLoadReport {
    pub fn total_failed(&self) -> u64 {
        self.stops.failed + self.routes.failed + self.trips.failed + self.stop_times.failed
    }
}

/// Load all four GTFS files from `dir` in reference order.
pub async fn load_gtfs(pool: &PgPool, dir: impl AsRef<Path>) -> Result<GtfsLoadReport, IngestError> {
    let dir = dir.as_ref();

    let report = GtfsLoadReport {
        stops: load_stops(pool, &dir.join("stops.txt")).await?,
        routes: load_routes(pool, &dir.join("routes.txt")).await?,
        trips: load_trips(pool, &dir.join("trips.txt")).await?,
        stop_times: load_stop_times(pool, &dir.join("stop_times.txt")).await?,
    };

    info!(
        stops = report.stops.inserted,
        routes = report.routes.inserted,
        trips = report.trips.inserted,
        stop_times = report.stop_times.inserted,
        failed = report.total_failed(),
        "GTFS load complete"
    );

    Ok(report)
}

/// Orphan counts across the tables loaded independently above. Reported
/// after the load instead of per-row foreign-key checks, which would cost
/// bulk-load throughput.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceReport {
    pub trips_without_route: i64,
    pub stop_times_without_trip: i64,
    pub stop_times_without_stop: i64,
}

pub async fn verify_references(pool: &PgPool) -> Result<ReferenceReport, sqlx::Error> {
    let trips_without_route: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM trips t LEFT JOIN routes r ON r.route_id = t.route_id \
         WHERE r.route_id IS NULL",
    )
    .fetch_one(pool)
    .await?;

    let stop_times_without_trip: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM stop_times st LEFT JOIN trips t ON t.trip_id = st.trip_id \
         WHERE t.trip_id IS NULL",
    )
    .fetch_one(pool)
    .await?;

    let stop_times_without_stop: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM stop_times st LEFT JOIN stops s ON s.stop_id = st.stop_id \
         WHERE s.stop_id IS NULL",
    )
    .fetch_one(pool)
    .await?;

    let report = ReferenceReport {
        trips_without_route,
        stop_times_without_trip,
        stop_times_without_stop,
    };

    if report.trips_without_route > 0
        || report.stop_times_without_trip > 0
        || report.stop_times_without_stop > 0
    {
        warn!(
            trips_without_route = report.trips_without_route,
            stop_times_without_trip = report.stop_times_without_trip,
            stop_times_without_stop = report.stop_times_without_stop,
            "GTFS feed contains dangling references"
        );
    }

    Ok(report)
}

// --- Field helpers ---

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

fn field<'r>(record: &'r StringRecord, idx: Option<usize>) -> &'r str {
    idx.and_then(|i| record.get(i)).unwrap_or("")
}

/// Absent or unparsable numeric fields become None, never zero.
fn parse_field<T: std::str::FromStr>(record: &StringRecord, idx: Option<usize>) -> Option<T> {
    idx.and_then(|i| record.get(i)).and_then(|s| s.parse().ok())
}

fn position(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h == name)
}

fn require(
    headers: &StringRecord,
    file: &'static str,
    column: &'static str,
) -> Result<usize, IngestError> {
    position(headers, column).ok_or(IngestError::MissingColumn { file, column })
}

// --- stops.txt ---

#[derive(Debug)]
struct StopColumns {
    id: usize,
    name: Option<usize>,
    lat: Option<usize>,
    lon: Option<usize>,
}

impl StopColumns {
    fn resolve(headers: &StringRecord) -> Result<Self, IngestError> {
        Ok(Self {
            id: require(headers, "stops.txt", "stop_id")?,
            name: position(headers, "stop_name"),
            lat: position(headers, "stop_lat"),
            lon: position(headers, "stop_lon"),
        })
    }
}

struct StopRow {
    stop_id: String,
    stop_name: String,
    lat: Option<f64>,
    lon: Option<f64>,
}

fn parse_stop(record: &StringRecord, cols: &StopColumns) -> Option<StopRow> {
    let stop_id = non_empty(record.get(cols.id).unwrap_or(""))?;
    Some(StopRow {
        stop_id,
        stop_name: field(record, cols.name).to_string(),
        lat: parse_field(record, cols.lat),
        lon: parse_field(record, cols.lon),
    })
}

async fn load_stops(pool: &PgPool, path: &Path) -> Result<LoadSummary, IngestError> {
    let mut rdr = csv::Reader::from_path(path)?;
    let cols = StopColumns::resolve(rdr.headers()?)?;

    let mut summary = LoadSummary::default();
    let mut empty_key = 0u64;

    for (i, result) in rdr.records().enumerate() {
        let line = i + 2;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!(file = "stops.txt", line, error = %e, "Unreadable record");
                summary.failed += 1;
                continue;
            }
        };
        let Some(row) = parse_stop(&record, &cols) else {
            empty_key += 1;
            summary.failed += 1;
            continue;
        };

        let result = sqlx::query(
            "INSERT INTO stops (stop_id, stop_name, stop_lat, stop_lon) \
             VALUES ($1, $2, $3, $4) ON CONFLICT (stop_id) DO NOTHING",
        )
        .bind(&row.stop_id)
        .bind(&row.stop_name)
        .bind(row.lat)
        .bind(row.lon)
        .execute(pool)
        .await;

        match result {
            Ok(res) if res.rows_affected() > 0 => summary.inserted += 1,
            Ok(_) => summary.skipped += 1,
            Err(e) => {
                warn!(file = "stops.txt", line, error = %e, "Row insert failed");
                summary.failed += 1;
            }
        }
    }

    if empty_key > 0 {
        warn!(file = "stops.txt", count = empty_key, "Records with empty stop_id counted as failed");
    }
    info!(
        file = "stops.txt",
        inserted = summary.inserted,
        skipped = summary.skipped,
        failed = summary.failed,
        "Loaded GTFS file"
    );
    Ok(summary)
}

// --- routes.txt ---

struct RouteColumns {
    id: usize,
    agency: Option<usize>,
    short_name: Option<usize>,
    long_name: Option<usize>,
    route_type: Option<usize>,
}

impl RouteColumns {
    fn resolve(headers: &StringRecord) -> Result<Self, IngestError> {
        Ok(Self {
            id: require(headers, "routes.txt", "route_id")?,
            agency: position(headers, "agency_id"),
            short_name: position(headers, "route_short_name"),
            long_name: position(headers, "route_long_name"),
            route_type: position(headers, "route_type"),
        })
    }
}

struct RouteRow {
    route_id: String,
    agency_id: Option<String>,
    short_name: String,
    long_name: String,
    route_type: Option<i32>,
}

fn parse_route(record: &StringRecord, cols: &RouteColumns) -> Option<RouteRow> {
    let route_id = non_empty(record.get(cols.id).unwrap_or(""))?;
    Some(RouteRow {
        route_id,
        agency_id: non_empty(field(record, cols.agency)),
        short_name: field(record, cols.short_name).to_string(),
        long_name: field(record, cols.long_name).to_string(),
        route_type: parse_field(record, cols.route_type),
    })
}

async fn load_routes(pool: &PgPool, path: &Path) -> Result<LoadSummary, IngestError> {
    let mut rdr = csv::Reader::from_path(path)?;
    let cols = RouteColumns::resolve(rdr.headers()?)?;

    let mut summary = LoadSummary::default();
    let mut empty_key = 0u64;

    for (i, result) in rdr.records().enumerate() {
        let line = i + 2;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!(file = "routes.txt", line, error = %e, "Unreadable record");
                summary.failed += 1;
                continue;
            }
        };
        let Some(row) = parse_route(&record, &cols) else {
            empty_key += 1;
            summary.failed += 1;
            continue;
        };

        let result = sqlx::query(
            "INSERT INTO routes (route_id, agency_id, route_short_name, route_long_name, route_type) \
             VALUES ($1, $2, $3, $4, $5) ON CONFLICT (route_id) DO NOTHING",
        )
        .bind(&row.route_id)
        .bind(&row.agency_id)
        .bind(&row.short_name)
        .bind(&row.long_name)
        .bind(row.route_type)
        .execute(pool)
        .await;

        match result {
            Ok(res) if res.rows_affected() > 0 => summary.inserted += 1,
            Ok(_) => summary.skipped += 1,
            Err(e) => {
                warn!(file = "routes.txt", line, error = %e, "Row insert failed");
                summary.failed += 1;
            }
        }
    }

    if empty_key > 0 {
        warn!(file = "routes.txt", count = empty_key, "Records with empty route_id counted as failed");
    }
    info!(
        file = "routes.txt",
        inserted = summary.inserted,
        skipped = summary.skipped,
        failed = summary.failed,
        "Loaded GTFS file"
    );
    Ok(summary)
}

// --- trips.txt ---

struct TripColumns {
    trip_id: usize,
    route_id: usize,
    service_id: usize,
    headsign: Option<usize>,
}

impl TripColumns {
    fn resolve(headers: &StringRecord) -> Result<Self, IngestError> {
        Ok(Self {
            trip_id: require(headers, "trips.txt", "trip_id")?,
            route_id: require(headers, "trips.txt", "route_id")?,
            service_id: require(headers, "trips.txt", "service_id")?,
            headsign: position(headers, "trip_headsign"),
        })
    }
}

struct TripRow {
    trip_id: String,
    route_id: String,
    service_id: String,
    headsign: Option<String>,
}

fn parse_trip(record: &StringRecord, cols: &TripColumns) -> Option<TripRow> {
    let trip_id = non_empty(record.get(cols.trip_id).unwrap_or(""))?;
    Some(TripRow {
        trip_id,
        route_id: record.get(cols.route_id).unwrap_or("").to_string(),
        service_id: record.get(cols.service_id).unwrap_or("").to_string(),
        headsign: non_empty(field(record, cols.headsign)),
    })
}

async fn load_trips(pool: &PgPool, path: &Path) -> Result<LoadSummary, IngestError> {
    let mut rdr = csv::Reader::from_path(path)?;
    let cols = TripColumns::resolve(rdr.headers()?)?;

    let mut summary = LoadSummary::default();
    let mut empty_key = 0u64;

    for (i, result) in rdr.records().enumerate() {
        let line = i + 2;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!(file = "trips.txt", line, error = %e, "Unreadable record");
                summary.failed += 1;
                continue;
            }
        };
        let Some(row) = parse_trip(&record, &cols) else {
            empty_key += 1;
            summary.failed += 1;
            continue;
        };

        let result = sqlx::query(
            "INSERT INTO trips (trip_id, route_id, service_id, trip_headsign) \
             VALUES ($1, $2, $3, $4) ON CONFLICT (trip_id) DO NOTHING",
        )
        .bind(&row.trip_id)
        .bind(&row.route_id)
        .bind(&row.service_id)
        .bind(&row.headsign)
        .execute(pool)
        .await;

        match result {
            Ok(res) if res.rows_affected() > 0 => summary.inserted += 1,
            Ok(_) => summary.skipped += 1,
            Err(e) => {
                warn!(file = "trips.txt", line, error = %e, "Row insert failed");
                summary.failed += 1;
            }
        }
    }

    if empty_key > 0 {
        warn!(file = "trips.txt", count = empty_key, "Records with empty trip_id counted as failed");
    }
    info!(
        file = "trips.txt",
        inserted = summary.inserted,
        skipped = summary.skipped,
        failed = summary.failed,
        "Loaded GTFS file"
    );
    Ok(summary)
}

// --- stop_times.txt ---

struct StopTimeColumns {
    trip_id: usize,
    stop_id: usize,
    arrival: Option<usize>,
    departure: Option<usize>,
    sequence: Option<usize>,
}

impl StopTimeColumns {
    fn resolve(headers: &StringRecord) -> Result<Self, IngestError> {
        Ok(Self {
            trip_id: require(headers, "stop_times.txt", "trip_id")?,
            stop_id: require(headers, "stop_times.txt", "stop_id")?,
            arrival: position(headers, "arrival_time"),
            departure: position(headers, "departure_time"),
            sequence: position(headers, "stop_sequence"),
        })
    }
}

struct StopTimeRow {
    trip_id: String,
    stop_id: String,
    arrival: Option<String>,
    departure: Option<String>,
    sequence: Option<i32>,
}

fn parse_stop_time(record: &StringRecord, cols: &StopTimeColumns) -> Option<StopTimeRow> {
    let trip_id = non_empty(record.get(cols.trip_id).unwrap_or(""))?;
    Some(StopTimeRow {
        trip_id,
        stop_id: record.get(cols.stop_id).unwrap_or("").to_string(),
        arrival: non_empty(field(record, cols.arrival)),
        departure: non_empty(field(record, cols.departure)),
        sequence: parse_field(record, cols.sequence),
    })
}

async fn load_stop_times(pool: &PgPool, path: &Path) -> Result<LoadSummary, IngestError> {
    let mut rdr = csv::Reader::from_path(path)?;
    let cols = StopTimeColumns::resolve(rdr.headers()?)?;

    let mut summary = LoadSummary::default();
    let mut empty_key = 0u64;

    for (i, result) in rdr.records().enumerate() {
        let line = i + 2;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!(file = "stop_times.txt", line, error = %e, "Unreadable record");
                summary.failed += 1;
                continue;
            }
        };
        let Some(row) = parse_stop_time(&record, &cols) else {
            empty_key += 1;
            summary.failed += 1;
            continue;
        };

        // stop_times has no natural key, so ON CONFLICT never fires and
        // duplicate rows in the source survive as duplicates here.
        let result = sqlx::query(
            "INSERT INTO stop_times (trip_id, stop_id, arrival_time, departure_time, stop_sequence) \
             VALUES ($1, $2, $3, $4, $5) ON CONFLICT DO NOTHING",
        )
        .bind(&row.trip_id)
        .bind(&row.stop_id)
        .bind(&row.arrival)
        .bind(&row.departure)
        .bind(row.sequence)
        .execute(pool)
        .await;

        match result {
            Ok(res) if res.rows_affected() > 0 => summary.inserted += 1,
            Ok(_) => summary.skipped += 1,
            Err(e) => {
                warn!(file = "stop_times.txt", line, error = %e, "Row insert failed");
                summary.failed += 1;
            }
        }
    }

    if empty_key > 0 {
        warn!(file = "stop_times.txt", count = empty_key, "Records with empty trip_id counted as failed");
    }
    info!(
        file = "stop_times.txt",
        inserted = summary.inserted,
        skipped = summary.skipped,
        failed = summary.failed,
        "Loaded GTFS file"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_rows(data: &str) -> (StringRecord, Vec<StringRecord>) {
        let mut rdr = csv::Reader::from_reader(data.as_bytes());
        let headers = rdr.headers().unwrap().clone();
        let rows = rdr.records().map(|r| r.unwrap()).collect();
        (headers, rows)
    }

    #[test]
    fn stop_with_empty_coordinates_parses_to_none() {
        let (headers, rows) = read_rows(
            "stop_id,stop_code,stop_name,stop_desc,stop_lat,stop_lon\n\
             place-alfcl,,Alewife,,42.395428,-71.142483\n\
             place-nowhr,,Nowhere,,,\n",
        );
        let cols = StopColumns::resolve(&headers).unwrap();

        let with_coords = parse_stop(&rows[0], &cols).unwrap();
        assert_eq!(with_coords.stop_id, "place-alfcl");
        assert_eq!(with_coords.stop_name, "Alewife");
        assert_eq!(with_coords.lat, Some(42.395428));
        assert_eq!(with_coords.lon, Some(-71.142483));

        let without = parse_stop(&rows[1], &cols).unwrap();
        assert_eq!(without.lat, None);
        assert_eq!(without.lon, None);
    }

    #[test]
    fn unparsable_coordinates_parse_to_none_not_zero() {
        let (headers, rows) = read_rows(
            "stop_id,stop_name,stop_lat,stop_lon\n\
             s1,Somewhere,not-a-number,-71.1\n",
        );
        let cols = StopColumns::resolve(&headers).unwrap();
        let row = parse_stop(&rows[0], &cols).unwrap();
        assert_eq!(row.lat, None);
        assert_eq!(row.lon, Some(-71.1));
    }

    #[test]
    fn empty_stop_id_rejects_the_row() {
        let (headers, rows) = read_rows("stop_id,stop_name\n,Ghost Stop\n");
        let cols = StopColumns::resolve(&headers).unwrap();
        assert!(parse_stop(&rows[0], &cols).is_none());
    }

    #[test]
    fn missing_required_column_is_an_error() {
        let (headers, _) = read_rows("stop_code,stop_name\nx,y\n");
        let err = StopColumns::resolve(&headers).unwrap_err();
        assert!(matches!(
            err,
            IngestError::MissingColumn {
                file: "stops.txt",
                column: "stop_id"
            }
        ));
        assert_eq!(err.to_string(), "stops.txt missing required column stop_id");
    }

    #[test]
    fn route_type_falls_back_to_none() {
        let (headers, rows) = read_rows(
            "route_id,agency_id,route_short_name,route_long_name,route_desc,route_type\n\
             Red,1,,Red Line,,1\n\
             Shuttle,1,SH,Shuttle,,\n\
             Odd,1,,Odd,,tram\n",
        );
        let cols = RouteColumns::resolve(&headers).unwrap();

        assert_eq!(parse_route(&rows[0], &cols).unwrap().route_type, Some(1));
        assert_eq!(parse_route(&rows[1], &cols).unwrap().route_type, None);
        assert_eq!(parse_route(&rows[2], &cols).unwrap().route_type, None);
    }

    #[test]
    fn route_names_keep_raw_strings_and_agency_is_optional() {
        let (headers, rows) = read_rows(
            "route_id,route_short_name,route_long_name\n\
             Red,,Red Line\n",
        );
        let cols = RouteColumns::resolve(&headers).unwrap();
        let row = parse_route(&rows[0], &cols).unwrap();
        assert_eq!(row.short_name, "");
        assert_eq!(row.long_name, "Red Line");
        assert_eq!(row.agency_id, None);
    }

    #[test]
    fn trip_headsign_empty_becomes_none() {
        let (headers, rows) = read_rows(
            "route_id,service_id,trip_id,trip_headsign\n\
             Red,weekday,t-1,Ashmont\n\
             Red,weekday,t-2,\n",
        );
        let cols = TripColumns::resolve(&headers).unwrap();

        let with = parse_trip(&rows[0], &cols).unwrap();
        assert_eq!(with.trip_id, "t-1");
        assert_eq!(with.route_id, "Red");
        assert_eq!(with.service_id, "weekday");
        assert_eq!(with.headsign, Some("Ashmont".to_string()));

        let without = parse_trip(&rows[1], &cols).unwrap();
        assert_eq!(without.headsign, None);
    }

    #[test]
    fn stop_time_optional_fields_parse_to_none() {
        let (headers, rows) = read_rows(
            "trip_id,arrival_time,departure_time,stop_id,stop_sequence\n\
             t-1,08:00:00,08:00:30,s1,1\n\
             t-1,,,s2,\n\
             t-1,09:00:00,,s3,abc\n",
        );
        let cols = StopTimeColumns::resolve(&headers).unwrap();

        let full = parse_stop_time(&rows[0], &cols).unwrap();
        assert_eq!(full.arrival, Some("08:00:00".to_string()));
        assert_eq!(full.departure, Some("08:00:30".to_string()));
        assert_eq!(full.sequence, Some(1));

        let sparse = parse_stop_time(&rows[1], &cols).unwrap();
        assert_eq!(sparse.arrival, None);
        assert_eq!(sparse.departure, None);
        assert_eq!(sparse.sequence, None);

        let unparsable = parse_stop_time(&rows[2], &cols).unwrap();
        assert_eq!(unparsable.sequence, None);
    }

    #[test]
    fn load_summary_counts_start_at_zero() {
        let report = GtfsLoadReport::default();
        assert_eq!(report.total_failed(), 0);
    }
}
