//! Data Access Layer (C1): read-only, index-aware queries against the
//! operational store (spec.md §4.1, §6.4).
//!
//! Every accessor is pinned to a specific index (never a full scan) and
//! returns either a typed record, an empty collection, or a [`DalError`].
//! No accessor raises; transport failures are converted to `query_failed`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Structured error returned by every DAL accessor (spec.md §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DalError {
    pub error_kind: DalErrorKind,
    pub message: String,
    pub parameters: HashMap<String, String>,
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DalErrorKind {
    NotFound,
    QueryFailed,
}

impl DalError {
    pub fn not_found(entity: &str, key: &str, value: &str) -> Self {
        let mut parameters = HashMap::new();
        parameters.insert(key.to_string(), value.to_string());
        Self {
            error_kind: DalErrorKind::NotFound,
            message: format!("{} not found for {}={}", entity, key, value),
            parameters,
            suggestion: Some(format!("verify {} exists for the given {}", entity, key)),
        }
    }

    pub fn query_failed(entity: &str, reason: &str) -> Self {
        Self {
            error_kind: DalErrorKind::QueryFailed,
            message: format!("query against {} failed: {}", entity, reason),
            parameters: HashMap::new(),
            suggestion: None,
        }
    }
}

impl fmt::Display for DalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.error_kind, self.message)
    }
}

impl std::error::Error for DalError {}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FlightRecord {
    pub flight_id: String,
    pub flight_number: String,
    pub scheduled_departure: String,
    pub scheduled_arrival: String,
    pub origin_iata: String,
    pub destination_iata: String,
    pub aircraft_code: String,
    pub passenger_capacity: u32,
    pub cargo_capacity_kg: f64,
    pub flight_status: String,
    pub gate: Option<String>,
    pub terminal: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CrewDutyHours {
    pub today_hours: f64,
    pub today_flights: u32,
    pub seven_day_hours: f64,
    pub twenty_eight_day_hours: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CrewRosterEntry {
    pub crew_id: String,
    pub employee_id: String,
    pub first_name: String,
    pub last_name: String,
    pub position_code: String,
    pub duty_start: String,
    pub duty_end: String,
    pub roster_status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MaintenanceWorkOrder {
    pub work_order_id: String,
    pub aircraft_code: String,
    pub status: String,
    pub description: String,
    pub estimated_completion: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AircraftAvailability {
    pub aircraft_code: String,
    pub category: String,
    pub passenger_capacity: u32,
    pub cargo_capacity_kg: f64,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WeatherRecord {
    pub airport_iata: String,
    pub forecast_time: String,
    pub condition: String,
    pub visibility_m: f64,
    pub wind_kt: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BookingConnection {
    pub booking_id: String,
    pub pnr: String,
    pub is_connection: bool,
    pub connection_at_risk: bool,
    pub passenger_name: String,
    pub frequent_flyer_tier: Option<String>,
    pub connecting_flight: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PassengerStatistics {
    pub total_passengers: u32,
    pub vip_count: u32,
    pub platinum: u32,
    pub gold: u32,
    pub silver: u32,
    pub medical_assistance: u32,
    pub first_class: u32,
    pub business_class: u32,
    pub economy_class: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BaggageStatistics {
    pub total_bags: u32,
    pub checked: u32,
    pub priority: u32,
    pub total_weight_kg: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CargoDetails {
    pub total_shipments: u32,
    pub total_pieces: u32,
    pub total_weight_kg: f64,
    pub temp_controlled_weight_kg: f64,
    pub special_handling_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FinanceFlightData {
    pub flight_number: String,
    pub passenger_capacity: u32,
    pub cargo_capacity_kg: f64,
    pub total_passengers: u32,
    pub total_cargo_weight_kg: f64,
}

/// Read-only operational store, keyed by the indexes listed in spec.md §6.4.
#[async_trait]
pub trait OperationalStore: Send + Sync {
    async fn get_flight(&self, flight_number: &str, date: &str) -> Result<FlightRecord, DalError>;
    async fn get_crew_duty_hours(&self, crew_id: &str, date: &str) -> Result<CrewDutyHours, DalError>;
    async fn get_flight_crew_roster(&self, flight_id: &str) -> Result<Vec<CrewRosterEntry>, DalError>;
    async fn get_aircraft_maintenance_status(&self, aircraft_code: &str) -> Result<MaintenanceWorkOrder, DalError>;
    async fn get_aircraft_availability(&self, aircraft_code: &str) -> Result<AircraftAvailability, DalError>;
    async fn get_weather(&self, airport_iata: &str, forecast_time: &str) -> Result<WeatherRecord, DalError>;
    async fn get_downstream_connections(&self, flight_id: &str) -> Result<Vec<BookingConnection>, DalError>;
    async fn get_passenger_statistics(&self, flight_id: &str) -> Result<PassengerStatistics, DalError>;
    async fn get_baggage_statistics(&self, flight_id: &str) -> Result<BaggageStatistics, DalError>;
    async fn get_cargo_details(&self, flight_id: &str) -> Result<CargoDetails, DalError>;
    async fn get_finance_flight_data(&self, flight_id: &str) -> Result<FinanceFlightData, DalError>;
}

/// Simple in-memory implementation of [`OperationalStore`] for testing and for
/// running the crate standalone. A production deployment swaps this for a
/// store backed by the real operational database (out of scope, spec.md §1).
#[derive(Default)]
pub struct InMemoryOperationalStore {
    pub flights: HashMap<(String, String), FlightRecord>,
    pub crew_duty_hours: HashMap<(String, String), CrewDutyHours>,
    pub crew_rosters: HashMap<String, Vec<CrewRosterEntry>>,
    pub maintenance_orders: HashMap<String, MaintenanceWorkOrder>,
    pub aircraft_availability: HashMap<String, AircraftAvailability>,
    pub weather: HashMap<(String, String), WeatherRecord>,
    pub downstream_connections: HashMap<String, Vec<BookingConnection>>,
    pub passenger_statistics: HashMap<String, PassengerStatistics>,
    pub baggage_statistics: HashMap<String, BaggageStatistics>,
    pub cargo_details: HashMap<String, CargoDetails>,
    pub finance_data: HashMap<String, FinanceFlightData>,
}

impl InMemoryOperationalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OperationalStore for InMemoryOperationalStore {
    async fn get_flight(&self, flight_number: &str, date: &str) -> Result<FlightRecord, DalError> {
        self.flights
            .get(&(flight_number.to_string(), date.to_string()))
            .cloned()
            .ok_or_else(|| DalError::not_found("flights", "flight_number+date", &format!("{}+{}", flight_number, date)))
    }

    async fn get_crew_duty_hours(&self, crew_id: &str, date: &str) -> Result<CrewDutyHours, DalError> {
        self.crew_duty_hours
            .get(&(crew_id.to_string(), date.to_string()))
            .cloned()
            .ok_or_else(|| DalError::not_found("crew_roster", "crew_id+date", &format!("{}+{}", crew_id, date)))
    }

    async fn get_flight_crew_roster(&self, flight_id: &str) -> Result<Vec<CrewRosterEntry>, DalError> {
        Ok(self.crew_rosters.get(flight_id).cloned().unwrap_or_default())
    }

    async fn get_aircraft_maintenance_status(&self, aircraft_code: &str) -> Result<MaintenanceWorkOrder, DalError> {
        self.maintenance_orders
            .get(aircraft_code)
            .cloned()
            .ok_or_else(|| DalError::not_found("maintenance_work_orders", "aircraft_code", aircraft_code))
    }

    async fn get_aircraft_availability(&self, aircraft_code: &str) -> Result<AircraftAvailability, DalError> {
        self.aircraft_availability
            .get(aircraft_code)
            .cloned()
            .ok_or_else(|| DalError::not_found("aircraft_availability", "aircraft_code", aircraft_code))
    }

    async fn get_weather(&self, airport_iata: &str, forecast_time: &str) -> Result<WeatherRecord, DalError> {
        self.weather
            .get(&(airport_iata.to_string(), forecast_time.to_string()))
            .cloned()
            .ok_or_else(|| {
                DalError::not_found("weather", "airport+forecast_time", &format!("{}+{}", airport_iata, forecast_time))
            })
    }

    async fn get_downstream_connections(&self, flight_id: &str) -> Result<Vec<BookingConnection>, DalError> {
        Ok(self.downstream_connections.get(flight_id).cloned().unwrap_or_default())
    }

    async fn get_passenger_statistics(&self, flight_id: &str) -> Result<PassengerStatistics, DalError> {
        Ok(self.passenger_statistics.get(flight_id).cloned().unwrap_or_default())
    }

    async fn get_baggage_statistics(&self, flight_id: &str) -> Result<BaggageStatistics, DalError> {
        Ok(self.baggage_statistics.get(flight_id).cloned().unwrap_or_default())
    }

    async fn get_cargo_details(&self, flight_id: &str) -> Result<CargoDetails, DalError> {
        Ok(self.cargo_details.get(flight_id).cloned().unwrap_or_default())
    }

    async fn get_finance_flight_data(&self, flight_id: &str) -> Result<FinanceFlightData, DalError> {
        self.finance_data
            .get(flight_id)
            .cloned()
            .ok_or_else(|| DalError::not_found("bookings", "flight_id", flight_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_flight_is_not_found() {
        let store = InMemoryOperationalStore::new();
        let err = store.get_flight("EY123", "2026-01-20").await.unwrap_err();
        assert_eq!(err.error_kind, DalErrorKind::NotFound);
    }

    #[tokio::test]
    async fn empty_roster_is_empty_not_error() {
        let store = InMemoryOperationalStore::new();
        let roster = store.get_flight_crew_roster("F-1").await.unwrap();
        assert!(roster.is_empty());
    }
}
