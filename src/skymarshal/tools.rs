//! Tool Registry (C2): wraps DAL calls as agent-invocable tools with
//! JSON-schema argument validation and structured error returns (spec.md
//! §4.2). Grounded on `cloudllm::tool_protocol`'s `ToolResult`/`ToolMetadata`/
//! `ToolParameter` shapes, simplified to the single local-protocol case this
//! crate needs.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::skymarshal::dal::{DalError, OperationalStore};
use crate::skymarshal::model::AgentName;

/// Structured outcome of a tool invocation. A tool never throws into the
/// agent loop — failure is a value, per spec.md §4.2.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: Value,
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(output: Value) -> Self {
        Self { success: true, output, error: None }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self { success: false, output: Value::Null, error: Some(message.into()) }
    }

    fn from_dal<T: Serialize>(result: Result<T, DalError>) -> Self {
        match result {
            Ok(value) => Self::success(serde_json::to_value(value).unwrap_or(Value::Null)),
            Err(err) => Self::failure(format!("{:?}: {}", err.error_kind, err.message)),
        }
    }
}

/// One required or optional JSON argument a tool accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    pub description: String,
    pub required: bool,
}

impl ToolParameter {
    pub fn required(name: &str, description: &str) -> Self {
        Self { name: name.to_string(), description: description.to_string(), required: true }
    }
}

/// Name, description, and parameter schema visible to the LLM (spec.md §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolMetadata {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ToolParameter>,
}

#[derive(Debug, Clone)]
pub enum ToolError {
    NotFound(String),
    InvalidParameters(String),
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolError::NotFound(name) => write!(f, "Tool not found: {}", name),
            ToolError::InvalidParameters(msg) => write!(f, "Invalid parameters: {}", msg),
        }
    }
}

impl std::error::Error for ToolError {}

/// A named, side-effect-free function the agent loop may call.
#[async_trait]
pub trait Tool: Send + Sync {
    fn metadata(&self) -> ToolMetadata;
    async fn execute(&self, params: &Value) -> ToolResult;
}

fn required_string(params: &Value, field: &str) -> Result<String, ToolError> {
    params
        .get(field)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| ToolError::InvalidParameters(format!("missing required field '{}'", field)))
}

pub struct GetFlightTool {
    store: Arc<dyn OperationalStore>,
}

impl GetFlightTool {
    pub fn new(store: Arc<dyn OperationalStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for GetFlightTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: "get_flight".to_string(),
            description: "Look up a flight by flight number and date.".to_string(),
            parameters: vec![
                ToolParameter::required("flight_number", "carrier prefix + 3-4 digits, e.g. EY123"),
                ToolParameter::required("date", "ISO 8601 date, YYYY-MM-DD"),
            ],
        }
    }

    async fn execute(&self, params: &Value) -> ToolResult {
        let flight_number = match required_string(params, "flight_number") {
            Ok(v) => v,
            Err(e) => return ToolResult::failure(e.to_string()),
        };
        let date = match required_string(params, "date") {
            Ok(v) => v,
            Err(e) => return ToolResult::failure(e.to_string()),
        };
        ToolResult::from_dal(self.store.get_flight(&flight_number, &date).await)
    }
}

pub struct GetCrewDutyHoursTool {
    store: Arc<dyn OperationalStore>,
}

impl GetCrewDutyHoursTool {
    pub fn new(store: Arc<dyn OperationalStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for GetCrewDutyHoursTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: "get_crew_duty_hours".to_string(),
            description: "Get a crew member's duty hours for FTL compliance checking.".to_string(),
            parameters: vec![
                ToolParameter::required("crew_id", "crew member identifier"),
                ToolParameter::required("date", "ISO 8601 date, YYYY-MM-DD"),
            ],
        }
    }

    async fn execute(&self, params: &Value) -> ToolResult {
        let crew_id = match required_string(params, "crew_id") {
            Ok(v) => v,
            Err(e) => return ToolResult::failure(e.to_string()),
        };
        let date = match required_string(params, "date") {
            Ok(v) => v,
            Err(e) => return ToolResult::failure(e.to_string()),
        };
        ToolResult::from_dal(self.store.get_crew_duty_hours(&crew_id, &date).await)
    }
}

pub struct GetFlightCrewRosterTool {
    store: Arc<dyn OperationalStore>,
}

impl GetFlightCrewRosterTool {
    pub fn new(store: Arc<dyn OperationalStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for GetFlightCrewRosterTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: "get_flight_crew_roster".to_string(),
            description: "Get the crew roster assigned to a flight.".to_string(),
            parameters: vec![ToolParameter::required("flight_id", "flight identifier")],
        }
    }

    async fn execute(&self, params: &Value) -> ToolResult {
        let flight_id = match required_string(params, "flight_id") {
            Ok(v) => v,
            Err(e) => return ToolResult::failure(e.to_string()),
        };
        ToolResult::from_dal(self.store.get_flight_crew_roster(&flight_id).await)
    }
}

pub struct GetAircraftMaintenanceStatusTool {
    store: Arc<dyn OperationalStore>,
}

impl GetAircraftMaintenanceStatusTool {
    pub fn new(store: Arc<dyn OperationalStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for GetAircraftMaintenanceStatusTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: "get_aircraft_maintenance_status".to_string(),
            description: "Get open maintenance work orders for an aircraft.".to_string(),
            parameters: vec![ToolParameter::required("aircraft_code", "aircraft registration or type code")],
        }
    }

    async fn execute(&self, params: &Value) -> ToolResult {
        let aircraft_code = match required_string(params, "aircraft_code") {
            Ok(v) => v,
            Err(e) => return ToolResult::failure(e.to_string()),
        };
        ToolResult::from_dal(self.store.get_aircraft_maintenance_status(&aircraft_code).await)
    }
}

pub struct GetAircraftAvailabilityTool {
    store: Arc<dyn OperationalStore>,
}

impl GetAircraftAvailabilityTool {
    pub fn new(store: Arc<dyn OperationalStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for GetAircraftAvailabilityTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: "get_aircraft_availability".to_string(),
            description: "Get availability status for an aircraft.".to_string(),
            parameters: vec![ToolParameter::required("aircraft_code", "aircraft registration or type code")],
        }
    }

    async fn execute(&self, params: &Value) -> ToolResult {
        let aircraft_code = match required_string(params, "aircraft_code") {
            Ok(v) => v,
            Err(e) => return ToolResult::failure(e.to_string()),
        };
        ToolResult::from_dal(self.store.get_aircraft_availability(&aircraft_code).await)
    }
}

pub struct GetWeatherTool {
    store: Arc<dyn OperationalStore>,
}

impl GetWeatherTool {
    pub fn new(store: Arc<dyn OperationalStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for GetWeatherTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: "get_weather".to_string(),
            description: "Get a forecast for an airport at a given time, for regulatory checks.".to_string(),
            parameters: vec![
                ToolParameter::required("airport_iata", "3-letter IATA airport code"),
                ToolParameter::required("forecast_time", "ISO 8601 timestamp"),
            ],
        }
    }

    async fn execute(&self, params: &Value) -> ToolResult {
        let airport_iata = match required_string(params, "airport_iata") {
            Ok(v) => v,
            Err(e) => return ToolResult::failure(e.to_string()),
        };
        let forecast_time = match required_string(params, "forecast_time") {
            Ok(v) => v,
            Err(e) => return ToolResult::failure(e.to_string()),
        };
        ToolResult::from_dal(self.store.get_weather(&airport_iata, &forecast_time).await)
    }
}

pub struct GetDownstreamConnectionsTool {
    store: Arc<dyn OperationalStore>,
}

impl GetDownstreamConnectionsTool {
    pub fn new(store: Arc<dyn OperationalStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for GetDownstreamConnectionsTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: "get_downstream_connections".to_string(),
            description: "Get passengers with at-risk connections on a flight.".to_string(),
            parameters: vec![ToolParameter::required("flight_id", "flight identifier")],
        }
    }

    async fn execute(&self, params: &Value) -> ToolResult {
        let flight_id = match required_string(params, "flight_id") {
            Ok(v) => v,
            Err(e) => return ToolResult::failure(e.to_string()),
        };
        ToolResult::from_dal(self.store.get_downstream_connections(&flight_id).await)
    }
}

pub struct GetPassengerStatisticsTool {
    store: Arc<dyn OperationalStore>,
}

impl GetPassengerStatisticsTool {
    pub fn new(store: Arc<dyn OperationalStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for GetPassengerStatisticsTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: "get_passenger_statistics".to_string(),
            description: "Get passenger counts and high-value passenger details for a flight.".to_string(),
            parameters: vec![ToolParameter::required("flight_id", "flight identifier")],
        }
    }

    async fn execute(&self, params: &Value) -> ToolResult {
        let flight_id = match required_string(params, "flight_id") {
            Ok(v) => v,
            Err(e) => return ToolResult::failure(e.to_string()),
        };
        ToolResult::from_dal(self.store.get_passenger_statistics(&flight_id).await)
    }
}

pub struct GetBaggageStatisticsTool {
    store: Arc<dyn OperationalStore>,
}

impl GetBaggageStatisticsTool {
    pub fn new(store: Arc<dyn OperationalStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for GetBaggageStatisticsTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: "get_baggage_statistics".to_string(),
            description: "Get baggage statistics for a flight.".to_string(),
            parameters: vec![ToolParameter::required("flight_id", "flight identifier")],
        }
    }

    async fn execute(&self, params: &Value) -> ToolResult {
        let flight_id = match required_string(params, "flight_id") {
            Ok(v) => v,
            Err(e) => return ToolResult::failure(e.to_string()),
        };
        ToolResult::from_dal(self.store.get_baggage_statistics(&flight_id).await)
    }
}

pub struct GetCargoDetailsTool {
    store: Arc<dyn OperationalStore>,
}

impl GetCargoDetailsTool {
    pub fn new(store: Arc<dyn OperationalStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for GetCargoDetailsTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: "get_cargo_details".to_string(),
            description: "Get cargo shipment details for a flight.".to_string(),
            parameters: vec![ToolParameter::required("flight_id", "flight identifier")],
        }
    }

    async fn execute(&self, params: &Value) -> ToolResult {
        let flight_id = match required_string(params, "flight_id") {
            Ok(v) => v,
            Err(e) => return ToolResult::failure(e.to_string()),
        };
        ToolResult::from_dal(self.store.get_cargo_details(&flight_id).await)
    }
}

pub struct GetFinanceFlightDataTool {
    store: Arc<dyn OperationalStore>,
}

impl GetFinanceFlightDataTool {
    pub fn new(store: Arc<dyn OperationalStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for GetFinanceFlightDataTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: "get_finance_flight_data".to_string(),
            description: "Get passenger and cargo data for revenue/cost calculations.".to_string(),
            parameters: vec![ToolParameter::required("flight_id", "flight identifier")],
        }
    }

    async fn execute(&self, params: &Value) -> ToolResult {
        let flight_id = match required_string(params, "flight_id") {
            Ok(v) => v,
            Err(e) => return ToolResult::failure(e.to_string()),
        };
        ToolResult::from_dal(self.store.get_finance_flight_data(&flight_id).await)
    }
}

/// Maps each agent to its authorized tool set (spec.md §6.4). The orchestrator
/// uses this to register only the permitted tools with each agent.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Builds the full tool set against one operational store.
    pub fn new(store: Arc<dyn OperationalStore>) -> Self {
        let mut tools: HashMap<String, Arc<dyn Tool>> = HashMap::new();
        let all: Vec<Arc<dyn Tool>> = vec![
            Arc::new(GetFlightTool::new(store.clone())),
            Arc::new(GetCrewDutyHoursTool::new(store.clone())),
            Arc::new(GetFlightCrewRosterTool::new(store.clone())),
            Arc::new(GetAircraftMaintenanceStatusTool::new(store.clone())),
            Arc::new(GetAircraftAvailabilityTool::new(store.clone())),
            Arc::new(GetWeatherTool::new(store.clone())),
            Arc::new(GetDownstreamConnectionsTool::new(store.clone())),
            Arc::new(GetPassengerStatisticsTool::new(store.clone())),
            Arc::new(GetBaggageStatisticsTool::new(store.clone())),
            Arc::new(GetCargoDetailsTool::new(store.clone())),
            Arc::new(GetFinanceFlightDataTool::new(store)),
        ];
        for tool in all {
            tools.insert(tool.metadata().name.clone(), tool);
        }
        Self { tools }
    }

    /// Authorized tool names per agent, per spec.md §6.4.
    pub fn authorized_tool_names(agent: AgentName) -> &'static [&'static str] {
        match agent {
            AgentName::CrewCompliance => &["get_flight", "get_crew_duty_hours", "get_flight_crew_roster"],
            AgentName::Maintenance => &["get_flight", "get_aircraft_maintenance_status", "get_aircraft_availability"],
            AgentName::Regulatory => {
                &["get_flight", "get_flight_crew_roster", "get_aircraft_maintenance_status", "get_weather"]
            }
            AgentName::Network => &["get_flight", "get_aircraft_availability", "get_downstream_connections"],
            AgentName::GuestExperience => &["get_flight", "get_downstream_connections", "get_baggage_statistics", "get_passenger_statistics"],
            AgentName::Cargo => &["get_flight", "get_cargo_details"],
            AgentName::Finance => &["get_flight", "get_downstream_connections", "get_cargo_details", "get_finance_flight_data"],
        }
    }

    /// Tool metadata visible to a given agent — the contract surface handed to
    /// the LLM (spec.md §4.2).
    pub fn metadata_for_agent(&self, agent: AgentName) -> Vec<ToolMetadata> {
        Self::authorized_tool_names(agent)
            .iter()
            .filter_map(|name| self.tools.get(*name))
            .map(|tool| tool.metadata())
            .collect()
    }

    pub async fn execute_tool(&self, agent: AgentName, name: &str, params: &Value) -> Result<ToolResult, ToolError> {
        if !Self::authorized_tool_names(agent).contains(&name) {
            return Err(ToolError::NotFound(name.to_string()));
        }
        let tool = self.tools.get(name).ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        Ok(tool.execute(params).await)
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry").field("tool_count", &self.tools.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skymarshal::dal::InMemoryOperationalStore;

    #[tokio::test]
    async fn unauthorized_tool_is_not_found() {
        let registry = ToolRegistry::new(Arc::new(InMemoryOperationalStore::new()));
        let err = registry
            .execute_tool(AgentName::Cargo, "get_crew_duty_hours", &Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[tokio::test]
    async fn missing_params_become_tool_failure_not_panic() {
        let registry = ToolRegistry::new(Arc::new(InMemoryOperationalStore::new()));
        let result = registry.execute_tool(AgentName::Cargo, "get_flight", &Value::Null).await.unwrap();
        assert!(!result.success);
    }
}
