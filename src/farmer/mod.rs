//! Farmer records: profiles, fields, irrigation events and conversation history.
//!
//! The answering path only needs [`FarmerDataSource`]; everything else is the
//! bookkeeping behind the field and irrigation endpoints.

pub(crate) mod sqlite;

pub use sqlite::SqliteFarmerStore;

use crate::error::{AgribotError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A registered farmer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmerProfile {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for registering a farmer. A missing id gets a fresh UUID.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFarmer {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

/// A monitored field with its soil-humidity thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    pub crop: Option<String>,
    /// Square metres.
    pub area: Option<f64>,
    pub last_irrigated: Option<DateTime<Utc>>,
    pub current_humidity: f64,
    pub threshold_min: f64,
    pub threshold_max: f64,
    pub auto_irrigation: bool,
    /// Minutes per irrigation run.
    pub irrigation_duration: u32,
}

fn default_auto_irrigation() -> bool {
    true
}

fn default_irrigation_duration() -> u32 {
    10
}

/// Input for creating a field.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewField {
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub crop: Option<String>,
    #[serde(default)]
    pub area: Option<f64>,
    pub current_humidity: f64,
    pub threshold_min: f64,
    pub threshold_max: f64,
    #[serde(default = "default_auto_irrigation")]
    pub auto_irrigation: bool,
    #[serde(default = "default_irrigation_duration")]
    pub irrigation_duration: u32,
}

impl NewField {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AgribotError::InvalidInput("Field name is required".to_string()));
        }
        if !self.current_humidity.is_finite()
            || !self.threshold_min.is_finite()
            || !self.threshold_max.is_finite()
        {
            return Err(AgribotError::InvalidInput(
                "Humidity values must be numbers".to_string(),
            ));
        }
        if self.threshold_min > self.threshold_max {
            return Err(AgribotError::InvalidInput(format!(
                "thresholdMin ({}) is above thresholdMax ({})",
                self.threshold_min, self.threshold_max
            )));
        }
        Ok(())
    }
}

/// What started an irrigation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerType {
    Auto,
    Manual,
}

/// Outcome of an irrigation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IrrigationStatus {
    #[default]
    Completed,
    InProgress,
    Failed,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerType::Auto => "auto",
            TriggerType::Manual => "manual",
        }
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerType {
    type Err = AgribotError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auto" => Ok(TriggerType::Auto),
            "manual" => Ok(TriggerType::Manual),
            other => Err(AgribotError::InvalidInput(format!(
                "Unknown trigger type: {}",
                other
            ))),
        }
    }
}

impl IrrigationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IrrigationStatus::Completed => "completed",
            IrrigationStatus::InProgress => "in-progress",
            IrrigationStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for IrrigationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IrrigationStatus {
    type Err = AgribotError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "completed" => Ok(IrrigationStatus::Completed),
            "in-progress" => Ok(IrrigationStatus::InProgress),
            "failed" => Ok(IrrigationStatus::Failed),
            other => Err(AgribotError::InvalidInput(format!(
                "Unknown irrigation status: {}",
                other
            ))),
        }
    }
}

/// A recorded irrigation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IrrigationLog {
    pub id: i64,
    pub user_id: String,
    /// Field name.
    pub field: String,
    pub crop: Option<String>,
    pub trigger_type: TriggerType,
    pub humidity: f64,
    /// Minutes.
    pub duration: u32,
    pub timestamp: DateTime<Utc>,
    pub status: IrrigationStatus,
}

/// Input for logging an irrigation run.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewIrrigation {
    pub user_id: String,
    pub field: String,
    #[serde(default)]
    pub crop: Option<String>,
    pub trigger_type: TriggerType,
    pub humidity: f64,
    pub duration: u32,
    #[serde(default)]
    pub status: IrrigationStatus,
}

/// Result of a humidity reading: the updated field, plus the run it triggered, if any.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HumidityUpdate {
    pub field: Field,
    pub irrigation: Option<IrrigationLog>,
}

/// Everything the assistant knows about a farmer when answering.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmerContext {
    pub profile: FarmerProfile,
    pub fields: Vec<Field>,
    /// Newest first.
    pub irrigation_history: Vec<IrrigationLog>,
}

/// One answered question.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationEntry {
    pub id: i64,
    pub user_id: String,
    pub query: String,
    pub response: String,
    pub sources: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Read-only access to farmer data for the response assembler.
#[async_trait]
pub trait FarmerDataSource: Send + Sync {
    /// Profile, fields and the `history_limit` most recent irrigation runs.
    ///
    /// Fails with [`AgribotError::DataUnavailable`] for an unknown user.
    async fn farmer_context(&self, user_id: &str, history_limit: usize) -> Result<FarmerContext>;
}
