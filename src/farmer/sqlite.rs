//! SQLite-backed farmer store.

use super::{
    ConversationEntry, FarmerContext, FarmerDataSource, FarmerProfile, Field, HumidityUpdate,
    IrrigationLog, IrrigationStatus, NewFarmer, NewField, NewIrrigation, TriggerType,
};
use crate::error::{AgribotError, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Farmer data in SQLite.
pub struct SqliteFarmerStore {
    conn: Mutex<Connection>,
}

// Fixed-width RFC 3339 so text ordering matches time ordering.
fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(idx: usize, value: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_enum<T: std::str::FromStr<Err = AgribotError>>(idx: usize, value: String) -> rusqlite::Result<T> {
    value
        .parse()
        .map_err(|e: AgribotError| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn farmer_from_row(row: &Row<'_>) -> rusqlite::Result<FarmerProfile> {
    Ok(FarmerProfile {
        id: row.get(0)?,
        name: row.get(1)?,
        phone: row.get(2)?,
        location: row.get(3)?,
        created_at: parse_time(4, row.get(4)?)?,
    })
}

const FIELD_COLUMNS: &str = "id, user_id, name, crop, area, last_irrigated, current_humidity, \
     threshold_min, threshold_max, auto_irrigation, irrigation_duration";

fn field_from_row(row: &Row<'_>) -> rusqlite::Result<Field> {
    let last_irrigated: Option<String> = row.get(5)?;
    Ok(Field {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        crop: row.get(3)?,
        area: row.get(4)?,
        last_irrigated: last_irrigated.map(|t| parse_time(5, t)).transpose()?,
        current_humidity: row.get(6)?,
        threshold_min: row.get(7)?,
        threshold_max: row.get(8)?,
        auto_irrigation: row.get(9)?,
        irrigation_duration: row.get(10)?,
    })
}

const IRRIGATION_COLUMNS: &str =
    "id, user_id, field, crop, trigger_type, humidity, duration, timestamp, status";

fn irrigation_from_row(row: &Row<'_>) -> rusqlite::Result<IrrigationLog> {
    Ok(IrrigationLog {
        id: row.get(0)?,
        user_id: row.get(1)?,
        field: row.get(2)?,
        crop: row.get(3)?,
        trigger_type: parse_enum(4, row.get(4)?)?,
        humidity: row.get(5)?,
        duration: row.get(6)?,
        timestamp: parse_time(7, row.get(7)?)?,
        status: parse_enum(8, row.get(8)?)?,
    })
}

fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<ConversationEntry> {
    let sources: String = row.get(4)?;
    Ok(ConversationEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        query: row.get(2)?,
        response: row.get(3)?,
        sources: serde_json::from_str(&sources)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?,
        created_at: parse_time(5, row.get(5)?)?,
    })
}

impl SqliteFarmerStore {
    /// Open (or create) the farmer database at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::create_schema(&conn)?;

        info!("Opened farmer database at {:?}", path);
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::create_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn create_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS farmers (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                phone TEXT,
                location TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS fields (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL REFERENCES farmers(id),
                name TEXT NOT NULL,
                crop TEXT,
                area REAL,
                last_irrigated TEXT,
                current_humidity REAL NOT NULL,
                threshold_min REAL NOT NULL,
                threshold_max REAL NOT NULL,
                auto_irrigation INTEGER NOT NULL DEFAULT 1,
                irrigation_duration INTEGER NOT NULL DEFAULT 10
            );

            CREATE INDEX IF NOT EXISTS idx_fields_user ON fields(user_id);

            CREATE TABLE IF NOT EXISTS irrigation_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                field TEXT NOT NULL,
                crop TEXT,
                trigger_type TEXT NOT NULL,
                humidity REAL NOT NULL,
                duration INTEGER NOT NULL,
                timestamp TEXT NOT NULL,
                status TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_irrigation_user_time
                ON irrigation_logs(user_id, timestamp);

            CREATE TABLE IF NOT EXISTS conversations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                query TEXT NOT NULL,
                response TEXT NOT NULL,
                sources TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_conversations_user_time
                ON conversations(user_id, created_at);
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| AgribotError::Config(format!("Farmer database lock poisoned: {}", e)))
    }

    /// Register a farmer.
    pub fn add_farmer(&self, farmer: NewFarmer) -> Result<FarmerProfile> {
        if farmer.name.trim().is_empty() {
            return Err(AgribotError::InvalidInput("Farmer name is required".to_string()));
        }

        let profile = FarmerProfile {
            id: farmer.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            name: farmer.name,
            phone: farmer.phone,
            location: farmer.location,
            created_at: Utc::now(),
        };

        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO farmers (id, name, phone, location, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                profile.id,
                profile.name,
                profile.phone,
                profile.location,
                format_time(&profile.created_at)
            ],
        )?;
        if inserted == 0 {
            return Err(AgribotError::InvalidInput(format!(
                "Farmer {} already exists",
                profile.id
            )));
        }

        info!("Registered farmer {}", profile.id);
        Ok(profile)
    }

    pub fn get_farmer(&self, user_id: &str) -> Result<Option<FarmerProfile>> {
        let conn = self.lock()?;
        let farmer = conn
            .query_row(
                "SELECT id, name, phone, location, created_at FROM farmers WHERE id = ?1",
                params![user_id],
                farmer_from_row,
            )
            .optional()?;
        Ok(farmer)
    }

    fn require_farmer(conn: &Connection, user_id: &str) -> Result<()> {
        let exists: bool = conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM farmers WHERE id = ?1)",
            params![user_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(AgribotError::DataUnavailable(format!(
                "No farmer with id {}",
                user_id
            )));
        }
        Ok(())
    }

    /// Create a field for an existing farmer.
    pub fn add_field(&self, field: NewField) -> Result<Field> {
        field.validate()?;

        let conn = self.lock()?;
        Self::require_farmer(&conn, &field.user_id)?;

        conn.execute(
            "INSERT INTO fields (user_id, name, crop, area, current_humidity, threshold_min,
                                 threshold_max, auto_irrigation, irrigation_duration)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                field.user_id,
                field.name,
                field.crop,
                field.area,
                field.current_humidity,
                field.threshold_min,
                field.threshold_max,
                field.auto_irrigation,
                field.irrigation_duration
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!("Created field {} for {}", id, field.user_id);

        Self::field_by_id(&conn, id)?
            .ok_or_else(|| AgribotError::DataUnavailable(format!("Field {} not found", id)))
    }

    fn field_by_id(conn: &Connection, id: i64) -> Result<Option<Field>> {
        let field = conn
            .query_row(
                &format!("SELECT {} FROM fields WHERE id = ?1", FIELD_COLUMNS),
                params![id],
                field_from_row,
            )
            .optional()?;
        Ok(field)
    }

    pub fn get_field(&self, id: i64) -> Result<Option<Field>> {
        let conn = self.lock()?;
        Self::field_by_id(&conn, id)
    }

    /// Fields of one farmer, in creation order.
    pub fn list_fields(&self, user_id: &str) -> Result<Vec<Field>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM fields WHERE user_id = ?1 ORDER BY id",
            FIELD_COLUMNS
        ))?;
        let fields = stmt
            .query_map(params![user_id], field_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(fields)
    }

    fn insert_irrigation(
        conn: &Connection,
        run: &NewIrrigation,
        timestamp: DateTime<Utc>,
    ) -> Result<IrrigationLog> {
        conn.execute(
            "INSERT INTO irrigation_logs (user_id, field, crop, trigger_type, humidity, duration,
                                          timestamp, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                run.user_id,
                run.field,
                run.crop,
                run.trigger_type.as_str(),
                run.humidity,
                run.duration,
                format_time(&timestamp),
                run.status.as_str()
            ],
        )?;

        Ok(IrrigationLog {
            id: conn.last_insert_rowid(),
            user_id: run.user_id.clone(),
            field: run.field.clone(),
            crop: run.crop.clone(),
            trigger_type: run.trigger_type,
            humidity: run.humidity,
            duration: run.duration,
            timestamp,
            status: run.status,
        })
    }

    /// Record an irrigation run for an existing farmer.
    pub fn log_irrigation(&self, run: NewIrrigation) -> Result<IrrigationLog> {
        if run.field.trim().is_empty() {
            return Err(AgribotError::InvalidInput("Field name is required".to_string()));
        }
        if !run.humidity.is_finite() {
            return Err(AgribotError::InvalidInput("Humidity must be a number".to_string()));
        }

        let conn = self.lock()?;
        Self::require_farmer(&conn, &run.user_id)?;
        Self::insert_irrigation(&conn, &run, Utc::now())
    }

    /// The `limit` most recent irrigation runs of a farmer, newest first.
    pub fn recent_irrigation(&self, user_id: &str, limit: usize) -> Result<Vec<IrrigationLog>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM irrigation_logs WHERE user_id = ?1
             ORDER BY timestamp DESC, id DESC LIMIT ?2",
            IRRIGATION_COLUMNS
        ))?;
        let logs = stmt
            .query_map(params![user_id, limit as i64], irrigation_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(logs)
    }

    /// Store a humidity reading. When auto irrigation is on and the reading is
    /// below `threshold_min`, the field is irrigated and the run is logged.
    #[instrument(skip(self))]
    pub fn update_humidity(&self, field_id: i64, humidity: f64) -> Result<HumidityUpdate> {
        if !humidity.is_finite() {
            return Err(AgribotError::InvalidInput("Humidity must be a number".to_string()));
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let mut field = Self::field_by_id(&tx, field_id)?
            .ok_or_else(|| AgribotError::DataUnavailable(format!("Field {} not found", field_id)))?;
        field.current_humidity = humidity;

        let mut irrigation = None;
        if field.auto_irrigation && humidity < field.threshold_min {
            let now = Utc::now();
            field.last_irrigated = Some(now);

            let run = NewIrrigation {
                user_id: field.user_id.clone(),
                field: field.name.clone(),
                crop: field.crop.clone(),
                trigger_type: TriggerType::Auto,
                humidity,
                duration: field.irrigation_duration,
                status: IrrigationStatus::Completed,
            };
            irrigation = Some(Self::insert_irrigation(&tx, &run, now)?);
            info!(
                "Auto irrigation triggered for {} (humidity {}%)",
                field.name, humidity
            );
        }

        tx.execute(
            "UPDATE fields SET current_humidity = ?1, last_irrigated = ?2 WHERE id = ?3",
            params![
                field.current_humidity,
                field.last_irrigated.as_ref().map(format_time),
                field.id
            ],
        )?;
        tx.commit()?;

        Ok(HumidityUpdate { field, irrigation })
    }

    /// Append an answered question to the farmer's history.
    pub fn log_conversation(
        &self,
        user_id: &str,
        query: &str,
        response: &str,
        sources: &[String],
    ) -> Result<ConversationEntry> {
        let created_at = Utc::now();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO conversations (user_id, query, response, sources, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user_id,
                query,
                response,
                serde_json::to_string(sources)?,
                format_time(&created_at)
            ],
        )?;

        Ok(ConversationEntry {
            id: conn.last_insert_rowid(),
            user_id: user_id.to_string(),
            query: query.to_string(),
            response: response.to_string(),
            sources: sources.to_vec(),
            created_at,
        })
    }

    /// The `limit` most recent conversations of a farmer, newest first.
    pub fn conversation_history(&self, user_id: &str, limit: usize) -> Result<Vec<ConversationEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, query, response, sources, created_at FROM conversations
             WHERE user_id = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2",
        )?;
        let entries = stmt
            .query_map(params![user_id, limit as i64], conversation_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }
}

#[async_trait]
impl FarmerDataSource for SqliteFarmerStore {
    async fn farmer_context(&self, user_id: &str, history_limit: usize) -> Result<FarmerContext> {
        let profile = self.get_farmer(user_id)?.ok_or_else(|| {
            AgribotError::DataUnavailable(format!("No farmer with id {}", user_id))
        })?;

        Ok(FarmerContext {
            profile,
            fields: self.list_fields(user_id)?,
            irrigation_history: self.recent_irrigation(user_id, history_limit)?,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn seeded_store() -> SqliteFarmerStore {
        let store = SqliteFarmerStore::in_memory().unwrap();
        store
            .add_farmer(NewFarmer {
                id: Some("farmer-1".to_string()),
                name: "Ramesh Patil".to_string(),
                phone: None,
                location: Some("Nashik".to_string()),
            })
            .unwrap();
        store.add_field(new_field("farmer-1", "Grape block", 30.0)).unwrap();
        store
    }

    pub(crate) fn new_field(user_id: &str, name: &str, threshold_min: f64) -> NewField {
        NewField {
            user_id: user_id.to_string(),
            name: name.to_string(),
            crop: Some("grapes".to_string()),
            area: Some(4000.0),
            current_humidity: 45.0,
            threshold_min,
            threshold_max: 70.0,
            auto_irrigation: true,
            irrigation_duration: 15,
        }
    }

    fn manual_run(field: &str, humidity: f64) -> NewIrrigation {
        NewIrrigation {
            user_id: "farmer-1".to_string(),
            field: field.to_string(),
            crop: None,
            trigger_type: TriggerType::Manual,
            humidity,
            duration: 20,
            status: IrrigationStatus::Completed,
        }
    }

    #[test]
    fn test_farmer_round_trip() {
        let store = seeded_store();
        let farmer = store.get_farmer("farmer-1").unwrap().unwrap();
        assert_eq!(farmer.name, "Ramesh Patil");
        assert_eq!(farmer.location.as_deref(), Some("Nashik"));
        assert!(store.get_farmer("nobody").unwrap().is_none());

        let duplicate = store.add_farmer(NewFarmer {
            id: Some("farmer-1".to_string()),
            name: "Someone else".to_string(),
            ..Default::default()
        });
        assert!(matches!(duplicate, Err(AgribotError::InvalidInput(_))));
    }

    #[test]
    fn test_field_requires_known_farmer() {
        let store = seeded_store();
        let err = store.add_field(new_field("ghost", "Plot", 30.0)).unwrap_err();
        assert!(matches!(err, AgribotError::DataUnavailable(_)));

        let fields = store.list_fields("farmer-1").unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].irrigation_duration, 15);
        assert!(fields[0].last_irrigated.is_none());
    }

    #[test]
    fn test_recent_irrigation_newest_first_and_limited() {
        let store = seeded_store();
        for i in 0..12 {
            store.log_irrigation(manual_run(&format!("run-{i}"), 30.0)).unwrap();
        }

        let recent = store.recent_irrigation("farmer-1", 10).unwrap();
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0].field, "run-11");
        assert_eq!(recent[9].field, "run-2");
        assert!(store.recent_irrigation("other", 10).unwrap().is_empty());
    }

    #[test]
    fn test_low_humidity_triggers_auto_irrigation() {
        let store = seeded_store();
        let field_id = store.list_fields("farmer-1").unwrap()[0].id;

        let update = store.update_humidity(field_id, 25.0).unwrap();
        let run = update.irrigation.expect("auto irrigation should run");
        assert_eq!(run.trigger_type, TriggerType::Auto);
        assert_eq!(run.duration, 15);
        assert_eq!(run.field, "Grape block");
        assert_eq!(update.field.last_irrigated, Some(run.timestamp));

        let stored = store.get_field(field_id).unwrap().unwrap();
        assert_eq!(stored.current_humidity, 25.0);
        assert!(stored.last_irrigated.is_some());
        assert_eq!(store.recent_irrigation("farmer-1", 10).unwrap().len(), 1);
    }

    #[test]
    fn test_humidity_above_threshold_only_updates_reading() {
        let store = seeded_store();
        let field_id = store.list_fields("farmer-1").unwrap()[0].id;

        let update = store.update_humidity(field_id, 30.0).unwrap();
        assert!(update.irrigation.is_none());
        assert_eq!(update.field.current_humidity, 30.0);
        assert!(store.recent_irrigation("farmer-1", 10).unwrap().is_empty());

        assert!(matches!(
            store.update_humidity(9999, 10.0),
            Err(AgribotError::DataUnavailable(_))
        ));
    }

    #[test]
    fn test_conversation_history() {
        let store = seeded_store();
        store
            .log_conversation("farmer-1", "first?", "one", &["a.pdf".to_string()])
            .unwrap();
        store.log_conversation("farmer-1", "second?", "two", &[]).unwrap();

        let history = store.conversation_history("farmer-1", 10).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].query, "second?");
        assert_eq!(history[1].sources, vec!["a.pdf".to_string()]);
        assert_eq!(store.conversation_history("farmer-1", 1).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_farmer_context() {
        let store = seeded_store();
        store.log_irrigation(manual_run("Grape block", 28.0)).unwrap();

        let context = store.farmer_context("farmer-1", 10).await.unwrap();
        assert_eq!(context.profile.name, "Ramesh Patil");
        assert_eq!(context.fields.len(), 1);
        assert_eq!(context.irrigation_history.len(), 1);

        let err = store.farmer_context("ghost", 10).await.unwrap_err();
        assert!(matches!(err, AgribotError::DataUnavailable(_)));
    }
}
