use std::collections::BTreeMap;
use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use prism_core::time::now_unix_millis;
use prism_core::{
    ChannelData, ConstraintDataPoint, ConstraintType, SessionDataExport, SessionMetrics, Wavelength,
};

use crate::error::{Result, StoreError};
use crate::schema;

/// Row counts for status output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub sessions: usize,
    pub constraints: usize,
    pub channels: usize,
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // --- Metadata ---

    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM metadata WHERE key = ?1")?;
        let result = stmt.query_row([key], |row| row.get(0)).optional()?;
        Ok(result)
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    // --- Sessions ---

    /// Append one export. Returns the store's row id for it.
    ///
    /// Sessions are never overwritten: the engine's merge decides which
    /// occurrence of a constraint wins, so every submission is kept in order.
    pub fn save_session(&self, export: &SessionDataExport) -> Result<Uuid> {
        let tx = self.conn.unchecked_transaction()?;
        let row_id = Self::insert_session(&tx, export)?;
        tx.commit()?;
        Ok(row_id)
    }

    /// Insert one export's rows on `conn`. The caller owns the transaction.
    pub(crate) fn insert_session(conn: &Connection, export: &SessionDataExport) -> Result<Uuid> {
        let row_id = Uuid::new_v4();

        conn.execute(
            "INSERT INTO sessions (id, session_id, channel, timestamp, version, metrics_json, imported_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                row_id.to_string(),
                export.session_id,
                export.session_name.as_str(),
                export.timestamp as i64,
                export.version,
                serde_json::to_string(&export.metrics)?,
                now_unix_millis() as i64,
            ],
        )?;

        {
            let mut stmt = conn.prepare(
                "INSERT INTO constraints (session_row, id, constraint_type, channel, dimensions_json,
                                          severity, weight, label, entities_json, metadata_json, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for c in &export.constraints {
                stmt.execute(params![
                    row_id.to_string(),
                    c.id,
                    c.constraint_type.as_str(),
                    c.channel.as_str(),
                    serde_json::to_string(&c.dimensions)?,
                    c.severity,
                    c.weight,
                    c.label,
                    serde_json::to_string(&c.entities)?,
                    serde_json::to_string(&c.metadata)?,
                    c.timestamp as i64,
                ])?;
            }
        }

        tracing::debug!(
            session = %export.session_id,
            channel = %export.session_name,
            constraints = export.constraints.len(),
            "session saved"
        );
        Ok(row_id)
    }

    /// Every stored export, in the order it was saved.
    pub fn load_sessions(&self) -> Result<Vec<SessionDataExport>> {
        self.load_sessions_where(None)
    }

    pub fn load_sessions_for(&self, channel: Wavelength) -> Result<Vec<SessionDataExport>> {
        self.load_sessions_where(Some(channel))
    }

    fn load_sessions_where(&self, channel: Option<Wavelength>) -> Result<Vec<SessionDataExport>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_id, channel, timestamp, version, metrics_json
             FROM sessions WHERE (?1 IS NULL OR channel = ?1) ORDER BY rowid",
        )?;

        let rows: Vec<(String, String, String, i64, String, String)> = stmt
            .query_map([channel.map(|c| c.as_str())], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            })?
            .collect::<std::result::Result<_, _>>()?;

        let mut exports = Vec::with_capacity(rows.len());
        for (row_id, session_id, channel, timestamp, version, metrics_json) in rows {
            let metrics: SessionMetrics = serde_json::from_str(&metrics_json)?;
            exports.push(SessionDataExport {
                session_id,
                session_name: parse_channel(&channel)?,
                timestamp: timestamp.max(0) as u64,
                version,
                constraints: self.load_constraints(&row_id)?,
                metrics,
            });
        }
        Ok(exports)
    }

    fn load_constraints(&self, session_row: &str) -> Result<Vec<ConstraintDataPoint>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, constraint_type, channel, dimensions_json, severity, weight, label,
                    entities_json, metadata_json, timestamp
             FROM constraints WHERE session_row = ?1 ORDER BY seq",
        )?;

        #[allow(clippy::type_complexity)]
        let rows: Vec<(String, String, String, String, f64, f64, String, String, String, i64)> =
            stmt.query_map([session_row], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                    row.get(8)?,
                    row.get(9)?,
                ))
            })?
            .collect::<std::result::Result<_, _>>()?;

        rows.into_iter()
            .map(
                |(id, ty, channel, dims, severity, weight, label, entities, metadata, ts)| {
                    Ok(ConstraintDataPoint {
                        id,
                        constraint_type: ConstraintType::from_str_lossy(&ty),
                        channel: parse_channel(&channel)?,
                        dimensions: serde_json::from_str(&dims)?,
                        severity,
                        weight,
                        label,
                        entities: serde_json::from_str::<BTreeMap<_, _>>(&entities)?,
                        metadata: serde_json::from_str::<BTreeMap<_, _>>(&metadata)?,
                        timestamp: ts.max(0) as u64,
                    })
                },
            )
            .collect()
    }

    // --- Channel payloads ---

    /// Insert or replace the payload for its channel.
    pub fn put_channel_data(&self, data: &ChannelData) -> Result<()> {
        let channel = data.wavelength();
        self.conn.execute(
            "INSERT OR REPLACE INTO channel_payloads (channel, payload_json, updated_at)
             VALUES (?1, ?2, ?3)",
            params![
                channel.as_str(),
                serde_json::to_string(data)?,
                now_unix_millis() as i64
            ],
        )?;
        tracing::debug!(%channel, "channel payload stored");
        Ok(())
    }

    pub fn get_channel_data(&self, channel: Wavelength) -> Result<Option<ChannelData>> {
        let mut stmt = self
            .conn
            .prepare("SELECT payload_json FROM channel_payloads WHERE channel = ?1")?;
        let json: Option<String> = stmt
            .query_row([channel.as_str()], |row| row.get(0))
            .optional()?;
        match json {
            Some(j) => Ok(Some(serde_json::from_str(&j)?)),
            None => Ok(None),
        }
    }

    /// All stored payloads, in wavelength order.
    pub fn load_channel_data(&self) -> Result<Vec<ChannelData>> {
        let mut stmt = self
            .conn
            .prepare("SELECT payload_json FROM channel_payloads")?;
        let rows: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<_, _>>()?;

        let mut payloads = rows
            .iter()
            .map(|j| serde_json::from_str::<ChannelData>(j).map_err(StoreError::from))
            .collect::<Result<Vec<_>>>()?;
        payloads.sort_by_key(ChannelData::wavelength);
        Ok(payloads)
    }

    // --- Maintenance ---

    pub fn stats(&self) -> Result<StoreStats> {
        let count = |table: &str| -> Result<usize> {
            let n: i64 =
                self.conn
                    .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            Ok(n as usize)
        };
        Ok(StoreStats {
            sessions: count("sessions")?,
            constraints: count("constraints")?,
            channels: count("channel_payloads")?,
        })
    }

    /// Drop every session, constraint and payload. Metadata survives.
    pub fn clear(&self) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch(
            "DELETE FROM constraints; DELETE FROM sessions; DELETE FROM channel_payloads;",
        )?;
        tx.commit()?;
        tracing::info!("store cleared");
        Ok(())
    }
}

fn parse_channel(s: &str) -> Result<Wavelength> {
    s.parse::<Wavelength>().map_err(StoreError::InvalidData)
}
