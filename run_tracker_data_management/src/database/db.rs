use std::{path::Path, str::FromStr};

use async_trait::async_trait;
use const_format::concatcp;
use run_tracker_lib::{position_fix::PositionFix, session::Session};
use sqlx::{query, query_as, sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow}, Executor, Pool, Row, Sqlite, SqlitePool};

use crate::{DataManagerError, RunStore};

use super::constants::*;

const SESSION_COLUMNS: &str = concatcp!(
    SESSION_ID, ", ", START_TIME, ", ", END_TIME, ", ", DURATION, ", ", DISTANCE, ", ",
    AVG_SPEED, ", ", MAX_SPEED, ", ", ENCODED_PATH, ", ", ACTIVE
);

const RAW_POINT_COLUMNS: &str = concatcp!(
    LATITUDE, ", ", LONGITUDE, ", ", ALTITUDE, ", ", ACCURACY, ", ", SPEED, ", ", TIMESTAMP
);

#[derive(Clone)]
pub struct RunDatabase {
    pool: Pool<Sqlite>,
}

impl RunDatabase {
    pub async fn connect(path: &Path) -> Result<Self, DataManagerError> {
        // Create data dir if it doesn't exist
        if let Some(data_dir) = path.parent() {
            if !data_dir.as_os_str().is_empty() && !data_dir.exists() {
                std::fs::create_dir_all(data_dir)
                    .map_err(|_| DataManagerError::DataDirectory(format!("Failed to create data directory: {:?}", data_dir)))?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .foreign_keys(true)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options).await
            .map_err(|err| DataManagerError::Database(format!("Failed to connect to database {:?}: {err}", path)))?;

        let db = Self {
            pool
        };

        db.init().await?;

        tracing::info!("Opened run database at {:?}", path);

        Ok(db)
    }

    /// A private database living as long as the returned value.
    pub async fn in_memory() -> Result<Self, DataManagerError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|err| DataManagerError::Database(format!("Invalid in-memory database options: {err}")))?
            .foreign_keys(true);

        // Every connection to :memory: is its own database, so keep exactly one alive
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options).await
            .map_err(|err| DataManagerError::Database(format!("Failed to open in-memory database: {err}")))?;

        let db = Self {
            pool
        };

        db.init().await?;

        Ok(db)
    }

    pub async fn init(&self) -> Result<(), DataManagerError> {
        self.pool.execute(concatcp!("
            CREATE TABLE IF NOT EXISTS ", SESSIONS_TABLE_NAME, "(",
                SESSION_ID,   " TEXT PRIMARY KEY NOT NULL,",
                START_TIME,   " INTEGER NOT NULL,",
                END_TIME,     " INTEGER,",
                DURATION,     " INTEGER NOT NULL,",
                DISTANCE,     " REAL NOT NULL,",
                AVG_SPEED,    " REAL NOT NULL,",
                MAX_SPEED,    " REAL NOT NULL,",
                ENCODED_PATH, " TEXT NOT NULL,",
                ACTIVE,       " BOOLEAN NOT NULL);

            CREATE TABLE IF NOT EXISTS ", RAW_POINTS_TABLE_NAME, "(",
                POINT_ID,   " INTEGER PRIMARY KEY AUTOINCREMENT,",
                SESSION_ID, " TEXT NOT NULL,",
                LATITUDE,   " REAL NOT NULL,",
                LONGITUDE,  " REAL NOT NULL,",
                ALTITUDE,   " REAL NOT NULL,",
                ACCURACY,   " REAL NOT NULL,",
                SPEED,      " REAL NOT NULL,",
                TIMESTAMP,  " INTEGER NOT NULL,
                FOREIGN KEY(", SESSION_ID, ") REFERENCES ", SESSIONS_TABLE_NAME, "(", SESSION_ID, ") ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS RawPointsBySession ON ", RAW_POINTS_TABLE_NAME, "(", SESSION_ID, ", ", TIMESTAMP, ")"))
            .await
            .map_err(|err| DataManagerError::Database(format!("Failed to create tables: {err}")))
            .map(|_| ())
    }
}

fn raw_point_from_row(row: &SqliteRow) -> Result<PositionFix, sqlx::Error> {
    Ok(PositionFix {
        latitude: row.try_get(LATITUDE)?,
        longitude: row.try_get(LONGITUDE)?,
        altitude: row.try_get(ALTITUDE)?,
        accuracy: row.try_get(ACCURACY)?,
        speed: row.try_get(SPEED)?,
        timestamp: row.try_get(TIMESTAMP)?,
    })
}

#[async_trait]
impl RunStore for RunDatabase {
    async fn insert_session(&self, session: &Session) -> Result<(), DataManagerError> {
        query(concatcp!("
            INSERT INTO ", SESSIONS_TABLE_NAME, "(", SESSION_COLUMNS, ")
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"))
                .bind(&session.session_id)
                .bind(session.start_time)
                .bind(session.end_time)
                .bind(session.duration)
                .bind(session.distance)
                .bind(session.avg_speed)
                .bind(session.max_speed)
                .bind(&session.encoded_path)
                .bind(session.active)
                .execute(&self.pool).await
                .map_err(|err| DataManagerError::Database(format!("Failed to insert session {}: {err}", session.session_id)))
                .map(|_| ())
    }

    async fn update_session(&self, session: &Session) -> Result<(), DataManagerError> {
        let result = query(concatcp!("
            UPDATE ", SESSIONS_TABLE_NAME, " SET ",
                START_TIME, " = ?2, ",
                END_TIME, " = ?3, ",
                DURATION, " = ?4, ",
                DISTANCE, " = ?5, ",
                AVG_SPEED, " = ?6, ",
                MAX_SPEED, " = ?7, ",
                ENCODED_PATH, " = ?8, ",
                ACTIVE, " = ?9
            WHERE ", SESSION_ID, " = ?1"))
                .bind(&session.session_id)
                .bind(session.start_time)
                .bind(session.end_time)
                .bind(session.duration)
                .bind(session.distance)
                .bind(session.avg_speed)
                .bind(session.max_speed)
                .bind(&session.encoded_path)
                .bind(session.active)
                .execute(&self.pool).await
                .map_err(|err| DataManagerError::Database(format!("Failed to update session {}: {err}", session.session_id)))?;

        if result.rows_affected() == 0 {
            return Err(DataManagerError::MissingSession(session.session_id.clone()));
        }

        Ok(())
    }

    async fn get_active_session(&self) -> Result<Option<Session>, DataManagerError> {
        query_as::<_, Session>(concatcp!(
            "SELECT ", SESSION_COLUMNS, " FROM ", SESSIONS_TABLE_NAME,
            " WHERE ", ACTIVE, " = 1 ORDER BY ", START_TIME, " DESC LIMIT 1"))
            .fetch_optional(&self.pool).await
            .map_err(|err| DataManagerError::Database(format!("Failed to get active session: {err}")))
    }

    async fn get_session_by_id(&self, session_id: &str) -> Result<Option<Session>, DataManagerError> {
        query_as::<_, Session>(concatcp!("SELECT ", SESSION_COLUMNS, " FROM ", SESSIONS_TABLE_NAME, " WHERE ", SESSION_ID, " = ?1"))
            .bind(session_id)
            .fetch_optional(&self.pool).await
            .map_err(|err| DataManagerError::Database(format!("Failed to get session {session_id}: {err}")))
    }

    async fn insert_raw_point(&self, session_id: &str, fix: &PositionFix) -> Result<(), DataManagerError> {
        query(concatcp!("
            INSERT INTO ", RAW_POINTS_TABLE_NAME, "(", POINT_ID, ", ", SESSION_ID, ", ", RAW_POINT_COLUMNS, ")
            VALUES (NULL, ?1, ?2, ?3, ?4, ?5, ?6, ?7)"))
                .bind(session_id)
                .bind(fix.latitude)
                .bind(fix.longitude)
                .bind(fix.altitude)
                .bind(fix.accuracy)
                .bind(fix.speed)
                .bind(fix.timestamp)
                .execute(&self.pool).await
                .map_err(|err| DataManagerError::Database(format!("Failed to insert raw point for session {session_id}: {err}")))
                .map(|_| ())
    }

    async fn get_raw_points_for_session(&self, session_id: &str) -> Result<Vec<PositionFix>, DataManagerError> {
        query(concatcp!(
            "SELECT ", RAW_POINT_COLUMNS, " FROM ", RAW_POINTS_TABLE_NAME,
            " WHERE ", SESSION_ID, " = ?1 ORDER BY ", TIMESTAMP, " ASC, ", POINT_ID, " ASC"))
            .bind(session_id)
            .fetch_all(&self.pool).await
            .and_then(|rows| rows.iter().map(raw_point_from_row).collect())
            .map_err(|err| DataManagerError::Database(format!("Failed to get raw points for session {session_id}: {err}")))
    }

    async fn delete_raw_points_for_session(&self, session_id: &str) -> Result<(), DataManagerError> {
        query(concatcp!("DELETE FROM ", RAW_POINTS_TABLE_NAME, " WHERE ", SESSION_ID, " = ?1"))
            .bind(session_id)
            .execute(&self.pool).await
            .map_err(|err| DataManagerError::Database(format!("Failed to delete raw points for session {session_id}: {err}")))
            .map(|_| ())
    }

    async fn list_finished_sessions(&self) -> Result<Vec<Session>, DataManagerError> {
        query_as::<_, Session>(concatcp!(
            "SELECT ", SESSION_COLUMNS, " FROM ", SESSIONS_TABLE_NAME,
            " WHERE ", ACTIVE, " = 0 ORDER BY ", START_TIME, " DESC"))
            .fetch_all(&self.pool).await
            .map_err(|err| DataManagerError::Database(format!("Failed to list sessions: {err}")))
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), DataManagerError> {
        query(concatcp!("DELETE FROM ", SESSIONS_TABLE_NAME, " WHERE ", SESSION_ID, " = ?1"))
            .bind(session_id)
            .execute(&self.pool).await
            .map_err(|err| DataManagerError::Database(format!("Failed to delete session {session_id}: {err}")))
            .map(|_| ())
    }
}
