use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use tuin_common::{Garden, LogbookEntry, Plant, PlantBed, Role, Task, User, UserStatus};

use super::models::*;

/// Async-safe handle to the garden database.
///
/// Wraps `TuinDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, keeping synchronous SQLite
/// I/O off the async worker threads.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<TuinDb>>,
}

impl DbHandle {
    pub fn new(db: TuinDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R, E>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&TuinDb) -> Result<R, E> + Send + 'static,
        R: Send + 'static,
        E: From<anyhow::Error> + Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db
                .lock()
                .map_err(|e| E::from(anyhow::anyhow!("DB lock poisoned: {}", e)))?;
            f(&guard)
        })
        .await
        .map_err(|e| E::from(anyhow::anyhow!("DB task panicked: {}", e)))?
    }

    /// Acquire the database mutex synchronously. Only for startup and tests.
    pub fn lock_sync(&self) -> Result<std::sync::MutexGuard<'_, TuinDb>> {
        self.inner
            .lock()
            .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))
    }
}

pub struct TuinDb {
    conn: Connection,
}

const GARDEN_COLUMNS: &str = "id, name, description, location, total_area, length, width, garden_type, \
     maintenance_level, soil_type, watering_system, established_date, notes, is_active, created_at, updated_at";

const PLANT_BED_COLUMNS: &str = "id, garden_id, letter_code, name, location, size, soil_type, sun_exposure, \
     description, season_year, is_active, created_at, updated_at";

const PLANT_COLUMNS: &str = "id, plant_bed_id, name, scientific_name, variety, color, height, plants_per_sqm, \
     sun_preference, planting_date, expected_harvest_date, status, notes, care_instructions, \
     watering_frequency, created_at, updated_at";

const LOGBOOK_COLUMNS: &str =
    "l.id, l.plant_bed_id, l.plant_id, l.entry_date, l.notes, l.photo_url, l.created_at, l.updated_at";

const TASK_COLUMNS: &str = "t.id, t.plant_id, t.plant_bed_id, t.title, t.description, t.due_date, t.completed, \
     t.completed_at, t.priority, t.task_type, t.estimated_minutes, t.notes, t.created_at, t.updated_at";

const USER_COLUMNS: &str =
    "id, email, full_name, role, status, force_password_change, is_active, created_at, updated_at";

impl TuinDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS gardens (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    description TEXT,
                    location TEXT NOT NULL,
                    total_area TEXT,
                    length TEXT,
                    width TEXT,
                    garden_type TEXT,
                    maintenance_level TEXT,
                    soil_type TEXT,
                    watering_system TEXT,
                    established_date TEXT,
                    notes TEXT,
                    is_active INTEGER NOT NULL DEFAULT 1,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS plant_beds (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    garden_id INTEGER NOT NULL REFERENCES gardens(id) ON DELETE CASCADE,
                    letter_code TEXT NOT NULL,
                    name TEXT NOT NULL,
                    location TEXT,
                    size TEXT,
                    soil_type TEXT,
                    sun_exposure TEXT,
                    description TEXT,
                    season_year INTEGER,
                    is_active INTEGER NOT NULL DEFAULT 1,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                    UNIQUE(garden_id, letter_code)
                );

                CREATE TABLE IF NOT EXISTS plants (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    plant_bed_id INTEGER NOT NULL REFERENCES plant_beds(id) ON DELETE CASCADE,
                    name TEXT NOT NULL,
                    scientific_name TEXT,
                    variety TEXT,
                    color TEXT,
                    height REAL,
                    plants_per_sqm INTEGER,
                    sun_preference TEXT,
                    planting_date TEXT,
                    expected_harvest_date TEXT,
                    status TEXT NOT NULL DEFAULT 'healthy',
                    notes TEXT,
                    care_instructions TEXT,
                    watering_frequency INTEGER,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS logbook_entries (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    plant_bed_id INTEGER NOT NULL REFERENCES plant_beds(id) ON DELETE CASCADE,
                    plant_id INTEGER REFERENCES plants(id) ON DELETE SET NULL,
                    entry_date TEXT NOT NULL,
                    notes TEXT NOT NULL,
                    photo_url TEXT,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS tasks (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    plant_id INTEGER REFERENCES plants(id) ON DELETE CASCADE,
                    plant_bed_id INTEGER NOT NULL REFERENCES plant_beds(id) ON DELETE CASCADE,
                    title TEXT NOT NULL,
                    description TEXT,
                    due_date TEXT NOT NULL,
                    completed INTEGER NOT NULL DEFAULT 0,
                    completed_at TEXT,
                    priority TEXT NOT NULL DEFAULT 'medium',
                    task_type TEXT NOT NULL DEFAULT 'general',
                    estimated_minutes INTEGER,
                    notes TEXT,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    email TEXT NOT NULL UNIQUE,
                    full_name TEXT NOT NULL,
                    role TEXT NOT NULL DEFAULT 'user',
                    status TEXT NOT NULL DEFAULT 'pending',
                    password_hash TEXT,
                    force_password_change INTEGER NOT NULL DEFAULT 0,
                    is_active INTEGER NOT NULL DEFAULT 1,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS user_garden_access (
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    garden_id INTEGER NOT NULL REFERENCES gardens(id) ON DELETE CASCADE,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    PRIMARY KEY (user_id, garden_id)
                );

                CREATE INDEX IF NOT EXISTS idx_plant_beds_garden ON plant_beds(garden_id);
                CREATE INDEX IF NOT EXISTS idx_plants_bed ON plants(plant_bed_id);
                CREATE INDEX IF NOT EXISTS idx_logbook_bed ON logbook_entries(plant_bed_id);
                CREATE INDEX IF NOT EXISTS idx_tasks_bed ON tasks(plant_bed_id);
                CREATE INDEX IF NOT EXISTS idx_tasks_due ON tasks(due_date);
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }

    // ── Gardens ───────────────────────────────────────────────────────

    pub fn create_garden(&self, input: &GardenInput) -> Result<Garden> {
        self.conn
            .execute(
                "INSERT INTO gardens (name, description, location, total_area, length, width, garden_type,
                    maintenance_level, soil_type, watering_system, established_date, notes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    input.name,
                    input.description,
                    input.location,
                    input.total_area,
                    input.length,
                    input.width,
                    input.garden_type,
                    input.maintenance_level,
                    input.soil_type,
                    input.watering_system,
                    input.established_date,
                    input.notes,
                ],
            )
            .context("Failed to insert garden")?;
        let id = self.conn.last_insert_rowid();
        self.get_garden(id)?.context("Garden not found after insert")
    }

    /// Active garden by id. Soft-deleted gardens read as missing.
    pub fn get_garden(&self, id: i64) -> Result<Option<Garden>> {
        self.conn
            .query_row(
                &format!("SELECT {GARDEN_COLUMNS} FROM gardens WHERE id = ?1 AND is_active = 1"),
                params![id],
                garden_from_row,
            )
            .optional()
            .context("Failed to query garden")
    }

    /// Page of active gardens and the total match count.
    pub fn list_gardens(&self, query: &GardenQuery) -> Result<(Vec<Garden>, u64)> {
        let mut clause = String::from("is_active = 1");
        let mut args: Vec<Value> = Vec::new();

        if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
            args.push(Value::Text(format!("%{}%", search.to_lowercase())));
            let n = args.len();
            clause.push_str(&format!(
                " AND (lower(name) LIKE ?{n} OR lower(coalesce(description, '')) LIKE ?{n} OR lower(location) LIKE ?{n})"
            ));
        }
        if let Some(ids) = &query.garden_ids {
            clause.push_str(&format!(" AND id IN ({})", placeholders(&mut args, ids)));
        }

        let count: i64 = self
            .conn
            .query_row(
                &format!("SELECT COUNT(*) FROM gardens WHERE {clause}"),
                params_from_iter(args.iter()),
                |row| row.get(0),
            )
            .context("Failed to count gardens")?;

        // sort_field is checked against an allow-list by the service layer
        let sql = format!(
            "SELECT {GARDEN_COLUMNS} FROM gardens WHERE {clause}
             ORDER BY {} {}, id {} LIMIT {} OFFSET {}",
            query.sort_field,
            query.direction.as_sql(),
            query.direction.as_sql(),
            query.limit,
            query.offset
        );
        let mut stmt = self.conn.prepare(&sql).context("Failed to prepare list_gardens")?;
        let rows = stmt
            .query_map(params_from_iter(args.iter()), garden_from_row)
            .context("Failed to query gardens")?;
        let mut gardens = Vec::new();
        for row in rows {
            gardens.push(row.context("Failed to read garden row")?);
        }
        Ok((gardens, count as u64))
    }

    pub fn update_garden(&self, id: i64, input: &GardenInput) -> Result<Garden> {
        self.conn
            .execute(
                "UPDATE gardens SET
                    name = COALESCE(?1, name),
                    description = COALESCE(?2, description),
                    location = COALESCE(?3, location),
                    total_area = COALESCE(?4, total_area),
                    length = COALESCE(?5, length),
                    width = COALESCE(?6, width),
                    garden_type = COALESCE(?7, garden_type),
                    maintenance_level = COALESCE(?8, maintenance_level),
                    soil_type = COALESCE(?9, soil_type),
                    watering_system = COALESCE(?10, watering_system),
                    established_date = COALESCE(?11, established_date),
                    notes = COALESCE(?12, notes),
                    updated_at = datetime('now')
                 WHERE id = ?13",
                params![
                    input.name,
                    input.description,
                    input.location,
                    input.total_area,
                    input.length,
                    input.width,
                    input.garden_type,
                    input.maintenance_level,
                    input.soil_type,
                    input.watering_system,
                    input.established_date,
                    input.notes,
                    id,
                ],
            )
            .context("Failed to update garden")?;
        self.get_garden(id)?.context("Garden not found after update")
    }

    /// Marks the garden inactive. Returns false if it was not active.
    pub fn soft_delete_garden(&self, id: i64) -> Result<bool> {
        let count = self
            .conn
            .execute(
                "UPDATE gardens SET is_active = 0, updated_at = datetime('now') WHERE id = ?1 AND is_active = 1",
                params![id],
            )
            .context("Failed to soft-delete garden")?;
        Ok(count > 0)
    }

    pub fn remove_garden_access_for_garden(&self, garden_id: i64) -> Result<usize> {
        self.conn
            .execute(
                "DELETE FROM user_garden_access WHERE garden_id = ?1",
                params![garden_id],
            )
            .context("Failed to remove garden access rows")
    }

    pub fn count_gardens(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM gardens WHERE is_active = 1")
    }

    // ── Plant beds ────────────────────────────────────────────────────

    pub fn letter_codes_for_garden(&self, garden_id: i64) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT letter_code FROM plant_beds WHERE garden_id = ?1")
            .context("Failed to prepare letter_codes_for_garden")?;
        let rows = stmt
            .query_map(params![garden_id], |row| row.get(0))
            .context("Failed to query letter codes")?;
        let mut codes = Vec::new();
        for row in rows {
            codes.push(row.context("Failed to read letter code")?);
        }
        Ok(codes)
    }

    pub fn create_plant_bed(
        &self,
        garden_id: i64,
        letter_code: &str,
        name: &str,
        input: &PlantBedInput,
    ) -> Result<PlantBed> {
        self.conn
            .execute(
                "INSERT INTO plant_beds (garden_id, letter_code, name, location, size, soil_type,
                    sun_exposure, description, season_year)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    garden_id,
                    letter_code,
                    name,
                    input.location,
                    input.size,
                    input.soil_type,
                    input.sun_exposure.map(|s| s.as_str()),
                    input.description,
                    input.season_year,
                ],
            )
            .context("Failed to insert plant bed")?;
        let id = self.conn.last_insert_rowid();
        self.get_plant_bed(id)?
            .context("Plant bed not found after insert")
    }

    pub fn get_plant_bed(&self, id: i64) -> Result<Option<PlantBed>> {
        self.conn
            .query_row(
                &format!("SELECT {PLANT_BED_COLUMNS} FROM plant_beds WHERE id = ?1"),
                params![id],
                plant_bed_from_row,
            )
            .optional()
            .context("Failed to query plant bed")
    }

    /// Active beds of a garden in letter-code order (`B` before `A1`).
    pub fn list_plant_beds(&self, garden_id: i64) -> Result<Vec<PlantBed>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {PLANT_BED_COLUMNS} FROM plant_beds
                 WHERE garden_id = ?1 AND is_active = 1
                 ORDER BY length(letter_code), letter_code"
            ))
            .context("Failed to prepare list_plant_beds")?;
        let rows = stmt
            .query_map(params![garden_id], plant_bed_from_row)
            .context("Failed to query plant beds")?;
        let mut beds = Vec::new();
        for row in rows {
            beds.push(row.context("Failed to read plant bed row")?);
        }
        Ok(beds)
    }

    pub fn update_plant_bed(&self, id: i64, input: &PlantBedInput) -> Result<PlantBed> {
        self.conn
            .execute(
                "UPDATE plant_beds SET
                    letter_code = COALESCE(?1, letter_code),
                    name = COALESCE(?2, name),
                    location = COALESCE(?3, location),
                    size = COALESCE(?4, size),
                    soil_type = COALESCE(?5, soil_type),
                    sun_exposure = COALESCE(?6, sun_exposure),
                    description = COALESCE(?7, description),
                    season_year = COALESCE(?8, season_year),
                    updated_at = datetime('now')
                 WHERE id = ?9",
                params![
                    input.letter_code,
                    input.name,
                    input.location,
                    input.size,
                    input.soil_type,
                    input.sun_exposure.map(|s| s.as_str()),
                    input.description,
                    input.season_year,
                    id,
                ],
            )
            .context("Failed to update plant bed")?;
        self.get_plant_bed(id)?
            .context("Plant bed not found after update")
    }

    pub fn delete_plant_bed(&self, id: i64) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM plant_beds WHERE id = ?1", params![id])
            .context("Failed to delete plant bed")?;
        Ok(count > 0)
    }

    pub fn count_plant_beds(&self) -> Result<u64> {
        self.count(
            "SELECT COUNT(*) FROM plant_beds pb JOIN gardens g ON g.id = pb.garden_id
             WHERE pb.is_active = 1 AND g.is_active = 1",
        )
    }

    // ── Plants ────────────────────────────────────────────────────────

    pub fn create_plant(&self, plant_bed_id: i64, input: &PlantInput) -> Result<Plant> {
        self.conn
            .execute(
                "INSERT INTO plants (plant_bed_id, name, scientific_name, variety, color, height,
                    plants_per_sqm, sun_preference, planting_date, expected_harvest_date, status,
                    notes, care_instructions, watering_frequency)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    plant_bed_id,
                    input.name,
                    input.scientific_name,
                    input.variety,
                    input.color,
                    input.height,
                    input.plants_per_sqm,
                    input.sun_preference.map(|s| s.as_str()),
                    input.planting_date,
                    input.expected_harvest_date,
                    input.status.unwrap_or_default().as_str(),
                    input.notes,
                    input.care_instructions,
                    input.watering_frequency,
                ],
            )
            .context("Failed to insert plant")?;
        let id = self.conn.last_insert_rowid();
        self.get_plant(id)?.context("Plant not found after insert")
    }

    pub fn get_plant(&self, id: i64) -> Result<Option<Plant>> {
        self.conn
            .query_row(
                &format!("SELECT {PLANT_COLUMNS} FROM plants WHERE id = ?1"),
                params![id],
                plant_from_row,
            )
            .optional()
            .context("Failed to query plant")
    }

    pub fn list_plants(&self, plant_bed_id: i64) -> Result<Vec<Plant>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {PLANT_COLUMNS} FROM plants WHERE plant_bed_id = ?1 ORDER BY name, id"
            ))
            .context("Failed to prepare list_plants")?;
        let rows = stmt
            .query_map(params![plant_bed_id], plant_from_row)
            .context("Failed to query plants")?;
        let mut plants = Vec::new();
        for row in rows {
            plants.push(row.context("Failed to read plant row")?);
        }
        Ok(plants)
    }

    pub fn update_plant(&self, id: i64, input: &PlantInput) -> Result<Plant> {
        self.conn
            .execute(
                "UPDATE plants SET
                    name = COALESCE(?1, name),
                    scientific_name = COALESCE(?2, scientific_name),
                    variety = COALESCE(?3, variety),
                    color = COALESCE(?4, color),
                    height = COALESCE(?5, height),
                    plants_per_sqm = COALESCE(?6, plants_per_sqm),
                    sun_preference = COALESCE(?7, sun_preference),
                    planting_date = COALESCE(?8, planting_date),
                    expected_harvest_date = COALESCE(?9, expected_harvest_date),
                    status = COALESCE(?10, status),
                    notes = COALESCE(?11, notes),
                    care_instructions = COALESCE(?12, care_instructions),
                    watering_frequency = COALESCE(?13, watering_frequency),
                    updated_at = datetime('now')
                 WHERE id = ?14",
                params![
                    input.name,
                    input.scientific_name,
                    input.variety,
                    input.color,
                    input.height,
                    input.plants_per_sqm,
                    input.sun_preference.map(|s| s.as_str()),
                    input.planting_date,
                    input.expected_harvest_date,
                    input.status.map(|s| s.as_str()),
                    input.notes,
                    input.care_instructions,
                    input.watering_frequency,
                    id,
                ],
            )
            .context("Failed to update plant")?;
        self.get_plant(id)?.context("Plant not found after update")
    }

    pub fn delete_plant(&self, id: i64) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM plants WHERE id = ?1", params![id])
            .context("Failed to delete plant")?;
        Ok(count > 0)
    }

    pub fn count_plants(&self) -> Result<u64> {
        self.count(
            "SELECT COUNT(*) FROM plants p
             JOIN plant_beds pb ON pb.id = p.plant_bed_id
             JOIN gardens g ON g.id = pb.garden_id
             WHERE g.is_active = 1",
        )
    }

    // ── Logbook ───────────────────────────────────────────────────────

    pub fn create_logbook_entry(
        &self,
        plant_bed_id: i64,
        plant_id: Option<i64>,
        entry_date: &str,
        notes: &str,
        photo_url: Option<&str>,
    ) -> Result<LogbookEntry> {
        self.conn
            .execute(
                "INSERT INTO logbook_entries (plant_bed_id, plant_id, entry_date, notes, photo_url)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![plant_bed_id, plant_id, entry_date, notes, photo_url],
            )
            .context("Failed to insert logbook entry")?;
        let id = self.conn.last_insert_rowid();
        self.get_logbook_entry(id)?
            .context("Logbook entry not found after insert")
    }

    pub fn get_logbook_entry(&self, id: i64) -> Result<Option<LogbookEntry>> {
        self.conn
            .query_row(
                &format!("SELECT {LOGBOOK_COLUMNS} FROM logbook_entries l WHERE l.id = ?1"),
                params![id],
                logbook_from_row,
            )
            .optional()
            .context("Failed to query logbook entry")
    }

    /// Entries newest first.
    pub fn list_logbook_entries(&self, filter: &LogbookFilter) -> Result<Vec<LogbookEntry>> {
        let mut clause = String::from("g.is_active = 1");
        let mut args: Vec<Value> = Vec::new();
        if let Some(id) = filter.plant_bed_id {
            args.push(Value::Integer(id));
            clause.push_str(&format!(" AND l.plant_bed_id = ?{}", args.len()));
        }
        if let Some(id) = filter.plant_id {
            args.push(Value::Integer(id));
            clause.push_str(&format!(" AND l.plant_id = ?{}", args.len()));
        }
        if let Some(id) = filter.garden_id {
            args.push(Value::Integer(id));
            clause.push_str(&format!(" AND pb.garden_id = ?{}", args.len()));
        }
        if let Some(ids) = &filter.garden_ids {
            clause.push_str(&format!(" AND pb.garden_id IN ({})", placeholders(&mut args, ids)));
        }
        let limit = filter.limit.map(i64::from).unwrap_or(-1);
        let offset = filter.offset.unwrap_or(0);

        let sql = format!(
            "SELECT {LOGBOOK_COLUMNS} FROM logbook_entries l
             JOIN plant_beds pb ON pb.id = l.plant_bed_id
             JOIN gardens g ON g.id = pb.garden_id
             WHERE {clause}
             ORDER BY l.entry_date DESC, l.created_at DESC, l.id DESC
             LIMIT {limit} OFFSET {offset}"
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("Failed to prepare list_logbook_entries")?;
        let rows = stmt
            .query_map(params_from_iter(args.iter()), logbook_from_row)
            .context("Failed to query logbook entries")?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.context("Failed to read logbook row")?);
        }
        Ok(entries)
    }

    pub fn update_logbook_entry(&self, id: i64, input: &LogbookInput) -> Result<LogbookEntry> {
        self.conn
            .execute(
                "UPDATE logbook_entries SET
                    plant_id = COALESCE(?1, plant_id),
                    entry_date = COALESCE(?2, entry_date),
                    notes = COALESCE(?3, notes),
                    photo_url = COALESCE(?4, photo_url),
                    updated_at = datetime('now')
                 WHERE id = ?5",
                params![input.plant_id, input.entry_date, input.notes, input.photo_url, id],
            )
            .context("Failed to update logbook entry")?;
        self.get_logbook_entry(id)?
            .context("Logbook entry not found after update")
    }

    pub fn delete_logbook_entry(&self, id: i64) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM logbook_entries WHERE id = ?1", params![id])
            .context("Failed to delete logbook entry")?;
        Ok(count > 0)
    }

    // ── Tasks ─────────────────────────────────────────────────────────

    pub fn create_task(&self, task: &NewTask) -> Result<Task> {
        self.conn
            .execute(
                "INSERT INTO tasks (plant_id, plant_bed_id, title, description, due_date, priority,
                    task_type, estimated_minutes, notes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    task.plant_id,
                    task.plant_bed_id,
                    task.title,
                    task.description,
                    task.due_date,
                    task.priority.as_str(),
                    task.task_type.as_str(),
                    task.estimated_minutes,
                    task.notes,
                ],
            )
            .context("Failed to insert task")?;
        let id = self.conn.last_insert_rowid();
        self.get_task(id)?.context("Task not found after insert")
    }

    pub fn get_task(&self, id: i64) -> Result<Option<Task>> {
        self.conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks t WHERE t.id = ?1"),
                params![id],
                task_from_row,
            )
            .optional()
            .context("Failed to query task")
    }

    /// Tasks ordered by due date, then priority (high first).
    pub fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let mut clause = String::from("g.is_active = 1");
        let mut args: Vec<Value> = Vec::new();
        if let Some(id) = filter.garden_id {
            args.push(Value::Integer(id));
            clause.push_str(&format!(" AND pb.garden_id = ?{}", args.len()));
        }
        if let Some(id) = filter.plant_bed_id {
            args.push(Value::Integer(id));
            clause.push_str(&format!(" AND t.plant_bed_id = ?{}", args.len()));
        }
        if let Some(id) = filter.plant_id {
            args.push(Value::Integer(id));
            clause.push_str(&format!(" AND t.plant_id = ?{}", args.len()));
        }
        if let Some(completed) = filter.completed {
            args.push(Value::Integer(completed as i64));
            clause.push_str(&format!(" AND t.completed = ?{}", args.len()));
        }
        if let Some(priority) = filter.priority {
            args.push(Value::Text(priority.as_str().to_string()));
            clause.push_str(&format!(" AND t.priority = ?{}", args.len()));
        }
        if let Some(from) = &filter.due_from {
            args.push(Value::Text(from.clone()));
            clause.push_str(&format!(" AND t.due_date >= ?{}", args.len()));
        }
        if let Some(to) = &filter.due_to {
            args.push(Value::Text(to.clone()));
            clause.push_str(&format!(" AND t.due_date <= ?{}", args.len()));
        }
        if let Some(ids) = &filter.garden_ids {
            clause.push_str(&format!(" AND pb.garden_id IN ({})", placeholders(&mut args, ids)));
        }

        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks t
             JOIN plant_beds pb ON pb.id = t.plant_bed_id
             JOIN gardens g ON g.id = pb.garden_id
             WHERE {clause}
             ORDER BY t.due_date ASC,
                CASE t.priority WHEN 'high' THEN 0 WHEN 'medium' THEN 1 ELSE 2 END,
                t.id ASC"
        );
        let mut stmt = self.conn.prepare(&sql).context("Failed to prepare list_tasks")?;
        let rows = stmt
            .query_map(params_from_iter(args.iter()), task_from_row)
            .context("Failed to query tasks")?;
        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row.context("Failed to read task row")?);
        }
        Ok(tasks)
    }

    pub fn update_task(&self, id: i64, input: &TaskInput) -> Result<Task> {
        self.conn
            .execute(
                "UPDATE tasks SET
                    plant_id = COALESCE(?1, plant_id),
                    plant_bed_id = COALESCE(?2, plant_bed_id),
                    title = COALESCE(?3, title),
                    description = COALESCE(?4, description),
                    due_date = COALESCE(?5, due_date),
                    priority = COALESCE(?6, priority),
                    task_type = COALESCE(?7, task_type),
                    estimated_minutes = COALESCE(?8, estimated_minutes),
                    notes = COALESCE(?9, notes),
                    updated_at = datetime('now')
                 WHERE id = ?10",
                params![
                    input.plant_id,
                    input.plant_bed_id,
                    input.title,
                    input.description,
                    input.due_date,
                    input.priority.map(|p| p.as_str()),
                    input.task_type.map(|t| t.as_str()),
                    input.estimated_minutes,
                    input.notes,
                    id,
                ],
            )
            .context("Failed to update task")?;
        self.get_task(id)?.context("Task not found after update")
    }

    pub fn set_task_completed(&self, id: i64, completed: bool) -> Result<Option<Task>> {
        let count = self
            .conn
            .execute(
                "UPDATE tasks SET
                    completed = ?1,
                    completed_at = CASE WHEN ?1 = 1 THEN datetime('now') ELSE NULL END,
                    updated_at = datetime('now')
                 WHERE id = ?2",
                params![completed, id],
            )
            .context("Failed to update task completion")?;
        if count == 0 {
            return Ok(None);
        }
        self.get_task(id)
    }

    /// Marks every listed task completed. Returns the number changed.
    pub fn bulk_complete_tasks(&self, ids: &[i64]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut args = Vec::new();
        let sql = format!(
            "UPDATE tasks SET completed = 1, completed_at = datetime('now'), updated_at = datetime('now')
             WHERE completed = 0 AND id IN ({})",
            placeholders(&mut args, ids)
        );
        self.conn
            .execute(&sql, params_from_iter(args.iter()))
            .context("Failed to bulk-complete tasks")
    }

    pub fn bulk_delete_tasks(&self, ids: &[i64]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut args = Vec::new();
        let sql = format!("DELETE FROM tasks WHERE id IN ({})", placeholders(&mut args, ids));
        self.conn
            .execute(&sql, params_from_iter(args.iter()))
            .context("Failed to bulk-delete tasks")
    }

    pub fn delete_task(&self, id: i64) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM tasks WHERE id = ?1", params![id])
            .context("Failed to delete task")?;
        Ok(count > 0)
    }

    /// Garden owning a plant bed, if the bed exists.
    pub fn garden_id_for_plant_bed(&self, plant_bed_id: i64) -> Result<Option<i64>> {
        self.conn
            .query_row(
                "SELECT garden_id FROM plant_beds WHERE id = ?1",
                params![plant_bed_id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to look up garden for plant bed")
    }

    // ── Users ─────────────────────────────────────────────────────────

    pub fn create_user(&self, user: &NewUser) -> Result<User> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        tx.execute(
            "INSERT INTO users (email, full_name, role, status, password_hash, force_password_change)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user.email,
                user.full_name,
                user.role.as_str(),
                user.status.as_str(),
                user.password_hash,
                user.force_password_change,
            ],
        )
        .context("Failed to insert user")?;
        let id = tx.last_insert_rowid();
        for garden_id in &user.garden_access {
            tx.execute(
                "INSERT OR IGNORE INTO user_garden_access (user_id, garden_id) VALUES (?1, ?2)",
                params![id, garden_id],
            )
            .context("Failed to grant garden access")?;
        }
        tx.commit().context("Failed to commit user insert")?;
        self.get_user(id)?.context("User not found after insert")
    }

    /// User by id, including inactive users.
    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                user_from_row,
            )
            .optional()
            .context("Failed to query user")?;
        match user {
            Some(mut user) => {
                user.garden_access = self.garden_access_for_user(user.id)?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let id: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM users WHERE email = ?1",
                params![email],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query user by email")?;
        match id {
            Some(id) => self.get_user(id),
            None => Ok(None),
        }
    }

    /// Active users, newest first.
    pub fn list_users(&self) -> Result<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE is_active = 1 ORDER BY created_at DESC, id DESC"
            ))
            .context("Failed to prepare list_users")?;
        let rows = stmt
            .query_map([], user_from_row)
            .context("Failed to query users")?;
        let mut users = Vec::new();
        for row in rows {
            let mut user = row.context("Failed to read user row")?;
            user.garden_access = self.garden_access_for_user(user.id)?;
            users.push(user);
        }
        Ok(users)
    }

    pub fn update_user(&self, id: i64, patch: &UserPatch) -> Result<User> {
        self.conn
            .execute(
                "UPDATE users SET
                    full_name = COALESCE(?1, full_name),
                    role = COALESCE(?2, role),
                    status = COALESCE(?3, status),
                    updated_at = datetime('now')
                 WHERE id = ?4",
                params![
                    patch.full_name,
                    patch.role.map(|r| r.as_str()),
                    patch.status.map(|s| s.as_str()),
                    id,
                ],
            )
            .context("Failed to update user")?;
        if let Some(access) = &patch.garden_access {
            self.set_garden_access(id, access)?;
        }
        self.get_user(id)?.context("User not found after update")
    }

    /// Replace a user's garden access list.
    pub fn set_garden_access(&self, user_id: i64, garden_ids: &[i64]) -> Result<()> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        tx.execute(
            "DELETE FROM user_garden_access WHERE user_id = ?1",
            params![user_id],
        )
        .context("Failed to clear garden access")?;
        for garden_id in garden_ids {
            tx.execute(
                "INSERT OR IGNORE INTO user_garden_access (user_id, garden_id) VALUES (?1, ?2)",
                params![user_id, garden_id],
            )
            .context("Failed to grant garden access")?;
        }
        tx.commit().context("Failed to commit garden access")?;
        Ok(())
    }

    fn garden_access_for_user(&self, user_id: i64) -> Result<Vec<i64>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT a.garden_id FROM user_garden_access a
                 JOIN gardens g ON g.id = a.garden_id
                 WHERE a.user_id = ?1 AND g.is_active = 1
                 ORDER BY a.garden_id",
            )
            .context("Failed to prepare garden_access_for_user")?;
        let rows = stmt
            .query_map(params![user_id], |row| row.get(0))
            .context("Failed to query garden access")?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row.context("Failed to read garden access row")?);
        }
        Ok(ids)
    }

    /// Deactivates the user and revokes their garden access.
    pub fn soft_delete_user(&self, id: i64) -> Result<bool> {
        let count = self
            .conn
            .execute(
                "UPDATE users SET is_active = 0, status = 'inactive', updated_at = datetime('now')
                 WHERE id = ?1 AND is_active = 1",
                params![id],
            )
            .context("Failed to soft-delete user")?;
        if count > 0 {
            self.conn
                .execute(
                    "DELETE FROM user_garden_access WHERE user_id = ?1",
                    params![id],
                )
                .context("Failed to revoke garden access")?;
        }
        Ok(count > 0)
    }

    pub fn count_users(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM users WHERE is_active = 1")
    }

    fn count(&self, sql: &str) -> Result<u64> {
        let n: i64 = self
            .conn
            .query_row(sql, [], |row| row.get(0))
            .with_context(|| format!("Failed to run count query: {}", sql))?;
        Ok(n as u64)
    }
}

/// Append `ids` to `args` and return the matching `?n` list.
fn placeholders(args: &mut Vec<Value>, ids: &[i64]) -> String {
    if ids.is_empty() {
        return "NULL".to_string();
    }
    let mut marks = Vec::with_capacity(ids.len());
    for id in ids {
        args.push(Value::Integer(*id));
        marks.push(format!("?{}", args.len()));
    }
    marks.join(", ")
}

fn parse_column<T: FromStr<Err = String>>(idx: usize, raw: String) -> rusqlite::Result<T> {
    T::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e.into())
    })
}

fn parse_optional<T: FromStr<Err = String>>(
    idx: usize,
    raw: Option<String>,
) -> rusqlite::Result<Option<T>> {
    raw.map(|s| parse_column(idx, s)).transpose()
}

fn garden_from_row(row: &Row<'_>) -> rusqlite::Result<Garden> {
    Ok(Garden {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        location: row.get(3)?,
        total_area: row.get(4)?,
        length: row.get(5)?,
        width: row.get(6)?,
        garden_type: row.get(7)?,
        maintenance_level: row.get(8)?,
        soil_type: row.get(9)?,
        watering_system: row.get(10)?,
        established_date: row.get(11)?,
        notes: row.get(12)?,
        is_active: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

fn plant_bed_from_row(row: &Row<'_>) -> rusqlite::Result<PlantBed> {
    Ok(PlantBed {
        id: row.get(0)?,
        garden_id: row.get(1)?,
        letter_code: row.get(2)?,
        name: row.get(3)?,
        location: row.get(4)?,
        size: row.get(5)?,
        soil_type: row.get(6)?,
        sun_exposure: parse_optional(7, row.get(7)?)?,
        description: row.get(8)?,
        season_year: row.get(9)?,
        is_active: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn plant_from_row(row: &Row<'_>) -> rusqlite::Result<Plant> {
    Ok(Plant {
        id: row.get(0)?,
        plant_bed_id: row.get(1)?,
        name: row.get(2)?,
        scientific_name: row.get(3)?,
        variety: row.get(4)?,
        color: row.get(5)?,
        height: row.get(6)?,
        plants_per_sqm: row.get(7)?,
        sun_preference: parse_optional(8, row.get(8)?)?,
        planting_date: row.get(9)?,
        expected_harvest_date: row.get(10)?,
        status: parse_column(11, row.get(11)?)?,
        notes: row.get(12)?,
        care_instructions: row.get(13)?,
        watering_frequency: row.get(14)?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

fn logbook_from_row(row: &Row<'_>) -> rusqlite::Result<LogbookEntry> {
    Ok(LogbookEntry {
        id: row.get(0)?,
        plant_bed_id: row.get(1)?,
        plant_id: row.get(2)?,
        entry_date: row.get(3)?,
        notes: row.get(4)?,
        photo_url: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        plant_id: row.get(1)?,
        plant_bed_id: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        due_date: row.get(5)?,
        completed: row.get(6)?,
        completed_at: row.get(7)?,
        priority: parse_column(8, row.get(8)?)?,
        task_type: parse_column(9, row.get(9)?)?,
        estimated_minutes: row.get(10)?,
        notes: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        full_name: row.get(2)?,
        role: parse_column::<Role>(3, row.get(3)?)?,
        status: parse_column::<UserStatus>(4, row.get(4)?)?,
        garden_access: Vec::new(),
        force_password_change: row.get(5)?,
        is_active: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────
