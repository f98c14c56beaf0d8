use crate::error::{Result, StorageError};
use crate::movement::{Kind, Movement, Totals, TIMESTAMP_FORMAT};
use crate::schema::{parse_amount, validate_amount, validate_description};
use chrono::Local;
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Durable collection of movements plus derived totals.
///
/// The store keeps only the database path. Every operation opens its own
/// connection, runs inside a single SQLite transaction and closes the
/// connection before returning, so no handle outlives a call.
#[derive(Debug, Clone)]
pub struct LedgerStore {
    path: PathBuf,
}

/// Row exactly as stored, before the kind label is decoded
struct StoredRow {
    id: i64,
    kind: String,
    description: String,
    amount: f64,
    timestamp: String,
}

impl StoredRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(StoredRow {
            id: row.get(0)?,
            kind: row.get(1)?,
            description: row.get(2)?,
            amount: row.get(3)?,
            timestamp: row.get(4)?,
        })
    }

    fn into_movement(self) -> Result<Movement> {
        let kind = Kind::parse(&self.kind).ok_or_else(|| {
            warn!(id = self.id, kind = %self.kind, "stored movement has unknown kind");
            StorageError::CorruptRow {
                id: self.id,
                reason: format!("unknown kind '{}'", self.kind),
            }
        })?;

        Ok(Movement {
            id: self.id,
            kind,
            description: self.description,
            amount: self.amount,
            timestamp: self.timestamp,
        })
    }
}

/// Outcome of `LedgerStore::migrate_legacy`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LegacyMigration {
    /// Rows written to `movements`
    pub copied: usize,
    /// Copied rows whose legacy id was already spent and got a new one
    pub renumbered: usize,
    /// Rows left behind because they fail validation
    pub skipped: usize,
}

/// Row of the original `movimientos` table. Columns are read loosely:
/// the old form accepted free text for every field.
struct LegacyRow {
    id: i64,
    tipo: Option<String>,
    descripcion: Option<String>,
    monto: Value,
    fecha: Option<String>,
}

impl LegacyRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(LegacyRow {
            id: row.get(0)?,
            tipo: row.get(1)?,
            descripcion: row.get(2)?,
            monto: row.get(3)?,
            fecha: row.get(4)?,
        })
    }

    fn validate(&self) -> std::result::Result<(Kind, &str, f64, &str), String> {
        let tipo = self.tipo.as_deref().unwrap_or_default();
        let kind = Kind::parse(tipo).ok_or_else(|| format!("unknown kind '{}'", tipo))?;
        let description =
            validate_description(self.descripcion.as_deref().unwrap_or_default()).map_err(|e| e.to_string())?;

        let amount = match &self.monto {
            Value::Real(v) => *v,
            Value::Integer(v) => *v as f64,
            Value::Text(text) => parse_amount(text).map_err(|e| e.to_string())?,
            _ => return Err("amount: Must be numeric".to_string()),
        };
        let amount = validate_amount(amount).map_err(|e| e.to_string())?;

        let timestamp = self
            .fecha
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| "timestamp: Required field is empty".to_string())?;

        Ok((kind, description, amount, timestamp))
    }
}

/// Highest id `movements` has ever issued, including deleted ones
fn issued_high_water(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT MAX(
            COALESCE((SELECT seq FROM sqlite_sequence WHERE name = 'movements'), 0),
            COALESCE((SELECT MAX(id) FROM movements), 0)
        )",
        [],
        |row| row.get(0),
    )
}

const SELECT_MOVEMENTS: &str = "SELECT id, kind, description, amount, timestamp FROM movements";

impl LedgerStore {
    /// Store backed by the SQLite file at `path`. Nothing is opened yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store backed by `path`, with the schema created if missing
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::new(path);
        store.initialize()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> std::result::Result<Connection, StorageError> {
        Connection::open(&self.path).map_err(|source| StorageError::Open {
            path: self.path.clone(),
            source,
        })
    }

    /// Scoped acquire / commit / release around one store operation.
    /// An error from `op` drops the transaction, which rolls it back.
    fn with_transaction<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let value = op(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    // ========================================================================
    // SCHEMA
    // ========================================================================

    /// Create the `movements` table if it does not exist. Idempotent.
    pub fn initialize(&self) -> Result<()> {
        // WAL for crash recovery; must be set outside a transaction
        let conn = self.connect()?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        drop(conn);

        self.with_transaction(|conn| {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS movements (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    kind TEXT NOT NULL,
                    description TEXT NOT NULL,
                    amount REAL NOT NULL,
                    timestamp TEXT NOT NULL
                )",
                [],
            )?;
            Ok(())
        })?;

        info!(path = %self.path.display(), "ledger schema ready");
        Ok(())
    }

    /// Copy rows from the `movimientos` table written by the original
    /// desktop app into `movements`.
    ///
    /// Each legacy row goes through the same checks as `append`; rows that
    /// fail are skipped and counted. A legacy id is kept only when it is
    /// above every id the store has ever issued, otherwise the row gets a
    /// fresh id. The source table is then renamed to
    /// `movimientos_migrated_<timestamp>`, so running it twice is harmless
    /// and skipped rows stay available for inspection.
    pub fn migrate_legacy(&self) -> Result<LegacyMigration> {
        let report = self.with_transaction(|conn| {
            let legacy_exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'movimientos')",
                [],
                |row| row.get(0),
            )?;
            if !legacy_exists {
                return Ok(LegacyMigration::default());
            }

            let legacy_rows = {
                let mut stmt =
                    conn.prepare("SELECT id, tipo, descripcion, monto, fecha FROM movimientos ORDER BY id")?;
                let rows = stmt
                    .query_map([], LegacyRow::from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            };

            let mut report = LegacyMigration::default();
            for legacy in legacy_rows {
                let legacy_id = legacy.id;
                let (kind, description, amount, timestamp) = match legacy.validate() {
                    Ok(fields) => fields,
                    Err(reason) => {
                        warn!(legacy_id, %reason, "legacy movement skipped");
                        report.skipped += 1;
                        continue;
                    }
                };

                if legacy_id > issued_high_water(conn)? {
                    conn.execute(
                        "INSERT INTO movements (id, kind, description, amount, timestamp)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![legacy_id, kind.as_str(), description, amount, timestamp],
                    )?;
                } else {
                    conn.execute(
                        "INSERT INTO movements (kind, description, amount, timestamp)
                         VALUES (?1, ?2, ?3, ?4)",
                        params![kind.as_str(), description, amount, timestamp],
                    )?;
                    debug!(legacy_id, id = conn.last_insert_rowid(), "legacy movement renumbered");
                    report.renumbered += 1;
                }
                report.copied += 1;
            }

            let archived = format!("movimientos_migrated_{}", Local::now().format("%Y%m%d%H%M%S"));
            conn.execute(&format!("ALTER TABLE movimientos RENAME TO {}", archived), [])?;
            Ok(report)
        })?;

        info!(
            copied = report.copied,
            renumbered = report.renumbered,
            skipped = report.skipped,
            "legacy movements migrated"
        );
        Ok(report)
    }

    // ========================================================================
    // COMMANDS
    // ========================================================================

    /// Persist a new movement and return its id.
    /// The store assigns the id and the timestamp.
    pub fn append(&self, kind: Kind, description: &str, amount: f64) -> Result<i64> {
        let description = validate_description(description)?;
        let amount = validate_amount(amount)?;
        let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();

        let id = self.with_transaction(|conn| {
            conn.execute(
                "INSERT INTO movements (kind, description, amount, timestamp)
                 VALUES (?1, ?2, ?3, ?4)",
                params![kind.as_str(), description, amount, timestamp],
            )?;
            Ok(conn.last_insert_rowid())
        })?;

        debug!(id, kind = %kind, amount, "movement appended");
        Ok(id)
    }

    /// Append from untyped form input: kind label and amount text are
    /// parsed before the regular `append` checks run.
    pub fn append_raw(&self, kind: &str, description: &str, amount: &str) -> Result<i64> {
        let kind: Kind = kind.parse()?;
        let description = validate_description(description)?;
        let amount = parse_amount(amount)?;
        self.append(kind, description, amount)
    }

    /// Remove the movement with `id`. Returns whether a row was removed;
    /// an unknown id is not an error.
    pub fn delete(&self, id: i64) -> Result<bool> {
        let removed = self.with_transaction(|conn| {
            let affected = conn.execute("DELETE FROM movements WHERE id = ?1", params![id])?;
            Ok(affected > 0)
        })?;

        debug!(id, removed, "movement delete");
        Ok(removed)
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Every movement, in insertion order
    pub fn list_all(&self) -> Result<Vec<Movement>> {
        let rows = self.with_transaction(|conn| {
            let mut stmt = conn.prepare(&format!("{} ORDER BY id", SELECT_MOVEMENTS))?;
            let rows = stmt
                .query_map([], StoredRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        rows.into_iter().map(StoredRow::into_movement).collect()
    }

    pub fn get(&self, id: i64) -> Result<Option<Movement>> {
        let row = self.with_transaction(|conn| {
            let row = conn
                .query_row(
                    &format!("{} WHERE id = ?1", SELECT_MOVEMENTS),
                    params![id],
                    StoredRow::from_row,
                )
                .optional()?;
            Ok(row)
        })?;

        row.map(StoredRow::into_movement).transpose()
    }

    pub fn count(&self) -> Result<i64> {
        self.with_transaction(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM movements", [], |row| row.get(0))?;
            Ok(count)
        })
    }

    /// Income sum, expense sum and balance over the current rows
    pub fn totals(&self) -> Result<Totals> {
        let (income, expense) = self.with_transaction(|conn| {
            let sums: (f64, f64) = conn.query_row(
                "SELECT
                    COALESCE(SUM(CASE WHEN LOWER(TRIM(kind)) IN ('income', 'ingreso') THEN amount END), 0.0),
                    COALESCE(SUM(CASE WHEN LOWER(TRIM(kind)) IN ('expense', 'gasto') THEN amount END), 0.0)
                 FROM movements",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            Ok(sums)
        })?;

        Ok(Totals::new(income, expense))
    }
}
