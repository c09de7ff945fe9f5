use crate::config::{database_path, Location, TamerConfig};
use crate::error::{Result, TamerError};
use crate::value::{Executed, Params, ResultSet, Row, Value};
use rusqlite::types::ToSql;
use rusqlite::{Connection, Transaction};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Handle to one SQLite database that commits mutating statements immediately.
///
/// The handle owns its [`Connection`]. [`Tamer::execute`] is the only method
/// that applies auto-commit; the native connection stays reachable through
/// [`Tamer::connection`] and the forwarding methods, which follow SQLite's
/// own transaction semantics untouched.
///
/// Dropping the handle releases the connection.
#[derive(Debug)]
pub struct Tamer {
    conn: Option<Connection>,
    location: Location,
    folder: PathBuf,
    extension: String,
    attached: Vec<String>,
}

impl Tamer {
    /// Open a handle on a file path or on `:memory:`.
    pub fn open(location: impl Into<Location>, config: &TamerConfig) -> Result<Self> {
        let location = location.into();
        let conn = match &location {
            Location::Memory => Connection::open_in_memory_with_flags(config.flags),
            Location::File(path) => Connection::open_with_flags(path, config.flags),
        }
        .and_then(|conn| configure(&conn, config).map(|_| conn))
        .map_err(|source| TamerError::Connection {
            location: location.to_string(),
            source,
        })?;
        info!(location = %location, "connected to database");

        let mut tamer = Self {
            conn: Some(conn),
            location,
            folder: config.folder.clone(),
            extension: config.extension.clone(),
            attached: Vec::new(),
        };
        for name in &config.attach {
            tamer.attach(name, name).map_err(|err| match err {
                TamerError::Statement(source) => TamerError::Connection {
                    location: tamer.location.to_string(),
                    source,
                },
                other => other,
            })?;
        }
        Ok(tamer)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open(Location::Memory, &TamerConfig::default())
    }

    /// Open `<folder>/<name>.<extension>`, creating the folder if needed.
    ///
    /// `":memory:"` as name opens an in-memory database instead.
    pub fn open_named(name: &str, config: &TamerConfig) -> Result<Self> {
        if name == crate::config::MEMORY {
            return Self::open(Location::Memory, config);
        }
        if !config.folder.as_os_str().is_empty() {
            fs::create_dir_all(&config.folder).map_err(|source| TamerError::CreateFolder {
                folder: config.folder.clone(),
                source,
            })?;
        }
        Self::open(config.database_path(name), config)
    }

    /// Execute one statement and commit it if it changed the database.
    ///
    /// A statement is mutating when SQLite does not report it read-only
    /// (`sqlite3_stmt_readonly`). After such a statement succeeds, any open
    /// transaction is committed, so nothing is left pending when this returns.
    /// Reads, transaction control and `ATTACH`/`DETACH` never commit.
    /// Text holding only whitespace and comments is a no-op.
    pub fn execute(&self, sql: &str, params: impl Into<Params>) -> Result<Executed> {
        let conn = self.connection()?;
        let params = params.into();
        let (executed, mutating) = run_statement(conn, sql, &params)?;
        if mutating && !conn.is_autocommit() {
            debug!(sql, "committing after mutating statement");
            conn.execute_batch("COMMIT")?;
        }
        Ok(executed)
    }

    /// Execute a statement and return its rows.
    pub fn query(&self, sql: &str, params: impl Into<Params>) -> Result<ResultSet> {
        Ok(self.execute(sql, params)?.into_rows())
    }

    /// Execute a statement and return its first row, if any.
    pub fn query_row(&self, sql: &str, params: impl Into<Params>) -> Result<Option<Row>> {
        Ok(self.query(sql, params)?.into_iter().next())
    }

    /// Release the connection. Calling it again is a no-op.
    pub fn close(&mut self) -> Result<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        match conn.close() {
            Ok(()) => {
                info!(location = %self.location, "closed database");
                self.attached.clear();
                Ok(())
            }
            Err((conn, err)) => {
                warn!(location = %self.location, error = %err, "couldn't close database");
                self.conn = Some(conn);
                Err(TamerError::Statement(err))
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.conn.is_none()
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    /// The native connection, for anything this handle doesn't wrap.
    pub fn connection(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(TamerError::ClosedHandle)
    }

    pub fn connection_mut(&mut self) -> Result<&mut Connection> {
        self.conn.as_mut().ok_or(TamerError::ClosedHandle)
    }

    /// Begin an explicit transaction; it is not auto-committed.
    pub fn transaction(&mut self) -> Result<Transaction<'_>> {
        Ok(self.connection_mut()?.transaction()?)
    }

    /// Run several `;`-separated statements with SQLite's own semantics.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        Ok(self.connection()?.execute_batch(sql)?)
    }

    pub fn pragma_update<V: ToSql>(&self, name: &str, value: V) -> Result<()> {
        Ok(self.connection()?.pragma_update(None, name, value)?)
    }

    /// Whether no transaction is currently open.
    pub fn is_autocommit(&self) -> Result<bool> {
        Ok(self.connection()?.is_autocommit())
    }

    /// Attach the sibling database `name` (same folder and extension) as `schema`.
    pub fn attach(&mut self, schema: &str, name: &str) -> Result<()> {
        let path = database_path(&self.folder, name, &self.extension);
        self.attach_path(schema, path)
    }

    pub fn attach_path(&mut self, schema: &str, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        info!(path = %path.display(), schema, "attaching database");
        self.execute(
            "ATTACH DATABASE ?1 AS ?2",
            Params::new()
                .with(path.to_string_lossy().into_owned())
                .with(schema),
        )?;
        self.attached.push(schema.to_string());
        Ok(())
    }

    pub fn detach(&mut self, schema: &str) -> Result<()> {
        info!(schema, "detaching database");
        self.execute("DETACH DATABASE ?1", Params::new().with(schema))?;
        self.attached.retain(|attached| attached != schema);
        Ok(())
    }

    /// Schemas attached through this handle.
    pub fn attached(&self) -> &[String] {
        &self.attached
    }

    /// Close the handle and delete its database file.
    pub fn drop_database(mut self) -> Result<()> {
        let path = self.location.path().ok_or(TamerError::InMemory)?.to_path_buf();
        self.close()?;
        fs::remove_file(&path).map_err(|source| TamerError::RemoveDatabase {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "removed database file");
        Ok(())
    }
}

fn configure(conn: &Connection, config: &TamerConfig) -> rusqlite::Result<()> {
    if let Some(timeout) = config.busy_timeout {
        conn.busy_timeout(timeout)?;
    }
    for (name, value) in &config.pragmas {
        conn.pragma_update(None, name, value)?;
    }
    Ok(())
}

/// Prepare, bind and run one statement. Returns whether it was mutating.
fn run_statement(
    conn: &Connection,
    sql: &str,
    params: &Params,
) -> rusqlite::Result<(Executed, bool)> {
    if is_blank(sql) {
        let executed = Executed::Changed {
            rows: 0,
            last_insert_rowid: conn.last_insert_rowid(),
        };
        return Ok((executed, false));
    }
    let mut stmt = conn.prepare(sql)?;
    let mutating = !stmt.readonly();
    params.bind(&mut stmt)?;

    let executed = if stmt.column_count() > 0 {
        let columns: Arc<[String]> = stmt.column_names().into_iter().map(String::from).collect();
        let mut fetched = Vec::new();
        let mut rows = stmt.raw_query();
        while let Some(row) = rows.next()? {
            let values = (0..columns.len())
                .map(|idx| row.get_ref(idx).map(Value::from))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            fetched.push(Row::new(Arc::clone(&columns), values));
        }
        Executed::Rows(ResultSet::new(columns, fetched))
    } else {
        let rows = stmt.raw_execute()?;
        Executed::Changed {
            rows,
            last_insert_rowid: conn.last_insert_rowid(),
        }
    };
    debug!(sql, mutating, "executed statement");
    Ok((executed, mutating))
}

/// Whether `sql` holds nothing but whitespace, `;` and comments.
fn is_blank(sql: &str) -> bool {
    let mut rest = sql;
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ';');
        if let Some(comment) = rest.strip_prefix("--") {
            rest = comment.split_once('\n').map_or("", |(_, tail)| tail);
        } else if let Some(comment) = rest.strip_prefix("/*") {
            rest = comment.split_once("*/").map_or("", |(_, tail)| tail);
        } else {
            return rest.is_empty();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_statements_are_detected() {
        assert!(is_blank(""));
        assert!(is_blank("  ;\n\t"));
        assert!(is_blank("-- nothing here\n/* or here */ ;"));
        assert!(!is_blank("-- comment\nSELECT 1"));
        assert!(!is_blank("/* lead */ INSERT INTO t VALUES (1)"));
    }
}
