//! Table and row helpers on [`Tamer`].
//!
//! Mutations are committed before returning: most helpers run through
//! [`Tamer::execute`], and [`Tamer::drop_column`] commits explicitly.

use crate::error::{Result, TamerError};
use crate::handle::Tamer;
use crate::query::{
    quote_identifier, CreateOperation, CrudOperation, DeleteOperation, Query, ReadOperation,
    UpdateOperation,
};
use crate::schema::{ColumnDefinition, TableDefinition};
use crate::value::{Executed, ResultSet, Value};
use rusqlite::Connection;
use tracing::{debug, warn};

impl Tamer {
    /// Create `table` and its indexes unless they already exist.
    pub fn create_table(&self, table: &TableDefinition) -> Result<()> {
        self.execute(&table.create_sql(), ())?;
        for index in &table.indexes {
            self.execute(&index.create_sql(&table.name), ())?;
        }
        Ok(())
    }

    /// Insert one row and return its rowid.
    pub fn insert<I, K>(&self, table: &str, values: I) -> Result<i64>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let op = CreateOperation {
            table: table.to_string(),
            data: values.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        };
        let (sql, params) = op.to_sql();
        let executed = self.execute(&sql, params)?;
        Ok(executed.last_insert_rowid().unwrap_or_default())
    }

    pub fn select(&self, read: &ReadOperation) -> Result<ResultSet> {
        let (sql, params) = read.to_sql();
        self.query(&sql, params)
    }

    /// Update rows matching `query`; returns the number of rows changed.
    pub fn update<I, K>(&self, table: &str, updates: I, query: &Query) -> Result<usize>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let op = UpdateOperation {
            table: table.to_string(),
            query: query.clone(),
            updates: updates.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        };
        let (sql, params) = op.to_sql();
        Ok(self.execute(&sql, params)?.changes())
    }

    /// Delete rows matching `query`; an empty query deletes every row.
    pub fn delete(&self, table: &str, query: &Query) -> Result<usize> {
        let op = DeleteOperation {
            table: table.to_string(),
            query: query.clone(),
        };
        let (sql, params) = op.to_sql();
        Ok(self.execute(&sql, params)?.changes())
    }

    /// Perform a CRUD operation (type-safe API)
    pub fn apply(&self, op: &CrudOperation) -> Result<Executed> {
        let (sql, params) = match op {
            CrudOperation::Create(op) => op.to_sql(),
            CrudOperation::Read(op) => op.to_sql(),
            CrudOperation::Update(op) => op.to_sql(),
            CrudOperation::Delete(op) => op.to_sql(),
        };
        self.execute(&sql, params)
    }

    pub fn rename_table(&self, table: &str, new_name: &str) -> Result<()> {
        let sql = format!(
            "ALTER TABLE {} RENAME TO {}",
            quote_identifier(table),
            quote_identifier(new_name)
        );
        self.execute(&sql, ())?;
        Ok(())
    }

    pub fn add_column(&self, table: &str, column: &ColumnDefinition) -> Result<()> {
        let sql = format!(
            "ALTER TABLE {} ADD COLUMN {}",
            quote_identifier(table),
            column.to_sql()
        );
        self.execute(&sql, ())?;
        Ok(())
    }

    pub fn drop_table(&self, table: &str) -> Result<()> {
        self.execute(&format!("DROP TABLE IF EXISTS {}", quote_identifier(table)), ())?;
        Ok(())
    }

    /// Drop `column` from `table`.
    ///
    /// Runs inside a savepoint, which is rolled back if the database no
    /// longer satisfies `PRAGMA foreign_key_check` afterwards. A transaction
    /// the caller left open is committed either way.
    pub fn drop_column(&self, table: &str, column: &str) -> Result<()> {
        if !self
            .columns(table)?
            .iter()
            .any(|existing| existing.eq_ignore_ascii_case(column))
        {
            return Err(TamerError::UnknownColumn {
                table: table.to_string(),
                column: column.to_string(),
            });
        }

        let conn = self.connection()?;
        conn.execute_batch("SAVEPOINT tamer_drop_column")?;
        let outcome = drop_and_check(conn, table, column);
        if matches!(outcome, Ok(0)) {
            conn.execute_batch("RELEASE tamer_drop_column")?;
        } else if let Err(err) =
            conn.execute_batch("ROLLBACK TO tamer_drop_column; RELEASE tamer_drop_column")
        {
            warn!(table, column, error = %err, "couldn't roll back column drop");
        }
        if !conn.is_autocommit() {
            conn.execute_batch("COMMIT")?;
        }

        match outcome? {
            0 => {
                debug!(table, column, "dropped column");
                Ok(())
            }
            violations => Err(TamerError::ForeignKeyViolation(violations)),
        }
    }

    /// Column names of `table` in declaration order; empty if it doesn't exist.
    pub fn columns(&self, table: &str) -> Result<Vec<String>> {
        let sql = match table.split_once('.') {
            Some((schema, name)) => format!(
                "PRAGMA {}.table_info({})",
                quote_identifier(schema),
                quote_identifier(name)
            ),
            None => format!("PRAGMA table_info({})", quote_identifier(table)),
        };
        Ok(self
            .query(&sql, ())?
            .iter()
            .filter_map(|row| row.get_by_name("name").and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }

    /// Names of user tables in the main database.
    pub fn tables(&self) -> Result<Vec<String>> {
        let read = ReadOperation::new("sqlite_master")
            .with_fields(["name"])
            .with_query(Query::new().with_eq("type", "table"));
        Ok(self
            .select(&read)?
            .iter()
            .filter_map(|row| row.get(0).and_then(Value::as_str))
            .filter(|name| !name.starts_with("sqlite_"))
            .map(str::to_string)
            .collect())
    }
}

/// Drop the column and count the foreign key violations left behind.
fn drop_and_check(conn: &Connection, table: &str, column: &str) -> Result<usize> {
    conn.execute_batch(&format!(
        "ALTER TABLE {} DROP COLUMN {}",
        quote_identifier(table),
        quote_identifier(column)
    ))?;
    let mut stmt = conn.prepare("PRAGMA foreign_key_check")?;
    let mut rows = stmt.query([])?;
    let mut violations = 0;
    while rows.next()?.is_some() {
        violations += 1;
    }
    Ok(violations)
}
