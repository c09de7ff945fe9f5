use anyhow::Result;
use sqlite_tamer::rusqlite::ErrorCode;
use sqlite_tamer::{Executed, Params, Tamer, TamerConfig, TamerError, Value};
use std::path::PathBuf;
use tempfile::TempDir;

// Helper function to create an in-memory database for testing
fn create_test_db() -> Result<Tamer> {
    let tamer = Tamer::open_in_memory()?;
    initialize_schema(&tamer)?;
    Ok(tamer)
}

// Helper function to create a file-based database in a scratch folder
fn create_temp_db() -> Result<(Tamer, PathBuf, TempDir)> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("test.db");
    let tamer = Tamer::open(&path, &TamerConfig::default())?;
    initialize_schema(&tamer)?;
    Ok((tamer, path, dir))
}

fn initialize_schema(tamer: &Tamer) -> Result<()> {
    tamer.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT UNIQUE)", ())?;
    Ok(())
}

fn count_rows(tamer: &Tamer) -> Result<i64> {
    let row = tamer
        .query_row("SELECT COUNT(*) FROM t", ())?
        .expect("COUNT(*) always returns a row");
    Ok(row[0].as_i64().unwrap_or_default())
}

#[test]
fn test_insert_survives_reopen() {
    test_insert_survives_reopen_impl().unwrap();
}

fn test_insert_survives_reopen_impl() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("fresh.db");

    let mut tamer = Tamer::open(&path, &TamerConfig::default())?;
    tamer.execute("CREATE TABLE t(id INTEGER)", ())?;
    tamer.execute("INSERT INTO t VALUES (1)", ())?;
    tamer.close()?;

    let tamer = Tamer::open(&path, &TamerConfig::default())?;
    let rows = tamer.query("SELECT * FROM t", ())?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows.rows()[0].values(), &[Value::Integer(1)]);
    Ok(())
}

#[test]
fn test_mutation_commits_open_transaction() {
    test_mutation_commits_open_transaction_impl().unwrap();
}

fn test_mutation_commits_open_transaction_impl() -> Result<()> {
    let (tamer, path, _dir) = create_temp_db()?;

    tamer.execute_batch("BEGIN")?;
    assert!(!tamer.is_autocommit()?);

    let executed = tamer.execute(
        "INSERT INTO t (name) VALUES (?1)",
        Params::new().with("committed"),
    )?;
    assert_eq!(executed.changes(), 1);
    assert!(tamer.is_autocommit()?);

    // a second handle only sees committed data
    let other = Tamer::open(&path, &TamerConfig::default())?;
    assert_eq!(count_rows(&other)?, 1);
    Ok(())
}

#[test]
fn test_read_leaves_transaction_alone() -> Result<()> {
    let tamer = create_test_db()?;

    tamer.execute("BEGIN", ())?;
    // native calls bypass auto-commit
    tamer
        .connection()?
        .execute("INSERT INTO t (name) VALUES ('pending')", [])?;
    assert_eq!(count_rows(&tamer)?, 1);
    assert!(!tamer.is_autocommit()?);

    tamer.execute_batch("ROLLBACK")?;
    assert_eq!(count_rows(&tamer)?, 0);
    Ok(())
}

#[test]
fn test_native_transaction_is_not_intercepted() -> Result<()> {
    let mut tamer = create_test_db()?;

    let tx = tamer.transaction()?;
    tx.execute("INSERT INTO t (name) VALUES ('a')", [])?;
    tx.rollback()?;
    assert_eq!(count_rows(&tamer)?, 0);

    let tx = tamer.transaction()?;
    tx.execute("INSERT INTO t (name) VALUES ('b')", [])?;
    tx.commit()?;
    assert_eq!(count_rows(&tamer)?, 1);
    Ok(())
}

#[test]
fn test_invalid_location_fails_to_connect() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("db.sqlite");

    let err = Tamer::open(&path, &TamerConfig::default()).unwrap_err();
    assert!(matches!(err, TamerError::Connection { .. }), "{err:?}");
    assert!(err.sqlite_error().is_some());
}

#[test]
fn test_syntax_error_commits_nothing() -> Result<()> {
    let tamer = create_test_db()?;

    tamer.execute_batch("BEGIN")?;
    tamer
        .connection()?
        .execute("INSERT INTO t (name) VALUES ('pending')", [])?;

    let err = tamer.execute("SELEKT * FROM t", ()).unwrap_err();
    assert!(matches!(err, TamerError::Statement(_)), "{err:?}");
    assert!(!tamer.is_autocommit()?);

    tamer.execute_batch("ROLLBACK")?;
    assert_eq!(count_rows(&tamer)?, 0);
    Ok(())
}

#[test]
fn test_constraint_violation_is_surfaced() -> Result<()> {
    let tamer = create_test_db()?;
    tamer.execute("INSERT INTO t (name) VALUES ('dup')", ())?;

    let err = tamer
        .execute("INSERT INTO t (name) VALUES ('dup')", ())
        .unwrap_err();
    match err.sqlite_error() {
        Some(sqlite_tamer::rusqlite::Error::SqliteFailure(failure, _)) => {
            assert_eq!(failure.code, ErrorCode::ConstraintViolation)
        }
        other => panic!("expected a constraint violation, got {other:?}"),
    }
    assert_eq!(count_rows(&tamer)?, 1);
    Ok(())
}

#[test]
fn test_closed_handle() -> Result<()> {
    let mut tamer = create_test_db()?;
    tamer.close()?;
    tamer.close()?;

    assert!(tamer.is_closed());
    assert!(matches!(
        tamer.execute("SELECT 1", ()),
        Err(TamerError::ClosedHandle)
    ));
    assert!(matches!(tamer.connection(), Err(TamerError::ClosedHandle)));
    assert!(matches!(tamer.execute_batch("SELECT 1"), Err(TamerError::ClosedHandle)));
    Ok(())
}

#[test]
fn test_parameter_styles() -> Result<()> {
    let tamer = create_test_db()?;

    tamer.execute(
        "INSERT INTO t (id, name) VALUES (:id, @name)",
        Params::new().with_value("id", 7).with_value("@name", "seven"),
    )?;
    tamer.execute(
        "INSERT INTO t (id, name) VALUES (?1, ?2)",
        vec![Value::Integer(8), Value::from("eight")],
    )?;

    let row = tamer
        .query_row("SELECT name FROM t WHERE id = ?", [Value::Integer(7)])?
        .unwrap();
    assert_eq!(row["name"], Value::Text("seven".into()));

    let err = tamer
        .execute("SELECT name FROM t WHERE id = ?", ())
        .unwrap_err();
    assert!(matches!(
        err,
        TamerError::Statement(sqlite_tamer::rusqlite::Error::InvalidParameterCount(0, 1))
    ));
    Ok(())
}

#[test]
fn test_returning_rows_are_committed() -> Result<()> {
    let (tamer, path, _dir) = create_temp_db()?;
    tamer.execute_batch("BEGIN")?;

    let executed = tamer.execute("INSERT INTO t (name) VALUES ('r') RETURNING id", ())?;
    let Executed::Rows(rows) = executed else {
        panic!("RETURNING yields rows");
    };
    assert_eq!(rows.columns(), ["id"]);
    assert!(tamer.is_autocommit()?);

    let other = Tamer::open(&path, &TamerConfig::default())?;
    assert_eq!(count_rows(&other)?, 1);
    Ok(())
}

#[test]
fn test_config_is_passed_to_engine() -> Result<()> {
    let config = TamerConfig::new()
        .with_busy_timeout(std::time::Duration::from_millis(250))
        .with_pragma("foreign_keys", true)
        .with_pragma("user_version", 42);
    let tamer = Tamer::open(":memory:", &config)?;

    let row = tamer.query_row("PRAGMA foreign_keys", ())?.unwrap();
    assert_eq!(row[0], Value::Integer(1));
    let row = tamer.query_row("PRAGMA user_version", ())?.unwrap();
    assert_eq!(row[0], Value::Integer(42));
    Ok(())
}

#[test]
fn test_failing_pragma_fails_to_connect() {
    let config = TamerConfig::new().with_pragma("journal_mode = wal; DROP", 1);
    let err = Tamer::open(":memory:", &config).unwrap_err();
    assert!(matches!(err, TamerError::Connection { .. }), "{err:?}");
}

#[test]
fn test_drop_database_removes_file() -> Result<()> {
    let (tamer, path, _dir) = create_temp_db()?;
    assert!(path.exists());
    tamer.drop_database()?;
    assert!(!path.exists());

    let err = Tamer::open_in_memory()?.drop_database().unwrap_err();
    assert!(matches!(err, TamerError::InMemory));
    Ok(())
}

#[test]
fn test_open_named_creates_folder() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let folder = dir.path().join("nested").join("data");
    let config = TamerConfig::new().with_folder(&folder).with_extension("sqlite");

    let tamer = Tamer::open_named("movies", &config)?;
    assert_eq!(tamer.location().path(), Some(folder.join("movies.sqlite").as_path()));
    assert!(folder.join("movies.sqlite").exists());

    let memory = Tamer::open_named(":memory:", &config)?;
    assert!(memory.location().is_memory());
    Ok(())
}

#[test]
fn test_blank_statement_is_a_no_op() -> Result<()> {
    let tamer = create_test_db()?;
    tamer.execute_batch("BEGIN")?;

    for sql in ["", "  ; ", "-- nothing to run\n/* still nothing */"] {
        let executed = tamer.execute(sql, ())?;
        assert_eq!(executed.changes(), 0);
        assert!(matches!(executed, Executed::Changed { .. }));
    }
    assert!(!tamer.is_autocommit()?);

    tamer.execute_batch("ROLLBACK")?;
    Ok(())
}
