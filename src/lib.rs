//! SQLite connection handle that commits mutating statements immediately.
//!
//! # Intention
//!
//! - Give callers the full `rusqlite` connection while removing the explicit
//!   commit step for statements that change the database.
//! - Offer small table/row helpers and JSON-described database layouts on top.
//!
//! # Architectural Boundaries
//!
//! - Storage, transactions and query planning stay in SQLite.
//! - No pooling, retries or migrations.
//!
//! ```no_run
//! use sqlite_tamer::{Tamer, TamerConfig};
//!
//! let tamer = Tamer::open("movies.db", &TamerConfig::default())?;
//! tamer.execute("CREATE TABLE IF NOT EXISTS movies(title TEXT)", ())?;
//! tamer.execute("INSERT INTO movies VALUES (?1)", sqlite_tamer::Params::new().with("Alien"))?;
//! # Ok::<(), sqlite_tamer::TamerError>(())
//! ```

pub mod config;
mod crud;
pub mod error;
pub mod handle;
pub mod query;
pub mod schema;
pub mod value;

pub use config::{Location, TamerConfig, DEFAULT_EXTENSION, MEMORY};
pub use error::{Result, TamerError};
pub use handle::Tamer;
pub use query::{
    CreateOperation, CrudOperation, DeleteOperation, Logic, Query, QueryOperator, ReadOperation,
    UpdateOperation,
};
pub use schema::{
    ColumnConstraint, ColumnDefinition, DataType, DatabaseDefinition, DatabaseLayout,
    DefaultValue, ForeignKey, ForeignKeyAction, IndexDefinition, TableDefinition,
};
pub use value::{Executed, Params, ResultSet, Row, Value};

pub use rusqlite;
