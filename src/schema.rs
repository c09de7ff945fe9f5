//! Table definitions and JSON database layouts.
//!
//! A layout file maps database names to tables, and tables to columns with
//! their SQLite declarations:
//!
//! ```json
//! {
//!     "person":  { "person":  { "lastname": "TEXT NOT NULL", "firstname": "TEXT" } },
//!     "contact": { "_attach_": ["person"], "contact": { "person_id": "INTEGER" } }
//! }
//! ```
//!
//! `_attach_` lists databases (by name, same folder and extension) attached
//! to the one being defined.

use crate::config::TamerConfig;
use crate::error::{Result, TamerError};
use crate::handle::Tamer;
use crate::query::quote_identifier;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

/// Layout key listing databases to attach.
pub const ATTACH_KEY: &str = "_attach_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    /// Table-level primary key; leave empty when a column carries it.
    #[serde(default)]
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,
    #[serde(default)]
    pub indexes: Vec<IndexDefinition>,
}

impl TableDefinition {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    pub fn primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn foreign_key(mut self, key: ForeignKey) -> Self {
        self.foreign_keys.push(key);
        self
    }

    pub fn index(mut self, index: IndexDefinition) -> Self {
        self.indexes.push(index);
        self
    }

    /// `CREATE TABLE IF NOT EXISTS` statement for this table.
    pub fn create_sql(&self) -> String {
        let mut parts: Vec<String> = self.columns.iter().map(ColumnDefinition::to_sql).collect();
        if !self.primary_key.is_empty() {
            parts.push(format!("PRIMARY KEY({})", quote_list(&self.primary_key)));
        }
        parts.extend(self.foreign_keys.iter().map(ForeignKey::to_sql));
        format!(
            "CREATE TABLE IF NOT EXISTS {}({})",
            quote_identifier(&self.name),
            parts.join(", ")
        )
    }

    /// Read a typed definition, as written by [`TableDefinition::to_json`].
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Set `column`'s declaration, appending the column if it is new.
    fn merge_column(&mut self, column: ColumnDefinition) {
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: Option<DataType>,
    #[serde(default)]
    pub constraints: Vec<ColumnConstraint>,
    pub default_value: Option<DefaultValue>,
}

impl ColumnDefinition {
    pub fn new(name: &str, data_type: DataType) -> Self {
        Self {
            name: name.to_string(),
            data_type: Some(data_type),
            constraints: Vec::new(),
            default_value: None,
        }
    }

    /// A column whose declaration is raw SQLite text, e.g. `"TEXT NOT NULL"`.
    pub fn declared(name: &str, declaration: &str) -> Self {
        let declaration = declaration.trim();
        Self {
            name: name.to_string(),
            data_type: None,
            constraints: if declaration.is_empty() {
                Vec::new()
            } else {
                vec![ColumnConstraint::Declaration(declaration.to_string())]
            },
            default_value: None,
        }
    }

    pub fn constraint(mut self, constraint: ColumnConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn default_value(mut self, value: DefaultValue) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn to_sql(&self) -> String {
        let mut sql = quote_identifier(&self.name);
        if let Some(data_type) = self.data_type {
            sql.push(' ');
            sql.push_str(data_type.as_sql());
        }
        for constraint in &self.constraints {
            sql.push(' ');
            sql.push_str(&constraint.to_sql());
        }
        if let Some(default) = &self.default_value {
            sql.push_str(" DEFAULT ");
            sql.push_str(&default.to_sql());
        }
        sql
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Integer,
    Text,
    Real,
    Blob,
}

impl DataType {
    pub fn as_sql(self) -> &'static str {
        match self {
            DataType::Integer => "INTEGER",
            DataType::Text => "TEXT",
            DataType::Real => "REAL",
            DataType::Blob => "BLOB",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnConstraint {
    PrimaryKey,
    NotNull,
    Unique,
    /// Raw declaration text passed to SQLite unchanged.
    Declaration(String),
}

impl ColumnConstraint {
    fn to_sql(&self) -> String {
        match self {
            ColumnConstraint::PrimaryKey => "PRIMARY KEY".to_string(),
            ColumnConstraint::NotNull => "NOT NULL".to_string(),
            ColumnConstraint::Unique => "UNIQUE".to_string(),
            ColumnConstraint::Declaration(text) => text.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DefaultValue {
    Integer(i64),
    Text(String),
    Real(f64),
    Null,
    CurrentTimestamp,
}

impl DefaultValue {
    fn to_sql(&self) -> String {
        match self {
            DefaultValue::Integer(i) => i.to_string(),
            DefaultValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
            // `{:?}` keeps the fractional part, so SQLite stores a REAL
            DefaultValue::Real(r) => format!("{r:?}"),
            DefaultValue::Null => "NULL".to_string(),
            DefaultValue::CurrentTimestamp => "CURRENT_TIMESTAMP".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub column: String,
    pub foreign_table: String,
    pub foreign_column: String,
    pub on_delete: ForeignKeyAction,
    pub on_update: ForeignKeyAction,
}

impl ForeignKey {
    fn to_sql(&self) -> String {
        format!(
            "FOREIGN KEY({}) REFERENCES {}({}) ON DELETE {} ON UPDATE {}",
            quote_identifier(&self.column),
            quote_identifier(&self.foreign_table),
            quote_identifier(&self.foreign_column),
            self.on_delete.as_sql(),
            self.on_update.as_sql()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForeignKeyAction {
    NoAction,
    Cascade,
    SetNull,
    SetDefault,
    Restrict,
}

impl ForeignKeyAction {
    fn as_sql(self) -> &'static str {
        match self {
            ForeignKeyAction::NoAction => "NO ACTION",
            ForeignKeyAction::Cascade => "CASCADE",
            ForeignKeyAction::SetNull => "SET NULL",
            ForeignKeyAction::SetDefault => "SET DEFAULT",
            ForeignKeyAction::Restrict => "RESTRICT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

impl IndexDefinition {
    pub fn create_sql(&self, table: &str) -> String {
        let unique = if self.unique { "UNIQUE " } else { "" };
        format!(
            "CREATE {unique}INDEX IF NOT EXISTS {} ON {}({})",
            quote_identifier(&self.name),
            quote_identifier(table),
            quote_list(&self.columns)
        )
    }
}

fn quote_list(names: &[String]) -> String {
    names
        .iter()
        .map(|name| quote_identifier(name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// One database of a layout: its tables and the databases it attaches.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseDefinition {
    pub name: String,
    pub attach: Vec<String>,
    pub tables: Vec<TableDefinition>,
}

/// Databases described by a JSON layout, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatabaseLayout {
    pub databases: Vec<DatabaseDefinition>,
}

impl DatabaseLayout {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let root: Map<String, JsonValue> = serde_json::from_str(json)?;
        let mut databases = Vec::with_capacity(root.len());
        for (db_name, entries) in root {
            let entries = as_object(&entries, &db_name)?;
            let mut database = DatabaseDefinition {
                name: db_name.clone(),
                attach: Vec::new(),
                tables: Vec::new(),
            };
            for (key, value) in entries {
                if key == ATTACH_KEY {
                    database.attach = parse_attach(value, &db_name)?;
                } else {
                    let mut table = TableDefinition::new(key);
                    table.columns = parse_columns(value, &format!("{db_name}.{key}"))?;
                    database.tables.push(table);
                }
            }
            databases.push(database);
        }
        Ok(Self { databases })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&read_layout_file(path.as_ref())?)
    }

    /// Parse a defaults file: a single object of column declarations.
    pub fn defaults_from_json_str(json: &str) -> Result<Vec<ColumnDefinition>> {
        let value: JsonValue = serde_json::from_str(json)?;
        parse_columns(&value, "defaults")
    }

    pub fn defaults_from_path(path: impl AsRef<Path>) -> Result<Vec<ColumnDefinition>> {
        Self::defaults_from_json_str(&read_layout_file(path.as_ref())?)
    }

    /// Add `defaults` to every table; an existing column keeps its position
    /// but takes the default's declaration.
    pub fn apply_defaults(&mut self, defaults: &[ColumnDefinition]) {
        for table in self.databases.iter_mut().flat_map(|db| db.tables.iter_mut()) {
            for column in defaults {
                table.merge_column(column.clone());
            }
        }
    }
}

fn read_layout_file(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|err| TamerError::Layout(format!("couldn't read {}: {err}", path.display())))
}

fn as_object<'a>(value: &'a JsonValue, context: &str) -> Result<&'a Map<String, JsonValue>> {
    value
        .as_object()
        .ok_or_else(|| TamerError::Layout(format!("'{context}' must be a JSON object")))
}

fn parse_attach(value: &JsonValue, context: &str) -> Result<Vec<String>> {
    let invalid = || {
        TamerError::Layout(format!(
            "'{ATTACH_KEY}' of '{context}' must be a list of names"
        ))
    };
    value
        .as_array()
        .ok_or_else(invalid)?
        .iter()
        .map(|name| name.as_str().map(str::to_string).ok_or_else(invalid))
        .collect()
}

fn parse_columns(value: &JsonValue, context: &str) -> Result<Vec<ColumnDefinition>> {
    as_object(value, context)?
        .iter()
        .map(|(name, declaration)| match declaration {
            JsonValue::String(text) => Ok(ColumnDefinition::declared(name, text)),
            JsonValue::Null => Ok(ColumnDefinition::declared(name, "")),
            _ => Err(TamerError::Layout(format!(
                "declaration of '{context}.{name}' must be a string"
            ))),
        })
        .collect()
}

impl Tamer {
    /// Open every database of `layout` by name and create its tables.
    ///
    /// Databases are opened in layout order, so a database should be listed
    /// after the ones it attaches.
    pub fn create_from_layout(
        layout: &DatabaseLayout,
        config: &TamerConfig,
    ) -> Result<BTreeMap<String, Tamer>> {
        let mut handles = BTreeMap::new();
        for database in &layout.databases {
            let mut db_config = config.clone();
            db_config.attach.extend(database.attach.iter().cloned());
            let tamer = Tamer::open_named(&database.name, &db_config)?;
            for table in &database.tables {
                tamer.create_table(table)?;
            }
            info!(
                database = %database.name,
                tables = database.tables.len(),
                "created database from layout"
            );
            handles.insert(database.name.clone(), tamer);
        }
        Ok(handles)
    }

    /// Read a JSON layout (and optional defaults file) and create it.
    pub fn create_from_json(
        layout: impl AsRef<Path>,
        defaults: Option<&Path>,
        config: &TamerConfig,
    ) -> Result<BTreeMap<String, Tamer>> {
        let mut layout = DatabaseLayout::from_path(layout)?;
        if let Some(defaults) = defaults {
            layout.apply_defaults(&DatabaseLayout::defaults_from_path(defaults)?);
        }
        Self::create_from_layout(&layout, config)
    }
}
