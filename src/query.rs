//! Conditions and CRUD operations rendered to parameterised SQL.

use crate::value::{Params, Value};

/// How the conditions of a [`Query`] are combined.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Logic {
    /// Any condition holds.
    #[default]
    Or,
    /// Every condition holds.
    And,
    /// No condition holds.
    Not,
}

/// Query operators for building advanced queries
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOperator {
    Equal(Value),
    NotEqual(Value),
    GreaterThan(Value),
    GreaterThanOrEqual(Value),
    LessThan(Value),
    LessThanOrEqual(Value),
    Like(String),
    In(Vec<Value>),
}

impl QueryOperator {
    fn render(&self, column: &str, bound: &mut Vec<Value>) -> String {
        let (op, value) = match self {
            QueryOperator::Equal(v) => ("=", v.clone()),
            QueryOperator::NotEqual(v) => ("<>", v.clone()),
            QueryOperator::GreaterThan(v) => (">", v.clone()),
            QueryOperator::GreaterThanOrEqual(v) => (">=", v.clone()),
            QueryOperator::LessThan(v) => ("<", v.clone()),
            QueryOperator::LessThanOrEqual(v) => ("<=", v.clone()),
            QueryOperator::Like(pattern) => ("LIKE", Value::Text(pattern.clone())),
            QueryOperator::In(values) => {
                let marks = vec!["?"; values.len()].join(", ");
                bound.extend(values.iter().cloned());
                return format!("{column} IN ({marks})");
            }
        };
        bound.push(value);
        format!("{column} {op} ?")
    }
}

/// Query builder for composable, immutable queries
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Query {
    pub conditions: Vec<(String, QueryOperator)>,
    pub logic: Logic,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_condition(mut self, field: &str, op: QueryOperator) -> Self {
        self.conditions.push((field.to_string(), op));
        self
    }

    /// Shorthand for an equality condition.
    pub fn with_eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.with_condition(field, QueryOperator::Equal(value.into()))
    }

    pub fn with_logic(mut self, logic: Logic) -> Self {
        self.logic = logic;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// ` WHERE ...` clause, or an empty string without conditions.
    pub(crate) fn where_clause(&self, bound: &mut Vec<Value>) -> String {
        if self.conditions.is_empty() {
            return String::new();
        }
        let terms: Vec<String> = self
            .conditions
            .iter()
            .map(|(column, op)| op.render(&quote_identifier(column), bound))
            .collect();
        match self.logic {
            Logic::Or => format!(" WHERE {}", terms.join(" OR ")),
            Logic::And => format!(" WHERE {}", terms.join(" AND ")),
            Logic::Not => format!(" WHERE NOT ({})", terms.join(" OR ")),
        }
    }
}

/// CRUD operation types
#[derive(Debug, Clone, PartialEq)]
pub struct CreateOperation {
    pub table: String,
    pub data: Vec<(String, Value)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadOperation {
    pub table: String,
    pub query: Query,
    /// Column expressions to select, written as given; `None` selects `*`.
    pub fields: Option<Vec<String>>,
    pub distinct: bool,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub order_by: Option<Vec<(String, bool)>>, // (field, is_ascending)
}

impl ReadOperation {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            query: Query::new(),
            fields: None,
            distinct: false,
            limit: None,
            offset: None,
            order_by: None,
        }
    }

    pub fn with_query(mut self, query: Query) -> Self {
        self.query = query;
        self
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn order_by(mut self, field: &str, ascending: bool) -> Self {
        self.order_by
            .get_or_insert_with(Vec::new)
            .push((field.to_string(), ascending));
        self
    }

    pub(crate) fn to_sql(&self) -> (String, Params) {
        let mut bound = Vec::new();
        let fields = match &self.fields {
            Some(fields) if !fields.is_empty() => fields.join(", "),
            _ => "*".to_string(),
        };
        let distinct = if self.distinct { " DISTINCT" } else { "" };
        let mut sql = format!(
            "SELECT{distinct} {fields} FROM {}{}",
            quote_identifier(&self.table),
            self.query.where_clause(&mut bound)
        );
        if let Some(order_by) = self.order_by.as_ref().filter(|o| !o.is_empty()) {
            let terms: Vec<String> = order_by
                .iter()
                .map(|(field, ascending)| {
                    let dir = if *ascending { "ASC" } else { "DESC" };
                    format!("{} {dir}", quote_identifier(field))
                })
                .collect();
            sql.push_str(&format!(" ORDER BY {}", terms.join(", ")));
        }
        // SQLite only accepts OFFSET after a LIMIT; -1 means unbounded.
        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
            (None, None) => {}
        }
        (sql, Params::from(bound))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOperation {
    pub table: String,
    pub query: Query,
    pub updates: Vec<(String, Value)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteOperation {
    pub table: String,
    pub query: Query,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CrudOperation {
    Create(CreateOperation),
    Read(ReadOperation),
    Update(UpdateOperation),
    Delete(DeleteOperation),
}

impl CreateOperation {
    pub(crate) fn to_sql(&self) -> (String, Params) {
        let table = quote_identifier(&self.table);
        if self.data.is_empty() {
            return (format!("INSERT INTO {table} DEFAULT VALUES"), Params::new());
        }
        let columns: Vec<String> = self.data.iter().map(|(c, _)| quote_identifier(c)).collect();
        let marks = vec!["?"; self.data.len()].join(", ");
        let values: Vec<Value> = self.data.iter().map(|(_, v)| v.clone()).collect();
        (
            format!("INSERT INTO {table}({}) VALUES({marks})", columns.join(", ")),
            Params::from(values),
        )
    }
}

impl UpdateOperation {
    pub(crate) fn to_sql(&self) -> (String, Params) {
        let mut bound: Vec<Value> = self.updates.iter().map(|(_, v)| v.clone()).collect();
        let sets: Vec<String> = self
            .updates
            .iter()
            .map(|(c, _)| format!("{} = ?", quote_identifier(c)))
            .collect();
        let sql = format!(
            "UPDATE {} SET {}{}",
            quote_identifier(&self.table),
            sets.join(", "),
            self.query.where_clause(&mut bound)
        );
        (sql, Params::from(bound))
    }
}

impl DeleteOperation {
    pub(crate) fn to_sql(&self) -> (String, Params) {
        let mut bound = Vec::new();
        let sql = format!(
            "DELETE FROM {}{}",
            quote_identifier(&self.table),
            self.query.where_clause(&mut bound)
        );
        (sql, Params::from(bound))
    }
}

/// Quote an identifier for SQLite, part by part for `schema.table` names.
pub fn quote_identifier(name: &str) -> String {
    name.split('.')
        .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_quoted_per_part() {
        assert_eq!(quote_identifier("movies"), "\"movies\"");
        assert_eq!(quote_identifier("person.person"), "\"person\".\"person\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn conditions_default_to_or() {
        let op = DeleteOperation {
            table: "movies".into(),
            query: Query::new().with_eq("title", "2012").with_eq("year", 2012),
        };
        let (sql, params) = op.to_sql();
        assert_eq!(sql, "DELETE FROM \"movies\" WHERE \"title\" = ? OR \"year\" = ?");
        assert_eq!(
            params.positional,
            vec![Value::Text("2012".into()), Value::Integer(2012)]
        );
    }

    #[test]
    fn not_negates_the_whole_condition_list() {
        let query = Query::new().with_eq("viewed", 1).with_logic(Logic::Not);
        let mut bound = Vec::new();
        assert_eq!(query.where_clause(&mut bound), " WHERE NOT (\"viewed\" = ?)");
        assert_eq!(bound, vec![Value::Integer(1)]);
    }

    #[test]
    fn update_binds_set_values_before_conditions() {
        let op = UpdateOperation {
            table: "movies".into(),
            query: Query::new()
                .with_eq("title", "Star Wars")
                .with_eq("year", 1977)
                .with_logic(Logic::And),
            updates: vec![("viewed".into(), Value::Integer(2013))],
        };
        let (sql, params) = op.to_sql();
        assert_eq!(
            sql,
            "UPDATE \"movies\" SET \"viewed\" = ? WHERE \"title\" = ? AND \"year\" = ?"
        );
        assert_eq!(params.positional[0], Value::Integer(2013));
        assert_eq!(params.positional.len(), 3);
    }

    #[test]
    fn read_renders_distinct_order_and_paging() {
        let years = QueryOperator::In(vec![1977.into(), 2012.into()]);
        let read = ReadOperation::new("movies")
            .with_fields(["title"])
            .distinct()
            .with_query(Query::new().with_condition("year", years))
            .order_by("year", false)
            .with_offset(2);
        let (sql, params) = read.to_sql();
        assert_eq!(
            sql,
            "SELECT DISTINCT title FROM \"movies\" WHERE \"year\" IN (?, ?) \
             ORDER BY \"year\" DESC LIMIT -1 OFFSET 2"
        );
        assert_eq!(params.positional.len(), 2);
    }

    #[test]
    fn insert_without_values_uses_defaults() {
        let op = CreateOperation {
            table: "log".into(),
            data: Vec::new(),
        };
        assert_eq!(op.to_sql().0, "INSERT INTO \"log\" DEFAULT VALUES");
    }
}
