//! Compiles a [`QueryIntent`] into parameterized SQL
//!
//! Only whitelisted table and column names are spliced into SQL text. Search
//! terms, page size and offset are always bound as placeholders.
//!
//! # Example
//!
//! ```rust
//! use datagrid_service::compiler::{QueryCompiler, Sqlite, SqlParam};
//! use datagrid_service::intent::QueryIntent;
//! use datagrid_service::whitelist::{ColumnSpec, ColumnWhitelist};
//!
//! let whitelist = ColumnWhitelist::new(
//!     "products",
//!     vec![
//!         ColumnSpec::new("id").sortable(),
//!         ColumnSpec::new("name").searchable().globally_searchable(),
//!     ],
//! )
//! .unwrap();
//! let params: &[(&str, &str)] = &[
//!     ("search[value]", "foo"),
//!     ("columns[0][name]", "id"),
//!     ("columns[1][name]", "name"),
//! ];
//! let intent = QueryIntent::parse(params, &whitelist);
//!
//! let page = QueryCompiler::new(Sqlite).compile_select(&intent);
//! assert_eq!(
//!     page.sql,
//!     "SELECT id, name FROM products WHERE 1=1 AND (0=1 OR name LIKE ?1) LIMIT ?2 OFFSET ?3"
//! );
//! assert_eq!(page.params[0], SqlParam::Text("%foo%".to_string()));
//! ```

use std::fmt;

use crate::intent::QueryIntent;

/// Placeholder syntax of a SQL backend
pub trait Dialect: Clone + Copy + Send + Sync {
    /// Placeholder for the 1-based parameter `idx`
    fn param(&self, idx: usize) -> String;
}

/// `SQLite` placeholders: `?1`, `?2`, ...
#[derive(Debug, Clone, Copy, Default)]
pub struct Sqlite;

impl Dialect for Sqlite {
    #[inline]
    fn param(&self, idx: usize) -> String {
        format!("?{idx}")
    }
}

/// Postgres placeholders: `$1`, `$2`, ...
#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

impl Dialect for Postgres {
    #[inline]
    fn param(&self, idx: usize) -> String {
        format!("${idx}")
    }
}

/// A bound parameter value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlParam {
    Text(String),
    Int(i64),
}

impl fmt::Display for SqlParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => write!(f, "'{}'", text.replace('\'', "''")),
            Self::Int(value) => write!(f, "{}", value),
        }
    }
}

/// SQL text plus its parameters in placeholder order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

/// The three statements behind one grid response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledStatements {
    /// Rows in the table, ignoring every filter
    pub total: CompiledQuery,
    /// Rows matching the search filters
    pub filtered: CompiledQuery,
    /// The requested page
    pub page: CompiledQuery,
}

/// Accumulates parameters and hands out placeholders for them
struct ParamList<D> {
    dialect: D,
    params: Vec<SqlParam>,
}

impl<D: Dialect> ParamList<D> {
    fn new(dialect: D) -> Self {
        Self {
            dialect,
            params: Vec::new(),
        }
    }

    fn push(&mut self, param: SqlParam) -> String {
        self.params.push(param);
        self.dialect.param(self.params.len())
    }

    fn finish(self, sql: String) -> CompiledQuery {
        CompiledQuery {
            sql,
            params: self.params,
        }
    }
}

/// Stateless compiler for one SQL dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryCompiler<D> {
    dialect: D,
}

impl<D: Dialect> QueryCompiler<D> {
    pub fn new(dialect: D) -> Self {
        Self { dialect }
    }

    /// `SELECT COUNT(*)` over the whole table, or over the filtered rows
    pub fn compile_count(&self, intent: &QueryIntent, filtered: bool) -> CompiledQuery {
        let mut params = ParamList::new(self.dialect);
        let mut sql = format!("SELECT COUNT(*) FROM {}", intent.table_name());
        if filtered {
            push_where(&mut sql, &mut params, intent);
        }
        params.finish(sql)
    }

    /// Page select: client's columns, filters, sort, `LIMIT`/`OFFSET`
    ///
    /// With no columns the projection is the constant `1`, so the statement
    /// stays valid and still returns one row per matching record.
    pub fn compile_select(&self, intent: &QueryIntent) -> CompiledQuery {
        let mut params = ParamList::new(self.dialect);

        let projection = if intent.columns().is_empty() {
            "1".to_string()
        } else {
            intent
                .columns()
                .iter()
                .map(|column| column.name())
                .collect::<Vec<_>>()
                .join(", ")
        };
        let mut sql = format!("SELECT {} FROM {}", projection, intent.table_name());

        push_where(&mut sql, &mut params, intent);

        let order_by: Vec<String> = intent
            .sorted_columns()
            .into_iter()
            .filter_map(|column| {
                column
                    .sorting_direction()
                    .as_sql()
                    .map(|dir| format!("{} {}", column.name(), dir))
            })
            .collect();
        if !order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order_by.join(", "));
        }

        let limit = params.push(SqlParam::Int(i64::from(intent.length())));
        let offset = params.push(SqlParam::Int(i64::from(intent.start())));
        sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));

        params.finish(sql)
    }

    /// Total count, filtered count and page select
    pub fn compile_all(&self, intent: &QueryIntent) -> CompiledStatements {
        CompiledStatements {
            total: self.compile_count(intent, false),
            filtered: self.compile_count(intent, true),
            page: self.compile_select(intent),
        }
    }
}

/// Append the shared WHERE clause, or nothing when no filter applies
fn push_where<D: Dialect>(sql: &mut String, params: &mut ParamList<D>, intent: &QueryIntent) {
    let column_searches: Vec<_> = intent
        .columns()
        .iter()
        .filter(|column| !column.search().is_empty())
        .collect();

    let global_columns: Vec<_> = if intent.global_search().is_empty() {
        Vec::new()
    } else {
        intent
            .columns()
            .iter()
            .filter(|column| column.globally_searchable())
            .collect()
    };

    if column_searches.is_empty() && global_columns.is_empty() {
        return;
    }

    sql.push_str(" WHERE 1=1");

    for column in column_searches {
        let placeholder = params.push(SqlParam::Text(format!("%{}%", column.search())));
        sql.push_str(&format!(" AND {} LIKE {}", column.name(), placeholder));
    }

    if !global_columns.is_empty() {
        let pattern = format!("%{}%", intent.global_search());
        sql.push_str(" AND (0=1");
        for column in global_columns {
            let placeholder = params.push(SqlParam::Text(pattern.clone()));
            sql.push_str(&format!(" OR {} LIKE {}", column.name(), placeholder));
        }
        sql.push(')');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::whitelist::{ColumnSpec, ColumnWhitelist};

    fn products() -> ColumnWhitelist {
        ColumnWhitelist::new(
            "products",
            vec![
                ColumnSpec::new("id").sortable(),
                ColumnSpec::new("name").searchable().globally_searchable(),
                ColumnSpec::new("category").searchable().sortable(),
                ColumnSpec::new("supplier").globally_searchable().sortable(),
            ],
        )
        .unwrap()
    }

    fn intent(params: &[(&str, &str)]) -> QueryIntent {
        QueryIntent::parse(params, &products())
    }

    fn text(value: &str) -> SqlParam {
        SqlParam::Text(value.to_string())
    }

    #[test]
    fn test_no_columns_means_no_where_and_no_order() {
        let statements = QueryCompiler::new(Sqlite).compile_all(&intent(&[("search[value]", "foo")]));
        assert_eq!(statements.total.sql, "SELECT COUNT(*) FROM products");
        assert!(statements.total.params.is_empty());
        assert_eq!(statements.filtered.sql, "SELECT COUNT(*) FROM products");
        assert!(statements.filtered.params.is_empty());
        assert_eq!(statements.page.sql, "SELECT 1 FROM products LIMIT ?1 OFFSET ?2");
        assert_eq!(statements.page.params, [SqlParam::Int(10), SqlParam::Int(0)]);
    }

    #[test]
    fn test_global_search_scenario() {
        let intent = intent(&[
            ("start", "0"),
            ("length", "10"),
            ("search[value]", "foo"),
            ("columns[0][name]", "id"),
            ("columns[1][name]", "name"),
        ]);
        let compiler = QueryCompiler::new(Sqlite);

        let filtered = compiler.compile_count(&intent, true);
        assert_eq!(
            filtered.sql,
            "SELECT COUNT(*) FROM products WHERE 1=1 AND (0=1 OR name LIKE ?1)"
        );
        assert_eq!(filtered.params, [text("%foo%")]);

        let page = compiler.compile_select(&intent);
        assert_eq!(
            page.sql,
            "SELECT id, name FROM products WHERE 1=1 AND (0=1 OR name LIKE ?1) LIMIT ?2 OFFSET ?3"
        );
        assert_eq!(
            page.params,
            [text("%foo%"), SqlParam::Int(10), SqlParam::Int(0)]
        );
    }

    #[test]
    fn test_total_count_ignores_filters() {
        let intent = intent(&[
            ("search[value]", "foo"),
            ("columns[0][name]", "name"),
            ("columns[0][search][value]", "bar"),
        ]);
        let total = QueryCompiler::new(Sqlite).compile_count(&intent, false);
        assert_eq!(total.sql, "SELECT COUNT(*) FROM products");
        assert!(total.params.is_empty());
    }

    #[test]
    fn test_column_and_global_searches_combine() {
        let intent = intent(&[
            ("search[value]", " acme "),
            ("columns[0][name]", "supplier"),
            ("columns[1][name]", "category"),
            ("columns[1][search][value]", "tea"),
            ("columns[2][name]", "name"),
            ("columns[2][search][value]", "chai"),
        ]);
        let filtered = QueryCompiler::new(Sqlite).compile_count(&intent, true);
        assert_eq!(
            filtered.sql,
            "SELECT COUNT(*) FROM products WHERE 1=1 \
             AND category LIKE ?1 AND name LIKE ?2 \
             AND (0=1 OR supplier LIKE ?3 OR name LIKE ?4)"
        );
        assert_eq!(
            filtered.params,
            [text("%tea%"), text("%chai%"), text("%acme%"), text("%acme%")]
        );
    }

    #[test]
    fn test_global_search_without_globally_searchable_columns() {
        let intent = intent(&[("search[value]", "foo"), ("columns[0][name]", "id")]);
        let filtered = QueryCompiler::new(Sqlite).compile_count(&intent, true);
        assert_eq!(filtered.sql, "SELECT COUNT(*) FROM products");
    }

    #[test]
    fn test_non_searchable_column_never_filters() {
        let intent = intent(&[("columns[0][name]", "id"), ("columns[0][search][value]", "7")]);
        let page = QueryCompiler::new(Sqlite).compile_select(&intent);
        assert_eq!(page.sql, "SELECT id FROM products LIMIT ?1 OFFSET ?2");
    }

    #[test]
    fn test_order_by_follows_priority() {
        let intent = intent(&[
            ("columns[0][name]", "id"),
            ("columns[1][name]", "name"),
            ("columns[2][name]", "category"),
            ("order[0][column]", "2"),
            ("order[0][dir]", "asc"),
            ("order[1][column]", "0"),
            ("order[1][dir]", "desc"),
        ]);
        let page = QueryCompiler::new(Sqlite).compile_select(&intent);
        assert_eq!(
            page.sql,
            "SELECT id, name, category FROM products ORDER BY category ASC, id DESC LIMIT ?1 OFFSET ?2"
        );
    }

    #[test]
    fn test_projection_follows_client_order() {
        let intent = intent(&[
            ("columns[0][name]", "supplier"),
            ("columns[1][name]", "id"),
        ]);
        let page = QueryCompiler::new(Sqlite).compile_select(&intent);
        assert!(page.sql.starts_with("SELECT supplier, id FROM products"));
    }

    #[test]
    fn test_paging_is_bound() {
        let intent = intent(&[("start", "40"), ("length", "25")]);
        let page = QueryCompiler::new(Sqlite).compile_select(&intent);
        assert_eq!(page.params, [SqlParam::Int(25), SqlParam::Int(40)]);
    }

    #[test]
    fn test_hostile_values_stay_out_of_sql_text() {
        let hostile = "x' OR '1'='1";
        let intent = intent(&[
            ("search[value]", hostile),
            ("length", "10; DROP TABLE products"),
            ("columns[0][name]", "name"),
            ("columns[0][search][value]", hostile),
            ("columns[1][name]", "id; DROP TABLE products"),
        ]);
        let statements = QueryCompiler::new(Sqlite).compile_all(&intent);
        for query in [&statements.total, &statements.filtered, &statements.page] {
            assert!(!query.sql.contains("OR '1'"));
            assert!(!query.sql.contains("DROP"));
        }
        assert_eq!(statements.page.params[0], text("%x' OR '1'='1%"));
    }

    #[test]
    fn test_postgres_placeholders() {
        let intent = intent(&[
            ("search[value]", "foo"),
            ("columns[0][name]", "name"),
            ("columns[1][name]", "supplier"),
        ]);
        let page = QueryCompiler::new(Postgres).compile_select(&intent);
        assert_eq!(
            page.sql,
            "SELECT name, supplier FROM products WHERE 1=1 \
             AND (0=1 OR name LIKE $1 OR supplier LIKE $2) LIMIT $3 OFFSET $4"
        );
    }

    #[test]
    fn test_param_display_quotes_text() {
        assert_eq!(text("it's").to_string(), "'it''s'");
        assert_eq!(SqlParam::Int(5).to_string(), "5");
    }
}
