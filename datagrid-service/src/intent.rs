//! Validated query intent parsed from DataTables request parameters
//!
//! The parser reads the flat DataTables keys through a [`ParamSource`] and
//! keeps only what the endpoint's [`ColumnWhitelist`] allows:
//!
//! - `draw`, `start`, `length` are parsed best-effort and clamped
//!   (`draw >= 1`, `start >= 0`, `10 <= length <= 100`).
//! - `columns[i][name]` is read for `i = 0, 1, 2, ...` until the key is
//!   absent. Names missing from the whitelist are skipped (or rejected in
//!   [`ParseMode::Strict`]).
//! - Per-column search is only read for searchable columns, sorting only for
//!   sortable ones; a column's sort priority is the index `j` of the first
//!   `order[j][column]` entry that names it.
//!
//! # Example
//!
//! ```rust
//! use datagrid_service::intent::{QueryIntent, SortDirection};
//! use datagrid_service::whitelist::{ColumnSpec, ColumnWhitelist};
//!
//! let whitelist = ColumnWhitelist::new(
//!     "products",
//!     vec![ColumnSpec::new("id").sortable(), ColumnSpec::new("name").searchable()],
//! )
//! .unwrap();
//!
//! let params: &[(&str, &str)] = &[
//!     ("draw", "3"),
//!     ("length", "99999"),
//!     ("columns[0][name]", "id"),
//!     ("order[0][column]", "0"),
//!     ("order[0][dir]", "DESC"),
//! ];
//!
//! let intent = QueryIntent::parse(params, &whitelist);
//! assert_eq!(intent.draw(), 3);
//! assert_eq!(intent.length(), 100);
//! assert_eq!(intent.columns()[0].sorting_direction(), SortDirection::Descending);
//! ```

use std::convert::Infallible;

use crate::error::{Error, Result};
use crate::params::ParamSource;
use crate::whitelist::ColumnWhitelist;

/// Smallest page the client may request
pub const MIN_PAGE_LENGTH: i32 = 10;

/// Largest page the client may request
pub const MAX_PAGE_LENGTH: i32 = 100;

/// Sort direction of one column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    /// Not part of the ORDER BY
    #[default]
    None,
    /// `ASC`
    Ascending,
    /// `DESC`
    Descending,
}

impl SortDirection {
    /// SQL keyword, or `None` for unsorted columns
    #[must_use]
    pub const fn as_sql(&self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Ascending => Some("ASC"),
            Self::Descending => Some("DESC"),
        }
    }

    /// `desc` (any case) sorts descending, anything else ascending
    fn from_client(dir: Option<&str>) -> Self {
        match dir {
            Some(dir) if dir.eq_ignore_ascii_case("desc") => Self::Descending,
            _ => Self::Ascending,
        }
    }
}

/// What to do with a column name the whitelist does not contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// Skip the column, log it, keep parsing
    #[default]
    Lenient,
    /// Fail the whole request with [`Error::UnsupportedColumn`]
    Strict,
}

/// One client-referenced column, validated against the whitelist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnIntent {
    name: String,
    search: String,
    globally_searchable: bool,
    sorting_direction: SortDirection,
    sorting_priority: Option<usize>,
}

impl ColumnIntent {
    /// Whitelisted column name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Per-column search term; empty when absent or not searchable
    pub fn search(&self) -> &str {
        &self.search
    }

    /// Whether the global search covers this column
    pub fn globally_searchable(&self) -> bool {
        self.globally_searchable
    }

    /// Requested sort direction
    pub fn sorting_direction(&self) -> SortDirection {
        self.sorting_direction
    }

    /// Position in the client's sort list (0 = primary key)
    pub fn sorting_priority(&self) -> Option<usize> {
        self.sorting_priority
    }

    /// Read column `index`
    ///
    /// `None` means `columns[index][name]` is absent, i.e. the end of the
    /// client's column list.
    fn parse<P: ParamSource + ?Sized>(
        params: &P,
        index: usize,
        whitelist: &ColumnWhitelist,
    ) -> Option<Result<Self>> {
        let name = params.param(&format!("columns[{index}][name]"))?;

        let Some(spec) = whitelist.column(name) else {
            return Some(Err(Error::UnsupportedColumn {
                index,
                name: name.to_string(),
            }));
        };

        let search = if spec.searchable {
            params
                .param(&format!("columns[{index}][search][value]"))
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_default()
                .to_string()
        } else {
            String::new()
        };

        let (sorting_direction, sorting_priority) = if spec.sortable {
            match sorting_for(params, index) {
                Some((direction, priority)) => (direction, Some(priority)),
                None => (SortDirection::None, None),
            }
        } else {
            (SortDirection::None, None)
        };

        Some(Ok(Self {
            name: spec.name.clone(),
            search,
            globally_searchable: spec.globally_searchable,
            sorting_direction,
            sorting_priority,
        }))
    }
}

/// Scan `order[j][column]` for the first entry naming `index`
///
/// The scan stops at the first absent or blank entry.
fn sorting_for<P: ParamSource + ?Sized>(
    params: &P,
    index: usize,
) -> Option<(SortDirection, usize)> {
    let index_text = index.to_string();
    let mut priority = 0;
    loop {
        let column_ref = params.param(&format!("order[{priority}][column]"))?;
        if column_ref == index_text {
            let dir = params.param(&format!("order[{priority}][dir]"));
            return Some((SortDirection::from_client(dir), priority));
        }
        if column_ref.trim().is_empty() {
            return None;
        }
        priority += 1;
    }
}

/// Validated, immutable description of one DataTables request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryIntent {
    table_name: String,
    draw: i32,
    start: i32,
    length: i32,
    global_search: String,
    columns: Vec<ColumnIntent>,
}

impl QueryIntent {
    /// Parse leniently: unsupported columns are skipped
    pub fn parse<P: ParamSource + ?Sized>(params: &P, whitelist: &ColumnWhitelist) -> Self {
        let skip = |index: usize, err: Error| -> std::result::Result<(), Infallible> {
            let column = match &err {
                Error::UnsupportedColumn { name, .. } => name.as_str(),
                _ => "",
            };
            tracing::warn!(
                index,
                column,
                table = whitelist.table_name(),
                "Skipping unsupported column"
            );
            Ok(())
        };
        match Self::collect(params, whitelist, skip) {
            Ok(intent) => intent,
            Err(never) => match never {},
        }
    }

    /// Parse with an explicit policy for unsupported columns
    pub fn parse_with_mode<P: ParamSource + ?Sized>(
        params: &P,
        whitelist: &ColumnWhitelist,
        mode: ParseMode,
    ) -> Result<Self> {
        match mode {
            ParseMode::Lenient => Ok(Self::parse(params, whitelist)),
            ParseMode::Strict => Self::collect(params, whitelist, |_, err| Err(err)),
        }
    }

    /// Shared parse loop; `on_unsupported` decides whether a rejected column
    /// aborts the parse
    fn collect<P, E, F>(
        params: &P,
        whitelist: &ColumnWhitelist,
        mut on_unsupported: F,
    ) -> std::result::Result<Self, E>
    where
        P: ParamSource + ?Sized,
        F: FnMut(usize, Error) -> std::result::Result<(), E>,
    {
        let draw = params.int_param("draw");
        let start = params.int_param("start");
        let length = params.int_param("length");
        let global_search = params.param("search[value]").unwrap_or_default();

        let mut columns = Vec::new();
        for index in 0.. {
            let Some(column) = ColumnIntent::parse(params, index, whitelist) else {
                break;
            };
            match column {
                Ok(column) => columns.push(column),
                Err(err) => on_unsupported(index, err)?,
            }
        }

        Ok(Self::new(
            whitelist.table_name(),
            draw,
            start,
            length,
            global_search,
            columns,
        ))
    }

    fn new(
        table_name: &str,
        draw: i32,
        start: i32,
        length: i32,
        global_search: &str,
        columns: Vec<ColumnIntent>,
    ) -> Self {
        Self {
            table_name: table_name.to_string(),
            draw: draw.max(1),
            start: start.max(0),
            length: length.clamp(MIN_PAGE_LENGTH, MAX_PAGE_LENGTH),
            global_search: global_search.trim().to_string(),
            columns,
        }
    }

    /// Table from the whitelist
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Client token to echo back, at least 1
    pub fn draw(&self) -> i32 {
        self.draw
    }

    /// Row offset, at least 0
    pub fn start(&self) -> i32 {
        self.start
    }

    /// Page size within `[MIN_PAGE_LENGTH, MAX_PAGE_LENGTH]`
    pub fn length(&self) -> i32 {
        self.length
    }

    /// Trimmed global search; empty means none
    pub fn global_search(&self) -> &str {
        &self.global_search
    }

    /// Columns in the order the client declared them
    pub fn columns(&self) -> &[ColumnIntent] {
        &self.columns
    }

    /// Sorted columns by ascending priority
    pub fn sorted_columns(&self) -> Vec<&ColumnIntent> {
        let mut sorted: Vec<&ColumnIntent> = self
            .columns
            .iter()
            .filter(|column| column.sorting_priority.is_some())
            .collect();
        sorted.sort_by_key(|column| column.sorting_priority);
        sorted
    }
}
