//! Schema registry for the IMDb dataset.
//!
//! A fixed, ordered mapping from table name to column definitions. Column
//! order here is both the physical column order of the created table and the
//! column order expected in the matching source file.

use std::fmt;
use ColumnType::{Boolean, Identifier, Integer, Real, Text};

/// Closed set of column types used by the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Short identifier such as `tt0000001`, stored as `VARCHAR(n)`.
    Identifier(u16),
    /// Free text.
    Text,
    /// 32-bit integer.
    Integer,
    /// Boolean, loaded from `0`/`1`.
    Boolean,
    /// Single-precision float.
    Real,
}

impl ColumnType {
    /// Returns the PostgreSQL type for this column.
    pub fn sql_type(&self) -> String {
        match self {
            Self::Identifier(len) => format!("VARCHAR({len})"),
            Self::Text => "TEXT".to_string(),
            Self::Integer => "INTEGER".to_string(),
            Self::Boolean => "BOOLEAN".to_string(),
            Self::Real => "REAL".to_string(),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql_type())
    }
}

/// A single column definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub column_type: ColumnType,
}

const fn col(name: &'static str, column_type: ColumnType) -> ColumnDef {
    ColumnDef { name, column_type }
}

/// A table definition from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSchema {
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
}

impl TableSchema {
    /// Column names in registry order.
    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    /// Renders the `CREATE TABLE IF NOT EXISTS` statement for this table.
    pub fn create_table_sql(&self) -> String {
        let column_defs = self
            .columns
            .iter()
            .map(|c| format!("{} {}", quote_ident(c.name), c.column_type))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "CREATE TABLE IF NOT EXISTS {} ({column_defs})",
            quote_ident(self.name)
        )
    }

    /// Renders the quoted, comma-separated column list used by COPY.
    pub fn column_list_sql(&self) -> String {
        self.columns
            .iter()
            .map(|c| quote_ident(c.name))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Quotes an identifier for PostgreSQL, doubling embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// The seven tables of the IMDb non-commercial dataset.
pub static TABLES: &[TableSchema] = &[
    TableSchema {
        name: "name_basics",
        columns: &[
            col("nconst", Identifier(15)),
            col("primaryname", Text),
            col("birthyear", Integer),
            col("deathyear", Integer),
            col("primaryprofession", Text),
            col("knownfortitles", Text),
        ],
    },
    TableSchema {
        name: "title_akas",
        columns: &[
            col("titleid", Identifier(15)),
            col("ordering", Integer),
            col("title", Text),
            col("region", Identifier(10)),
            col("language", Identifier(10)),
            col("types", Text),
            col("attributes", Text),
            col("isoriginaltitle", Boolean),
        ],
    },
    TableSchema {
        name: "title_basics",
        columns: &[
            col("tconst", Identifier(15)),
            col("titletype", Identifier(50)),
            col("primarytitle", Text),
            col("originaltitle", Text),
            col("isadult", Boolean),
            col("startyear", Integer),
            col("endyear", Integer),
            col("runtimeminutes", Integer),
            col("genres", Text),
        ],
    },
    TableSchema {
        name: "title_crew",
        columns: &[
            col("tconst", Identifier(15)),
            col("directors", Text),
            col("writers", Text),
        ],
    },
    TableSchema {
        name: "title_episode",
        columns: &[
            col("tconst", Identifier(15)),
            col("parenttconst", Identifier(15)),
            col("seasonnumber", Integer),
            col("episodenumber", Integer),
        ],
    },
    TableSchema {
        name: "title_principals",
        columns: &[
            col("tconst", Identifier(15)),
            col("ordering", Integer),
            col("nconst", Identifier(15)),
            col("category", Identifier(50)),
            col("job", Text),
            col("characters", Text),
        ],
    },
    TableSchema {
        name: "title_ratings",
        columns: &[
            col("tconst", Identifier(15)),
            col("averagerating", Real),
            col("numvotes", Integer),
        ],
    },
];

/// Read-only view over a set of table definitions.
#[derive(Debug, Clone, Copy)]
pub struct SchemaRegistry {
    tables: &'static [TableSchema],
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::imdb()
    }
}

impl SchemaRegistry {
    /// The IMDb registry.
    pub fn imdb() -> Self {
        Self { tables: TABLES }
    }

    /// Looks up a table by name.
    pub fn get(&self, name: &str) -> Option<&'static TableSchema> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// All tables in registry order.
    pub fn tables(&self) -> &'static [TableSchema] {
        self.tables
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
