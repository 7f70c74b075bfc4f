//! Source file descriptors and the bulk-copy format they are loaded with.

use crate::schema::{quote_ident, TableSchema};
use std::path::{Path, PathBuf};

/// Default directory holding the decompressed dataset.
pub const DEFAULT_DATA_DIR: &str = "DB";

/// Suffix stripped from a file name to get its table name.
pub const SOURCE_SUFFIX: &str = ".tsv";

/// Files loaded when none are given on the command line.
pub const DEFAULT_SOURCE_FILES: &[&str] = &[
    "name.basics.tsv",
    "title.basics.tsv",
    "title.crew.tsv",
    "title.principals.tsv",
    "title.ratings.tsv",
];

/// Maps a source file name to its table name.
///
/// Strips the `.tsv` suffix and replaces every `.` with `_`, so
/// `title.basics.tsv` becomes `title_basics`. Names without the suffix are
/// only separator-translated.
pub fn table_name_for(file_name: &str) -> String {
    file_name
        .strip_suffix(SOURCE_SUFFIX)
        .unwrap_or(file_name)
        .replace('.', "_")
}

/// A source file to load, resolved against the data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub file_name: String,
    pub path: PathBuf,
    pub table_name: String,
}

impl SourceFile {
    pub fn new(data_dir: &Path, file_name: impl Into<String>) -> Self {
        let file_name = file_name.into();
        Self {
            path: data_dir.join(&file_name),
            table_name: table_name_for(&file_name),
            file_name,
        }
    }
}

/// Text format options for `COPY ... FROM STDIN`.
///
/// The dataset is tab-separated with a header row and `\N` for NULL. It
/// never quotes fields, so the quote character is set to backspace, which
/// does not occur in the data. A literal tab or newline inside a field is
/// not representable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyFormat {
    pub delimiter: char,
    pub null: &'static str,
    pub quote: char,
    pub header: bool,
}

impl Default for CopyFormat {
    fn default() -> Self {
        Self::imdb_tsv()
    }
}

impl CopyFormat {
    /// Format of the IMDb TSV dumps.
    pub fn imdb_tsv() -> Self {
        Self {
            delimiter: '\t',
            null: "\\N",
            quote: '\u{8}',
            header: true,
        }
    }

    /// Builds the COPY statement loading `table` in registry column order.
    pub fn copy_statement(&self, table: &TableSchema) -> String {
        let mut options = vec![
            "FORMAT csv".to_string(),
            format!("DELIMITER {}", escape_char_literal(self.delimiter)),
        ];
        if self.header {
            options.push("HEADER".to_string());
        }
        options.push(format!("QUOTE {}", escape_char_literal(self.quote)));
        options.push(format!("NULL '{}'", self.null.replace('\'', "''")));

        format!(
            "COPY {} ({}) FROM STDIN WITH ({})",
            quote_ident(table.name),
            table.column_list_sql(),
            options.join(", ")
        )
    }
}

/// Renders a single character as a PostgreSQL `E''` string literal.
fn escape_char_literal(c: char) -> String {
    match c {
        '\t' => "E'\\t'".to_string(),
        '\u{8}' => "E'\\b'".to_string(),
        '\n' => "E'\\n'".to_string(),
        '\r' => "E'\\r'".to_string(),
        '\'' => "E'\\''".to_string(),
        '\\' => "E'\\\\'".to_string(),
        c if c.is_control() => format!("E'\\x{:02x}'", c as u32),
        c => format!("E'{c}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaRegistry;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_table_name_for_default_files() {
        assert_eq!(table_name_for("name.basics.tsv"), "name_basics");
        assert_eq!(table_name_for("title.basics.tsv"), "title_basics");
        assert_eq!(table_name_for("title.crew.tsv"), "title_crew");
        assert_eq!(table_name_for("title.principals.tsv"), "title_principals");
        assert_eq!(table_name_for("title.ratings.tsv"), "title_ratings");
    }

    #[test]
    fn test_table_name_without_suffix() {
        assert_eq!(table_name_for("title.akas"), "title_akas");
        assert_eq!(table_name_for("ratings"), "ratings");
    }

    #[test]
    fn test_table_name_only_strips_trailing_suffix() {
        assert_eq!(table_name_for("a.tsv.gz"), "a_tsv_gz");
    }

    #[test]
    fn test_default_files_all_have_schemas() {
        let registry = SchemaRegistry::imdb();
        for file in DEFAULT_SOURCE_FILES {
            let table = table_name_for(file);
            assert!(registry.get(&table).is_some(), "no schema for {table}");
        }
    }

    #[test]
    fn test_source_file_paths() {
        let source = SourceFile::new(Path::new("DB"), "title.crew.tsv");
        assert_eq!(source.path, PathBuf::from("DB/title.crew.tsv"));
        assert_eq!(source.table_name, "title_crew");
        assert_eq!(source.file_name, "title.crew.tsv");
    }

    #[test]
    fn test_copy_statement() {
        let ratings = SchemaRegistry::imdb().get("title_ratings").unwrap();
        let sql = CopyFormat::imdb_tsv().copy_statement(ratings);
        assert_eq!(
            sql,
            r#"COPY "title_ratings" ("tconst", "averagerating", "numvotes") FROM STDIN WITH (FORMAT csv, DELIMITER E'\t', HEADER, QUOTE E'\b', NULL '\N')"#
        );
    }

    #[test]
    fn test_copy_statement_without_header() {
        let crew = SchemaRegistry::imdb().get("title_crew").unwrap();
        let format = CopyFormat {
            header: false,
            ..CopyFormat::imdb_tsv()
        };
        assert!(!format.copy_statement(crew).contains("HEADER"));
    }

    #[test]
    fn test_escape_char_literal() {
        assert_eq!(escape_char_literal(','), "E','");
        assert_eq!(escape_char_literal('\u{1}'), "E'\\x01'");
        assert_eq!(escape_char_literal('\''), "E'\\''");
    }
}
