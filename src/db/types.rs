//! Query result types.
//!
//! Defines the structures used to represent query results and their
//! tuple-style text rendering for plan output files.

use std::fmt;
use std::time::Duration;

/// Represents the result of executing a SQL query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Column metadata for the result set.
    pub columns: Vec<ColumnInfo>,

    /// Rows of data.
    pub rows: Vec<Row>,

    /// Time taken to execute the query.
    pub execution_time: Duration,
}

impl QueryResult {
    /// Creates a new empty query result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query result with the given columns and rows.
    pub fn with_data(columns: Vec<ColumnInfo>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows,
            execution_time: Duration::ZERO,
        }
    }

    /// Sets the execution time.
    pub fn with_execution_time(mut self, duration: Duration) -> Self {
        self.execution_time = duration;
        self
    }

    /// Number of rows in the result.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the result set is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Renders every row as one tuple-style line.
    pub fn render_lines(&self) -> impl Iterator<Item = String> + '_ {
        self.rows.iter().map(|row| render_row(row))
    }
}

/// Metadata about a column in a result set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,

    /// Column data type.
    pub data_type: String,
}

impl ColumnInfo {
    /// Creates a new column info with the given name and type.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// A row of data from a query result.
pub type Row = Vec<Value>;

/// Represents a single value from a database query.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// NULL value.
    #[default]
    Null,

    /// Boolean value.
    Bool(bool),

    /// Signed integer (up to i64).
    Int(i64),

    /// Floating point number.
    Float(f64),

    /// Arbitrary-precision number, kept as the server's text form.
    Numeric(String),

    /// Text value, or the text form of any other type (dates, arrays, ...).
    String(String),
}

impl Value {
    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Renders the value the way it appears inside a result tuple.
    pub fn to_tuple_element(&self) -> String {
        match self {
            Value::Null => "None".to_string(),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => render_float(*f),
            Value::Numeric(n) => format!("Decimal('{n}')"),
            Value::String(s) => quote_string(s),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_tuple_element())
    }
}

/// Renders a row as a tuple: `(5,)` for a single column, `(1, 'a')` otherwise.
pub fn render_row(row: &[Value]) -> String {
    let elements: Vec<String> = row.iter().map(Value::to_tuple_element).collect();
    match elements.len() {
        1 => format!("({},)", elements[0]),
        _ => format!("({})", elements.join(", ")),
    }
}

/// Floats always carry a decimal point or exponent.
///
/// Exponents are signed and at least two digits wide: `1e+20`, `1.5e-05`.
fn render_float(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let shortest = format!("{f:?}");
    match shortest.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => shortest,
    }
}

/// Quotes a string, preferring single quotes unless the text contains one
/// and no double quote.
fn quote_string(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };

    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

// Conversion implementations for common types
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_single_column_row_has_trailing_comma() {
        assert_eq!(render_row(&[Value::Int(5)]), "(5,)");
    }

    #[test]
    fn test_multi_column_row() {
        let row = vec![
            Value::Int(1),
            Value::from("The Kid"),
            Value::Null,
            Value::Bool(true),
            Value::Float(2.5),
        ];
        assert_eq!(render_row(&row), "(1, 'The Kid', None, True, 2.5)");
    }

    #[test]
    fn test_empty_row() {
        assert_eq!(render_row(&[]), "()");
    }

    #[test]
    fn test_float_rendering() {
        assert_eq!(Value::Float(7.0).to_tuple_element(), "7.0");
        assert_eq!(Value::Float(8.3).to_tuple_element(), "8.3");
        assert_eq!(Value::Float(f64::NAN).to_tuple_element(), "nan");
        assert_eq!(Value::Float(f64::NEG_INFINITY).to_tuple_element(), "-inf");
    }

    #[test]
    fn test_float_exponent_rendering() {
        assert_eq!(Value::Float(1e20).to_tuple_element(), "1e+20");
        assert_eq!(Value::Float(1.5e-5).to_tuple_element(), "1.5e-05");
        assert_eq!(Value::Float(-2.5e300).to_tuple_element(), "-2.5e+300");
        assert_eq!(Value::Float(1e16).to_tuple_element(), "1e+16");
        assert_eq!(Value::Float(1e15).to_tuple_element(), "1000000000000000.0");
        assert_eq!(Value::Float(0.0001).to_tuple_element(), "0.0001");
    }

    #[test]
    fn test_numeric_rendering() {
        assert_eq!(
            Value::Numeric("6.2500".to_string()).to_tuple_element(),
            "Decimal('6.2500')"
        );
    }

    #[test]
    fn test_string_quoting() {
        assert_eq!(Value::from("plain").to_tuple_element(), "'plain'");
        assert_eq!(Value::from("It's").to_tuple_element(), "\"It's\"");
        assert_eq!(
            Value::from("both ' and \"").to_tuple_element(),
            "'both \\' and \"'"
        );
        assert_eq!(Value::from("a\tb\\c").to_tuple_element(), "'a\\tb\\\\c'");
    }

    #[test]
    fn test_value_is_null() {
        assert!(Value::Null.is_null());
        assert!(!Value::Bool(false).is_null());
        assert!(!Value::Int(0).is_null());
    }

    #[test]
    fn test_value_from_conversions() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(42i32), Value::Int(42));
        assert_eq!(Value::from(42i64), Value::Int(42));
        assert_eq!(Value::from(2.71f64), Value::Float(2.71));
        assert_eq!(Value::from("hello"), Value::String("hello".to_string()));
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some(42i32)), Value::Int(42));
    }

    #[test]
    fn test_query_result_render_lines() {
        let result = QueryResult::with_data(
            vec![ColumnInfo::new("n", "INT8")],
            vec![vec![Value::Int(1)], vec![Value::Int(2)]],
        );
        let lines: Vec<String> = result.render_lines().collect();
        assert_eq!(lines, vec!["(1,)", "(2,)"]);
        assert_eq!(result.row_count(), 2);
    }

    #[test]
    fn test_query_result_with_execution_time() {
        let result = QueryResult::new().with_execution_time(Duration::from_millis(100));
        assert_eq!(result.execution_time, Duration::from_millis(100));
        assert!(result.is_empty());
    }
}
