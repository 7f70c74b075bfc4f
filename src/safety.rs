//! Plan inspection.
//!
//! Parses plan SQL with sqlparser's PostgreSQL dialect and classifies it so
//! the runner can warn about plans that are not a single read-only query.
//! Classification never blocks execution.

use sqlparser::ast::{Query, SetExpr, Statement};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use std::fmt;

/// What a plan file turned out to contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanKind {
    /// Exactly one read-only statement (SELECT, WITH ... SELECT, VALUES, EXPLAIN, SHOW).
    ReadOnly,
    /// Exactly one statement that can change data or schema.
    Mutating(String),
    /// More than one statement.
    Multiple(usize),
    /// Nothing but whitespace or comments.
    Empty,
    /// sqlparser could not parse the text; the server may still accept it.
    Unparsed(String),
}

impl PlanKind {
    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::ReadOnly)
    }

    /// A warning to log before running the plan, if any.
    pub fn warning(&self) -> Option<String> {
        match self {
            Self::ReadOnly => None,
            Self::Mutating(kind) => Some(format!("plan is a {kind} statement, not a read query")),
            Self::Multiple(n) => Some(format!("plan contains {n} statements; rows from all of them are written")),
            Self::Empty => Some("plan is empty".to_string()),
            Self::Unparsed(err) => Some(format!("plan could not be parsed locally: {err}")),
        }
    }
}

impl fmt::Display for PlanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadOnly => write!(f, "read-only"),
            Self::Mutating(kind) => write!(f, "mutating ({kind})"),
            Self::Multiple(n) => write!(f, "{n} statements"),
            Self::Empty => write!(f, "empty"),
            Self::Unparsed(_) => write!(f, "unparsed"),
        }
    }
}

/// Classifies plan SQL.
pub fn classify_plan(sql: &str) -> PlanKind {
    let statements = match Parser::parse_sql(&PostgreSqlDialect {}, sql) {
        Ok(statements) => statements,
        Err(e) => return PlanKind::Unparsed(e.to_string()),
    };

    match statements.as_slice() {
        [] => PlanKind::Empty,
        [statement] => classify_statement(statement),
        many => PlanKind::Multiple(many.len()),
    }
}

fn classify_statement(statement: &Statement) -> PlanKind {
    match statement {
        Statement::Query(query) => {
            if is_read_only_query(query) {
                PlanKind::ReadOnly
            } else {
                PlanKind::Mutating("data-modifying query".to_string())
            }
        }
        Statement::Explain { analyze, .. } => {
            if *analyze {
                PlanKind::Mutating("EXPLAIN ANALYZE".to_string())
            } else {
                PlanKind::ReadOnly
            }
        }
        Statement::ShowVariable { .. } | Statement::ShowTables { .. } => PlanKind::ReadOnly,
        other => PlanKind::Mutating(statement_keyword(other)),
    }
}

/// A query is read-only when its body and every CTE it defines are.
fn is_read_only_query(query: &Query) -> bool {
    let ctes_read_only = query
        .with
        .as_ref()
        .map_or(true, |with| with.cte_tables.iter().all(|cte| is_read_only_query(&cte.query)));
    ctes_read_only && is_read_only_body(&query.body)
}

fn is_read_only_body(body: &SetExpr) -> bool {
    match body {
        SetExpr::Select(_) | SetExpr::Values(_) | SetExpr::Table(_) => true,
        SetExpr::Query(inner) => is_read_only_query(inner),
        SetExpr::SetOperation { left, right, .. } => {
            is_read_only_body(left) && is_read_only_body(right)
        }
        _ => false,
    }
}

/// Leading keyword of a statement, for messages.
fn statement_keyword(statement: &Statement) -> String {
    statement
        .to_string()
        .split_whitespace()
        .next()
        .unwrap_or("UNKNOWN")
        .to_uppercase()
}
