//! SQL rendering and parsing for batch outputs.
//!
//! Outputs in SQL form are one `INSERT INTO questions (...) VALUES (...);`
//! statement per question, preceded by `--` comment lines describing the
//! batch. The parser accepts the subset of PostgreSQL this module writes
//! (string, integer and `ARRAY[...]` literals, `NULL`, `::type` casts,
//! multi-row `VALUES`) so a written file can be loaded back.

use miette::Diagnostic;
use serde_json::json;
use thiserror::Error;

use super::error::BatchError;
use super::models::GeneratedItem;
use super::persist::OutputRecord;

/// Target table for rendered statements.
pub const QUESTIONS_TABLE: &str = "questions";

const COLUMNS: [&str; 8] = [
    "question_text",
    "options",
    "correct_answers",
    "explanation",
    "domain",
    "difficulty",
    "experience_level",
    "metadata",
];

/// Render a batch as `INSERT` statements.
pub fn render_insert_statements(record: &OutputRecord) -> Result<String, BatchError> {
    let meta = &record.metadata;
    let mut out = String::new();

    out.push_str("-- Generated certification questions\n");
    if let Some(certification) = &meta.certification {
        out.push_str(&format!("-- certification: {}\n", comment_safe(certification)));
    }
    if !meta.domains.is_empty() {
        out.push_str(&format!("-- domains: {}\n", comment_safe(&meta.domains.join(", "))));
    }
    if let Some(job_id) = &meta.job_id {
        out.push_str(&format!("-- job: {}\n", comment_safe(job_id)));
    }
    out.push_str(&format!("-- questions: {}\n", meta.question_count));
    out.push_str(&format!("-- generated_at: {}\n\n", meta.generated_at.to_rfc3339()));

    let row_metadata = json!({
        "certification": meta.certification,
        "job_id": meta.job_id,
        "tags": meta.tags,
        "generated_at": meta.generated_at.to_rfc3339(),
    });
    let row_metadata = serde_json::to_string(&row_metadata)?;

    for item in &record.questions {
        out.push_str(&format!(
            "INSERT INTO {QUESTIONS_TABLE} ({}) VALUES ({}, {}, {}, {}, {}, {}, {}, {}::jsonb);\n",
            COLUMNS.join(", "),
            quote(&item.body),
            text_array(&item.options),
            int_array(&item.correct),
            quote(&item.rationale),
            quote(&item.category),
            quote(&item.complexity),
            quote(&item.experience),
            quote(&row_metadata),
        ));
    }

    Ok(out)
}

/// Single-quoted SQL string literal.
pub fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn text_array(values: &[String]) -> String {
    if values.is_empty() {
        return "ARRAY[]::text[]".to_string();
    }
    let quoted: Vec<String> = values.iter().map(|v| quote(v)).collect();
    format!("ARRAY[{}]::text[]", quoted.join(", "))
}

fn int_array(values: &[usize]) -> String {
    if values.is_empty() {
        return "ARRAY[]::integer[]".to_string();
    }
    let joined: Vec<String> = values.iter().map(usize::to_string).collect();
    format!("ARRAY[{}]::integer[]", joined.join(", "))
}

fn comment_safe(text: &str) -> String {
    text.replace(['\n', '\r'], " ")
}

#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum SqlParseError {
    #[error("statement {statement}: {message}")]
    #[diagnostic(code(qbank::batch::sql_syntax))]
    Syntax { statement: usize, message: String },

    #[error("statement {statement}: missing column '{column}'")]
    #[diagnostic(code(qbank::batch::sql_missing_column))]
    MissingColumn { statement: usize, column: String },

    #[error("statement {statement}: column '{column}' {message}")]
    #[diagnostic(code(qbank::batch::sql_column_type))]
    ColumnType {
        statement: usize,
        column: String,
        message: String,
    },

    #[error("SQL input ends inside a string literal")]
    #[diagnostic(code(qbank::batch::sql_unterminated))]
    Unterminated,
}

/// Parse `INSERT` statements back into questions.
///
/// `BEGIN`/`COMMIT` are skipped; any other statement kind is rejected.
pub fn parse_insert_statements(sql: &str) -> Result<Vec<GeneratedItem>, SqlParseError> {
    let mut items = Vec::new();

    for (index, statement) in split_statements(sql)?.iter().enumerate() {
        let number = index + 1;
        let mut cursor = Cursor::new(statement, number);
        let keyword = cursor.identifier()?.to_ascii_uppercase();
        match keyword.as_str() {
            "BEGIN" | "COMMIT" => continue,
            "INSERT" => {}
            other => return Err(cursor.error(format!("unsupported statement '{other}'"))),
        }

        cursor.keyword("INTO")?;
        cursor.identifier()?;
        let columns = cursor.column_list()?;
        cursor.keyword("VALUES")?;

        loop {
            let row = cursor.row()?;
            if row.len() != columns.len() {
                return Err(cursor.error(format!(
                    "{} columns but {} values",
                    columns.len(),
                    row.len()
                )));
            }
            items.push(item_from_row(number, &columns, row)?);

            if !cursor.eat(',') {
                break;
            }
        }

        cursor.skip_whitespace();
        if !cursor.at_end() {
            return Err(cursor.error("unexpected trailing input".to_string()));
        }
    }

    Ok(items)
}

/// Split on `;` outside string literals, dropping `--` comments.
fn split_statements(sql: &str) -> Result<Vec<String>, SqlParseError> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut chars = sql.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            current.push(c);
            if c == '\'' {
                if chars.peek() == Some(&'\'') {
                    current.push('\'');
                    chars.next();
                } else {
                    in_string = false;
                }
            }
            continue;
        }

        match c {
            '\'' => {
                in_string = true;
                current.push(c);
            }
            '-' if chars.peek() == Some(&'-') => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        current.push('\n');
                        break;
                    }
                }
            }
            ';' => {
                let statement = current.trim();
                if !statement.is_empty() {
                    statements.push(statement.to_string());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }

    if in_string {
        return Err(SqlParseError::Unterminated);
    }
    let tail = current.trim();
    if !tail.is_empty() {
        statements.push(tail.to_string());
    }
    Ok(statements)
}

#[derive(Debug, Clone, PartialEq)]
enum SqlValue {
    Text(String),
    Int(i64),
    Array(Vec<SqlValue>),
    Null,
}

struct Cursor {
    chars: Vec<char>,
    pos: usize,
    statement: usize,
}

impl Cursor {
    fn new(source: &str, statement: usize) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            statement,
        }
    }

    fn error(&self, message: String) -> SqlParseError {
        SqlParseError::Syntax {
            statement: self.statement,
            message,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    /// Consume `c` (after whitespace) if it is next.
    fn eat(&mut self, c: char) -> bool {
        self.skip_whitespace();
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<(), SqlParseError> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{c}'")))
        }
    }

    /// Bare or double-quoted identifier, including `schema.table`.
    fn identifier(&mut self) -> Result<String, SqlParseError> {
        self.skip_whitespace();
        if self.eat('"') {
            let start = self.pos;
            while self.peek().is_some_and(|c| c != '"') {
                self.pos += 1;
            }
            let name: String = self.chars[start..self.pos].iter().collect();
            self.expect('"')?;
            return Ok(name);
        }

        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '.')
        {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error("expected an identifier".to_string()));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn keyword(&mut self, expected: &str) -> Result<(), SqlParseError> {
        let found = self.identifier()?;
        if found.eq_ignore_ascii_case(expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected {expected}, found '{found}'")))
        }
    }

    fn column_list(&mut self) -> Result<Vec<String>, SqlParseError> {
        self.expect('(')?;
        let mut columns = vec![self.identifier()?.to_ascii_lowercase()];
        while self.eat(',') {
            columns.push(self.identifier()?.to_ascii_lowercase());
        }
        self.expect(')')?;
        Ok(columns)
    }

    fn row(&mut self) -> Result<Vec<SqlValue>, SqlParseError> {
        self.expect('(')?;
        let mut values = vec![self.value()?];
        while self.eat(',') {
            values.push(self.value()?);
        }
        self.expect(')')?;
        Ok(values)
    }

    fn value(&mut self) -> Result<SqlValue, SqlParseError> {
        self.skip_whitespace();
        let value = match self.peek() {
            Some('\'') => SqlValue::Text(self.string_literal()?),
            Some(c) if c == '-' || c.is_ascii_digit() => SqlValue::Int(self.integer()?),
            Some(c) if c.is_alphabetic() => {
                let word = self.identifier()?;
                if word.eq_ignore_ascii_case("NULL") {
                    SqlValue::Null
                } else if word.eq_ignore_ascii_case("ARRAY") {
                    self.array()?
                } else {
                    return Err(self.error(format!("unsupported value '{word}'")));
                }
            }
            _ => return Err(self.error("expected a value".to_string())),
        };
        self.skip_cast()?;
        Ok(value)
    }

    fn string_literal(&mut self) -> Result<String, SqlParseError> {
        self.expect('\'')?;
        let mut text = String::new();
        loop {
            match self.peek() {
                Some('\'') if self.chars.get(self.pos + 1) == Some(&'\'') => {
                    text.push('\'');
                    self.pos += 2;
                }
                Some('\'') => {
                    self.pos += 1;
                    return Ok(text);
                }
                Some(c) => {
                    text.push(c);
                    self.pos += 1;
                }
                None => return Err(SqlParseError::Unterminated),
            }
        }
    }

    fn integer(&mut self) -> Result<i64, SqlParseError> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let digits: String = self.chars[start..self.pos].iter().collect();
        digits
            .parse()
            .map_err(|_| self.error(format!("invalid integer '{digits}'")))
    }

    fn array(&mut self) -> Result<SqlValue, SqlParseError> {
        self.expect('[')?;
        let mut elements = Vec::new();
        if !self.eat(']') {
            elements.push(self.value()?);
            while self.eat(',') {
                elements.push(self.value()?);
            }
            self.expect(']')?;
        }
        Ok(SqlValue::Array(elements))
    }

    /// Skip `::type` and `::type[]` casts.
    fn skip_cast(&mut self) -> Result<(), SqlParseError> {
        self.skip_whitespace();
        while self.peek() == Some(':') && self.chars.get(self.pos + 1) == Some(&':') {
            self.pos += 2;
            self.identifier()?;
            while self.eat('[') {
                self.expect(']')?;
            }
            self.skip_whitespace();
        }
        Ok(())
    }
}

fn item_from_row(
    statement: usize,
    columns: &[String],
    row: Vec<SqlValue>,
) -> Result<GeneratedItem, SqlParseError> {
    let mut body = None;
    let mut options = None;
    let mut correct = None;
    let mut rationale = String::new();
    let mut category = None;
    let mut complexity = String::new();
    let mut experience = String::new();

    let column_type = |column: &str, message: &str| SqlParseError::ColumnType {
        statement,
        column: column.to_string(),
        message: message.to_string(),
    };

    for (column, value) in columns.iter().zip(row) {
        match column.as_str() {
            "question_text" | "question" => {
                body = Some(text(value).ok_or_else(|| column_type(column, "must be text"))?)
            }
            "options" => {
                options = Some(
                    text_elements(value).ok_or_else(|| column_type(column, "must be a text array"))?,
                )
            }
            "correct_answers" => {
                correct = Some(index_elements(value).ok_or_else(|| {
                    column_type(column, "must be an array of non-negative integers")
                })?)
            }
            "explanation" => rationale = text(value).unwrap_or_default(),
            "domain" => {
                category = Some(text(value).ok_or_else(|| column_type(column, "must be text"))?)
            }
            "difficulty" => complexity = text(value).unwrap_or_default(),
            "experience_level" => experience = text(value).unwrap_or_default(),
            _ => {}
        }
    }

    let missing = |column: &str| SqlParseError::MissingColumn {
        statement,
        column: column.to_string(),
    };

    Ok(GeneratedItem {
        body: body.ok_or_else(|| missing("question_text"))?,
        options: options.ok_or_else(|| missing("options"))?,
        correct: correct.ok_or_else(|| missing("correct_answers"))?,
        rationale,
        category: category.ok_or_else(|| missing("domain"))?,
        complexity,
        experience,
    })
}

fn text(value: SqlValue) -> Option<String> {
    match value {
        SqlValue::Text(s) => Some(s),
        _ => None,
    }
}

fn text_elements(value: SqlValue) -> Option<Vec<String>> {
    match value {
        SqlValue::Array(elements) => elements.into_iter().map(text).collect(),
        _ => None,
    }
}

fn index_elements(value: SqlValue) -> Option<Vec<usize>> {
    match value {
        SqlValue::Array(elements) => elements
            .into_iter()
            .map(|element| match element {
                SqlValue::Int(n) => usize::try_from(n).ok(),
                _ => None,
            })
            .collect(),
        _ => None,
    }
}
