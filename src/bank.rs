use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::LazyLock;

use anyhow::{anyhow, Context, Result};
use itertools::Itertools;
use regex::Regex;
use rusqlite::Connection;
use tracing::info;

pub type RowId = usize;

/// The identifier of the first data row; ids follow spreadsheet numbering,
/// where row 1 holds the column headers.
pub const FIRST_ROW_ID: RowId = 2;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleRow {
    pub row_id: RowId,
    pub condition: String,
    pub result: String,
}

/// Read-only access to the rule bank.
pub trait RuleBank {
    fn row_count(&self) -> usize;

    fn get_row(&self, row_id: RowId) -> Option<&RuleRow>;

    /// Every valid row id, in bank order.
    fn row_ids(&self) -> Range<RowId> {
        FIRST_ROW_ID..FIRST_ROW_ID + self.row_count()
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemoryBank {
    rows: Vec<RuleRow>,
}

impl MemoryBank {
    /// Builds a bank from `(condition, result)` pairs in order.
    pub fn from_pairs<I, C, R>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (C, R)>,
        C: Into<String>,
        R: Into<String>,
    {
        let rows = pairs
            .into_iter()
            .enumerate()
            .map(|(index, (condition, result))| RuleRow {
                row_id: FIRST_ROW_ID + index,
                condition: condition.into(),
                result: result.into(),
            })
            .collect();
        Self { rows }
    }

    /// Reads the `Condition` and `Result` columns of `table` in rowid order.
    ///
    /// NULL cells are read as empty text.
    pub fn load_sqlite(conn: &Connection, table: &str) -> Result<Self> {
        if !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') || table.is_empty() {
            return Err(anyhow!("Invalid table name {:?}", table));
        }

        let sql = format!("SELECT Condition, Result FROM {} ORDER BY rowid", table);
        let mut stmt = conn
            .prepare(&sql)
            .with_context(|| format!("Failed to read rule table {:?}", table))?;
        let pairs = stmt
            .query_map([], |row| {
                let condition: Option<String> = row.get(0)?;
                let result: Option<String> = row.get(1)?;
                Ok((condition.unwrap_or_default(), result.unwrap_or_default()))
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read rule rows")?;

        let bank = Self::from_pairs(pairs);
        info!(table, rows = bank.row_count(), "loaded rule bank");
        Ok(bank)
    }

    pub fn open_sqlite(path: &str, table: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open rule bank {:?}", path))?;
        Self::load_sqlite(&conn, table)
    }
}

impl RuleBank for MemoryBank {
    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn get_row(&self, row_id: RowId) -> Option<&RuleRow> {
        self.rows.get(row_id.checked_sub(FIRST_ROW_ID)?)
    }
}

/// Numbered result lines, one per row with non-blank result text.
///
/// This is the list a semantic ranker picks row ids from.
pub fn result_catalogue(bank: &impl RuleBank) -> String {
    bank.row_ids()
        .filter_map(|row_id| bank.get_row(row_id))
        .filter(|row| !row.result.trim().is_empty())
        .map(|row| format!("{}. {}\n", row.row_id, row.result.trim()))
        .join("")
}

static ROW_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+\b").expect("valid row number pattern"));

/// Pulls row ids out of a ranker's free-text answer, keeping those that
/// address a row of `bank`.
pub fn parse_ranked_row_ids(response: &str, bank: &impl RuleBank) -> Vec<RowId> {
    let valid = bank.row_ids();
    ROW_NUMBER
        .find_iter(response)
        .filter_map(|number| number.as_str().parse::<RowId>().ok())
        .filter(|row_id| valid.contains(row_id))
        .collect()
}

/// Union of structurally matched and semantically ranked ids.
pub fn combine_row_ids(
    matched: impl IntoIterator<Item = RowId>,
    ranked: impl IntoIterator<Item = RowId>,
) -> BTreeSet<RowId> {
    matched.into_iter().chain(ranked).collect()
}
