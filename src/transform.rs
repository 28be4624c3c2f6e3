use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use itertools::Itertools;
use regex::{Captures, Regex};
use tracing::debug;

use crate::ast::{Period, Planet, Term};
use crate::bank::{RowId, RuleBank};
use crate::chart::age_on;
use crate::parser::parse_condition;

static PLANET_ABBREVIATION: LazyLock<Regex> = LazyLock::new(|| {
    let names = Planet::ALL.iter().map(|planet| planet.short_name()).join("|");
    Regex::new(&format!(r"(?i)\b(?:{})\b", names)).expect("valid planet pattern")
});

static NATAL_WRAPPER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Natal\s*\(([^)]+)\)").expect("valid wrapper pattern"));

static AND_OPERATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+AND\s+").expect("valid operator pattern"));

static OR_OPERATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+OR\s+").expect("valid operator pattern"));

/// The range of birth dates of someone for whom `start..=end` is the current
/// period, anchored on today's month and day.
///
/// `None` when an anchored date does not exist, e.g. 29 February in a common
/// year.
pub fn dob_range(
    today: NaiveDate,
    start: NaiveDate,
    end: NaiveDate,
) -> Option<(NaiveDate, NaiveDate)> {
    let age_at_start = age_on(start, today);
    let age_at_end = age_on(end, today);

    let anchored =
        |age: i32| NaiveDate::from_ymd_opt(today.year() - age, today.month(), today.day());
    let earliest = anchored(age_at_start.max(age_at_end))?;
    let latest = anchored(age_at_start.min(age_at_end))?;
    Some((earliest, latest))
}

fn format_dob_range(today: NaiveDate, period: &Period) -> Option<String> {
    let end = period.end.resolve(today)?;
    let Some((earliest, latest)) = dob_range(today, period.start, end) else {
        debug!(?period, %today, "no birth date range for period");
        return None;
    };
    Some(format!(
        "{} to {}",
        earliest.format("%Y-%m-%d"),
        latest.format("%Y-%m-%d")
    ))
}

/// Replaces a trailing `TIME(...)` clause with the matching `DOB (...)` clause.
fn time_to_dob(condition: &str, today: NaiveDate) -> String {
    let body_end = condition.trim_end().len();

    let trailing = parse_condition(condition)
        .terms
        .into_iter()
        .find_map(|spanned| match spanned.term {
            Term::TimePeriod(periods)
                if condition[..spanned.span.end].trim_end().len() == body_end =>
            {
                Some((spanned.span.start, periods))
            }
            _ => None,
        });

    let Some((start, periods)) = trailing else {
        return condition.to_owned();
    };

    let ranges = periods
        .iter()
        .filter_map(|period| format_dob_range(today, period))
        .collect::<Vec<_>>();
    if ranges.is_empty() {
        return condition.to_owned();
    }

    format!("{}DOB ({})", &condition[..start], ranges.join(", "))
}

fn expand_planet_names(condition: &str) -> String {
    PLANET_ABBREVIATION
        .replace_all(condition, |caps: &Captures| {
            let short = &caps[0];
            Planet::from_short_name(short)
                .map(Planet::full_name)
                .unwrap_or(short)
                .to_owned()
        })
        .into_owned()
}

fn clean_up(condition: &str) -> String {
    let condition = NATAL_WRAPPER.replace_all(condition, "$1");
    let condition = AND_OPERATOR.replace_all(&condition, " AND ");
    let condition = OR_OPERATOR.replace_all(&condition, " OR ");
    condition.trim().to_owned()
}

/// Rewrites a raw rule condition into the form handed to text generation.
///
/// A trailing time clause becomes an approximate date of birth range,
/// planet abbreviations become display names, `Natal(...)` wrappers are
/// removed and operator spacing is normalised. Parts that cannot be read are
/// left as they are.
pub fn transform_condition(condition: &str, today: NaiveDate) -> String {
    let condition = time_to_dob(condition, today);
    let condition = expand_planet_names(&condition);
    clean_up(&condition)
}

/// Renders the requested rows as `Condition:`/`Result:` blocks separated by
/// blank lines. Ids that address no row are skipped.
pub fn assemble_rule_text<B, I>(bank: &B, row_ids: I, today: NaiveDate) -> String
where
    B: RuleBank + ?Sized,
    I: IntoIterator<Item = RowId>,
{
    row_ids
        .into_iter()
        .filter_map(|row_id| bank.get_row(row_id))
        .map(|row| {
            format!(
                "Condition: {}\nResult: {}\n",
                transform_condition(&row.condition, today),
                row.result
            )
        })
        .join("\n")
        .trim_end()
        .to_owned()
}
