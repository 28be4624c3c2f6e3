use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{Datelike, FixedOffset, NaiveDate, Utc};
use tracing::warn;

use crate::ast::{House, Planet};

/// Indian Standard Time, the zone the prediction service keeps its clock in.
const IST_OFFSET_SECONDS: i32 = 5 * 3600 + 30 * 60;

pub fn today_in_ist() -> NaiveDate {
    let ist = FixedOffset::east_opt(IST_OFFSET_SECONDS).expect("offset is within a day");
    Utc::now().with_timezone(&ist).date_naive()
}

/// Whole years elapsed between `birth` and `on`.
///
/// Negative when `on` precedes `birth`.
pub fn age_on(birth: NaiveDate, on: NaiveDate) -> i32 {
    let before_birthday = (on.month(), on.day()) < (birth.month(), birth.day());
    on.year() - birth.year() - i32::from(before_birthday)
}

/// Reads a date of birth written either `YYYY-MM-DD` or `YYYY/MM/DD`.
pub fn parse_date_of_birth(text: &str) -> Result<NaiveDate> {
    let normalized = text.trim().replace('/', "-");
    NaiveDate::parse_from_str(&normalized, "%Y-%m-%d")
        .with_context(|| format!("Invalid date of birth {:?}", text))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NatalChart {
    pub date_of_birth: NaiveDate,
    pub planet_houses: BTreeMap<Planet, House>,
}

impl NatalChart {
    pub fn new(date_of_birth: NaiveDate, planet_houses: BTreeMap<Planet, House>) -> Self {
        Self {
            date_of_birth,
            planet_houses,
        }
    }

    /// Builds a chart from session data keyed by display names.
    ///
    /// Unknown planet names and houses outside 1-12 are dropped.
    pub fn from_raw<I, S>(date_of_birth: &str, planets: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, i64)>,
        S: AsRef<str>,
    {
        let date_of_birth = parse_date_of_birth(date_of_birth)?;

        let planet_houses = planets
            .into_iter()
            .filter_map(|(name, house)| {
                let name = name.as_ref();
                let Some(planet) = Planet::from_full_name(name) else {
                    warn!(name, "ignoring unknown planet in chart");
                    return None;
                };
                match House::try_from(house) {
                    Ok(house) if (1..=12).contains(&house) => Some((planet, house)),
                    _ => {
                        warn!(name, house, "ignoring planet with out-of-range house");
                        None
                    }
                }
            })
            .collect();

        Ok(Self {
            date_of_birth,
            planet_houses,
        })
    }

    pub fn house_of(&self, planet: Planet) -> Option<House> {
        self.planet_houses.get(&planet).copied()
    }
}

/// Facts derived at evaluation time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EvaluationContext {
    pub today: NaiveDate,
    pub current_age: i32,
}

impl EvaluationContext {
    pub fn new(chart: &NatalChart, today: NaiveDate) -> Self {
        Self {
            today,
            current_age: age_on(chart.date_of_birth, today),
        }
    }
}
