use std::ops::Range;

use chrono::{Datelike, NaiveDate};

pub type House = u8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Planet {
    Sun,
    Moon,
    Mars,
    Mercury,
    Jupiter,
    Venus,
    Saturn,
    Rahu,
    Ketu,
}

impl Planet {
    pub const ALL: [Planet; 9] = [
        Planet::Sun,
        Planet::Moon,
        Planet::Mars,
        Planet::Mercury,
        Planet::Jupiter,
        Planet::Venus,
        Planet::Saturn,
        Planet::Rahu,
        Planet::Ketu,
    ];

    /// The abbreviation used inside rule conditions.
    pub fn short_name(self) -> &'static str {
        match self {
            Planet::Sun => "sun",
            Planet::Moon => "moon",
            Planet::Mars => "mars",
            Planet::Mercury => "mer",
            Planet::Jupiter => "jup",
            Planet::Venus => "ven",
            Planet::Saturn => "sat",
            Planet::Rahu => "rahu",
            Planet::Ketu => "ketu",
        }
    }

    pub fn full_name(self) -> &'static str {
        match self {
            Planet::Sun => "Sun",
            Planet::Moon => "Moon",
            Planet::Mars => "Mars",
            Planet::Mercury => "Mercury",
            Planet::Jupiter => "Jupiter",
            Planet::Venus => "Venus",
            Planet::Saturn => "Saturn",
            Planet::Rahu => "Rahu",
            Planet::Ketu => "Ketu",
        }
    }

    /// Case-insensitive lookup of a condition abbreviation.
    pub fn from_short_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|planet| planet.short_name().eq_ignore_ascii_case(name))
    }

    /// Exact lookup of a display name, as used for chart keys.
    pub fn from_full_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|planet| planet.full_name() == name)
    }
}

/// The closing side of a dated interval.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndBound {
    Date(NaiveDate),
    /// A bare year: through 31 December, or through today in the current year.
    Year(i32),
    /// Left empty: through today.
    Open,
}

impl EndBound {
    pub fn resolve(self, today: NaiveDate) -> Option<NaiveDate> {
        match self {
            EndBound::Date(date) => Some(date),
            EndBound::Year(year) if year == today.year() => Some(today),
            EndBound::Year(year) => NaiveDate::from_ymd_opt(year, 12, 31),
            EndBound::Open => Some(today),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Period {
    pub start: NaiveDate,
    pub end: EndBound,
}

impl Period {
    pub fn contains(&self, today: NaiveDate) -> bool {
        match self.end.resolve(today) {
            Some(end) => self.start <= today && today <= end,
            None => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Term {
    PlanetInHouse(Planet, House),
    Conjunct(Planet, Planet),
    NotWith(Planet, Planet),
    /// Empty when the listed ages could not be read; such a term never holds.
    Age(Vec<u32>),
    /// Only the intervals that parsed; malformed ones are dropped.
    TimePeriod(Vec<Period>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpannedTerm {
    pub term: Term,
    /// Byte range of the term within the condition text.
    pub span: Range<usize>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Condition {
    pub terms: Vec<SpannedTerm>,
}

impl Condition {
    pub fn terms(&self) -> impl Iterator<Item = &Term> {
        self.terms.iter().map(|spanned| &spanned.term)
    }

    pub fn age_terms(&self) -> impl Iterator<Item = &[u32]> {
        self.terms().filter_map(|term| match term {
            Term::Age(ages) => Some(ages.as_slice()),
            _ => None,
        })
    }

    pub fn time_terms(&self) -> impl Iterator<Item = &[Period]> {
        self.terms().filter_map(|term| match term {
            Term::TimePeriod(periods) => Some(periods.as_slice()),
            _ => None,
        })
    }
}
