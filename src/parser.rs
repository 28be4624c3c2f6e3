use std::borrow::BorrowMut;

use chrono::NaiveDate;
use pest::Parser as _;
use pest_derive::Parser;
use tracing::debug;

use crate::ast::{Condition, EndBound, House, Period, Planet, SpannedTerm, Term};

#[derive(Parser)]
#[grammar = "condition.pest"]
struct Parser;

type Pair<'a> = pest::iterators::Pair<'a, Rule>;
type Pairs<'a> = pest::iterators::Pairs<'a, Rule>;

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Byte offsets at which a word begins.
fn word_starts(text: &str) -> impl Iterator<Item = usize> + '_ {
    let mut prev: Option<char> = None;
    text.char_indices().filter_map(move |(offset, c)| {
        let starts_word = is_word_char(c) && !prev.map_or(false, is_word_char);
        prev = Some(c);
        starts_word.then(|| offset)
    })
}

/// Extracts every structural term from a rule condition.
///
/// Terms are looked for at each word start independently, so they may overlap;
/// anything that does not form a term is ignored. This never fails: a term
/// whose contents cannot be read degrades to one that never holds.
pub fn parse_condition(text: &str) -> Condition {
    let terms = word_starts(text)
        .filter_map(|start| {
            let pair = Parser::parse(Rule::term, &text[start..]).ok()?.next()?;
            let end = start + pair.as_span().end();
            Some(SpannedTerm {
                term: Term::from(pair),
                span: start..end,
            })
        })
        .collect();

    Condition { terms }
}

fn expect_next_rule<'a, P: BorrowMut<Pairs<'a>>>(mut pairs: P, rule: Rule) -> Pair<'a> {
    let pair = pairs.borrow_mut().next().expect("missing pair");
    assert_eq!(pair.as_rule(), rule);
    pair
}

fn convert_planet(pair: Pair) -> Planet {
    assert_eq!(pair.as_rule(), Rule::planet);
    Planet::from_short_name(pair.as_str()).expect("grammar only admits known planets")
}

fn expect_planet<'a, P: BorrowMut<Pairs<'a>>>(pairs: P) -> Planet {
    convert_planet(expect_next_rule(pairs, Rule::planet))
}

fn convert_house(pair: Pair) -> House {
    assert_eq!(pair.as_rule(), Rule::house);
    pair.as_str()
        .parse()
        .expect("grammar admits at most two digits")
}

fn convert_date(pair: &Pair) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(pair.as_str(), "%Y-%m-%d").ok()
}

fn convert_ages(pair: Pair) -> Vec<u32> {
    assert_eq!(pair.as_rule(), Rule::age_list);
    let ages = pair
        .as_str()
        .split('/')
        .map(|age| age.trim().parse::<u32>())
        .collect::<Result<Vec<_>, _>>();

    match ages {
        Ok(ages) => ages,
        Err(e) => {
            debug!(list = pair.as_str(), error = %e, "unreadable age list");
            vec![]
        }
    }
}

fn convert_period(pair: Pair) -> Option<Period> {
    match pair.as_rule() {
        Rule::interval => {}
        Rule::malformed => {
            debug!(interval = pair.as_str(), "skipping malformed interval");
            return None;
        }
        _ => unreachable!(),
    }

    let mut pairs = pair.into_inner();
    let start = convert_date(&expect_next_rule(&mut pairs, Rule::date))?;
    let end = match pairs.next() {
        None => EndBound::Open,
        Some(pair) => match pair.as_rule() {
            Rule::date => EndBound::Date(convert_date(&pair)?),
            Rule::year => EndBound::Year(pair.as_str().parse().ok()?),
            _ => unreachable!(),
        },
    };

    Some(Period { start, end })
}

impl From<Pair<'_>> for Term {
    fn from(pair: Pair<'_>) -> Self {
        assert_eq!(pair.as_rule(), Rule::term);
        let pair = pair.into_inner().next().unwrap();
        let rule = pair.as_rule();
        let mut pairs = pair.into_inner();

        match rule {
            Rule::planet_in_house => {
                let planet = expect_planet(&mut pairs);
                let house = convert_house(expect_next_rule(&mut pairs, Rule::house));
                Term::PlanetInHouse(planet, house)
            }

            Rule::conjunct => Term::Conjunct(expect_planet(&mut pairs), expect_planet(&mut pairs)),

            Rule::not_with => Term::NotWith(expect_planet(&mut pairs), expect_planet(&mut pairs)),

            Rule::age_term => Term::Age(convert_ages(expect_next_rule(pairs, Rule::age_list))),

            Rule::time_term => Term::TimePeriod(pairs.filter_map(convert_period).collect()),

            _ => unreachable!(),
        }
    }
}
