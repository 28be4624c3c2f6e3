use std::collections::BTreeSet;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::ast::{Condition, House, Planet, Term};
use crate::bank::{RowId, RuleBank};
use crate::chart::{EvaluationContext, NatalChart};
use crate::parser::parse_condition;

pub type MatchResult = BTreeSet<RowId>;

/// Picks the single planet a matching call is evaluated against.
pub fn choose_planet<R: Rng + ?Sized>(
    chart: &NatalChart,
    rng: &mut R,
) -> Option<(Planet, House)> {
    let placements = chart
        .planet_houses
        .iter()
        .map(|(planet, house)| (*planet, *house))
        .collect::<Vec<_>>();
    placements.choose(rng).copied()
}

/// Returns the rows whose condition holds for the chart, evaluated against
/// one randomly chosen planet.
///
/// An empty chart or bank gives an empty result.
pub fn match_rows<B, R>(
    bank: &B,
    chart: &NatalChart,
    ctx: &EvaluationContext,
    rng: &mut R,
) -> MatchResult
where
    B: RuleBank + ?Sized,
    R: Rng + ?Sized,
{
    match choose_planet(chart, rng) {
        Some((planet, house)) => {
            debug!(planet = planet.full_name(), house, "chose planet for matching");
            match_rows_for_planet(bank, chart, ctx, planet)
        }
        None => {
            debug!("chart has no known planets");
            MatchResult::new()
        }
    }
}

/// Like [`match_rows`], with the evaluated planet fixed by the caller.
pub fn match_rows_for_planet<B>(
    bank: &B,
    chart: &NatalChart,
    ctx: &EvaluationContext,
    planet: Planet,
) -> MatchResult
where
    B: RuleBank + ?Sized,
{
    let matched = bank
        .row_ids()
        .filter_map(|row_id| bank.get_row(row_id))
        .filter(|row| condition_holds(&parse_condition(&row.condition), chart, ctx, planet))
        .map(|row| row.row_id)
        .collect::<MatchResult>();

    debug!(rows = bank.row_count(), matched = matched.len(), "scanned rule bank");
    matched
}

pub fn condition_holds(
    condition: &Condition,
    chart: &NatalChart,
    ctx: &EvaluationContext,
    planet: Planet,
) -> bool {
    natal_term_holds(condition, chart, planet)
        && condition
            .age_terms()
            .all(|ages| age_matches(ages, ctx.current_age))
        && condition
            .time_terms()
            .all(|periods| periods.iter().any(|period| period.contains(ctx.today)))
}

fn age_matches(ages: &[u32], current_age: i32) -> bool {
    match u32::try_from(current_age) {
        Ok(age) => ages.contains(&age),
        Err(_) => false,
    }
}

/// Whether some structural term about `planet` holds for the chart.
fn natal_term_holds(condition: &Condition, chart: &NatalChart, planet: Planet) -> bool {
    let Some(house) = chart.house_of(planet) else {
        return false;
    };

    // The house of the planet paired with `planet` in a two-planet term.
    let partner_house = |a: Planet, b: Planet| {
        let other = if a == planet {
            b
        } else if b == planet {
            a
        } else {
            return None;
        };
        chart.house_of(other)
    };

    condition.terms().any(|term| match *term {
        Term::PlanetInHouse(p, h) => p == planet && h == house,
        Term::Conjunct(a, b) => partner_house(a, b) == Some(house),
        Term::NotWith(a, b) => partner_house(a, b).map_or(false, |other| other != house),
        Term::Age(_) | Term::TimePeriod(_) => false,
    })
}
