use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use itertools::Itertools;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rustyline::{error::ReadlineError, Editor};
use structopt::StructOpt;
use tracing_subscriber::EnvFilter;

use natal_rules::{
    assemble_rule_text, chart::today_in_ist, combine_row_ids, match_rows, parse_ranked_row_ids,
    result_catalogue, transform_condition, EvaluationContext, MemoryBank, NatalChart, RowId,
};

#[derive(Debug, StructOpt)]
#[structopt(name = "natal-rules", about = "Select and format astrology rules for a natal chart")]
struct Opt {
    /// SQLite database holding the rule bank
    #[structopt(long, env = "NATAL_RULES_BANK")]
    bank: Option<String>,

    /// Table with `Condition` and `Result` columns
    #[structopt(long, default_value = "rules")]
    table: String,

    /// Evaluate as of this date instead of today (IST)
    #[structopt(long, parse(try_from_str = parse_date))]
    today: Option<NaiveDate>,

    #[structopt(short, long)]
    verbose: bool,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(Debug, StructOpt)]
struct ChartArgs {
    /// Date of birth, YYYY-MM-DD or YYYY/MM/DD
    #[structopt(long)]
    dob: String,

    /// Natal placement such as `Saturn=11`; repeat for each planet
    #[structopt(long = "planet", parse(try_from_str = parse_placement))]
    planets: Vec<(String, i64)>,

    /// Seed for the planet choice
    #[structopt(long)]
    seed: Option<u64>,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Print the ids of rows matching a natal chart
    Match(ChartArgs),
    /// Print the formatted rule text for the given row ids
    Assemble { row_ids: Vec<RowId> },
    /// Match a chart, merge in ranked ids and print the rule text
    PredictRules {
        #[structopt(flatten)]
        chart: ChartArgs,
        /// Raw answer of the semantic ranker
        #[structopt(long, default_value = "")]
        ranked: String,
    },
    /// Print the numbered result list used for ranking
    Catalogue,
    /// Transform conditions typed interactively
    Repl,
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("Invalid date {:?}", s))
}

fn parse_placement(s: &str) -> Result<(String, i64)> {
    let (name, house) = s
        .split_once('=')
        .ok_or_else(|| anyhow!("Expected PLANET=HOUSE, got {:?}", s))?;
    let house = house
        .trim()
        .parse()
        .with_context(|| format!("Invalid house in {:?}", s))?;
    Ok((name.trim().to_owned(), house))
}

fn load_bank(opt: &Opt) -> Result<MemoryBank> {
    let path = opt
        .bank
        .as_deref()
        .ok_or_else(|| anyhow!("No rule bank given; pass --bank or set NATAL_RULES_BANK"))?;
    MemoryBank::open_sqlite(path, &opt.table)
}

fn matched_ids(bank: &MemoryBank, args: &ChartArgs, today: NaiveDate) -> Result<Vec<RowId>> {
    let chart = NatalChart::from_raw(&args.dob, args.planets.iter().cloned())?;
    let ctx = EvaluationContext::new(&chart, today);
    let mut rng = match args.seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };
    Ok(match_rows(bank, &chart, &ctx, &mut rng).into_iter().collect())
}

fn repl(today: NaiveDate) -> Result<()> {
    let mut editor = Editor::<()>::new();

    loop {
        let readline = editor.readline("> ");
        match readline {
            Ok(line) => {
                editor.add_history_entry(line.as_str());
                println!("{}", transform_condition(&line, today));
            }
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {}", err);
                break;
            }
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let opt = Opt::from_args();

    let default_level = if opt.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let today = opt.today.unwrap_or_else(today_in_ist);

    match &opt.command {
        Command::Match(args) => {
            let bank = load_bank(&opt)?;
            println!("{}", matched_ids(&bank, args, today)?.iter().join(", "));
        }
        Command::Assemble { row_ids } => {
            let bank = load_bank(&opt)?;
            println!("{}", assemble_rule_text(&bank, row_ids.iter().copied(), today));
        }
        Command::PredictRules { chart, ranked } => {
            let bank = load_bank(&opt)?;
            let matched = matched_ids(&bank, chart, today)?;
            let ranked = parse_ranked_row_ids(ranked, &bank);
            let row_ids = combine_row_ids(matched, ranked);
            println!("{}", assemble_rule_text(&bank, row_ids, today));
        }
        Command::Catalogue => {
            let bank = load_bank(&opt)?;
            print!("{}", result_catalogue(&bank));
        }
        Command::Repl => repl(today)?,
    }

    Ok(())
}
