use anyhow::{bail, Context, Result};
use blackjack_book::{BookBuilder, BookTable, BuildOptions, DeckModel, RuleSet};
use blackjack_book_drivers::{convert_overrides, parse_config_from_file, Config};
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use std::fs::File;
use std::io::{BufReader, BufWriter};

const DEFAULT_CONFIG_PATH: &str = "~/.blackjack_book.yml";

#[derive(Debug, Parser)]
#[command(author, about, long_about = None)]
struct CommandLineArgs {
    /// The path of the config file
    #[arg(short, long, global = true, default_value_t = String::from(DEFAULT_CONFIG_PATH))]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Builds a book and writes it to a file
    Build {
        /// Where the book is written
        #[arg(short, long, default_value_t = String::from("book.yml"))]
        output: String,
    },
    /// Simulates the pair rows of a book again under the config's split options
    RebuildPairs {
        /// The book to read
        #[arg(short, long)]
        book: String,
        /// Where the rebuilt book is written
        #[arg(short, long)]
        output: String,
    },
    /// Prints the expectation of a round played by a book and the overrides
    Summary {
        /// The book to read
        #[arg(short, long, default_value_t = String::from("book.yml"))]
        book: String,
    },
}

fn main() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .format_timestamp_millis()
        .init();

    let args = CommandLineArgs::parse();
    if let Err(e) = run(args) {
        error!("{e:#}");
        std::process::exit(1);
    }
}

fn run(args: CommandLineArgs) -> Result<()> {
    let config_path = resolve_config_path(&args.config)?;
    let config = parse_config_from_file(&config_path)?;
    info!("Using config {}", config_path);

    match args.command {
        Command::Build { output } => build(config, &output),
        Command::RebuildPairs { book, output } => rebuild_pairs(config, &book, &output),
        Command::Summary { book } => summary(config, &book),
    }
}

fn resolve_config_path(config: &str) -> Result<String> {
    if config != DEFAULT_CONFIG_PATH {
        return Ok(config.to_string());
    }
    let home_dir = home::home_dir().context("Cannot find home directory")?;
    let config_file_path = home_dir.join(".blackjack_book.yml");
    if !config_file_path.exists() {
        bail!("Config file {} does not exist", config_file_path.display());
    }
    if config_file_path.is_dir() {
        bail!(
            "{} should be a file rather than a directory",
            config_file_path.display()
        );
    }
    Ok(config_file_path.to_string_lossy().into_owned())
}

fn build(config: Config, output: &str) -> Result<()> {
    let rule: RuleSet = config.rule.try_into()?;
    let deck: DeckModel = config.deck.try_into()?;
    let options: BuildOptions = config.build.try_into()?;

    let table = BookBuilder::new(rule, deck, options)?.build()?;
    report_deviations(&table)?;
    save(&table, output)
}

fn rebuild_pairs(config: Config, book: &str, output: &str) -> Result<()> {
    let rule: RuleSet = config.rule.try_into()?;
    let deck: DeckModel = config.deck.try_into()?;
    let options: BuildOptions = config.build.try_into()?;

    let file = File::open(book).with_context(|| format!("Cannot open {book}"))?;
    let mut table = BookTable::load_unchecked(BufReader::new(file))?;
    let builder = BookBuilder::new(*table.rule(), deck, options)?;
    builder.rebuild_pairs(&mut table, rule)?;
    save(&table, output)
}

fn summary(config: Config, book: &str) -> Result<()> {
    let rule: RuleSet = config.rule.try_into()?;
    let deck: DeckModel = config.deck.try_into()?;
    let overrides = convert_overrides(&config.overrides)?;

    let file = File::open(book).with_context(|| format!("Cannot open {book}"))?;
    let table = BookTable::load_from_reader(BufReader::new(file), &rule, &deck)?;
    let summary = table.total_ev_summary(&overrides)?;

    println!("Total EV:              {:+.6}", summary.total_ev);
    println!("Deviation cost:        {:.6}", summary.deviation_cost);
    println!(
        "Player natural chance: {:.6}",
        summary.player_natural_chance
    );
    println!(
        "Dealer natural chance: {:.6}",
        summary.dealer_natural_chance
    );
    println!("Both natural chance:   {:.6}", summary.both_natural_chance);
    Ok(())
}

fn report_deviations(table: &BookTable) -> Result<()> {
    for hand in table.infeasible_hands() {
        warn!("Hand {:?} cannot be dealt from this deck", hand);
    }
    for deviation in table.hard_hand_deviations()? {
        info!(
            "Hard {} vs {}: {:?} plays {} instead of {}",
            deviation.total,
            deviation.upcard,
            deviation.cards,
            deviation.deviation_action,
            deviation.book_action
        );
    }
    Ok(())
}

fn save(table: &BookTable, output: &str) -> Result<()> {
    let file = File::create(output).with_context(|| format!("Cannot create {output}"))?;
    table.save_to_writer(BufWriter::new(file))?;
    info!("Book written to {}", output);
    Ok(())
}
