//! # baltab
//!
//! A CLI tool for building balance tables from CSV data.
//!
//! ## Overview
//!
//! baltab is built on top of baltablib. It reads a CSV file, groups the rows
//! by one column, and prints per-group means, standard deviations, level
//! counts and the difference in means between two groups.
//!
//! ## Usage
//!
//! ```bash
//! # Plain table on the terminal
//! baltab data.csv --group treat
//!
//! # Formula-style grouping, p-values, two decimals
//! baltab data.csv -g "~ treat" --dinm-statistic p --fmt "%.2f"
//!
//! # Write LaTeX, with a title and a note
//! baltab data.csv -g treat -o balance.tex --title "Balance" --note "Source: survey"
//!
//! # Add extra columns and rows from CSV files
//! baltab data.csv -g treat --add-rows extra_rows.csv --row-positions 0
//! ```
//!
//! Set `RUST_LOG=debug` to trace the pipeline.

mod render;

use std::process::ExitCode;

use anyhow::{Context, Result};
use baltablib::output::{Artifact, Backend, Destination, Format, OutputDispatcher, Settings};
use baltablib::{
    add_columns, add_rows, build_balance_table, BalanceOptions, Dataset, DiffStatistic,
    ExtraColumns, ExtraRows, GroupSelector, NumberFormat,
};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use console::Style;

/// Build the clap Command structure
fn build_command() -> Command {
    Command::new("baltab")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Arthur Debert")
        .about("Balance tables: group summaries and differences in means")
        .arg(
            Arg::new("data")
                .required(true)
                .help("CSV file with a header row"),
        )
        .arg(
            Arg::new("group")
                .short('g')
                .long("group")
                .required(true)
                .help("Grouping column, as a name or a one-sided formula (\"~ treat\")"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .default_value("plain")
                .help("Backend keyword (plain, html, latex, markdown, cells, grid, office) or file path"),
        )
        .arg(
            Arg::new("fmt")
                .long("fmt")
                .default_value(baltablib::options::DEFAULT_FMT)
                .help("Numeric format directive (%.Nf, %.Ne, %d)"),
        )
        .arg(
            Arg::new("no-dinm")
                .long("no-dinm")
                .action(ArgAction::SetTrue)
                .help("Do not compute differences in means"),
        )
        .arg(
            Arg::new("dinm-statistic")
                .long("dinm-statistic")
                .default_value("se")
                .help("Precision shown next to the difference (se, p)"),
        )
        .arg(Arg::new("title").long("title").help("Table caption"))
        .arg(
            Arg::new("note")
                .long("note")
                .action(ArgAction::Append)
                .help("Note printed below the table (can be specified multiple times)"),
        )
        .arg(
            Arg::new("add-columns")
                .long("add-columns")
                .help("CSV file with extra columns (header row names them)"),
        )
        .arg(
            Arg::new("column-positions")
                .long("column-positions")
                .value_delimiter(',')
                .value_parser(value_parser!(usize))
                .requires("add-columns")
                .help("0-based final positions of the extra columns (comma-separated)"),
        )
        .arg(
            Arg::new("add-rows")
                .long("add-rows")
                .help("Headerless CSV file with extra rows"),
        )
        .arg(
            Arg::new("row-positions")
                .long("row-positions")
                .value_delimiter(',')
                .value_parser(value_parser!(usize))
                .requires("add-rows")
                .help("0-based final positions of the extra rows (comma-separated)"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .help("TOML file with output settings"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Print the table as JSON (only with --output plain)"),
        )
}

/// Positions given for an option, if any
fn positions(matches: &ArgMatches, id: &str) -> Option<Vec<usize>> {
    matches
        .get_many::<usize>(id)
        .map(|values| values.copied().collect())
}

/// Read options shared by the table builder
fn balance_options(matches: &ArgMatches) -> Result<BalanceOptions> {
    let fmt_arg = matches.get_one::<String>("fmt").map(String::as_str);
    let fmt = fmt_arg
        .unwrap_or(baltablib::options::DEFAULT_FMT)
        .parse::<NumberFormat>()?;
    let statistic = matches
        .get_one::<String>("dinm-statistic")
        .map(String::as_str)
        .unwrap_or("se")
        .parse::<DiffStatistic>()
        .map_err(anyhow::Error::msg)?;

    let mut options = BalanceOptions::new()
        .fmt(fmt)
        .dinm(!matches.get_flag("no-dinm"))
        .dinm_statistic(statistic);
    if let Some(title) = matches.get_one::<String>("title") {
        options = options.title(title.clone());
    }
    if let Some(notes) = matches.get_many::<String>("note") {
        for note in notes {
            options = options.note(note.clone());
        }
    }
    Ok(options)
}

/// Whether the destination hands back the table itself rather than a
/// rendered document.
fn is_in_memory(destination: &Destination) -> bool {
    matches!(
        destination,
        Destination::Keyword {
            backend: Backend::Plain,
            format: Format::Plain,
        }
    )
}

fn run(matches: &ArgMatches) -> Result<()> {
    let data_path = matches
        .get_one::<String>("data")
        .context("missing data file")?;
    let dataset = Dataset::from_csv_path(data_path)
        .with_context(|| format!("failed to read '{}'", data_path))?;

    let group = matches
        .get_one::<String>("group")
        .context("missing grouping column")?;
    let selector = if group.contains('~') {
        GroupSelector::parse(group)?
    } else {
        GroupSelector::column(group.as_str())?
    };

    let options = balance_options(matches)?;
    let settings = match matches.get_one::<String>("config") {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    let mut table = build_balance_table(&dataset, &selector, &options)?;

    if let Some(path) = matches.get_one::<String>("add-columns") {
        let mut extra = ExtraColumns::from_csv_path(path)
            .with_context(|| format!("failed to read '{}'", path))?;
        extra.positions = positions(matches, "column-positions");
        table = add_columns(table, &extra, &options.fmt)?;
    }
    if let Some(path) = matches.get_one::<String>("add-rows") {
        let mut extra =
            ExtraRows::from_csv_path(path).with_context(|| format!("failed to read '{}'", path))?;
        extra.positions = positions(matches, "row-positions");
        table = add_rows(table, &extra, &options.fmt)?;
    }

    let destination = matches
        .get_one::<String>("output")
        .map(String::as_str)
        .unwrap_or("plain");
    let json = matches.get_flag("json");
    if json && !is_in_memory(&Destination::resolve(destination, &settings)?) {
        anyhow::bail!("--json needs --output plain, got '{}'", destination);
    }
    match OutputDispatcher::new(settings).dispatch(table, destination)? {
        Some(Artifact::Table(table)) if json => {
            println!("{}", serde_json::to_string_pretty(&table)?);
        }
        Some(Artifact::Table(table)) => println!("{}", render::render_table(&table)?),
        Some(Artifact::Text(text)) => print!("{}", text),
        None => log::info!("wrote {}", destination),
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let matches = build_command().get_matches();

    match run(&matches) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let label = Style::new().red().bold().for_stderr().apply_to("Error:");
            eprintln!("{} {:#}", label, e);
            ExitCode::FAILURE
        }
    }
}
