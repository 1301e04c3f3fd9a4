//! vizgrid CLI - table conversion and view materialization tool

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use vizgrid::prelude::*;

#[derive(Parser)]
#[command(name = "vizgrid")]
#[command(author, version, about = "Inspect, convert and materialize chart data tables")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a table between CSV, TSV and JSON
    Convert {
        /// Input table file (csv, tsv, json)
        input: PathBuf,

        /// Output file; the format follows its extension (default: JSON on stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Apply a JSON view configuration to a table and print the result
    View {
        /// Input table file (csv, tsv, json)
        input: PathBuf,

        /// View configuration file (`{"columns": [...], "rows": [...]}`)
        #[arg(short, long)]
        config: PathBuf,

        /// Output format on stdout
        #[arg(short, long, value_enum, default_value = "csv")]
        format: OutputFormat,

        /// Write formatted values instead of raw values (CSV only)
        #[arg(long)]
        formatted: bool,

        /// Field delimiter for CSV output
        #[arg(short, long, default_value = ",")]
        delimiter: char,
    },

    /// Show the columns and row count of a table
    Info {
        /// Input table file
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Convert { input, output } => convert(&input, output.as_deref()),
        Commands::View {
            input,
            config,
            format,
            formatted,
            delimiter,
        } => view(&input, &config, format, formatted, delimiter),
        Commands::Info { input } => show_info(&input),
    }
}

fn load(input: &Path) -> Result<DataTable> {
    DataTable::open(input).with_context(|| format!("Failed to open '{}'", input.display()))
}

fn convert(input: &Path, output: Option<&Path>) -> Result<()> {
    let table = load(input)?;

    if let Some(output_path) = output {
        table
            .save(output_path)
            .with_context(|| format!("Failed to write '{}'", output_path.display()))?;
        eprintln!(
            "Wrote {} rows to '{}'",
            table.number_of_rows(),
            output_path.display()
        );
    } else {
        let json = table.to_json().context("Failed to serialize table")?;
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", json)?;
    }
    Ok(())
}

fn view(
    input: &Path,
    config: &Path,
    format: OutputFormat,
    formatted: bool,
    delimiter: char,
) -> Result<()> {
    if !delimiter.is_ascii() {
        bail!("Delimiter must be a single ASCII character, got '{}'", delimiter);
    }
    let table = shared(load(input)?);
    let json = std::fs::read_to_string(config)
        .with_context(|| format!("Failed to read '{}'", config.display()))?;
    let view = DataView::from_json(table, &json)
        .with_context(|| format!("Invalid view configuration in '{}'", config.display()))?;
    let result = view
        .to_data_table()
        .context("Failed to materialize view")?;

    let stdout = io::stdout().lock();
    match format {
        OutputFormat::Csv => {
            let options = CsvWriteOptions::new()
                .with_delimiter(delimiter as u8)
                .with_formatted(formatted);
            CsvWriter::write(&result, stdout, &options).context("Failed to write CSV")?;
        }
        OutputFormat::Json => {
            let mut stdout = stdout;
            writeln!(stdout, "{}", result.to_json()?)?;
        }
    }
    Ok(())
}

fn show_info(input: &Path) -> Result<()> {
    let table = load(input)?;

    println!("File: {}", input.display());
    println!(
        "Size: {} columns x {} rows",
        table.number_of_columns(),
        table.number_of_rows()
    );
    println!();
    println!("{:<5} {:<20} {:<20} {:<10}", "#", "Id", "Label", "Type");
    println!("{}", "-".repeat(58));
    for col in 0..table.number_of_columns() {
        println!(
            "{:<5} {:<20} {:<20} {:<10}",
            col,
            table.get_column_id(col)?,
            table.get_column_label(col)?,
            table.get_column_type(col)?.as_str()
        );
    }
    Ok(())
}
