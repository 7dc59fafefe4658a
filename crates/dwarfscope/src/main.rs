use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use dwarfscope_core::{BinaryImage, ScopeError};
use dwarfscope_utils::{info, LogConfig, LogLevel};
use serde_json::Value;

/// Inspect the symbols, C types and source locations of an ELF binary.
#[derive(Parser, Debug)]
#[command(name = "dwarfscope")]
#[command(version)]
#[command(about = "Inspect the symbols, C types and source locations of an ELF binary", long_about = None)]
struct Cli
{
    /// Log level (overrides RUST_LOG and DWARFSCOPE_LOG_LEVEL)
    #[arg(long, global = true, value_parser = parse_log_level)]
    log_level: Option<LogLevel>,

    /// Also write logs to this file (or to a dated file in this directory)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Dump every variable with its full type as JSON, ordered by name
    Variables
    {
        /// Path to the ELF file
        elf: PathBuf,
        /// Write the JSON to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show one variable with its full type as JSON
    Variable
    {
        elf: PathBuf,
        name: String,
    },
    /// Show one symbol table entry
    Symbol
    {
        elf: PathBuf,
        name: String,
    },
    /// List the source file symbols
    Files
    {
        elf: PathBuf,
    },
    /// List the data object symbols
    Objects
    {
        elf: PathBuf,
    },
    /// Show a type by name as JSON
    Type
    {
        elf: PathBuf,
        name: String,
    },
    /// Map an address to its source file, line and function
    Source
    {
        elf: PathBuf,
        /// Address (hex format: 0x8000100 or decimal)
        #[arg(value_parser = parse_address)]
        address: u64,
    },
    /// Extract the loadable image (all PT_LOAD segments, lowest address first)
    Binary
    {
        elf: PathBuf,
        /// Destination file for the raw bytes
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Show header information and model statistics
    Info
    {
        elf: PathBuf,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError
{
    #[error(transparent)]
    Scope(#[from] ScopeError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn main()
{
    let cli = Cli::parse();

    let config = match LogConfig::from_env() {
        Ok(config) => config.with_level(cli.log_level).with_file(cli.log_file.clone()),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };
    let _guard = match config.init() {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = run_command(cli.command) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(command: Commands) -> Result<(), CliError>
{
    match command {
        Commands::Variables { elf, output } => {
            let image = open(&elf)?;
            let variables: Vec<Value> = image.variables().map(|variable| image.variable_json(variable)).collect();
            write_json(&Value::Array(variables), output.as_deref())
        }
        Commands::Variable { elf, name } => {
            let image = open(&elf)?;
            let variable = image.get_variable(&name)?;
            write_json(&image.variable_json(variable), None)
        }
        Commands::Symbol { elf, name } => {
            let image = open(&elf)?;
            let symbol = image.get_symbol(&name)?;
            write_json(&serde_json::to_value(symbol)?, None)
        }
        Commands::Files { elf } => {
            let image = open(&elf)?;
            print_lines(image.files())
        }
        Commands::Objects { elf } => {
            let image = open(&elf)?;
            print_lines(image.objects())
        }
        Commands::Type { elf, name } => {
            let image = open(&elf)?;
            write_json(&image.type_json(&name), None)
        }
        Commands::Source { elf, address } => {
            let image = open(&elf)?;
            let location = image.get_source_info(address);
            let mut value = serde_json::to_value(&location)?;
            if let Some(symbol) = location.function_symbol() {
                value["function_display_name"] = Value::String(symbol.display_name().to_string());
            }
            write_json(&value, None)
        }
        Commands::Binary { elf, output } => {
            let image = open(&elf)?;
            let data = image.binary();
            fs::write(&output, &data)?;
            match image.binary_address() {
                Some(address) => println!("Wrote {} bytes to {} (load address {address})", data.len(), output.display()),
                None => println!("No loadable segments in {}", elf.display()),
            }
            Ok(())
        }
        Commands::Info { elf } => {
            let image = open(&elf)?;
            print_image_info(&image);
            Ok(())
        }
    }
}

fn open(path: &Path) -> Result<BinaryImage, CliError>
{
    info!("Opening {}", path.display());
    Ok(BinaryImage::open(path)?)
}

fn write_json(value: &Value, output: Option<&Path>) -> Result<(), CliError>
{
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    match output {
        Some(path) => fs::write(path, text)?,
        None => io::stdout().lock().write_all(text.as_bytes())?,
    }
    Ok(())
}

fn print_lines<'a>(lines: impl Iterator<Item = &'a str>) -> Result<(), CliError>
{
    let mut stdout = io::stdout().lock();
    for line in lines {
        writeln!(stdout, "{line}")?;
    }
    Ok(())
}

fn print_image_info(image: &BinaryImage)
{
    let abi = image.abi_info();
    println!("Binary Information:");
    println!("  Path: {}", image.path().display());
    println!("  Endianness: {}", image.endianness());
    println!("  Machine: {} ({})", abi.machine_name(), abi.machine);
    println!("  Version: {}", abi.version_name());
    println!("  Entry Point: {}", image.entry_point());
    match image.binary_address() {
        Some(address) => println!("  Load Address: {address}"),
        None => println!("  Load Address: none"),
    }
    println!("  Symbols: {}", image.symbols().len());
    println!("  Compilation Units: {}", image.debug_info().units().len());
    println!("  Types: {}", image.types().len());
    println!("  Variables: {}", image.variables().count());

    let diagnostics = image.diagnostics();
    println!("  Diagnostics: {}", diagnostics.len());
    for diagnostic in diagnostics {
        println!("    {diagnostic}");
    }
}

fn parse_log_level(value: &str) -> Result<LogLevel, String>
{
    value.parse()
}

/// Parse `0x`-prefixed hex or plain decimal.
fn parse_address(value: &str) -> Result<u64, String>
{
    let trimmed = value.trim();
    let parsed = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => trimmed.replace('_', "").parse(),
    };
    parsed.map_err(|err| format!("invalid address {value:?}: {err}"))
}
