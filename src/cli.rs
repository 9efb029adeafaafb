use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about = "Convert delimited exports into MySQL DDL and INSERT statements", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Convert delimited files to MySQL SQL (CREATE TABLE, keys, INSERTs)
    Convert(ConvertArgs),
    /// Print the inferred column profile of delimited files without writing SQL
    Schema(SchemaArgs),
}

/// Options shared by every command that reads input files.
#[derive(Debug, Clone, Args)]
pub struct InputArgs {
    /// Files or directories of files to read
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,
    /// Extension of files to import from directory inputs (i.e. csv or dat)
    #[arg(short = 'e', long = "import-extension", default_value = "dat")]
    pub import_extension: String,
    /// Reader buffer size in kB; each line should be shorter than this
    #[arg(short = 'b', long = "csv-read-buffer", default_value = "10", value_parser = parse_kilobytes)]
    pub csv_read_buffer: usize,
    /// Field delimiter (supports '|', 'tab', ',', ';' or any ASCII character)
    #[arg(long, default_value = "|", value_parser = parse_delimiter)]
    pub delimiter: u8,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Additional header values whose columns are dropped (empty and '^' always are)
    #[arg(long = "skip-header", action = clap::ArgAction::Append)]
    pub skip_headers: Vec<String>,
    /// Keep columns whose header repeats an earlier column name
    #[arg(long = "keep-duplicate-headers")]
    pub keep_duplicate_headers: bool,
}

#[derive(Debug, Args)]
pub struct ConvertArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Output SQL file ('-' for stdout)
    #[arg(short = 'o', long = "output", default_value = "output.sql")]
    pub output: PathBuf,
    /// Include DROP TABLE (default no, and use CREATE TABLE IF NOT EXISTS)
    #[arg(short = 'd', long = "drop")]
    pub drop: bool,
    /// Just the schema, no INSERTs
    #[arg(short = 's', long = "schema")]
    pub schema_only: bool,
    /// Max length of an INSERT command in kB
    #[arg(short = 'm', long = "max-command-length", default_value = "10", value_parser = parse_kilobytes)]
    pub max_command_length: usize,
}

#[derive(Debug, Args)]
pub struct SchemaArgs {
    #[command(flatten)]
    pub input: InputArgs,
}

pub fn parse_kilobytes(value: &str) -> Result<usize, String> {
    let parsed = value
        .trim()
        .parse::<usize>()
        .map_err(|err| format!("'{value}' is not a whole number of kB: {err}"))?;
    if parsed == 0 {
        return Err("Size must be at least 1 kB".to_string());
    }
    parsed
        .checked_mul(1024)
        .map(|_| parsed)
        .ok_or_else(|| format!("{parsed} kB is too large"))
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
