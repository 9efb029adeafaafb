//! The `schema` command: profile files and print what the converter would create.

use std::fmt::Write as _;

use anyhow::Result;
use log::{error, info};

use crate::{
    cli::SchemaArgs,
    convert::{expand_input, profile_source, reader_and_header_options},
    error::ConvertResult,
    io_utils::{DelimitedSource, ReaderOptions},
    profile::HeaderOptions,
    schema::{SchemaColumn, table_name_for},
};

const HEADERS: [&str; 7] = ["field", "column", "type", "definition", "bytes", "chars", "empty"];

pub fn execute(args: &SchemaArgs) -> Result<()> {
    let (reader, headers) = reader_and_header_options(&args.input)?;
    let mut failed = 0usize;
    for input in &args.input.inputs {
        let files = match expand_input(input, &args.input.import_extension) {
            Ok(files) => files,
            Err(err) => {
                error!("{err:#}");
                failed += 1;
                continue;
            }
        };
        for file in files {
            match describe_file(&file, &reader, &headers) {
                Ok(rendered) => print!("{rendered}"),
                Err(err) => {
                    error!("Skipping {:?}: {err}", file);
                    failed += 1;
                }
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} input(s) could not be profiled");
    }
    Ok(())
}

pub fn describe_file(
    path: &std::path::Path,
    reader: &ReaderOptions,
    headers: &HeaderOptions,
) -> ConvertResult<String> {
    let source = DelimitedSource::open(path, reader)?;
    let profiled = profile_source(source, table_name_for(path), headers, path)?;
    info!(
        "Profiled {} row(s) of {:?} ({} skipped)",
        profiled.rows_profiled, path, profiled.rows_skipped
    );
    let rows = profiled
        .profiles
        .iter()
        .zip(&profiled.schema.columns)
        .map(|(profile, column)| {
            vec![
                profile.field_index.to_string(),
                column.name.clone(),
                column.type_label().to_string(),
                column.definition.clone(),
                profile.max_byte_length.to_string(),
                profile.max_char_length.to_string(),
                if profile.is_empty { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect::<Vec<_>>();

    let mut rendered = String::new();
    let _ = writeln!(rendered, "Table `{}`", profiled.schema.table);
    rendered.push_str(&render_table(&rows));
    if let Some(keys) = key_summary(&profiled.schema.columns) {
        let _ = writeln!(rendered, "{keys}");
    }
    Ok(rendered)
}

fn key_summary(columns: &[SchemaColumn]) -> Option<String> {
    let keyed = columns
        .iter()
        .filter(|c| c.is_primary_key || c.is_foreign_key_like)
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>();
    (!keyed.is_empty()).then(|| format!("Keys: {}", keyed.join(", ")))
}

/// Left-aligned columns separated by two spaces, with a dashed rule under the header.
fn render_table(rows: &[Vec<String>]) -> String {
    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut output = String::new();
    push_line(&mut output, &widths, HEADERS);
    push_line(&mut output, &widths, widths.map(|w| "-".repeat(w)));
    for row in rows {
        push_line(&mut output, &widths, row);
    }
    output
}

fn push_line<I, S>(output: &mut String, widths: &[usize], cells: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut line = String::new();
    for (idx, cell) in cells.into_iter().enumerate() {
        let cell = cell.as_ref();
        if idx > 0 {
            line.push_str("  ");
        }
        line.push_str(cell);
        let padding = widths[idx].saturating_sub(cell.chars().count());
        line.push_str(&" ".repeat(padding));
    }
    output.push_str(line.trim_end());
    output.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn describe_lists_profiles_and_keys() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("orders.dat");
        fs::write(&path, "id|customer_id|note|^\n1|7|caf\u{e9}|x\n2|8||y\n").expect("write");
        let rendered =
            describe_file(&path, &ReaderOptions::default(), &HeaderOptions::default()).expect("describe");
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "Table `orders`");
        assert!(lines[1].starts_with("field  column"));
        assert!(lines[2].starts_with("-----  "));
        assert!(lines[3].contains("unsigned_int"));
        assert!(lines[5].contains("VARCHAR(4) NOT NULL"));
        assert!(lines[5].contains("  5  "));
        assert_eq!(lines.len(), 7);
        assert_eq!(lines[6], "Keys: id, customer_id");
    }
}
