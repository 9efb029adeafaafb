//! Conversion of delimited files into SQL, one file at a time.
//!
//! Each file is read twice through a [`DelimitedSource`]: once to profile the
//! columns, then, after rewinding, once to emit INSERT commands against the
//! resolved schema. Files share a single SQL destination but nothing else; a
//! failing file is reported, its partial output is rolled back where the
//! destination allows it, and the remaining files still run.

use std::{
    fs,
    io::{Read, Seek, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use log::{debug, error, info, warn};

use crate::{
    cli::{ConvertArgs, InputArgs},
    error::{ConvertError, ConvertResult},
    insert::{BatchStats, InsertBatcher},
    io_utils::{self, DelimitedSource, ReaderOptions, SqlWriter},
    profile::{ColumnProfile, ColumnProfiler, HeaderOptions, RowShape},
    schema::{TableSchema, table_name_for},
};

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub drop: bool,
    pub schema_only: bool,
    pub import_extension: String,
    pub reader: ReaderOptions,
    pub headers: HeaderOptions,
    pub max_command_kb: usize,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            drop: false,
            schema_only: false,
            import_extension: "dat".to_string(),
            reader: ReaderOptions::default(),
            headers: HeaderOptions::default(),
            max_command_kb: 10,
        }
    }
}

impl ConvertOptions {
    pub fn from_args(args: &ConvertArgs) -> Result<Self> {
        let (reader, headers) = reader_and_header_options(&args.input)?;
        Ok(Self {
            drop: args.drop,
            schema_only: args.schema_only,
            import_extension: args.input.import_extension.clone(),
            reader,
            headers,
            max_command_kb: args.max_command_length,
        })
    }
}

pub(crate) fn reader_and_header_options(args: &InputArgs) -> Result<(ReaderOptions, HeaderOptions)> {
    let reader = ReaderOptions {
        delimiter: args.delimiter,
        buffer_bytes: args.csv_read_buffer * 1024,
        encoding: io_utils::resolve_encoding(args.input_encoding.as_deref())?,
    };
    let mut headers = HeaderOptions {
        skip_duplicates: !args.keep_duplicate_headers,
        ..HeaderOptions::default()
    };
    headers.skip.extend(args.skip_headers.iter().cloned());
    Ok((reader, headers))
}

/// Expands a directory argument into its files with `extension`, sorted by path.
/// Any other path is returned unchanged so missing files are reported per file.
pub fn expand_input(path: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(path).with_context(|| format!("Listing directory {path:?}"))? {
        let entry = entry.with_context(|| format!("Listing directory {path:?}"))?;
        let candidate = entry.path();
        if candidate.is_file() && candidate.extension().is_some_and(|ext| ext == extension) {
            files.push(candidate);
        }
    }
    files.sort();
    if files.is_empty() {
        warn!("Directory {path:?} contains no '.{extension}' files");
    }
    Ok(files)
}

/// A file after the profiling pass, ready to be rewound for emission.
pub struct ProfiledSource<R> {
    pub source: DelimitedSource<R>,
    pub schema: TableSchema,
    pub profiles: Vec<ColumnProfile>,
    pub shape: RowShape,
    pub rows_profiled: usize,
    pub rows_skipped: usize,
}

pub fn profile_source<R>(
    mut source: DelimitedSource<R>,
    table: String,
    headers: &HeaderOptions,
    path: &Path,
) -> ConvertResult<ProfiledSource<R>>
where
    R: Read + Seek,
{
    let mut profiler = ColumnProfiler::new(source.headers(), headers);
    if profiler.profiles().is_empty() {
        return Err(ConvertError::NoColumns(path.to_path_buf()));
    }
    let mut row = Vec::new();
    while source.next_row(&mut row)?.is_some() {
        profiler.observe(&row);
    }
    debug!(
        "Profiled {} row(s) of {:?}, skipped {} with a field count other than {}",
        profiler.rows_profiled(),
        path,
        profiler.rows_skipped(),
        profiler.shape().field_count
    );
    let shape = profiler.shape();
    let rows_profiled = profiler.rows_profiled();
    let rows_skipped = profiler.rows_skipped();
    let profiles = profiler.into_profiles();
    let schema = TableSchema::resolve(table, &profiles);
    Ok(ProfiledSource {
        source,
        schema,
        profiles,
        shape,
        rows_profiled,
        rows_skipped,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSummary {
    pub table: String,
    pub columns: usize,
    pub rows_profiled: usize,
    pub rows_skipped: usize,
    pub batch: BatchStats,
}

/// Writes the DDL, key statement and (unless schema-only) INSERTs for one source.
pub fn convert_source<R, W>(
    source: DelimitedSource<R>,
    path: &Path,
    options: &ConvertOptions,
    out: &mut W,
) -> ConvertResult<FileSummary>
where
    R: Read + Seek,
    W: Write,
{
    let ProfiledSource {
        mut source,
        schema,
        shape,
        rows_profiled,
        rows_skipped,
        ..
    } = profile_source(source, table_name_for(path), &options.headers, path)?;

    out.write_all(schema.create_table_sql(options.drop).as_bytes())?;
    if let Some(index_sql) = schema.index_sql() {
        out.write_all(index_sql.as_bytes())?;
    }

    let mut summary = FileSummary {
        table: schema.table.clone(),
        columns: schema.columns.len(),
        rows_profiled,
        rows_skipped,
        batch: BatchStats::default(),
    };
    if options.schema_only {
        out.flush()?;
        return Ok(summary);
    }

    source.rewind()?;
    let mut batcher = InsertBatcher::new(&schema, shape, options.max_command_kb, &mut *out);
    let mut row = Vec::new();
    while let Some(line) = source.next_row(&mut row)? {
        batcher.push_row(line, &row)?;
    }
    summary.batch = batcher.finish()?;
    Ok(summary)
}

pub fn convert_file<W>(path: &Path, options: &ConvertOptions, out: &mut W) -> ConvertResult<FileSummary>
where
    W: Write,
{
    let source = DelimitedSource::open(path, &options.reader)?;
    convert_source(source, path, options, out)
}

fn write_file_separator<W: Write>(out: &mut W, needed: bool) -> ConvertResult<()> {
    if needed {
        out.write_all(b"\n")?;
    }
    Ok(())
}

pub fn execute(args: &ConvertArgs) -> Result<()> {
    let options = ConvertOptions::from_args(args)?;
    let mut writer = SqlWriter::create(&args.output)?;
    let mut failed = 0usize;
    let mut converted = 0usize;

    let mut files = Vec::new();
    for input in &args.input.inputs {
        match expand_input(input, &options.import_extension) {
            Ok(expanded) => files.extend(expanded),
            Err(err) => {
                error!("{err:#}");
                failed += 1;
            }
        }
    }

    for file in &files {
        info!("Converting {:?}", file);
        let mark = writer
            .checkpoint()
            .with_context(|| format!("Preparing output {:?}", args.output))?;
        let result = write_file_separator(&mut writer, converted > 0)
            .and_then(|()| convert_file(file, &options, &mut writer));
        match result {
            Ok(summary) => {
                converted += 1;
                info!(
                    "Table `{}`: {} column(s), {} row(s) profiled, {} skipped, {} row(s) in {} INSERT command(s)",
                    summary.table,
                    summary.columns,
                    summary.rows_profiled,
                    summary.rows_skipped,
                    summary.batch.tuples_written,
                    summary.batch.commands_written
                );
            }
            Err(err) => {
                failed += 1;
                error!("Skipping {:?}: {err}", file);
                let rolled_back = writer
                    .rollback(mark)
                    .with_context(|| format!("Discarding partial output for {file:?}"))?;
                if !rolled_back {
                    warn!("Output for {:?} may be incomplete", file);
                }
            }
        }
    }
    writer
        .flush()
        .with_context(|| format!("Writing output {:?}", args.output))?;

    info!(
        "Converted {converted} file(s) into {:?}",
        args.output
    );
    if failed > 0 {
        return Err(anyhow!("{failed} input(s) could not be converted"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn source(text: &str) -> DelimitedSource<Cursor<Vec<u8>>> {
        DelimitedSource::from_reader(Cursor::new(text.as_bytes().to_vec()), &ReaderOptions::default())
            .expect("open")
            .expect("header")
    }

    fn convert(text: &str, options: &ConvertOptions) -> ConvertResult<(String, FileSummary)> {
        let mut out = Vec::new();
        let summary = convert_source(source(text), Path::new("people.dat"), options, &mut out)?;
        Ok((String::from_utf8(out).expect("utf8"), summary))
    }

    #[test]
    fn scenario_id_name_score() {
        let (sql, summary) =
            convert("id|name|score\n1|Alice|10\n2|Bob|\n", &ConvertOptions::default()).expect("convert");
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS `people` (\n  \
             `id` TINYINT UNSIGNED NOT NULL DEFAULT 0 PRIMARY KEY,\n  \
             `name` VARCHAR(5) NOT NULL,\n  \
             `score` TINYINT UNSIGNED NOT NULL DEFAULT 0\n);\n\
             INSERT INTO `people` (`id`, `name`, `score`) VALUES \n\
             (1,\"Alice\",10),(2,\"Bob\",NULL);\n"
        );
        assert_eq!(summary.rows_profiled, 2);
        assert_eq!(summary.batch.tuples_written, 2);
    }

    #[test]
    fn both_passes_use_the_same_rows() {
        let (_, summary) = convert(
            "a|b\n1|2\n3\n4|5|6\n7|8\n",
            &ConvertOptions::default(),
        )
        .expect("convert");
        assert_eq!(summary.rows_profiled, summary.batch.tuples_written);
        assert_eq!(summary.rows_skipped, summary.batch.rows_skipped);
        assert_eq!(summary.rows_profiled, 2);
    }

    #[test]
    fn schema_only_stops_after_ddl() {
        let options = ConvertOptions {
            schema_only: true,
            drop: true,
            ..ConvertOptions::default()
        };
        let (sql, summary) = convert("user_id|v\n1|x\n", &options).expect("convert");
        assert!(sql.starts_with("DROP TABLE IF EXISTS `people`;\n"));
        assert!(sql.ends_with("ALTER TABLE `people`\n\tADD KEY `user_id` (`user_id`);\n"));
        assert!(!sql.contains("INSERT"));
        assert_eq!(summary.batch, BatchStats::default());
    }

    #[test]
    fn all_skipped_headers_is_an_error() {
        let err = convert("^|\n1|2\n", &ConvertOptions::default()).expect_err("no columns");
        assert!(matches!(err, ConvertError::NoColumns(_)));
    }

    #[test]
    fn expand_input_filters_directory_by_extension() {
        let dir = tempdir().expect("temp dir");
        for name in ["b.dat", "a.dat", "c.csv", "d.dat.bak"] {
            fs::write(dir.path().join(name), "x\n1\n").expect("write");
        }
        fs::create_dir(dir.path().join("nested.dat")).expect("mkdir");
        let files = expand_input(dir.path(), "dat").expect("expand");
        let names = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["a.dat", "b.dat"]);
    }

    #[test]
    fn expand_input_passes_files_through() {
        let files = expand_input(Path::new("missing.csv"), "dat").expect("expand");
        assert_eq!(files, vec![PathBuf::from("missing.csv")]);
    }
}
