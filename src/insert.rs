//! INSERT emission: the second pass over a file's data rows.
//!
//! Rows are rendered as value tuples against the resolved [`TableSchema`] and
//! packed into `INSERT INTO ... VALUES` commands. A command, including its
//! terminating `;`, never exceeds the configured byte limit; a row that cannot
//! fit in an otherwise empty command is a fatal error rather than being split
//! or truncated.

use std::io::Write;

use itertools::Itertools;
use log::debug;

use crate::{
    error::{ConvertError, ConvertResult},
    profile::RowShape,
    schema::TableSchema,
};

const TERMINATOR: &str = ";";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub tuples_written: usize,
    pub commands_written: usize,
    pub rows_skipped: usize,
}

#[derive(Debug, Clone, Copy)]
struct RenderSlot {
    field_index: usize,
    numeric: bool,
}

/// Appends one field to `out` as a SQL literal.
///
/// Numeric columns were validated during profiling, so their values are
/// emitted verbatim; an empty numeric value becomes `NULL`. Everything else,
/// including empty text, is a double-quoted string.
pub fn render_value(out: &mut String, raw: &str, numeric: bool) {
    if numeric {
        if raw.is_empty() {
            out.push_str("NULL");
        } else {
            out.push_str(raw);
        }
        return;
    }
    out.push('"');
    for ch in raw.chars() {
        if matches!(ch, '"' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
}

pub fn insert_preamble(schema: &TableSchema) -> String {
    format!(
        "INSERT INTO `{}` (`{}`) VALUES \n",
        schema.table,
        schema.column_names().join("`, `")
    )
}

pub struct InsertBatcher<W> {
    out: W,
    slots: Vec<RenderSlot>,
    shape: RowShape,
    preamble: String,
    max_command_bytes: usize,
    command: String,
    tuple: String,
    pending: usize,
    stats: BatchStats,
}

impl<W> InsertBatcher<W>
where
    W: Write,
{
    pub fn new(schema: &TableSchema, shape: RowShape, max_command_kb: usize, out: W) -> Self {
        let slots = schema
            .columns
            .iter()
            .map(|column| RenderSlot {
                field_index: column.field_index,
                numeric: column.is_numeric(),
            })
            .collect();
        let preamble = insert_preamble(schema);
        Self {
            out,
            slots,
            shape,
            command: preamble.clone(),
            preamble,
            max_command_bytes: max_command_kb.saturating_mul(1024),
            tuple: String::new(),
            pending: 0,
            stats: BatchStats::default(),
        }
    }

    /// Largest tuple that fits in a command on its own.
    pub fn tuple_budget(&self) -> usize {
        self.max_command_bytes
            .saturating_sub(self.preamble.len() + TERMINATOR.len())
    }

    /// Renders and queues one data row. Rows the profiler would skip are skipped here too.
    pub fn push_row(&mut self, line: u64, row: &[String]) -> ConvertResult<()> {
        if !self.shape.accepts(row) {
            self.stats.rows_skipped += 1;
            return Ok(());
        }

        self.tuple.clear();
        self.tuple.push('(');
        for (position, slot) in self.slots.iter().enumerate() {
            if position > 0 {
                self.tuple.push(',');
            }
            render_value(&mut self.tuple, &row[slot.field_index], slot.numeric);
        }
        self.tuple.push(')');

        let budget = self.tuple_budget();
        if self.tuple.len() > budget {
            return Err(ConvertError::RowTooLarge {
                line,
                tuple_bytes: self.tuple.len(),
                budget,
            });
        }

        let separator = usize::from(self.pending > 0);
        if self.command.len() + separator + self.tuple.len() + TERMINATOR.len()
            > self.max_command_bytes
        {
            self.flush_command()?;
        }
        if self.pending > 0 {
            self.command.push(',');
        }
        self.command.push_str(&self.tuple);
        self.pending += 1;
        self.stats.tuples_written += 1;
        Ok(())
    }

    fn flush_command(&mut self) -> ConvertResult<()> {
        if self.pending == 0 {
            return Ok(());
        }
        self.command.push_str(TERMINATOR);
        self.command.push('\n');
        self.out.write_all(self.command.as_bytes())?;
        debug!(
            "Wrote INSERT command with {} row(s), {} bytes",
            self.pending,
            self.command.len() - 1
        );
        self.command.clear();
        self.command.push_str(&self.preamble);
        self.pending = 0;
        self.stats.commands_written += 1;
        Ok(())
    }

    /// Writes the final partial command, if any.
    pub fn finish(mut self) -> ConvertResult<BatchStats> {
        self.flush_command()?;
        self.out.flush()?;
        Ok(self.stats)
    }
}
