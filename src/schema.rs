//! Schema resolution: turns finished column profiles into MySQL DDL.
//!
//! Each [`ColumnProfile`] resolves to exactly one [`SchemaColumn`] whose
//! definition is a concrete DDL fragment such as `VARCHAR(42) NOT NULL`.
//! [`TableSchema`] renders the `DROP`/`CREATE TABLE` block and the
//! `ALTER TABLE ... ADD KEY` statement for `*_id` columns.
//!
//! ## Resolution rules
//!
//! - The first surviving candidate in precedence order wins; no survivors, or
//!   a column that never held a value, means text.
//! - Text widths come from observed lengths: `MEDIUMTEXT` above 65535 bytes,
//!   `TEXT` above 255 bytes, otherwise `VARCHAR` with 10% slack over the
//!   longest value in characters.
//! - Integer widths come from the observed integer range.
//! - Non-empty numeric columns are `NOT NULL DEFAULT 0`; dates stay nullable.

use std::{fmt::Write as _, path::Path, sync::LazyLock};

use itertools::Itertools;
use regex::Regex;

use crate::profile::{ColumnProfile, TypeTag};

static TABLE_NAME_NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9_]+").expect("valid table name pattern"));

const TINYTEXT_MAX_BYTES: usize = 255;
const TEXT_MAX_BYTES: usize = 65_535;
const TINYINT_UNSIGNED_MAX: i128 = u8::MAX as i128;
const INT_UNSIGNED_MAX: i128 = u32::MAX as i128;

/// Table name derived from the input file's base name without extension.
pub fn table_name_for(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy())
        .unwrap_or_default();
    TABLE_NAME_NOISE.replace_all(&stem, "_").into_owned()
}

/// Resolved type tag for a profile; `None` is text.
pub fn resolve_tag(profile: &ColumnProfile) -> Option<TypeTag> {
    if profile.is_empty {
        None
    } else {
        profile.candidates.first()
    }
}

pub fn column_definition(tag: Option<TypeTag>, profile: &ColumnProfile) -> String {
    let not_null_default_zero = if profile.is_empty {
        ""
    } else {
        " NOT NULL DEFAULT 0"
    };
    match tag {
        None => {
            // Empty strings and absent values are both inserted as "", so text is never NULL.
            let base = if profile.max_byte_length > TEXT_MAX_BYTES {
                "MEDIUMTEXT".to_string()
            } else if profile.max_byte_length > TINYTEXT_MAX_BYTES {
                "TEXT".to_string()
            } else {
                format!("VARCHAR({})", profile.max_char_length * 11 / 10)
            };
            format!("{base} NOT NULL")
        }
        Some(TypeTag::UnsignedInt) => {
            let base = if profile.max_integer <= TINYINT_UNSIGNED_MAX {
                "TINYINT UNSIGNED"
            } else if profile.max_integer <= INT_UNSIGNED_MAX {
                "INT(10) UNSIGNED"
            } else {
                "BIGINT UNSIGNED"
            };
            format!("{base}{not_null_default_zero}")
        }
        Some(TypeTag::SignedInt) => {
            let within = |min: i128, max: i128| profile.min_integer >= min && profile.max_integer <= max;
            let base = if within(i8::MIN.into(), i8::MAX.into()) {
                "TINYINT SIGNED"
            } else if within(i32::MIN.into(), i32::MAX.into()) {
                "INT(10) SIGNED"
            } else {
                "BIGINT SIGNED"
            };
            format!("{base}{not_null_default_zero}")
        }
        Some(TypeTag::Float) => format!("DECIMAL(12,4){not_null_default_zero}"),
        // No generic default date exists, so dates are always nullable.
        Some(TypeTag::Date) => "DATE".to_string(),
        Some(TypeTag::DateTime) => {
            if profile.is_empty {
                "TIMESTAMP".to_string()
            } else {
                "TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP".to_string()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaColumn {
    pub field_index: usize,
    pub name: String,
    pub tag: Option<TypeTag>,
    /// Full DDL fragment after the column name.
    pub definition: String,
    pub is_primary_key: bool,
    pub is_foreign_key_like: bool,
}

impl SchemaColumn {
    pub fn resolve(profile: &ColumnProfile) -> Self {
        let tag = resolve_tag(profile);
        let is_primary_key = profile.name.eq_ignore_ascii_case("id");
        let mut definition = column_definition(tag, profile);
        if is_primary_key {
            definition.push_str(" PRIMARY KEY");
        }
        Self {
            field_index: profile.field_index,
            name: profile.name.clone(),
            tag,
            definition,
            is_primary_key,
            is_foreign_key_like: profile.name.ends_with("_id"),
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.tag.is_some_and(TypeTag::is_numeric)
    }

    pub fn type_label(&self) -> &'static str {
        self.tag.map_or("text", TypeTag::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub table: String,
    pub columns: Vec<SchemaColumn>,
}

impl TableSchema {
    pub fn resolve(table: impl Into<String>, profiles: &[ColumnProfile]) -> Self {
        Self {
            table: table.into(),
            columns: profiles.iter().map(SchemaColumn::resolve).collect(),
        }
    }

    pub fn create_table_sql(&self, drop: bool) -> String {
        let table = &self.table;
        let mut sql = String::new();
        if drop {
            let _ = writeln!(sql, "DROP TABLE IF EXISTS `{table}`;");
        }
        let _ = writeln!(sql, "CREATE TABLE IF NOT EXISTS `{table}` (");
        let body = self
            .columns
            .iter()
            .map(|column| format!("  `{}` {}", column.name, column.definition))
            .join(",\n");
        let _ = writeln!(sql, "{body}");
        sql.push_str(");\n");
        sql
    }

    /// `ALTER TABLE` adding keys for `*_id` columns, or `None` when there are none.
    pub fn index_sql(&self) -> Option<String> {
        let own_key = format!("{}_id", self.table);
        let clauses = self
            .columns
            .iter()
            .filter(|column| column.is_foreign_key_like)
            .map(|column| {
                let name = &column.name;
                if *name == own_key {
                    format!("\tADD PRIMARY KEY (`{name}`)")
                } else {
                    format!("\tADD KEY `{name}` (`{name}`)")
                }
            })
            .collect::<Vec<_>>();
        if clauses.is_empty() {
            return None;
        }
        Some(format!(
            "ALTER TABLE `{}`\n{};\n",
            self.table,
            clauses.join(",\n")
        ))
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }
}
