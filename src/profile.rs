//! Column profiling: the first pass over a file's data rows.
//!
//! Each retained header column gets a [`ColumnProfile`] holding the set of
//! candidate types still consistent with every non-empty value seen so far,
//! plus the length and integer statistics the schema resolver needs to pick
//! a concrete column width. Candidate sets only ever shrink.

use std::sync::LazyLock;

use log::debug;
use regex::Regex;

/// Header values that never become columns unless overridden.
pub const DEFAULT_SKIP_HEADERS: &[&str] = &["", "^"];

static IDENTIFIER_NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9]+").expect("valid identifier pattern"));

static TYPE_PATTERNS: LazyLock<[Regex; 5]> = LazyLock::new(|| {
    [
        r"^[0-9]+$",
        r"^-?[0-9]+$",
        r"^[0-9]+\.?[0-9]*$",
        r"^[0-9]{4}-[0-9]{2}-[0-9]{2}[T ][0-9]{2}:[0-9]{2}:[0-9]{2}(\.[0-9]*)?$",
        r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$",
    ]
    .map(|pattern| Regex::new(pattern).expect("valid type pattern"))
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeTag {
    UnsignedInt,
    SignedInt,
    Float,
    DateTime,
    Date,
}

impl TypeTag {
    /// Resolution order: the first surviving tag wins.
    pub const PRECEDENCE: [TypeTag; 5] = [
        TypeTag::UnsignedInt,
        TypeTag::SignedInt,
        TypeTag::Float,
        TypeTag::DateTime,
        TypeTag::Date,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TypeTag::UnsignedInt => "unsigned_int",
            TypeTag::SignedInt => "signed_int",
            TypeTag::Float => "float",
            TypeTag::DateTime => "datetime",
            TypeTag::Date => "date",
        }
    }

    /// Whether the value is rendered unquoted (or as `NULL` when empty) on insert.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            TypeTag::UnsignedInt | TypeTag::SignedInt | TypeTag::Float
        )
    }

    pub fn is_integer(self) -> bool {
        matches!(self, TypeTag::UnsignedInt | TypeTag::SignedInt)
    }

    pub fn matches(self, value: &str) -> bool {
        TYPE_PATTERNS[self as usize].is_match(value)
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// Ordered set of candidate tags, stored as a bitset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeSet(u8);

impl TypeSet {
    pub const ALL: TypeSet = TypeSet(0b1_1111);
    pub const EMPTY: TypeSet = TypeSet(0);

    pub fn contains(self, tag: TypeTag) -> bool {
        self.0 & tag.bit() != 0
    }

    pub fn remove(&mut self, tag: TypeTag) {
        self.0 &= !tag.bit();
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn is_subset(self, other: TypeSet) -> bool {
        self.0 & !other.0 == 0
    }

    /// First surviving tag in precedence order; `None` means text.
    pub fn first(self) -> Option<TypeTag> {
        self.iter().next()
    }

    pub fn iter(self) -> impl Iterator<Item = TypeTag> {
        TypeTag::PRECEDENCE
            .into_iter()
            .filter(move |tag| self.contains(*tag))
    }

    pub fn has_integer(self) -> bool {
        self.contains(TypeTag::UnsignedInt) || self.contains(TypeTag::SignedInt)
    }
}

impl Default for TypeSet {
    fn default() -> Self {
        TypeSet::ALL
    }
}

/// Collapses every run of non-alphanumeric characters into `_`.
pub fn sanitize_column_name(raw: &str) -> String {
    IDENTIFIER_NOISE.replace_all(raw, "_").trim().to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnProfile {
    /// Position of the column's field in each record.
    pub field_index: usize,
    pub name: String,
    pub candidates: TypeSet,
    pub max_byte_length: usize,
    pub max_char_length: usize,
    pub max_integer: i128,
    pub min_integer: i128,
    pub is_empty: bool,
}

impl ColumnProfile {
    pub fn new(field_index: usize, name: impl Into<String>) -> Self {
        Self {
            field_index,
            name: name.into(),
            candidates: TypeSet::ALL,
            max_byte_length: 0,
            max_char_length: 0,
            max_integer: 0,
            min_integer: 0,
            is_empty: true,
        }
    }

    /// Folds one raw field into the profile. Empty values leave the profile unchanged.
    pub fn observe(&mut self, value: &str) {
        if value.is_empty() {
            return;
        }
        self.is_empty = false;

        for tag in self.candidates.iter() {
            if !tag.matches(value) {
                self.candidates.remove(tag);
            }
        }

        if self.candidates.has_integer() {
            let parsed = parse_integer_saturating(value);
            self.max_integer = self.max_integer.max(parsed);
            self.min_integer = self.min_integer.min(parsed);
        }

        self.max_byte_length = self.max_byte_length.max(value.len());
        self.max_char_length = self.max_char_length.max(value.chars().count());
    }
}

// Only called on values that matched an integer pattern, so overflow is the only failure.
fn parse_integer_saturating(value: &str) -> i128 {
    value.parse::<i128>().unwrap_or(if value.starts_with('-') {
        i128::MIN
    } else {
        i128::MAX
    })
}

#[derive(Debug, Clone)]
pub struct HeaderOptions {
    pub skip: Vec<String>,
    pub skip_duplicates: bool,
}

impl Default for HeaderOptions {
    fn default() -> Self {
        Self {
            skip: DEFAULT_SKIP_HEADERS.iter().map(|s| s.to_string()).collect(),
            skip_duplicates: true,
        }
    }
}

/// Field-count filter shared by both passes so they agree on which rows exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowShape {
    pub field_count: usize,
}

impl RowShape {
    pub fn accepts(&self, row: &[String]) -> bool {
        row.len() == self.field_count
    }
}

#[derive(Debug, Clone)]
pub struct ColumnProfiler {
    shape: RowShape,
    profiles: Vec<ColumnProfile>,
    rows_profiled: usize,
    rows_skipped: usize,
}

impl ColumnProfiler {
    pub fn new(headers: &[String], options: &HeaderOptions) -> Self {
        let mut profiles: Vec<ColumnProfile> = Vec::with_capacity(headers.len());
        for (index, header) in headers.iter().enumerate() {
            if options.skip.iter().any(|skip| skip == header) {
                debug!("Skipping header '{header}' at field {index}");
                continue;
            }
            let name = sanitize_column_name(header);
            if options.skip_duplicates && profiles.iter().any(|p| p.name == name) {
                debug!("Skipping duplicate header '{header}' at field {index}");
                continue;
            }
            profiles.push(ColumnProfile::new(index, name));
        }
        Self {
            shape: RowShape {
                field_count: headers.len(),
            },
            profiles,
            rows_profiled: 0,
            rows_skipped: 0,
        }
    }

    pub fn shape(&self) -> RowShape {
        self.shape
    }

    pub fn profiles(&self) -> &[ColumnProfile] {
        &self.profiles
    }

    pub fn rows_profiled(&self) -> usize {
        self.rows_profiled
    }

    pub fn rows_skipped(&self) -> usize {
        self.rows_skipped
    }

    /// Profiles one data row. Returns false when the row was skipped for its shape.
    pub fn observe(&mut self, row: &[String]) -> bool {
        if !self.shape.accepts(row) {
            self.rows_skipped += 1;
            return false;
        }
        for profile in &mut self.profiles {
            profile.observe(&row[profile.field_index]);
        }
        self.rows_profiled += 1;
        true
    }

    pub fn into_profiles(self) -> Vec<ColumnProfile> {
        self.profiles
    }
}
