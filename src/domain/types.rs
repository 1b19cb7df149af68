use std::collections::BTreeMap;
use std::path::PathBuf;
use time::{Date, PrimitiveDateTime};

/// Half-open `[start, end)` range of naive local date-times.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TimeWindow {
    pub start: PrimitiveDateTime,
    pub end: PrimitiveDateTime,
}

impl TimeWindow {
    pub fn contains(&self, timestamp: PrimitiveDateTime) -> bool {
        self.start <= timestamp && timestamp < self.end
    }
}

/// Calendar-day range; a missing bound is open on that side.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DateRange {
    pub start: Option<Date>,
    pub end: Option<Date>,
}

impl DateRange {
    pub fn contains(&self, date: Date) -> bool {
        self.start.is_none_or(|start| start <= date) && self.end.is_none_or(|end| date <= end)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileMetadata {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: PrimitiveDateTime,
    pub created: PrimitiveDateTime,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParsedLogLine {
    pub timestamp: PrimitiveDateTime,
    pub raw_text: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ContentMatch {
    pub line_number: u64,
    pub line: String,
    pub before: Vec<String>,
    pub after: Vec<String>,
}

/// Per-file entries keyed by path; iteration order is the file processing order.
pub type SearchResults<T> = BTreeMap<PathBuf, Vec<T>>;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileWarning {
    pub path: PathBuf,
    pub message: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EvictionPlan {
    pub files: Vec<FileMetadata>,
    pub total_bytes: u64,
    pub budget_bytes: u64,
}

impl EvictionPlan {
    pub fn reclaimed_bytes(&self) -> u64 {
        self.files.iter().map(|file| file.size_bytes).sum()
    }

    pub fn remaining_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.reclaimed_bytes())
    }
}
