//! Shard storage: a sorted run of [`SymbolEntry`] values.
//!
//! On disk a shard is JSON lines, one entry per line, already in
//! `(key, scope, label)` order. [`ShardReader`] decodes it one line at a time
//! so callers never need more than the shard they asked for.

use std::io::{BufRead, Write};

use crate::error::{Result, SymshardError};
use crate::types::SymbolEntry;

/// Immutable, sorted sequence of entries sharing one partition key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Shard {
    entries: Vec<SymbolEntry>,
}

impl Shard {
    /// Build a shard from arbitrary entries, sorting them.
    pub fn from_entries(mut entries: Vec<SymbolEntry>) -> Self {
        entries.sort();
        Self { entries }
    }

    /// Build a shard from entries the caller guarantees are sorted.
    ///
    /// Returns a parse error naming the first out-of-order key otherwise.
    pub fn from_sorted(entries: Vec<SymbolEntry>) -> Result<Self> {
        if let Some(pos) = entries.windows(2).position(|w| w[0] > w[1]) {
            return Err(SymshardError::Parse(format!(
                "shard entries out of order at line {}: `{}` after `{}`",
                pos + 2,
                entries[pos + 1].key,
                entries[pos].key
            )));
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[SymbolEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SymbolEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries whose key starts with `prefix`, found by binary search.
    ///
    /// `prefix` must already be folded.
    pub fn prefix_range(&self, prefix: &str) -> &[SymbolEntry] {
        let start = self
            .entries
            .partition_point(|e| e.key.as_str() < prefix);
        let len = self.entries[start..]
            .partition_point(|e| e.key.starts_with(prefix));
        &self.entries[start..start + len]
    }

    /// Serialize as JSON lines.
    pub fn write_jsonl<W: Write>(&self, mut out: W) -> Result<()> {
        for entry in &self.entries {
            serde_json::to_writer(&mut out, entry)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
        Ok(())
    }

    /// JSON-lines body as bytes.
    pub fn to_jsonl_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.entries.len() * 128);
        self.write_jsonl(&mut buf)?;
        Ok(buf)
    }

    /// Decode a whole shard and verify its ordering.
    pub fn read_from<R: BufRead>(reader: R) -> Result<Self> {
        let entries = ShardReader::new(reader).collect::<Result<Vec<_>>>()?;
        Self::from_sorted(entries)
    }
}

impl<'a> IntoIterator for &'a Shard {
    type Item = &'a SymbolEntry;
    type IntoIter = std::slice::Iter<'a, SymbolEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Incremental JSON-lines decoder. Blank lines are skipped.
pub struct ShardReader<R> {
    lines: std::io::Lines<R>,
    line_no: usize,
}

impl<R: BufRead> ShardReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }
}

impl<R: BufRead> Iterator for ShardReader<R> {
    type Item = Result<SymbolEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            let line_no = self.line_no;
            return Some(serde_json::from_str(&line).map_err(|e| {
                SymshardError::Parse(format!("shard line {line_no}: {e}"))
            }));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Category, Location};

    fn entry(key: &str, category: Category) -> SymbolEntry {
        SymbolEntry {
            key: key.to_string(),
            scope: Some("Sayuri".into()),
            label: key.to_uppercase(),
            category,
            location: Location::parse(&format!("namespaceSayuri.html#a{key}")).unwrap(),
            name: key.to_uppercase(),
        }
    }

    fn sample() -> Shard {
        Shard::from_entries(vec![
            entry("castling", Category::Typedef),
            entry("c1", Category::Variable),
            entry("calculate", Category::Function),
            entry("capture", Category::EnumValue),
            entry("cancastling", Category::Function),
            entry("count", Category::Function),
        ])
    }

    #[test]
    fn from_entries_sorts() {
        let shard = sample();
        let keys: Vec<_> = shard.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["c1", "calculate", "cancastling", "capture", "castling", "count"]
        );
    }

    #[test]
    fn prefix_range_finds_contiguous_run() {
        let shard = sample();
        let keys: Vec<_> = shard
            .prefix_range("ca")
            .iter()
            .map(|e| e.key.as_str())
            .collect();
        assert_eq!(keys, vec!["calculate", "cancastling", "capture", "castling"]);
        assert_eq!(shard.prefix_range("cap").len(), 1);
        assert!(shard.prefix_range("z").is_empty());
        assert!(shard.prefix_range("castlingx").is_empty());
        assert_eq!(shard.prefix_range("").len(), shard.len());
    }

    #[test]
    fn jsonl_roundtrip_preserves_order() {
        let shard = sample();
        let bytes = shard.to_jsonl_bytes().unwrap();
        assert_eq!(bytes.iter().filter(|b| **b == b'\n').count(), shard.len());
        let back = Shard::read_from(&bytes[..]).unwrap();
        assert_eq!(back, shard);
    }

    #[test]
    fn reader_is_incremental_and_skips_blank_lines() {
        let shard = sample();
        let mut bytes = b"\n".to_vec();
        bytes.extend(shard.to_jsonl_bytes().unwrap());
        let mut reader = ShardReader::new(&bytes[..]);
        let first = reader.next().unwrap().unwrap();
        assert_eq!(first.key, "c1");
        assert_eq!(reader.count(), shard.len() - 1);
    }

    #[test]
    fn read_rejects_unsorted_body() {
        let a = serde_json::to_string(&entry("b", Category::Function)).unwrap();
        let b = serde_json::to_string(&entry("a", Category::Function)).unwrap();
        let body = format!("{a}\n{b}\n");
        let err = Shard::read_from(body.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("out of order"));
    }

    #[test]
    fn read_reports_bad_line_number() {
        let good = serde_json::to_string(&entry("a", Category::Function)).unwrap();
        let body = format!("{good}\n{{not json\n");
        let err = Shard::read_from(body.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");
    }
}
