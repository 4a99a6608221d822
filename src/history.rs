// history.rs

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// One executed command line. Indices start at 1 and are never reused
/// while the store lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryEntry {
    pub index: usize,
    pub text: String,
}

/// Append-only ledger of the lines executed in this session.
#[derive(Debug, Default)]
pub struct History {
    entries: Vec<HistoryEntry>,
    // Positions of lines appended this session that no file has seen yet.
    // Lines read by `load_from` never enter this list.
    unsaved: Vec<usize>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, text: impl Into<String>) -> usize {
        let index = self.push_entry(text.into());
        self.unsaved.push(index - 1);
        index
    }

    fn push_entry(&mut self, text: String) -> usize {
        let index = self.entries.len() + 1;
        debug!(index, %text, "history append");
        self.entries.push(HistoryEntry { index, text });
        index
    }

    pub fn entry_at(&self, index: usize) -> Option<&HistoryEntry> {
        index.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    /// `offset == 1` is the newest entry.
    pub fn entry_from_end(&self, offset: usize) -> Option<&HistoryEntry> {
        if offset == 0 || offset > self.entries.len() {
            return None;
        }
        self.entries.get(self.entries.len() - offset)
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entry_from_end(1)
    }

    /// Newest entry whose text starts with `prefix`.
    pub fn find_by_prefix(&self, prefix: &str) -> Option<&HistoryEntry> {
        self.entries.iter().rev().find(|e| e.text.starts_with(prefix))
    }

    /// Newest entry whose text contains `needle` anywhere.
    pub fn find_containing(&self, needle: &str) -> Option<&HistoryEntry> {
        self.entries.iter().rev().find(|e| e.text.contains(needle))
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        debug!(dropped = self.entries.len(), "history cleared");
        self.entries.clear();
        self.unsaved.clear();
    }

    pub fn list_entries(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        self.entries.iter().map(|e| (e.index, e.text.as_str()))
    }

    /// The newest `n` entries, oldest first.
    pub fn tail(&self, n: usize) -> impl Iterator<Item = (usize, &str)> + '_ {
        self.list_entries().skip(self.entries.len().saturating_sub(n))
    }

    /// Appends every non-blank line of `path`. Returns how many were read.
    /// Read lines are numbered like any other entry but are not written
    /// again by `append_new_to`.
    pub fn load_from(&mut self, path: &Path) -> Result<usize> {
        let file = File::open(path)
            .with_context(|| format!("cannot open history file {}", path.display()))?;
        let mut count = 0;
        for line in BufReader::new(file).lines() {
            let line = line.with_context(|| format!("cannot read {}", path.display()))?;
            if !line.trim().is_empty() {
                self.push_entry(line);
                count += 1;
            }
        }
        debug!(count, path = %path.display(), "history loaded");
        Ok(count)
    }

    /// Overwrites `path` with the store, keeping only the newest `limit`
    /// entries when a limit is given.
    pub fn save_to(&mut self, path: &Path, limit: Option<usize>) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("cannot write history file {}", path.display()))?;
        let mut out = BufWriter::new(file);
        let keep = limit.unwrap_or(self.entries.len());
        for (_, text) in self.tail(keep) {
            writeln!(out, "{}", text)?;
        }
        out.flush()?;
        self.unsaved.clear();
        Ok(())
    }

    /// Appends to `path` the session lines not yet written to any file.
    pub fn append_new_to(&mut self, path: &Path) -> Result<usize> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("cannot append to {}", path.display()))?;
        for &pos in &self.unsaved {
            writeln!(file, "{}", self.entries[pos].text)?;
        }
        let written = self.unsaved.len();
        self.unsaved.clear();
        Ok(written)
    }
}
