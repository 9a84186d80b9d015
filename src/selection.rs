//! Which journals, pages and headings go into a build.
//!
//! A selection is a set of `(journal, page, heading)` entries. An entry
//! without a heading selects the whole page, preface included. Heading entries
//! select just that heading and never the preface.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::extract::Journal;

/// Separator between the parts of a textual selection entry.
pub const SEPARATOR: &str = "::";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SelectionEntry {
    pub journal: String,
    /// Page key: the title, or `title#n` for a repeated title.
    pub page: String,
    /// Heading key, `None` for the whole page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
}

impl SelectionEntry {
    pub fn whole_page(journal: impl Into<String>, page: impl Into<String>) -> Self {
        Self {
            journal: journal.into(),
            page: page.into(),
            heading: None,
        }
    }

    pub fn heading(
        journal: impl Into<String>,
        page: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            journal: journal.into(),
            page: page.into(),
            heading: Some(key.into()),
        }
    }
}

/// Parses `journal::page` or `journal::page::heading-key`.
impl FromStr for SelectionEntry {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.splitn(3, SEPARATOR);
        let journal = parts.next().map(str::trim).unwrap_or("");
        let page = parts.next().map(str::trim).unwrap_or("");
        let heading = parts.next().map(str::trim);

        if journal.is_empty() || page.is_empty() || heading.is_some_and(str::is_empty) {
            return Err(Error::InvalidSelection(format!(
                "{s:?}: expected JOURNAL{SEPARATOR}PAGE[{SEPARATOR}HEADING-KEY]"
            )));
        }

        Ok(Self {
            journal: journal.to_string(),
            page: page.to_string(),
            heading: heading.map(str::to_string),
        })
    }
}

impl fmt::Display for SelectionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEPARATOR}{}", self.journal, self.page)?;
        if let Some(key) = &self.heading {
            write!(f, "{SEPARATOR}{key}")?;
        }
        Ok(())
    }
}

/// Entry as written in a selection file: a string or an object.
#[derive(Deserialize)]
#[serde(untagged)]
enum FileEntry {
    Text(String),
    Entry(SelectionEntry),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Selection {
    entries: BTreeSet<SelectionEntry>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every page of every journal.
    pub fn all(journals: &[Journal]) -> Self {
        journals
            .iter()
            .flat_map(|j| {
                j.pages
                    .iter()
                    .map(|p| SelectionEntry::whole_page(&j.title, &p.key))
            })
            .collect()
    }

    /// Read a JSON array of `"J::P[::KEY]"` strings or `{journal, page, heading}` objects.
    pub fn from_json(text: &str) -> Result<Self> {
        let raw: Vec<FileEntry> = serde_json::from_str(text)
            .map_err(|e| Error::InvalidSelection(format!("selection file: {e}")))?;
        raw.into_iter()
            .map(|entry| match entry {
                FileEntry::Text(s) => s.parse(),
                FileEntry::Entry(e) => Ok(e),
            })
            .collect()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn insert(&mut self, entry: SelectionEntry) -> bool {
        self.entries.insert(entry)
    }

    pub fn remove(&mut self, entry: &SelectionEntry) -> bool {
        self.entries.remove(entry)
    }

    pub fn contains(&self, entry: &SelectionEntry) -> bool {
        self.entries.contains(entry)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SelectionEntry> {
        self.entries.iter()
    }

    /// True if any entry names this journal.
    pub fn names_journal(&self, journal: &str) -> bool {
        self.entries.iter().any(|e| e.journal == journal)
    }

    /// True if the whole page with this key is selected.
    pub fn includes_page(&self, journal: &str, page: &str) -> bool {
        self.entries
            .contains(&SelectionEntry::whole_page(journal, page))
    }

    /// True if this heading is selected on its own.
    pub fn includes_heading(&self, journal: &str, page: &str, key: &str) -> bool {
        self.entries
            .contains(&SelectionEntry::heading(journal, page, key))
    }

    /// Entries that match nothing in `journals`.
    pub fn unmatched<'a>(&'a self, journals: &[Journal]) -> Vec<&'a SelectionEntry> {
        self.entries
            .iter()
            .filter(|entry| {
                let page = journals
                    .iter()
                    .filter(|j| j.title == entry.journal)
                    .find_map(|j| j.page(&entry.page));
                match (page, &entry.heading) {
                    (None, _) => true,
                    (Some(_), None) => false,
                    (Some(page), Some(key)) => page.heading(key).is_none(),
                }
            })
            .collect()
    }
}

impl FromIterator<SelectionEntry> for Selection {
    fn from_iter<I: IntoIterator<Item = SelectionEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl Extend<SelectionEntry> for Selection {
    fn extend<I: IntoIterator<Item = SelectionEntry>>(&mut self, iter: I) {
        self.entries.extend(iter);
    }
}
