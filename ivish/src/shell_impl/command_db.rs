// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Read-only per-command property table.
//!
//! The host ships a JSON file (top-level dictionary of command name → dictionary of
//! string properties) whose path arrives via the `IVISH_CMD_DB` environment variable.
//! A missing or malformed file is not an error: the shell simply runs with no entries
//! and every lookup falls back to its default.

use serde::Deserialize;
use std::{collections::HashMap, path::Path};

/// Property names with first-class meaning to the shell. The table is extensible:
/// unknown keys are kept verbatim and reachable through [`CommandDb::property_raw`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    /// How `^C` is delivered to the running command.
    IntAction,
    /// Whether the shell cooks input lines for the command or forwards raw bytes.
    TermMode,
}

impl PropertyKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyKind::IntAction => "intaction",
            PropertyKind::TermMode => "termmode",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CommandDb {
    #[serde(flatten)]
    entries: HashMap<String, HashMap<String, String>>,
}

impl CommandDb {
    /// Load from the given path. Any failure (unset path, unreadable file, bad JSON)
    /// yields an empty table.
    #[must_use]
    pub fn load(maybe_path: Option<&Path>) -> Self {
        let Some(path) = maybe_path else {
            return Self::default();
        };
        match std::fs::read_to_string(path) {
            Ok(text) => match Self::from_json(&text) {
                Ok(db) => db,
                Err(error) => {
                    // % is Display, ? is Debug.
                    tracing::warn!(
                        message = "command db file is not valid JSON, ignoring",
                        path = %path.display(),
                        error = %error
                    );
                    Self::default()
                }
            },
            Err(error) => {
                tracing::warn!(
                    message = "command db file could not be read, ignoring",
                    path = %path.display(),
                    error = %error
                );
                Self::default()
            }
        }
    }

    /// # Errors
    ///
    /// Returns the `serde_json` error when the text is not a top-level dictionary of
    /// command → property dictionaries.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    #[must_use]
    pub fn property(&self, kind: PropertyKind, command: &str) -> Option<&str> {
        self.property_raw(kind.as_str(), command)
    }

    /// Lookup by raw property name, for keys the shell itself does not interpret.
    #[must_use]
    pub fn property_raw(&self, property: &str, command: &str) -> Option<&str> {
        self.entries
            .get(command)
            .and_then(|props| props.get(property))
            .map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "less": { "intaction": "end_of_file", "termmode": "raw" },
        "cat":  { "intaction": "thread_cancel" }
    }"#;

    #[test]
    fn properties_resolve_by_kind() {
        let db = CommandDb::from_json(SAMPLE).unwrap();
        assert_eq!(db.property(PropertyKind::IntAction, "less"), Some("end_of_file"));
        assert_eq!(db.property(PropertyKind::TermMode, "less"), Some("raw"));
        assert_eq!(db.property(PropertyKind::TermMode, "cat"), None);
        assert_eq!(db.property(PropertyKind::IntAction, "vim"), None);
    }

    #[test]
    fn unknown_properties_stay_reachable() {
        let db = CommandDb::from_json(r#"{ "x": { "color": "blue" } }"#).unwrap();
        assert_eq!(db.property_raw("color", "x"), Some("blue"));
    }

    #[test]
    fn load_tolerates_missing_and_malformed_files() {
        assert!(CommandDb::load(None).is_empty());
        assert!(CommandDb::load(Some(Path::new("/nonexistent/ivish.db"))).is_empty());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not json").unwrap();
        assert!(CommandDb::load(Some(file.path())).is_empty());

        let mut good = tempfile::NamedTempFile::new().unwrap();
        good.write_all(SAMPLE.as_bytes()).unwrap();
        let db = CommandDb::load(Some(good.path()));
        assert_eq!(db.property(PropertyKind::TermMode, "less"), Some("raw"));
    }
}
