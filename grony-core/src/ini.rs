//! Minimal INI codec
//!
//! Reads and writes the dialect used by the registry and `.grony` files:
//! `[section]` headers, `key = value` or `key: value` entries, `#`/`;`
//! comment lines and indented continuation lines. Keys are lowercased.
//! Section and entry order is preserved on rewrite.

use crate::error::ConfigError;

/// One `[name]` block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    name: String,
    entries: Vec<(String, String)>,
}

impl Section {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        let key = key.to_ascii_lowercase();
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Sets `key`, replacing an existing value in place
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let key = key.to_ascii_lowercase();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// An ordered collection of sections
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniDocument {
    sections: Vec<Section>,
}

impl IniDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut doc = Self::new();
        let mut current: Option<usize> = None;
        let mut last_key: Option<String> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let trimmed = raw.trim();

            if trimmed.is_empty() {
                continue;
            }

            // Indented line directly after an entry continues its value, even
            // when it starts with a comment marker
            if raw.starts_with([' ', '\t']) {
                if let (Some(section), Some(key)) = (current, last_key.as_ref()) {
                    if let Some(entry) = doc.sections[section]
                        .entries
                        .iter_mut()
                        .find(|(k, _)| k == key)
                    {
                        entry.1.push('\n');
                        entry.1.push_str(trimmed);
                        continue;
                    }
                }
            }

            if trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            if let Some(header) = trimmed.strip_prefix('[') {
                let name = header.strip_suffix(']').ok_or_else(|| ConfigError::Syntax {
                    line: line_no,
                    reason: "unterminated section header".to_string(),
                })?;
                let name = name.trim();
                let pos = match doc.position(name) {
                    Some(pos) => pos,
                    None => {
                        doc.sections.push(Section::new(name));
                        doc.sections.len() - 1
                    }
                };
                current = Some(pos);
                last_key = None;
                continue;
            }

            let Some(section) = current else {
                return Err(ConfigError::Syntax {
                    line: line_no,
                    reason: "entry outside of any section".to_string(),
                });
            };

            let split_at = trimmed.find(['=', ':']).ok_or_else(|| ConfigError::Syntax {
                line: line_no,
                reason: format!("expected 'key = value', found '{}'", trimmed),
            })?;
            let key = trimmed[..split_at].trim();
            if key.is_empty() {
                return Err(ConfigError::Syntax {
                    line: line_no,
                    reason: "empty key".to_string(),
                });
            }
            let value = trimmed[split_at + 1..].trim();

            doc.sections[section].set(key, value);
            last_key = Some(key.to_ascii_lowercase());
        }

        Ok(doc)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (idx, section) in self.sections.iter().enumerate() {
            if idx > 0 {
                out.push('\n');
            }
            out.push('[');
            out.push_str(&section.name);
            out.push_str("]\n");
            for (key, value) in &section.entries {
                out.push_str(key);
                out.push_str(" = ");
                out.push_str(&value.replace('\n', "\n\t"));
                out.push('\n');
            }
        }
        out
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.sections.iter().position(|s| s.name == name)
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn section_mut(&mut self, name: &str) -> Option<&mut Section> {
        self.sections.iter_mut().find(|s| s.name == name)
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Returns the named section, creating an empty one if needed
    pub fn ensure_section(&mut self, name: &str) -> &mut Section {
        let pos = match self.position(name) {
            Some(pos) => pos,
            None => {
                self.sections.push(Section::new(name));
                self.sections.len() - 1
            }
        };
        &mut self.sections[pos]
    }

    pub fn remove_section(&mut self, name: &str) -> bool {
        match self.position(name) {
            Some(pos) => {
                self.sections.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }
}
