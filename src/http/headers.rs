//! Case-insensitive header container.
//!
//! Lookup folds ASCII case and treats `-` and `_` as the same character, so
//! `X-Test`, `X_test`, `x-TESt` and `X_tesT` all address one header.
//! Iteration yields the most recently written display form per header, in
//! first-insertion order. Writes overwrite; there are no multi-value
//! semantics.

#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    entries: Vec<HeaderEntry>,
}

#[derive(Debug, Clone)]
struct HeaderEntry {
    canonical: String,
    display: String,
    value: String,
}

/// Lowercase with `_` folded to `-`.
fn canonical(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '_' => '-',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a header, overwriting any spelling variant of the same name. The
    /// spelling used here becomes the new display form.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let canonical = canonical(name);
        let value = value.into();
        match self.entries.iter_mut().find(|e| e.canonical == canonical) {
            Some(entry) => {
                entry.display = name.to_string();
                entry.value = value;
            }
            None => self.entries.push(HeaderEntry {
                canonical,
                display: name.to_string(),
                value,
            }),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        let canonical = canonical(name);
        self.entries
            .iter()
            .find(|e| e.canonical == canonical)
            .map(|e| e.value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let canonical = canonical(name);
        let idx = self.entries.iter().position(|e| e.canonical == canonical)?;
        Some(self.entries.remove(idx).value)
    }

    /// Iterate `(display-name, value)` pairs in first-insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|e| (e.display.as_str(), e.value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
