//! Diagnostic fields — an ordered key/value chain for log and error correlation.
//!
//! A chain is inherited from an owning context and augmented at each layer:
//! the agent adds `service`/`host`/`port`, a reporter adds `type`.  `with`
//! returns a new chain, so a parent is never mutated by its children.

use std::fmt;

/// Ordered, immutable set of diagnostic key/value pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields {
    entries: Vec<(String, String)>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a new chain with `key=value` appended.
    ///
    /// A later entry shadows an earlier one with the same key in [`Fields::get`].
    pub fn with(&self, key: impl Into<String>, value: impl ToString) -> Self {
        let mut entries = self.entries.clone();
        entries.push((key.into(), value.to_string()));
        Self { entries }
    }

    /// Most recent value recorded for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for Fields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{k}={v}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_does_not_mutate_parent() {
        let parent = Fields::new().with("service", "api");
        let child = parent.with("type", "file");
        assert_eq!(parent.to_string(), "service=api");
        assert_eq!(child.to_string(), "service=api type=file");
        assert_eq!(child.get("service"), Some("api"));
        assert_eq!(child.get("type"), Some("file"));
        assert_eq!(parent.get("type"), None);
    }

    #[test]
    fn display_keeps_insertion_order() {
        let f = Fields::new().with("service", "api").with("port", 8080);
        assert_eq!(f.to_string(), "service=api port=8080");
        assert_eq!(Fields::new().to_string(), "");
    }

    #[test]
    fn later_entry_shadows_earlier() {
        let f = Fields::new().with("type", "a").with("type", "b");
        assert_eq!(f.get("type"), Some("b"));
    }
}
