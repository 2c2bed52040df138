//! Clip identity registry
//!
//! Interns source clip file names into small integer ids while the database
//! file is parsed. The first occurrence of a name fixes its id.

use std::collections::HashMap;

use crate::types::ClipId;

/// Deduplicated `file name -> ClipId` mapping
#[derive(Debug, Clone, Default)]
pub struct ClipRegistry {
    names: Vec<String>,
    lookup: HashMap<String, ClipId>,
}

impl ClipRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the id for `name`, registering it if unseen
    pub fn intern(&mut self, name: &str) -> ClipId {
        if let Some(&id) = self.lookup.get(name) {
            return id;
        }
        let id = self.names.len();
        self.names.push(name.to_string());
        self.lookup.insert(name.to_string(), id);
        id
    }

    /// Look up an existing id without registering
    pub fn id_of(&self, name: &str) -> Option<ClipId> {
        self.lookup.get(name).copied()
    }

    /// Name for an id
    pub fn name(&self, id: ClipId) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    /// Number of distinct clips
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no clips are registered
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterate `(id, name)` in registration order
    pub fn iter(&self) -> impl Iterator<Item = (ClipId, &str)> {
        self.names.iter().enumerate().map(|(i, n)| (i, n.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_occurrence_wins() {
        let mut registry = ClipRegistry::new();
        assert_eq!(registry.intern("b.wav"), 0);
        assert_eq!(registry.intern("a.wav"), 1);
        assert_eq!(registry.intern("b.wav"), 0);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.name(1), Some("a.wav"));
        assert_eq!(registry.id_of("a.wav"), Some(1));
        assert_eq!(registry.id_of("c.wav"), None);
    }

    #[test]
    fn test_iter_in_order() {
        let mut registry = ClipRegistry::new();
        registry.intern("x");
        registry.intern("y");
        let names: Vec<_> = registry.iter().map(|(_, n)| n).collect();
        assert_eq!(names, vec!["x", "y"]);
    }
}
