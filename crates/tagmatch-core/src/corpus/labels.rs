//! Dense label-id assignment in first-seen order.

use crate::error::CorpusError;
use std::collections::HashMap;

/// Maximum distinct labels per corpus, fixed by the byte-sized label id.
pub const MAX_LABELS: usize = u8::MAX as usize + 1;

/// Maps tag strings to dense `u8` ids and tracks occurrence counts.
///
/// Ids are assigned in first-seen order and are stable for the lifetime
/// of the map. Label ids are corpus-local; two corpora never share a
/// label space.
#[derive(Debug, Default)]
pub struct LabelMap {
    ids: HashMap<String, u8>,
    names: Vec<String>,
    counts: Vec<u64>,
}

impl LabelMap {
    /// Creates an empty label map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id for `tag`, assigning the next dense id on first
    /// occurrence, and increments its occurrence count.
    pub fn intern(&mut self, tag: &str) -> Result<u8, CorpusError> {
        if let Some(&id) = self.ids.get(tag) {
            self.counts[id as usize] += 1;
            return Ok(id);
        }
        if self.names.len() >= MAX_LABELS {
            return Err(CorpusError::LabelOverflow(MAX_LABELS));
        }
        let id = self.names.len() as u8;
        self.ids.insert(tag.to_owned(), id);
        self.names.push(tag.to_owned());
        self.counts.push(1);
        Ok(id)
    }

    /// Number of distinct labels seen so far.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// True if no label has been interned.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// The tag string for a label id.
    pub fn name(&self, id: u8) -> &str {
        &self.names[id as usize]
    }

    /// Occurrence count for a label id.
    pub fn count(&self, id: u8) -> u64 {
        self.counts[id as usize]
    }

    /// Label names in id order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// `(name, count)` pairs in id order.
    pub fn distribution(&self) -> Vec<(String, u64)> {
        self.names
            .iter()
            .cloned()
            .zip(self.counts.iter().copied())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_seen_order() {
        let mut map = LabelMap::new();
        assert_eq!(map.intern("NOUN").unwrap(), 0);
        assert_eq!(map.intern("VERB").unwrap(), 1);
        assert_eq!(map.intern("NOUN").unwrap(), 0);
        assert_eq!(map.intern("ADJ").unwrap(), 2);
        assert_eq!(map.names(), &["NOUN", "VERB", "ADJ"]);
    }

    #[test]
    fn test_counts_accumulate() {
        let mut map = LabelMap::new();
        for _ in 0..3 {
            map.intern("NOUN").unwrap();
        }
        map.intern("VERB").unwrap();
        assert_eq!(map.count(0), 3);
        assert_eq!(map.count(1), 1);
    }

    #[test]
    fn test_ids_stable_across_growth() {
        let mut map = LabelMap::new();
        let noun = map.intern("NOUN").unwrap();
        for i in 0..100 {
            map.intern(&format!("TAG{i}")).unwrap();
        }
        assert_eq!(map.intern("NOUN").unwrap(), noun);
        assert_eq!(map.name(noun), "NOUN");
    }

    #[test]
    fn test_label_overflow() {
        let mut map = LabelMap::new();
        for i in 0..MAX_LABELS {
            map.intern(&format!("TAG{i}")).unwrap();
        }
        assert!(matches!(
            map.intern("ONE_TOO_MANY"),
            Err(CorpusError::LabelOverflow(_))
        ));
    }
}
