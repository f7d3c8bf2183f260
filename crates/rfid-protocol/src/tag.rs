//! Tag observations and the per-window set of unique identifiers

use std::collections::hash_set;
use std::collections::HashSet;
use std::time::SystemTime;

/// A single tag observation reported by an interrogator
#[derive(Debug, Clone, PartialEq)]
pub struct TagRecord {
    /// EPC identifier as a hex string
    pub epc: String,
    /// Antenna port that saw the tag
    pub antenna: Option<u8>,
    /// Received signal strength in dBm
    pub rssi: Option<i32>,
    /// Backscatter phase in degrees
    pub phase: Option<u16>,
    /// Time of the observation
    pub timestamp: Option<SystemTime>,
    /// Carrier frequency in kHz
    pub frequency_khz: Option<u32>,
}

impl TagRecord {
    /// Create a record carrying only an identifier
    pub fn new(epc: impl Into<String>) -> Self {
        Self {
            epc: epc.into(),
            antenna: None,
            rssi: None,
            phase: None,
            timestamp: None,
            frequency_khz: None,
        }
    }

    /// Attach the antenna that saw the tag
    pub fn with_antenna(mut self, antenna: u8) -> Self {
        self.antenna = Some(antenna);
        self
    }

    /// Attach the signal strength
    pub fn with_rssi(mut self, rssi: i32) -> Self {
        self.rssi = Some(rssi);
        self
    }

    /// Stamp the record with the current time
    pub fn stamped(mut self) -> Self {
        self.timestamp = Some(SystemTime::now());
        self
    }
}

/// Unique tag identifiers seen during one read window
///
/// Iteration order is unspecified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet {
    ids: HashSet<String>,
}

impl TagSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an identifier, returning false if it was already present
    pub fn insert(&mut self, epc: impl Into<String>) -> bool {
        self.ids.insert(epc.into())
    }

    /// Insert the identifier of a record
    pub fn observe(&mut self, record: TagRecord) -> bool {
        self.ids.insert(record.epc)
    }

    /// Check membership
    pub fn contains(&self, epc: &str) -> bool {
        self.ids.contains(epc)
    }

    /// Number of unique identifiers
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether no tags were seen
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Remove every identifier
    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Iterate over the identifiers
    pub fn iter(&self) -> hash_set::Iter<'_, String> {
        self.ids.iter()
    }

    /// Identifiers in lexical order, for display and logs
    pub fn sorted(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.ids.iter().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl FromIterator<TagRecord> for TagSet {
    fn from_iter<I: IntoIterator<Item = TagRecord>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl Extend<TagRecord> for TagSet {
    fn extend<I: IntoIterator<Item = TagRecord>>(&mut self, iter: I) {
        for record in iter {
            self.observe(record);
        }
    }
}

impl<'a> FromIterator<&'a str> for TagSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().map(str::to_string).collect(),
        }
    }
}

impl IntoIterator for TagSet {
    type Item = String;
    type IntoIter = hash_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.into_iter()
    }
}

impl<'a> IntoIterator for &'a TagSet {
    type Item = &'a String;
    type IntoIter = hash_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_duplicates_collapse() {
        let set: TagSet = ["E1", "E1", "E2"]
            .into_iter()
            .map(TagRecord::new)
            .collect();

        assert_eq!(set.len(), 2);
        assert!(set.contains("E1"));
        assert!(set.contains("E2"));
        assert_eq!(set.sorted(), vec!["E1", "E2"]);
    }

    #[test]
    fn test_insert_reports_novelty() {
        let mut set = TagSet::new();
        assert!(set.insert("A1"));
        assert!(!set.insert("A1"));
        set.clear();
        assert!(set.is_empty());
    }

    #[test]
    fn test_record_builders() {
        let record = TagRecord::new("E200").with_antenna(2).with_rssi(-61).stamped();
        assert_eq!(record.antenna, Some(2));
        assert_eq!(record.rssi, Some(-61));
        assert!(record.timestamp.is_some());
    }

    proptest! {
        #[test]
        fn each_identifier_counted_once(
            ids in prop::collection::vec("[0-9A-F]{4}", 0..64)
        ) {
            let set: TagSet = ids.iter().cloned().map(TagRecord::new).collect();
            let distinct: HashSet<&String> = ids.iter().collect();

            prop_assert_eq!(set.len(), distinct.len());
            for id in &ids {
                prop_assert!(set.contains(id));
            }
        }
    }
}
