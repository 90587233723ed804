use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

/// How long a code block's copy button shows "Copied".
pub const COPIED_FEEDBACK: Duration = Duration::from_secs(2);

/// Tracks which copy buttons are currently showing their confirmation.
///
/// Each copy bumps a generation; an expiry only clears the mark if no later
/// copy of the same key happened in between.
#[derive(Debug)]
pub struct CopyFeedback<K> {
    marks: HashMap<K, u64>,
    generation: u64,
}

impl<K> Default for CopyFeedback<K> {
    fn default() -> Self {
        Self {
            marks: HashMap::new(),
            generation: 0,
        }
    }
}

impl<K: Eq + Hash> CopyFeedback<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `key` as copied and returns the token to pass to [`Self::expire`].
    pub fn mark_copied(&mut self, key: K) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.marks.insert(key, self.generation);
        self.generation
    }

    /// Returns true when the mark was cleared.
    pub fn expire(&mut self, key: &K, generation: u64) -> bool {
        if self.marks.get(key) == Some(&generation) {
            self.marks.remove(key);
            true
        } else {
            false
        }
    }

    pub fn is_copied(&self, key: &K) -> bool {
        self.marks.contains_key(key)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&K) -> bool) {
        self.marks.retain(|key, _| keep(key));
    }
}
