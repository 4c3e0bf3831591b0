//! Scripted entropy and canonical-form assertions for the UUID tests.

use std::sync::Mutex;

use crate::RandSource;

/// Replays a scripted list of 64-bit words; wraps around when exhausted.
pub(crate) struct ScriptedRandom {
    words: Mutex<(Vec<u64>, usize)>,
}

impl ScriptedRandom {
    pub(crate) fn with_words(words: Vec<u64>) -> Self {
        assert!(!words.is_empty());
        Self {
            words: Mutex::new((words, 0)),
        }
    }
}

impl RandSource for ScriptedRandom {
    fn next_u64(&self) -> u64 {
        let mut guard = self.words.lock().unwrap();
        let (words, index) = &mut *guard;
        let word = words[*index % words.len()];
        *index += 1;
        word
    }
}

/// Asserts the canonical lowercase `8-4-4-4-12` shape with the expected
/// version digit and an RFC variant digit (`8`, `9`, `a` or `b`).
pub(crate) fn assert_canonical_uuid(text: &str, version: char) {
    let groups: Vec<&str> = text.split('-').collect();
    assert_eq!(groups.len(), 5, "bad grouping: {text}");

    let lengths: Vec<usize> = groups.iter().map(|group| group.len()).collect();
    assert_eq!(lengths, [8, 4, 4, 4, 12], "bad group widths: {text}");

    for group in &groups {
        assert!(
            group.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()),
            "non-lowercase-hex character in {text}"
        );
    }

    assert_eq!(groups[2].chars().next(), Some(version), "version digit: {text}");
    assert!(
        matches!(groups[3].chars().next(), Some('8' | '9' | 'a' | 'b')),
        "variant digit: {text}"
    );
}
