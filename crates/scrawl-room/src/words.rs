//! Word sources and progressive hints.
//!
//! A word's hint is a single string of segments joined by
//! [`HINT_SEPARATOR`], ordered from vague to specific:
//!
//! ```text
//! 5 letters · fruit · red or green
//! ```
//!
//! Hint `i` is the first `i + 1` segments, so hint #0 is the letter count,
//! hint #1 adds the category and hint #2 shows everything.

use rand::seq::IndexedRandom;
use scrawl_protocol::{WordEntry, count_letters};

/// Separator between hint segments.
pub const HINT_SEPARATOR: &str = " · ";

/// Number of hint levels released per round (#0 at selection, #1 and #2
/// during drawing).
pub const HINT_LEVELS: u8 = 3;

/// Supplies candidate words and their hints to rooms.
///
/// Implementations must be cheap to call from a room actor; they are
/// shared across every room through an `Arc`.
pub trait WordProvider: Send + Sync + 'static {
    /// Returns up to `n` distinct random words.
    fn pick_random_words(&self, n: usize) -> Vec<WordEntry>;

    /// Returns hint level `index` for `entry`.
    ///
    /// The default reveals the first `index + 1` segments of the entry's
    /// hint text.
    fn hint_at(&self, entry: &WordEntry, index: u8) -> String {
        progressive_hint(&entry.hint, index)
    }
}

/// The first `index + 1` segments of `hint`.
pub fn progressive_hint(hint: &str, index: u8) -> String {
    hint.split(HINT_SEPARATOR)
        .take(index as usize + 1)
        .collect::<Vec<_>>()
        .join(HINT_SEPARATOR)
}

/// Builds the hint text for a word from its category and clue.
pub fn compose_hint(word: &str, category: &str, clue: &str) -> String {
    let letters = count_letters(word);
    format!("{letters} letters{HINT_SEPARATOR}{category}{HINT_SEPARATOR}{clue}")
}

// ---------------------------------------------------------------------------
// WordList
// ---------------------------------------------------------------------------

/// An in-memory dictionary.
#[derive(Debug, Clone)]
pub struct WordList {
    entries: Vec<WordEntry>,
}

impl WordList {
    /// Creates a list from pre-built entries.
    pub fn new(entries: Vec<WordEntry>) -> Self {
        Self { entries }
    }

    /// The built-in dictionary.
    pub fn builtin() -> Self {
        let entries = BUILTIN
            .iter()
            .map(|(word, category, clue)| WordEntry::new(*word, compose_hint(word, category, clue)))
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for WordList {
    fn default() -> Self {
        Self::builtin()
    }
}

impl WordProvider for WordList {
    fn pick_random_words(&self, n: usize) -> Vec<WordEntry> {
        self.entries
            .choose_multiple(&mut rand::rng(), n)
            .cloned()
            .collect()
    }
}

// (word, category, clue)
const BUILTIN: &[(&str, &str, &str)] = &[
    ("apple", "fruit", "red or green"),
    ("banana", "fruit", "yellow and curved"),
    ("grapes", "fruit", "grows in bunches"),
    ("watermelon", "fruit", "green outside, red inside"),
    ("pineapple", "fruit", "spiky crown"),
    ("strawberry", "fruit", "seeds on the outside"),
    ("cat", "animal", "says meow"),
    ("dog", "animal", "man's best friend"),
    ("elephant", "animal", "has a trunk"),
    ("giraffe", "animal", "very long neck"),
    ("penguin", "animal", "a bird that cannot fly"),
    ("rabbit", "animal", "long ears, hops"),
    ("snail", "animal", "carries its house"),
    ("octopus", "animal", "eight arms"),
    ("bicycle", "vehicle", "two wheels and pedals"),
    ("airplane", "vehicle", "flies with wings"),
    ("submarine", "vehicle", "travels under water"),
    ("rocket", "vehicle", "goes to space"),
    ("tractor", "vehicle", "works on a farm"),
    ("umbrella", "object", "keeps you dry"),
    ("scissors", "object", "cuts paper"),
    ("toothbrush", "object", "used twice a day"),
    ("candle", "object", "melts as it burns"),
    ("ladder", "object", "climb it step by step"),
    ("glasses", "object", "helps you see"),
    ("key", "object", "opens a lock"),
    ("clock", "object", "has hands but no fingers"),
    ("pizza", "food", "round and sliced"),
    ("hamburger", "food", "meat between buns"),
    ("ice cream", "food", "cold dessert"),
    ("popcorn", "food", "eaten at the movies"),
    ("sandwich", "food", "two slices of bread"),
    ("rainbow", "nature", "seven colours"),
    ("volcano", "nature", "mountain that erupts"),
    ("snowman", "winter", "carrot for a nose"),
    ("cactus", "plant", "lives in the desert"),
    ("sunflower", "plant", "follows the sun"),
    ("mushroom", "plant", "grows after rain"),
    ("guitar", "instrument", "six strings"),
    ("piano", "instrument", "black and white keys"),
    ("drum", "instrument", "hit it with sticks"),
    ("castle", "building", "home of a king"),
    ("lighthouse", "building", "guides ships at night"),
    ("pyramid", "building", "ancient Egyptian tomb"),
    ("robot", "technology", "a mechanical helper"),
    ("camera", "technology", "takes pictures"),
    ("football", "sport", "kicked into a goal"),
    ("skateboard", "sport", "four wheels, no handles"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progressive_hint_levels() {
        let hint = compose_hint("apple", "fruit", "red or green");
        assert_eq!(progressive_hint(&hint, 0), "5 letters");
        assert_eq!(progressive_hint(&hint, 1), "5 letters · fruit");
        assert_eq!(progressive_hint(&hint, 2), "5 letters · fruit · red or green");
        assert_eq!(progressive_hint(&hint, 9), hint);
    }

    #[test]
    fn test_compose_hint_ignores_spaces() {
        assert_eq!(
            compose_hint("ice cream", "food", "cold dessert"),
            "8 letters · food · cold dessert"
        );
    }

    #[test]
    fn test_pick_random_words_is_distinct_and_bounded() {
        let words = WordList::builtin();
        let picked = words.pick_random_words(3);
        assert_eq!(picked.len(), 3);
        assert_ne!(picked[0], picked[1]);
        assert_ne!(picked[1], picked[2]);
        assert_ne!(picked[0], picked[2]);

        let small = WordList::new(vec![WordEntry::new("a", "1 letters")]);
        assert_eq!(small.pick_random_words(3).len(), 1);
    }

    #[test]
    fn test_builtin_hints_never_contain_the_word() {
        for entry in WordList::builtin().entries {
            assert!(
                !entry.hint.to_lowercase().contains(&entry.word.to_lowercase()),
                "hint for {} reveals it",
                entry.word
            );
        }
    }

    #[test]
    fn test_hint_letter_count_matches_word_length() {
        let entry = WordEntry::new("ice cream", compose_hint("ice cream", "food", "cold dessert"));
        assert_eq!(
            progressive_hint(&entry.hint, 0),
            format!("{} letters", entry.letter_count())
        );
    }

    #[test]
    fn test_default_hint_at_uses_segments() {
        let words = WordList::builtin();
        let entry = WordEntry::new("dog", "3 letters · animal · man's best friend");
        assert_eq!(words.hint_at(&entry, 1), "3 letters · animal");
    }
}
