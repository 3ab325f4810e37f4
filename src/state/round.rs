//! Word selection, shuffling and guess evaluation.
//!
//! Everything here is synchronous and lock-free: the [`RoundEngine`] lives inside the game
//! state store and is only ever driven while the store lock is held.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::{
    SeedableRng,
    rngs::StdRng,
    seq::{IndexedRandom, SliceRandom},
};

/// Score that ends the round for the player reaching it.
pub const WIN_THRESHOLD: u32 = 3;
/// Smallest vocabulary accepted from configuration.
pub const MIN_VOCABULARY_LEN: usize = 8;
/// Built-in vocabulary.
pub const DEFAULT_VOCABULARY: [&str; 9] = [
    "apple",
    "banana",
    "cherry",
    "grape",
    "orange",
    "kiwi",
    "mango",
    "avocado",
    "strawberry",
];

/// Shuffle attempts before falling back to a rotation.
const MAX_SHUFFLE_ATTEMPTS: usize = 16;

/// Random word source plus the deterministic rules of a round.
pub struct RoundEngine {
    vocabulary: Vec<String>,
    rng: StdRng,
}

impl RoundEngine {
    /// Engine seeded from the wall clock so restarts never replay the same word sequence.
    pub fn new(vocabulary: Vec<String>) -> Self {
        Self::with_seed(vocabulary, time_seed())
    }

    /// Deterministic engine; an empty vocabulary falls back to the built-in words.
    pub fn with_seed(vocabulary: Vec<String>, seed: u64) -> Self {
        let vocabulary = if vocabulary.is_empty() {
            DEFAULT_VOCABULARY.iter().map(|w| w.to_string()).collect()
        } else {
            vocabulary
        };
        Self {
            vocabulary,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Uniformly pick a word from the vocabulary.
    pub fn pick_word(&mut self) -> String {
        self.vocabulary
            .choose(&mut self.rng)
            .cloned()
            .unwrap_or_else(|| DEFAULT_VOCABULARY[0].to_string())
    }

    /// Return a permutation of `word` that differs from it whenever one exists.
    ///
    /// Words made of a single repeated letter (or shorter than two characters) have no
    /// distinct permutation and are returned unchanged.
    pub fn shuffle(&mut self, word: &str) -> String {
        let original: Vec<char> = word.chars().collect();
        if !has_distinct_permutation(&original) {
            return word.to_string();
        }

        let mut chars = original.clone();
        for _ in 0..MAX_SHUFFLE_ATTEMPTS {
            chars.shuffle(&mut self.rng);
            if chars != original {
                return chars.into_iter().collect();
            }
        }

        // A rotation by one only equals the input when every letter is the same.
        let mut rotated = original;
        rotated.rotate_left(1);
        rotated.into_iter().collect()
    }
}

/// Case-insensitive comparison of a guess against the assigned word.
pub fn is_correct_guess(word: &str, guess: &str) -> bool {
    canonical(word) == canonical(guess)
}

/// True when `score` ends the round.
pub fn is_winning_score(score: u32) -> bool {
    score == WIN_THRESHOLD
}

fn canonical(value: &str) -> String {
    value.trim().to_lowercase()
}

fn has_distinct_permutation(chars: &[char]) -> bool {
    match chars.first() {
        Some(first) => chars.iter().any(|c| c != first),
        None => false,
    }
}

fn time_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(seed: u64) -> RoundEngine {
        RoundEngine::with_seed(
            DEFAULT_VOCABULARY.iter().map(|w| w.to_string()).collect(),
            seed,
        )
    }

    fn sorted(word: &str) -> Vec<char> {
        let mut chars: Vec<char> = word.chars().collect();
        chars.sort_unstable();
        chars
    }

    #[test]
    fn shuffle_is_a_distinct_permutation() {
        let mut engine = engine(7);
        for word in DEFAULT_VOCABULARY.iter().chain(["ab", "aab", "banana"].iter()) {
            for _ in 0..50 {
                let shuffled = engine.shuffle(word);
                assert_eq!(sorted(&shuffled), sorted(word), "{shuffled} vs {word}");
                assert_ne!(&shuffled, word);
            }
        }
    }

    #[test]
    fn shuffle_keeps_words_without_distinct_arrangement() {
        let mut engine = engine(1);
        assert_eq!(engine.shuffle(""), "");
        assert_eq!(engine.shuffle("a"), "a");
        assert_eq!(engine.shuffle("zzz"), "zzz");
    }

    #[test]
    fn pick_word_stays_in_vocabulary() {
        let mut engine = engine(42);
        for _ in 0..100 {
            let word = engine.pick_word();
            assert!(DEFAULT_VOCABULARY.contains(&word.as_str()));
        }
    }

    #[test]
    fn same_seed_replays_same_sequence() {
        let mut a = engine(99);
        let mut b = engine(99);
        let first: Vec<String> = (0..10).map(|_| a.pick_word()).collect();
        let second: Vec<String> = (0..10).map(|_| b.pick_word()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_vocabulary_falls_back_to_defaults() {
        let mut engine = RoundEngine::with_seed(Vec::new(), 3);
        assert!(DEFAULT_VOCABULARY.contains(&engine.pick_word().as_str()));
    }

    #[test]
    fn guesses_compare_case_insensitively() {
        assert!(is_correct_guess("apple", "APPLE"));
        assert!(is_correct_guess("Apple", " apple "));
        assert!(!is_correct_guess("apple", "appel"));
        assert!(!is_correct_guess("apple", ""));
    }

    #[test]
    fn only_the_threshold_wins() {
        assert!(!is_winning_score(2));
        assert!(is_winning_score(WIN_THRESHOLD));
        assert!(!is_winning_score(WIN_THRESHOLD + 1));
    }
}
