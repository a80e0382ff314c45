//! The static word-pair catalog.
//!
//! Each pair belongs to a category and carries two related words:
//! word A goes to civilians, word B to Mr. White. Spies learn only the
//! category. One pair seeds each round, picked uniformly at random.

use rand::Rng;
use rand::seq::IndexedRandom;

/// A category with two related words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordPair {
    pub category: &'static str,
    pub word_a: &'static str,
    pub word_b: &'static str,
}

/// The built-in catalog. Loaded once, never mutated.
pub const WORD_PAIRS: &[WordPair] = &[
    WordPair { category: "Food", word_a: "pizza", word_b: "lasagna" },
    WordPair { category: "Food", word_a: "croissant", word_b: "baguette" },
    WordPair { category: "Food", word_a: "sushi", word_b: "ramen" },
    WordPair { category: "Fruit", word_a: "orange", word_b: "tangerine" },
    WordPair { category: "Fruit", word_a: "strawberry", word_b: "raspberry" },
    WordPair { category: "Animals", word_a: "dolphin", word_b: "shark" },
    WordPair { category: "Animals", word_a: "eagle", word_b: "falcon" },
    WordPair { category: "Animals", word_a: "crocodile", word_b: "alligator" },
    WordPair { category: "Drinks", word_a: "coffee", word_b: "tea" },
    WordPair { category: "Drinks", word_a: "lemonade", word_b: "orangeade" },
    WordPair { category: "Places", word_a: "beach", word_b: "lake" },
    WordPair { category: "Places", word_a: "cinema", word_b: "theatre" },
    WordPair { category: "Places", word_a: "library", word_b: "bookshop" },
    WordPair { category: "Sports", word_a: "football", word_b: "rugby" },
    WordPair { category: "Sports", word_a: "tennis", word_b: "badminton" },
    WordPair { category: "Sports", word_a: "skiing", word_b: "snowboarding" },
    WordPair { category: "Music", word_a: "violin", word_b: "cello" },
    WordPair { category: "Music", word_a: "piano", word_b: "organ" },
    WordPair { category: "Clothing", word_a: "jacket", word_b: "coat" },
    WordPair { category: "Clothing", word_a: "sneakers", word_b: "boots" },
    WordPair { category: "Transport", word_a: "train", word_b: "tram" },
    WordPair { category: "Transport", word_a: "helicopter", word_b: "airplane" },
    WordPair { category: "Professions", word_a: "doctor", word_b: "nurse" },
    WordPair { category: "Professions", word_a: "painter", word_b: "sculptor" },
    WordPair { category: "Weather", word_a: "rain", word_b: "hail" },
    WordPair { category: "Weather", word_a: "fog", word_b: "mist" },
];

/// Picks one pair uniformly at random.
pub fn random_pair<R: Rng + ?Sized>(rng: &mut R) -> &'static WordPair {
    // The catalog is a non-empty const, so choose cannot fail.
    WORD_PAIRS.choose(rng).unwrap_or(&WORD_PAIRS[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_catalog_is_well_formed() {
        assert!(!WORD_PAIRS.is_empty());
        for pair in WORD_PAIRS {
            assert!(!pair.category.is_empty());
            assert!(!pair.word_a.is_empty());
            assert!(!pair.word_b.is_empty());
            assert_ne!(pair.word_a, pair.word_b, "{}", pair.category);
        }
    }

    #[test]
    fn test_random_pair_eventually_covers_catalog() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..2000 {
            seen.insert(random_pair(&mut rng).word_a);
        }
        assert_eq!(seen.len(), WORD_PAIRS.len());
    }
}
