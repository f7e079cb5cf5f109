use std::fmt;

use serde::Serialize;

/// Similarity in thousandths: `0` is unrelated, `1000` is identical.
///
/// Integer arithmetic keeps scoring exact and reproducible across platforms.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Score(u16);

impl Score {
    /// No similarity.
    pub const ZERO: Self = Self(0);
    /// Identical subtrees.
    pub const PERFECT: Self = Self(1000);

    /// A score of `permille` thousandths, clamped to [`PERFECT`](Self::PERFECT).
    #[must_use]
    pub const fn new(permille: u16) -> Self {
        if permille > 1000 {
            Self::PERFECT
        } else {
            Self(permille)
        }
    }

    /// `numerator / denominator`, rounded to the nearest thousandth. A zero
    /// denominator yields [`ZERO`](Self::ZERO).
    #[must_use]
    pub fn ratio(numerator: u64, denominator: u64) -> Self {
        if denominator == 0 {
            return Self::ZERO;
        }
        let permille = (numerator.saturating_mul(1000) + denominator / 2) / denominator;
        Self::new(u16::try_from(permille).unwrap_or(u16::MAX))
    }

    /// Thousandths.
    #[must_use]
    pub const fn get(self) -> u16 {
        self.0
    }

    /// Whether this is [`PERFECT`](Self::PERFECT).
    #[must_use]
    pub const fn is_perfect(self) -> bool {
        self.0 == Self::PERFECT.0
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}", self.0 / 1000, self.0 % 1000)
    }
}

/// Dice coefficient over character bigrams, with each string padded by a
/// space on both sides so single characters and word edges still produce
/// bigrams. Bigrams are counted as a multiset.
///
/// ```
/// use arbor_core::matching::{Score, bigram_similarity};
///
/// assert_eq!(bigram_similarity("parse", "parse"), Score::PERFECT);
/// assert!(bigram_similarity("parse_line", "parse_lines") > Score::new(800));
/// assert_eq!(bigram_similarity("a", "b"), Score::ZERO);
/// ```
#[must_use]
pub fn bigram_similarity(a: &str, b: &str) -> Score {
    if a == b {
        return Score::PERFECT;
    }
    let mut left = bigrams(a);
    let mut right = bigrams(b);
    left.sort_unstable();
    right.sort_unstable();

    let (mut i, mut j, mut common) = (0, 0, 0u64);
    while i < left.len() && j < right.len() {
        match left[i].cmp(&right[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                common += 1;
                i += 1;
                j += 1;
            }
        }
    }

    let total = (left.len() + right.len()) as u64;
    Score::ratio(2 * common, total)
}

fn bigrams(text: &str) -> Vec<(char, char)> {
    let padded: Vec<char> = std::iter::once(' ')
        .chain(text.chars())
        .chain(std::iter::once(' '))
        .collect();
    padded.windows(2).map(|w| (w[0], w[1])).collect()
}
