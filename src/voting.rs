//! Power-up state voting
//!
//! Each bit of an image is weighed by how many samples powered up with that
//! bit set. Comparing the weights of an aged sample set against a new one
//! gives a per-bit vote: a bit that aged towards 1 was stored as 0, and the
//! other way round. Bits are taken most significant first within a byte.

/// Outcome of voting on one bit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    Zero,
    One,
    /// No majority either way
    Tie,
}

impl Vote {
    fn matches(self, bit: bool) -> bool {
        matches!((self, bit), (Vote::Zero, false) | (Vote::One, true))
    }
}

/// Bit `index` of `bytes`, most significant bit of byte 0 first
pub fn bit(bytes: &[u8], index: usize) -> bool {
    bytes[index / 8] & (0x80 >> (index % 8)) != 0
}

/// Number of samples holding a 1 at each bit position
///
/// All samples are cut to the shortest one.
pub fn bit_weights<S: AsRef<[u8]>>(samples: &[S]) -> Vec<u32> {
    let len = samples.iter().map(|s| s.as_ref().len()).min().unwrap_or(0);
    let mut weights = vec![0u32; len * 8];

    for sample in samples {
        let sample = &sample.as_ref()[..len];
        for (i, weight) in weights.iter_mut().enumerate() {
            *weight += bit(sample, i) as u32;
        }
    }
    weights
}

/// Sign-based vote of aged against new weights
///
/// A bit whose aged weight is higher than its new weight votes 0, a lower
/// one votes 1, and equal weights tie.
pub fn sign_vote(new_weights: &[u32], aged_weights: &[u32]) -> Vec<Vote> {
    new_weights
        .iter()
        .zip(aged_weights)
        .map(|(&new, &aged)| match aged.cmp(&new) {
            std::cmp::Ordering::Greater => Vote::Zero,
            std::cmp::Ordering::Less => Vote::One,
            std::cmp::Ordering::Equal => Vote::Tie,
        })
        .collect()
}

/// Bitwise majority over several vote lists; ties in the count tie
pub fn majority(votes: &[Vec<Vote>]) -> Vec<Vote> {
    let len = votes.iter().map(Vec::len).min().unwrap_or(0);

    (0..len)
        .map(|i| {
            let zeros = votes.iter().filter(|v| v[i] == Vote::Zero).count();
            let ones = votes.iter().filter(|v| v[i] == Vote::One).count();
            match zeros.cmp(&ones) {
                std::cmp::Ordering::Greater => Vote::Zero,
                std::cmp::Ordering::Less => Vote::One,
                std::cmp::Ordering::Equal => Vote::Tie,
            }
        })
        .collect()
}

/// Fraction of `reference` bits reproduced by `votes`
///
/// Ties never match, and reference bits without a vote count as misses.
pub fn recovery_rate(votes: &[Vote], reference: &[u8]) -> f64 {
    let total = reference.len() * 8;
    if total == 0 {
        return 0.0;
    }
    let correct = votes
        .iter()
        .take(total)
        .enumerate()
        .filter(|&(i, vote)| vote.matches(bit(reference, i)))
        .count();
    correct as f64 / total as f64
}
