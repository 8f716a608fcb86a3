//! Winner-set overlap statistics.
//!
//! Small helpers the measurement side leans on: assembly formation is
//! detected as round-over-round overlap approaching `k`, pattern completion
//! as overlap with a reference round recovering after a partial cue.

use crate::connectome::NeuronId;

/// Size of the intersection of two winner sets.
pub fn overlap(a: &[NeuronId], b: &[NeuronId]) -> usize {
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort_unstable();
    b.sort_unstable();
    let (mut i, mut j, mut common) = (0, 0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                common += 1;
                i += 1;
                j += 1;
            }
        }
    }
    common
}

/// Overlap of every round in `history` with the winner set of `base`.
///
/// `history` is the per-round winner log of one area
/// (`Area::saved_winners`); entry `base` is the reference assembly.
pub fn overlaps_with_base(history: &[Vec<NeuronId>], base: usize) -> Vec<usize> {
    let reference = &history[base];
    history.iter().map(|round| overlap(round, reference)).collect()
}

/// Overlap of each round's winners with the previous round's.
pub fn consecutive_overlaps(history: &[Vec<NeuronId>]) -> Vec<usize> {
    history
        .windows(2)
        .map(|pair| overlap(&pair[0], &pair[1]))
        .collect()
}
