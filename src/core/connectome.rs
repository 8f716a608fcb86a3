//! Sparse weighted edge sets between one source population and one target
//! area.
//!
//! A connectome stores one row per *materialized* source neuron; each row
//! lists the realized outgoing synapses into the target area. Absent entries
//! are weight zero. Rows only ever grow: lazy materialization appends rows
//! and edges, plasticity rescales existing weights, nothing is removed.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Index of a neuron within its area (or of a unit within a stimulus).
pub type NeuronId = u32;

/// A realized edge into the target area.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Synapse {
    pub neuron: NeuronId,
    pub weight: f32,
}

/// Identifies the source side of a connectome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceId {
    Stimulus(usize),
    Area(usize),
}

/// The lazily-grown edge set from one source to one target area.
#[derive(Debug, Clone)]
pub struct Connectome {
    source: SourceId,
    target: usize,
    rows: Vec<Vec<Synapse>>,
}

impl Connectome {
    pub(crate) fn new(source: SourceId, target: usize) -> Self {
        Self {
            source,
            target,
            rows: Vec::new(),
        }
    }

    pub(crate) fn source(&self) -> SourceId {
        self.source
    }

    pub(crate) fn target(&self) -> usize {
        self.target
    }

    /// Number of materialized source rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Realized outgoing synapses of one materialized source neuron.
    pub fn row(&self, from: NeuronId) -> &[Synapse] {
        &self.rows[from as usize]
    }

    /// Weight of the (from, to) edge; zero when the edge was never realized.
    pub fn weight(&self, from: NeuronId, to: NeuronId) -> f32 {
        self.rows
            .get(from as usize)
            .and_then(|row| row.iter().find(|s| s.neuron == to))
            .map_or(0.0, |s| s.weight)
    }

    /// Total number of realized edges.
    pub fn synapse_count(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    pub(crate) fn push_row(&mut self, targets: Vec<NeuronId>) {
        self.rows.push(
            targets
                .into_iter()
                .map(|neuron| Synapse {
                    neuron,
                    weight: 1.0,
                })
                .collect(),
        );
    }

    /// Append a weight-1 edge from an already-materialized source neuron.
    pub(crate) fn append_edge(&mut self, from: NeuronId, to: NeuronId) {
        self.rows[from as usize].push(Synapse {
            neuron: to,
            weight: 1.0,
        });
    }

    /// Add each realized edge weight from the active source set into the
    /// per-target-neuron accumulator. `into` spans the target's materialized
    /// range; edges beyond it cannot exist yet.
    pub(crate) fn accumulate_inputs(&self, active: &[NeuronId], into: &mut [f32]) {
        for &from in active {
            for syn in &self.rows[from as usize] {
                into[syn.neuron as usize] += syn.weight;
            }
        }
    }

    /// Multiply every realized edge from an active source neuron to a new
    /// winner by `learn_rate`, saturating at `max_weight`. This is the sole
    /// mutation path for edge weights.
    pub(crate) fn potentiate(
        &mut self,
        active: &[NeuronId],
        is_new_winner: &[bool],
        learn_rate: f32,
        max_weight: f32,
    ) {
        for &from in active {
            for syn in &mut self.rows[from as usize] {
                if is_new_winner[syn.neuron as usize] {
                    syn.weight = (syn.weight * learn_rate).min(max_weight);
                }
            }
        }
    }

    /// Per-weight-band edge counts, for diagnostics.
    pub(crate) fn weight_bands(&self, low_threshold: f32, max_weight: f32) -> (usize, usize, usize) {
        let mut low = 0;
        let mut mid = 0;
        let mut saturated = 0;
        for row in &self.rows {
            for syn in row {
                if syn.weight < low_threshold {
                    low += 1;
                } else if syn.weight < max_weight {
                    mid += 1;
                } else {
                    saturated += 1;
                }
            }
        }
        (low, mid, saturated)
    }
}
