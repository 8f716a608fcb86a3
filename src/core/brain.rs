//! Areas, stimuli, and the `Brain` aggregate that drives projection rounds.
//!
//! A `Brain` owns every area, stimulus, and connectome; `project` is the
//! only operation that mutates simulation state. Branching a brain for
//! counterfactual comparison is a plain `clone()`: all state is owned, so
//! the copies share nothing.

use hashbrown::HashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use crate::connectome::{Connectome, NeuronId, SourceId, Synapse};
use crate::sampling;

#[derive(Debug, Error)]
pub enum BrainError {
    #[error("unknown area `{0}`")]
    UnknownArea(String),
    #[error("unknown stimulus `{0}`")]
    UnknownStimulus(String),
    #[error("unknown source `{0}`")]
    UnknownSource(String),
    #[error("name `{0}` is already registered")]
    DuplicateName(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("area `{area}`: requested {requested} neurons but only {available} are available")]
    InsufficientSupport {
        area: String,
        requested: u32,
        available: u32,
    },
    #[error("area `{0}` has no formed assembly")]
    AssemblyNotFormed(String),
}

/// Brain-wide simulation parameters.
///
/// `p` is the connection probability of the underlying random graph. The
/// history flags are fixed here, before any area exists, so every area's
/// logs are either complete or absent, never partial.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BrainConfig {
    pub p: f32,
    pub seed: u64,
    /// Saturation cap applied during potentiation.
    pub max_weight: f32,
    /// Sizing factor for the candidate pool used when selecting winners
    /// among never-materialized neurons: the pool holds
    /// `ceil(k * candidate_pool_factor)` samples from the tail of the input
    /// distribution. Raise it above 1.0 to widen the safety margin of the
    /// top-k recovery.
    pub candidate_pool_factor: f32,
    /// Record `w` after every projected round (`Area::saved_w`).
    pub save_size: bool,
    /// Record the winner set after every projected round
    /// (`Area::saved_winners`).
    pub save_winners: bool,
}

impl BrainConfig {
    pub fn new(p: f32) -> Self {
        Self {
            p,
            seed: 0,
            max_weight: f32::MAX,
            candidate_pool_factor: 1.0,
            save_size: true,
            save_winners: false,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_max_weight(mut self, max_weight: f32) -> Self {
        self.max_weight = max_weight;
        self
    }

    pub fn with_candidate_pool_factor(mut self, factor: f32) -> Self {
        self.candidate_pool_factor = factor;
        self
    }

    pub fn with_save_size(mut self, enabled: bool) -> Self {
        self.save_size = enabled;
        self
    }

    pub fn with_save_winners(mut self, enabled: bool) -> Self {
        self.save_winners = enabled;
        self
    }
}

/// A fixed pool of always-active units. Only ever a source, never a target.
#[derive(Debug, Clone)]
pub struct Stimulus {
    name: String,
    k: u32,
}

impl Stimulus {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn k(&self) -> u32 {
        self.k
    }
}

/// A named neuron population with winner-take-`k` dynamics.
#[derive(Debug, Clone)]
pub struct Area {
    name: String,
    n: u32,
    k: u32,
    beta: f32,
    winners: Vec<NeuronId>,
    /// Count of distinct neurons that have ever won. Never decreases.
    w: u32,
    /// Count of materialized neurons: `n` for explicit areas, `== w` for
    /// implicit ones.
    support: u32,
    is_explicit: bool,
    fixed: bool,
    num_first_winners: u32,
    // Explicit areas only; implicit areas materialize exactly the ever-winners.
    ever_won: Vec<bool>,
    saved_w: Vec<u32>,
    saved_winners: Vec<Vec<NeuronId>>,
    track_size: bool,
    track_winners: bool,
}

impl Area {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn n(&self) -> u32 {
        self.n
    }

    pub fn k(&self) -> u32 {
        self.k
    }

    pub fn beta(&self) -> f32 {
        self.beta
    }

    /// Currently firing neurons, sorted ascending. At most `k` of them.
    pub fn winners(&self) -> &[NeuronId] {
        &self.winners
    }

    pub fn w(&self) -> u32 {
        self.w
    }

    pub fn support(&self) -> u32 {
        self.support
    }

    pub fn is_explicit(&self) -> bool {
        self.is_explicit
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    /// Winners in the most recent projected round that had never won before.
    pub fn num_first_winners(&self) -> u32 {
        self.num_first_winners
    }

    pub fn saved_w(&self) -> &[u32] {
        &self.saved_w
    }

    pub fn saved_winners(&self) -> &[Vec<NeuronId>] {
        &self.saved_winners
    }
}

/// One round's projection graph: which stimuli and which source areas fire
/// into which target areas.
///
/// Entries are kept in insertion order but the engine resolves them into
/// registration order before consuming randomness, so the round outcome is
/// independent of how the graph was assembled.
#[derive(Debug, Clone, Default)]
pub struct Projection {
    from_stimuli: Vec<(String, Vec<String>)>,
    from_areas: Vec<(String, Vec<String>)>,
}

impl Projection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire stimulus `name` into each of `targets` this round.
    pub fn stimulus(mut self, name: &str, targets: &[&str]) -> Self {
        self.from_stimuli
            .push((name.to_string(), targets.iter().map(|t| t.to_string()).collect()));
        self
    }

    /// Fire area `name`'s current winners into each of `targets` this round.
    pub fn area(mut self, name: &str, targets: &[&str]) -> Self {
        self.from_areas
            .push((name.to_string(), targets.iter().map(|t| t.to_string()).collect()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.from_stimuli.is_empty() && self.from_areas.is_empty()
    }
}

/// Aggregate counters over the whole brain.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Diagnostics {
    pub areas: usize,
    pub stimuli: usize,
    pub connectomes: usize,
    /// Total realized edges across all connectomes.
    pub synapses: usize,
    /// Sum of materialized neuron counts across areas.
    pub total_support: u64,
    pub max_weight: f32,
    pub rounds: u64,
    /// Estimated bytes held by connectome storage.
    pub memory_bytes: usize,
}

/// The simulation aggregate: stimuli, areas, connectomes, and the RNG.
#[derive(Clone)]
pub struct Brain {
    cfg: BrainConfig,
    rng: StdRng,

    stimuli: Vec<Stimulus>,
    areas: Vec<Area>,
    stim_by_name: HashMap<String, usize>,
    area_by_name: HashMap<String, usize>,

    connectomes: Vec<Connectome>,
    // Connectome ids per area, in creation order. Creation order is a
    // function of registration order alone, which keeps the RNG stream
    // reproducible for a fixed seed. Stimulus rows never grow after
    // creation, so no outgoing list is kept for stimuli.
    incoming: Vec<Vec<usize>>,
    outgoing_area: Vec<Vec<usize>>,

    plasticity_enabled: bool,
    round: u64,
}

impl Brain {
    pub fn new(cfg: BrainConfig) -> Result<Self, BrainError> {
        if !cfg.p.is_finite() || cfg.p <= 0.0 || cfg.p >= 1.0 {
            return Err(BrainError::InvalidParameter(format!(
                "connection probability p must lie in (0, 1), got {}",
                cfg.p
            )));
        }
        if cfg.max_weight.is_nan() || cfg.max_weight < 1.0 {
            return Err(BrainError::InvalidParameter(format!(
                "max_weight must be >= 1.0, got {}",
                cfg.max_weight
            )));
        }
        if !cfg.candidate_pool_factor.is_finite() || cfg.candidate_pool_factor < 1.0 {
            return Err(BrainError::InvalidParameter(format!(
                "candidate_pool_factor must be >= 1.0, got {}",
                cfg.candidate_pool_factor
            )));
        }
        Ok(Self {
            rng: StdRng::seed_from_u64(cfg.seed),
            cfg,
            stimuli: Vec::new(),
            areas: Vec::new(),
            stim_by_name: HashMap::new(),
            area_by_name: HashMap::new(),
            connectomes: Vec::new(),
            incoming: Vec::new(),
            outgoing_area: Vec::new(),
            plasticity_enabled: true,
            round: 0,
        })
    }

    pub fn config(&self) -> &BrainConfig {
        &self.cfg
    }

    /// Completed projection rounds.
    pub fn rounds(&self) -> u64 {
        self.round
    }

    /// Globally enable or disable synaptic weight updates. Winner selection
    /// is unaffected.
    pub fn set_plasticity(&mut self, enabled: bool) {
        self.plasticity_enabled = enabled;
    }

    pub fn plasticity_enabled(&self) -> bool {
        self.plasticity_enabled
    }

    /// An independent deep copy for counterfactual comparison. The branch
    /// shares no mutable state with `self`, including the RNG position.
    pub fn branch(&self) -> Self {
        self.clone()
    }

    // ---- registration ----------------------------------------------------

    pub fn add_stimulus(&mut self, name: &str, k: u32) -> Result<(), BrainError> {
        self.check_name_free(name)?;
        if k == 0 {
            return Err(BrainError::InvalidParameter(format!(
                "stimulus `{}` must have k >= 1",
                name
            )));
        }
        let id = self.stimuli.len();
        self.stimuli.push(Stimulus {
            name: name.to_string(),
            k,
        });
        self.stim_by_name.insert(name.to_string(), id);
        for area in 0..self.areas.len() {
            self.add_connectome(SourceId::Stimulus(id), area);
        }
        debug!(stimulus = name, k, "registered stimulus");
        Ok(())
    }

    /// Register an implicit area: neurons materialize lazily, the first
    /// time they win.
    pub fn add_area(&mut self, name: &str, n: u32, k: u32, beta: f32) -> Result<(), BrainError> {
        self.add_area_inner(name, n, k, beta, false)
    }

    /// Register an explicit area: all `n` neurons and every incoming edge
    /// from every registered source exist from creation. Winner selection
    /// is an exact top-`k`; the statistical candidate machinery is never
    /// used for this area.
    pub fn add_explicit_area(
        &mut self,
        name: &str,
        n: u32,
        k: u32,
        beta: f32,
    ) -> Result<(), BrainError> {
        self.add_area_inner(name, n, k, beta, true)
    }

    fn add_area_inner(
        &mut self,
        name: &str,
        n: u32,
        k: u32,
        beta: f32,
        is_explicit: bool,
    ) -> Result<(), BrainError> {
        self.check_name_free(name)?;
        if n == 0 || k == 0 {
            return Err(BrainError::InvalidParameter(format!(
                "area `{}` must have n >= 1 and k >= 1",
                name
            )));
        }
        if k > n {
            return Err(BrainError::InsufficientSupport {
                area: name.to_string(),
                requested: k,
                available: n,
            });
        }
        if !beta.is_finite() || beta < 0.0 {
            return Err(BrainError::InvalidParameter(format!(
                "area `{}` must have beta >= 0, got {}",
                name, beta
            )));
        }
        let id = self.areas.len();
        self.areas.push(Area {
            name: name.to_string(),
            n,
            k,
            beta,
            winners: Vec::new(),
            w: 0,
            support: if is_explicit { n } else { 0 },
            is_explicit,
            fixed: false,
            num_first_winners: 0,
            ever_won: if is_explicit {
                vec![false; n as usize]
            } else {
                Vec::new()
            },
            saved_w: Vec::new(),
            saved_winners: Vec::new(),
            track_size: self.cfg.save_size,
            track_winners: self.cfg.save_winners,
        });
        self.area_by_name.insert(name.to_string(), id);
        self.incoming.push(Vec::new());
        self.outgoing_area.push(Vec::new());

        for stim in 0..self.stimuli.len() {
            self.add_connectome(SourceId::Stimulus(stim), id);
        }
        for area in 0..id {
            self.add_connectome(SourceId::Area(area), id);
        }
        self.add_connectome(SourceId::Area(id), id);
        for area in 0..id {
            self.add_connectome(SourceId::Area(id), area);
        }
        debug!(area = name, n, k, beta, is_explicit, "registered area");
        Ok(())
    }

    fn check_name_free(&self, name: &str) -> Result<(), BrainError> {
        if self.area_by_name.contains_key(name) || self.stim_by_name.contains_key(name) {
            return Err(BrainError::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    /// Create the (source, target) connectome and realize rows for every
    /// already-materialized source neuron over the target's current support.
    fn add_connectome(&mut self, source: SourceId, target: usize) {
        let id = self.connectomes.len();
        let src_count = match source {
            SourceId::Stimulus(s) => self.stimuli[s].k,
            SourceId::Area(a) => self.areas[a].support,
        };
        let tgt_support = self.areas[target].support;
        let mut conn = Connectome::new(source, target);
        for _ in 0..src_count {
            let row = sampling::bernoulli_row(tgt_support, self.cfg.p, &mut self.rng);
            conn.push_row(row);
        }
        self.connectomes.push(conn);
        self.incoming[target].push(id);
        if let SourceId::Area(a) = source {
            self.outgoing_area[a].push(id);
        }
    }

    // ---- lookup ----------------------------------------------------------

    pub fn area(&self, name: &str) -> Result<&Area, BrainError> {
        self.area_id(name).map(|id| &self.areas[id])
    }

    pub fn stimulus(&self, name: &str) -> Result<&Stimulus, BrainError> {
        self.stim_by_name
            .get(name)
            .map(|&id| &self.stimuli[id])
            .ok_or_else(|| BrainError::UnknownStimulus(name.to_string()))
    }

    pub fn areas(&self) -> impl Iterator<Item = &Area> {
        self.areas.iter()
    }

    pub fn stimuli(&self) -> impl Iterator<Item = &Stimulus> {
        self.stimuli.iter()
    }

    /// The edge set from a stimulus or area into a target area.
    pub fn connectome(&self, from: &str, to: &str) -> Result<&Connectome, BrainError> {
        let target = self.area_id(to)?;
        let source = if let Some(&s) = self.stim_by_name.get(from) {
            SourceId::Stimulus(s)
        } else if let Some(&a) = self.area_by_name.get(from) {
            SourceId::Area(a)
        } else {
            return Err(BrainError::UnknownSource(from.to_string()));
        };
        self.incoming[target]
            .iter()
            .map(|&id| &self.connectomes[id])
            .find(|c| c.source() == source)
            .ok_or_else(|| BrainError::UnknownSource(from.to_string()))
    }

    fn area_id(&self, name: &str) -> Result<usize, BrainError> {
        self.area_by_name
            .get(name)
            .copied()
            .ok_or_else(|| BrainError::UnknownArea(name.to_string()))
    }

    // ---- winner-set control ----------------------------------------------

    /// Freeze the area's current winner set. While fixed, `project` leaves
    /// the set untouched; the area still fires as a source.
    pub fn fix_assembly(&mut self, name: &str) -> Result<(), BrainError> {
        let id = self.area_id(name)?;
        if self.areas[id].winners.is_empty() {
            return Err(BrainError::AssemblyNotFormed(name.to_string()));
        }
        self.areas[id].fixed = true;
        Ok(())
    }

    /// Release a frozen winner set; the next round recomputes winners.
    pub fn unfix_assembly(&mut self, name: &str) -> Result<(), BrainError> {
        let id = self.area_id(name)?;
        self.areas[id].fixed = false;
        Ok(())
    }

    /// Inject an arbitrary firing pattern. Indices must be distinct,
    /// materialized, and at most `k` of them. Does not count as winning:
    /// `w` and the history logs are untouched.
    pub fn set_winners(&mut self, name: &str, winners: &[NeuronId]) -> Result<(), BrainError> {
        let id = self.area_id(name)?;
        let area = &self.areas[id];
        if winners.is_empty() {
            return Err(BrainError::InvalidParameter(format!(
                "area `{}`: cannot inject an empty winner set",
                name
            )));
        }
        if winners.len() as u32 > area.k {
            return Err(BrainError::InsufficientSupport {
                area: name.to_string(),
                requested: winners.len() as u32,
                available: area.k,
            });
        }
        let mut sorted = winners.to_vec();
        sorted.sort_unstable();
        if sorted.windows(2).any(|p| p[0] == p[1]) {
            return Err(BrainError::InvalidParameter(format!(
                "area `{}`: injected winners must be distinct",
                name
            )));
        }
        if let Some(&max) = sorted.last() {
            if max >= area.support {
                return Err(BrainError::InsufficientSupport {
                    area: name.to_string(),
                    requested: max + 1,
                    available: area.support,
                });
            }
        }
        self.areas[id].winners = sorted;
        Ok(())
    }

    /// Select the `index`-th disjoint block of `k` neurons as the winner
    /// set and freeze it. Intended for explicit areas acting as controlled
    /// signal sources.
    pub fn activate_assembly(&mut self, name: &str, index: u32) -> Result<(), BrainError> {
        let id = self.area_id(name)?;
        let area = &self.areas[id];
        let offset = index * area.k;
        if offset + area.k > area.support {
            return Err(BrainError::InsufficientSupport {
                area: name.to_string(),
                requested: offset + area.k,
                available: area.support,
            });
        }
        self.areas[id].winners = (offset..offset + area.k).collect();
        self.areas[id].fixed = true;
        Ok(())
    }

    /// Which disjoint `k`-block best matches the current winners, and how
    /// many winners fall inside it.
    pub fn read_assembly(&self, name: &str) -> Result<(u32, u32), BrainError> {
        let area = self.area(name)?;
        if area.winners.is_empty() {
            return Err(BrainError::AssemblyNotFormed(name.to_string()));
        }
        let num_assemblies = (area.n / area.k).max(1);
        let mut counts = vec![0u32; num_assemblies as usize];
        for &neuron in &area.winners {
            let block = (neuron / area.k).min(num_assemblies - 1);
            counts[block as usize] += 1;
        }
        let (best, &count) = counts
            .iter()
            .enumerate()
            .max_by_key(|&(i, &c)| (c, std::cmp::Reverse(i)))
            .unwrap_or((0, &0));
        Ok((best as u32, count))
    }

    // ---- projection ------------------------------------------------------

    /// Advance every target named in `projection` by exactly one round.
    ///
    /// All targets are computed against the pre-round winner state of every
    /// source, then committed together. Fixed targets are left untouched. A
    /// target whose active sources contribute no firing units this round is
    /// skipped.
    pub fn project(&mut self, projection: &Projection) -> Result<(), BrainError> {
        let num_areas = self.areas.len();
        let mut stim_in: Vec<Vec<usize>> = vec![Vec::new(); num_areas];
        let mut area_in: Vec<Vec<usize>> = vec![Vec::new(); num_areas];

        for (stim_name, targets) in &projection.from_stimuli {
            let stim = *self
                .stim_by_name
                .get(stim_name)
                .ok_or_else(|| BrainError::UnknownStimulus(stim_name.clone()))?;
            for target in targets {
                let t = self.area_id(target)?;
                if !stim_in[t].contains(&stim) {
                    stim_in[t].push(stim);
                }
            }
        }
        for (area_name, targets) in &projection.from_areas {
            let src = self.area_id(area_name)?;
            for target in targets {
                let t = self.area_id(target)?;
                if !area_in[t].contains(&src) {
                    area_in[t].push(src);
                }
            }
        }
        for lists in stim_in.iter_mut().chain(area_in.iter_mut()) {
            lists.sort_unstable();
        }

        let mut pending: Vec<(usize, Vec<NeuronId>)> = Vec::new();
        for t in 0..num_areas {
            if stim_in[t].is_empty() && area_in[t].is_empty() {
                continue;
            }
            if self.areas[t].fixed {
                trace!(area = %self.areas[t].name, "target is fixed, skipping");
                continue;
            }
            if let Some(new_winners) = self.project_into(t, &stim_in[t], &area_in[t]) {
                pending.push((t, new_winners));
            }
        }
        for (t, winners) in pending {
            self.areas[t].winners = winners;
        }
        self.round += 1;
        debug!(round = self.round, "projection round complete");
        Ok(())
    }

    /// Repeat the same projection graph for `rounds` rounds.
    pub fn project_rounds(&mut self, projection: &Projection, rounds: u32) -> Result<(), BrainError> {
        for _ in 0..rounds {
            self.project(projection)?;
        }
        Ok(())
    }

    /// Compute one round for a single non-fixed target. Returns the new
    /// winner set, or `None` when no source contributes any firing unit.
    fn project_into(
        &mut self,
        t: usize,
        stim_sources: &[usize],
        area_sources: &[usize],
    ) -> Option<Vec<NeuronId>> {
        // Active source sets, keyed by incoming-connectome id and resolved
        // in creation order. Winner sets are snapshotted here so the round
        // is computed against pre-round state throughout.
        let mut active: Vec<(usize, Vec<NeuronId>)> = Vec::new();
        for &conn_id in &self.incoming[t] {
            match self.connectomes[conn_id].source() {
                SourceId::Stimulus(s) if stim_sources.contains(&s) => {
                    active.push((conn_id, (0..self.stimuli[s].k).collect()));
                }
                SourceId::Area(a) if area_sources.contains(&a) => {
                    if !self.areas[a].winners.is_empty() {
                        active.push((conn_id, self.areas[a].winners.clone()));
                    }
                }
                _ => {}
            }
        }
        let total_k: u32 = active.iter().map(|(_, set)| set.len() as u32).sum();
        if total_k == 0 {
            return None;
        }

        let support_before = self.areas[t].support;
        let mut inputs = vec![0.0f32; support_before as usize];
        for (conn_id, set) in &active {
            self.connectomes[*conn_id].accumulate_inputs(set, &mut inputs);
        }
        let mut candidates: Vec<Synapse> = inputs
            .iter()
            .enumerate()
            .map(|(neuron, &weight)| Synapse {
                neuron: neuron as NeuronId,
                weight,
            })
            .collect();

        let k = self.areas[t].k as usize;
        let cmp = |a: &Synapse, b: &Synapse| {
            b.weight
                .total_cmp(&a.weight)
                .then_with(|| a.neuron.cmp(&b.neuron))
        };

        if !self.areas[t].is_explicit {
            // An unmaterialized neuron's input can reach at most `total_k`,
            // so the candidate machinery only runs when it could matter.
            let mut kth_known = f32::NEG_INFINITY;
            if candidates.len() >= k {
                candidates.select_nth_unstable_by(k - 1, cmp);
                kth_known = candidates[k - 1].weight;
            }
            let remaining = self.areas[t].n - support_before;
            if remaining > 0 && (candidates.len() < k || kth_known < total_k as f32) {
                self.generate_candidates(t, total_k, support_before, remaining, &mut candidates);
            }
        }

        let kk = k.min(candidates.len());
        if kk < candidates.len() {
            candidates.select_nth_unstable_by(kk - 1, cmp);
            candidates.truncate(kk);
        }
        // Deterministic processing order for materialization.
        candidates.sort_unstable_by(cmp);

        let mut new_winners: Vec<NeuronId> = Vec::with_capacity(kk);
        let mut num_new = 0u32;
        for cand in &candidates {
            if cand.neuron >= support_before {
                let new_id = support_before + num_new;
                let d = (cand.weight.round().max(0.0) as u32).min(total_k);
                self.connect_new_neuron(t, new_id, d, &active);
                num_new += 1;
                new_winners.push(new_id);
            } else {
                new_winners.push(cand.neuron);
            }
        }
        new_winners.sort_unstable();

        let num_first = if self.areas[t].is_explicit {
            let area = &mut self.areas[t];
            let mut first = 0u32;
            for &winner in &new_winners {
                if !area.ever_won[winner as usize] {
                    area.ever_won[winner as usize] = true;
                    first += 1;
                }
            }
            area.w += first;
            first
        } else {
            num_new
        };
        self.areas[t].num_first_winners = num_first;

        if self.plasticity_enabled {
            let support_now = self.areas[t].support as usize;
            let mut is_new = vec![false; support_now];
            for &winner in &new_winners {
                is_new[winner as usize] = true;
            }
            let learn_rate = 1.0 + self.areas[t].beta;
            let max_weight = self.cfg.max_weight;
            for (conn_id, set) in &active {
                self.connectomes[*conn_id].potentiate(set, &is_new, learn_rate, max_weight);
            }
        }

        let area = &mut self.areas[t];
        if area.track_size {
            area.saved_w.push(area.w);
        }
        if area.track_winners {
            area.saved_winners.push(new_winners.clone());
        }
        trace!(
            area = %area.name,
            winners = new_winners.len(),
            first_winners = num_first,
            w = area.w,
            "projected into area"
        );
        Some(new_winners)
    }

    /// Model the input of never-materialized neurons (implicit areas only).
    ///
    /// With few unmaterialized neurons left, draw each one's input directly
    /// from Binomial(total_k, p). Otherwise derive the input cutoff at the
    /// pool boundary from the binomial quantile and sample the pool from
    /// the truncated normal tail above it.
    fn generate_candidates(
        &mut self,
        t: usize,
        total_k: u32,
        support_before: u32,
        remaining: u32,
        candidates: &mut Vec<Synapse>,
    ) {
        let p = self.cfg.p;
        let k = self.areas[t].k;
        let pool = ((k as f32 * self.cfg.candidate_pool_factor).ceil() as u32).min(remaining);
        if remaining <= 2 * pool {
            for i in 0..remaining {
                let d = sampling::binomial_count(total_k as u64, p, &mut self.rng) as f32;
                candidates.push(Synapse {
                    neuron: support_before + i,
                    weight: d,
                });
            }
        } else {
            let percent = (remaining - pool) as f64 / remaining as f64;
            let cutoff = sampling::binom_quantile(total_k, p, percent) as f32;
            let mu = total_k as f32 * p;
            let stddev = (total_k as f32 * p * (1.0 - p)).sqrt();
            let a = (cutoff - mu) / stddev;
            trace!(
                area = %self.areas[t].name,
                pool,
                cutoff,
                mu,
                stddev,
                "generating tail candidates"
            );
            for i in 0..pool {
                let x = sampling::truncated_normal(a, &mut self.rng);
                let d = (x * stddev + mu).round().clamp(0.0, total_k as f32);
                candidates.push(Synapse {
                    neuron: support_before + i,
                    weight: d,
                });
            }
        }
    }

    /// Materialize a first-time winner: commit its sampled input as edges
    /// from active sources, draw Bernoulli(p) edges from every non-active
    /// materialized source neuron, and realize its outgoing rows.
    fn connect_new_neuron(
        &mut self,
        t: usize,
        new_neuron: NeuronId,
        num_from_active: u32,
        active: &[(usize, Vec<NeuronId>)],
    ) {
        self.choose_synapses_from_activated(new_neuron, num_from_active, active);
        self.choose_synapses_from_non_activated(t, new_neuron, active);
        self.choose_outgoing_synapses(t);
        self.areas[t].support += 1;
        self.areas[t].w += 1;
    }

    /// Distribute `d` weight-1 edges uniformly without replacement across
    /// the concatenated active source units.
    fn choose_synapses_from_activated(
        &mut self,
        new_neuron: NeuronId,
        d: u32,
        active: &[(usize, Vec<NeuronId>)],
    ) {
        let total_k: u32 = active.iter().map(|(_, set)| set.len() as u32).sum();
        let d = d.min(total_k);
        if d == 0 {
            return;
        }
        let mut offsets = Vec::with_capacity(active.len());
        let mut acc = 0u32;
        for (_, set) in active {
            offsets.push(acc);
            acc += set.len() as u32;
        }
        let mut taken = vec![false; total_k as usize];
        for _ in 0..d {
            let mut slot = self.rng.gen_range(0..total_k);
            while taken[slot as usize] {
                slot = self.rng.gen_range(0..total_k);
            }
            taken[slot as usize] = true;
            let bucket = offsets.partition_point(|&o| o <= slot) - 1;
            let (conn_id, set) = &active[bucket];
            let from = set[(slot - offsets[bucket]) as usize];
            self.connectomes[*conn_id].append_edge(from, new_neuron);
        }
    }

    /// Independent Bernoulli(p) edges from every materialized source neuron
    /// that is not firing this round, over all incoming connectomes, so the
    /// realized graph stays consistent with the random-graph model.
    fn choose_synapses_from_non_activated(
        &mut self,
        t: usize,
        new_neuron: NeuronId,
        active: &[(usize, Vec<NeuronId>)],
    ) {
        let incoming = self.incoming[t].clone();
        let p = self.cfg.p;
        for conn_id in incoming {
            let src_support = match self.connectomes[conn_id].source() {
                SourceId::Stimulus(s) => self.stimuli[s].k,
                SourceId::Area(a) => self.areas[a].support,
            };
            if src_support == 0 {
                continue;
            }
            let active_set: &[NeuronId] = active
                .iter()
                .find(|(c, _)| *c == conn_id)
                .map(|(_, set)| set.as_slice())
                .unwrap_or(&[]);
            let num_active = active_set.len() as u32;
            if num_active >= src_support {
                continue;
            }
            let mut marked = vec![false; src_support as usize];
            for &i in active_set {
                marked[i as usize] = true;
            }
            if src_support <= 2 * num_active {
                for from in 0..src_support {
                    if !marked[from as usize] && self.rng.gen_bool(p as f64) {
                        self.connectomes[conn_id].append_edge(from, new_neuron);
                    }
                }
            } else {
                let population = (src_support - num_active) as u64;
                let count = sampling::binomial_count(population, p, &mut self.rng);
                for _ in 0..count {
                    loop {
                        let from = self.rng.gen_range(0..src_support);
                        if marked[from as usize] {
                            continue;
                        }
                        marked[from as usize] = true;
                        self.connectomes[conn_id].append_edge(from, new_neuron);
                        break;
                    }
                }
            }
        }
    }

    /// Realize the new neuron's outgoing rows toward every registered area.
    /// The self-loop row spans the about-to-be-incremented support so the
    /// neuron can connect to itself.
    fn choose_outgoing_synapses(&mut self, t: usize) {
        let outgoing = self.outgoing_area[t].clone();
        for conn_id in outgoing {
            let to = self.connectomes[conn_id].target();
            let mut to_support = self.areas[to].support;
            if to == t {
                to_support += 1;
            }
            let row = sampling::bernoulli_row(to_support, self.cfg.p, &mut self.rng);
            self.connectomes[conn_id].push_row(row);
        }
    }

    // ---- inspection ------------------------------------------------------

    pub fn diagnostics(&self) -> Diagnostics {
        let synapses: usize = self.connectomes.iter().map(Connectome::synapse_count).sum();
        let rows: usize = self.connectomes.iter().map(Connectome::row_count).sum();
        let max_weight = self
            .connectomes
            .iter()
            .flat_map(|c| (0..c.row_count()).flat_map(move |r| c.row(r as NeuronId)))
            .map(|s| s.weight)
            .fold(0.0f32, f32::max);
        Diagnostics {
            areas: self.areas.len(),
            stimuli: self.stimuli.len(),
            connectomes: self.connectomes.len(),
            synapses,
            total_support: self.areas.iter().map(|a| a.support as u64).sum(),
            max_weight,
            rounds: self.round,
            memory_bytes: synapses * std::mem::size_of::<Synapse>()
                + rows * std::mem::size_of::<Vec<Synapse>>(),
        }
    }

    /// Emit per-area and per-connectome statistics at debug level.
    pub fn log_graph_stats(&self) {
        debug!(rounds = self.round, "graph stats");
        for area in &self.areas {
            if area.support == 0 {
                continue;
            }
            debug!(
                area = %area.name,
                support = area.support,
                w = area.w,
                winners = area.winners.len(),
                "area stats"
            );
        }
        for conn in &self.connectomes {
            if conn.row_count() == 0 {
                continue;
            }
            let beta = self.areas[conn.target()].beta;
            let low_threshold = (1.0 + beta).powi(10);
            let (low, mid, saturated) = conn.weight_bands(low_threshold, self.cfg.max_weight);
            debug!(
                from = self.source_name(conn.source()),
                to = %self.areas[conn.target()].name,
                synapses = conn.synapse_count(),
                low,
                mid,
                saturated,
                "connectome stats"
            );
        }
    }

    fn source_name(&self, source: SourceId) -> &str {
        match source {
            SourceId::Stimulus(s) => &self.stimuli[s].name,
            SourceId::Area(a) => &self.areas[a].name,
        }
    }
}
