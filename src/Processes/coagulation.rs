//! # Coagulation
//!
//! ## Majorant rates
//! The transition-regime kernel `K = K_fm K_sf / (K_fm + K_sf)` cannot be summed over all pairs
//! cheaply. It is bounded from above by either regime kernel, and each regime kernel expands
//! into products of ensemble sums:
//!
//! - slip flow, `K_sf = (2kT/3mu) (d1 + d2) (1/d1 + 1/d2 + 1.257 Kn_l (1/d1^2 + 1/d2^2))`:
//!   four terms (seven with statistical weights)
//! - free molecular majorant, `K_fm^ = 1.4178 e_fm CFM sqrt(T) (m1^-1/2 + m2^-1/2)(d1^2 + d2^2)`:
//!   two terms (four with statistical weights)
//!
//! Both regime totals are computed and only the smaller one is kept; the other regime's terms
//! are set to zero. Any of the two bounds the true kernel, so the smaller total is the
//! tighter majorant and gives fewer fictitious events.
//!
//! ## Events
//! Each term says how the pair is sampled: the first particle with probability proportional
//! to one property, the second proportional to another (redrawn until distinct). The pair is
//! then accepted with probability `K_true / K_majorant`.
//!
//! Without statistical weights both particles merge into one. With weights (SWA) only the
//! first particle takes up the second particle's mass and gets a new weight from the
//! `CoagWeightRule`; the second particle is unchanged.
use crate::Particles::ensemble::Selection;
use crate::Particles::particle::{Particle, PropId, PropertyCache};
use crate::Processes::mechanism::Mechanism;
use crate::Processes::process_api::{EventOutcome, LocalGeometry, ParticleProcess, ProcessError};
use crate::StochasticSolver::cell::Cell;
use crate::StochasticSolver::gas_state::GasState;
use crate::Utils::constants::{CFM, CFMMAJ, CSF, CUNNINGHAM_A, EFM};
use crate::Utils::random::uniform01;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Redraws allowed when the second particle coincides with the first
const MAX_PAIR_REDRAWS: usize = 1000;

/// Statistical weight of the coagulated particle in weighted coagulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoagWeightRule {
    /// w1
    KeepFirst,
    /// w1 w2 / (w1 + w2)
    Harmonic,
    /// w1 / 2
    Half,
    /// w1 m1 / (m1 + m2)
    Mass,
}

impl CoagWeightRule {
    pub fn new_weight(&self, w1: f64, w2: f64, m1: f64, m2: f64) -> f64 {
        match self {
            CoagWeightRule::KeepFirst => w1,
            CoagWeightRule::Harmonic => w1 * w2 / (w1 + w2),
            CoagWeightRule::Half => 0.5 * w1,
            CoagWeightRule::Mass => w1 * m1 / (m1 + m2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CoagKernel {
    /// free-molecular / slip-flow transition kernel
    Transition,
    /// K = k
    Constant { k: f64 },
    /// K = k (m1 + m2)
    Additive { k: f64 },
}

/// Regime of a majorant term
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regime {
    SlipFlow,
    FreeMolecular,
    /// the majorant equals the kernel, no rejection needed
    Exact,
}

type TermSpec = (PropId, PropId, Regime);

use PropId::*;
use Regime::{Exact, FreeMolecular, SlipFlow};

pub const SLIP_FLOW_TERMS: usize = 4;
pub const WEIGHTED_SLIP_FLOW_TERMS: usize = 7;

const TRANSITION_TERMS: [TermSpec; 6] = [
    (Count, Count, SlipFlow),
    (Diameter, InvDiameter, SlipFlow),
    (InvDiameter, Count, SlipFlow),
    (Diameter, InvDiameterSq, SlipFlow),
    (DiameterSqInvSqrtMass, Count, FreeMolecular),
    (InvSqrtMass, DiameterSq, FreeMolecular),
];

const WEIGHTED_TRANSITION_TERMS: [TermSpec; 11] = [
    (Count, Weight, SlipFlow),
    (Diameter, WeightInvDiameter, SlipFlow),
    (InvDiameter, WeightDiameter, SlipFlow),
    (Count, WeightInvDiameter, SlipFlow),
    (Diameter, WeightInvDiameterSq, SlipFlow),
    (InvDiameterSq, WeightDiameter, SlipFlow),
    (InvDiameter, Weight, SlipFlow),
    (Count, WeightDiameterSqInvSqrtMass, FreeMolecular),
    (DiameterSq, WeightInvSqrtMass, FreeMolecular),
    (InvSqrtMass, WeightDiameterSq, FreeMolecular),
    (DiameterSqInvSqrtMass, Weight, FreeMolecular),
];

const CONSTANT_TERMS: [TermSpec; 1] = [(Count, Count, Exact)];
const WEIGHTED_CONSTANT_TERMS: [TermSpec; 1] = [(Count, Weight, Exact)];
const ADDITIVE_TERMS: [TermSpec; 1] = [(Mass, Count, Exact)];

/// Keeps the regime with the smaller total and zeroes the other one.
/// `terms[..n_sf]` are slip-flow terms, the rest free-molecular. Returns the kept total.
pub fn select_majorant(terms: &mut [f64], n_sf: usize) -> f64 {
    let (sf_terms, fm_terms) = terms.split_at_mut(n_sf);
    let sf: f64 = sf_terms.iter().sum();
    let fm: f64 = fm_terms.iter().sum();
    if sf > fm {
        sf_terms.iter_mut().for_each(|x| *x = 0.0);
        fm
    } else {
        fm_terms.iter_mut().for_each(|x| *x = 0.0);
        sf
    }
}

/// Majorant rate terms of the transition kernel from population sums.
/// `a` multiplies the kernel, `vol` is the sample volume. Returns the kept total.
pub fn transition_majorant_terms(
    sums: &PropertyCache,
    gas: &GasState,
    vol: f64,
    a: f64,
    weighted: bool,
    terms: &mut [f64],
) -> f64 {
    let s = |id: PropId| sums[id.index()];
    let n = s(Count);
    if n < 2.0 || !(vol > 0.0) {
        terms.iter_mut().for_each(|x| *x = 0.0);
        return 0.0;
    }
    let t = gas.temperature();
    let a_sf = a * CSF * t / gas.viscosity() / vol;
    let b_sf = a_sf * gas.knudsen_length() * CUNNINGHAM_A;
    let c_fm = a * CFMMAJ * EFM * CFM * t.sqrt() / vol;
    let (d, d2, d_1, d_2) = (s(Diameter), s(DiameterSq), s(InvDiameter), s(InvDiameterSq));
    let (m_1_2, d2m_1_2) = (s(InvSqrtMass), s(DiameterSqInvSqrtMass));
    if weighted {
        let (w, dw, d2w) = (s(Weight), s(WeightDiameter), s(WeightDiameterSq));
        let (d_1w, d_2w) = (s(WeightInvDiameter), s(WeightInvDiameterSq));
        let (m_1_2w, d2m_1_2w) = (s(WeightInvSqrtMass), s(WeightDiameterSqInvSqrtMass));
        terms[0] = 2.0 * (n - 1.0) * w * a_sf;
        terms[1] = (d * d_1w - w) * a_sf;
        terms[2] = (dw * d_1 - w) * a_sf;
        terms[3] = (n - 1.0) * d_1w * b_sf;
        terms[4] = (d * d_2w - d_1w) * b_sf;
        terms[5] = (dw * d_2 - d_1w) * b_sf;
        terms[6] = (d_1 * w - d_1w) * b_sf;
        terms[7] = (n - 1.0) * d2m_1_2w * c_fm;
        terms[8] = (d2 * m_1_2w - d2m_1_2w) * c_fm;
        terms[9] = (d2w * m_1_2 - d2m_1_2w) * c_fm;
        terms[10] = (d2m_1_2 * w - d2m_1_2w) * c_fm;
    } else {
        terms[0] = n * (n - 1.0) * a_sf;
        terms[1] = (d * d_1 - n) * a_sf;
        terms[2] = (n - 1.0) * d_1 * b_sf;
        terms[3] = (d * d_2 - d_1) * b_sf;
        terms[4] = (n - 1.0) * d2m_1_2 * c_fm;
        terms[5] = (m_1_2 * d2 - d2m_1_2) * c_fm;
    }
    // rounding can push differences of nearly equal products below zero
    for x in terms.iter_mut() {
        if !(*x > 0.0) {
            *x = 0.0;
        }
    }
    let n_sf = if weighted {
        WEIGHTED_SLIP_FLOW_TERMS
    } else {
        SLIP_FLOW_TERMS
    };
    select_majorant(terms, n_sf)
}

/// Slip-flow kernel, m3/s
pub fn slip_flow_kernel(p1: &Particle, p2: &Particle, gas: &GasState) -> f64 {
    let (d1, d2) = (p1.coll_diameter(), p2.coll_diameter());
    if d1 <= 0.0 || d2 <= 0.0 {
        return 0.0;
    }
    let t = gas.temperature();
    let cunningham = CUNNINGHAM_A * gas.knudsen_length() * (1.0 / (d1 * d1) + 1.0 / (d2 * d2));
    (cunningham + 1.0 / d1 + 1.0 / d2) * CSF * t * (d1 + d2) / gas.viscosity()
}

/// Free-molecular kernel, m3/s
pub fn free_molecular_kernel(p1: &Particle, p2: &Particle, gas: &GasState) -> f64 {
    let (m1, m2) = (p1.mass(), p2.mass());
    if m1 <= 0.0 || m2 <= 0.0 {
        return 0.0;
    }
    let (d1, d2) = (p1.coll_diameter(), p2.coll_diameter());
    EFM * CFM * (gas.temperature() * (1.0 / m1 + 1.0 / m2)).sqrt() * (d1 + d2).powi(2)
}

/// Majorant of the free-molecular kernel matching the free-molecular rate terms, m3/s
pub fn free_molecular_majorant(p1: &Particle, p2: &Particle, gas: &GasState) -> f64 {
    let (m1, m2) = (p1.mass(), p2.mass());
    if m1 <= 0.0 || m2 <= 0.0 {
        return 0.0;
    }
    let (d1, d2) = (p1.coll_diameter(), p2.coll_diameter());
    CFMMAJ * EFM * CFM * gas.temperature().sqrt() * (1.0 / m1.sqrt() + 1.0 / m2.sqrt()) * (d1 * d1 + d2 * d2)
}

/// Transition-regime kernel: harmonic combination of both regimes, m3/s
pub fn transition_kernel(p1: &Particle, p2: &Particle, gas: &GasState) -> f64 {
    let fm = free_molecular_kernel(p1, p2, gas);
    let sf = slip_flow_kernel(p1, p2, gas);
    if fm + sf > 0.0 { fm * sf / (fm + sf) } else { 0.0 }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coagulation {
    name: String,
    a: f64,
    kernel: CoagKernel,
    weight_rule: Option<CoagWeightRule>,
}

impl Coagulation {
    pub fn new(name: &str, kernel: CoagKernel) -> Self {
        Self {
            name: name.to_string(),
            a: 1.0,
            kernel,
            weight_rule: None,
        }
    }
    /// Transition-regime coagulation with unit multiplier
    pub fn transition() -> Self {
        Self::new("coagulation", CoagKernel::Transition)
    }
    /// Multiplier of the kernel
    pub fn with_multiplier(mut self, a: f64) -> Self {
        self.a = a;
        self
    }
    /// Enables weighted coagulation with the given weight rule
    pub fn weighted(mut self, rule: CoagWeightRule) -> Self {
        self.weight_rule = Some(rule);
        self
    }
    pub fn kernel(&self) -> CoagKernel {
        self.kernel
    }
    pub fn weight_rule(&self) -> Option<CoagWeightRule> {
        self.weight_rule
    }
    pub fn is_weighted(&self) -> bool {
        self.weight_rule.is_some()
    }

    fn term_specs(&self) -> &'static [TermSpec] {
        match (self.kernel, self.is_weighted()) {
            (CoagKernel::Transition, false) => &TRANSITION_TERMS,
            (CoagKernel::Transition, true) => &WEIGHTED_TRANSITION_TERMS,
            (CoagKernel::Constant { .. }, false) => &CONSTANT_TERMS,
            (CoagKernel::Constant { .. }, true) => &WEIGHTED_CONSTANT_TERMS,
            (CoagKernel::Additive { .. }, _) => &ADDITIVE_TERMS,
        }
    }

    /// Kernel value the rate terms of `regime` are built from (without weights)
    pub fn majorant_kernel(&self, p1: &Particle, p2: &Particle, gas: &GasState, regime: Regime) -> f64 {
        match regime {
            Regime::SlipFlow => self.a * slip_flow_kernel(p1, p2, gas),
            Regime::FreeMolecular => self.a * free_molecular_majorant(p1, p2, gas),
            Regime::Exact => self.true_kernel(p1, p2, gas),
        }
    }

    /// Physical kernel (without weights)
    pub fn true_kernel(&self, p1: &Particle, p2: &Particle, gas: &GasState) -> f64 {
        match self.kernel {
            CoagKernel::Transition => self.a * transition_kernel(p1, p2, gas),
            CoagKernel::Constant { k } => self.a * k,
            CoagKernel::Additive { k } => self.a * k * (p1.mass() + p2.mass()),
        }
    }

    fn same_particle(cell: &Cell, s1: Selection, s2: Selection) -> bool {
        match (s1, s2) {
            (Selection::Explicit(i), Selection::Explicit(j)) => i == j,
            (Selection::Pn(k), Selection::Pn(l)) => k == l && cell.particles().pn().count(k) < 2,
            _ => false,
        }
    }

    /// Copy of the selected particle, brought up to time `t` by deferred processes.
    /// None if the particle became invalid.
    fn fetch(
        &self,
        t: f64,
        cell: &mut Cell,
        mech: &Mechanism,
        selection: Selection,
        rng: &mut dyn RngCore,
    ) -> Result<Option<Particle>, ProcessError> {
        match selection {
            Selection::Explicit(i) => {
                if mech.any_deferred() && !mech.update_particle(cell, i, t, rng)? {
                    return Ok(None);
                }
                Ok(cell.particles().particle(i).cloned())
            }
            Selection::Pn(k) => Ok(cell.particles().pn().particle_of_class(k, t)),
        }
    }

    fn coagulate_pair(
        &self,
        t: f64,
        cell: &mut Cell,
        mech: &Mechanism,
        regime: Regime,
        s1: Selection,
        s2: Selection,
        rng: &mut dyn RngCore,
    ) -> Result<EventOutcome, ProcessError> {
        let p1 = self.fetch(t, cell, mech, s1, rng)?;
        let p2 = self.fetch(t, cell, mech, s2, rng)?;
        let (Some(p1), Some(p2)) = (p1, p2) else {
            // deferred processes consumed one of the particles
            cell.particles_mut().remove_invalids();
            return Ok(EventOutcome::Fictitious);
        };

        let w2 = if self.is_weighted() { p2.stat_weight() } else { 1.0 };
        if regime != Regime::Exact {
            let majorant = self.majorant_kernel(&p1, &p2, cell.gas(), regime) * w2;
            let true_rate = self.true_kernel(&p1, &p2, cell.gas()) * w2;
            if !(majorant > 0.0) || uniform01(rng) * majorant > true_rate {
                return Ok(EventOutcome::Fictitious);
            }
        }

        let model = mech.particle_model();
        let coalesce = !mech.is_aggregating();
        let mut merged = p1.clone();
        merged.coagulate(&p2, model, coalesce);
        merged.set_time(t);

        match self.weight_rule {
            Some(rule) => {
                merged.set_stat_weight(rule.new_weight(p1.stat_weight(), p2.stat_weight(), p1.mass(), p2.mass()));
                match s1 {
                    Selection::Explicit(i) => cell.particles_mut().replace(i, merged),
                    Selection::Pn(k) => {
                        cell.particles_mut().pn_mut().remove(k);
                        mech.add_particle_to_cell(cell, merged, rng);
                    }
                }
            }
            None => {
                remove_selections(cell, s1, s2);
                mech.add_particle_to_cell(cell, merged, rng);
            }
        }
        Ok(EventOutcome::Performed)
    }
}

/// Removes two distinct selected particles; the higher explicit index goes first so the
/// lower one stays valid.
fn remove_selections(cell: &mut Cell, s1: Selection, s2: Selection) {
    let ens = cell.particles_mut();
    let mut explicit = Vec::with_capacity(2);
    for s in [s1, s2] {
        match s {
            Selection::Explicit(i) => explicit.push(i),
            Selection::Pn(k) => {
                ens.pn_mut().remove(k);
            }
        }
    }
    explicit.sort_unstable_by(|a, b| b.cmp(a));
    for i in explicit {
        ens.remove(i);
    }
}

impl ParticleProcess for Coagulation {
    fn name(&self) -> &str {
        &self.name
    }
    fn term_count(&self) -> usize {
        self.term_specs().len()
    }
    fn is_deferred(&self) -> bool {
        false
    }

    fn rate_terms(
        &self,
        _t: f64,
        cell: &Cell,
        _mech: &Mechanism,
        _geom: &LocalGeometry,
        terms: &mut [f64],
    ) -> f64 {
        let sums = cell.particles().combined_sums();
        let vol = cell.sample_volume();
        let n = sums[Count.index()];
        match self.kernel {
            CoagKernel::Transition => {
                transition_majorant_terms(&sums, cell.gas(), vol, self.a, self.is_weighted(), terms)
            }
            _ if n < 2.0 || !(vol > 0.0) => {
                terms[0] = 0.0;
                0.0
            }
            CoagKernel::Constant { k } => {
                terms[0] = if self.is_weighted() {
                    self.a * k * (n - 1.0) * sums[Weight.index()] / vol
                } else {
                    0.5 * self.a * k * n * (n - 1.0) / vol
                };
                terms[0]
            }
            CoagKernel::Additive { k } => {
                terms[0] = self.a * k * (n - 1.0) * sums[Mass.index()] / vol;
                terms[0]
            }
        }
    }

    fn perform(
        &self,
        t: f64,
        cell: &mut Cell,
        term: usize,
        mech: &Mechanism,
        _geom: &LocalGeometry,
        rng: &mut dyn RngCore,
    ) -> Result<EventOutcome, ProcessError> {
        let Some(&(prop1, prop2, regime)) = self.term_specs().get(term) else {
            return Err(ProcessError::UnknownTerm {
                process: self.name.clone(),
                term,
            });
        };
        if cell.total_particle_number() < 2 {
            return Ok(EventOutcome::Fictitious);
        }
        let Some(s1) = cell.particles().select_combined(prop1, rng) else {
            return Ok(EventOutcome::Fictitious);
        };
        let mut s2 = None;
        for _ in 0..MAX_PAIR_REDRAWS {
            match cell.particles().select_combined(prop2, rng) {
                Some(s) if !Self::same_particle(cell, s1, s) => {
                    s2 = Some(s);
                    break;
                }
                Some(_) => continue,
                None => break,
            }
        }
        let Some(s2) = s2 else {
            return Ok(EventOutcome::Fictitious);
        };

        cell.particles_mut().freeze_doubling();
        let outcome = self.coagulate_pair(t, cell, mech, regime, s1, s2, rng);
        cell.particles_mut().unfreeze_doubling();
        outcome
    }
}
