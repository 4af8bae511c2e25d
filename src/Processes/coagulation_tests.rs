/////////////////////////////////////////////////////////////////////////////////////////////////
// TESTS
/////////////////////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use crate::Particles::particle::{Particle, PropId};
    use crate::Particles::particle_model::{Component, ParticleModel};
    use crate::Processes::coagulation::{
        CoagKernel, CoagWeightRule, Coagulation, SLIP_FLOW_TERMS, WEIGHTED_SLIP_FLOW_TERMS,
        free_molecular_kernel, free_molecular_majorant, select_majorant, slip_flow_kernel, transition_kernel,
    };
    use crate::Processes::mechanism::Mechanism;
    use crate::Processes::process_api::{EventOutcome, LocalGeometry, ParticleProcess};
    use crate::StochasticSolver::cell::Cell;
    use crate::StochasticSolver::gas_state::GasState;
    use crate::Utils::random::seeded_rng;
    use approx::assert_relative_eq;

    fn model() -> ParticleModel {
        ParticleModel::new(vec![Component::new("C", 0.012, 1800.0)], vec![])
    }

    fn gas(t: f64, p: f64) -> GasState {
        GasState::inert(t, p)
    }

    /// Cell with particles of 10..10^6 carbon units and the given weights
    fn cell_with(gas: GasState, weights: &[f64]) -> Cell {
        let m = model();
        let mut cell = Cell::new(gas, 64, 1e-12).unwrap();
        let mut rng = seeded_rng(3);
        for (i, w) in weights.iter().enumerate() {
            let units = 10f64.powf(1.0 + 5.0 * i as f64 / weights.len() as f64);
            let p = m.new_particle(0.0, &[units], &[], *w);
            cell.particles_mut().add(p, &mut rng);
        }
        cell
    }

    fn pair_sums(cell: &Cell, weighted: bool, kernel: impl Fn(&Particle, &Particle) -> f64) -> f64 {
        let ps = cell.particles().particles();
        let mut sum = 0.0;
        for (i, p1) in ps.iter().enumerate() {
            for (j, p2) in ps.iter().enumerate() {
                if i == j {
                    continue;
                }
                if weighted {
                    sum += kernel(p1, p2) * p2.stat_weight();
                } else if i < j {
                    sum += kernel(p1, p2);
                }
            }
        }
        sum / cell.sample_volume()
    }

    #[test]
    fn test_select_majorant_keeps_smaller_regime() {
        let mut terms = vec![1.0, 2.0, 3.0, 4.0, 50.0, 60.0];
        assert_eq!(select_majorant(&mut terms, 4), 10.0);
        assert_eq!(&terms[4..], &[0.0, 0.0]);
        assert_eq!(&terms[..4], &[1.0, 2.0, 3.0, 4.0]);

        let mut terms = vec![10.0, 20.0, 30.0, 40.0, 5.0, 6.0];
        assert_eq!(select_majorant(&mut terms, 4), 11.0);
        assert_eq!(&terms[..4], &[0.0; 4]);
        assert_eq!(&terms[4..], &[5.0, 6.0]);
    }

    #[test]
    fn test_transition_terms_match_pair_sums_in_both_regimes() {
        // atmospheric flame and compressed cold gas
        for g in [gas(1500.0, 101325.0), gas(300.0, 1e8)] {
            let cell = cell_with(g.clone(), &[1.0; 12]);
            let coag = Coagulation::transition();
            let mech = Mechanism::new(model()).with_process(coag.clone());
            let mut terms = vec![0.0; coag.term_count()];
            let total = coag.rate_terms(0.0, &cell, &mech, &LocalGeometry::default(), &mut terms);

            let sf = pair_sums(&cell, false, |a, b| slip_flow_kernel(a, b, &g));
            let fm = pair_sums(&cell, false, |a, b| free_molecular_majorant(a, b, &g));
            let truth = pair_sums(&cell, false, |a, b| transition_kernel(a, b, &g));
            assert_relative_eq!(total, sf.min(fm), max_relative = 1e-8);
            assert!(total >= truth);
            let kept_sf: f64 = terms[..SLIP_FLOW_TERMS].iter().sum();
            let kept_fm: f64 = terms[SLIP_FLOW_TERMS..].iter().sum();
            if sf > fm {
                assert_eq!(kept_sf, 0.0);
                assert_relative_eq!(kept_fm, fm, max_relative = 1e-8);
            } else {
                assert_eq!(kept_fm, 0.0);
                assert_relative_eq!(kept_sf, sf, max_relative = 1e-8);
            }
        }
    }

    #[test]
    fn test_weighted_transition_terms_match_weighted_pair_sums() {
        let g = gas(1200.0, 101325.0);
        let weights: Vec<f64> = (0..10).map(|i| 1.0 + i as f64).collect();
        let cell = cell_with(g.clone(), &weights);
        let coag = Coagulation::transition().weighted(CoagWeightRule::Mass);
        let mech = Mechanism::new(model()).with_process(coag.clone());
        assert_eq!(coag.term_count(), 11);
        let mut terms = vec![0.0; 11];
        let total = coag.rate_terms(0.0, &cell, &mech, &LocalGeometry::default(), &mut terms);
        let sf = pair_sums(&cell, true, |a, b| slip_flow_kernel(a, b, &g));
        let fm = pair_sums(&cell, true, |a, b| free_molecular_majorant(a, b, &g));
        assert_relative_eq!(total, sf.min(fm), max_relative = 1e-8);
        let zeroed = if sf > fm {
            &terms[..WEIGHTED_SLIP_FLOW_TERMS]
        } else {
            &terms[WEIGHTED_SLIP_FLOW_TERMS..]
        };
        assert!(zeroed.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_free_molecular_majorant_bounds_kernel() {
        let m = model();
        let g = gas(1800.0, 101325.0);
        for (a, b) in [(10.0, 10.0), (10.0, 1e5), (1e3, 3e6)] {
            let p1 = m.new_particle(0.0, &[a], &[], 1.0);
            let p2 = m.new_particle(0.0, &[b], &[], 1.0);
            assert!(free_molecular_majorant(&p1, &p2, &g) >= free_molecular_kernel(&p1, &p2, &g));
            assert!(transition_kernel(&p1, &p2, &g) <= slip_flow_kernel(&p1, &p2, &g));
        }
    }

    #[test]
    fn test_constant_kernel_rates() {
        let g = gas(1500.0, 101325.0);
        let cell = cell_with(g, &[2.0; 8]);
        let vol = cell.sample_volume();
        let geom = LocalGeometry::default();

        let coag = Coagulation::new("const", CoagKernel::Constant { k: 1e-15 });
        let mech = Mechanism::new(model()).with_process(coag.clone());
        assert_relative_eq!(coag.rate(0.0, &cell, &mech, &geom), 0.5 * 1e-15 * 8.0 * 7.0 / vol);

        let coag = coag.weighted(CoagWeightRule::Half);
        let mech = Mechanism::new(model()).with_process(coag.clone());
        assert_relative_eq!(coag.rate(0.0, &cell, &mech, &geom), 1e-15 * 7.0 * 16.0 / vol);

        let add = Coagulation::new("add", CoagKernel::Additive { k: 2.0 });
        let mech = Mechanism::new(model()).with_process(add.clone());
        let mass = cell.particles().get_sum(PropId::Mass);
        assert_relative_eq!(add.rate(0.0, &cell, &mech, &geom), 2.0 * 7.0 * mass / vol);
    }

    #[test]
    fn test_no_rate_below_two_particles() {
        let cell = cell_with(gas(1500.0, 101325.0), &[1.0]);
        let coag = Coagulation::transition();
        let mech = Mechanism::new(model()).with_process(coag.clone());
        assert_eq!(coag.rate(0.0, &cell, &mech, &LocalGeometry::default()), 0.0);
    }

    #[test]
    fn test_weight_rules() {
        assert_eq!(CoagWeightRule::KeepFirst.new_weight(4.0, 2.0, 1.0, 3.0), 4.0);
        assert_relative_eq!(CoagWeightRule::Harmonic.new_weight(4.0, 2.0, 1.0, 3.0), 8.0 / 6.0);
        assert_eq!(CoagWeightRule::Half.new_weight(4.0, 2.0, 1.0, 3.0), 2.0);
        assert_eq!(CoagWeightRule::Mass.new_weight(4.0, 2.0, 1.0, 3.0), 1.0);
    }

    #[test]
    fn test_unweighted_event_merges_pair_and_conserves_mass() {
        let mut cell = cell_with(gas(1500.0, 101325.0), &[1.0; 20]);
        let coag = Coagulation::new("const", CoagKernel::Constant { k: 1e-15 });
        let mech = Mechanism::new(model()).with_process(coag);
        let mut rng = seeded_rng(11);
        let mass0 = cell.particles().get_sum(PropId::Mass);
        for expected in (10..20).rev() {
            let out = mech
                .do_process(0, 1e-3, &mut cell, &LocalGeometry::default(), &mut rng)
                .unwrap();
            assert_eq!(out, EventOutcome::Performed);
            assert_eq!(cell.particle_count(), expected);
        }
        assert_relative_eq!(cell.particles().get_sum(PropId::Mass), mass0, max_relative = 1e-12);
        let coagulated: u32 = cell.particles().iter().map(|p| p.coag_count()).sum();
        assert!(coagulated >= 1);
        assert_eq!(cell.counters().performed()[0], 10);
    }

    #[test]
    fn test_weighted_event_keeps_count_and_weighted_mass() {
        let weights: Vec<f64> = (0..16).map(|i| 1.0 + 0.5 * i as f64).collect();
        let mut cell = cell_with(gas(1500.0, 101325.0), &weights);
        let coag = Coagulation::new("const", CoagKernel::Constant { k: 1e-15 }).weighted(CoagWeightRule::Mass);
        let mech = Mechanism::new(model()).with_process(coag);
        assert!(mech.is_weighted_coag());
        let weighted_mass = |c: &Cell| c.particles().iter().map(|p| p.stat_weight() * p.mass()).sum::<f64>();
        let wm0 = weighted_mass(&cell);
        let mut rng = seeded_rng(5);
        for _ in 0..25 {
            mech.do_process(0, 0.0, &mut cell, &LocalGeometry::default(), &mut rng)
                .unwrap();
            assert_eq!(cell.particle_count(), 16);
        }
        assert_relative_eq!(weighted_mass(&cell), wm0, max_relative = 1e-10);
    }

    #[test]
    fn test_transition_events_are_performed_or_fictitious() {
        let mut cell = cell_with(gas(1500.0, 101325.0), &[1.0; 30]);
        let coag = Coagulation::transition();
        let mech = Mechanism::new(model()).with_process(coag.clone());
        let mut rng = seeded_rng(8);
        let geom = LocalGeometry::default();
        let mut terms = Vec::new();
        for _ in 0..15 {
            mech.calc_jump_rate_terms(0.0, &cell, &geom, &mut terms);
            let term = terms.iter().position(|x| *x > 0.0).unwrap();
            mech.do_process(term, 0.0, &mut cell, &geom, &mut rng).unwrap();
        }
        let counters = cell.counters();
        assert_eq!(counters.total_performed() + counters.total_fictitious(), 15);
        assert_eq!(cell.particle_count() as u64, 30 - counters.total_performed());

        let err = coag
            .perform(0.0, &mut cell, 6, &mech, &geom, &mut rng)
            .unwrap_err();
        assert_eq!(err.status(), -1);
    }
}
