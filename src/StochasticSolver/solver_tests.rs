/////////////////////////////////////////////////////////////////////////////////////////////////
// TESTS
/////////////////////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use crate::Particles::particle::PropId;
    use crate::Particles::particle_model::{Component, ParticleModel};
    use crate::Processes::coagulation::{CoagKernel, CoagWeightRule, Coagulation};
    use crate::Processes::inception::Inception;
    use crate::Processes::mechanism::Mechanism;
    use crate::Processes::sintering::Sintering;
    use crate::Processes::sintering_model::{SinteringModel, SinteringType};
    use crate::Processes::surface_reaction::SurfaceReaction;
    use crate::Processes::transport::Outflow;
    use crate::StochasticSolver::cell::Cell;
    use crate::StochasticSolver::gas_state::{GasState, TabulatedGasProfile};
    use crate::StochasticSolver::solver::{DEFAULT_SPLIT_RATIO, Solver, SolverError, StatsRecorder};
    use crate::StochasticSolver::weight_scaling::{InceptionWeighting, WeightScalingFn};
    use crate::Utils::random::{RngType, exponential_deviate, seeded_rng, uniform01};
    use approx::assert_relative_eq;

    fn model() -> ParticleModel {
        ParticleModel::new(vec![Component::new("C", 0.012, 1800.0)], vec![])
    }

    fn gas() -> GasState {
        GasState::inert(1500.0, 101325.0)
    }

    /// Births at `i` per m3 per s, constant coagulation kernel `k` m3/s
    fn birth_coag(i: f64, k: f64, units: f64) -> Mechanism {
        Mechanism::new(model())
            .with_process(Inception::new("birth", i, vec![units]))
            .with_process(Coagulation::new("coag", CoagKernel::Constant { k }))
    }

    #[test]
    fn test_choose_index_frequencies() {
        let rates = [1.0, 2.0, 0.0, 7.0];
        let mut rng = seeded_rng(42);
        let mut hits = [0usize; 4];
        let draws = 100_000;
        for _ in 0..draws {
            hits[Solver::choose_index(&rates, &mut rng).unwrap()] += 1;
        }
        assert_eq!(hits[2], 0);
        for (h, r) in hits.iter().zip(rates.iter()) {
            assert!((*h as f64 / draws as f64 - r / 10.0).abs() < 0.01);
        }
        assert_eq!(Solver::choose_index(&[0.0, 0.0], &mut rng), None);
        assert_eq!(Solver::choose_index(&[], &mut rng), None);
        assert_eq!(Solver::choose_index(&[0.0, 3.0, 0.0], &mut rng), Some(1));
    }

    #[test]
    fn test_split_time() {
        let solver = Solver::default();
        assert_eq!(solver.split_ratio(), DEFAULT_SPLIT_RATIO);
        assert_eq!(solver.calc_split_time(0.5, 2.0, 0.0, 100), 2.0);
        let solver = Solver::new(1.0);
        assert_relative_eq!(solver.calc_split_time(0.0, 10.0, 99.0, 9), 0.1);
        assert_eq!(solver.calc_split_time(0.0, 0.05, 99.0, 9), 0.05);
        // a step below the resolution of t still moves the split time forward
        let solver = Solver::new(1e-30);
        let ts = solver.calc_split_time(1e6, 2e6, 1e3, 0);
        assert!(ts > 1e6 && ts < 2e6);
        assert_eq!(solver.calc_split_time(2e6, 2e6, 1e3, 0), 2e6);
    }

    #[test]
    fn test_unresolvable_split_steps_keep_resynchronising() {
        let mech = birth_coag(1000.0, 1e-3, 1000.0).with_process(
            SurfaceReaction::new("growth", 1e17, 0.0, 0.0, vec![1.0], PropId::Surface).deferred(true),
        );
        let solver = Solver::new(1e-30);
        let mut cell = Cell::new(gas(), 64, 1.0).unwrap();
        let m = model();
        let (t0, tstop) = (1e3, 1e3 + 1e-11);
        cell.set_particles((0..4).map(|_| m.new_particle(t0, &[1000.0], &[], 1.0)).collect(), 1.0);
        let mut rng = seeded_rng(17);
        let summary = solver.run(t0, tstop, &mut cell, &mech, &mut rng).unwrap();
        assert_eq!(summary.t_end, tstop);
        assert!(summary.splits > 10);
        assert!(cell.particles().iter().all(|p| p.last_update_time() == tstop));
    }

    #[test]
    fn test_run_ends_exactly_at_tstop() {
        let solver = Solver::default();
        let mech = birth_coag(1e3, 1e-2, 10.0);
        let mut cell = Cell::new(gas(), 512, 1.0).unwrap();
        let mut rng = seeded_rng(1);
        let mut t = 0.0;
        for tstop in [0.01, 0.013, 0.1, 0.1, 0.25] {
            let summary = solver.run(t, tstop, &mut cell, &mech, &mut rng).unwrap();
            assert_eq!(summary.t_end, tstop);
            assert!(summary.t_end >= t);
            assert_eq!(summary.status(), 0);
            t = summary.t_end;
        }
        assert!(cell.particle_count() > 0);
        // every particle was made at or before the end of the run
        assert!(cell.particles().iter().all(|p| p.create_time() <= 0.25));

        let empty = Mechanism::new(model());
        let summary = solver.run(0.0, 5.0, &mut cell, &empty, &mut rng).unwrap();
        assert_eq!(summary.t_end, 5.0);
        assert_eq!(summary.events, 0);
    }

    #[test]
    fn test_invalid_interval() {
        let solver = Solver::default();
        let mut cell = Cell::new(gas(), 16, 1.0).unwrap();
        let mut rng = seeded_rng(1);
        let err = solver
            .run(1.0, 0.5, &mut cell, &Mechanism::new(model()), &mut rng)
            .unwrap_err();
        assert!(matches!(err, SolverError::InvalidInterval { .. }));
        assert!(err.status() < 0);
    }

    fn gillespie_birth_coag(births: f64, k_over_v: f64, tstop: f64, rng: &mut RngType) -> f64 {
        let mut t = 0.0;
        let mut n = 0.0f64;
        loop {
            let coag = 0.5 * k_over_v * n * (n - 1.0);
            let total = births + coag;
            let dt = exponential_deviate(total, rng);
            if t + dt > tstop {
                return n;
            }
            t += dt;
            if uniform01(rng) * total < births {
                n += 1.0;
            } else {
                n -= 1.0;
            }
        }
    }

    #[test]
    fn test_birth_coagulation_matches_analytic_and_direct_simulation() {
        // dN/dt = I - K N^2 / 2  =>  N = sqrt(2I/K) tanh(t sqrt(IK/2))
        let (i, k, vol) = (1000.0f64, 1.0f64, 10.0f64);
        let n_inf = (2.0 * i / k).sqrt();
        let rate = (i * k / 2.0f64).sqrt();
        let mech = birth_coag(i, k, 10.0);
        let solver = Solver::default();
        let runs = 10;
        for tstop in [0.05, 0.2] {
            let analytic = n_inf * (tstop * rate).tanh();
            let mut mean = 0.0;
            let mut reference = 0.0;
            for seed in 0..runs {
                let mut rng = seeded_rng(100 + seed);
                let mut cell = Cell::new(gas(), 1024, vol).unwrap();
                solver.run(0.0, tstop, &mut cell, &mech, &mut rng).unwrap();
                mean += cell.stats().number_density / runs as f64;
                assert_eq!(cell.particles().contraction_count(), 0);

                let mut rng = seeded_rng(500 + seed);
                reference += gillespie_birth_coag(i * vol, k / vol, tstop, &mut rng) / vol / runs as f64;
            }
            assert_relative_eq!(mean, analytic, max_relative = 0.05);
            assert_relative_eq!(mean, reference, max_relative = 0.07);
        }
    }

    #[test]
    fn test_adaptive_inception_weight_grows_with_ensemble() {
        let mut mech = Mechanism::new(model())
            .with_process(Inception::new("birth", 1000.0, vec![10.0]))
            .with_process(Coagulation::new("coag", CoagKernel::Constant { k: 1e-6 }).weighted(CoagWeightRule::KeepFirst));
        mech.set_inception_weighting(InceptionWeighting::new(1.0, 4.0, 8.0, WeightScalingFn::Linear));
        let solver = Solver::default();
        let mut cell = Cell::new(gas(), 64, 1.0).unwrap();
        let mut rng = seeded_rng(12);
        let mut t = 0.0;
        for _ in 0..20 {
            t = solver.run(t, t + 0.01, &mut cell, &mech, &mut rng).unwrap().t_end;
        }
        assert!(cell.particle_count() > 8);
        let w = cell.incepting_weight();
        assert!(w > 1.0 && w <= 4.0, "incepting weight {w}");
        assert!(cell.particles().iter().all(|p| p.stat_weight() >= 1.0));
        assert!(cell.particles().iter().any(|p| p.stat_weight() > 1.0));
    }

    #[test]
    fn test_hybrid_run_conserves_units() {
        let mut mech = birth_coag(1000.0, 1.0, 10.0);
        mech.set_hybrid(50);
        let solver = Solver::default();
        let mut cell = Cell::new(gas(), 1024, 1.0).unwrap();
        solver.initialise_pn_particles(0.0, &mut cell, &mech);
        let mut rng = seeded_rng(77);
        solver.run(0.0, 1.0, &mut cell, &mech, &mut rng).unwrap();

        let births = cell.counters().performed()[0] as f64;
        let pn = cell.particles().pn();
        let pn_units: f64 = pn.counts().iter().enumerate().map(|(k, c)| k as f64 * *c as f64).sum();
        let explicit_units: f64 = cell.particles().iter().map(|p| p.composition()[0]).sum();
        assert_relative_eq!(pn_units + explicit_units, 10.0 * births, max_relative = 1e-9);
        assert!(cell.particles().iter().all(|p| p.size_class() >= 50));
        assert!(cell.particle_count() > 0);
        assert_eq!(
            cell.total_particle_number(),
            pn.total() + cell.particle_count() as u64
        );
    }

    #[test]
    fn test_outflow_decays_population() {
        let mech = Mechanism::new(model());
        let solver = Solver::default();
        let mut cell = Cell::new(gas(), 1024, 1.0).unwrap();
        let m = model();
        let particles = (0..500).map(|_| m.new_particle(0.0, &[100.0], &[], 1.0)).collect();
        cell.set_particles(particles, 1.0);
        cell.add_outflow(Outflow::new(1.0));
        let mut rng = seeded_rng(3);
        solver.run(0.0, 1.0, &mut cell, &mech, &mut rng).unwrap();
        let expected = 500.0 * (-1.0f64).exp();
        let n = cell.particle_count() as f64;
        assert!((n - expected).abs() < 50.0, "{n} particles left");
    }

    #[test]
    fn test_deferred_growth_brings_particles_to_tstop() {
        let mech = birth_coag(1000.0, 1e-3, 1000.0).with_process(
            SurfaceReaction::new("growth", 1e17, 0.0, 0.0, vec![1.0], PropId::Surface).deferred(true),
        );
        let solver = Solver::new(1e-2);
        let mut cell = Cell::new(gas(), 512, 1.0).unwrap();
        let m = model();
        cell.set_particles((0..10).map(|_| m.new_particle(0.0, &[1000.0], &[], 1.0)).collect(), 1.0);
        let mut rng = seeded_rng(31);
        let summary = solver.run(0.0, 0.2, &mut cell, &mech, &mut rng).unwrap();
        assert!(summary.splits > 1);
        assert!(cell.particles().iter().all(|p| p.last_update_time() == 0.2));
        let births = cell.counters().performed()[0] as f64;
        let units: f64 = cell.particles().iter().map(|p| p.composition()[0]).sum();
        assert!(units > 1000.0 * (births + 10.0));
    }

    #[test]
    fn test_fast_sintering_gives_spheres() {
        let mech = birth_coag(1000.0, 1.0, 500.0)
            .with_process(Sintering::new(SinteringModel::new(SinteringType::ViscousFlow, 1e-3, 0.0, 0.0)));
        assert!(mech.is_aggregating());
        let solver = Solver::default();
        let mut cell = Cell::new(gas(), 512, 1.0).unwrap();
        let mut rng = seeded_rng(8);
        solver.run(0.0, 0.5, &mut cell, &mech, &mut rng).unwrap();
        assert!(cell.particles().iter().any(|p| p.coag_count() > 0));
        assert!(cell.particles().iter().all(|p| p.sintering_level() > 0.99));
    }

    #[test]
    fn test_failed_sintering_stops_the_run_with_negative_status() {
        // zero prefactor: the characteristic time of every aggregate is zero
        let mech = birth_coag(1000.0, 1.0, 500.0)
            .with_process(Sintering::new(SinteringModel::new(SinteringType::ViscousFlow, 0.0, 0.0, 0.0)));
        let solver = Solver::default();
        let mut cell = Cell::new(gas(), 512, 1.0).unwrap();
        let mut rng = seeded_rng(8);
        match solver.run(0.0, 0.5, &mut cell, &mech, &mut rng) {
            Err(e @ SolverError::Process { .. }) => {
                assert_eq!(e.status(), -4);
            }
            other => panic!("expected a sintering failure, got {:?}", other),
        }
    }

    #[test]
    fn test_run_profile_records_every_output() {
        let mech = birth_coag(1000.0, 1e-2, 10.0);
        let solver = Solver::default();
        let mut cell = Cell::new(gas(), 256, 1.0).unwrap();
        let profile = TabulatedGasProfile::new(vec![
            (0.0, GasState::inert(1000.0, 1e5)),
            (1.0, GasState::inert(2000.0, 1e5)),
        ])
        .unwrap();
        let mut recorder = StatsRecorder::new();
        let mut rng = seeded_rng(5);
        let summary = solver
            .run_profile(0.0, &[0.25, 0.5, 0.5, 0.75], &mut cell, &mech, &profile, &mut recorder, &mut rng)
            .unwrap();
        assert_eq!(summary.t_end, 0.75);
        let times: Vec<f64> = recorder.records().iter().map(|(t, _)| *t).collect();
        assert_eq!(times, vec![0.0, 0.25, 0.5, 0.75]);
        assert_relative_eq!(cell.temperature(), 1500.0);
        let n: Vec<f64> = recorder.records().iter().map(|(_, s)| s.number_density).collect();
        assert!(n[3] > n[0]);
        assert_eq!(recorder.table().len(), 5);
    }

    #[test]
    fn test_cells_run_in_parallel() {
        let mech = birth_coag(1000.0, 1e-2, 10.0);
        let solver = Solver::default();
        let mut cells: Vec<(Cell, RngType)> = (0..4)
            .map(|s| (Cell::new(gas(), 256, 1.0).unwrap(), seeded_rng(s)))
            .collect();
        let results = solver.run_cells_parallel(0.0, 0.1, &mut cells, &mech);
        assert_eq!(results.len(), 4);
        for (result, (cell, _)) in results.iter().zip(cells.iter()) {
            assert_eq!(result.as_ref().unwrap().t_end, 0.1);
            assert!(cell.particle_count() > 0);
        }
    }
}
