/////////////////////////////////////////////////////////////////////////////////////////////////
// TESTS
/////////////////////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use crate::Particles::particle::PropId;
    use crate::Particles::particle_model::{Component, ParticleModel};
    use crate::Processes::coagulation::{CoagKernel, Coagulation};
    use crate::Processes::inception::Inception;
    use crate::Processes::mechanism::Mechanism;
    use crate::Processes::process_api::{EventOutcome, LocalGeometry, ProcessError};
    use crate::Processes::sintering::Sintering;
    use crate::Processes::sintering_model::{SinteringModel, SinteringType};
    use crate::Processes::surface_reaction::SurfaceReaction;
    use crate::Processes::transport::{Inflow, Outflow, Transport};
    use crate::StochasticSolver::cell::Cell;
    use crate::StochasticSolver::gas_state::GasState;
    use crate::Utils::constants::NA;
    use crate::Utils::random::seeded_rng;
    use approx::assert_relative_eq;
    use nalgebra::DVector;

    fn model() -> ParticleModel {
        ParticleModel::new(vec![Component::new("C", 0.012, 1800.0)], vec![])
    }

    fn gas() -> GasState {
        GasState::new(1500.0, 101325.0, DVector::from_vec(vec![0.1, 0.05]))
    }

    fn growth(deferred: bool) -> SurfaceReaction {
        SurfaceReaction::new("growth", 1e17, 0.0, 0.0, vec![1.0], PropId::Surface)
            .with_stoichiometry(vec![(1, 1.0)])
            .deferred(deferred)
    }

    fn full_mechanism() -> Mechanism {
        Mechanism::new(model())
            .with_process(Inception::new("inception", 1e20, vec![20.0]).with_stoichiometry(vec![(0, 2.0)]))
            .with_process(growth(true))
            .with_process(Coagulation::transition())
            .with_process(Sintering::new(SinteringModel::new(SinteringType::ViscousFlow, 1e-3, 0.0, 1e-9)))
            .with_process(Transport::new("outflow", 10.0))
    }

    fn filled_cell(n: usize, units: f64) -> Cell {
        let mut cell = Cell::new(gas(), 256, 1e-12).unwrap();
        let m = model();
        let mut rng = seeded_rng(2);
        for i in 0..n {
            let p = m.new_particle(0.0, &[units * (1.0 + i as f64)], &[], 1.0);
            cell.particles_mut().add(p, &mut rng);
        }
        cell
    }

    #[test]
    fn test_term_layout_and_flags() {
        let mech = full_mechanism();
        assert_eq!(mech.process_count(), 5);
        assert_eq!(mech.term_count(), 1 + 1 + 6 + 0 + 1);
        assert!(mech.any_deferred());
        assert!(!mech.is_weighted_coag());
        assert!(mech.is_aggregating());
        assert_eq!(
            mech.process_names(),
            vec!["inception", "growth", "coagulation", "sintering", "outflow"]
        );
    }

    #[test]
    fn test_jump_and_deferred_terms_partition_rates() {
        let mech = full_mechanism();
        let cell = filled_cell(40, 100.0);
        let geom = LocalGeometry::default();
        let mut all = Vec::new();
        let mut jump = Vec::new();
        let mut deferred = Vec::new();
        let total = mech.calc_rate_terms(0.0, &cell, &geom, &mut all);
        let jrate = mech.calc_jump_rate_terms(0.0, &cell, &geom, &mut jump);
        let drate = mech.calc_deferred_rate_terms(0.0, &cell, &geom, &mut deferred);
        assert_eq!(jump[1], 0.0);
        assert!(deferred[1] > 0.0);
        assert!(deferred.iter().enumerate().all(|(i, x)| i == 1 || *x == 0.0));
        assert_relative_eq!(total, jrate + drate, max_relative = 1e-12);
        for i in 0..all.len() {
            assert_relative_eq!(all[i], jump[i] + deferred[i], max_relative = 1e-12);
        }
        // transport: k * N
        assert_relative_eq!(jump[8], 400.0);
        let rates = mech.calc_rates(0.0, &cell, &geom);
        assert_eq!(rates.len(), 5);
        assert_relative_eq!(rates[0], 1e20 * cell.sample_volume());
    }

    #[test]
    fn test_do_process_routes_terms_and_rejects_unknown() {
        let mech = full_mechanism();
        let mut cell = filled_cell(10, 100.0);
        let mut rng = seeded_rng(4);
        let geom = LocalGeometry::default();
        assert_eq!(
            mech.do_process(0, 0.0, &mut cell, &geom, &mut rng).unwrap(),
            EventOutcome::Performed
        );
        assert_eq!(cell.particle_count(), 11);
        mech.do_process(8, 0.0, &mut cell, &geom, &mut rng).unwrap();
        assert_eq!(cell.particle_count(), 10);
        let err = mech.do_process(9, 0.0, &mut cell, &geom, &mut rng).unwrap_err();
        assert!(matches!(err, ProcessError::UnknownProcessIndex(9)));
        assert_eq!(err.status(), -2);
        assert_eq!(cell.counters().performed()[0], 1);
        assert_eq!(cell.counters().performed()[8], 1);
    }

    #[test]
    fn test_lpda_grows_particles_and_stamps_time() {
        let mech = Mechanism::new(model()).with_process(growth(true));
        let mut cell = filled_cell(30, 1000.0);
        let mut rng = seeded_rng(9);
        let mass0 = cell.particles().get_sum(PropId::Mass);
        mech.lpda(1.0, &mut cell, &mut rng).unwrap();
        assert_eq!(cell.particle_count(), 30);
        assert!(cell.particles().get_sum(PropId::Mass) > mass0);
        assert!(cell.particles().iter().all(|p| p.last_update_time() == 1.0));
        // a second update to the same time changes nothing
        let mass1 = cell.particles().get_sum(PropId::Mass);
        mech.lpda(1.0, &mut cell, &mut rng).unwrap();
        assert_eq!(cell.particles().get_sum(PropId::Mass), mass1);
    }

    #[test]
    fn test_lpda_sinters_aggregates() {
        let m = model();
        let mech = Mechanism::new(m.clone())
            .with_process(Sintering::new(SinteringModel::new(SinteringType::ViscousFlow, 1e-3, 0.0, 0.0)));
        let mut cell = Cell::new(gas(), 16, 1e-12).unwrap();
        let mut rng = seeded_rng(1);
        let mut agg = m.new_particle(0.0, &[5000.0], &[], 1.0);
        agg.coagulate(&m.new_particle(0.0, &[5000.0], &[], 1.0), &m, false);
        let level0 = agg.sintering_level();
        cell.particles_mut().add(agg, &mut rng);
        mech.lpda(1.0, &mut cell, &mut rng).unwrap();
        let level1 = cell.particles().particle(0).unwrap().sintering_level();
        assert!(level1 > level0);
    }

    #[test]
    fn test_hybrid_particles_go_to_register() {
        let mut mech = Mechanism::new(model());
        mech.set_hybrid(50);
        assert!(mech.is_hybrid());
        let mut cell = Cell::new(gas(), 64, 1e-12).unwrap();
        cell.particles_mut().pn_mut().initialise(mech.pn_templates(0.0));
        let mut rng = seeded_rng(0);
        let m = model();
        mech.add_particle_to_cell(&mut cell, m.new_particle(0.0, &[10.0], &[], 1.0), &mut rng);
        mech.add_particle_to_cell(&mut cell, m.new_particle(0.0, &[10.0], &[], 2.0), &mut rng);
        mech.add_particle_to_cell(&mut cell, m.new_particle(0.0, &[80.0], &[], 1.0), &mut rng);
        assert_eq!(cell.particles().pn().count(10), 1);
        assert_eq!(cell.particle_count(), 2);
        assert_eq!(cell.total_particle_number(), 3);
    }

    #[test]
    fn test_update_sections_moves_counts_up_and_promotes() {
        let mut mech = Mechanism::new(model()).with_process(growth(true));
        mech.set_hybrid(40);
        let mut cell = Cell::new(gas(), 1024, 1e-12).unwrap();
        cell.particles_mut().pn_mut().initialise(mech.pn_templates(0.0));
        cell.particles_mut().pn_mut().add(30, 500);
        let mut rng = seeded_rng(21);
        mech.update_sections(0.0, 1.0, &mut cell, &mut rng).unwrap();
        let pn = cell.particles().pn();
        assert!(pn.count(30) < 500);
        assert_eq!(pn.counts()[..30].iter().sum::<u64>(), 0);
        assert_eq!(pn.total() + cell.particle_count() as u64, 500);
    }

    #[test]
    fn test_gas_change_rates_follow_inception() {
        let mech = Mechanism::new(model())
            .with_process(Inception::new("inception", 1e20, vec![20.0]).with_stoichiometry(vec![(0, 2.0)]));
        let cell = filled_cell(0, 1.0);
        let dc = mech.calc_gas_change_rates(0.0, &cell, &LocalGeometry::default());
        assert_eq!(dc.len(), 2);
        assert_relative_eq!(dc[0], -2.0 * 1e20 / NA, max_relative = 1e-12);
        assert_eq!(dc[1], 0.0);
    }

    #[test]
    fn test_particle_flow_out_and_in() {
        let mech = Mechanism::new(model());
        let geom = LocalGeometry::default();
        let mut rng = seeded_rng(17);

        let mut cell = filled_cell(100, 100.0);
        cell.add_outflow(Outflow::new(1e6));
        mech.do_particle_flow(1.0, 1.0, &mut cell, &geom, &mut rng);
        assert_eq!(cell.particle_count(), 0);

        let mut cell = filled_cell(0, 1.0);
        let template = model().new_particle(0.0, &[100.0], &[], 1.0);
        // expected arrivals: rate * dt * n * V = 10 * 0.1 * 1e14 * 1e-12 = 100
        cell.add_inflow(Inflow::new(10.0, 1e14, vec![template]));
        mech.do_particle_flow(2.0, 0.1, &mut cell, &geom, &mut rng);
        let n = cell.particle_count() as f64;
        assert!((n - 100.0).abs() < 50.0, "{n} arrivals");
        assert!(cell.particles().iter().all(|p| p.last_update_time() == 2.0));
    }

    #[test]
    fn test_coalescence_without_sintering() {
        let mech = Mechanism::new(model()).with_process(Coagulation::new("c", CoagKernel::Constant { k: 1e-12 }));
        assert!(!mech.is_aggregating());
        let mut cell = filled_cell(2, 500.0);
        let mut rng = seeded_rng(6);
        mech.do_process(0, 0.0, &mut cell, &LocalGeometry::default(), &mut rng)
            .unwrap();
        let p = cell.particles().particle(0).unwrap();
        assert_relative_eq!(p.sintering_level(), 1.0);
    }
}
