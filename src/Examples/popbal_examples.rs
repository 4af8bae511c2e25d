use crate::Particles::particle::PropId;
use crate::Particles::particle_model::{Component, ParticleModel};
use crate::Processes::coagulation::{CoagKernel, CoagWeightRule, Coagulation};
use crate::Processes::inception::{Inception, InceptionKernel};
use crate::Processes::mechanism::Mechanism;
use crate::Processes::sintering::Sintering;
use crate::Processes::sintering_model::{SinteringModel, SinteringType};
use crate::Processes::surface_reaction::{AbfSiteDensity, ActiveSitesReaction, SurfaceReaction};
use crate::StochasticSolver::cell::Cell;
use crate::StochasticSolver::gas_state::{GasState, TabulatedGasProfile};
use crate::StochasticSolver::solver::{Solver, StatsRecorder};
use crate::StochasticSolver::weight_scaling::{InceptionWeighting, WeightScalingFn};
use crate::Utils::random::seeded_rng;
use crate::settings::SimulationSettings;
use log::{error, info};
use nalgebra::DVector;
use prettytable::{Table, row};
use std::sync::Arc;

const TIO2_SETTINGS: &str = r#"{
    "components": [{"name": "TiO2", "mol_wt": 0.0799, "density": 4230.0}],
    "processes": [
        {"type": "Inception", "name": "TiCl4 oxidation", "a": 1e21, "composition": [2.0],
         "reactants": [[0, 1.0]], "stoichiometry": [[0, 2.0]]},
        {"type": "Coagulation", "kernel": "Transition", "weight_rule": "Mass"},
        {"type": "Sintering", "kind": "GrainBoundaryDiffusion", "a": 7.44e16, "e": 2.58e5, "dp_min": 1e-9}
    ],
    "inception_weighting": {"w_min": 1.0, "w_max": 100.0, "n_min": 256.0, "function": "Linear"},
    "cell": {"temperature": 1500.0, "pressure": 101325.0, "concentrations": [1e-6],
             "capacity": 2048, "sample_volume": 1e-14},
    "solver": {"seed": 3, "t_stop": 1e-3, "output_times": [1e-4, 2e-4, 5e-4, 1e-3]}
}"#;

pub fn popbal_examples(task: usize) {
    match task {
        0 => {
            // BIRTH AND CONSTANT-KERNEL COAGULATION AGAINST THE ANALYTIC SOLUTION
            // dN/dt = I - K N^2 / 2  =>  N(t) = sqrt(2I/K) tanh(t sqrt(IK/2))
            let (i, k, vol) = (1.0e12, 1.0e-9, 1.0e-9);
            let model = ParticleModel::new(vec![Component::new("C", 0.012, 1800.0)], vec![]);
            let mech = Mechanism::new(model)
                .with_process(Inception::new("birth", i, vec![10.0]))
                .with_process(Coagulation::new("coagulation", CoagKernel::Constant { k }));
            let solver = Solver::default();
            let mut cell = match Cell::new(GasState::inert(300.0, 101325.0), 4096, vol) {
                Ok(cell) => cell,
                Err(e) => {
                    error!("{e}");
                    return;
                }
            };
            let mut rng = seeded_rng(1);
            let mut table = Table::new();
            table.add_row(row!["t, s", "N stochastic, 1/m3", "N analytic, 1/m3"]);
            let mut t = 0.0;
            for tout in [1e-2, 2e-2, 5e-2, 0.1, 0.2] {
                match solver.run(t, tout, &mut cell, &mech, &mut rng) {
                    Ok(summary) => t = summary.t_end,
                    Err(e) => {
                        error!("run failed with status {}: {e}", e.status());
                        return;
                    }
                }
                let analytic = (2.0 * i / k).sqrt() * (t * (i * k / 2.0).sqrt()).tanh();
                table.add_row(row![
                    format!("{t:.3e}"),
                    format!("{:.4e}", cell.stats().number_density),
                    format!("{analytic:.4e}")
                ]);
            }
            table.printstd();
        }
        1 => {
            // SOOT IN A COOLING FLAME: PYRENE DIMER INCEPTION, HACA-TYPE GROWTH ON ACTIVE
            // SITES, TRANSITION COAGULATION, SMALL PARTICLES IN THE PARTICLE-NUMBER REGISTER
            let model = ParticleModel::new(vec![Component::new("C", 0.012, 1800.0)], vec![]);
            let pyrene_mass = 202.25e-3 / crate::Utils::constants::NA;
            let inception = Inception::new("pyrene dimerisation", 1.0, vec![32.0])
                .with_reactants(vec![(0, 2.0)])
                .with_stoichiometry(vec![(0, 2.0)])
                .with_kernel(InceptionKernel::between(pyrene_mass, pyrene_mass, 7.1e-10, 7.1e-10));
            let haca = SurfaceReaction::new("C2H2 addition", 1.0e7, 0.0, 5.0e4, vec![2.0], PropId::Surface)
                .with_reactants(vec![(1, 1.0)])
                .with_stoichiometry(vec![(1, 1.0)])
                .deferred(true);
            let mut mech = Mechanism::new(model)
                .with_process(inception)
                .with_process(ActiveSitesReaction::new(haca, Arc::new(AbfSiteDensity)))
                .with_process(Coagulation::transition());
            mech.set_hybrid(128);
            mech.log_summary();

            let flame = |temperature: f64| GasState::new(temperature, 101325.0, DVector::from_vec(vec![1e-7, 1e-2]));
            let Some(profile) =
                TabulatedGasProfile::new(vec![(0.0, flame(2000.0)), (5e-3, flame(1800.0)), (2e-2, flame(1500.0))])
            else {
                return;
            };
            let solver = Solver::default();
            let mut cell = match Cell::new(flame(2000.0), 2048, 1e-13) {
                Ok(cell) => cell,
                Err(e) => {
                    error!("{e}");
                    return;
                }
            };
            solver.initialise_pn_particles(0.0, &mut cell, &mech);
            let mut rng = seeded_rng(2);
            let mut recorder = StatsRecorder::new();
            let outputs = [1e-3, 2e-3, 5e-3, 1e-2, 2e-2];
            match solver.run_profile(0.0, &outputs, &mut cell, &mech, &profile, &mut recorder, &mut rng) {
                Ok(summary) => info!(
                    "{} events, {} fictitious, {} splits",
                    summary.events, summary.fictitious, summary.splits
                ),
                Err(e) => error!("run failed with status {}: {e}", e.status()),
            }
            recorder.table().printstd();
            cell.stats().print_table();
        }
        2 => {
            // TiO2 AGGREGATES: WEIGHTED COAGULATION WITH ADAPTIVE INCEPTION WEIGHTS AND
            // GRAIN-BOUNDARY DIFFUSION SINTERING, BUILT IN CODE
            let model = ParticleModel::new(vec![Component::new("TiO2", 0.0799, 4230.0)], vec![]);
            let mut mech = Mechanism::new(model)
                .with_process(Inception::new("TiCl4 oxidation", 1e21, vec![2.0]).with_reactants(vec![(0, 1.0)]))
                .with_process(Coagulation::transition().weighted(CoagWeightRule::Mass))
                .with_process(Sintering::new(SinteringModel::new(
                    SinteringType::GrainBoundaryDiffusion,
                    7.44e16,
                    2.58e5,
                    1e-9,
                )));
            mech.set_inception_weighting(InceptionWeighting::new(1.0, 100.0, 256.0, WeightScalingFn::Quadratic));
            let gas = GasState::new(1500.0, 101325.0, DVector::from_vec(vec![1e-6]));
            let mut cell = match Cell::new(gas, 2048, 1e-14) {
                Ok(cell) => cell,
                Err(e) => {
                    error!("{e}");
                    return;
                }
            };
            let mut rng = seeded_rng(3);
            match Solver::default().run(0.0, 1e-3, &mut cell, &mech, &mut rng) {
                Ok(summary) => info!("finished at t = {:.3e} s", summary.t_end),
                Err(e) => error!("run failed with status {}: {e}", e.status()),
            }
            info!("incepting weight at the end: {:.3}", cell.incepting_weight());
            cell.stats().print_table();
        }
        3 => {
            // THE SAME TiO2 SYSTEM FROM JSON SETTINGS, FOUR INDEPENDENT CELLS IN PARALLEL
            let settings = match SimulationSettings::from_json_str(TIO2_SETTINGS) {
                Ok(s) => s,
                Err(e) => {
                    error!("{e}");
                    return;
                }
            };
            let mech = match settings.build_mechanism() {
                Ok(m) => m,
                Err(e) => {
                    error!("{e}");
                    return;
                }
            };
            let mut cells = Vec::new();
            for seed in 0..4u64 {
                match settings.build_cell(&mech) {
                    Ok(cell) => cells.push((cell, seeded_rng(settings.solver.seed + seed))),
                    Err(e) => {
                        error!("{e}");
                        return;
                    }
                }
            }
            let solver = settings.build_solver();
            let results = solver.run_cells_parallel(0.0, settings.solver.t_stop, &mut cells, &mech);
            let mut table = Table::new();
            table.add_row(row!["cell", "status", "N, 1/m3", "d_coll, m", "sint. level"]);
            for (i, (result, (cell, _))) in results.iter().zip(cells.iter()).enumerate() {
                let status = match result {
                    Ok(s) => s.status(),
                    Err(e) => e.status(),
                };
                let stats = cell.stats();
                table.add_row(row![
                    i,
                    status,
                    format!("{:.4e}", stats.number_density),
                    format!("{:.4e}", stats.mean_coll_diameter),
                    format!("{:.3}", stats.mean_sintering_level)
                ]);
            }
            table.printstd();
        }
        _ => error!("unknown example {task}"),
    }
}
