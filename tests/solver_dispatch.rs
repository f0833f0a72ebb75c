mod common;

use common::grid;
use fv_ldu::prelude::*;
use fv_ldu::solvers::LduSystem;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

struct Jacobi;

impl LinearSolver for Jacobi {
    fn name(&self) -> &'static str {
        "Jacobi"
    }

    fn solve(
        &self,
        system: &LduSystem<'_>,
        psi: &mut [Scalar],
        source: &[Scalar],
        controls: &SolverControls,
        field: &str,
    ) -> Result<SolverReport, FvError> {
        let mut report = SolverReport::new(self.name(), field);
        let mut r = vec![0.0; psi.len()];
        system.amul(psi, &mut r)?;
        let norm = system.norm_factor(psi, source, &r)?;
        system.residual(psi, source, &mut r)?;
        report.initial_residual = system.g_sum_mag(&r)? / norm;
        report.final_residual = report.initial_residual;
        while !report.check_convergence(controls.tolerance, controls.rel_tol)
            && report.iterations < controls.max_iter
        {
            for ((x, ri), d) in psi.iter_mut().zip(&r).zip(system.diag()) {
                *x += ri / d;
            }
            system.residual(psi, source, &mut r)?;
            report.final_residual = system.g_sum_mag(&r)? / norm;
            report.iterations += 1;
        }
        Ok(report)
    }
}

struct Problem {
    mesh: MeshState,
    field: Field<Scalar>,
}

impl Problem {
    fn new() -> Self {
        let mesh = MeshState::with_unit_geometry(grid(5, 4));
        let registry = PatchFieldRegistry::with_builtin();
        let field = Field::uniform("T", &mesh, 0.0, &registry, |_| PatchFieldSpec::fixed_value(0.0)).unwrap();
        Self { mesh, field }
    }

    /// Diagonally dominant equation with random coefficients.
    fn random_equation(&mut self, rng: &mut SmallRng, convective: bool) -> SparseEquation<Scalar> {
        let topo = self.mesh.topology();
        let k: Vec<Scalar> = (0..topo.n_cells()).map(|_| rng.gen_range(2.0..4.0)).collect();
        let gamma: Vec<Scalar> = (0..topo.n_faces()).map(|_| rng.gen_range(0.1..3.0)).collect();
        let su: Vec<Scalar> = (0..topo.n_cells()).map(|_| rng.gen_range(-5.0..5.0)).collect();
        let flux: Vec<Scalar> = (0..topo.n_faces()).map(|_| rng.gen_range(-2.0..2.0)).collect();

        let asm = EquationAssembler::new(&self.mesh);
        let mut eq = asm.implicit_source(Coeff::PerItem(&k), &self.field).unwrap()
            - asm.diffusion(Coeff::PerItem(&gamma), &mut self.field).unwrap()
            + asm.explicit_source(&su, &self.field).unwrap();
        if convective {
            eq += asm
                .convection(&flux, &upwind_weights(&flux), &mut self.field)
                .unwrap();
        }
        eq
    }

    fn solve(&mut self, eq: &SparseEquation<Scalar>, solvers: &SolverRegistry, controls: &SolverControls) -> Vec<Scalar> {
        self.field.internal_mut().fill(0.0);
        let comm = NoComm;
        let halo = HaloExchange::new(self.mesh.topology_arc(), &comm);
        let report = eq
            .solve(&mut self.field, &SolveContext::new(&self.mesh, &halo, solvers, controls))
            .unwrap();
        assert!(report.converged, "{report}");
        assert_eq!(report.solver, controls.solver);
        assert!(eq.residual(&self.field, &halo).unwrap() < 1e-8);
        self.field.internal().to_vec()
    }
}

fn assert_close(a: &[Scalar], b: &[Scalar]) {
    for (x, y) in a.iter().zip(b) {
        assert!((x - y).abs() < 1e-7, "{x} vs {y}");
    }
}

#[test]
fn symmetric_solvers_agree_on_random_systems() {
    let solvers = SolverRegistry::with_builtin();
    for seed in 0..5 {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut p = Problem::new();
        let eq = p.random_equation(&mut rng, false);
        assert_eq!(eq.structure(), StructureClass::Symmetric);

        let reference = p.solve(&eq, &solvers, &SolverControls::new("PCG").with_preconditioner("DIC").with_tolerance(1e-12, 0.0));
        for controls in [
            SolverControls::new("PCG"),
            SolverControls::new("PBiCGStab").with_preconditioner("DIC"),
            SolverControls::new("smoothSolver").with_smoother("GaussSeidel"),
        ] {
            let x = p.solve(&eq, &solvers, &controls.with_tolerance(1e-12, 0.0));
            assert_close(&x, &reference);
        }
    }
}

#[test]
fn asymmetric_solvers_agree_on_random_systems() {
    let solvers = SolverRegistry::with_builtin();
    for seed in 10..15 {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut p = Problem::new();
        let eq = p.random_equation(&mut rng, true);
        assert_eq!(eq.structure(), StructureClass::Asymmetric);

        let reference = p.solve(&eq, &solvers, &SolverControls::new("PBiCGStab").with_preconditioner("DILU").with_tolerance(1e-12, 0.0));
        let x = p.solve(
            &eq,
            &solvers,
            &SolverControls::new("smoothSolver")
                .with_smoother("GaussSeidel")
                .with_sweeps(2)
                .with_tolerance(1e-12, 0.0),
        );
        assert_close(&x, &reference);
    }
}

#[test]
fn registered_solver_is_selected_by_name() {
    let mut solvers = SolverRegistry::with_builtin();
    solvers.register(StructureClass::Symmetric, "Jacobi", |_, _| Ok(Box::new(Jacobi)));
    assert!(solvers.names(StructureClass::Symmetric).contains(&"Jacobi".to_string()));
    assert!(!solvers.names(StructureClass::Asymmetric).contains(&"Jacobi".to_string()));

    let mut rng = SmallRng::seed_from_u64(42);
    let mut p = Problem::new();
    let eq = p.random_equation(&mut rng, false);
    let controls = SolverControls::new("Jacobi").with_tolerance(1e-11, 0.0).with_iterations(0, 5000);
    let x = p.solve(&eq, &solvers, &controls);
    let reference = p.solve(&eq, &solvers, &SolverControls::new("PCG").with_tolerance(1e-12, 0.0));
    assert_close(&x, &reference);

    let asym = p.random_equation(&mut rng, true);
    let comm = NoComm;
    let halo = HaloExchange::new(p.mesh.topology_arc(), &comm);
    let err = asym
        .solve(&mut p.field, &SolveContext::new(&p.mesh, &halo, &solvers, &controls))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn diagonal_only_equations_use_the_diagonal_solver() {
    let solvers = SolverRegistry::with_builtin();
    let mut p = Problem::new();
    let n = p.mesh.topology().n_cells();
    let k = vec![2.0; n];
    let su = vec![-4.0; n];
    let asm = EquationAssembler::new(&p.mesh);
    let eq = asm.implicit_source(Coeff::PerItem(&k), &p.field).unwrap()
        + asm.explicit_source(&su, &p.field).unwrap();
    assert_eq!(eq.structure(), StructureClass::DiagonalOnly);

    let comm = NoComm;
    let halo = HaloExchange::new(p.mesh.topology_arc(), &comm);
    for name in ["PCG", "PBiCGStab", "smoothSolver", "diagonal"] {
        let controls = SolverControls::new(name);
        let report = eq
            .solve(&mut p.field, &SolveContext::new(&p.mesh, &halo, &solvers, &controls))
            .unwrap();
        assert_eq!(report.solver, "diagonal");
        assert_eq!(report.iterations, 1);
        assert!(p.field.internal().iter().all(|&v| (v - 2.0).abs() < 1e-12));
    }

    let controls = SolverControls::new("GAMG");
    let err = eq
        .solve(&mut p.field, &SolveContext::new(&p.mesh, &halo, &solvers, &controls))
        .unwrap_err();
    assert!(err.to_string().contains("Unknown diagonal matrix solver 'GAMG'"));
    assert!(err.to_string().contains("PBiCGStab, PCG, diagonal, smoothSolver"));
}
