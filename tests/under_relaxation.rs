mod common;

use common::{dirichlet_spec, line};
use fv_ldu::prelude::*;

fn setup() -> (MeshState, Field<Scalar>) {
    let mesh = MeshState::with_unit_geometry(line(3));
    let registry = PatchFieldRegistry::with_builtin();
    let t = Field::uniform("T", &mesh, 0.0, &registry, dirichlet_spec).unwrap();
    (mesh, t)
}

#[test]
fn field_relaxation_moves_part_of_the_way() {
    let (mesh, mut t) = setup();
    assert_eq!(t.relax(0.5).unwrap_err().kind(), ErrorKind::Configuration);

    t.store_prev_iter();
    let eq = -EquationAssembler::new(&mesh)
        .diffusion(Coeff::Uniform(1.0), &mut t)
        .unwrap();
    let comm = NoComm;
    let halo = HaloExchange::new(mesh.topology_arc(), &comm);
    let solvers = SolverRegistry::with_builtin();
    let controls = SolverControls::new("PCG").with_tolerance(1e-12, 0.0);
    eq.solve(&mut t, &SolveContext::new(&mesh, &halo, &solvers, &controls))
        .unwrap();

    t.relax(0.5).unwrap();
    for (got, want) in t.internal().iter().zip([0.375, 0.25, 0.125]) {
        assert!((got - want).abs() < 1e-9, "{got} vs {want}");
    }
    assert_eq!(t.prev_iter().unwrap(), &[0.0, 0.0, 0.0]);
}

#[test]
fn field_relaxation_factor_must_lie_in_the_unit_interval() {
    let (_mesh, mut t) = setup();
    t.internal_mut().copy_from_slice(&[0.2, 0.4, 0.6]);
    t.store_prev_iter();
    t.internal_mut().copy_from_slice(&[1.0, 2.0, 3.0]);
    for omega in [-1.0, 0.0, 2.5, Scalar::NAN] {
        let err = t.relax(omega).unwrap_err();
        assert!(matches!(err, FvError::InvalidConfiguration { .. }), "{omega}");
        assert_eq!(t.internal(), &[1.0, 2.0, 3.0]);
    }
    t.relax(1.0).unwrap();
    for (got, want) in t.internal().iter().zip([1.0, 2.0, 3.0]) {
        assert!((got - want).abs() < 1e-12, "{got} vs {want}");
    }
}

#[test]
fn relaxed_equations_converge_over_outer_passes() {
    let (mesh, mut t) = setup();
    let comm = NoComm;
    let halo = HaloExchange::new(mesh.topology_arc(), &comm);
    let solvers = SolverRegistry::with_builtin();
    let controls = SolverControls::new("PBiCGStab").with_preconditioner("DILU").with_tolerance(1e-12, 0.0);

    let mut outer = CorrectionLoop::new(80);
    let mut first = None;
    while outer.next_pass() {
        outer.begin_pass(&mut t);
        let mut eq = -EquationAssembler::new(&mesh)
            .diffusion(Coeff::Uniform(1.0), &mut t)
            .unwrap();
        let before = eq.diag().to_vec();
        eq.relax(0.7, &t).unwrap();
        assert!(eq.diag().iter().zip(&before).all(|(r, d)| r >= d));
        let report = eq
            .solve(&mut t, &SolveContext::new(&mesh, &halo, &solvers, &controls))
            .unwrap();
        outer.record(&report);
        first.get_or_insert(t.internal()[1]);
    }
    assert!(first.unwrap() < 0.5 - 1e-3);
    for (got, want) in t.internal().iter().zip([0.75, 0.5, 0.25]) {
        assert!((got - want).abs() < 1e-6, "{got} vs {want}");
    }
}

#[test]
fn relaxation_factor_must_lie_in_the_unit_interval() {
    let (mesh, mut t) = setup();
    let mut eq = -EquationAssembler::new(&mesh)
        .diffusion(Coeff::Uniform(1.0), &mut t)
        .unwrap();
    for alpha in [0.0, -0.5, 1.5] {
        let err = eq.relax(alpha, &t).unwrap_err();
        assert!(matches!(err, FvError::InvalidConfiguration { .. }), "{alpha}");
    }
    let diag = eq.diag().to_vec();
    eq.relax(1.0, &t).unwrap();
    // α = 1 only enforces diagonal dominance, which -∇² already has
    for (a, b) in eq.diag().iter().zip(&diag) {
        assert!((a - b).abs() < 1e-12);
    }
}
