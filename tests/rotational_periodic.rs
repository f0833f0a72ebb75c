use fv_ldu::prelude::*;

/// Two cells joined by an internal face. Each cell also has a wall and one
/// side of a periodic pair rotated half a turn about `z`:
///
/// ```text
/// wall "left" | 0 | 1 | wall "right"
///       cell 0 --"a"/"b"-- cell 1  (rotated by R)
/// ```
fn half_turn_pair() -> Topology {
    let r = Tensor::rotation_z(std::f64::consts::PI as Scalar);
    let periodic = |name, start, partner, transform| {
        PatchDescriptor::new(
            name,
            start,
            1,
            CouplingKind::Periodic {
                partner,
                transform: PatchTransform::Rotational(transform),
            },
        )
    };
    build_topology(
        2,
        vec![0, 0, 0, 1, 1],
        vec![1],
        vec![
            PatchDescriptor::wall("left", 1, 1),
            periodic("a", 2, 3, r),
            PatchDescriptor::wall("right", 3, 1),
            periodic("b", 4, 1, r.transpose()),
        ],
    )
    .expect("rotational periodic topology")
}

fn walls(patch: &str) -> PatchFieldSpec<Vector> {
    match patch {
        "left" => PatchFieldSpec::fixed_value(Vector::new(3.0, 6.0, 1.0)),
        "right" => PatchFieldSpec::fixed_value(Vector::new(-3.0, 9.0, 0.0)),
        _ => PatchFieldSpec::coupled(),
    }
}

#[test]
fn vector_diffusion_sees_the_rotated_partner() {
    let mesh = MeshState::with_unit_geometry(half_turn_pair());
    let registry = PatchFieldRegistry::with_builtin();
    let mut u = Field::uniform("U", &mesh, Vector::new(0.0, 0.0, 0.0), &registry, walls).unwrap();
    let comm = NoComm;
    let halo = HaloExchange::new(mesh.topology_arc(), &comm);
    u.correct_boundary_conditions(&mesh, &halo).unwrap();

    let eq = -EquationAssembler::new(&mesh)
        .diffusion(Coeff::Uniform(1.0), &mut u)
        .unwrap();
    let solvers = SolverRegistry::with_builtin();
    let controls = SolverControls::new("PCG")
        .with_preconditioner("DIC")
        .with_tolerance(1e-12, 0.0);
    let report = eq
        .solve(&mut u, &SolveContext::new(&mesh, &halo, &solvers, &controls))
        .unwrap();
    assert!(report.converged, "{report}");

    // Per component, with s = ±1 the sign the half turn gives it:
    //   3·u0 − (1 + s)·u1 = left,  3·u1 − (1 + s)·u0 = right.
    // x and y flip sign across the seam (s = −1), z is plain periodic (s = 1).
    let want = [Vector::new(1.0, 2.0, 0.6), Vector::new(-1.0, 3.0, 0.4)];
    for (got, want) in u.internal().iter().zip(&want) {
        for d in 0..3 {
            assert!((got.0[d] - want.0[d]).abs() < 1e-9, "{:?} vs {want:?}", u.internal());
        }
    }

    // face value: midpoint of the own cell and the rotated partner cell
    let face_a = u.boundary(1).values()[0];
    for (d, want) in [1.0, -0.5, 0.5].into_iter().enumerate() {
        assert!((face_a.0[d] - want).abs() < 1e-9, "{face_a:?}");
    }
}

#[test]
fn unrotated_seam_gives_a_different_answer() {
    // Same mesh with a translational seam: x no longer changes sign, so the
    // rotation above is what produced the antisymmetric profile.
    let topo = build_topology(
        2,
        vec![0, 0, 0, 1, 1],
        vec![1],
        vec![
            PatchDescriptor::wall("left", 1, 1),
            PatchDescriptor::new(
                "a",
                2,
                1,
                CouplingKind::Periodic {
                    partner: 3,
                    transform: PatchTransform::Translational,
                },
            ),
            PatchDescriptor::wall("right", 3, 1),
            PatchDescriptor::new(
                "b",
                4,
                1,
                CouplingKind::Periodic {
                    partner: 1,
                    transform: PatchTransform::Translational,
                },
            ),
        ],
    )
    .unwrap();
    let mesh = MeshState::with_unit_geometry(topo);
    let registry = PatchFieldRegistry::with_builtin();
    let mut u = Field::uniform("U", &mesh, Vector::new(0.0, 0.0, 0.0), &registry, walls).unwrap();
    let comm = NoComm;
    let halo = HaloExchange::new(mesh.topology_arc(), &comm);
    u.correct_boundary_conditions(&mesh, &halo).unwrap();

    let eq = -EquationAssembler::new(&mesh)
        .diffusion(Coeff::Uniform(1.0), &mut u)
        .unwrap();
    let solvers = SolverRegistry::with_builtin();
    let controls = SolverControls::new("PCG")
        .with_preconditioner("DIC")
        .with_tolerance(1e-12, 0.0);
    eq.solve(&mut u, &SolveContext::new(&mesh, &halo, &solvers, &controls))
        .unwrap();

    // 3·u0 − 2·u1 = 3, 3·u1 − 2·u0 = −3
    assert!((u.internal()[0].0[0] - 0.6).abs() < 1e-9, "{:?}", u.internal());
    assert!((u.internal()[1].0[0] + 0.6).abs() < 1e-9, "{:?}", u.internal());
}
