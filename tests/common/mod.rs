//! Mesh builders shared by the integration tests.
#![allow(dead_code)]

use fv_ldu::prelude::*;

/// `n` cells in a row, walls "left" and "right".
pub fn line(n: usize) -> Topology {
    let n_int = n - 1;
    let mut owner: Vec<usize> = (0..n_int).collect();
    owner.extend([0, n - 1]);
    build_topology(
        n,
        owner,
        (1..n).collect(),
        vec![
            PatchDescriptor::wall("left", n_int, 1),
            PatchDescriptor::wall("right", n_int + 1, 1),
        ],
    )
    .expect("line topology")
}

/// Structured `nx × ny` grid in upper-triangular face order. Patch "hot"
/// holds the `i = 0` faces, "cold" every other boundary face.
pub fn grid(nx: usize, ny: usize) -> Topology {
    let n = nx * ny;
    let mut owner = Vec::new();
    let mut neighbour = Vec::new();
    for c in 0..n {
        let (i, j) = (c % nx, c / nx);
        if i + 1 < nx {
            owner.push(c);
            neighbour.push(c + 1);
        }
        if j + 1 < ny {
            owner.push(c);
            neighbour.push(c + nx);
        }
    }
    let n_int = neighbour.len();
    let hot: Vec<usize> = (0..ny).map(|j| j * nx).collect();
    let mut cold = Vec::new();
    for c in 0..n {
        let (i, j) = (c % nx, c / nx);
        if i == nx - 1 {
            cold.push(c);
        }
        if j == 0 {
            cold.push(c);
        }
        if j == ny - 1 {
            cold.push(c);
        }
    }
    let patches = vec![
        PatchDescriptor::wall("hot", n_int, hot.len()),
        PatchDescriptor::wall("cold", n_int + hot.len(), cold.len()),
    ];
    owner.extend(hot);
    owner.extend(cold);
    build_topology(n, owner, neighbour, patches).expect("grid topology")
}

/// Half of a `2·n`-cell line owned by `rank` (0 or 1). The cut is a
/// processor patch named "procBoundary" with tag 7.
pub fn half_line(n: usize, rank: usize) -> Topology {
    let n_int = n - 1;
    let mut owner: Vec<usize> = (0..n_int).collect();
    owner.extend([0, n - 1]);
    let processor = |start| {
        PatchDescriptor::new(
            "procBoundary",
            start,
            1,
            CouplingKind::Processor {
                neighbour_rank: 1 - rank,
                tag: 7,
            },
        )
    };
    let patches = if rank == 0 {
        vec![PatchDescriptor::wall("left", n_int, 1), processor(n_int + 1)]
    } else {
        vec![processor(n_int), PatchDescriptor::wall("right", n_int + 1, 1)]
    };
    build_topology(n, owner, (1..n).collect(), patches).expect("half line topology")
}

/// Dirichlet ends: 1 on "left"/"hot", 0 elsewhere, coupled on processor
/// patches.
pub fn dirichlet_spec(patch: &str) -> PatchFieldSpec<Scalar> {
    match patch {
        "left" | "hot" => PatchFieldSpec::fixed_value(1.0),
        "procBoundary" => PatchFieldSpec::coupled(),
        _ => PatchFieldSpec::fixed_value(0.0),
    }
}
