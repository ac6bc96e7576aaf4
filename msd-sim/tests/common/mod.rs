#![allow(dead_code)]

use rand::Rng;

use msd_sim::geometry::Geometry;
use msd_sim::molecule::{EdgeParameters, NodeParameters};
use msd_sim::vector::random_on_sphere;
use msd_sim::{DVec3, Device, InitialState, MolProto, Parameters};

/// Device layouts exercised by the consistency checks.
pub const LAYOUTS: [&str; 5] = ["full", "no-molecule", "no-left", "no-right", "overhang"];

/// Geometry and molecule node count for one layout.
pub fn layout(name: &str) -> (Geometry, usize) {
    let base = Geometry {
        width: 7,
        height: 4,
        depth: 4,
        mol_pos_l: 3,
        mol_pos_r: 4,
        top_l: 1,
        bottom_l: 2,
        front_r: 1,
        back_r: 3,
    };
    match name {
        "full" => (base, 2),
        "no-molecule" => (base, 0),
        "no-left" => (Geometry { mol_pos_l: 0, ..base }, 2),
        "no-right" => (Geometry { mol_pos_l: 5, ..base }, 2),
        // the last node hangs off the lattice
        "overhang" => (Geometry { mol_pos_l: 4, ..base }, 4),
        other => panic!("unknown layout {other}"),
    }
}

fn uniform<R: Rng>(rng: &mut R) -> f64 {
    rng.gen_range(-1.0..1.0)
}

fn vector<R: Rng>(rng: &mut R) -> DVec3 {
    DVec3::new(uniform(rng), uniform(rng), uniform(rng))
}

/// Every coupling nonzero, so no term can hide a bookkeeping error.
pub fn random_parameters<R: Rng>(rng: &mut R) -> Parameters {
    Parameters {
        kt: rng.gen_range(0.1..1.0),
        field: vector(rng),
        s_l: rng.gen_range(0.5..1.5),
        s_r: rng.gen_range(0.5..1.5),
        f_l: rng.gen_range(0.0..0.5),
        f_r: rng.gen_range(0.0..0.5),
        j_l: uniform(rng),
        j_r: uniform(rng),
        j_ml: uniform(rng),
        j_mr: uniform(rng),
        j_lr: uniform(rng),
        je0_l: uniform(rng),
        je0_r: uniform(rng),
        je1_l: uniform(rng),
        je1_r: uniform(rng),
        je1_ml: uniform(rng),
        je1_mr: uniform(rng),
        je1_lr: uniform(rng),
        jee_l: uniform(rng),
        jee_r: uniform(rng),
        jee_ml: uniform(rng),
        jee_mr: uniform(rng),
        jee_lr: uniform(rng),
        b_l: uniform(rng),
        b_r: uniform(rng),
        b_ml: uniform(rng),
        b_mr: uniform(rng),
        b_lr: uniform(rng),
        a_l: vector(rng),
        a_r: vector(rng),
        d_l: vector(rng),
        d_r: vector(rng),
        d_ml: vector(rng),
        d_mr: vector(rng),
        d_lr: vector(rng),
    }
}

pub fn random_node<R: Rng>(rng: &mut R) -> NodeParameters {
    NodeParameters {
        sm: rng.gen_range(0.5..1.5),
        fm: rng.gen_range(0.0..0.5),
        je0m: uniform(rng),
        am: vector(rng),
    }
}

pub fn random_edge<R: Rng>(rng: &mut R) -> EdgeParameters {
    EdgeParameters {
        jm: uniform(rng),
        je1m: uniform(rng),
        jeem: uniform(rng),
        bm: uniform(rng),
        dm: vector(rng),
    }
}

/// A chain over `n` nodes plus a backward edge, a self-loop and random
/// leads, all with random parameters.
pub fn random_proto<R: Rng>(n: usize, rng: &mut R) -> MolProto {
    let mut proto = MolProto::new();
    for _ in 0..n {
        proto.create_node(random_node(rng));
    }
    if n == 0 {
        return proto;
    }
    for i in 1..n {
        proto.connect_nodes(i - 1, i, random_edge(rng)).unwrap();
    }
    if n >= 2 {
        proto.connect_nodes(n - 1, 0, random_edge(rng)).unwrap();
    }
    let looped = rng.gen_range(0..n);
    proto.connect_nodes(looped, looped, random_edge(rng)).unwrap();
    proto
        .set_leads(rng.gen_range(0..n), rng.gen_range(0..n))
        .unwrap();
    proto
}

/// A randomly parameterized device in a random state.
pub fn random_device<R: Rng>(layout_name: &str, rng: &mut R) -> Device {
    let (geometry, nodes) = layout(layout_name);
    let proto = random_proto(nodes, rng);
    let params = random_parameters(rng);
    let mut device = Device::with_prototype(&geometry, proto, params, InitialState::default());
    device.randomize(rng);
    device
}

/// Tolerance for comparing incrementally maintained results with a recompute.
pub fn tolerance(device: &Device) -> f64 {
    1e-9 * (1.0 + device.results().u.abs() + device.lattice().counts().n as f64)
}

pub fn random_site_state<R: Rng>(rng: &mut R) -> (DVec3, DVec3) {
    let spin = random_on_sphere(rng.gen_range(0.5..2.0), rng);
    let flux = random_on_sphere(rng.gen_range(0.0..0.5), rng);
    (spin, flux)
}

/// 5x5x5, molecule at x = 3, neck rows and layers 1..=3.
pub fn scenario_geometry() -> Geometry {
    Geometry {
        width: 5,
        height: 5,
        depth: 5,
        mol_pos_l: 3,
        mol_pos_r: 3,
        top_l: 1,
        bottom_l: 3,
        front_r: 1,
        back_r: 3,
    }
}
