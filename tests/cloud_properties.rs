use cloud_testdata::{gen_observations, DistKind, DOMAIN_MAX, DOMAIN_MIN};
use gr_cloud::cloud::precision::round_to_precision;
use gr_cloud::cloud::test_helpers::{assert_close, assert_rel_close};
use gr_cloud::Cloud;

const KINDS: [DistKind; 4] = [
    DistKind::Uniform,
    DistKind::Normal { sigma: 30.0 },
    DistKind::Clustered,
    DistKind::Lattice,
];

fn build(max_points: usize, coords: usize) -> Cloud {
    Cloud::builder()
        .max_points(max_points)
        .dimensions(coords)
        .build()
        .expect("valid cloud")
}

fn fill(cloud: &mut Cloud, data: &[Vec<f64>]) {
    for p in data {
        cloud.insert(p).expect("insert");
    }
}

#[test]
fn capacity_and_tree_consistency_hold_after_every_insert() {
    for (k, kind) in KINDS.into_iter().enumerate() {
        let data = gen_observations(kind, 400, 2, 100 + k as u64);
        let mut cloud = build(24, 2);
        for p in &data {
            cloud.insert(p).expect("insert");
            assert!(cloud.len() <= 24);
            cloud
                .check_invariants()
                .unwrap_or_else(|e| panic!("{kind:?}: {e}"));
        }
    }
}

#[test]
fn reduction_conserves_mass_and_first_moment() {
    for (k, kind) in KINDS.into_iter().enumerate() {
        let data = gen_observations(kind, 1_500, 3, 7 + k as u64);
        let mut cloud = build(40, 3);
        fill(&mut cloud, &data);

        let inserted: f64 = data.iter().map(|p| p[0]).sum();
        assert_rel_close(&format!("{kind:?} volume"), inserted, cloud.total_volume(), 1e-9);
        assert_rel_close(&format!("{kind:?} mass"), inserted, cloud.total_mass(), 1e-9);
        assert!(cloud.displacement() > 0.0);

        for axis in 1..4 {
            let want: f64 = data.iter().map(|p| p[0] * p[axis]).sum::<f64>() / inserted;
            let got: f64 = cloud.points().map(|p| p[0] * p[axis]).sum::<f64>() / cloud.total_mass();
            assert_close(&format!("{kind:?} centroid[{axis}]"), want, got, 1e-6);
        }
    }
}

#[test]
fn boundary_points_keep_every_axis_extent() {
    for (k, kind) in KINDS.into_iter().enumerate() {
        let data = gen_observations(kind, 800, 2, 55 + k as u64);
        let mut cloud = build(16, 2);
        fill(&mut cloud, &data);

        for axis in 1..3 {
            let lo = data.iter().map(|p| p[axis]).fold(f64::INFINITY, f64::min);
            let hi = data.iter().map(|p| p[axis]).fold(f64::NEG_INFINITY, f64::max);
            let (got_lo, got_hi) = cloud.extent(axis).expect("non-empty");
            assert_eq!(got_lo, round_to_precision(lo), "{kind:?} axis {axis} min");
            assert_eq!(got_hi, round_to_precision(hi), "{kind:?} axis {axis} max");
        }
    }
}

#[test]
fn ties_merge_without_reduction() {
    // 21 x 21 lattice values fit, so repeated observations only add mass.
    let data = gen_observations(DistKind::Lattice, 3_000, 2, 3);
    let mut cloud = build(441, 2);
    fill(&mut cloud, &data);
    assert!(cloud.len() <= 441);
    assert_eq!(cloud.displacement(), 0.0);
    assert_eq!(cloud.total_mass(), 3_000.0);
    cloud.check_invariants().expect("consistent");
}

#[test]
fn whole_domain_range_returns_everything() {
    for (k, kind) in KINDS.into_iter().enumerate() {
        let data = gen_observations(kind, 600, 2, 21 + k as u64);
        let mut cloud = build(32, 2);
        fill(&mut cloud, &data);

        let far = vec![(DOMAIN_MIN * 10.0, DOMAIN_MAX * 10.0)];
        let sel = cloud
            .range_query(&[vec![], far.clone(), far])
            .expect("query");
        assert_eq!(sel.len(), cloud.len());
        assert!(sel.iter().all(|(_, w)| (w - 1.0).abs() < 1e-12));
        assert_rel_close(&format!("{kind:?}"), cloud.total_mass(), sel.mass(), 1e-12);
    }
}

#[test]
fn half_domain_range_is_roughly_half_for_uniform_data() {
    let data = gen_observations(DistKind::Uniform, 4_000, 1, 11);
    let mut cloud = build(64, 1);
    fill(&mut cloud, &data);

    let truth: f64 = data.iter().filter(|p| p[1] < 0.0).map(|p| p[0]).sum();
    let sel = cloud
        .range_query(&[vec![], vec![(DOMAIN_MIN * 2.0, 0.0)]])
        .expect("query");
    assert_rel_close("left half", truth, sel.mass(), 0.1);
}

#[test]
fn four_points_in_a_row() {
    let mut cloud = build(10, 1);
    fill(
        &mut cloud,
        &[vec![1.0, 0.0], vec![1.0, 1.0], vec![1.0, 2.0], vec![1.0, 3.0]],
    );
    let sel = cloud
        .range_query(&[vec![], vec![(-5.0, 8.0)]])
        .expect("query");
    assert_close("mass", 4.0, sel.mass(), 1e-9);
}

#[test]
fn four_points_on_a_square() {
    let mut cloud = build(8, 2);
    fill(
        &mut cloud,
        &[
            vec![1.0, 1.0, 1.0],
            vec![1.0, 2.0, 1.0],
            vec![1.0, 1.0, 2.0],
            vec![1.0, 2.0, 2.0],
        ],
    );
    assert_eq!(cloud.len(), 4);
    let sel = cloud
        .range_query(&[vec![], vec![(0.0, 3.0)], vec![(0.0, 3.0)]])
        .expect("query");
    assert_close("mass", 4.0, sel.mass(), 1e-9);
}

#[test]
fn nine_points_kept_as_four() {
    let mut cloud = build(4, 1);
    let data: Vec<Vec<f64>> = (0..9).map(|x| vec![1.0, x as f64]).collect();
    fill(&mut cloud, &data);

    assert_eq!(cloud.len(), 4);
    assert!(cloud.displacement() > 0.0);
    let xs: Vec<f64> = cloud.points().map(|p| p[1]).collect();
    assert!(xs.contains(&0.0) && xs.contains(&8.0), "{xs:?}");
    assert_close("mass", 9.0, cloud.total_mass(), 1e-9);
}

#[test]
fn single_value_axis_selects_by_membership() {
    let mut cloud = build(10, 2);
    for y in [0.0, 1.0, 2.0] {
        cloud.insert(&[1.0, 5.0, y]).expect("insert");
    }
    let inside = cloud
        .range_query(&[vec![], vec![(4.0, 6.0)]])
        .expect("query");
    assert_close("inside", 3.0, inside.mass(), 0.0);
    let outside = cloud
        .range_query(&[vec![], vec![(5.5, 6.0)]])
        .expect("query");
    assert_close("outside", 0.0, outside.mass(), 0.0);
}
