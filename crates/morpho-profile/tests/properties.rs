//! Integration tests: ring arithmetic, profile transforms and segment
//! partitions keep their invariants through sequences of public operations.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::cast_precision_loss,
    clippy::cast_possible_wrap
)]

use morpho_profile::boundary::regular_polygon;
use morpho_profile::ring;
use morpho_profile::{
    EngineConfig, Landmark, Point, Population, Profile, ProfileError, ProfileKind, ProfileSample,
    ProfiledOutline, SegmentId, SegmentPartition,
};

fn id(raw: u64) -> SegmentId {
    SegmentId::new(raw)
}

/// Every index covered by exactly one segment.
fn assert_tiles(partition: &SegmentPartition) {
    partition.validate().unwrap();
    for index in 0..partition.total() {
        let covering = partition
            .segments()
            .iter()
            .filter(|s| s.contains(index))
            .count();
        assert_eq!(covering, 1, "index {index} covered {covering} times");
    }
}

fn wave(len: usize) -> Profile {
    Profile::new(
        (0..len)
            .map(|i| (i as f64 * 0.37).sin().mul_add(20.0, 180.0))
            .collect(),
    )
    .unwrap()
}

// --- Ring ---

#[test]
fn wrap_is_idempotent_and_in_range() {
    for len in [3_usize, 4, 7, 100] {
        for i in -350_isize..350 {
            let once = ring::wrap(i, len);
            assert!(once < len);
            assert_eq!(ring::wrap(once as isize, len), once);
        }
    }
}

#[test]
fn offset_round_trip() {
    let p = wave(37);
    for k in [-80_isize, -37, -1, 0, 1, 5, 36, 37, 200] {
        assert_eq!(p.offset(k).offset(-k), p, "offset {k}");
    }
}

#[test]
fn interpolate_to_own_length_is_identity() {
    let p = wave(50);
    let same = p.interpolate(50).unwrap();
    for (a, b) in p.iter().zip(same.iter()) {
        assert!((a - b).abs() < 1e-12);
    }
}

// --- Partitions ---

#[test]
fn operation_sequence_keeps_tiling() {
    let mut partition = SegmentPartition::new(100, 5).unwrap();
    assert_tiles(&partition);

    partition.split(SegmentId::DEFAULT, 30, (id(1), id(2))).unwrap();
    assert_tiles(&partition);
    partition.split(id(2), 60, (id(3), id(4))).unwrap();
    assert_tiles(&partition);
    partition.merge(id(1), id(3), id(5)).unwrap();
    assert_tiles(&partition);
    partition.update(id(5), 3, 55).unwrap();
    assert_tiles(&partition);
    partition.nudge(7);
    assert_tiles(&partition);
    partition.interpolate(150).unwrap();
    assert_tiles(&partition);
    partition.reverse();
    assert_tiles(&partition);
    partition.interpolate(40).unwrap();
    assert_tiles(&partition);

    assert_eq!(partition.total(), 40);
    assert_eq!(partition.len(), 2);
}

#[test]
fn rejected_operations_leave_partition_unchanged() {
    let mut partition = SegmentPartition::from_starts(100, 5, &[0, 20, 60]).unwrap();
    let before = partition.clone();

    assert!(partition.split(id(0), 2, (id(7), id(8))).is_err());
    assert!(partition.merge(id(0), id(0), id(7)).is_err());
    assert!(partition.update(id(1), 21, 98).is_err());
    assert_eq!(partition, before);
}

#[test]
fn unmerge_inverts_merge() {
    let original = SegmentPartition::from_starts(100, 5, &[0, 30, 60]).unwrap();

    for (a, b) in [(id(0), id(1)), (id(1), id(2)), (id(2), id(0))] {
        let mut partition = original.clone();
        partition.merge(a, b, id(9)).unwrap();
        assert_eq!(partition.len(), 2);
        assert_eq!(partition.merge_sources(id(9)).unwrap().len(), 2);

        partition.unmerge(id(9)).unwrap();
        assert_eq!(
            partition.ordered_from(0).unwrap(),
            original.ordered_from(0).unwrap(),
            "merging {a} and {b}"
        );
        assert!(partition.merge_sources(id(9)).is_none());
    }
}

#[test]
fn locked_partition_ignores_structural_changes() {
    let mut partition = SegmentPartition::from_starts(100, 5, &[0, 50]).unwrap();
    partition.set_locked(true);
    let before = partition.starts();

    partition.split(id(0), 25, (id(2), id(3))).unwrap();
    partition.nudge(10);
    assert_eq!(partition.starts(), before);
    assert_eq!(partition.nudged(10).starts(), vec![10, 60]);
}

// --- Scenarios ---

#[test]
fn two_halves_interpolate_to_double_length() {
    let partition = SegmentPartition::from_starts(100, 5, &[0, 50]).unwrap();
    let doubled = partition.interpolated(200).unwrap();
    assert_eq!(doubled.total(), 200);
    assert_eq!(doubled.starts(), vec![0, 100]);
    assert_tiles(&doubled);
}

#[test]
fn moving_reference_shifts_segment_starts() {
    let points = regular_polygon(Point::new(0.0, 0.0), 40.0, 100);
    let mut outline = ProfiledOutline::new(points, &EngineConfig::default()).unwrap();
    outline.set_landmark(Landmark::Reference, 10).unwrap();
    assert_eq!(outline.landmark(&Landmark::Reference).unwrap(), 10);

    outline
        .set_segments(SegmentPartition::from_starts(100, 5, &[0, 25, 70]).unwrap())
        .unwrap();
    let before = outline.segments().starts();
    outline.set_landmark(Landmark::Reference, 30).unwrap();
    let after = outline.segments().starts();

    assert_eq!(before.len(), after.len());
    for (b, a) in before.iter().zip(&after) {
        assert_eq!((b + 20) % 100, *a);
    }
}

#[test]
fn constant_profiles_of_different_length_match() {
    let short = Profile::constant(5.0, 8).unwrap();
    let long = Profile::constant(5.0, 10).unwrap();
    assert!(short.interpolate(10).unwrap().difference(&long).abs() < 1e-10);
    assert!(long.interpolate(8).unwrap().difference(&short).abs() < 1e-10);
}

#[test]
fn split_respects_minimum_length() {
    let mut partition = SegmentPartition::from_starts(100, 5, &[0, 20]).unwrap();
    partition.split(id(0), 10, (id(2), id(3))).unwrap();
    let first = partition.segment(id(2)).unwrap();
    let second = partition.segment(id(3)).unwrap();
    assert_eq!((first.start(), first.end()), (0, 10));
    assert_eq!((second.start(), second.end()), (10, 20));

    let mut fresh = SegmentPartition::from_starts(100, 5, &[0, 20]).unwrap();
    assert!(matches!(
        fresh.split(id(0), 2, (id(2), id(3))),
        Err(ProfileError::SegmentUpdateRejected(_))
    ));
    assert_eq!(fresh.len(), 2);
}

#[test]
fn population_median_and_most_similar() {
    let members = [[1.0, 2.0, 3.0], [2.0, 2.0, 2.0], [3.0, 2.0, 1.0]]
        .into_iter()
        .map(|values| {
            ProfileSample::unsegmented(Profile::new(values.to_vec()).unwrap(), 1.0).unwrap()
        })
        .collect();
    let config = EngineConfig {
        comparison_length: 3,
        ..EngineConfig::default()
    };
    let population = Population::from_members(members, config).unwrap();

    let summary = population
        .aggregate(ProfileKind::Angle, &Landmark::Reference)
        .unwrap();
    assert_eq!(summary.median.values(), &[2.0, 2.0, 2.0]);
    assert_eq!(summary.ranking[0].index, 1);
    assert!(summary.ranking[0].difference.abs() < 1e-12);
    assert_eq!(summary.diagnostics.most_similar, Some(1));
    assert_eq!(summary.diagnostics.skipped, 0);
}

// --- Outlines ---

#[test]
fn outline_population_with_fitted_segments() {
    let config = EngineConfig {
        comparison_length: 120,
        ..EngineConfig::default()
    };
    let outlines: Vec<ProfiledOutline> = [30.0, 35.0, 40.0]
        .into_iter()
        .map(|radius| {
            let points = regular_polygon(Point::new(0.0, 0.0), radius, 120);
            ProfiledOutline::new(points, &config).unwrap()
        })
        .collect();
    let mut population = Population::from_members(outlines, config).unwrap();

    let template = population.members()[0]
        .profile(ProfileKind::Angle, &Landmark::Reference)
        .unwrap();
    let (values, _) = template.into_parts();
    let partition = SegmentPartition::from_starts(120, 5, &[0, 40, 80]).unwrap();
    let template = morpho_profile::SegmentedProfile::new(values, partition).unwrap();

    let applied = population.assign_segments(ProfileKind::Angle, &Landmark::Reference, &template);
    assert_eq!(applied, 3);
    for member in population.members() {
        assert_eq!(member.segments().len(), 3);
        assert_tiles(member.segments());
    }

    let summary = population
        .aggregate(ProfileKind::Radius, &Landmark::Reference)
        .unwrap();
    assert_eq!(summary.diagnostics.members, 3);
    assert_eq!(summary.diagnostics.ranked, 3);
    assert_eq!(summary.variability.len(), 3);
}

#[test]
fn outline_state_survives_json() {
    let points = regular_polygon(Point::new(5.0, -5.0), 20.0, 60);
    let mut outline = ProfiledOutline::new(points, &EngineConfig::default()).unwrap();
    outline.set_landmark(Landmark::Orientation, 12).unwrap();
    outline.set_landmark(Landmark::Reference, 4).unwrap();
    outline
        .set_segments(SegmentPartition::from_starts(60, 5, &[0, 20, 45]).unwrap())
        .unwrap();

    let json = serde_json::to_string(&outline.to_state(false)).unwrap();
    let restored = ProfiledOutline::from_state(serde_json::from_str(&json).unwrap()).unwrap();

    assert_eq!(restored.segments(), outline.segments());
    assert_eq!(restored.landmarks(), outline.landmarks());
    assert_eq!(
        restored.landmark(&Landmark::Intersection).unwrap(),
        outline.landmark(&Landmark::Intersection).unwrap()
    );
}
