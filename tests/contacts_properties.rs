//! Property-based tests for concatemer grouping and contact derivation

use porec::core::flags::{FLAG_REVERSE, FLAG_SECONDARY, FLAG_SUPPLEMENTARY, FLAG_UNMAPPED};
use porec::core::{
    merge_segments, AlignmentRecord, AnnotateOptions, ConcatemerAlignGroup, ConcatemerAssembler,
    ContactAnnotator, CoordinateRecord, Grouping, PoreCError, Topology,
};
use proptest::prelude::*;

/// (mapped, chromosome, reference start, reverse) for one monomer
type MonomerSpec = (bool, usize, u64, bool);

fn arb_monomers() -> impl Strategy<Value = Vec<MonomerSpec>> {
    prop::collection::vec(
        (prop::bool::weighted(0.7), 0usize..3, 0u64..100_000, any::<bool>()),
        1..12,
    )
}

fn build_records(id: &str, specs: &[MonomerSpec]) -> Vec<AlignmentRecord> {
    let total = specs.len();
    specs
        .iter()
        .enumerate()
        .map(|(idx, &(mapped, chrom, pos, reverse))| {
            let coords = CoordinateRecord {
                start: idx * 100,
                end: idx * 100 + 100,
                concatemer_length: total * 100,
                sub_read_index: idx,
                sub_read_total: total,
            };
            let read_name = coords.read_id(id);
            if mapped {
                let flag = if reverse { FLAG_REVERSE } else { 0 };
                AlignmentRecord::new(read_name, id, coords, flag)
                    .with_reference(format!("chr{}", chrom + 1), pos, Some(pos + 100))
                    .with_mapq(60)
            } else {
                AlignmentRecord::new(read_name, id, coords, FLAG_UNMAPPED)
            }
        })
        .collect()
}

fn annotator(merge_distance: u64, direct_only: bool) -> ContactAnnotator {
    ContactAnnotator::new(AnnotateOptions {
        merge_distance,
        direct_only,
        ..Default::default()
    })
    .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Direct contacts number M - 1 for M mapped monomers
    #[test]
    fn prop_direct_contact_count(specs in arb_monomers()) {
        let mapped = specs.iter().filter(|s| s.0).count();
        let group = ConcatemerAlignGroup::new("c", build_records("c", &specs)).unwrap();
        let direct = annotator(0, true).annotate(&group);
        prop_assert_eq!(direct.len(), mapped.saturating_sub(1));
        prop_assert!(direct.iter().all(|c| c.is_direct));
        prop_assert_eq!(annotator(0, false).annotate_direct(&group), direct);
    }

    /// Without merging every pair of mapped monomers is a contact
    #[test]
    fn prop_all_pairs(specs in arb_monomers()) {
        let mapped = specs.iter().filter(|s| s.0).count();
        let group = ConcatemerAlignGroup::new("c", build_records("c", &specs)).unwrap();
        let contacts = annotator(0, false).annotate(&group);
        prop_assert_eq!(contacts.len(), mapped * mapped.saturating_sub(1) / 2);
        for c in &contacts {
            prop_assert!(c.left.sub_read_index < c.right.sub_read_index);
            prop_assert_eq!(c.is_cis, c.left.reference_name == c.right.reference_name);
            prop_assert_eq!(c.distance.is_some(), c.is_cis);
        }
        let expected = match mapped {
            0 => Topology::AllUnmapped,
            1 => Topology::Singleton,
            _ => Topology::Multiplex,
        };
        prop_assert_eq!(group.topology(), expected);
    }

    /// Arrival order does not change the group
    #[test]
    fn prop_group_order_independent(specs in arb_monomers(), seed in any::<u64>()) {
        let records = build_records("c", &specs);
        let mut shuffled = records.clone();
        let n = shuffled.len();
        for i in 0..n {
            let j = (seed.wrapping_mul(i as u64 + 7) % n as u64) as usize;
            shuffled.swap(i, j);
        }
        let ordered = ConcatemerAlignGroup::new("c", records).unwrap();
        let from_shuffled = ConcatemerAlignGroup::new("c", shuffled).unwrap();
        prop_assert_eq!(ordered, from_shuffled);
    }

    /// Merging an already merged set changes nothing
    #[test]
    fn prop_merge_idempotent(specs in arb_monomers(), distance in 0u64..50_000) {
        let group = ConcatemerAlignGroup::new("c", build_records("c", &specs)).unwrap();
        let once = annotator(distance, false).segments(&group);
        let twice = merge_segments(once.clone(), distance);
        prop_assert_eq!(&twice, &once);

        let monomers: usize = once.iter().map(|s| s.num_monomers).sum();
        prop_assert_eq!(monomers, specs.iter().filter(|s| s.0).count());
        prop_assert!(once.windows(2).all(|w| w[0].sub_read_index < w[1].sub_read_index));
    }

    /// Paired-end view keeps trans contacts and cis contacts in range
    #[test]
    fn prop_paired_end_view(specs in arb_monomers(), min in 0u64..50_000, span in 0u64..50_000) {
        let annotator = ContactAnnotator::new(AnnotateOptions {
            paired_end_min_distance: Some(min),
            paired_end_max_distance: Some(min + span),
            ..Default::default()
        })
        .unwrap();
        let group = ConcatemerAlignGroup::new("c", build_records("c", &specs)).unwrap();
        let contacts = annotator.annotate(&group);
        let view = annotator.paired_end_view(&contacts);
        for c in &contacts {
            let kept = view.contains(&c);
            match c.distance {
                None => prop_assert!(kept),
                Some(d) => prop_assert_eq!(kept, d >= min && d <= min + span),
            }
        }
    }

    /// Contiguous assembly yields one group per concatemer, in input order
    #[test]
    fn prop_assembler_groups(groups in prop::collection::vec(arb_monomers(), 0..6)) {
        let mut input = Vec::new();
        for (i, specs) in groups.iter().enumerate() {
            input.extend(build_records(&format!("c{}", i), specs).into_iter().rev().map(Ok));
        }
        let assembled: Vec<ConcatemerAlignGroup> =
            ConcatemerAssembler::new(input.into_iter(), Grouping::Contiguous)
                .collect::<Result<_, _>>()
                .unwrap();
        prop_assert_eq!(assembled.len(), groups.len());
        for (i, group) in assembled.iter().enumerate() {
            prop_assert_eq!(&group.concatemer_id, &format!("c{}", i));
            prop_assert_eq!(group.len(), groups[i].len());
            prop_assert!(group.records.windows(2).all(|w| w[0].coords.start < w[1].coords.start));
        }
    }
}

#[test]
fn test_unmapped_monomers_keep_adjacency() {
    // mapped, unmapped, unmapped, mapped: still one direct contact
    let specs = vec![
        (true, 0, 1_000, false),
        (false, 0, 0, false),
        (false, 0, 0, false),
        (true, 0, 5_000, true),
    ];
    let group = ConcatemerAlignGroup::new("c", build_records("c", &specs)).unwrap();
    let contacts = annotator(0, false).annotate(&group);
    assert_eq!(contacts.len(), 1);
    assert!(contacts[0].is_direct);
    assert_eq!(contacts[0].distance, Some(4_000));
}

#[test]
fn test_secondary_and_supplementary_are_not_endpoints() {
    let mut records = build_records("c", &[(true, 0, 100, false), (true, 0, 900, false)]);
    let mut extra = records[1].clone();
    extra.flag = FLAG_SUPPLEMENTARY;
    extra.flags = porec::core::classify(FLAG_SUPPLEMENTARY);
    extra.reference_start = 50_000;
    records.push(extra);
    let mut secondary = records[0].clone();
    secondary.flags = porec::core::classify(FLAG_SECONDARY);
    records.push(secondary);

    let group = ConcatemerAlignGroup::new("c", records).unwrap();
    assert_eq!(group.len(), 4);
    let contacts = annotator(0, false).annotate(&group);
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0].distance, Some(800));
}

#[test]
fn test_merge_clusters_same_strand() {
    let specs = vec![
        (true, 0, 1_000, false),
        (true, 0, 1_150, false),
        (true, 1, 1_000, false),
        (true, 0, 1_300, true),
    ];
    let group = ConcatemerAlignGroup::new("c", build_records("c", &specs)).unwrap();
    let segments = annotator(100, false).segments(&group);
    assert_eq!(segments.len(), 3);
    assert_eq!(segments[0].num_monomers, 2);
    assert_eq!((segments[0].start, segments[0].end), (1_000, 1_250));
    let contacts = annotator(100, false).annotate(&group);
    assert_eq!(contacts.len(), 3);
}

#[test]
fn test_invalid_paired_end_bounds() {
    let options = AnnotateOptions {
        paired_end_min_distance: Some(10),
        paired_end_max_distance: Some(5),
        ..Default::default()
    };
    assert!(matches!(
        ContactAnnotator::new(options),
        Err(PoreCError::InvalidConfig(_))
    ));
}
