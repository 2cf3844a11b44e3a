//! Merge resolver: newest generation wins, merged bit on two or more

use proptest::prelude::*;
use splaylsm::splay::{decode_tagged, SplayMerge, Tag, LEGACY_SENTINEL};
use splaylsm::MergeOperator;

use super::record;

fn full(existing: Option<&[u8]>, operands: &[&[u8]]) -> Option<Vec<u8>> {
    SplayMerge.full_merge(b"key", existing, operands)
}

#[test]
fn test_newest_generation_wins_and_is_marked_merged() {
    let old = record(false, false, b"old");
    let mid = record(true, false, b"mid");
    let new = record(false, false, b"new");

    let merged = full(Some(old.as_slice()), &[mid.as_slice(), new.as_slice()]).unwrap();
    assert_eq!(merged, record(false, true, b"new"));
}

#[test]
fn test_newest_splayed_bit_is_kept() {
    let old = record(false, false, b"old");
    let new = record(true, false, b"new");

    let merged = full(Some(old.as_slice()), &[new.as_slice()]).unwrap();
    assert_eq!(merged, record(true, true, b"new"));
}

#[test]
fn test_single_generation_is_left_alone() {
    let only = record(false, false, b"v");
    assert_eq!(full(None, &[only.as_slice()]), Some(only.clone()));
    assert_eq!(full(Some(only.as_slice()), &[]), Some(only));
}

#[test]
fn test_sentinel_and_malformed_generations_are_skipped() {
    let old = record(false, false, b"old");
    let garbage: &[u8] = &[0x40, 1, 2];

    // Only one well-formed generation remains, so no merged bit
    let merged = full(Some(old.as_slice()), &[LEGACY_SENTINEL, garbage, &b""[..]]).unwrap();
    assert_eq!(merged, old);

    // A malformed newest generation does not hide the older record
    let newer = record(false, false, b"newer");
    let merged = full(Some(old.as_slice()), &[newer.as_slice(), garbage]).unwrap();
    assert_eq!(merged, record(false, true, b"newer"));
}

#[test]
fn test_nothing_well_formed_fails_the_merge() {
    assert_eq!(full(None, &[LEGACY_SENTINEL]), None);
    assert_eq!(full(Some(&b""[..]), &[&[0xffu8][..]]), None);
    assert_eq!(SplayMerge.partial_merge(b"key", &[LEGACY_SENTINEL]), None);
}

#[test]
fn test_partial_merge_matches_full_merge_without_base() {
    let a = record(false, false, b"a");
    let b = record(false, true, b"b");
    let operands = [a.as_slice(), b.as_slice()];
    assert_eq!(SplayMerge.partial_merge(b"key", &operands), full(None, &operands));
}

#[test]
fn test_operator_folds_overwrites() {
    assert!(SplayMerge.folds_overwrites());
}

// =============================================================================
// Properties
// =============================================================================

fn arb_generation() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        4 => (0u8..4, prop::collection::vec(any::<u8>(), 0..8))
            .prop_map(|(tag, payload)| {
                let mut record = vec![tag];
                record.extend(payload);
                record
            }),
        1 => Just(LEGACY_SENTINEL.to_vec()),
        1 => prop::collection::vec(any::<u8>(), 0..4),
    ]
}

fn refs(generations: &[Vec<u8>]) -> Vec<&[u8]> {
    generations.iter().map(Vec::as_slice).collect()
}

proptest! {
    #[test]
    fn prop_split_merge_equals_merge(
        generations in prop::collection::vec(arb_generation(), 0..12),
        split in 0usize..12,
    ) {
        let split = split.min(generations.len());
        let (older, newer) = generations.split_at(split);

        let whole = SplayMerge.partial_merge(b"key", &refs(&generations));

        let parts: Vec<Vec<u8>> = [older, newer]
            .iter()
            .filter_map(|part| SplayMerge.partial_merge(b"key", &refs(part)))
            .collect();
        let regrouped = SplayMerge.partial_merge(b"key", &refs(&parts));

        prop_assert_eq!(whole, regrouped);
    }

    #[test]
    fn prop_output_is_always_a_tagged_record(
        generations in prop::collection::vec(arb_generation(), 1..12),
    ) {
        let all = refs(&generations);
        if let Some(merged) = SplayMerge.full_merge(b"key", Some(all[0]), &all[1..]) {
            prop_assert_ne!(merged.as_slice(), LEGACY_SENTINEL);
            let (tag, _) = decode_tagged(&merged).unwrap();
            let well_formed = generations
                .iter()
                .filter(|g| g.as_slice() != LEGACY_SENTINEL && decode_tagged(g).is_ok())
                .count();
            prop_assert_eq!(tag.is_merged(), well_formed >= 2 || tag_of_newest(&generations).is_merged());
        }
    }
}

fn tag_of_newest(generations: &[Vec<u8>]) -> Tag {
    generations
        .iter()
        .rev()
        .filter(|g| g.as_slice() != LEGACY_SENTINEL)
        .find_map(|g| decode_tagged(g).ok())
        .map(|(tag, _)| tag)
        .unwrap_or_default()
}
