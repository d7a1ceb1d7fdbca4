//! Value model tests: references, commits and details headers.
//! No store involved.

use rill_events::{
    Commit, CommitId, Event, EventId, ModelError, RillDetails, RillReference, Sequence,
    SequenceRange, Timestamp,
};
use uuid::Uuid;

fn seq(value: u64) -> Sequence {
    Sequence::from_u64(value).unwrap()
}

fn events(from: u64, count: u64) -> Vec<Event<String>> {
    (from..from + count)
        .map(|n| Event::from_parts(EventId::new(), seq(n), Timestamp::now(), format!("content-{n}")))
        .collect()
}

// =========================================================================
// RillReference
// =========================================================================

#[test]
fn reference_can_be_constructed() {
    let reference = RillReference::new("orders").unwrap();

    assert_eq!(reference.name(), "orders");
    assert!(!reference.id().is_nil());
}

#[test]
fn reference_can_be_reconstructed_from_parts() {
    let original = RillReference::new("orders").unwrap();
    let rebuilt = RillReference::from_parts(original.name(), original.id()).unwrap();

    assert_eq!(original, rebuilt);
}

#[test]
fn reference_round_trips_through_its_string_form() {
    let original = RillReference::new("rill-tran-tests").unwrap();
    let text = original.to_string();
    let parsed: RillReference = text.parse().unwrap();

    assert_eq!(parsed, original);
    assert_eq!(text, format!("rill-tran-tests:{}", original.id().simple()));
}

#[test]
fn reference_name_equality_is_case_insensitive_but_casing_is_kept() {
    let id = Uuid::new_v4();
    let upper = RillReference::from_parts("Orders", id).unwrap();
    let lower = RillReference::from_parts("orders", id).unwrap();

    assert_eq!(upper, lower);
    assert_eq!(upper.name(), "Orders");
    assert_eq!(lower.name(), "orders");

    let mut set = std::collections::HashSet::new();
    set.insert(upper);
    assert!(set.contains(&lower));
}

#[test]
fn reference_with_different_id_is_different() {
    let a = RillReference::new("orders").unwrap();
    let b = RillReference::new("orders").unwrap();
    assert_ne!(a, b);
}

#[test]
fn reference_can_not_be_constructed_if_parts_are_missing() {
    assert_eq!(
        RillReference::new(""),
        Err(ModelError::EmptyIdentifier("name"))
    );
    assert_eq!(
        RillReference::from_parts("orders", Uuid::nil()),
        Err(ModelError::EmptyIdentifier("id"))
    );
    assert_eq!(
        "orders:".parse::<RillReference>(),
        Err(ModelError::EmptyIdentifier("id"))
    );
}

#[test]
fn reference_rejects_malformed_input() {
    assert!(matches!(
        RillReference::new("has space"),
        Err(ModelError::InvalidReferenceName(_))
    ));
    assert!(matches!(
        RillReference::new("a:b"),
        Err(ModelError::InvalidReferenceName(_))
    ));
    assert!(matches!(
        "no-separator".parse::<RillReference>(),
        Err(ModelError::InvalidReference { .. })
    ));
    assert!(matches!(
        "orders:not-a-uuid".parse::<RillReference>(),
        Err(ModelError::InvalidReference { .. })
    ));
}

#[test]
fn reference_serializes_as_its_string_form() {
    let reference = RillReference::new("orders").unwrap();
    let json = serde_json::to_string(&reference).unwrap();

    assert_eq!(json, format!("\"{reference}\""));
    let back: RillReference = serde_json::from_str(&json).unwrap();
    assert_eq!(back, reference);
}

// =========================================================================
// Commit
// =========================================================================

#[test]
fn commit_range_bounds_its_events() {
    let reference = RillReference::new("orders").unwrap();
    let commit = Commit::new(reference.clone(), events(4, 3)).unwrap();

    assert_eq!(commit.reference(), &reference);
    assert_eq!(
        commit.sequence_range(),
        SequenceRange::new(seq(4), seq(6)).unwrap()
    );
    assert_eq!(commit.len(), 3);
    assert_eq!(commit.events()[0].sequence(), seq(4));
    assert_eq!(commit.events()[2].sequence(), seq(6));
}

#[test]
fn commit_requires_at_least_one_event() {
    let reference = RillReference::new("orders").unwrap();
    let result = Commit::<String>::new(reference, Vec::new());

    assert!(matches!(result, Err(ModelError::EmptyCommit)));
}

#[test]
fn commit_rejects_unordered_events() {
    let reference = RillReference::new("orders").unwrap();
    let mut evs = events(1, 3);
    evs.swap(0, 2);

    assert!(matches!(
        Commit::new(reference, evs),
        Err(ModelError::UnorderedCommitEvents { .. })
    ));
}

#[test]
fn rebuilt_commit_must_declare_the_exact_span() {
    let reference = RillReference::new("orders").unwrap();
    let declared = SequenceRange::new(seq(1), seq(5)).unwrap();

    let result = Commit::from_parts(
        CommitId::new(),
        reference,
        declared,
        Timestamp::now(),
        events(1, 3),
    );

    assert!(matches!(
        result,
        Err(ModelError::CommitRangeMismatch { .. })
    ));
}

#[test]
fn commit_clones_share_events() {
    let reference = RillReference::new("orders").unwrap();
    let commit = Commit::new(reference, events(1, 2)).unwrap();
    let clone = commit.clone();

    assert_eq!(clone.id(), commit.id());
    assert_eq!(
        clone.iter().map(|e| e.id()).collect::<Vec<_>>(),
        commit.iter().map(|e| e.id()).collect::<Vec<_>>()
    );
}

// =========================================================================
// RillDetails
// =========================================================================

#[test]
fn new_details_start_without_events() {
    let reference = RillReference::new("orders").unwrap();
    let ts = Timestamp::now();
    let details = RillDetails::new(reference.clone(), ts);

    assert_eq!(details.reference(), &reference);
    assert_eq!(details.sequence(), Sequence::NONE);
    assert_eq!(details.created_at(), ts);
    assert_eq!(details.last_changed_at(), ts);
}

#[test]
fn details_reject_changes_before_creation() {
    let reference = RillReference::new("orders").unwrap();
    let earlier = Timestamp::parse("2024-01-01T00:00:00Z").unwrap();
    let later = Timestamp::parse("2024-06-01T00:00:00Z").unwrap();

    assert_eq!(
        RillDetails::from_parts(reference.clone(), Sequence::FIRST, later, earlier),
        Err(ModelError::ChangedBeforeCreated)
    );
    assert!(RillDetails::from_parts(reference, Sequence::FIRST, earlier, later).is_ok());
}

#[test]
fn advancing_never_moves_last_changed_before_created() {
    let reference = RillReference::new("orders").unwrap();
    let created = Timestamp::parse("2024-06-01T00:00:00Z").unwrap();
    let older = Timestamp::parse("2024-01-01T00:00:00Z").unwrap();

    let details = RillDetails::new(reference, created).advanced(seq(3), older);

    assert_eq!(details.sequence(), seq(3));
    assert_eq!(details.last_changed_at(), created);
}
