//! Integration tests for SyncRill: sequencing, dispatch protocol, lifecycle.

mod common;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use common::{init_tracing, reference, seq, Call, InterceptingConsumer};
use rill_engine::{DelegatingConsumer, Emission, RillError, RillStatus, Subscription, SyncRill};
use rill_events::{Commit, Event, EventId, RillDetails, Sequence, Timestamp};

// =========================================================================
// Sequencing
// =========================================================================

#[test]
fn plain_emits_get_consecutive_sequences_from_first() {
    init_tracing();
    let rill = SyncRill::new(reference());

    let events: Vec<_> = (0..10).map(|n| rill.emit(n).unwrap()).collect();

    let sequences: Vec<u64> = events.iter().map(|e| e.sequence().value()).collect();
    assert_eq!(sequences, (1..=10).collect::<Vec<_>>());
    let ids: HashSet<EventId> = events.iter().map(|e| e.id()).collect();
    assert_eq!(ids.len(), 10);
    assert_eq!(rill.sequence(), seq(10));
}

#[test]
fn explicit_sequence_must_be_the_next_one() {
    let rill = SyncRill::new(reference());
    rill.emit("first").unwrap();

    let err = rill
        .emit_with(Emission::new("late").with_sequence(seq(5)))
        .unwrap_err();

    assert!(matches!(
        err,
        RillError::EventOutOfOrder { expected, actual }
            if expected == seq(2) && actual == seq(5)
    ));
    assert_eq!(rill.sequence(), Sequence::FIRST);

    let accepted = rill
        .emit_with(Emission::new("second").with_sequence(seq(2)))
        .unwrap();
    assert_eq!(accepted.sequence(), seq(2));
}

#[test]
fn out_of_order_emit_reaches_no_consumer() {
    let rill = SyncRill::new(reference());
    let consumer = InterceptingConsumer::behaving();
    let _sub = rill.subscribe(consumer.clone()).unwrap();

    let _ = rill.emit_with(Emission::new(1).with_sequence(seq(3)));

    assert!(consumer.calls().is_empty());
}

#[test]
fn emit_event_keeps_the_envelope() {
    let rill = SyncRill::new(reference());
    let ts = Timestamp::parse("2031-05-01T12:00:00Z").unwrap();
    let original = Event::from_parts(EventId::new(), Sequence::FIRST, ts, "payload");

    let emitted = rill.emit_event(original.clone()).unwrap();

    assert_eq!(emitted, original);
    assert_eq!(emitted.timestamp(), ts);
    assert_eq!(rill.details().last_changed_at(), ts);
}

#[test]
fn resumed_rill_continues_after_known_sequence() {
    let ts = Timestamp::now();
    let details = RillDetails::from_parts(reference(), seq(5), ts, ts).unwrap();
    let rill = SyncRill::with_details(details);

    let event = rill.emit("next").unwrap();

    assert_eq!(event.sequence(), seq(6));
}

// =========================================================================
// Subscriptions
// =========================================================================

#[test]
fn same_consumer_can_not_subscribe_twice() {
    let rill = SyncRill::<u32>::new(reference());
    let consumer = InterceptingConsumer::behaving();
    let _sub = rill.subscribe(consumer.clone()).unwrap();

    let err = rill.subscribe(consumer).unwrap_err();

    assert!(matches!(err, RillError::AlreadySubscribed));
}

#[test]
fn disposed_subscriber_receives_nothing() {
    let rill = SyncRill::new(reference());
    let consumer = InterceptingConsumer::behaving();
    let sub = rill.subscribe(consumer.clone()).unwrap();

    rill.emit(1).unwrap();
    sub.dispose();
    sub.dispose();
    rill.emit(2).unwrap();

    assert_eq!(consumer.new_sequences(), vec![Sequence::FIRST]);
    assert_eq!(rill.subscriber_count(), 0);
}

#[test]
fn dropping_the_subscription_unsubscribes() {
    let rill = SyncRill::new(reference());
    let consumer = InterceptingConsumer::behaving();

    {
        let _sub = rill.subscribe(consumer.clone()).unwrap();
        rill.emit(1).unwrap();
    }
    rill.emit(2).unwrap();

    assert_eq!(consumer.new_ids().len(), 1);
}

#[test]
fn consumer_can_dispose_its_own_subscription_while_handling() {
    let rill = SyncRill::<u32>::new(reference());
    let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let consumer = {
        let slot = slot.clone();
        let seen = seen.clone();
        DelegatingConsumer::new(move |event: &Event<u32>| {
            seen.lock().unwrap().push(*event.content());
            if let Some(sub) = slot.lock().unwrap().take() {
                sub.dispose();
            }
            Ok(())
        })
    };
    *slot.lock().unwrap() = Some(rill.subscribe(Arc::new(consumer)).unwrap());

    rill.emit(1).unwrap();
    rill.emit(2).unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![1]);
}

// =========================================================================
// Dispatch protocol
// =========================================================================

#[test]
fn every_consumer_is_told_when_all_succeeded() {
    let rill = SyncRill::new(reference());
    let a = InterceptingConsumer::behaving();
    let b = InterceptingConsumer::behaving();
    let _sa = rill.subscribe(a.clone()).unwrap();
    let _sb = rill.subscribe(b.clone()).unwrap();

    let event = rill.emit("x").unwrap();

    for consumer in [&a, &b] {
        assert_eq!(
            consumer.calls(),
            vec![
                Call::New(event.id(), event.sequence()),
                Call::Succeeded(event.id())
            ]
        );
    }
}

#[test]
fn one_failing_consumer_fails_the_event_for_everyone() {
    init_tracing();
    let rill = SyncRill::new(reference());
    let failing = InterceptingConsumer::misbehaving();
    let behaving = InterceptingConsumer::behaving();
    let _sf = rill.subscribe(failing.clone()).unwrap();
    let _sb = rill.subscribe(behaving.clone()).unwrap();

    let events: Vec<_> = (0..3).map(|n| rill.emit(n).unwrap()).collect();
    let ids: Vec<_> = events.iter().map(|e| e.id()).collect();

    for consumer in [&failing, &behaving] {
        assert_eq!(consumer.new_ids(), ids);
        assert_eq!(consumer.failed_ids(), ids);
        assert!(consumer.succeeded_ids().is_empty());
    }
}

#[test]
fn failing_consumer_does_not_stop_later_consumers_seeing_the_event() {
    let rill = SyncRill::new(reference());
    let first = InterceptingConsumer::misbehaving();
    let second = InterceptingConsumer::misbehaving();
    let third = InterceptingConsumer::behaving();
    let _s1 = rill.subscribe(first.clone()).unwrap();
    let _s2 = rill.subscribe(second.clone()).unwrap();
    let _s3 = rill.subscribe(third.clone()).unwrap();

    let event = rill.emit(7).unwrap();

    assert_eq!(third.new_ids(), vec![event.id()]);
    assert_eq!(third.failed_ids(), vec![event.id()]);
}

#[test]
fn failure_passed_to_on_failed_aggregates_every_error() {
    let rill = SyncRill::<u32>::new(reference());
    let captured = Arc::new(Mutex::new(String::new()));
    let _s1 = rill.subscribe(InterceptingConsumer::misbehaving()).unwrap();
    let _s2 = rill.subscribe(InterceptingConsumer::broken()).unwrap();
    let observer = {
        let captured = captured.clone();
        DelegatingConsumer::new(|_: &Event<u32>| Ok(())).when_failed(move |_, error| {
            *captured.lock().unwrap() = error.to_string();
            Ok(())
        })
    };
    let _s3 = rill.subscribe(Arc::new(observer)).unwrap();

    rill.emit(1).unwrap();

    let message = captured.lock().unwrap().clone();
    assert!(message.starts_with("2 consumer(s) failed"), "{message}");
    assert!(message.contains("refused"), "{message}");
    assert!(message.contains("broke"), "{message}");
}

#[test]
fn error_while_acknowledging_is_returned_but_sequence_stays_advanced() {
    let rill = SyncRill::new(reference());
    let grumpy = InterceptingConsumer::failing_on_succeeded();
    let behaving = InterceptingConsumer::behaving();
    let _s1 = rill.subscribe(grumpy.clone()).unwrap();
    let _s2 = rill.subscribe(behaving.clone()).unwrap();

    let err = rill.emit(1).unwrap_err();

    match err {
        RillError::SucceededNotification(failures) => assert_eq!(failures.len(), 1),
        other => panic!("expected SucceededNotification, got {other:?}"),
    }
    assert_eq!(behaving.succeeded_ids().len(), 1);
    assert_eq!(rill.sequence(), Sequence::FIRST);
}

#[test]
fn error_while_reporting_failure_is_returned() {
    let rill = SyncRill::new(reference());
    let _s1 = rill.subscribe(InterceptingConsumer::misbehaving()).unwrap();
    let _s2 = rill
        .subscribe(InterceptingConsumer::failing_on_failed())
        .unwrap();

    let err = rill.emit(1).unwrap_err();

    assert!(matches!(err, RillError::FailedNotification(f) if f.len() == 1));
}

// =========================================================================
// Commit replay
// =========================================================================

#[test]
fn emit_commit_replays_events_in_order() {
    let reference = reference();
    let originals: Vec<_> = (1..=3)
        .map(|n| Event::from_parts(EventId::new(), seq(n), Timestamp::now(), n as u32))
        .collect();
    let commit = Commit::new(reference.clone(), originals.clone()).unwrap();
    let rill = SyncRill::new(reference);
    let consumer = InterceptingConsumer::behaving();
    let _sub = rill.subscribe(consumer.clone()).unwrap();

    let high_water = rill.emit_commit(&commit).unwrap();

    assert_eq!(high_water, seq(3));
    assert_eq!(
        consumer.new_ids(),
        originals.iter().map(|e| e.id()).collect::<Vec<_>>()
    );
}

#[test]
fn emit_commit_rejects_foreign_commits() {
    let commit = Commit::new(
        reference(),
        vec![Event::from_parts(EventId::new(), Sequence::FIRST, Timestamp::now(), 1u32)],
    )
    .unwrap();
    let rill = SyncRill::new(reference());

    let err = rill.emit_commit(&commit).unwrap_err();

    assert!(matches!(err, RillError::ReferenceMismatch { .. }));
    assert_eq!(rill.sequence(), Sequence::NONE);
}

// =========================================================================
// Lifecycle
// =========================================================================

#[test]
fn complete_notifies_consumers_and_closes_the_rill() {
    let rill = SyncRill::<u32>::new(reference());
    let a = InterceptingConsumer::failing_on_completed();
    let b = InterceptingConsumer::behaving();
    let _sa = rill.subscribe(a.clone()).unwrap();
    let _sb = rill.subscribe(b.clone()).unwrap();

    rill.complete().unwrap();

    assert_eq!(a.completed_count(), 1);
    assert_eq!(b.completed_count(), 1);
    assert_eq!(rill.status(), RillStatus::Completed);
    assert!(matches!(rill.emit(1), Err(RillError::Completed)));
    assert!(matches!(
        rill.subscribe(InterceptingConsumer::behaving()),
        Err(RillError::Completed)
    ));
    assert!(matches!(rill.complete(), Err(RillError::Completed)));
}

#[test]
fn dispose_is_idempotent_and_terminal() {
    let rill = SyncRill::<u32>::new(reference());
    let consumer = InterceptingConsumer::behaving();
    let _sub = rill.subscribe(consumer.clone()).unwrap();

    rill.dispose();
    rill.dispose();

    assert_eq!(rill.status(), RillStatus::Disposed);
    assert_eq!(rill.subscriber_count(), 0);
    assert!(matches!(rill.emit(1), Err(RillError::Disposed)));
    assert!(matches!(rill.complete(), Err(RillError::Disposed)));
    assert!(consumer.calls().is_empty());
}

#[test]
fn completed_rill_can_still_be_disposed() {
    let rill = SyncRill::<u32>::new(reference());
    rill.complete().unwrap();

    rill.dispose();

    assert_eq!(rill.status(), RillStatus::Disposed);
}
