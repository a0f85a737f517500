//! Batch coalescing and safety-escalation behavior observed purely through
//! the public surface — no reach into `Batch`'s private run-partitioning.

use std::sync::Arc;

use stratum_client::{Batch, OperationPayload, OperationResult};
use stratum_core::config::SafetyConfig;
use stratum_core::{TransformationKind, TransformationMode};

use crate::fixture::Harness;

#[tokio::test]
async fn non_adjacent_same_object_writes_each_execute_as_their_own_run() {
    // Interleaving a different object's op in the middle breaks contiguity,
    // so this must behave as three independent writes rather than one
    // coalesced whole-object call; the end result must still be correct.
    let h = Harness::new("batch-semantics-interleaved");
    let a = Arc::new(h.flat("alpha"));
    let b = Arc::new(h.flat("beta"));
    a.create(TransformationKind::None, TransformationMode::Client)
        .await
        .unwrap();
    b.create(TransformationKind::None, TransformationMode::Client)
        .await
        .unwrap();

    let mut batch = Batch::new(SafetyConfig::None);
    batch.add(a.clone(), OperationPayload::Write { offset: 0, data: b"A1".to_vec() });
    batch.add(b.clone(), OperationPayload::Write { offset: 0, data: b"B1".to_vec() });
    batch.add(a.clone(), OperationPayload::Write { offset: 2, data: b"A2".to_vec() });

    let results = batch.execute().await.unwrap();
    for op in &results {
        assert!(matches!(op.result(), Some(Ok(OperationResult::Written { .. }))));
    }

    assert_eq!(a.read(&[(4, 0)]).await.unwrap()[0].0, b"A1A2");
    assert_eq!(b.read(&[(2, 0)]).await.unwrap()[0].0, b"B1");
}

#[tokio::test]
async fn create_followed_later_by_delete_on_the_same_object_still_succeeds() {
    // Exercises the escalation path (a create with a later same-object op
    // anywhere in the batch) from outside — the observable contract is
    // just that execution doesn't fail partway through.
    let h = Harness::new("batch-semantics-escalate");
    let obj = Arc::new(h.flat("ephemeral"));

    let mut batch = Batch::new(SafetyConfig::None);
    batch.add(
        obj.clone(),
        OperationPayload::Create {
            kind: TransformationKind::None,
            mode: TransformationMode::Client,
        },
    );
    batch.add(obj.clone(), OperationPayload::Write { offset: 0, data: b"x".to_vec() });
    batch.add(obj.clone(), OperationPayload::Delete);

    let results = batch.execute().await.unwrap();
    assert!(matches!(results[0].result(), Some(Ok(OperationResult::Created))));
    assert!(matches!(results[1].result(), Some(Ok(OperationResult::Written { bytes_written: 1 }))));
    assert!(matches!(results[2].result(), Some(Ok(OperationResult::Deleted))));
}

#[tokio::test]
async fn mixed_read_and_status_ops_each_report_their_own_result() {
    let h = Harness::new("batch-semantics-mixed");
    let obj = Arc::new(h.flat("mixed"));
    obj.create(TransformationKind::None, TransformationMode::Client)
        .await
        .unwrap();
    obj.write(&[(0, b"0123456789".to_vec())]).await.unwrap();

    let mut batch = Batch::new(SafetyConfig::None);
    batch.add(obj.clone(), OperationPayload::Read { length: 4, offset: 0 });
    batch.add(obj.clone(), OperationPayload::Read { length: 4, offset: 4 });
    batch.add(obj.clone(), OperationPayload::Status);

    let results = batch.execute().await.unwrap();
    match results[0].result() {
        Some(Ok(OperationResult::Read { data, bytes_read })) => {
            assert_eq!(data, b"0123");
            assert_eq!(*bytes_read, 4);
        }
        other => panic!("unexpected result: {other:?}"),
    }
    match results[1].result() {
        Some(Ok(OperationResult::Read { data, .. })) => assert_eq!(data, b"4567"),
        other => panic!("unexpected result: {other:?}"),
    }
    match results[2].result() {
        Some(Ok(OperationResult::Status { original_size, transformed_size })) => {
            assert_eq!(*original_size, 10);
            assert_eq!(*transformed_size, 10);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn an_empty_batch_executes_to_an_empty_result() {
    let batch = Batch::new(SafetyConfig::None);
    assert!(batch.is_empty());
    let results = batch.execute().await.unwrap();
    assert!(results.is_empty());
}
