//! Create/read/write/status/delete over a single flat object, plus the
//! namespace-isolation and not-found behaviors that only show up when a
//! caller outside the crate drives the public surface end to end.

use stratum_core::{StratumError, TransformationKind, TransformationMode};

use crate::fixture::Harness;

#[tokio::test]
async fn create_write_read_status_delete_round_trips() {
    let h = Harness::new("flat-lifecycle-basic");
    let obj = h.flat("report");
    obj.create(TransformationKind::None, TransformationMode::Client)
        .await
        .unwrap();

    let (written, original_size, transformed_size) =
        obj.write(&[(0, b"hello world".to_vec())]).await.unwrap();
    assert_eq!(written, vec![11]);
    assert_eq!(original_size, 11);
    assert_eq!(transformed_size, 11);

    let read = obj.read(&[(11, 0)]).await.unwrap();
    assert_eq!(read, vec![(b"hello world".to_vec(), 11)]);

    let (_, status_original, status_transformed, kind) = obj.status().await.unwrap();
    assert_eq!(status_original, 11);
    assert_eq!(status_transformed, 11);
    assert_eq!(kind, TransformationKind::None);

    obj.delete().await.unwrap();
    assert!(obj.read(&[(11, 0)]).await.is_err());
}

#[tokio::test]
async fn same_name_in_different_namespaces_is_isolated() {
    let h = Harness::new("flat-lifecycle-namespaces");
    let a = h.flat_in("tenant-a", "shared-name");
    let b = h.flat_in("tenant-b", "shared-name");

    a.create(TransformationKind::None, TransformationMode::Client)
        .await
        .unwrap();
    a.write(&[(0, b"A".to_vec())]).await.unwrap();
    b.create(TransformationKind::None, TransformationMode::Client)
        .await
        .unwrap();
    b.write(&[(0, b"B".to_vec())]).await.unwrap();

    let read_a = a.read(&[(1, 0)]).await.unwrap();
    let read_b = b.read(&[(1, 0)]).await.unwrap();
    assert_eq!(read_a[0].0, b"A");
    assert_eq!(read_b[0].0, b"B");

    a.delete().await.unwrap();
    assert!(a.read(&[(1, 0)]).await.is_err());
    assert!(b.read(&[(1, 0)]).await.is_ok());
}

#[tokio::test]
async fn reading_object_that_was_never_created_is_an_error() {
    let h = Harness::new("flat-lifecycle-missing");
    let obj = h.flat("never-created");
    let err = obj.read(&[(4, 0)]).await.unwrap_err();
    assert!(matches!(err, StratumError::NotFound { .. }));
}

#[tokio::test]
async fn partial_overwrite_preserves_surrounding_bytes() {
    let h = Harness::new("flat-lifecycle-partial");
    let obj = h.flat("doc");
    obj.create(TransformationKind::None, TransformationMode::Client)
        .await
        .unwrap();
    obj.write(&[(0, b"0123456789".to_vec())]).await.unwrap();
    obj.write(&[(3, b"XYZ".to_vec())]).await.unwrap();

    let read = obj.read(&[(10, 0)]).await.unwrap();
    assert_eq!(read[0].0, b"012XYZ6789");
}
