//! Chunked objects split a logical stream across fixed-size flat children;
//! these tests check the boundary arithmetic and growth behavior from the
//! outside, the way a caller storing a stream larger than one chunk would.

use stratum_core::{TransformationKind, TransformationMode};

use crate::fixture::Harness;

#[tokio::test]
async fn write_within_one_chunk_does_not_grow_chunk_count() {
    let h = Harness::new("chunked-geometry-single");
    let obj = h.chunked("blob");
    obj.create(TransformationKind::None, TransformationMode::Client, 64)
        .await
        .unwrap();
    obj.write(0, b"small payload").await.unwrap();

    let (original_size, _, _, chunk_count, chunk_size) = obj.status().await.unwrap();
    assert_eq!(original_size, 13);
    assert_eq!(chunk_count, 1);
    assert_eq!(chunk_size, 64);
}

#[tokio::test]
async fn write_exactly_on_a_chunk_boundary_starts_a_new_chunk() {
    let h = Harness::new("chunked-geometry-boundary");
    let obj = h.chunked("blob");
    obj.create(TransformationKind::None, TransformationMode::Client, 8)
        .await
        .unwrap();
    // Exactly one full chunk, then one more byte landing at offset 8 —
    // the first byte of chunk 1.
    obj.write(0, &[b'a'; 8]).await.unwrap();
    obj.write(8, b"b").await.unwrap();

    let (_, _, _, chunk_count, _) = obj.status().await.unwrap();
    assert_eq!(chunk_count, 2);

    let read = obj.read(0, 9).await.unwrap();
    assert_eq!(read, [vec![b'a'; 8], vec![b'b']].concat());
}

#[tokio::test]
async fn write_spanning_three_chunks_reads_back_contiguously() {
    let h = Harness::new("chunked-geometry-span");
    let obj = h.chunked("blob");
    obj.create(TransformationKind::None, TransformationMode::Client, 5)
        .await
        .unwrap();
    let payload = b"the quick brown fox";
    obj.write(0, payload).await.unwrap();

    let (_, _, _, chunk_count, _) = obj.status().await.unwrap();
    assert_eq!(chunk_count, (payload.len() as u64).div_ceil(5));

    let read = obj.read(0, payload.len() as u64).await.unwrap();
    assert_eq!(read, payload);
}

#[tokio::test]
async fn read_past_the_written_range_truncates_without_creating_chunks() {
    let h = Harness::new("chunked-geometry-eof");
    let obj = h.chunked("blob");
    obj.create(TransformationKind::None, TransformationMode::Client, 4)
        .await
        .unwrap();
    obj.write(0, b"xy").await.unwrap();

    let read = obj.read(0, 1000).await.unwrap();
    assert_eq!(read, b"xy");

    let (_, _, _, chunk_count, _) = obj.status().await.unwrap();
    assert_eq!(chunk_count, 1);
}

#[tokio::test]
async fn size_changing_codec_rewrites_only_the_touched_chunk() {
    let h = Harness::new("chunked-geometry-rle");
    let obj = h.chunked("blob");
    obj.create(TransformationKind::Rle, TransformationMode::Client, 6)
        .await
        .unwrap();
    obj.write(0, b"AAAAAA").await.unwrap();
    obj.write(0, b"BB").await.unwrap();

    let read = obj.read(0, 6).await.unwrap();
    assert_eq!(read, b"BBAAAA");
}
