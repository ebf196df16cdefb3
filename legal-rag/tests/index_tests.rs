//! Property and persistence tests for the flat vector index.

use legal_rag::{Chunk, FlatIndex, RagError, VectorIndex};
use proptest::prelude::*;

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map("non-zero embedding", |mut v| {
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm < 1e-8 {
            return None;
        }
        for val in &mut v {
            *val /= norm;
        }
        Some(v)
    })
}

fn chunk(source: &str, id: usize, text: &str) -> Chunk {
    Chunk {
        text: text.to_string(),
        chunk_id: id,
        source_file: source.to_string(),
        file_type: "txt".to_string(),
        total_chunks: id + 1,
    }
}

/// Searching any populated index returns at most `top_k` results in
/// non-increasing score order, each paired with the chunk stored at its slot.
mod prop_flat_search_ordering {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_descending_and_bounded_by_top_k(
            vectors in proptest::collection::vec(arb_normalized_embedding(DIM), 1..20),
            query in arb_normalized_embedding(DIM),
            top_k in 0usize..25,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let chunks: Vec<Chunk> = (0..vectors.len())
                .map(|i| chunk("contract.txt", i, &format!("clause {i}")))
                .collect();

            let results = rt.block_on(async {
                let index = FlatIndex::new(DIM);
                index.add(&vectors, &chunks).await.unwrap();
                index.search(&query, top_k).await.unwrap()
            });

            prop_assert_eq!(results.len(), top_k.min(vectors.len()));

            for window in results.windows(2) {
                prop_assert!(
                    window[0].score >= window[1].score,
                    "results not in descending order: {} < {}",
                    window[0].score,
                    window[1].score
                );
            }

            for result in &results {
                prop_assert_eq!(&result.chunk, &chunks[result.position]);
                prop_assert!(result.score >= -1.0 - 1e-4 && result.score <= 1.0 + 1e-4);
            }
        }
    }
}

#[tokio::test]
async fn save_and_load_round_trip_preserves_search() {
    let dir = tempfile::tempdir().unwrap();
    let index_path = dir.path().join("embeddings").join("index.bin");
    let metadata_path = dir.path().join("embeddings").join("metadata.json");

    let index = FlatIndex::new(3);
    index
        .add(
            &[vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0], vec![0.6, 0.8, 0.0]],
            &[chunk("a.txt", 0, "alpha"), chunk("a.txt", 1, "beta"), chunk("b.txt", 0, "gamma")],
        )
        .await
        .unwrap();
    index.save(&index_path, &metadata_path).await.unwrap();

    let loaded = FlatIndex::load(&index_path, &metadata_path).await.unwrap();
    assert_eq!(loaded.dimensions(), 3);
    assert_eq!(loaded.len().await, 3);

    let query = [0.0, 1.0, 0.0];
    let before = index.search(&query, 3).await.unwrap();
    let after = loaded.search(&query, 3).await.unwrap();
    assert_eq!(before, after);
    assert_eq!(after[0].chunk.text, "beta");
}

#[tokio::test]
async fn empty_index_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let index_path = dir.path().join("index.bin");
    let metadata_path = dir.path().join("metadata.json");

    FlatIndex::new(8).save(&index_path, &metadata_path).await.unwrap();
    let loaded = FlatIndex::load(&index_path, &metadata_path).await.unwrap();
    assert_eq!(loaded.dimensions(), 8);
    assert!(loaded.is_empty().await);
    assert!(loaded.search(&[0.0; 8], 5).await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_files_are_reported_by_kind() {
    let dir = tempfile::tempdir().unwrap();
    let index_path = dir.path().join("index.bin");
    let metadata_path = dir.path().join("metadata.json");

    match FlatIndex::load(&index_path, &metadata_path).await {
        Err(RagError::IndexNotFound { kind, .. }) => assert_eq!(kind, "Index"),
        other => panic!("expected IndexNotFound, got {other:?}"),
    }

    FlatIndex::new(2).save(&index_path, &metadata_path).await.unwrap();
    tokio::fs::remove_file(&metadata_path).await.unwrap();
    match FlatIndex::load(&index_path, &metadata_path).await {
        Err(RagError::IndexNotFound { kind, .. }) => assert_eq!(kind, "Metadata"),
        other => panic!("expected IndexNotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn mismatched_pair_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let index_path = dir.path().join("index.bin");
    let metadata_path = dir.path().join("metadata.json");

    let index = FlatIndex::new(2);
    index.add(&[vec![1.0, 0.0]], &[chunk("a.txt", 0, "alpha")]).await.unwrap();
    index.save(&index_path, &metadata_path).await.unwrap();
    tokio::fs::write(&metadata_path, "[]").await.unwrap();

    assert!(matches!(
        FlatIndex::load(&index_path, &metadata_path).await,
        Err(RagError::CorruptIndex { .. })
    ));

    tokio::fs::write(&metadata_path, "not json").await.unwrap();
    assert!(matches!(
        FlatIndex::load(&index_path, &metadata_path).await,
        Err(RagError::CorruptIndex { .. })
    ));
}

#[tokio::test]
async fn truncated_index_file_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let index_path = dir.path().join("index.bin");
    let metadata_path = dir.path().join("metadata.json");

    let index = FlatIndex::new(4);
    index.add(&[vec![0.5; 4]], &[chunk("a.txt", 0, "alpha")]).await.unwrap();
    index.save(&index_path, &metadata_path).await.unwrap();

    let bytes = tokio::fs::read(&index_path).await.unwrap();
    tokio::fs::write(&index_path, &bytes[..bytes.len() - 3]).await.unwrap();
    assert!(matches!(
        FlatIndex::load(&index_path, &metadata_path).await,
        Err(RagError::CorruptIndex { .. })
    ));
}
