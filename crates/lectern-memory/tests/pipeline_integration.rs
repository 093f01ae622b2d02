use std::io::Write;
use std::sync::Arc;

use lectern_llm::Embedder;
use lectern_llm::hashing::HashingEmbedder;
use lectern_memory::document::{DocumentLoader, SplitterConfig, TextLoader, TextSplitter};
use lectern_memory::{InMemoryVectorStore, VectorIndex, VectorStore};

fn paragraph(topic: &str, n: usize) -> String {
    let mut text = String::new();
    while text.chars().count() < 320 {
        text.push_str(&format!("The {topic} section discusses point number {n} in detail. "));
    }
    text.trim_end().to_owned()
}

fn write_paper() -> tempfile::NamedTempFile {
    let pages = ["attention", "convolution", "retrieval"]
        .iter()
        .map(|topic| {
            (0..4)
                .map(|n| paragraph(topic, n))
                .collect::<Vec<_>>()
                .join("\n\n")
        })
        .collect::<Vec<_>>()
        .join("\x0c");
    let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
    file.write_all(pages.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn load_split_index_query() {
    let file = write_paper();
    let documents = TextLoader::default().load(file.path()).await.unwrap();
    assert_eq!(documents.len(), 3);

    let splitter = TextSplitter::new(SplitterConfig::default());
    let chunks = splitter.split_documents(&documents);
    assert_eq!(chunks.len(), 12);
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.chunk_index, i);
        assert_eq!(chunk.metadata.page, Some(i / 4));
        assert!(chunk.content.chars().count() <= 500);
    }

    let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::new("all-MiniLM-L6-v2", 384));
    let store = Arc::new(InMemoryVectorStore::new());
    let index = VectorIndex::build(&chunks, embedder, store, "lectern")
        .await
        .unwrap();
    assert_eq!(index.len(), 12);

    let results = index.query("retrieval section", 5).await.unwrap();
    assert_eq!(results.len(), 5);
    assert_eq!(results[0].chunk.metadata.page, Some(2));
    for pair in results.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[tokio::test]
async fn persisted_index_is_visible_to_a_new_store() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_paper();
    let documents = TextLoader::default().load(file.path()).await.unwrap();
    let chunks = TextSplitter::new(SplitterConfig::default()).split_documents(&documents);

    let store = Arc::new(InMemoryVectorStore::persistent(dir.path()).unwrap());
    let index = VectorIndex::build(
        &chunks,
        Arc::new(HashingEmbedder::new("multi-qa-MiniLM-L6-cos-v1", 384)),
        store,
        "lectern",
    )
    .await
    .unwrap();

    let reopened = InMemoryVectorStore::persistent(dir.path()).unwrap();
    assert!(reopened.collection_exists(index.collection()).await.unwrap());
    let hits = reopened
        .search(
            index.collection(),
            HashingEmbedder::new("multi-qa-MiniLM-L6-cos-v1", 384).embed_sync("convolution"),
            3,
        )
        .await
        .unwrap();
    assert_eq!(hits.len(), 3);
}
