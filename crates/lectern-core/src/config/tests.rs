use std::io::Write;

use serial_test::serial;

use super::*;

const ENV_KEYS: [&str; 17] = [
    "LECTERN_LLM_ENDPOINT",
    "LECTERN_LLM_MAX_RETRIES",
    "LECTERN_EMBEDDING_BACKEND",
    "LECTERN_EMBEDDING_MODEL",
    "LECTERN_EMBEDDING_BASE_URL",
    "LECTERN_EMBEDDING_DIMENSIONS",
    "LECTERN_CHUNK_SIZE",
    "LECTERN_CHUNK_OVERLAP",
    "LECTERN_RETRIEVAL_K",
    "LECTERN_TIMEOUT_INFERENCE",
    "LECTERN_TIMEOUT_EMBEDDING",
    "LECTERN_INDEX_BACKEND",
    "LECTERN_INDEX_PERSIST_DIR",
    "LECTERN_INDEX_COLLECTION_PREFIX",
    "LECTERN_QDRANT_URL",
    "LECTERN_API_KEY",
    "API_KEY",
];

fn clear_env() {
    for key in ENV_KEYS {
        unsafe { std::env::remove_var(key) };
    }
}

fn write_config(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lectern.toml");
    let mut f = std::fs::File::create(&path).unwrap();
    write!(f, "{contents}").unwrap();
    (dir, path)
}

#[test]
fn defaults_when_file_missing() {
    let config = Config::default();
    assert_eq!(
        config.llm.endpoint,
        "https://api-inference.huggingface.co/models/mistralai/Mistral-7B-Instruct-v0.3"
    );
    assert_eq!(config.llm.max_retries, 0);
    assert_eq!(config.embedding.backend, EmbeddingBackend::HuggingFace);
    assert_eq!(config.embedding.model, "all-MiniLM-L6-v2");
    assert_eq!(config.chunking.chunk_size, 500);
    assert_eq!(config.chunking.chunk_overlap, 100);
    assert_eq!(config.retrieval.k, 5);
    assert_eq!(config.index.backend, IndexBackend::Memory);
    assert!(config.index.persist_dir.is_none());
    assert_eq!(config.index.collection_prefix, "lectern");
    assert_eq!(config.timeouts.inference_secs, 60);
    assert!(config.secrets.api_key.is_none());
}

#[test]
#[serial]
fn load_missing_file_uses_defaults() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config.chunking.chunk_size, 500);
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn parse_valid_toml() {
    let (_dir, path) = write_config(
        r#"
[llm]
endpoint = "http://localhost:8080/generate"
max_retries = 2

[embedding]
backend = "hashing"
model = "BAAI/bge-base-en-v1.5"
dimensions = 128

[chunking]
chunk_size = 800
chunk_overlap = 50

[retrieval]
k = 3

[index]
backend = "memory"
persist_dir = "/tmp/lectern-index"
collection_prefix = "papers"

[timeouts]
inference_secs = 15
"#,
    );
    clear_env();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.llm.endpoint, "http://localhost:8080/generate");
    assert_eq!(config.llm.max_retries, 2);
    assert_eq!(config.embedding.backend, EmbeddingBackend::Hashing);
    assert_eq!(config.embedding.dimensions, Some(128));
    assert_eq!(config.chunking.chunk_size, 800);
    assert_eq!(config.chunking.chunk_overlap, 50);
    assert_eq!(config.retrieval.k, 3);
    assert_eq!(
        config.index.persist_dir.as_deref(),
        Some(std::path::Path::new("/tmp/lectern-index"))
    );
    assert_eq!(config.index.collection_prefix, "papers");
    assert_eq!(config.timeouts.inference_secs, 15);
    assert_eq!(config.timeouts.embedding_secs, 30);
    assert_eq!(
        config.embedding_model().unwrap(),
        lectern_llm::EmbeddingModel::BgeBaseEnV15
    );
}

#[test]
#[serial]
fn partial_toml_fills_defaults() {
    let (_dir, path) = write_config("[retrieval]\nk = 8\n");
    clear_env();
    let config = Config::load(&path).unwrap();
    assert_eq!(config.retrieval.k, 8);
    assert_eq!(config.chunking.chunk_size, 500);
    assert_eq!(config.embedding.model, "all-MiniLM-L6-v2");
}

#[test]
#[serial]
fn invalid_toml_is_error() {
    let (_dir, path) = write_config("[chunking\nchunk_size = ");
    clear_env();
    let err = Config::load(&path).unwrap_err();
    assert!(format!("{err:#}").contains("failed to parse config file"));
}

#[test]
#[serial]
fn env_overrides_file_values() {
    let (_dir, path) = write_config("[chunking]\nchunk_size = 800\n");
    clear_env();
    unsafe {
        std::env::set_var("LECTERN_CHUNK_SIZE", "300");
        std::env::set_var("LECTERN_CHUNK_OVERLAP", "30");
        std::env::set_var("LECTERN_RETRIEVAL_K", "2");
        std::env::set_var("LECTERN_EMBEDDING_BACKEND", "Hashing");
        std::env::set_var("LECTERN_INDEX_PERSIST_DIR", "/var/tmp/idx");
        std::env::set_var("LECTERN_LLM_MAX_RETRIES", "3");
    };
    let config = Config::load(&path).unwrap();
    clear_env();

    assert_eq!(config.chunking.chunk_size, 300);
    assert_eq!(config.chunking.chunk_overlap, 30);
    assert_eq!(config.retrieval.k, 2);
    assert_eq!(config.embedding.backend, EmbeddingBackend::Hashing);
    assert_eq!(
        config.index.persist_dir.as_deref(),
        Some(std::path::Path::new("/var/tmp/idx"))
    );
    assert_eq!(config.llm.max_retries, 3);
}

#[test]
#[serial]
fn invalid_env_values_are_ignored() {
    clear_env();
    unsafe {
        std::env::set_var("LECTERN_CHUNK_SIZE", "lots");
        std::env::set_var("LECTERN_INDEX_BACKEND", "sqlite");
        std::env::set_var("LECTERN_LLM_MAX_RETRIES", "-1");
    };
    let mut config = Config::default();
    config.apply_env_overrides();
    clear_env();

    assert_eq!(config.chunking.chunk_size, 500);
    assert_eq!(config.index.backend, IndexBackend::Memory);
    assert_eq!(config.llm.max_retries, 0);
}

#[derive(Clone, Default)]
struct LogBuffer(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogBuffer {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[test]
#[serial]
fn every_invalid_number_is_reported() {
    const NUMERIC: [&str; 7] = [
        "LECTERN_LLM_MAX_RETRIES",
        "LECTERN_EMBEDDING_DIMENSIONS",
        "LECTERN_CHUNK_SIZE",
        "LECTERN_CHUNK_OVERLAP",
        "LECTERN_RETRIEVAL_K",
        "LECTERN_TIMEOUT_INFERENCE",
        "LECTERN_TIMEOUT_EMBEDDING",
    ];
    clear_env();
    for key in NUMERIC {
        unsafe { std::env::set_var(key, "many") };
    }
    let logs = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .finish();
    let mut config = Config::default();
    tracing::subscriber::with_default(subscriber, || config.apply_env_overrides());
    clear_env();

    let defaults = Config::default();
    assert_eq!(config.llm.max_retries, defaults.llm.max_retries);
    assert_eq!(config.embedding.dimensions, defaults.embedding.dimensions);
    assert_eq!(config.chunking.chunk_size, defaults.chunking.chunk_size);
    assert_eq!(config.chunking.chunk_overlap, defaults.chunking.chunk_overlap);
    assert_eq!(config.retrieval.k, defaults.retrieval.k);
    assert_eq!(config.timeouts.inference_secs, defaults.timeouts.inference_secs);
    assert_eq!(config.timeouts.embedding_secs, defaults.timeouts.embedding_secs);

    let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    for key in NUMERIC {
        assert!(
            output.contains(&format!("ignoring invalid {key} value: many")),
            "no warning for {key}: {output}"
        );
    }
}

#[test]
#[serial]
fn numeric_overrides_tolerate_whitespace() {
    clear_env();
    unsafe { std::env::set_var("LECTERN_RETRIEVAL_K", " 7 ") };
    let mut config = Config::default();
    config.apply_env_overrides();
    clear_env();
    assert_eq!(config.retrieval.k, 7);
}

#[test]
#[serial]
fn api_key_from_original_variable() {
    clear_env();
    unsafe { std::env::set_var("API_KEY", "hf_original") };
    let mut config = Config::default();
    config.resolve_secrets();
    clear_env();
    assert_eq!(config.api_key().unwrap().expose(), "hf_original");
}

#[test]
#[serial]
fn prefixed_api_key_wins() {
    clear_env();
    unsafe {
        std::env::set_var("API_KEY", "hf_original");
        std::env::set_var("LECTERN_API_KEY", "hf_prefixed");
    };
    let mut config = Config::default();
    config.resolve_secrets();
    clear_env();
    assert_eq!(config.api_key().unwrap().expose(), "hf_prefixed");
    assert!(!format!("{config:?}").contains("hf_prefixed"));
}

#[test]
#[serial]
fn blank_api_key_ignored() {
    clear_env();
    unsafe { std::env::set_var("API_KEY", "   ") };
    let mut config = Config::default();
    config.resolve_secrets();
    clear_env();
    assert!(config.api_key().is_none());
}

#[test]
fn validate_rejects_zero_chunk_size() {
    let mut config = Config::default();
    config.chunking.chunk_size = 0;
    assert!(config.validate().unwrap_err().to_string().contains("chunk_size"));
}

#[test]
fn validate_rejects_zero_k() {
    let mut config = Config::default();
    config.retrieval.k = 0;
    assert!(config.validate().unwrap_err().to_string().contains("retrieval.k"));
}

#[test]
fn validate_rejects_unknown_model() {
    let mut config = Config::default();
    config.embedding.model = "text-embedding-3-small".into();
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("all-MiniLM-L6-v2"));
}

#[test]
fn validate_allows_overlap_clamping() {
    let mut config = Config::default();
    config.chunking.chunk_overlap = 900;
    assert!(config.validate().is_ok());
    assert_eq!(config.splitter_config().chunk_overlap, 900);
}

#[test]
fn serialize_roundtrip_keeps_sections() {
    let config = Config::default();
    let text = toml::to_string(&config).unwrap();
    assert!(text.contains("[chunking]"));
    assert!(text.contains("chunk_size = 500"));
    let parsed: Config = toml::from_str(&text).unwrap();
    assert_eq!(parsed.retrieval.k, config.retrieval.k);
}

#[test]
fn shipped_default_config_matches_defaults() {
    let shipped: Config = toml::from_str(include_str!("../../../../config/default.toml")).unwrap();
    let defaults = Config::default();
    assert_eq!(shipped.llm.endpoint, defaults.llm.endpoint);
    assert_eq!(shipped.embedding.model, defaults.embedding.model);
    assert_eq!(shipped.embedding.base_url, defaults.embedding.base_url);
    assert_eq!(shipped.chunking.chunk_size, 500);
    assert_eq!(shipped.chunking.chunk_overlap, 100);
    assert_eq!(shipped.retrieval.k, 5);
    assert_eq!(shipped.index.backend, IndexBackend::Memory);
    assert!(shipped.validate().is_ok());
}
