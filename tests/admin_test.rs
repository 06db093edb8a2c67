use std::sync::Arc;
use versioned_search::client::{Backend, InMemoryBackend, SearchBackend};
use versioned_search::{admin, Field, Index, IndexDefinition, Version};

fn index(backend: Backend) -> Index {
    Index::with_ids(
        backend,
        IndexDefinition::builder("user_posts")
            .field(Field::auto(".*"))
            .env(Some("staging"))
            .build(),
    )
}

fn version(seconds: &str) -> Version {
    Version::parse(seconds).unwrap()
}

fn output(buffer: Vec<u8>) -> String {
    String::from_utf8(buffer).unwrap()
}

#[tokio::test]
async fn test_list_marks_live_version() {
    let backend: Backend = Arc::new(InMemoryBackend::new());
    let posts = index(backend.clone());

    let old = posts.create_at(version("1700000000")).await.unwrap();
    posts.index_many(["1", "2"], &old).await.unwrap();
    posts.update_alias(&old).await.unwrap();
    posts.create_at(version("1800000000")).await.unwrap();

    let mut out = Vec::new();
    admin::list(&backend, Some("staging"), &mut out).await.unwrap();
    let out = output(out);

    assert!(out.starts_with("==> User Posts\n"));
    assert!(out.contains("Version"));
    assert!(out.contains("Documents"));

    let live = out.lines().find(|line| line.contains("1700000000")).unwrap();
    assert!(live.starts_with("  -> 1700000000"));
    assert!(live.trim_end().ends_with('2'));

    let idle = out.lines().find(|line| line.contains("1800000000")).unwrap();
    assert!(idle.starts_with("     1800000000"));

    let mut other_env = Vec::new();
    admin::list(&backend, Some("production"), &mut other_env).await.unwrap();
    assert!(output(other_env).is_empty());
}

#[tokio::test]
async fn test_index_command_activates() {
    let memory = Arc::new(InMemoryBackend::new());
    let backend: Backend = memory.clone();
    let posts = index(backend);

    let mut out = Vec::new();
    let failures = admin::index(&posts, ["1", "2", "3"], true, &mut out).await.unwrap();
    assert!(failures.is_empty());

    let out = output(out);
    assert!(out.starts_with("==> Indexing into User Posts (Version "));
    assert!(out.contains("--> user_posts:staging now serves user_posts:staging@"));

    let live = posts.collection().await.unwrap().unwrap();
    assert_eq!(live.num_documents(), 3);
    assert!(memory.retrieve_alias("user_posts:staging").await.is_ok());
}

#[tokio::test]
async fn test_update_alias_command() {
    let backend: Backend = Arc::new(InMemoryBackend::new());
    let posts = index(backend);
    posts.create_at(version("1700000000")).await.unwrap();

    let mut out = Vec::new();
    assert!(!admin::update_alias(&posts, version("1"), &mut out).await.unwrap());
    assert_eq!(output(out), "--> No such version 1 for User Posts\n");

    let mut out = Vec::new();
    assert!(admin::update_alias(&posts, version("1700000000"), &mut out).await.unwrap());
    let out = output(out);
    assert!(out.contains("==> Alias for User Posts"));
    assert!(out.contains("Old: None (N/A)"));
    assert!(out.contains("New: 1700000000 ("));
    assert_eq!(
        posts.collection().await.unwrap().unwrap().version(),
        Some(version("1700000000"))
    );
}

#[tokio::test]
async fn test_drop_refuses_live_version() {
    let backend: Backend = Arc::new(InMemoryBackend::new());
    let posts = index(backend);
    let live = posts.create_at(version("1700000000")).await.unwrap();
    posts.update_alias(&live).await.unwrap();
    posts.create_at(version("1800000000")).await.unwrap();

    let mut out = Vec::new();
    let err = admin::drop_version(&posts, version("1700000000"), &mut out)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_ARGUMENT");

    assert!(admin::drop_version(&posts, version("1800000000"), &mut out)
        .await
        .unwrap());
    assert_eq!(posts.collections().await.unwrap().len(), 1);
}
