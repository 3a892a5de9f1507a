//! Bootstrap tests against a real runtime artifact.
//!
//! These need network access to the configured artifact URL and are ignored
//! by default.

use pygrade::{Config, Harness};

#[tokio::test]
#[ignore = "requires a reachable runtime artifact"]
async fn bootstrap_and_grade_hello_world() {
    let config = Config::default();
    let harness = Harness::new(&config);

    let result = harness
        .run(
            "print('Hello, World!')",
            "assert user_output == 'Hello, World!'\nprint('ALL_TESTS_PASSED')",
        )
        .await;

    assert!(result.success, "error: {:?}", result.error);
    assert!(result.output.starts_with("Hello, World!"));
}

#[tokio::test]
#[ignore = "requires a reachable runtime artifact"]
async fn artifact_fetch_populates_cache() {
    let config = Config::default();
    let dir = tempfile::tempdir().unwrap();

    let path = pygrade::runtime::artifact::fetch(&config.artifact_url, Some(dir.path()))
        .await
        .expect("fetch failed");
    assert!(path.exists());
}
