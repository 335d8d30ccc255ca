use pretty_assertions::assert_eq;
use slog::Drain;
use std::sync::Arc;
use std::time::Duration;
use uploadkit::storage::{ErrorKind, Uploader};
use uploadkit::{EngineKind, Registry, StorageConfig};

fn local(dir: &tempfile::TempDir) -> StorageConfig {
    StorageConfig::new("local").with_setting("UPLOAD_DIR", dir.path().to_string_lossy())
}

fn logger() -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::CompactFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    slog::Logger::root(drain, slog::o!())
}

#[tokio::test]
async fn same_config_shares_one_instance() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::new(local(&dir)).logger(Some(logger()));

    let a = registry.active().await.unwrap();
    let b = registry.uploader(&local(&dir)).await.unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.kind(), EngineKind::Local);
    assert_eq!(a.engine_name(), "local");

    let other = tempfile::tempdir().unwrap();
    let c = registry.uploader(&local(&other)).await.unwrap();
    assert!(!Arc::ptr_eq(&a, &c));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_build_once() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(Registry::new(local(&dir)));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move { registry.active().await.unwrap() }));
    }
    let mut engines = Vec::new();
    for handle in handles {
        engines.push(handle.await.unwrap());
    }
    assert!(engines.iter().all(|e| Arc::ptr_eq(e, &engines[0])));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_builds_do_not_hold_up_other_engines() {
    // Accepts connections but never greets, so the FTP back-end keeps dialling until its
    // connect timeout.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let silent = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(Registry::new(local(&dir)));
    let cached = registry.active().await.unwrap();

    let ftp = StorageConfig::new("ftp")
        .with_setting("FTP_SERVER_URL", "127.0.0.1")
        .with_setting("FTP_SERVER_PORT", port.to_string())
        .with_setting("FTP_USER_NAME", "bob")
        .with_setting("FTP_CONN_TIMEOUT", "3");
    let pending = {
        let registry = registry.clone();
        tokio::spawn(async move { registry.uploader(&ftp).await })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;

    let started = tokio::time::Instant::now();
    let again = registry.active().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(1), "{:?}", started.elapsed());
    assert!(Arc::ptr_eq(&cached, &again));

    let other = tempfile::tempdir().unwrap();
    let started = tokio::time::Instant::now();
    registry.uploader(&local(&other)).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(1), "{:?}", started.elapsed());

    assert_eq!(pending.await.unwrap().unwrap_err().kind(), ErrorKind::Connectivity);
    silent.abort();
}

#[tokio::test]
async fn selected_engine_does_the_work() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::new(local(&dir));
    let uploader = registry.active().await.unwrap();

    uploader.upload("a/b/hello.txt", &b"hello"[..]).await.unwrap();
    assert_eq!(std::fs::read(dir.path().join("a/b/hello.txt")).unwrap(), b"hello".to_vec());
    assert_eq!(uploader.content("a/b/hello.txt").await.unwrap(), b"hello".to_vec());
}

#[tokio::test]
async fn unknown_engine_is_a_configuration_error() {
    let registry = Registry::new(StorageConfig::new("dropbox"));
    let err = registry.active().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[tokio::test]
async fn missing_settings_are_configuration_errors() {
    let registry = Registry::new(StorageConfig::default());
    for engine in ["ftp", "oss"] {
        let err = registry.uploader(&StorageConfig::new(engine)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration, "{}", engine);
    }
}

#[tokio::test]
async fn unset_engine_falls_back_to_local() {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig::default().with_setting("UPLOAD_DIR", dir.path().to_string_lossy());
    let registry = Registry::new(config);

    assert_eq!(registry.active().await.unwrap_err().kind(), ErrorKind::Configuration);
    let engine = registry.active_or_local().await.unwrap();
    assert_eq!(engine.kind(), EngineKind::Local);
    assert!(Arc::ptr_eq(&engine, &registry.active_or_local().await.unwrap()));
}

#[tokio::test]
async fn shutdown_is_final_and_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::new(local(&dir));
    registry.active().await.unwrap();

    registry.shutdown().await.unwrap();
    registry.shutdown().await.unwrap();
    assert_eq!(registry.active().await.unwrap_err().kind(), ErrorKind::Connectivity);
}

#[test]
fn config_from_json() {
    let config = StorageConfig::from_json(r#"{"engine": "oss", "settings": {"OSS_KEYSECRET": "hush"}}"#).unwrap();
    assert_eq!(config.kind().unwrap(), EngineKind::Oss);
    assert!(!format!("{:?}", config).contains("hush"));
    assert_eq!(StorageConfig::from_json("{").unwrap_err().kind(), ErrorKind::Configuration);
    assert!(StorageConfig::from_json("{}").unwrap().is_unset());
}
