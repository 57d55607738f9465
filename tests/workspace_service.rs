use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use vellum_server::auth::CredentialStore;
use vellum_server::error::ErrorKind;
use vellum_server::middleware::LoginThrottle;
use vellum_server::session::SessionRegistry;
use vellum_server::storage::{EntryKind, Workspace};
use vellum_server::WorkspaceService;

struct Fixture {
    tmp: TempDir,
    service: Arc<WorkspaceService>,
}

impl Fixture {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let timeout = Duration::from_secs(5);
        let service = WorkspaceService::new(
            CredentialStore::open(&tmp.path().join("users.db"), 1_000, timeout).unwrap(),
            Workspace::open(&tmp.path().join("files"), timeout).unwrap(),
            SessionRegistry::new(Duration::from_secs(60)),
            LoginThrottle::new(0, Duration::from_secs(60)),
            timeout,
        );
        Self {
            tmp,
            service: Arc::new(service),
        }
    }

    async fn logged_in(&self) -> String {
        self.service
            .register("alice", "alice@example.com", "pw")
            .await
            .unwrap();
        let token = self.service.login("alice", "pw").await.unwrap();
        token.as_str().to_string()
    }
}

#[tokio::test]
async fn registration_is_unique_per_username() {
    let fx = Fixture::new();

    fx.service.register("alice", "a@example.com", "one").await.unwrap();
    let err = fx
        .service
        .register("alice", "b@example.com", "two")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateIdentity);

    assert!(fx.service.login("alice", "one").await.is_ok());
    assert_eq!(
        fx.service.login("alice", "two").await.unwrap_err().kind(),
        ErrorKind::InvalidCredentials
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registration_admits_one() {
    let fx = Fixture::new();

    let attempts: Vec<_> = (0..8)
        .map(|i| {
            let service = Arc::clone(&fx.service);
            tokio::spawn(async move {
                service
                    .register("alice", &format!("a{}@example.com", i), &format!("pw{}", i))
                    .await
            })
        })
        .collect();

    let mut admitted = 0;
    for attempt in attempts {
        match attempt.await.unwrap() {
            Ok(_) => admitted += 1,
            Err(e) => assert_eq!(e.kind(), ErrorKind::DuplicateIdentity),
        }
    }
    assert_eq!(admitted, 1);

    let store =
        CredentialStore::open(&fx.tmp.path().join("users.db"), 1_000, Duration::from_secs(5))
            .unwrap();
    assert_eq!(store.user_count().unwrap(), 1);
}

#[tokio::test]
async fn wrong_secret_and_unknown_user_look_alike() {
    let fx = Fixture::new();
    fx.service.register("alice", "a@example.com", "pw").await.unwrap();

    let wrong = fx.service.login("alice", "nope").await.unwrap_err();
    let unknown = fx.service.login("nobody", "pw").await.unwrap_err();
    assert_eq!(wrong.kind(), ErrorKind::InvalidCredentials);
    assert_eq!(unknown.kind(), ErrorKind::InvalidCredentials);
    assert_eq!(wrong.to_string(), unknown.to_string());
}

#[tokio::test]
async fn paths_never_escape_the_root() {
    let fx = Fixture::new();
    let token = fx.logged_in().await;

    for raw in ["../../etc/passwd", "/etc/passwd", "a/../../b", "bad\0name", ""] {
        let err = fx
            .service
            .write_file(&token, raw, "x".into())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPath, "{:?}", raw);

        let err = fx.service.read_file(&token, raw).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPath, "{:?}", raw);
    }

    assert!(!fx.tmp.path().join("b").exists());
    assert!(fx.service.list_entries(&token).await.unwrap().is_empty());
}

#[tokio::test]
async fn round_trip_preserves_content() {
    let fx = Fixture::new();
    let token = fx.logged_in().await;

    for content in ["", "single line", "first\nsecond\r\nthird\n", "unicodé ✓"] {
        fx.service
            .write_file(&token, "notes/file.txt", content.to_string())
            .await
            .unwrap();
        assert_eq!(
            fx.service.read_file(&token, "notes/file.txt").await.unwrap(),
            content
        );
    }
}

#[tokio::test]
async fn delete_then_recreate() {
    let fx = Fixture::new();
    let token = fx.logged_in().await;

    fx.service.create_folder(&token, "docs").await.unwrap();
    fx.service.delete_entry(&token, "docs").await.unwrap();
    assert_eq!(
        fx.service.delete_entry(&token, "docs").await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
    fx.service.create_folder(&token, "docs").await.unwrap();

    fx.service
        .write_file(&token, "docs/a.txt", "v1".into())
        .await
        .unwrap();
    fx.service.delete_entry(&token, "docs/a.txt").await.unwrap();
    fx.service
        .write_file(&token, "docs/a.txt", "v2".into())
        .await
        .unwrap();
    assert_eq!(fx.service.read_file(&token, "docs/a.txt").await.unwrap(), "v2");
}

#[tokio::test]
async fn non_empty_folder_is_kept() {
    let fx = Fixture::new();
    let token = fx.logged_in().await;

    fx.service
        .write_file(&token, "docs/a.txt", "keep".into())
        .await
        .unwrap();
    let err = fx.service.delete_entry(&token, "docs").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotEmpty);
    assert_eq!(fx.service.read_file(&token, "docs/a.txt").await.unwrap(), "keep");
}

#[tokio::test]
async fn folder_conflicts() {
    let fx = Fixture::new();
    let token = fx.logged_in().await;

    fx.service.create_folder(&token, "docs").await.unwrap();
    assert_eq!(
        fx.service.create_folder(&token, "docs").await.unwrap_err().kind(),
        ErrorKind::AlreadyExists
    );
    assert_eq!(
        fx.service.read_file(&token, "docs").await.unwrap_err().kind(),
        ErrorKind::IsFolder
    );
    assert_eq!(
        fx.service
            .write_file(&token, "docs", "x".into())
            .await
            .unwrap_err()
            .kind(),
        ErrorKind::IsFolder
    );
}

#[tokio::test]
async fn listing_is_depth_first() {
    let fx = Fixture::new();
    let token = fx.logged_in().await;

    fx.service.create_folder(&token, "b").await.unwrap();
    fx.service.write_file(&token, "a.txt", "".into()).await.unwrap();
    fx.service.write_file(&token, "b/c.txt", "".into()).await.unwrap();

    let listing: Vec<(String, EntryKind)> = fx
        .service
        .list_entries(&token)
        .await
        .unwrap()
        .into_iter()
        .map(|e| (e.path, e.kind))
        .collect();
    assert_eq!(
        listing,
        vec![
            ("a.txt".to_string(), EntryKind::File),
            ("b".to_string(), EntryKind::Folder),
            ("b/c.txt".to_string(), EntryKind::File),
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reads_see_whole_versions() {
    let fx = Fixture::new();
    let token = fx.logged_in().await;
    fx.service
        .write_file(&token, "shared.txt", "AAAA".into())
        .await
        .unwrap();

    let writer = {
        let service = Arc::clone(&fx.service);
        let token = token.clone();
        tokio::spawn(async move {
            for i in 0..50 {
                let content = if i % 2 == 0 { "BB" } else { "AAAA" };
                service
                    .write_file(&token, "shared.txt", content.to_string())
                    .await
                    .unwrap();
            }
        })
    };

    let mut readers = Vec::new();
    for _ in 0..4 {
        let service = Arc::clone(&fx.service);
        let token = token.clone();
        readers.push(tokio::spawn(async move {
            for _ in 0..50 {
                let content = service.read_file(&token, "shared.txt").await.unwrap();
                assert!(content == "AAAA" || content == "BB", "torn read: {:?}", content);
            }
        }));
    }

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }

    // No staging files left behind
    let entries = fx.service.list_entries(&token).await.unwrap();
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn unauthenticated_calls_change_nothing() {
    let fx = Fixture::new();

    let err = fx
        .service
        .write_file("not-a-token", "f.txt", "x".into())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthenticated);
    assert!(!fx.tmp.path().join("files").join("f.txt").exists());
}
