// Unit tests for the token stores.
// The file store is exercised against a temp directory.

use crate::auth::token_store::{FileTokenStore, MemoryTokenStore, TOKEN_FILE_NAME, TokenPair, TokenStore};

use std::sync::Arc;
use std::thread;

fn pair(n: usize) -> TokenPair {
    TokenPair::new(format!("access-{n}"), format!("refresh-{n}"))
}

#[test]
fn given_empty_memory_store_when_set_then_get_returns_pair() {
    let store = MemoryTokenStore::new();
    assert!(store.get().is_none());

    store.set(pair(1));

    assert_eq!(store.get(), Some(pair(1)));
}

#[test]
fn given_memory_store_with_pair_when_cleared_then_get_returns_none() {
    let store = MemoryTokenStore::with_pair(pair(1));

    store.clear();

    assert!(store.get().is_none());
}

/// **VALUE**: Readers never see halves of two different pairs.
///
/// **BUG THIS CATCHES**: Storing access and refresh tokens in separate
/// slots, where a reader can interleave with a writer.
#[test]
fn given_concurrent_writers_when_reading_then_pairs_are_never_torn() {
    let store = Arc::new(MemoryTokenStore::with_pair(pair(0)));

    let writers: Vec<_> = (1..=4)
        .map(|w| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for n in 0..500 {
                    store.set(pair(w * 1000 + n));
                }
            })
        })
        .collect();

    for _ in 0..2000 {
        if let Some(current) = store.get() {
            let access = current.access_token.as_str().trim_start_matches("access-");
            let refresh = current.refresh_token.as_str().trim_start_matches("refresh-");
            assert_eq!(access, refresh, "torn read");
        }
    }

    for writer in writers {
        writer.join().unwrap();
    }
}

#[test]
fn given_missing_file_when_opened_then_store_is_empty() {
    let dir = tempfile::tempdir().unwrap();

    let store = FileTokenStore::open_in(dir.path()).unwrap();

    assert!(store.get().is_none());
    assert!(!store.path().exists());
}

/// **VALUE**: A signed-in session survives an application restart.
#[test]
fn given_pair_set_when_store_reopened_then_pair_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileTokenStore::open_in(dir.path()).unwrap();

    store.set(pair(7));
    drop(store);
    let reopened = FileTokenStore::open_in(dir.path()).unwrap();

    assert_eq!(reopened.get(), Some(pair(7)));
}

#[test]
fn given_persisted_pair_when_cleared_then_file_is_removed() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileTokenStore::open_in(dir.path()).unwrap();
    store.set(pair(1));

    store.clear();

    assert!(store.get().is_none());
    assert!(!dir.path().join(TOKEN_FILE_NAME).exists());
    assert!(FileTokenStore::open_in(dir.path()).unwrap().get().is_none());
}

#[test]
fn given_corrupt_file_when_opened_then_store_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(TOKEN_FILE_NAME), "{ truncated").unwrap();

    let store = FileTokenStore::open_in(dir.path()).unwrap();

    assert!(store.get().is_none());
}

#[test]
fn given_written_file_when_inspected_then_uses_camel_case_keys() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileTokenStore::open_in(dir.path()).unwrap();

    store.set(pair(3));

    let raw = std::fs::read_to_string(store.path()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["accessToken"], "access-3");
    assert_eq!(json["refreshToken"], "refresh-3");
}

#[cfg(unix)]
#[test]
fn given_written_file_when_inspected_then_only_owner_can_read() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let store = FileTokenStore::open_in(dir.path()).unwrap();

    store.set(pair(1));

    let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn given_directory_in_place_of_file_when_opened_then_read_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join(TOKEN_FILE_NAME)).unwrap();

    let result = FileTokenStore::open_in(dir.path());

    assert!(result.is_err(), "A directory cannot be read as a token file");
}
