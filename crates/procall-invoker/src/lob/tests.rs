use super::*;
use pretty_assertions::assert_eq;
use procall_driver_tests::fixtures::ScriptedConnection;

#[test]
fn test_chunking_counts_characters() {
    assert_eq!(chunk_chars("", 3).count(), 0);
    assert_eq!(chunk_chars("abcdefg", 3).collect::<Vec<_>>(), vec!["abc", "def", "g"]);
    assert_eq!(chunk_chars("日本語テキスト", 4).collect::<Vec<_>>(), vec!["日本語テ", "キスト"]);
}

#[tokio::test]
async fn test_text_is_written_in_256_char_chunks() {
    let conn = ScriptedConnection::new();
    let text = "x".repeat(600);
    {
        let mut scope = LargeObjectScope::new(&conn);
        let handle = scope.allocate(Some(text.as_str()), false).await.unwrap();
        assert!(handle.is_some());
        assert_eq!(scope.len(), 1);
        scope.release().unwrap();
    }

    let log = conn.log();
    let log = log.lock();
    assert_eq!(log.clobs.len(), 1);
    assert_eq!(log.clobs[0].writes(), vec![(1, 256), (257, 256), (513, 88)]);
    assert_eq!(log.clobs[0].content(), text);
    assert!(log.all_clobs_freed());
}

#[tokio::test]
async fn test_absent_text_allocates_nothing() {
    let conn = ScriptedConnection::new();
    let mut scope = LargeObjectScope::new(&conn);
    assert!(scope.allocate(None, false).await.unwrap().is_none());
    assert!(scope.is_empty());
    assert!(conn.log().lock().clobs.is_empty());
}

#[tokio::test]
async fn test_empty_text_allocates_empty_object() {
    let conn = ScriptedConnection::new();
    let mut scope = LargeObjectScope::new(&conn);
    assert!(scope.allocate(Some(""), true).await.unwrap().is_some());
    scope.release().unwrap();

    let log = conn.log();
    let log = log.lock();
    assert!(log.clobs[0].writes().is_empty());
    assert!(log.clobs[0].is_national());
}

#[tokio::test]
async fn test_drop_frees_unreleased_handles() {
    let conn = ScriptedConnection::new();
    {
        let mut scope = LargeObjectScope::new(&conn);
        scope.allocate(Some("first"), false).await.unwrap();
        scope.allocate(Some("second"), true).await.unwrap();
    }
    let log = conn.log();
    let log = log.lock();
    assert_eq!(log.clobs.len(), 2);
    assert!(log.all_clobs_freed());
}

#[tokio::test]
async fn test_release_reports_free_failure_after_freeing_all() {
    let conn = ScriptedConnection::new().with_clob_free_failure();
    let mut scope = LargeObjectScope::new(&conn);
    scope.allocate(Some("a"), false).await.unwrap();
    scope.allocate(Some("b"), false).await.unwrap();

    assert!(scope.release().is_err());
    assert!(conn.log().lock().all_clobs_freed());
}

#[tokio::test]
async fn test_allocation_failure_propagates() {
    let conn = ScriptedConnection::new().with_clob_allocation_failure();
    let mut scope = LargeObjectScope::new(&conn);
    assert!(scope.allocate(Some("text"), false).await.is_err());
    assert!(scope.is_empty());
}
