use super::*;
use crate::services::identity::IdentityProvider;
use crate::store::memory::MemoryStore;
use time::OffsetDateTime;

fn form(name: &str, kind: &str, comment: &str) -> SubmitForm {
    SubmitForm { name: name.into(), kind: kind.into(), comment: comment.into() }
}

fn stored(kind: &str, secs: Option<i64>) -> Comment {
    Comment {
        id: Uuid::new_v4(),
        name: "Lee".into(),
        kind: kind.into(),
        comment: "body".into(),
        timestamp: secs.map(|s| OffsetDateTime::from_unix_timestamp(s).expect("valid timestamp")),
        author_id: "author".into(),
    }
}

// =============================================================================
// validate
// =============================================================================

#[test]
fn validate_trims_fields() {
    let draft = validate(&form("  Kim ", "impressive", "\n Great session \n")).expect("valid");
    assert_eq!(draft, Draft { name: "Kim".into(), kind: CommentType::Impressive, comment: "Great session".into() });
}

#[test]
fn validate_rejects_each_blank_field() {
    for f in [
        form("", "impressive", "body"),
        form("Kim", "", "body"),
        form("Kim", "impressive", "   "),
    ] {
        assert!(matches!(validate(&f), Err(SubmitError::MissingFields)), "{f:?}");
    }
}

#[test]
fn validate_rejects_unknown_type() {
    let err = validate(&form("Kim", "boring", "body")).unwrap_err();
    assert!(matches!(err, SubmitError::UnknownType(ref t) if t == "boring"));
}

#[test]
fn form_reads_frame_fields() {
    let req = Frame::request("comment:submit", crate::frame::Data::new())
        .with_data("name", "Kim")
        .with_data("type", "difficult")
        .with_data("comment", "Lifetimes");
    assert_eq!(SubmitForm::from_frame(&req), form("Kim", "difficult", "Lifetimes"));
}

#[test]
fn form_with_missing_type_is_blank() {
    let req = Frame::request("comment:submit", crate::frame::Data::new()).with_data("name", "Kim");
    let f = SubmitForm::from_frame(&req);
    assert!(f.kind.is_empty());
    assert!(f.comment.is_empty());
}

// =============================================================================
// SubmitGuard
// =============================================================================

#[test]
fn guard_blocks_second_acquire_until_dropped() {
    let flag = AtomicBool::new(false);
    let first = SubmitGuard::acquire(&flag).expect("first acquire");
    assert!(SubmitGuard::acquire(&flag).is_none());
    drop(first);
    assert!(SubmitGuard::acquire(&flag).is_some());
}

// =============================================================================
// append
// =============================================================================

#[tokio::test]
async fn append_writes_with_resolved_author() {
    let store = MemoryStore::new();
    let sign_in = store.sign_in_anonymously().await.expect("sign in");
    let identity = Identity { uid: sign_in.uid.clone(), degraded: false, session_token: None };

    let draft = validate(&form("Kim", "impressive", "Great session")).expect("valid");
    let id = append(&store, &identity, draft).await.expect("append");

    let snapshot = store.watch_comments().borrow().clone();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, id);
    assert_eq!(snapshot[0].author_id, sign_in.uid);
}

#[tokio::test]
async fn append_surfaces_store_rejection() {
    let store = MemoryStore::new();
    let identity = Identity { uid: "Anon-x".into(), degraded: true, session_token: None };
    let draft = validate(&form("Kim", "impressive", "Great session")).expect("valid");

    let err = append(&store, &identity, draft).await.unwrap_err();
    assert_eq!(err.error_code(), "E_PERMISSION_DENIED");
    assert!(!err.retryable());
}

// =============================================================================
// partition
// =============================================================================

#[test]
fn known_types_land_in_exactly_one_bucket() {
    let snapshot = vec![
        stored("impressive", Some(10)),
        stored("learn_more", Some(11)),
        stored("difficult", Some(12)),
        stored("인상깊은 부분", Some(13)),
        stored("mystery", Some(14)),
    ];
    let buckets = CategoryBuckets::partition(&snapshot);

    assert_eq!(buckets.impressive.len(), 2);
    assert_eq!(buckets.learn_more.len(), 1);
    assert_eq!(buckets.difficult.len(), 1);

    for comment in &snapshot {
        let hits = CommentType::ALL
            .iter()
            .filter(|kind| buckets.bucket(**kind).iter().any(|c| c.id == comment.id))
            .count();
        let expected = usize::from(comment.comment_type().is_some());
        assert_eq!(hits, expected, "{}", comment.kind);
    }
}

#[test]
fn buckets_sort_newest_first_with_missing_timestamps_last() {
    let snapshot = vec![
        stored("impressive", Some(100)),
        stored("impressive", None),
        stored("impressive", Some(300)),
        stored("impressive", Some(200)),
    ];
    let bucket = CategoryBuckets::partition(&snapshot).impressive;

    for pair in bucket.windows(2) {
        assert!(pair[0].timestamp_nanos() >= pair[1].timestamp_nanos());
    }
    assert!(bucket.last().is_some_and(|c| c.timestamp.is_none()));
}

#[test]
fn equal_timestamps_order_is_independent_of_snapshot_order() {
    let a = stored("learn_more", Some(50));
    let b = stored("learn_more", Some(50));
    let c = stored("learn_more", None);
    let d = stored("learn_more", None);

    let forward = CategoryBuckets::partition(&[a.clone(), b.clone(), c.clone(), d.clone()]).learn_more;
    let backward = CategoryBuckets::partition(&[d, c, b, a]).learn_more;

    let ids = |v: &[Comment]| v.iter().map(|c| c.id).collect::<Vec<_>>();
    assert_eq!(ids(&forward), ids(&backward));
}

#[test]
fn empty_snapshot_gives_empty_buckets() {
    assert_eq!(CategoryBuckets::partition(&[]), CategoryBuckets::default());
}
