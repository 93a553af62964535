use chrono::TimeZone;
use dogear_client::api::{Error, SortOrder, Time, UserId};
use dogear_client::{CommentStore, Discussion, MutationCoordinator, MutationOutcome, Viewer};
use dogear_mock_server::{Failure, MockServer, Op};

fn at(secs: i64) -> Time {
    chrono::Utc.timestamp_opt(secs, 0).unwrap()
}

fn viewer(user: UserId) -> Viewer {
    Viewer {
        user_id: user,
        display_name: "ada".to_string(),
        progress: 100,
    }
}

#[tokio::test]
async fn newest_root_thread_paginates_to_exhaustion() {
    let server = MockServer::new();
    let user = server.create_user("ada");
    let auth = server.login(user);
    let c1 = server.seed_comment(user, None, "first", 10, at(10));
    let c2 = server.seed_comment(user, None, "second", 20, at(20));
    let c3 = server.seed_comment(user, None, "third", 30, at(30));

    let mut discussion = Discussion::new(&server, auth, viewer(user)).with_pagination(
        3,
        SortOrder::Newest,
        SortOrder::Oldest,
    );

    discussion.fetch_next_page(None).await.unwrap();
    let ids: Vec<_> = discussion.store().snapshot(None).iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![c3, c2, c1]);
    assert!(discussion.pages().has_more(None));

    // Page 2 comes back empty, which ends the scope
    discussion.fetch_next_page(None).await.unwrap();
    assert!(!discussion.pages().has_more(None));
    assert_eq!(server.test_call_count(Op::FetchComments), 2);

    // Further load-more events never reach the transport
    discussion.fetch_next_page(None).await.unwrap();
    assert_eq!(server.test_call_count(Op::FetchComments), 2);

    let ids: Vec<_> = discussion.store().snapshot(None).iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![c3, c2, c1]);
}

#[tokio::test]
async fn failed_page_fetch_keeps_content_and_allows_retry() {
    let server = MockServer::new();
    let user = server.create_user("ada");
    let auth = server.login(user);
    let c1 = server.seed_comment(user, None, "only one", 10, at(10));

    let mut discussion = Discussion::new(&server, auth, viewer(user)).with_pagination(
        5,
        SortOrder::Newest,
        SortOrder::Oldest,
    );
    server.fail_next(Op::FetchComments, Failure::Transport);

    assert!(discussion.fetch_next_page(None).await.is_err());
    assert!(discussion.store().snapshot(None).is_empty());
    assert!(discussion.pages().has_more(None));

    // Retry is just calling again; the same page is re-issued
    discussion.fetch_next_page(None).await.unwrap();
    let ids: Vec<_> = discussion.store().snapshot(None).iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![c1]);
}

#[tokio::test]
async fn reply_scopes_paginate_independently_of_the_root() {
    let server = MockServer::new();
    let user = server.create_user("ada");
    let auth = server.login(user);
    let top = server.seed_comment(user, None, "top", 10, at(10));
    let r1 = server.seed_comment(user, Some(top), "reply one", 20, at(20));
    let r2 = server.seed_comment(user, Some(top), "reply two", 30, at(30));

    let mut discussion = Discussion::new(&server, auth, viewer(user)).with_pagination(
        5,
        SortOrder::Newest,
        SortOrder::Oldest,
    );
    discussion.fetch_next_page(None).await.unwrap();
    discussion.fetch_next_page(Some(top)).await.unwrap();

    // Replies come back in conversation order even though the root is Newest
    let ids: Vec<_> = discussion
        .store()
        .snapshot(Some(top))
        .iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(ids, vec![r1, r2]);

    let items = discussion.thread(6);
    let got: Vec<_> = items.iter().map(|i| (i.id, i.depth)).collect();
    assert_eq!(got, vec![(top, 0), (r1, 1), (r2, 1)]);
}

#[tokio::test]
async fn like_round_trip_returns_to_the_original_state() {
    let server = MockServer::new();
    let user = server.create_user("ada");
    let auth = server.login(user);
    let c = server.seed_comment(user, None, "likeable", 10, at(10));

    let mut discussion = Discussion::new(&server, auth, viewer(user));
    discussion.fetch_next_page(None).await.unwrap();

    assert!(matches!(
        discussion.toggle_like(c).await,
        MutationOutcome::Confirmed
    ));
    let liked = discussion.store().get(c).unwrap();
    assert_eq!((liked.like_count, liked.liked_by_current_user), (1, true));

    assert!(matches!(
        discussion.toggle_like(c).await,
        MutationOutcome::Confirmed
    ));
    let unliked = discussion.store().get(c).unwrap();
    assert_eq!((unliked.like_count, unliked.liked_by_current_user), (0, false));
    assert_eq!(server.test_call_count(Op::ToggleLike), 2);
}

#[tokio::test]
async fn failed_like_toggle_rolls_back_silently() {
    let server = MockServer::new();
    let ada = server.create_user("ada");
    let grace = server.create_user("grace");
    let auth = server.login(ada);
    let c = server.seed_comment(ada, None, "controversial", 10, at(10));
    server.seed_likes(c, [grace, ada, UserId::stub()]);

    let mut discussion = Discussion::new(&server, auth, viewer(ada));
    discussion.fetch_next_page(None).await.unwrap();
    let before = discussion.store().get(c).unwrap().clone();
    assert_eq!((before.like_count, before.liked_by_current_user), (3, true));

    server.fail_next(Op::ToggleLike, Failure::Transport);
    assert!(matches!(
        discussion.toggle_like(c).await,
        MutationOutcome::RolledBack(_)
    ));
    let after = discussion.store().get(c).unwrap();
    assert_eq!((after.like_count, after.liked_by_current_user), (3, true));
}

#[tokio::test]
async fn coalesced_taps_send_exactly_one_request() {
    let server = MockServer::new();
    let user = server.create_user("ada");
    let auth = server.login(user);
    let c = server.seed_comment(user, None, "tap tap", 10, at(10));

    // Drive the components directly so both taps land before the round trip
    // resolves, the way a UI event loop interleaves them
    use dogear_client::api::Server;
    let mut store = CommentStore::new();
    let mut muts = MutationCoordinator::new();
    let mut pages = dogear_client::Pagination::new(5, SortOrder::Newest, SortOrder::Oldest);

    let fetch = pages.begin_fetch(None).unwrap();
    let comments = server.fetch_comments(auth, &fetch.request).await.unwrap();
    pages.complete_fetch(&mut store, None, fetch.generation, comments);

    let first = muts.begin_like(&mut store, c);
    let second = muts.begin_like(&mut store, c);
    assert!(first.is_some());
    assert_eq!(second, None);

    // Only the surviving tap goes out
    server.toggle_like(auth, c).await.unwrap();
    muts.finish_like(&mut store, c, true);

    assert_eq!(server.test_call_count(Op::ToggleLike), 1);
    let after = store.get(c).unwrap();
    assert_eq!((after.like_count, after.liked_by_current_user), (1, true));
}

#[tokio::test]
async fn confirmed_post_under_oldest_refreshes_the_scope() {
    let server = MockServer::new();
    let user = server.create_user("ada");
    let auth = server.login(user);
    let a = server.seed_comment(user, None, "earlier", 10, at(10));
    let b = server.seed_comment(user, None, "later", 20, at(20));

    let mut discussion = Discussion::new(&server, auth, viewer(user)).with_pagination(
        10,
        SortOrder::Oldest,
        SortOrder::Oldest,
    );
    discussion.fetch_next_page(None).await.unwrap();
    assert_eq!(server.test_call_count(Op::FetchComments), 1);

    assert!(matches!(
        discussion.post_comment(None, "me three".to_string()).await,
        MutationOutcome::Confirmed
    ));

    // Chronological-ascending placement is only trusted after a refetch
    assert_eq!(server.test_call_count(Op::FetchComments), 2);
    let snapshot = discussion.store().snapshot(None);
    assert_eq!(snapshot.len(), 3);
    assert_eq!(snapshot[0].id, a);
    assert_eq!(snapshot[1].id, b);
    assert_eq!(snapshot[2].text, "me three");
    assert!(!snapshot[2].pending);
    assert!(server.test_comment_exists(snapshot[2].id));
}

#[tokio::test]
async fn confirmed_post_under_newest_keeps_optimistic_placement() {
    let server = MockServer::new();
    let user = server.create_user("ada");
    let auth = server.login(user);
    server.seed_comment(user, None, "earlier", 10, at(10));

    let mut discussion = Discussion::new(&server, auth, viewer(user));
    discussion.fetch_next_page(None).await.unwrap();
    assert_eq!(server.test_call_count(Op::FetchComments), 1);

    assert!(matches!(
        discussion.post_comment(None, "breaking news".to_string()).await,
        MutationOutcome::Confirmed
    ));

    // No refetch needed when new items sort first anyway
    assert_eq!(server.test_call_count(Op::FetchComments), 1);
    let snapshot = discussion.store().snapshot(None);
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[0].text, "breaking news");
    assert!(!snapshot[0].pending);
}

#[tokio::test]
async fn rejected_post_removes_the_optimistic_comment() {
    let server = MockServer::new();
    let user = server.create_user("ada");
    let auth = server.login(user);
    server.seed_comment(user, None, "existing", 10, at(10));

    let mut discussion = Discussion::new(&server, auth, viewer(user));
    discussion.fetch_next_page(None).await.unwrap();

    server.fail_next(Op::PostComment, Failure::Rejected(Error::PermissionDenied));
    let outcome = discussion.post_comment(None, "never lands".to_string()).await;
    match outcome {
        MutationOutcome::RolledBack(e) => {
            assert_eq!(e.rejection(), Some(&Error::PermissionDenied))
        }
        other => panic!("expected rollback, got {other:?}"),
    }

    let snapshot = discussion.store().snapshot(None);
    assert_eq!(snapshot.len(), 1);
    assert!(snapshot.iter().all(|c| !c.pending));
    assert_eq!(server.test_num_comments(), 1);
}

#[tokio::test]
async fn confirmed_delete_removes_comment_and_replies() {
    let server = MockServer::new();
    let user = server.create_user("ada");
    let auth = server.login(user);
    let top = server.seed_comment(user, None, "top", 10, at(10));
    let reply = server.seed_comment(user, Some(top), "reply", 20, at(20));

    let mut discussion = Discussion::new(&server, auth, viewer(user));
    discussion.fetch_next_page(None).await.unwrap();
    discussion.fetch_next_page(Some(top)).await.unwrap();

    assert!(matches!(
        discussion.delete_comment(top).await,
        MutationOutcome::Confirmed
    ));
    assert!(discussion.store().snapshot(None).is_empty());
    assert!(!discussion.store().contains(reply));
    assert!(!server.test_comment_exists(top));
    assert!(!server.test_comment_exists(reply));
}

#[tokio::test]
async fn failed_delete_refetches_the_owning_scope() {
    let server = MockServer::new();
    let user = server.create_user("ada");
    let auth = server.login(user);
    let c = server.seed_comment(user, None, "sticky", 10, at(10));

    let mut discussion = Discussion::new(&server, auth, viewer(user));
    discussion.fetch_next_page(None).await.unwrap();
    assert_eq!(server.test_call_count(Op::FetchComments), 1);

    server.fail_next(Op::DeleteComment, Failure::Transport);
    assert!(matches!(
        discussion.delete_comment(c).await,
        MutationOutcome::RolledBack(_)
    ));

    // The entry is not reconstructed from memory; the scope was refetched
    assert_eq!(server.test_call_count(Op::FetchComments), 2);
    let ids: Vec<_> = discussion.store().snapshot(None).iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![c]);
}

#[tokio::test]
async fn root_sort_roundtrip_leaves_reply_scopes_fetchable() {
    let server = MockServer::new();
    let user = server.create_user("ada");
    let auth = server.login(user);
    server.seed_comment(user, None, "first", 10, at(10));
    let c2 = server.seed_comment(user, None, "second", 20, at(20));
    let r = server.seed_comment(user, Some(c2), "reply", 30, at(30));

    let mut discussion = Discussion::new(&server, auth, viewer(user)).with_pagination(
        1,
        SortOrder::Newest,
        SortOrder::Oldest,
    );
    discussion.fetch_next_page(None).await.unwrap();
    // Exhaust c2's replies: a full page of one, then the empty page
    discussion.fetch_next_page(Some(c2)).await.unwrap();
    discussion.fetch_next_page(Some(c2)).await.unwrap();
    assert!(!discussion.pages().has_more(Some(c2)));

    // Sorting oldest-first drops c2 from page 1, replies included
    discussion.set_sort(SortOrder::Oldest).await.unwrap();
    assert!(!discussion.store().contains(c2));

    // Back to newest-first: c2 returns with one unloaded reply, and its
    // reply scope must start over rather than stay exhausted
    discussion.set_sort(SortOrder::Newest).await.unwrap();
    assert!(discussion.store().snapshot(Some(c2)).is_empty());
    assert_eq!(discussion.store().get(c2).unwrap().reply_count, 1);

    discussion.fetch_next_page(Some(c2)).await.unwrap();
    let ids: Vec<_> = discussion
        .store()
        .snapshot(Some(c2))
        .iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(ids, vec![r]);
}

#[tokio::test]
async fn failed_delete_leaves_reply_scopes_fetchable() {
    let server = MockServer::new();
    let user = server.create_user("ada");
    let auth = server.login(user);
    let top = server.seed_comment(user, None, "top", 10, at(10));
    let r = server.seed_comment(user, Some(top), "reply", 20, at(20));

    let mut discussion = Discussion::new(&server, auth, viewer(user));
    discussion.fetch_next_page(None).await.unwrap();
    discussion.fetch_next_page(Some(top)).await.unwrap();
    assert!(!discussion.pages().has_more(Some(top)));

    server.fail_next(Op::DeleteComment, Failure::Transport);
    assert!(matches!(
        discussion.delete_comment(top).await,
        MutationOutcome::RolledBack(_)
    ));

    // The refetched comment reports its one reply, which must be loadable
    let items = discussion.thread(6);
    assert_eq!(items[0].unloaded_replies, 1);
    discussion.fetch_next_page(Some(top)).await.unwrap();
    let ids: Vec<_> = discussion
        .store()
        .snapshot(Some(top))
        .iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(ids, vec![r]);
}

#[tokio::test]
async fn sort_change_restarts_the_root_scope() {
    let server = MockServer::new();
    let user = server.create_user("ada");
    let auth = server.login(user);
    let c1 = server.seed_comment(user, None, "first", 10, at(10));
    let c2 = server.seed_comment(user, None, "second", 20, at(20));

    let mut discussion = Discussion::new(&server, auth, viewer(user));
    discussion.fetch_next_page(None).await.unwrap();
    let ids: Vec<_> = discussion.store().snapshot(None).iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![c2, c1]);

    discussion.set_sort(SortOrder::Oldest).await.unwrap();
    let ids: Vec<_> = discussion.store().snapshot(None).iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![c1, c2]);

    // Re-selecting the active order does not refetch
    let fetches = server.test_call_count(Op::FetchComments);
    discussion.set_sort(SortOrder::Oldest).await.unwrap();
    assert_eq!(server.test_call_count(Op::FetchComments), fetches);
}

#[tokio::test]
async fn spoiler_gate_follows_viewer_progress_updates() {
    let server = MockServer::new();
    let user = server.create_user("ada");
    let auth = server.login(user);
    let early = server.seed_comment(user, None, "prologue", 5, at(10));
    let late = server.seed_comment(user, None, "the twist", 80, at(20));

    let mut discussion = Discussion::new(&server, auth, {
        let mut v = viewer(user);
        v.progress = 10;
        v
    });
    discussion.fetch_next_page(None).await.unwrap();

    let items = discussion.thread(6);
    let gates: Vec<_> = items.iter().map(|i| (i.id, i.obscured)).collect();
    assert_eq!(gates, vec![(late, true), (early, false)]);

    // The reader logs more progress elsewhere in the app
    discussion.set_viewer_progress(80);
    let items = discussion.thread(6);
    let gates: Vec<_> = items.iter().map(|i| (i.id, i.obscured)).collect();
    assert_eq!(gates, vec![(late, false), (early, false)]);
}
