mod common;

use common::Harness;
use meetpulse_core::CoreError;
use meetpulse_db::queries::{questions, users, votes};
use meetpulse_types::models::VoteType;

#[tokio::test]
async fn hidden_meetings_are_listed_for_admins_only() {
    let mut h = Harness::new();
    let (admin, alice, _bob) = h.admin_and_members().await;
    let open = h.directory.create_meeting(&admin, "Open", "Everyone").unwrap();
    let secret = h.directory.create_meeting(&admin, "Secret", "").unwrap();
    assert_eq!(open.description.as_deref(), Some("Everyone"));
    assert_eq!(secret.description, None);

    let hidden = h.directory.toggle_visibility(&admin, secret.id).unwrap();
    assert!(!hidden.is_visible);

    let titles = |list: Vec<meetpulse_types::models::Meeting>| -> Vec<String> {
        list.into_iter().map(|m| m.title).collect()
    };
    assert_eq!(titles(h.directory.list_meetings(&alice).unwrap()), vec!["Open"]);
    assert_eq!(
        titles(h.directory.list_meetings(&admin).unwrap()),
        vec!["Secret", "Open"]
    );
    assert_eq!(h.directory.admin_meetings(&admin).unwrap().len(), 2);

    // A hidden meeting still works through a direct link.
    let q = h.ledger.ask(&alice, secret.id, "Still here?").unwrap();
    assert_eq!(h.ledger.list(&alice, secret.id).unwrap()[0].id, q.id);
}

#[tokio::test]
async fn meeting_creation_is_admin_only_and_validated() {
    let mut h = Harness::new();
    let (admin, alice, _bob) = h.admin_and_members().await;

    assert!(matches!(
        h.directory.create_meeting(&alice, "Mine", ""),
        Err(CoreError::Forbidden(_))
    ));
    assert!(matches!(
        h.directory.create_meeting(&admin, "  ", ""),
        Err(CoreError::Validation(_))
    ));
    assert!(matches!(
        h.directory.create_meeting(&admin, &"t".repeat(256), ""),
        Err(CoreError::Validation(_))
    ));
    assert!(matches!(
        h.directory.toggle_visibility(&admin, 404),
        Err(CoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn approving_without_any_admin_promotes() {
    let mut h = Harness::new();
    let root = h.sign_up("root@example.com", "Root").await;
    let other = h.sign_up("other@example.com", "Other").await;
    let newcomer = h.sign_up("new@example.com", "New").await;
    let root_ctx = h.ctx(&root);

    let approved = h.directory.approve_user(&root_ctx, other.user.id).unwrap();
    assert!(approved.is_approved);
    assert!(!approved.is_admin);

    // Demote the only admin behind the back of a request already in flight.
    h.db
        .with_tx(|tx| users::set_admin(tx, root.user.id, false))
        .unwrap();

    let promoted = h.directory.approve_user(&root_ctx, newcomer.user.id).unwrap();
    assert!(promoted.is_approved);
    assert!(promoted.is_admin);
}

#[tokio::test]
async fn admin_role_guards() {
    let mut h = Harness::new();
    let (admin, alice, _bob) = h.admin_and_members().await;
    let admin_id = admin.user().unwrap().id;
    let alice_id = alice.user().unwrap().id;

    assert!(matches!(
        h.directory.toggle_admin(&admin, admin_id),
        Err(CoreError::Validation(_))
    ));
    assert!(matches!(
        h.directory.delete_user(&admin, admin_id),
        Err(CoreError::Validation(_))
    ));
    assert!(matches!(
        h.directory.toggle_admin(&alice, admin_id),
        Err(CoreError::Forbidden(_))
    ));

    let promoted = h.directory.toggle_admin(&admin, alice_id).unwrap();
    assert!(promoted.is_admin);

    // Alice, now an admin, may demote the first admin, but not the last one.
    let alice = h.gate.resolve_session(&h.gate.issue_session(&promoted).unwrap()).unwrap();
    let demoted = h.directory.toggle_admin(&alice, admin_id).unwrap();
    assert!(!demoted.is_admin);

    let admin = h
        .gate
        .resolve_session(&h.gate.issue_session(&demoted).unwrap())
        .unwrap();
    assert!(matches!(
        h.directory.toggle_admin(&admin, alice_id),
        Err(CoreError::Forbidden(_))
    ));

    let last = h.db.with_conn(|conn| users::count_admins(conn)).unwrap();
    assert_eq!(last, 1);
}

#[tokio::test]
async fn last_admin_cannot_be_removed() {
    let mut h = Harness::new();
    let (admin, alice, _bob) = h.admin_and_members().await;
    let admin_id = admin.user().unwrap().id;
    let alice_id = alice.user().unwrap().id;

    h.directory.toggle_admin(&admin, alice_id).unwrap();
    let alice_user = h
        .db
        .with_conn(|conn| users::get_user_by_id(conn, alice_id))
        .unwrap()
        .unwrap();
    let alice = meetpulse_core::RequestContext::authenticated(alice_user);

    h.directory.toggle_admin(&alice, admin_id).unwrap();

    // Only Alice is left; the stale admin context tries to remove her.
    assert!(matches!(
        h.directory.toggle_admin(&admin, alice_id),
        Err(CoreError::Conflict(_))
    ));
    assert!(matches!(
        h.directory.delete_user(&admin, alice_id),
        Err(CoreError::Conflict(_))
    ));
}

#[tokio::test]
async fn deleting_a_user_cascades() {
    let mut h = Harness::new();
    let (admin, alice, bob) = h.admin_and_members().await;
    let alice_id = alice.user().unwrap().id;
    let bob_id = bob.user().unwrap().id;
    let meeting = h.directory.create_meeting(&admin, "Retro", "").unwrap();

    let hers = h.ledger.ask(&alice, meeting.id, "Alice asks").unwrap();
    let his = h.ledger.ask(&bob, meeting.id, "Bob asks").unwrap();
    h.ledger.cast_vote(&bob, hers.id, VoteType::Up).unwrap();
    h.ledger.cast_vote(&alice, his.id, VoteType::Up).unwrap();

    h.directory.delete_user(&admin, alice_id).unwrap();
    assert!(matches!(
        h.directory.delete_user(&admin, alice_id),
        Err(CoreError::NotFound(_))
    ));

    let (remaining, bob_votes, his_votes) = h
        .db
        .with_conn(|conn| {
            Ok::<_, meetpulse_db::DbError>((
                questions::list_for_meeting(conn, meeting.id)?,
                votes::votes_for_questions(conn, &[hers.id])?,
                votes::votes_for_question(conn, his.id)?,
            ))
        })
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].author_id, bob_id);
    assert!(bob_votes.is_empty());
    assert!(his_votes.is_empty());
}

#[tokio::test]
async fn admin_user_list_reports_pending_and_meetings() {
    let mut h = Harness::new();
    let (admin, alice, _bob) = h.admin_and_members().await;
    h.sign_up("waiting@example.com", "Waiting").await;
    let one = h.directory.create_meeting(&admin, "One", "").unwrap();
    let two = h.directory.create_meeting(&admin, "Two", "").unwrap();
    h.ledger.ask(&alice, one.id, "a").unwrap();
    h.ledger.ask(&alice, one.id, "b").unwrap();
    h.ledger.ask(&alice, two.id, "c").unwrap();

    let listing = h.directory.admin_users(&admin).unwrap();
    assert_eq!(listing.pending_count, 1);
    assert_eq!(listing.users.len(), 4);
    assert_eq!(listing.users[0].user.email, "waiting@example.com");

    let alice_entry = listing
        .users
        .iter()
        .find(|e| e.user.email == "alice@example.com")
        .unwrap();
    assert_eq!(alice_entry.meetings, vec!["One", "Two"]);

    assert!(matches!(h.directory.admin_users(&alice), Err(CoreError::Forbidden(_))));
}

#[tokio::test]
async fn profile_lists_own_questions_newest_first() {
    let mut h = Harness::new();
    let (admin, alice, bob) = h.admin_and_members().await;
    let meeting = h.directory.create_meeting(&admin, "Retro", "").unwrap();
    h.ledger.ask(&alice, meeting.id, "older").unwrap();
    h.ledger.ask(&bob, meeting.id, "not mine").unwrap();
    h.ledger.ask(&alice, meeting.id, "newer").unwrap();

    let profile = h.directory.profile(&alice).unwrap();
    assert_eq!(profile.user.email, "alice@example.com");
    let texts: Vec<&str> = profile.questions.iter().map(|q| q.text.as_str()).collect();
    assert_eq!(texts, vec!["newer", "older"]);
    assert!(profile.questions.iter().all(|q| q.meeting_title == "Retro"));
}
