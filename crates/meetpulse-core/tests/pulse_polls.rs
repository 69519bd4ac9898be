mod common;

use common::Harness;
use meetpulse_core::CoreError;
use meetpulse_core::pulse::{StartPoll, default_options};
use meetpulse_db::queries::polls;
use meetpulse_types::api::PulseSnapshot;

fn yes_no(meeting_id: i64) -> StartPoll {
    StartPoll {
        meeting_id,
        title: "Ready to ship?".into(),
        options: vec!["Yes".into(), "No".into()],
        ..Default::default()
    }
}

fn option_id(snapshot: &PulseSnapshot, text: &str) -> i64 {
    snapshot
        .poll
        .as_ref()
        .and_then(|p| p.options.iter().find(|o| o.text == text))
        .map(|o| o.id)
        .unwrap()
}

#[tokio::test]
async fn two_yes_one_no_is_67_33() {
    let mut h = Harness::new();
    let (admin, alice, bob) = h.admin_and_members().await;
    let meeting = h.directory.create_meeting(&admin, "Demo day", "").unwrap();

    let started = h.pulse.start(&admin, yes_no(meeting.id)).unwrap();
    assert!(started.active);
    let yes = option_id(&started, "Yes");
    let no = option_id(&started, "No");

    h.pulse.vote(&alice, yes).unwrap();
    h.pulse.vote(&bob, yes).unwrap();
    h.pulse.vote(&admin, no).unwrap();

    let snapshot = h.pulse.get(&alice, meeting.id).unwrap();
    let poll = snapshot.poll.unwrap();
    assert_eq!(poll.total_votes, 3);
    let shape: Vec<(&str, i64, i64)> = poll
        .options
        .iter()
        .map(|o| (o.text.as_str(), o.votes, o.pct))
        .collect();
    assert_eq!(shape, vec![("Yes", 2, 67), ("No", 1, 33)]);

    let mine: Vec<bool> = poll.options.iter().map(|o| o.my_vote).collect();
    assert_eq!(mine, vec![true, false]);
}

#[tokio::test]
async fn revoting_moves_the_single_ballot() {
    let mut h = Harness::new();
    let (admin, alice, _bob) = h.admin_and_members().await;
    let meeting = h.directory.create_meeting(&admin, "Demo day", "").unwrap();
    let started = h.pulse.start(&admin, yes_no(meeting.id)).unwrap();
    let yes = option_id(&started, "Yes");
    let no = option_id(&started, "No");

    h.pulse.vote(&alice, yes).unwrap();
    h.pulse.vote(&alice, yes).unwrap();
    let moved = h.pulse.vote(&alice, no).unwrap().poll.unwrap();

    assert_eq!(moved.total_votes, 1);
    let counts: Vec<i64> = moved.options.iter().map(|o| o.votes).collect();
    assert_eq!(counts, vec![0, 1]);
    let pct: Vec<i64> = moved.options.iter().map(|o| o.pct).collect();
    assert_eq!(pct, vec![0, 100]);
}

#[tokio::test]
async fn starting_a_poll_replaces_the_running_one() {
    let mut h = Harness::new();
    let (admin, alice, _bob) = h.admin_and_members().await;
    let meeting = h.directory.create_meeting(&admin, "Demo day", "").unwrap();

    let first = h.pulse.start(&admin, yes_no(meeting.id)).unwrap();
    let first_yes = option_id(&first, "Yes");
    let second = h
        .pulse
        .start(
            &admin,
            StartPoll {
                meeting_id: meeting.id,
                title: "Lunch?".into(),
                options: vec!["Pizza".into(), "Salad".into(), "Pizza".into()],
                ..Default::default()
            },
        )
        .unwrap();

    let active = h
        .db
        .with_conn(|conn| polls::count_active(conn, meeting.id))
        .unwrap();
    assert_eq!(active, 1);

    let current = h.pulse.get(&alice, meeting.id).unwrap();
    let poll = current.poll.unwrap();
    assert_eq!(Some(poll.id), second.poll.as_ref().map(|p| p.id));
    assert_eq!(poll.options.len(), 2, "duplicates dropped");

    assert!(matches!(
        h.pulse.vote(&alice, first_yes),
        Err(CoreError::PollClosed)
    ));
}

#[tokio::test]
async fn polls_in_other_meetings_are_untouched() {
    let mut h = Harness::new();
    let (admin, _alice, _bob) = h.admin_and_members().await;
    let a = h.directory.create_meeting(&admin, "A", "").unwrap();
    let b = h.directory.create_meeting(&admin, "B", "").unwrap();

    h.pulse.start(&admin, yes_no(a.id)).unwrap();
    h.pulse.start(&admin, yes_no(b.id)).unwrap();

    for meeting_id in [a.id, b.id] {
        let active = h
            .db
            .with_conn(|conn| polls::count_active(conn, meeting_id))
            .unwrap();
        assert_eq!(active, 1);
    }
}

#[tokio::test]
async fn ending_is_idempotent_and_keeps_results_visible() {
    let mut h = Harness::new();
    let (admin, alice, _bob) = h.admin_and_members().await;
    let meeting = h.directory.create_meeting(&admin, "Demo day", "").unwrap();
    let started = h.pulse.start(&admin, yes_no(meeting.id)).unwrap();
    let poll_id = started.poll.as_ref().unwrap().id;
    h.pulse.vote(&alice, option_id(&started, "Yes")).unwrap();

    let ended = h.pulse.end(&admin, poll_id).unwrap();
    assert!(!ended.active);
    let ended_at = ended.poll.as_ref().unwrap().ended_at;
    assert!(ended_at.is_some());

    let again = h.pulse.end(&admin, poll_id).unwrap();
    assert_eq!(again.poll.unwrap().ended_at, ended_at);

    let seen = h.pulse.get(&alice, meeting.id).unwrap();
    assert!(!seen.active);
    assert_eq!(seen.poll.unwrap().total_votes, 1);

    assert!(matches!(h.pulse.end(&admin, poll_id + 99), Err(CoreError::NotFound(_))));
    assert!(!h.pulse.admin_view(&admin, Some(meeting.id)).unwrap().snapshot.active);
}

#[tokio::test]
async fn meeting_without_polls_reads_inactive() {
    let mut h = Harness::new();
    let (admin, alice, _bob) = h.admin_and_members().await;
    let meeting = h.directory.create_meeting(&admin, "Quiet", "").unwrap();

    let snapshot = h.pulse.get(&alice, meeting.id).unwrap();
    assert_eq!(snapshot, PulseSnapshot::empty());
    assert_eq!(
        serde_json::to_value(&snapshot).unwrap(),
        serde_json::json!({ "active": false })
    );
}

#[tokio::test]
async fn option_counts_are_validated() {
    let mut h = Harness::new();
    let (admin, _alice, _bob) = h.admin_and_members().await;
    let meeting = h.directory.create_meeting(&admin, "Demo day", "").unwrap();

    for options in [vec!["Only".to_string()], vec![" ".to_string(), "".to_string()]] {
        let request = StartPoll {
            options,
            ..yes_no(meeting.id)
        };
        assert!(matches!(
            h.pulse.start(&admin, request),
            Err(CoreError::InvalidOptions(_))
        ));
    }
    let nine = StartPoll {
        options: (1..=9).map(|i| i.to_string()).collect(),
        ..yes_no(meeting.id)
    };
    assert!(matches!(
        h.pulse.start(&admin, nine),
        Err(CoreError::InvalidOptions(_))
    ));
}

#[tokio::test]
async fn pinned_question_must_belong_to_the_meeting() {
    let mut h = Harness::new();
    let (admin, alice, _bob) = h.admin_and_members().await;
    let here = h.directory.create_meeting(&admin, "Here", "").unwrap();
    let there = h.directory.create_meeting(&admin, "There", "").unwrap();
    let elsewhere = h.ledger.ask(&alice, there.id, "Elsewhere?").unwrap();
    let local = h.ledger.ask(&alice, here.id, "Should we hire?").unwrap();

    let cross = StartPoll {
        meeting_id: here.id,
        question_id: Some(elsewhere.id),
        options: default_options(true),
        ..Default::default()
    };
    assert!(matches!(h.pulse.start(&admin, cross), Err(CoreError::NotFound(_))));

    let pinned = h
        .pulse
        .start(
            &admin,
            StartPoll {
                meeting_id: here.id,
                question_id: Some(local.id),
                options: default_options(true),
                ..Default::default()
            },
        )
        .unwrap()
        .poll
        .unwrap();
    assert_eq!(pinned.title, "Should we hire?");
    assert_eq!(pinned.question_id, Some(local.id));

    let view = h.pulse.admin_view(&admin, None).unwrap();
    assert!(view.snapshot.active);
    assert_eq!(view.meeting_title.as_deref(), Some("Here"));
    assert_eq!(view.question_text.as_deref(), Some("Should we hire?"));
}

#[tokio::test]
async fn untitled_unpinned_poll_is_rejected() {
    let mut h = Harness::new();
    let (admin, _alice, _bob) = h.admin_and_members().await;
    let meeting = h.directory.create_meeting(&admin, "Demo day", "").unwrap();
    let request = StartPoll {
        title: "   ".into(),
        ..yes_no(meeting.id)
    };
    assert!(matches!(h.pulse.start(&admin, request), Err(CoreError::Validation(_))));
}

#[tokio::test]
async fn only_admins_run_polls_and_only_approved_users_vote() {
    let mut h = Harness::new();
    let (admin, alice, _bob) = h.admin_and_members().await;
    let pending = h.sign_up("pending@example.com", "Pending").await;
    let pending = h.ctx(&pending);
    let meeting = h.directory.create_meeting(&admin, "Demo day", "").unwrap();

    assert!(matches!(
        h.pulse.start(&alice, yes_no(meeting.id)),
        Err(CoreError::Forbidden(_))
    ));
    let started = h.pulse.start(&admin, yes_no(meeting.id)).unwrap();
    let poll_id = started.poll.as_ref().unwrap().id;

    assert!(matches!(
        h.pulse.vote(&pending, option_id(&started, "Yes")),
        Err(CoreError::Forbidden(_))
    ));
    assert!(h.pulse.get(&pending, meeting.id).unwrap().active);
    assert!(matches!(h.pulse.end(&alice, poll_id), Err(CoreError::Forbidden(_))));
}

#[tokio::test]
async fn pinned_question_text_overrides_a_leftover_title() {
    let mut h = Harness::new();
    let (admin, alice, _bob) = h.admin_and_members().await;
    let meeting = h.directory.create_meeting(&admin, "Hiring", "").unwrap();
    let q = h.ledger.ask(&alice, meeting.id, "Should we hire?").unwrap();

    let poll = h
        .pulse
        .start(
            &admin,
            StartPoll {
                meeting_id: meeting.id,
                question_id: Some(q.id),
                title: "stale general title".into(),
                options: default_options(true),
            },
        )
        .unwrap()
        .poll
        .unwrap();
    assert_eq!(poll.title, "Should we hire?");

    let stored = h
        .db
        .with_conn(|conn| polls::get_poll(conn, poll.id))
        .unwrap()
        .unwrap();
    assert_eq!(stored.title, "Should we hire?");
}
