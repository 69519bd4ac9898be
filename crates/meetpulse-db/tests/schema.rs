use chrono::{Duration, Utc};

use meetpulse_db::Database;
use meetpulse_db::queries::{challenges, meetings, polls, questions, users, votes};
use meetpulse_types::models::{OtpPurpose, ProfileFields, VoteType};

fn seeded() -> (Database, i64, i64, i64) {
    let db = Database::open_in_memory().unwrap();
    let now = Utc::now();
    let (admin, member, meeting) = db
        .with_tx(|tx| {
            let admin = users::insert_user(tx, "admin@example.com", &ProfileFields::default(), true, true, now)?;
            let member = users::insert_user(tx, "member@example.com", &ProfileFields::default(), false, true, now)?;
            let meeting = meetings::insert_meeting(tx, "Standup", None, admin.id, now)?;
            Ok::<_, meetpulse_db::DbError>((admin.id, member.id, meeting.id))
        })
        .unwrap();
    (db, admin, member, meeting)
}

#[test]
fn second_active_poll_in_a_meeting_is_rejected() {
    let (db, _, _, meeting) = seeded();
    let now = Utc::now();

    let err = db
        .with_tx(|tx| {
            polls::insert_poll(tx, meeting, None, "First", now)?;
            polls::insert_poll(tx, meeting, None, "Second", now)
        })
        .unwrap_err();
    assert!(err.is_constraint_violation());

    // The failed transaction rolled back entirely.
    let active = db.with_conn(|conn| polls::count_active(conn, meeting)).unwrap();
    assert_eq!(active, 0);

    // Closing first makes room.
    db.with_tx(|tx| {
        polls::insert_poll(tx, meeting, None, "First", now)?;
        polls::close_active(tx, meeting, now)?;
        polls::insert_poll(tx, meeting, None, "Second", now)
    })
    .unwrap();
    let active = db.with_conn(|conn| polls::count_active(conn, meeting)).unwrap();
    assert_eq!(active, 1);
}

#[test]
fn emails_are_unique_regardless_of_case() {
    let (db, _, _, _) = seeded();
    let err = db
        .with_tx(|tx| {
            users::insert_user(tx, "ADMIN@example.com", &ProfileFields::default(), false, false, Utc::now())
        })
        .unwrap_err();
    assert!(err.is_constraint_violation());

    let found = db
        .with_conn(|conn| users::get_user_by_email(conn, "Admin@Example.com"))
        .unwrap();
    assert!(found.is_some());
}

#[test]
fn one_question_vote_per_user() {
    let (db, admin, member, meeting) = seeded();
    let now = Utc::now();
    let err = db
        .with_tx(|tx| {
            let q = questions::insert_question(tx, meeting, admin, "Why?", now)?;
            votes::insert_vote(tx, q, member, VoteType::Up, now)?;
            votes::insert_vote(tx, q, member, VoteType::Down, now)
        })
        .unwrap_err();
    assert!(err.is_constraint_violation());
}

#[test]
fn replacing_a_challenge_resets_attempts() {
    let (db, _, _, _) = seeded();
    let now = Utc::now();
    let later = now + Duration::minutes(15);
    let email = "member@example.com";

    let attempts = db
        .with_tx(|tx| {
            challenges::replace_challenge(tx, email, OtpPurpose::Login, "aa", later, &ProfileFields::default(), now)?;
            challenges::increment_attempts(tx, email, OtpPurpose::Login)?;
            challenges::increment_attempts(tx, email, OtpPurpose::Login)
        })
        .unwrap();
    assert_eq!(attempts, 2);

    db.with_tx(|tx| {
        challenges::replace_challenge(tx, email, OtpPurpose::Login, "bb", later, &ProfileFields::default(), now)
    })
    .unwrap();

    let challenge = db
        .with_conn(|conn| challenges::get_challenge(conn, email, OtpPurpose::Login))
        .unwrap()
        .unwrap();
    assert_eq!(challenge.code_hash, "bb");
    assert_eq!(challenge.attempt_count, 0);

    // Signup and login challenges live side by side.
    let signup = db
        .with_conn(|conn| challenges::get_challenge(conn, email, OtpPurpose::Signup))
        .unwrap();
    assert!(signup.is_none());
}

#[test]
fn deleting_a_user_cascades_to_their_content() {
    let (db, admin, member, meeting) = seeded();
    let now = Utc::now();

    let (theirs, pinned_poll) = db
        .with_tx(|tx| {
            let theirs = questions::insert_question(tx, meeting, member, "Mine", now)?;
            let admins = questions::insert_question(tx, meeting, admin, "Admin's", now)?;
            votes::insert_vote(tx, theirs, admin, VoteType::Up, now)?;
            votes::insert_vote(tx, admins, member, VoteType::Down, now)?;

            let poll = polls::insert_poll(tx, meeting, Some(theirs), "Pinned", now)?;
            let option = polls::insert_option(tx, poll, "Yes", 0)?;
            polls::insert_option(tx, poll, "No", 1)?;
            polls::insert_pulse_vote(tx, poll, member, option, now)?;
            Ok::<_, meetpulse_db::DbError>((theirs, poll))
        })
        .unwrap();

    let deleted = db.with_tx(|tx| users::delete_user(tx, member)).unwrap();
    assert_eq!(deleted, 1);

    db.with_conn(|conn| {
        assert!(questions::get_question(conn, theirs)?.is_none());
        assert!(votes::votes_for_question(conn, theirs)?.is_empty());

        let remaining = questions::list_for_meeting(conn, meeting)?;
        assert_eq!(remaining.len(), 1);
        assert!(votes::votes_for_question(conn, remaining[0].id)?.is_empty());

        let poll = polls::get_poll(conn, pinned_poll)?.unwrap();
        assert_eq!(poll.question_id, None);
        let counts: Vec<i64> = polls::options_with_counts(conn, pinned_poll)?
            .iter()
            .map(|o| o.votes)
            .collect();
        assert_eq!(counts, vec![0, 0]);
        Ok::<_, meetpulse_db::DbError>(())
    })
    .unwrap();
}

#[test]
fn ending_a_poll_keeps_the_first_end_time() {
    let (db, _, _, meeting) = seeded();
    let start = Utc::now();
    let first_end = start + Duration::minutes(5);

    let poll = db
        .with_tx(|tx| polls::insert_poll(tx, meeting, None, "Mood", start))
        .unwrap();
    assert_eq!(db.with_tx(|tx| polls::end_poll(tx, poll, first_end)).unwrap(), 1);
    assert_eq!(
        db.with_tx(|tx| polls::end_poll(tx, poll, first_end + Duration::minutes(5)))
            .unwrap(),
        0
    );

    let row = db.with_conn(|conn| polls::get_poll(conn, poll)).unwrap().unwrap();
    assert!(!row.active);
    assert_eq!(row.ended_at, Some(first_end));
}

#[test]
fn file_database_reopens_with_data() {
    let dir = std::env::temp_dir().join(format!("meetpulse_db_test_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("reopen.db");
    let _ = std::fs::remove_file(&path);

    {
        let db = Database::open(&path).unwrap();
        db.with_tx(|tx| {
            users::insert_user(tx, "disk@example.com", &ProfileFields::default(), true, true, Utc::now())
        })
        .unwrap();
    }

    let db = Database::open(&path).unwrap();
    let count = db.with_conn(|conn| users::count_users(conn)).unwrap();
    assert_eq!(count, 1);

    drop(db);
    let _ = std::fs::remove_dir_all(&dir);
}
