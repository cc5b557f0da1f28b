mod common;

use chrono::Duration;
use match_engine::models::{
    InvitationStatus, MatchStatus, NotificationCategory, RatingScores, RequestStatus,
    SubmitRatingRequest,
};
use match_engine::store::{
    DocumentStore, INVITATIONS, JOIN_REQUESTS, MATCHES, NOTIFICATIONS, RATINGS, USERS,
};
use match_engine::{Actor, Clock, WorkflowError};
use serde_json::json;

use common::{match_request, setup, start};

fn scores(v: u8) -> RatingScores {
    RatingScores {
        punctuality: v,
        skills: v,
        behavior: v,
        teamwork: v,
    }
}

#[tokio::test]
async fn request_flow_fills_match_then_refuses() {
    let h = setup();
    let creator = h.player("creator", "Carla").await;
    let a = h.player("a", "Ana").await;
    let b = h.player("b", "Bea").await;
    let c = h.player("c", "Cris").await;
    let match_id = h.open_match(&creator, 2, 1).await;

    let req_a = h.wf.requests.request(&match_id, &a).await.unwrap();
    assert_eq!(req_a.status, RequestStatus::Pending);

    let accepted = h
        .wf
        .requests
        .accept(&req_a.id, &match_id, "a", &creator)
        .await
        .unwrap();
    assert_eq!(accepted.status, RequestStatus::Accepted);
    let view = h.wf.matches.get(&match_id).await.unwrap();
    assert_eq!(view.inner.participants, vec!["a"]);
    assert_eq!(view.status, MatchStatus::Open);

    let req_b = h.wf.requests.request(&match_id, &b).await.unwrap();
    h.wf.requests
        .accept(&req_b.id, &match_id, "b", &creator)
        .await
        .unwrap();
    let view = h.wf.matches.get(&match_id).await.unwrap();
    assert_eq!(view.inner.participants, vec!["a", "b"]);
    assert_eq!(view.status, MatchStatus::Full);

    assert!(matches!(
        h.wf.requests.request(&match_id, &c).await,
        Err(WorkflowError::MatchFull)
    ));
}

#[tokio::test]
async fn invitation_loses_to_requests_that_fill_the_match() {
    let mut h = setup();
    let creator = h.player("creator", "Carla").await;
    let x = h.player("x", "Xavi").await;
    let a = h.player("a", "Ana").await;
    let b = h.player("b", "Bea").await;
    let match_id = h.open_match(&creator, 2, 3).await;

    let inv = h.wf.invitations.send(&creator, &match_id, "x").await.unwrap();
    for p in [&a, &b] {
        let req = h.wf.requests.request(&match_id, p).await.unwrap();
        h.wf.requests
            .accept(&req.id, &match_id, &p.id, &creator)
            .await
            .unwrap();
    }

    assert!(matches!(
        h.wf.invitations.accept(&inv.id, &x).await,
        Err(WorkflowError::MatchFull)
    ));
    let view = h.wf.matches.get(&match_id).await.unwrap();
    assert_eq!(view.inner.participants, vec!["a", "b"]);

    let doc = h.store.get(INVITATIONS, &inv.id).await.unwrap().unwrap();
    assert_eq!(doc.body["status"], "declined");

    h.dispatcher.deliver_pending().await;
    let creator_inbox = h.wf.notifications.list(&creator, None).await.unwrap();
    assert!(creator_inbox.notifications.is_empty());
}

#[tokio::test]
async fn played_match_refuses_joins_and_acceptances() {
    let h = setup();
    let creator = h.player("creator", "Carla").await;
    let a = h.player("a", "Ana").await;
    let x = h.player("x", "Xavi").await;
    let r = h.player("r", "Raul").await;
    let late = h.player("late", "Lola").await;
    let match_id = h.open_match(&creator, 4, 1).await;
    h.wf.matches.join(&match_id, &a).await.unwrap();
    let inv = h.wf.invitations.send(&creator, &match_id, "x").await.unwrap();
    let req = h.wf.requests.request(&match_id, &r).await.unwrap();

    h.clock.advance(Duration::hours(2));

    assert!(matches!(
        h.wf.matches.join(&match_id, &late).await,
        Err(WorkflowError::InvalidState(_))
    ));
    assert!(matches!(
        h.wf.invitations.accept(&inv.id, &x).await,
        Err(WorkflowError::InvalidState(_))
    ));
    assert!(matches!(
        h.wf.requests.accept(&req.id, &match_id, "r", &creator).await,
        Err(WorkflowError::InvalidState(_))
    ));

    let view = h.wf.matches.get(&match_id).await.unwrap();
    assert_eq!(view.inner.participants, vec!["a"]);
    assert_eq!(view.status, MatchStatus::Completed);

    let inv_doc = h.store.get(INVITATIONS, &inv.id).await.unwrap().unwrap();
    assert_eq!(inv_doc.body["status"], "declined");
    let req_doc = h.store.get(JOIN_REQUESTS, &req.id).await.unwrap().unwrap();
    assert_eq!(req_doc.body["status"], "rejected");
}

#[tokio::test]
async fn accepting_after_joining_directly_closes_the_invitation() {
    let h = setup();
    let creator = h.player("creator", "Carla").await;
    let x = h.player("x", "Xavi").await;
    let match_id = h.open_match(&creator, 3, 2).await;

    let inv = h.wf.invitations.send(&creator, &match_id, "x").await.unwrap();
    h.wf.matches.join(&match_id, &x).await.unwrap();

    assert!(matches!(
        h.wf.invitations.accept(&inv.id, &x).await,
        Err(WorkflowError::AlreadyParticipant)
    ));
    let doc = h.store.get(INVITATIONS, &inv.id).await.unwrap().unwrap();
    assert_eq!(doc.body["status"], "accepted");
    assert!(h.wf.invitations.pending_for(&x).await.unwrap().is_empty());

    assert!(matches!(
        h.wf.invitations.accept(&inv.id, &x).await,
        Err(WorkflowError::InvalidState(_))
    ));
    let view = h.wf.matches.get(&match_id).await.unwrap();
    assert_eq!(view.inner.participants, vec!["x"]);
}

#[tokio::test]
async fn accepting_a_request_on_a_full_match_rejects_it() {
    let h = setup();
    let creator = h.player("creator", "Carla").await;
    let a = h.player("a", "Ana").await;
    let b = h.player("b", "Bea").await;
    let match_id = h.open_match(&creator, 1, 4).await;

    let req_a = h.wf.requests.request(&match_id, &a).await.unwrap();
    let req_b = h.wf.requests.request(&match_id, &b).await.unwrap();
    h.wf.requests
        .accept(&req_a.id, &match_id, "a", &creator)
        .await
        .unwrap();

    assert!(matches!(
        h.wf.requests.accept(&req_b.id, &match_id, "b", &creator).await,
        Err(WorkflowError::MatchFull)
    ));
    let doc = h.store.get(JOIN_REQUESTS, &req_b.id).await.unwrap().unwrap();
    assert_eq!(doc.body["status"], "rejected");
    let view = h.wf.matches.get(&match_id).await.unwrap();
    assert_eq!(view.inner.participants, vec!["a"]);
}

#[tokio::test]
async fn accepted_invitation_notifies_the_inviter() {
    let mut h = setup();
    let creator = h.player("creator", "Carla").await;
    let inviter = h.player("inviter", "Ivan").await;
    let x = h.player("x", "Xavi").await;
    let match_id = h.open_match(&creator, 3, 5).await;

    let inv = h.wf.invitations.send(&inviter, &match_id, "x").await.unwrap();
    assert_eq!(inv.invited_player_name, "Xavi");
    assert_eq!(h.wf.invitations.pending_for(&x).await.unwrap().len(), 1);

    let accepted = h.wf.invitations.accept(&inv.id, &x).await.unwrap();
    assert_eq!(accepted.status, InvitationStatus::Accepted);
    assert!(h.wf.invitations.pending_for(&x).await.unwrap().is_empty());
    assert_eq!(
        h.wf.matches.get(&match_id).await.unwrap().inner.participants,
        vec!["x"]
    );

    assert_eq!(h.dispatcher.deliver_pending().await, 2);
    let x_inbox = h.wf.notifications.list(&x, None).await.unwrap();
    assert_eq!(x_inbox.notifications[0].title, "Match Invitation");
    assert_eq!(
        x_inbox.notifications[0].data.inviter_name.as_deref(),
        Some("Ivan")
    );

    let inviter_inbox = h.wf.notifications.list(&inviter, None).await.unwrap();
    assert_eq!(inviter_inbox.notifications.len(), 1);
    assert_eq!(
        inviter_inbox.notifications[0].description,
        "Xavi accepted your invitation for the match at Club Central."
    );
    let creator_inbox = h.wf.notifications.list(&creator, None).await.unwrap();
    assert!(creator_inbox.notifications.is_empty());
}

#[tokio::test]
async fn declining_twice_never_flips_or_renotifies() {
    let mut h = setup();
    let creator = h.player("creator", "Carla").await;
    let x = h.player("x", "Xavi").await;
    let match_id = h.open_match(&creator, 2, 3).await;

    let inv = h.wf.invitations.send(&creator, &match_id, "x").await.unwrap();
    assert_eq!(h.dispatcher.deliver_pending().await, 1);

    let declined = h.wf.invitations.decline(&inv.id, &x).await.unwrap();
    assert_eq!(declined.status, InvitationStatus::Declined);

    assert!(matches!(
        h.wf.invitations.decline(&inv.id, &x).await,
        Err(WorkflowError::InvalidState(_))
    ));
    assert!(matches!(
        h.wf.invitations.accept(&inv.id, &x).await,
        Err(WorkflowError::InvalidState(_))
    ));

    let doc = h.store.get(INVITATIONS, &inv.id).await.unwrap().unwrap();
    assert_eq!(doc.body["status"], "declined");
    assert_eq!(h.dispatcher.deliver_pending().await, 0);
    assert!(h.wf.matches.get(&match_id).await.unwrap().inner.participants.is_empty());
}

#[tokio::test]
async fn only_the_invited_player_answers() {
    let h = setup();
    let creator = h.player("creator", "Carla").await;
    h.player("x", "Xavi").await;
    let match_id = h.open_match(&creator, 2, 3).await;
    let inv = h.wf.invitations.send(&creator, &match_id, "x").await.unwrap();

    assert!(matches!(
        h.wf.invitations.accept(&inv.id, &creator).await,
        Err(WorkflowError::Forbidden(_))
    ));
    assert!(matches!(
        h.wf.invitations.decline(&inv.id, &Actor::new("someone", "S")).await,
        Err(WorkflowError::Forbidden(_))
    ));
}

#[tokio::test]
async fn pending_invitations_and_requests_are_unique() {
    let h = setup();
    let creator = h.player("creator", "Carla").await;
    let x = h.player("x", "Xavi").await;
    let a = h.player("a", "Ana").await;
    let match_id = h.open_match(&creator, 3, 3).await;

    h.wf.invitations.send(&creator, &match_id, "x").await.unwrap();
    assert!(matches!(
        h.wf.invitations.send(&creator, &match_id, "x").await,
        Err(WorkflowError::DuplicateInvitation)
    ));

    h.wf.requests.request(&match_id, &a).await.unwrap();
    assert!(matches!(
        h.wf.requests.request(&match_id, &a).await,
        Err(WorkflowError::DuplicateRequest)
    ));

    // a fresh invitation is allowed once the earlier one is answered
    let pending = h.wf.invitations.pending_for(&x).await.unwrap();
    h.wf.invitations.decline(&pending[0].id, &x).await.unwrap();
    h.wf.invitations.send(&creator, &match_id, "x").await.unwrap();
}

#[tokio::test]
async fn concurrent_duplicate_invitations_insert_once() {
    let h = setup();
    let creator = h.player("creator", "Carla").await;
    h.player("x", "Xavi").await;
    let match_id = h.open_match(&creator, 3, 3).await;

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let wf = h.wf.clone();
        let creator = creator.clone();
        let match_id = match_id.clone();
        tasks.push(tokio::spawn(async move {
            wf.invitations.send(&creator, &match_id, "x").await
        }));
    }
    let mut sent = 0;
    for t in tasks {
        match t.await.unwrap() {
            Ok(_) => sent += 1,
            Err(WorkflowError::DuplicateInvitation) => {}
            Err(e) => panic!("unexpected error {e:?}"),
        }
    }
    assert_eq!(sent, 1);
    assert_eq!(h.store.count(INVITATIONS).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_joins_never_overfill() {
    let h = setup();
    let creator = h.player("creator", "Carla").await;
    let match_id = h.open_match(&creator, 3, 4).await;

    let mut tasks = Vec::new();
    for i in 0..10 {
        let wf = h.wf.clone();
        let match_id = match_id.clone();
        tasks.push(tokio::spawn(async move {
            let actor = Actor::new(format!("p{i}"), format!("Player {i}"));
            wf.matches.join(&match_id, &actor).await
        }));
    }

    let mut joined = 0;
    let mut full = 0;
    for t in tasks {
        match t.await.unwrap() {
            Ok(_) => joined += 1,
            Err(WorkflowError::MatchFull) => full += 1,
            Err(e) => panic!("unexpected error {e:?}"),
        }
    }
    assert_eq!((joined, full), (3, 7));
    let view = h.wf.matches.get(&match_id).await.unwrap();
    assert_eq!(view.inner.participants.len(), 3);
    assert_eq!(view.status, MatchStatus::Full);
}

#[tokio::test]
async fn ratings_fold_into_a_running_mean() {
    let h = setup();
    let creator = h.player("creator", "Carla").await;
    let a = h.player("a", "Ana").await;
    let b = h.player("b", "Bea").await;
    let c = h.player("c", "Cris").await;
    let match_id = h.open_match(&creator, 3, 1).await;
    for p in [&a, &b, &c] {
        h.wf.matches.join(&match_id, p).await.unwrap();
    }

    let early = h
        .wf
        .ratings
        .submit(
            &match_id,
            &a,
            SubmitRatingRequest {
                rated_player_id: "b".into(),
                scores: scores(5),
            },
        )
        .await;
    assert!(matches!(early, Err(WorkflowError::Validation(_))));

    h.clock.advance(Duration::hours(2));
    let first = h
        .wf
        .ratings
        .submit(
            &match_id,
            &a,
            SubmitRatingRequest {
                rated_player_id: "b".into(),
                scores: scores(5),
            },
        )
        .await
        .unwrap();
    assert_eq!(first.average_rating, 5.0);
    let summary = h.wf.ratings.summary("b").await.unwrap();
    assert_eq!((summary.rating, summary.rating_count), (5.0, 1));

    h.wf.ratings
        .submit(
            &match_id,
            &c,
            SubmitRatingRequest {
                rated_player_id: "b".into(),
                scores: scores(1),
            },
        )
        .await
        .unwrap();
    let summary = h.wf.ratings.summary("b").await.unwrap();
    assert_eq!((summary.rating, summary.rating_count), (3.0, 2));

    let history = h.wf.ratings.ratings_for("b").await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(h.wf.players.card("b").await.unwrap().rating, 3.0);
}

#[tokio::test]
async fn rating_rules_are_enforced() {
    let h = setup();
    let creator = h.player("creator", "Carla").await;
    let a = h.player("a", "Ana").await;
    let b = h.player("b", "Bea").await;
    let outsider = h.player("o", "Olga").await;
    let match_id = h.open_match(&creator, 2, 1).await;
    h.wf.matches.join(&match_id, &a).await.unwrap();
    h.wf.matches.join(&match_id, &b).await.unwrap();
    h.clock.advance(Duration::hours(2));

    let cases = [
        (&a, "b", RatingScores { punctuality: 0, ..scores(3) }),
        (&a, "a", scores(3)),
        (&outsider, "b", scores(3)),
        (&a, "o", scores(3)),
    ];
    for (rater, rated, s) in cases {
        let res = h
            .wf
            .ratings
            .submit(
                &match_id,
                rater,
                SubmitRatingRequest {
                    rated_player_id: rated.into(),
                    scores: s,
                },
            )
            .await;
        assert!(matches!(res, Err(WorkflowError::Validation(_))), "{rater:?} -> {rated}");
    }
    assert_eq!(h.store.count(RATINGS).await, 0);

    // rating twice is allowed and counted twice
    for _ in 0..2 {
        h.wf.ratings
            .submit(
                &match_id,
                &a,
                SubmitRatingRequest {
                    rated_player_id: "b".into(),
                    scores: scores(4),
                },
            )
            .await
            .unwrap();
    }
    assert_eq!(h.wf.ratings.summary("b").await.unwrap().rating_count, 2);
}

#[tokio::test]
async fn rating_is_removed_when_the_aggregate_cannot_be_updated() {
    let h = setup();
    let creator = h.player("creator", "Carla").await;
    let a = h.player("a", "Ana").await;
    let b = h.player("b", "Bea").await;
    let match_id = h.open_match(&creator, 2, 1).await;
    for p in [&a, &b] {
        h.wf.matches.join(&match_id, p).await.unwrap();
    }
    h.clock.advance(Duration::hours(2));
    let request = || SubmitRatingRequest {
        rated_player_id: "b".into(),
        scores: scores(4),
    };

    h.store.fail_writes(USERS).await;
    assert!(matches!(
        h.wf.ratings.submit(&match_id, &a, request()).await,
        Err(WorkflowError::Store(_))
    ));
    assert_eq!(h.store.count(RATINGS).await, 0);
    assert!(h.wf.ratings.ratings_for("b").await.unwrap().is_empty());

    h.store.restore_writes(USERS).await;
    h.wf.ratings.submit(&match_id, &a, request()).await.unwrap();
    assert_eq!(h.store.count(RATINGS).await, 1);
    assert_eq!(h.wf.ratings.summary("b").await.unwrap().rating_count, 1);
}

#[tokio::test]
async fn deleting_a_match_cascades_pending_records_only() {
    let h = setup();
    let creator = h.player("creator", "Carla").await;
    let x = h.player("x", "Xavi").await;
    let y = h.player("y", "Yago").await;
    let a = h.player("a", "Ana").await;
    let match_id = h.open_match(&creator, 3, 3).await;

    let answered = h.wf.invitations.send(&creator, &match_id, "x").await.unwrap();
    h.wf.invitations.decline(&answered.id, &x).await.unwrap();
    h.wf.invitations.send(&creator, &match_id, "y").await.unwrap();
    h.wf.requests.request(&match_id, &a).await.unwrap();

    let admin = Actor::admin("root", "Root");
    h.wf.matches.delete(&admin, &match_id).await.unwrap();

    assert_eq!(h.store.count(INVITATIONS).await, 1);
    assert_eq!(h.store.count(JOIN_REQUESTS).await, 0);
    assert!(h.wf.invitations.pending_for(&y).await.unwrap().is_empty());
    assert!(matches!(
        h.wf.matches.delete(&admin, &match_id).await,
        Err(WorkflowError::NotFound(_))
    ));
}

#[tokio::test]
async fn request_bookkeeping_for_both_sides() {
    let h = setup();
    let creator = h.player("creator", "Carla").await;
    let a = h.player("a", "Ana").await;
    let b = h.player("b", "Bea").await;
    let match_id = h.open_match(&creator, 3, 6).await;

    let ra = h.wf.requests.request(&match_id, &a).await.unwrap();
    h.clock.advance(Duration::minutes(1));
    h.wf.requests.request(&match_id, &b).await.unwrap();

    let incoming = h.wf.requests.incoming(&creator).await.unwrap();
    assert_eq!(incoming.len(), 2);
    assert_eq!(incoming[0].request.requested_by, "b");
    let details = incoming[0].match_details.as_ref().unwrap();
    assert_eq!(details.location, "Club Central");
    assert_eq!(details.players_needed, 3);

    assert!(matches!(
        h.wf.requests.accept(&ra.id, &match_id, "b", &creator).await,
        Err(WorkflowError::Validation(_))
    ));
    assert!(matches!(
        h.wf.requests.accept(&ra.id, &match_id, "a", &b).await,
        Err(WorkflowError::Forbidden(_))
    ));
    let rejected = h.wf.requests.reject(&ra.id, &creator).await.unwrap();
    assert_eq!(rejected.status, RequestStatus::Rejected);
    assert!(matches!(
        h.wf.requests.reject(&ra.id, &creator).await,
        Err(WorkflowError::InvalidState(_))
    ));

    assert_eq!(h.wf.requests.cancel(&match_id, &b).await.unwrap(), 1);
    assert!(h.wf.requests.incoming(&creator).await.unwrap().is_empty());
    assert_eq!(h.wf.requests.outgoing(&a).await.unwrap().len(), 1);

    assert!(matches!(
        h.wf.requests.request(&match_id, &creator).await,
        Err(WorkflowError::Validation(_))
    ));
}

#[tokio::test]
async fn create_match_with_invite_reports_failed_invitation() {
    let mut h = setup();
    let creator = h.player("creator", "Carla").await;
    h.player("x", "Xavi").await;
    let at = start() + Duration::hours(4);

    let mut req = match_request(at, 2);
    req.invite_player_id = Some("x".into());
    let created = h.wf.create_match(&creator, req).await.unwrap();
    assert!(created.invitation.is_some());
    assert!(created.invitation_error.is_none());

    let mut req = match_request(at, 2);
    req.invite_player_id = Some("ghost".into());
    let created = h.wf.create_match(&creator, req).await.unwrap();
    assert!(created.invitation.is_none());
    assert_eq!(created.invitation_error.as_deref(), Some("Player not found"));
    assert!(h.wf.matches.get(&created.created.inner.id).await.is_ok());

    assert_eq!(h.dispatcher.deliver_pending().await, 1);
}

#[tokio::test]
async fn sweep_sends_reminders_and_rating_requests_once() {
    let mut h = setup();
    let creator = h.player("creator", "Carla").await;
    let a = h.player("a", "Ana").await;
    let soon = h.open_match(&creator, 2, 1).await;
    let later = h.open_match(&creator, 2, 30).await;
    h.wf.matches.join(&soon, &a).await.unwrap();
    h.wf.matches.join(&later, &a).await.unwrap();

    let report = h.wf.reminders.sweep(h.clock.now()).await.unwrap();
    assert_eq!(report.reminders, 2);
    assert_eq!(report.rating_requests, 0);
    let again = h.wf.reminders.sweep(h.clock.now()).await.unwrap();
    assert_eq!(again.reminders, 0);

    h.clock.advance(Duration::hours(2));
    let report = h.wf.reminders.sweep(h.clock.now()).await.unwrap();
    assert_eq!(report.rating_requests, 1);
    assert_eq!(h.wf.reminders.sweep(h.clock.now()).await.unwrap().rating_requests, 0);

    assert_eq!(h.dispatcher.deliver_pending().await, 3);
    let system = h
        .wf
        .notifications
        .list(&a, Some(NotificationCategory::System))
        .await
        .unwrap();
    let titles: Vec<_> = system.notifications.iter().map(|n| n.title.as_str()).collect();
    assert_eq!(titles, vec!["Rating Request", "Match Reminder"]);
    assert_eq!(h.store.count(NOTIFICATIONS).await, 3);
}

#[tokio::test]
async fn sweep_skips_undecodable_matches() {
    let h = setup();
    let creator = h.player("creator", "Carla").await;
    let a = h.player("a", "Ana").await;
    h.store
        .put(MATCHES, "broken", json!({ "bogus": true }))
        .await
        .unwrap();
    let soon = h.open_match(&creator, 2, 1).await;
    h.wf.matches.join(&soon, &a).await.unwrap();

    let report = h.wf.reminders.sweep(h.clock.now()).await.unwrap();
    assert_eq!(report.reminders, 2);
    let doc = h.store.get(MATCHES, &soon).await.unwrap().unwrap();
    assert!(doc.body["reminderSentAt"].is_string());
}
