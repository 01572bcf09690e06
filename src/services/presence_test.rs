use super::*;

fn user(name: &str) -> PresenceUser {
    PresenceUser { user_id: Uuid::new_v4(), name: name.into() }
}

#[test]
fn first_join_reports_new_user() {
    let mut tracker = PresenceTracker::new();
    assert!(tracker.join(Uuid::new_v4(), user("alice")));
    assert_eq!(tracker.online_count(), 1);
}

#[test]
fn second_tab_is_not_a_new_user() {
    let mut tracker = PresenceTracker::new();
    let alice = user("alice");
    assert!(tracker.join(Uuid::new_v4(), alice.clone()));
    assert!(!tracker.join(Uuid::new_v4(), alice));
    assert_eq!(tracker.online_count(), 1);
    assert_eq!(tracker.connections(), 2);
}

#[test]
fn leave_reports_user_only_on_last_session() {
    let mut tracker = PresenceTracker::new();
    let alice = user("alice");
    let tab1 = Uuid::new_v4();
    let tab2 = Uuid::new_v4();
    tracker.join(tab1, alice.clone());
    tracker.join(tab2, alice.clone());

    assert_eq!(tracker.leave(tab1), None);
    assert_eq!(tracker.leave(tab2), Some(alice));
    assert!(tracker.is_empty());
}

#[test]
fn leave_of_unknown_connection_is_a_no_op() {
    let mut tracker = PresenceTracker::new();
    tracker.join(Uuid::new_v4(), user("alice"));
    assert_eq!(tracker.leave(Uuid::new_v4()), None);
    assert_eq!(tracker.online_count(), 1);
}

#[test]
fn online_users_dedupes_and_sorts_by_name() {
    let mut tracker = PresenceTracker::new();
    let bob = user("bob");
    tracker.join(Uuid::new_v4(), bob.clone());
    tracker.join(Uuid::new_v4(), bob);
    tracker.join(Uuid::new_v4(), user("alice"));

    let names: Vec<String> = tracker.online_users().into_iter().map(|u| u.name).collect();
    assert_eq!(names, vec!["alice", "bob"]);
}
