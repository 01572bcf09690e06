use super::*;

fn monitor() -> HeartbeatMonitor {
    HeartbeatMonitor::new(Duration::from_secs(30), Duration::from_secs(10))
}

#[test]
fn idle_monitor_has_no_deadline() {
    let hb = monitor();
    assert_eq!(hb.deadline(), None);
}

#[test]
fn start_schedules_the_first_ping_one_interval_out() {
    let mut hb = monitor();
    let t0 = Instant::now();
    hb.start(t0);
    assert_eq!(hb.deadline(), Some(t0 + Duration::from_secs(30)));
}

#[test]
fn early_tick_is_a_spurious_wake() {
    let mut hb = monitor();
    let t0 = Instant::now();
    hb.start(t0);
    assert_eq!(hb.on_tick(t0 + Duration::from_secs(29)), None);
    assert!(!hb.awaiting_pong());
}

#[test]
fn due_tick_sends_a_ping_and_opens_the_grace_window() {
    let mut hb = monitor();
    let t0 = Instant::now();
    hb.start(t0);

    let due = t0 + Duration::from_secs(30);
    assert_eq!(hb.on_tick(due), Some(TickAction::SendPing));
    assert!(hb.awaiting_pong());
    assert_eq!(hb.deadline(), Some(due + Duration::from_secs(10)));
}

#[test]
fn pong_within_grace_reschedules_the_next_ping() {
    let mut hb = monitor();
    let t0 = Instant::now();
    hb.start(t0);
    hb.on_tick(t0 + Duration::from_secs(30));

    let pong_at = t0 + Duration::from_secs(32);
    hb.on_pong(pong_at);
    assert!(!hb.awaiting_pong());
    assert_eq!(hb.deadline(), Some(pong_at + Duration::from_secs(30)));
}

#[test]
fn no_pong_within_grace_is_stale() {
    let mut hb = monitor();
    let t0 = Instant::now();
    hb.start(t0);
    hb.on_tick(t0 + Duration::from_secs(30));

    assert_eq!(
        hb.on_tick(t0 + Duration::from_secs(40)),
        Some(TickAction::ConnectionStale)
    );
    assert_eq!(hb.deadline(), None, "stale fires once, not repeatedly");
}

#[test]
fn pong_without_an_outstanding_probe_changes_nothing() {
    let mut hb = monitor();
    let t0 = Instant::now();
    hb.start(t0);
    hb.on_pong(t0 + Duration::from_secs(5));
    assert_eq!(hb.deadline(), Some(t0 + Duration::from_secs(30)));
}

#[test]
fn stop_clears_everything() {
    let mut hb = monitor();
    let t0 = Instant::now();
    hb.start(t0);
    hb.on_tick(t0 + Duration::from_secs(30));
    hb.stop();
    assert_eq!(hb.deadline(), None);
    assert!(!hb.awaiting_pong());
    assert_eq!(hb.on_tick(t0 + Duration::from_secs(100)), None);
}

// =============================================================================
// visibility
// =============================================================================

#[test]
fn pause_suspends_and_forgives_outstanding_probes() {
    let mut hb = monitor();
    let t0 = Instant::now();
    hb.start(t0);
    hb.on_tick(t0 + Duration::from_secs(30));

    hb.pause();
    assert_eq!(hb.deadline(), None);
    // Hours later the hidden tab must not be declared stale.
    assert_eq!(hb.on_tick(t0 + Duration::from_secs(7200)), None);
}

#[test]
fn resume_schedules_a_fresh_interval() {
    let mut hb = monitor();
    let t0 = Instant::now();
    hb.start(t0);
    hb.pause();

    let later = t0 + Duration::from_secs(600);
    hb.resume(later);
    assert_eq!(hb.deadline(), Some(later + Duration::from_secs(30)));
}

#[test]
fn pause_and_resume_before_start_are_no_ops() {
    let mut hb = monitor();
    hb.pause();
    hb.resume(Instant::now());
    assert_eq!(hb.deadline(), None);
}
