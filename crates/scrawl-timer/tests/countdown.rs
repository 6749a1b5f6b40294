//! Integration tests for the deadline countdown.
//!
//! Uses `start_paused` so tokio auto-advances the clock whenever every task
//! is idle; `sleep_until` resolves instantly and deterministically.

use std::time::Duration;

use scrawl_timer::{Countdown, CountdownConfig, CountdownEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Select,
    Draw,
}

fn countdown() -> Countdown<Phase> {
    Countdown::with_tick_interval(Duration::from_millis(250))
}

// =========================================================================
// Idle behaviour
// =========================================================================

#[test]
fn test_new_countdown_is_idle() {
    let c = countdown();
    assert!(!c.is_active());
    assert_eq!(c.phase(), None);
    assert_eq!(c.remaining(), None);
    assert_eq!(c.total(), None);
}

#[tokio::test(start_paused = true)]
async fn test_idle_countdown_never_fires() {
    let mut c = countdown();
    let result = tokio::time::timeout(Duration::from_secs(60), c.wait()).await;
    assert!(result.is_err(), "idle countdown should pend forever");
}

#[tokio::test]
async fn test_cancel_when_idle_is_safe() {
    let mut c = countdown();
    assert!(!c.cancel());
    assert!(!c.cancel());
}

// =========================================================================
// Ticks and expiry
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_first_event_is_a_tick() {
    let mut c = countdown();
    c.start(Phase::Draw, Duration::from_secs(10));

    match c.wait().await {
        CountdownEvent::Tick {
            phase,
            remaining,
            elapsed,
            total,
            ..
        } => {
            assert_eq!(phase, Phase::Draw);
            assert!(elapsed >= Duration::from_millis(250));
            assert!(elapsed < Duration::from_millis(300));
            assert_eq!(remaining + elapsed, total);
            assert_eq!(total, Duration::from_secs(10));
        }
        other => panic!("expected tick, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_expires_exactly_once_and_clears_itself() {
    let mut c = countdown();
    let id = c.start(Phase::Select, Duration::from_secs(1));

    let mut ticks = 0;
    loop {
        match c.wait().await {
            CountdownEvent::Tick { .. } => ticks += 1,
            CountdownEvent::Expired { id: expired, phase, .. } => {
                assert_eq!(expired, id);
                assert_eq!(phase, Phase::Select);
                break;
            }
        }
    }

    // 250, 500, 750 ms ticks; the 1000 ms wake-up is the expiry.
    assert_eq!(ticks, 3);
    assert!(!c.is_active());

    let again = tokio::time::timeout(Duration::from_secs(30), c.wait()).await;
    assert!(again.is_err(), "no event after expiry");
}

#[tokio::test(start_paused = true)]
async fn test_remaining_secs_rounds_up() {
    let mut c = countdown();
    c.start(Phase::Draw, Duration::from_secs(3));

    let event = c.wait().await;
    // 2.75 s left displays as 3.
    assert_eq!(event.remaining_secs(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_remaining_tracks_wall_clock_after_slow_poll() {
    let mut c = countdown();
    c.start(Phase::Draw, Duration::from_secs(10));

    // Nobody polls for 4 s; the next tick must report the true remaining
    // time, not 10 s minus one tick.
    tokio::time::advance(Duration::from_secs(4)).await;
    let event = c.wait().await;
    match event {
        CountdownEvent::Tick { remaining, .. } => {
            assert_eq!(remaining, Duration::from_secs(6));
        }
        other => panic!("expected tick, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_overdue_countdown_expires_on_next_poll() {
    let mut c = countdown();
    c.start(Phase::Draw, Duration::from_secs(2));

    tokio::time::advance(Duration::from_secs(5)).await;
    assert!(matches!(c.wait().await, CountdownEvent::Expired { .. }));
}

// =========================================================================
// Single flight
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_start_supersedes_previous_countdown() {
    let mut c = countdown();
    let first = c.start(Phase::Select, Duration::from_secs(1));
    let second = c.start(Phase::Draw, Duration::from_secs(5));
    assert_ne!(first, second);
    assert_eq!(c.phase(), Some(Phase::Draw));

    loop {
        match c.wait().await {
            CountdownEvent::Tick { id, .. } => assert_eq!(id, second),
            CountdownEvent::Expired { id, phase, .. } => {
                assert_eq!(id, second);
                assert_eq!(phase, Phase::Draw);
                break;
            }
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_all_events() {
    let mut c = countdown();
    c.start(Phase::Draw, Duration::from_secs(1));
    c.wait().await;

    assert!(c.cancel());
    assert!(!c.is_active());

    let result = tokio::time::timeout(Duration::from_secs(10), c.wait()).await;
    assert!(result.is_err(), "cancelled countdown must not tick or expire");
}

#[tokio::test(start_paused = true)]
async fn test_dropped_wait_future_loses_nothing() {
    let mut c = countdown();
    c.start(Phase::Draw, Duration::from_secs(1));

    // Poll with a timeout shorter than the tick interval, dropping the
    // in-flight future.
    let early = tokio::time::timeout(Duration::from_millis(100), c.wait()).await;
    assert!(early.is_err());
    assert!(c.is_active());

    assert!(matches!(c.wait().await, CountdownEvent::Tick { .. }));
}

// =========================================================================
// select! loop pattern (mirrors room actor usage)
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_select_loop_pattern() {
    let mut c = Countdown::new(CountdownConfig::with_tick_interval(Duration::from_millis(500)));
    c.start(Phase::Draw, Duration::from_secs(10));

    let (tx, mut rx) = tokio::sync::mpsc::channel::<&str>(4);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1600)).await;
        tx.send("guessed").await.ok();
    });

    let mut ticks = 0;
    loop {
        tokio::select! {
            Some(cmd) = rx.recv() => {
                assert_eq!(cmd, "guessed");
                c.cancel();
                break;
            }
            event = c.wait() => {
                assert!(matches!(event, CountdownEvent::Tick { .. }));
                ticks += 1;
            }
        }
    }

    assert_eq!(ticks, 3);
    assert!(!c.is_active());
}
