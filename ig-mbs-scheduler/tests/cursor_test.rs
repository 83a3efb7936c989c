use chrono::{Duration, Local, TimeZone, Timelike};
use ig_mbs_scheduler::cursor::normalize_cron;
use ig_mbs_scheduler::{Result, ScheduleCursor, SchedulerError};
use interfaces::Timestamp;

fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> Timestamp {
    Local.with_ymd_and_hms(year, month, day, hour, minute, 0).unwrap()
}

#[test]
fn test_normalize_cron() {
    assert_eq!(normalize_cron("*/15 * * * *"), "0 */15 * * * *");
    assert_eq!(normalize_cron("  0 9 * * 1-5 "), "0 0 9 * * 1-5");
    assert_eq!(normalize_cron("30 0 9 * * *"), "30 0 9 * * *");
}

#[test]
fn test_invalid_cron_is_rejected_at_construction() {
    for expression in ["", "not a cron", "61 * * * *", "* * *"] {
        match ScheduleCursor::new(expression) {
            Err(SchedulerError::InvalidCronSpec { expression: reported, .. }) => {
                assert_eq!(reported, expression.trim());
            }
            other => panic!("expected InvalidCronSpec for '{}', got {:?}", expression, other),
        }
    }
}

#[test]
fn test_initialize_without_remote_uses_safety_margin_and_jitter() -> Result<()> {
    let now = at(2026, 1, 15, 10, 0);
    let mut cursor = ScheduleCursor::new("0 * * * *")?;

    let anchor = cursor.initialize_at(&[], now, 20, 0);
    assert_eq!(anchor, at(2026, 1, 15, 10, 20));

    let anchor = cursor.initialize_at(&[], now, 20, 15);
    assert_eq!(anchor, at(2026, 1, 15, 10, 35));
    assert_eq!(cursor.anchor(), anchor);
    Ok(())
}

#[test]
fn test_initialize_follows_latest_remote_time() -> Result<()> {
    let now = at(2026, 1, 15, 10, 0);
    let mut cursor = ScheduleCursor::new("0 12 * * *")?;

    // Out-of-order input still anchors on the latest entry.
    let remote = vec![at(2026, 1, 20, 12, 0), at(2026, 1, 16, 12, 0)];
    let anchor = cursor.initialize_at(&remote, now, 20, 10);
    assert_eq!(anchor, at(2026, 1, 20, 12, 10));
    assert_eq!(cursor.advance()?, at(2026, 1, 21, 12, 0));

    // Remote entries inside the safety margin are ignored.
    let remote = vec![at(2026, 1, 15, 10, 5)];
    let anchor = cursor.initialize_at(&remote, now, 20, 0);
    assert_eq!(anchor, at(2026, 1, 15, 10, 20));
    Ok(())
}

#[test]
fn test_anchor_bounds_hold_for_many_inputs() -> Result<()> {
    let now = at(2026, 3, 1, 8, 45);
    let remotes: Vec<Vec<Timestamp>> = vec![
        vec![],
        vec![now - Duration::days(3)],
        vec![now + Duration::minutes(5), now + Duration::minutes(19)],
        vec![now + Duration::hours(30), now + Duration::hours(2)],
    ];

    for expression in ["*/5 * * * *", "0 9 * * *", "0 0 18 * * Mon-Fri", "15 10 1 * *"] {
        for remote in &remotes {
            for jitter in [0u32, 7, 60] {
                let mut cursor = ScheduleCursor::new(expression)?;
                let anchor = cursor.initialize_at(remote, now, 20, jitter);
                assert!(anchor >= now + Duration::minutes(20));
                if let Some(latest) = remote.iter().max() {
                    assert!(anchor >= *latest);
                }
                assert!(cursor.peek_next()? > anchor);
            }
        }
    }
    Ok(())
}

#[test]
fn test_advance_is_strictly_increasing_and_ignores_peeks() -> Result<()> {
    let mut cursor = ScheduleCursor::with_anchor("0 * * * *", at(2026, 1, 15, 10, 20))?;

    let mut previous = cursor.anchor();
    let mut yielded = Vec::new();
    for _ in 0..5 {
        let peeked = cursor.peek_next()?;
        assert_eq!(cursor.peek_next()?, peeked);
        let next = cursor.advance()?;
        assert_eq!(next, peeked);
        assert!(next > previous);
        assert_eq!(next.minute(), 0);
        previous = next;
        yielded.push(next);
    }

    assert_eq!(yielded.first().copied(), Some(at(2026, 1, 15, 11, 0)));
    assert_eq!(yielded.last().copied(), Some(at(2026, 1, 15, 15, 0)));
    Ok(())
}

#[test]
fn test_restore_undoes_advances() -> Result<()> {
    let mut cursor = ScheduleCursor::with_anchor("30 9 * * *", at(2026, 1, 15, 10, 0))?;
    let checkpoint = cursor.checkpoint();

    let mut reference = cursor.clone();
    let expected = reference.advance()?;

    cursor.advance()?;
    cursor.advance()?;
    cursor.restore(checkpoint);
    cursor.peek_next()?;
    cursor.peek_next()?;

    assert_eq!(cursor.advance()?, expected);
    assert_eq!(expected, at(2026, 1, 16, 9, 30));
    Ok(())
}

#[test]
fn test_exhausted_schedule_is_reported() -> Result<()> {
    let mut cursor = ScheduleCursor::with_anchor("0 0 12 1 1 * 2020", at(2026, 1, 15, 10, 0))?;
    assert!(matches!(cursor.peek_next(), Err(SchedulerError::ScheduleExhausted { .. })));
    assert!(matches!(cursor.advance(), Err(SchedulerError::ScheduleExhausted { .. })));
    Ok(())
}
