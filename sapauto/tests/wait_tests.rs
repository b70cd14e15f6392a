use sapauto::platforms::simulated::{SimulatedEngine, SystemBehavior};
use sapauto::{acquire_connection, wait_for_session, Acquired, AutomationError, ScriptingEngine, Timings};
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn test_wait_for_delayed_session() {
    let engine = SimulatedEngine::new().with_system(
        "SYS1",
        SystemBehavior::session_after(Duration::from_millis(7200)),
    );
    let conn = engine.open_connection("SYS1").unwrap();
    let start = Instant::now();

    // 1. A session that appears after 7.2s is seen at the 8s poll
    let wait_result =
        wait_for_session(conn.as_ref(), Duration::from_secs(15), Duration::from_secs(1)).await;
    assert!(
        wait_result.is_ok(),
        "wait should succeed for a session that appears before the timeout. Error: {:?}",
        wait_result.err()
    );
    assert_eq!(start.elapsed(), Duration::from_secs(8));

    // 2. A session that never appears times out
    let engine_never = SimulatedEngine::new().with_default_behavior(SystemBehavior::never_ready());
    let never_conn = engine_never.open_connection("SYS2").unwrap();

    let start = Instant::now();
    match wait_for_session(never_conn.as_ref(), Duration::from_secs(1), Duration::from_secs(1))
        .await
    {
        Err(AutomationError::Timeout(_)) => {}
        other => panic!("Expected a Timeout error, but got {other:?}"),
    }
    assert_eq!(start.elapsed(), Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_custom_timings_bound_the_wait() {
    let engine = SimulatedEngine::new().with_system("SYS1", SystemBehavior::never_ready());
    let timings = Timings {
        connect_timeout: Duration::from_secs(30),
        poll_interval: Duration::from_millis(250),
        ..Default::default()
    };

    let start = Instant::now();
    let result = acquire_connection(&engine, "SYS1", &timings).await;
    assert!(matches!(result, Err(AutomationError::Timeout(_))));
    assert_eq!(start.elapsed(), Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_reuse_skips_waiting() {
    let engine = SimulatedEngine::new().with_existing_connection("SYS1");
    let start = Instant::now();
    let (_, how) = acquire_connection(&engine, "SYS1", &Timings::default())
        .await
        .unwrap();
    assert_eq!(how, Acquired::Reused);
    assert_eq!(start.elapsed(), Duration::ZERO);
}
