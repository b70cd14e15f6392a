use tracing::{debug, info, instrument, warn};

use crate::errors::AutomationError;
use crate::platforms::{GuiConnection, ScriptingEngine};
use crate::types::Timings;
use tokio::time::{sleep, Duration, Instant};

/// How a ready connection was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquired {
    Reused,
    Opened,
}

/// Find the open connection whose description equals `system_name`.
///
/// Connections whose description cannot be read are ignored.
pub fn find_connection(
    engine: &dyn ScriptingEngine,
    system_name: &str,
) -> Result<Option<Box<dyn GuiConnection>>, AutomationError> {
    for conn in engine.connections()? {
        match conn.description() {
            Ok(description) if description == system_name => return Ok(Some(conn)),
            Ok(_) => {}
            Err(e) => debug!("skipping connection with unreadable description: {e}"),
        }
    }
    Ok(None)
}

/// Reuse the connection to `system_name` if SAP Logon has one, otherwise open
/// it and wait for its first session.
#[instrument(level = "debug", skip(engine, timings))]
pub async fn acquire_connection(
    engine: &dyn ScriptingEngine,
    system_name: &str,
    timings: &Timings,
) -> Result<(Box<dyn GuiConnection>, Acquired), AutomationError> {
    info!("Checking for existing connection to '{}'", system_name);
    if let Some(conn) = find_connection(engine, system_name)? {
        info!("Connection to '{}' already exists. Reusing it.", system_name);
        return Ok((conn, Acquired::Reused));
    }

    info!("No existing connection found. Opening a new one...");
    let conn = engine.open_connection(system_name)?;
    wait_for_session(conn.as_ref(), timings.connect_timeout, timings.poll_interval).await?;
    info!("Session window has appeared");
    Ok((conn, Acquired::Opened))
}

/// Poll the session count until it is non-zero or `timeout` elapses.
///
/// The count is checked before every sleep and the last sleep is clamped to
/// the remaining budget, so the final poll lands exactly on the deadline and
/// the call never blocks past it. Returns the number of polls made.
pub async fn wait_for_session(
    conn: &dyn GuiConnection,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<usize, AutomationError> {
    let start = Instant::now();
    let deadline = start + timeout;
    let mut polls = 0usize;

    loop {
        polls += 1;
        let count = conn.session_count()?;
        if count > 0 {
            debug!(polls, elapsed = ?start.elapsed(), "session ready");
            return Ok(polls);
        }

        let now = Instant::now();
        if now >= deadline {
            warn!("Timeout exceeded. No session appeared for the connection.");
            return Err(AutomationError::Timeout(format!(
                "no session appeared within {timeout:?} ({polls} polls)"
            )));
        }

        let remaining = deadline.saturating_duration_since(now);
        // A zero interval would spin; fall back to waiting out the budget.
        let step = if poll_interval.is_zero() {
            remaining
        } else {
            poll_interval.min(remaining)
        };
        sleep(step).await;
    }
}
