//! Logon, task and logoff for a single work item

use crate::connection::{acquire_connection, Acquired};
use crate::errors::AutomationError;
use crate::platforms::{GuiConnection, GuiSession, ScriptingEngine, VKEY_ENTER};
use crate::screen::{
    is_window, CLIENT_FIELD, LOGOFF_COMMAND, MAIN_WINDOW, OK_CODE_FIELD, PASSWORD_FIELD,
    POPUP_WINDOW, USER_FIELD,
};
use crate::types::{Timings, WorkItem};
use async_trait::async_trait;
use std::fmt;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// A live connection/session pair owned by one work item.
pub struct SessionHandle {
    // Kept alive for as long as the session is in use.
    _connection: Box<dyn GuiConnection>,
    session: Box<dyn GuiSession>,
    acquired: Acquired,
}

impl SessionHandle {
    pub fn session(&self) -> &dyn GuiSession {
        self.session.as_ref()
    }

    pub fn acquired(&self) -> Acquired {
        self.acquired
    }
}

/// Unit of work run while logged on.
#[async_trait(?Send)]
pub trait Task {
    fn name(&self) -> &str;

    async fn run(&self, session: &dyn GuiSession, timings: &Timings)
        -> Result<(), AutomationError>;
}

/// Stand-in for real transaction automation: waits `task_duration` and returns.
pub struct PlaceholderTask;

#[async_trait(?Send)]
impl Task for PlaceholderTask {
    fn name(&self) -> &str {
        "placeholder"
    }

    async fn run(
        &self,
        _session: &dyn GuiSession,
        timings: &Timings,
    ) -> Result<(), AutomationError> {
        info!("Performing automated tasks...");
        sleep(timings.task_duration).await;
        info!("Tasks finished");
        Ok(())
    }
}

/// What happened after the logon form was submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupOutcome {
    None,
    Closed,
    /// Probing or closing failed; the error is deliberately ignored.
    Ignored,
}

/// Drives one work item through logon, task and logoff.
pub struct Automator<'e> {
    engine: &'e dyn ScriptingEngine,
    item: WorkItem,
    password: String,
    timings: Timings,
    session: Option<SessionHandle>,
}

impl fmt::Debug for Automator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Automator")
            .field("engine", &self.engine.name())
            .field("item", &self.item)
            .field("connected", &self.session.is_some())
            .finish_non_exhaustive()
    }
}

impl<'e> Automator<'e> {
    pub fn new(
        engine: &'e dyn ScriptingEngine,
        item: WorkItem,
        password: impl Into<String>,
        timings: Timings,
    ) -> Self {
        Self {
            engine,
            item,
            password: password.into(),
            timings,
            session: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// The logged-on session, or `NotConnected` before `connect` succeeded.
    pub fn handle(&self) -> Result<&SessionHandle, AutomationError> {
        self.session
            .as_ref()
            .ok_or_else(|| AutomationError::NotConnected(self.item.to_string()))
    }

    /// Get a session for the item's system and log on.
    ///
    /// On any error the partially acquired session is released and the
    /// automator stays disconnected.
    #[instrument(skip(self), fields(system = %self.item.system_name, client = %self.item.client, user = %self.item.user))]
    pub async fn connect(&mut self) -> Result<(), AutomationError> {
        if self.password.is_empty() {
            error!(
                "No password provided for user {} on system {} {}",
                self.item.user, self.item.system_name, self.item.client
            );
            return Err(AutomationError::MissingPassword {
                system: self.item.system_name.clone(),
                client: self.item.client.clone(),
                user: self.item.user.clone(),
            });
        }
        if self.session.is_some() {
            debug!("already connected");
            return Ok(());
        }

        match self.establish().await {
            Ok(handle) => {
                info!(
                    acquired = ?handle.acquired(),
                    "Login successful for user {} on system {} {}",
                    self.item.user, self.item.system_name, self.item.client
                );
                self.session = Some(handle);
                Ok(())
            }
            Err(e) => {
                error!("Connection to {} failed: {}", self.item.system_name, e);
                Err(e)
            }
        }
    }

    async fn establish(&self) -> Result<SessionHandle, AutomationError> {
        let (connection, acquired) =
            acquire_connection(self.engine, &self.item.system_name, &self.timings).await?;
        let session = connection.session(0)?;

        let active = session.active_window_id()?;
        if !is_window(&active, MAIN_WINDOW) {
            error!("Active window is not the main logon screen. It might be a popup.");
            return Err(AutomationError::UnexpectedScreen {
                expected: MAIN_WINDOW.to_string(),
                actual: active,
            });
        }
        info!(
            "Connected to SAP system: {} {}",
            self.item.system_name, self.item.client
        );

        self.submit_logon(session.as_ref()).await?;
        dismiss_popup(session.as_ref());

        Ok(SessionHandle {
            _connection: connection,
            session,
            acquired,
        })
    }

    async fn submit_logon(&self, session: &dyn GuiSession) -> Result<(), AutomationError> {
        debug!("Filling credentials");
        session.set_text(CLIENT_FIELD, &self.item.client)?;
        session.set_text(USER_FIELD, &self.item.user)?;
        session.set_text(PASSWORD_FIELD, &self.password)?;

        debug!("Sending logon command");
        session.send_vkey(MAIN_WINDOW, VKEY_ENTER)?;
        sleep(self.timings.logon_settle).await;
        Ok(())
    }

    /// Run `task` on the active session. Without a session this only reports.
    pub async fn perform_task(&self, task: &dyn Task) -> Result<(), AutomationError> {
        let handle = match self.handle() {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Cannot perform task. {}", e);
                return Ok(());
            }
        };
        debug!(task = task.name(), "running task");
        task.run(handle.session(), &self.timings).await
    }

    /// Log off with `/nex` and release the session. No-op when not connected.
    ///
    /// Errors from the logoff commands are logged; the session is released regardless.
    pub async fn disconnect(&mut self) {
        let Some(handle) = self.session.take() else {
            return;
        };
        info!("Initiating logoff with {}", LOGOFF_COMMAND);
        let session = handle.session();
        let sent = session
            .set_text(OK_CODE_FIELD, LOGOFF_COMMAND)
            .and_then(|_| session.send_vkey(MAIN_WINDOW, VKEY_ENTER));
        match sent {
            Ok(()) => {
                sleep(self.timings.logoff_settle).await;
                info!("Logoff command sent");
            }
            Err(e) => error!("Logoff failed for {}: {}", self.item, e),
        }
    }
}

/// Close `wnd[1]` if the logon left one open.
///
/// Any error while probing or closing is swallowed: SAP raises for a missing
/// window just as it does for a broken session, and the two cannot be told
/// apart here. The error is kept at debug level so it is not lost entirely.
pub fn dismiss_popup(session: &dyn GuiSession) -> PopupOutcome {
    let probe = session.active_window_id().and_then(|active| {
        if is_window(&active, POPUP_WINDOW) {
            info!("A popup window was detected after logon. Closing it.");
            session.close_window(POPUP_WINDOW).map(|_| PopupOutcome::Closed)
        } else {
            Ok(PopupOutcome::None)
        }
    });
    probe.unwrap_or_else(|e| {
        debug!("ignoring error while handling post-logon popup: {e}");
        PopupOutcome::Ignored
    })
}
