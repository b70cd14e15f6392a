//! In-memory scripting engine
//!
//! Behaves like a single SAP Logon instance: connections are opened on
//! request, sessions appear after a configurable delay, the logon screen
//! accepts any credentials and `/nex` closes the connection. Used for
//! `--dry-run` and for tests, where every interaction is recorded.

use super::{GuiConnection, GuiSession, ScriptingEngine, VKEY_ENTER};
use crate::errors::AutomationError;
use crate::screen::{
    CLIENT_FIELD, LOGOFF_COMMAND, MAIN_WINDOW, OK_CODE_FIELD, POPUP_WINDOW, USER_FIELD,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// How a simulated system reacts once a connection to it is requested.
#[derive(Debug, Clone)]
pub struct SystemBehavior {
    /// Time until the first session shows up. `None` means it never does.
    pub session_delay: Option<Duration>,
    /// Window that is active when the session appears.
    pub initial_window: String,
    /// Open `wnd[1]` after the logon form is submitted.
    pub popup_after_logon: bool,
    /// Make `open_connection` fail with this message.
    pub open_error: Option<String>,
    /// Element id that cannot be found on this system.
    pub missing_field: Option<String>,
}

impl Default for SystemBehavior {
    fn default() -> Self {
        Self {
            session_delay: Some(Duration::ZERO),
            initial_window: MAIN_WINDOW.to_string(),
            popup_after_logon: false,
            open_error: None,
            missing_field: None,
        }
    }
}

impl SystemBehavior {
    pub fn session_after(delay: Duration) -> Self {
        Self {
            session_delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn never_ready() -> Self {
        Self {
            session_delay: None,
            ..Default::default()
        }
    }

    pub fn with_popup(mut self) -> Self {
        self.popup_after_logon = true;
        self
    }

    pub fn with_initial_window(mut self, window: impl Into<String>) -> Self {
        self.initial_window = window.into();
        self
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            open_error: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn missing(mut self, id: impl Into<String>) -> Self {
        self.missing_field = Some(id.into());
        self
    }
}

/// Everything the simulated GUI was asked to do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimEvent {
    ConnectionOpened { description: String },
    FieldSet { connection: usize, id: String, text: String },
    KeySent { connection: usize, window: String, vkey: u32 },
    LoggedOn { connection: usize, client: String, user: String },
    WindowClosed { connection: usize, window: String },
    LoggedOff { connection: usize },
}

struct SimConnection {
    id: usize,
    description: String,
    opened_at: Instant,
    behavior: SystemBehavior,
    active_window: String,
    fields: HashMap<String, String>,
    logged_on: bool,
}

impl SimConnection {
    fn session_ready(&self) -> bool {
        self.behavior
            .session_delay
            .is_some_and(|delay| self.opened_at.elapsed() >= delay)
    }
}

#[derive(Default)]
struct SimState {
    default_behavior: SystemBehavior,
    systems: HashMap<String, SystemBehavior>,
    connections: Vec<SimConnection>,
    next_id: usize,
    events: Vec<SimEvent>,
}

impl SimState {
    fn connection_mut(&mut self, id: usize) -> Result<&mut SimConnection, AutomationError> {
        self.connections
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| {
                AutomationError::scripting(
                    "connection",
                    format!("connection {id} no longer exists"),
                )
            })
    }

    fn add_connection(&mut self, description: &str, behavior: SystemBehavior) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        self.connections.push(SimConnection {
            id,
            description: description.to_string(),
            opened_at: Instant::now(),
            active_window: behavior.initial_window.clone(),
            behavior,
            fields: HashMap::new(),
            logged_on: false,
        });
        id
    }
}

/// Cheap to clone; clones share the same simulated GUI.
#[derive(Clone, Default)]
pub struct SimulatedEngine {
    state: Rc<RefCell<SimState>>,
}

impl SimulatedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Behavior for systems without an explicit entry.
    pub fn with_default_behavior(self, behavior: SystemBehavior) -> Self {
        self.state.borrow_mut().default_behavior = behavior;
        self
    }

    pub fn with_system(self, description: impl Into<String>, behavior: SystemBehavior) -> Self {
        self.state
            .borrow_mut()
            .systems
            .insert(description.into(), behavior);
        self
    }

    /// Pretend SAP Logon already has a ready connection to `description`.
    pub fn with_existing_connection(self, description: &str) -> Self {
        {
            let mut state = self.state.borrow_mut();
            let mut behavior = state
                .systems
                .get(description)
                .cloned()
                .unwrap_or_else(|| state.default_behavior.clone());
            behavior.session_delay = Some(Duration::ZERO);
            state.add_connection(description, behavior);
        }
        self
    }

    pub fn events(&self) -> Vec<SimEvent> {
        self.state.borrow().events.clone()
    }

    /// Number of connections the engine was asked to open.
    pub fn opened_connections(&self) -> usize {
        self.state
            .borrow()
            .events
            .iter()
            .filter(|e| matches!(e, SimEvent::ConnectionOpened { .. }))
            .count()
    }

    pub fn open_connection_count(&self) -> usize {
        self.state.borrow().connections.len()
    }

    pub fn logoffs(&self) -> usize {
        self.state
            .borrow()
            .events
            .iter()
            .filter(|e| matches!(e, SimEvent::LoggedOff { .. }))
            .count()
    }

    fn handle(&self, id: usize) -> Box<dyn GuiConnection> {
        Box::new(SimConnectionHandle {
            state: self.state.clone(),
            id,
        })
    }
}

impl ScriptingEngine for SimulatedEngine {
    fn connections(&self) -> Result<Vec<Box<dyn GuiConnection>>, AutomationError> {
        let ids: Vec<usize> = self.state.borrow().connections.iter().map(|c| c.id).collect();
        Ok(ids.into_iter().map(|id| self.handle(id)).collect())
    }

    fn open_connection(
        &self,
        description: &str,
    ) -> Result<Box<dyn GuiConnection>, AutomationError> {
        let id = {
            let mut state = self.state.borrow_mut();
            let behavior = state
                .systems
                .get(description)
                .cloned()
                .unwrap_or_else(|| state.default_behavior.clone());
            if let Some(message) = &behavior.open_error {
                return Err(AutomationError::scripting("OpenConnection", message.clone()));
            }
            state.events.push(SimEvent::ConnectionOpened {
                description: description.to_string(),
            });
            state.add_connection(description, behavior)
        };
        debug!(description, id, "simulated connection opened");
        Ok(self.handle(id))
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}

struct SimConnectionHandle {
    state: Rc<RefCell<SimState>>,
    id: usize,
}

impl GuiConnection for SimConnectionHandle {
    fn description(&self) -> Result<String, AutomationError> {
        Ok(self.state.borrow_mut().connection_mut(self.id)?.description.clone())
    }

    fn session_count(&self) -> Result<usize, AutomationError> {
        let mut state = self.state.borrow_mut();
        let conn = state.connection_mut(self.id)?;
        Ok(usize::from(conn.session_ready()))
    }

    fn session(&self, index: usize) -> Result<Box<dyn GuiSession>, AutomationError> {
        let mut state = self.state.borrow_mut();
        let conn = state.connection_mut(self.id)?;
        if index > 0 || !conn.session_ready() {
            return Err(AutomationError::ElementNotFound(format!(
                "/app/con[{}]/ses[{index}]",
                self.id
            )));
        }
        Ok(Box::new(SimSession {
            state: self.state.clone(),
            connection: self.id,
        }))
    }
}

struct SimSession {
    state: Rc<RefCell<SimState>>,
    connection: usize,
}

impl SimSession {
    fn check_window(conn: &SimConnection, window_id: &str) -> Result<(), AutomationError> {
        if conn.active_window != window_id {
            return Err(AutomationError::ElementNotFound(format!(
                "/app/con[{}]/ses[0]/{window_id}",
                conn.id
            )));
        }
        Ok(())
    }
}

impl GuiSession for SimSession {
    fn active_window_id(&self) -> Result<String, AutomationError> {
        let mut state = self.state.borrow_mut();
        let conn = state.connection_mut(self.connection)?;
        Ok(format!("/app/con[{}]/ses[0]/{}", conn.id, conn.active_window))
    }

    fn set_text(&self, id: &str, text: &str) -> Result<(), AutomationError> {
        let mut state = self.state.borrow_mut();
        let conn = state.connection_mut(self.connection)?;
        if conn.behavior.missing_field.as_deref() == Some(id) {
            return Err(AutomationError::ElementNotFound(id.to_string()));
        }
        conn.fields.insert(id.to_string(), text.to_string());
        state.events.push(SimEvent::FieldSet {
            connection: self.connection,
            id: id.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    fn send_vkey(&self, window_id: &str, vkey: u32) -> Result<(), AutomationError> {
        let mut state = self.state.borrow_mut();
        let conn = state.connection_mut(self.connection)?;
        Self::check_window(conn, window_id)?;

        let mut follow_up = None;
        if vkey == VKEY_ENTER && window_id == MAIN_WINDOW {
            if conn.fields.get(OK_CODE_FIELD).map(String::as_str) == Some(LOGOFF_COMMAND) {
                follow_up = Some(SimEvent::LoggedOff {
                    connection: conn.id,
                });
            } else if !conn.logged_on && conn.fields.contains_key(USER_FIELD) {
                conn.logged_on = true;
                if conn.behavior.popup_after_logon {
                    conn.active_window = POPUP_WINDOW.to_string();
                }
                follow_up = Some(SimEvent::LoggedOn {
                    connection: conn.id,
                    client: conn.fields.get(CLIENT_FIELD).cloned().unwrap_or_default(),
                    user: conn.fields.get(USER_FIELD).cloned().unwrap_or_default(),
                });
            }
        }

        state.events.push(SimEvent::KeySent {
            connection: self.connection,
            window: window_id.to_string(),
            vkey,
        });
        if let Some(event) = follow_up {
            if matches!(event, SimEvent::LoggedOff { .. }) {
                let id = self.connection;
                state.connections.retain(|c| c.id != id);
            }
            state.events.push(event);
        }
        Ok(())
    }

    fn close_window(&self, window_id: &str) -> Result<(), AutomationError> {
        let mut state = self.state.borrow_mut();
        let conn = state.connection_mut(self.connection)?;
        Self::check_window(conn, window_id)?;
        if window_id == MAIN_WINDOW {
            return Err(AutomationError::scripting(
                "close",
                "closing the main window is not supported",
            ));
        }
        conn.active_window = MAIN_WINDOW.to_string();
        state.events.push(SimEvent::WindowClosed {
            connection: self.connection,
            window: window_id.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_session_appears_after_delay() {
        let engine = SimulatedEngine::new()
            .with_system("SYS1", SystemBehavior::session_after(Duration::from_secs(3)));
        let conn = engine.open_connection("SYS1").unwrap();

        assert_eq!(conn.session_count().unwrap(), 0);
        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(conn.session_count().unwrap(), 1);
        assert_eq!(conn.description().unwrap(), "SYS1");
    }

    #[test]
    fn test_never_ready_connection_has_no_session() {
        let engine = SimulatedEngine::new().with_default_behavior(SystemBehavior::never_ready());
        let conn = engine.open_connection("ANY").unwrap();
        assert_eq!(conn.session_count().unwrap(), 0);
        assert!(conn.session(0).is_err());
    }

    #[test]
    fn test_logon_popup_and_logoff_flow() {
        let engine = SimulatedEngine::new().with_system("SYS1", SystemBehavior::default().with_popup());
        let conn = engine.open_connection("SYS1").unwrap();
        let session = conn.session(0).unwrap();

        session.set_text(USER_FIELD, "alice").unwrap();
        session.send_vkey(MAIN_WINDOW, VKEY_ENTER).unwrap();
        assert!(session.active_window_id().unwrap().ends_with(POPUP_WINDOW));

        session.close_window(POPUP_WINDOW).unwrap();
        assert!(session.active_window_id().unwrap().ends_with(MAIN_WINDOW));

        session.set_text(OK_CODE_FIELD, LOGOFF_COMMAND).unwrap();
        session.send_vkey(MAIN_WINDOW, VKEY_ENTER).unwrap();
        assert_eq!(engine.logoffs(), 1);
        assert_eq!(engine.open_connection_count(), 0);
        assert!(session.active_window_id().is_err());
    }

    #[test]
    fn test_closing_absent_popup_fails() {
        let engine = SimulatedEngine::new();
        let conn = engine.open_connection("SYS1").unwrap();
        let session = conn.session(0).unwrap();
        assert!(matches!(
            session.close_window(POPUP_WINDOW),
            Err(AutomationError::ElementNotFound(_))
        ));
    }

    #[test]
    fn test_existing_connection_is_listed() {
        let engine = SimulatedEngine::new().with_existing_connection("SYS9");
        let conns = engine.connections().unwrap();
        assert_eq!(conns.len(), 1);
        assert_eq!(conns[0].description().unwrap(), "SYS9");
        assert_eq!(engine.opened_connections(), 0);
    }

    #[test]
    fn test_open_error() {
        let engine = SimulatedEngine::new().with_system("BAD", SystemBehavior::failing("no route"));
        let err = engine.open_connection("BAD").err().unwrap();
        assert!(err.to_string().contains("no route"));
    }
}
