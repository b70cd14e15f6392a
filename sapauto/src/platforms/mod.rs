//! Scripting engine abstraction
//!
//! SAP GUI exposes an object tree `application → connections → sessions →
//! windows/fields`. The session driver only needs the handful of operations
//! below, so each backend implements these traits and nothing else.
//!
//! Handles are not required to be `Send`: COM objects belong to the apartment
//! that created them and must stay on the thread that drives the batch.

use crate::errors::AutomationError;

/// Virtual key code SAP GUI maps to Enter.
pub const VKEY_ENTER: u32 = 0;

/// The scripting application object.
pub trait ScriptingEngine {
    /// Connections currently open in SAP Logon.
    fn connections(&self) -> Result<Vec<Box<dyn GuiConnection>>, AutomationError>;

    /// Ask SAP Logon to open the connection with this description.
    ///
    /// The returned connection may not have a session yet; callers poll
    /// [`GuiConnection::session_count`] until one appears.
    fn open_connection(&self, description: &str)
        -> Result<Box<dyn GuiConnection>, AutomationError>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}

pub trait GuiConnection {
    /// Description the connection was opened with, as shown in SAP Logon.
    fn description(&self) -> Result<String, AutomationError>;

    /// Number of child sessions currently attached.
    fn session_count(&self) -> Result<usize, AutomationError>;

    fn session(&self, index: usize) -> Result<Box<dyn GuiSession>, AutomationError>;
}

pub trait GuiSession {
    /// Id of the window that has focus, e.g. `/app/con[0]/ses[0]/wnd[0]`.
    fn active_window_id(&self) -> Result<String, AutomationError>;

    /// Set the `Text` property of the element found by `id`.
    fn set_text(&self, id: &str, text: &str) -> Result<(), AutomationError>;

    /// Send a virtual key to the window found by `window_id`.
    fn send_vkey(&self, window_id: &str, vkey: u32) -> Result<(), AutomationError>;

    /// Close the window found by `window_id`.
    fn close_window(&self, window_id: &str) -> Result<(), AutomationError>;
}

pub mod simulated;
#[cfg(target_os = "windows")]
pub mod windows;

/// Create the engine bound to the SAP GUI running on this machine.
pub fn create_engine() -> Result<Box<dyn ScriptingEngine>, AutomationError> {
    #[cfg(target_os = "windows")]
    {
        Ok(Box::new(windows::SapGuiEngine::attach()?))
    }
    #[cfg(not(target_os = "windows"))]
    {
        Err(AutomationError::UnsupportedPlatform(
            "SAP GUI scripting is only available on Windows; use the simulated engine (--dry-run)"
                .to_string(),
        ))
    }
}
