//! SAP GUI scripting engine over COM
//!
//! Equivalent of the classic VBScript bootstrap:
//! `GetObject("SAPGUI").GetScriptingEngine`, then `Children`, `OpenConnection`,
//! `findById(..)` and friends, all resolved late through `IDispatch`.

mod utils;

use super::{GuiConnection, GuiSession, ScriptingEngine};
use crate::AutomationError;
use tracing::{debug, info};
use utils::{bstr, com_error, init_com, Dispatch};
use windows::core::{w, VARIANT};
use windows::Win32::System::Com::{CoGetObject, IDispatch};

pub struct SapGuiEngine {
    application: Dispatch,
}

impl SapGuiEngine {
    /// Bind to the SAP GUI instance registered in the running object table.
    ///
    /// SAP Logon must be running and scripting must be enabled on both the
    /// client and the server side.
    pub fn attach() -> Result<Self, AutomationError> {
        init_com()?;
        let sapgui: IDispatch = unsafe { CoGetObject(w!("SAPGUI"), None) }
            .map_err(|e| com_error("GetObject(\"SAPGUI\")", e))?;
        let application = Dispatch(sapgui).get_object("GetScriptingEngine")?;
        info!("Attached to SAP GUI scripting engine");
        Ok(Self { application })
    }
}

/// Items of a `GuiComponentCollection`.
fn collection_items(owner: &Dispatch) -> Result<Vec<Dispatch>, AutomationError> {
    let children = owner.get_object("Children")?;
    let count = children.get_i32("Count")?;
    (0..count)
        .map(|i| children.call_object("ElementAt", &[VARIANT::from(i)]))
        .collect()
}

impl ScriptingEngine for SapGuiEngine {
    fn connections(&self) -> Result<Vec<Box<dyn GuiConnection>>, AutomationError> {
        Ok(collection_items(&self.application)?
            .into_iter()
            .map(|c| Box::new(SapGuiConnection(c)) as Box<dyn GuiConnection>)
            .collect())
    }

    fn open_connection(
        &self,
        description: &str,
    ) -> Result<Box<dyn GuiConnection>, AutomationError> {
        debug!(description, "OpenConnection");
        let conn = self
            .application
            .call_object("OpenConnection", &[bstr(description), VARIANT::from(true)])?;
        Ok(Box::new(SapGuiConnection(conn)))
    }

    fn name(&self) -> &'static str {
        "sapgui"
    }
}

struct SapGuiConnection(Dispatch);

impl GuiConnection for SapGuiConnection {
    fn description(&self) -> Result<String, AutomationError> {
        self.0.get_string("Description")
    }

    fn session_count(&self) -> Result<usize, AutomationError> {
        let children = self.0.get_object("Children")?;
        Ok(children.get_i32("Count")?.max(0) as usize)
    }

    fn session(&self, index: usize) -> Result<Box<dyn GuiSession>, AutomationError> {
        let children = self.0.get_object("Children")?;
        let session = children.call_object("ElementAt", &[VARIANT::from(index as i32)])?;
        Ok(Box::new(SapGuiSession(session)))
    }
}

struct SapGuiSession(Dispatch);

impl SapGuiSession {
    fn find(&self, id: &str) -> Result<Dispatch, AutomationError> {
        self.0
            .call_object("findById", &[bstr(id)])
            .map_err(|e| match e {
                AutomationError::Scripting { .. } => {
                    AutomationError::ElementNotFound(format!("{id}: {e}"))
                }
                other => other,
            })
    }
}

impl GuiSession for SapGuiSession {
    fn active_window_id(&self) -> Result<String, AutomationError> {
        self.0.get_object("ActiveWindow")?.get_string("Id")
    }

    fn set_text(&self, id: &str, text: &str) -> Result<(), AutomationError> {
        self.find(id)?.put("Text", bstr(text))
    }

    fn send_vkey(&self, window_id: &str, vkey: u32) -> Result<(), AutomationError> {
        self.find(window_id)?
            .call("sendVKey", &[VARIANT::from(vkey as i32)])
            .map(|_| ())
    }

    fn close_window(&self, window_id: &str) -> Result<(), AutomationError> {
        self.find(window_id)?.call("close", &[]).map(|_| ())
    }
}
