//! Batch logon automation for SAP GUI
//!
//! Reads a list of system/client/user work items, resolves each password from
//! a credential store and, through the SAP GUI scripting interface, logs on,
//! runs a task and logs off again, one item at a time.
//!
//! ```no_run
//! use sapauto::{workbook, BatchRunner, CredentialStore, Timings};
//!
//! # async fn demo() -> Result<(), sapauto::AutomationError> {
//! let credentials = CredentialStore::load("config/credentials.json")?;
//! let items = workbook::into_work_items(workbook::read_work_items("data/logon_sap.xlsx")?);
//! let engine = sapauto::platforms::create_engine()?;
//!
//! let report = BatchRunner::new(engine.as_ref(), Timings::default())
//!     .run(items, &credentials)
//!     .await;
//! println!("{} completed, {} failed", report.completed(), report.failed());
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod credentials;
pub mod errors;
pub mod platforms;
pub mod runner;
pub mod screen;
pub mod session;
pub mod types;
pub mod workbook;

pub use connection::{acquire_connection, wait_for_session, Acquired};
pub use credentials::{CredentialStore, PasswordResolver};
pub use errors::AutomationError;
pub use platforms::{GuiConnection, GuiSession, ScriptingEngine};
pub use runner::{BatchReport, BatchRunner, ItemReport, ItemStatus};
pub use session::{Automator, PlaceholderTask, SessionHandle, Task};
pub use types::{Timings, WorkItem};
