//! Common types shared by the loaders, the session driver and the batch runner

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// One row of the logon workbook: the system to reach and the identity to log on with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Connection description as listed in SAP Logon.
    pub system_name: String,
    pub client: String,
    pub user: String,
    /// Sheet the row came from. Diagnostics only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
    /// 1-based row number inside the sheet, header included.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
}

impl WorkItem {
    pub fn new(
        system_name: impl Into<String>,
        client: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            system_name: system_name.into(),
            client: client.into(),
            user: user.into(),
            sheet: None,
            row: None,
        }
    }

    pub fn with_origin(mut self, sheet: impl Into<String>, row: usize) -> Self {
        self.sheet = Some(sheet.into());
        self.row = Some(row);
        self
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} {}", self.user, self.system_name, self.client)
    }
}

/// Fixed pauses and the connection wait budget.
///
/// SAP GUI offers no completion callback for logon, logoff or session
/// creation, so every step that hands control to the GUI is followed by a
/// settle time. The defaults are the values the automation has always run
/// with; override them when a slow system needs more room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    /// Upper bound for a freshly opened connection to show its first session.
    #[serde(with = "millis")]
    pub connect_timeout: Duration,
    /// Delay between two session-count polls.
    #[serde(with = "millis")]
    pub poll_interval: Duration,
    /// Pause after submitting the logon form.
    #[serde(with = "millis")]
    pub logon_settle: Duration,
    /// Pause after sending the logoff command.
    #[serde(with = "millis")]
    pub logoff_settle: Duration,
    /// Simulated duration of the placeholder task.
    #[serde(with = "millis")]
    pub task_duration: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            poll_interval: Duration::from_secs(1),
            logon_settle: Duration::from_millis(2500),
            logoff_settle: Duration::from_secs(1),
            task_duration: Duration::from_millis(2500),
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
