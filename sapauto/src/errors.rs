use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("No password found for user '{user}' on system '{system}' client '{client}'")]
    MissingPassword {
        system: String,
        client: String,
        user: String,
    },

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Not on the expected screen: expected '{expected}', active window is '{actual}'")]
    UnexpectedScreen { expected: String, actual: String },

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Scripting API error during {operation}: {message}")]
    Scripting {
        operation: String,
        message: String,
        com_error: Option<i32>,
    },

    #[error("Not connected: {0}")]
    NotConnected(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Failed to read credentials from {path}: {message}")]
    Credentials { path: String, message: String },

    #[error("Failed to read workbook {path}: {message}")]
    Workbook { path: String, message: String },
}

impl AutomationError {
    /// Shorthand for a scripting failure without an underlying COM code.
    pub fn scripting(operation: impl Into<String>, message: impl Into<String>) -> Self {
        AutomationError::Scripting {
            operation: operation.into(),
            message: message.into(),
            com_error: None,
        }
    }
}
