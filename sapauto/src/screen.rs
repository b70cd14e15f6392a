//! Element ids of the SAP GUI screens the automation touches

/// Main window of a session. The logon screen lives here.
pub const MAIN_WINDOW: &str = "wnd[0]";
/// First modal window, used by SAP for post-logon notices such as
/// "multiple logon" or system messages.
pub const POPUP_WINDOW: &str = "wnd[1]";

pub const CLIENT_FIELD: &str = "wnd[0]/usr/txtRSYST-MANDT";
pub const USER_FIELD: &str = "wnd[0]/usr/txtRSYST-BNAME";
pub const PASSWORD_FIELD: &str = "wnd[0]/usr/pwdRSYST-BCODE";

/// Command field in the system toolbar.
pub const OK_CODE_FIELD: &str = "wnd[0]/tbar[0]/okcd";
/// Ends every session of the connection.
pub const LOGOFF_COMMAND: &str = "/nex";

/// Whether a full window id such as `/app/con[0]/ses[0]/wnd[1]` names `window`.
pub fn is_window(window_id: &str, window: &str) -> bool {
    window_id.ends_with(window)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_window_matches_suffix() {
        assert!(is_window("/app/con[0]/ses[0]/wnd[0]", MAIN_WINDOW));
        assert!(!is_window("/app/con[0]/ses[0]/wnd[1]", MAIN_WINDOW));
        assert!(is_window("/app/con[2]/ses[0]/wnd[1]", POPUP_WINDOW));
    }
}
