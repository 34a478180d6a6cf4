//! Command vocabulary
//!
//! The macro language has a closed set of command keywords. Anything else
//! parses as `Unknown`, which keeps the line structurally usable (its
//! parameters are still parsed) but always fails validation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Structural requirement a command places on its parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamRule {
    /// No required parameters
    None,
    /// Each listed key must be present
    Keys(&'static [&'static str]),
    /// At least one of the listed keys must be present
    AnyOf(&'static [&'static str]),
    /// At least this many positional parameters
    Positional(usize),
}

/// A command keyword from the closed vocabulary
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandType {
    Version,
    Set,
    Add,
    Url,
    Tag,
    Frame,
    Tab,
    Wait,
    Pause,
    Back,
    Refresh,
    Clear,
    Click,
    Ds,
    Event,
    Events,
    FileDelete,
    Filter,
    ImageClick,
    ImageSearch,
    OnCertificateDialog,
    OnDialog,
    OnDownload,
    OnErrorDialog,
    OnLogin,
    OnPrint,
    OnSecurityDialog,
    OnWebPageDialog,
    Print,
    Prompt,
    Proxy,
    Redial,
    SaveAs,
    SaveItem,
    Screenshot,
    Search,
    Size,
    Stopwatch,
    Tray,
    Disconnect,
    CmdLine,
    /// Keyword outside the vocabulary; carries the uppercased original
    Unknown(String),
}

impl CommandType {
    /// Resolve a keyword token (case-insensitive)
    pub fn from_keyword(token: &str) -> CommandType {
        match token.to_ascii_uppercase().as_str() {
            "VERSION" => CommandType::Version,
            "SET" => CommandType::Set,
            "ADD" => CommandType::Add,
            "URL" => CommandType::Url,
            "TAG" => CommandType::Tag,
            "FRAME" => CommandType::Frame,
            "TAB" => CommandType::Tab,
            "WAIT" => CommandType::Wait,
            "PAUSE" => CommandType::Pause,
            "BACK" => CommandType::Back,
            "REFRESH" => CommandType::Refresh,
            "CLEAR" => CommandType::Clear,
            "CLICK" => CommandType::Click,
            "DS" => CommandType::Ds,
            "EVENT" => CommandType::Event,
            "EVENTS" => CommandType::Events,
            "FILEDELETE" => CommandType::FileDelete,
            "FILTER" => CommandType::Filter,
            "IMAGECLICK" => CommandType::ImageClick,
            "IMAGESEARCH" => CommandType::ImageSearch,
            "ONCERTIFICATEDIALOG" => CommandType::OnCertificateDialog,
            "ONDIALOG" => CommandType::OnDialog,
            "ONDOWNLOAD" => CommandType::OnDownload,
            "ONERRORDIALOG" => CommandType::OnErrorDialog,
            "ONLOGIN" => CommandType::OnLogin,
            "ONPRINT" => CommandType::OnPrint,
            "ONSECURITYDIALOG" => CommandType::OnSecurityDialog,
            "ONWEBPAGEDIALOG" => CommandType::OnWebPageDialog,
            "PRINT" => CommandType::Print,
            "PROMPT" => CommandType::Prompt,
            "PROXY" => CommandType::Proxy,
            "REDIAL" => CommandType::Redial,
            "SAVEAS" => CommandType::SaveAs,
            "SAVEITEM" => CommandType::SaveItem,
            "SCREENSHOT" => CommandType::Screenshot,
            "SEARCH" => CommandType::Search,
            "SIZE" => CommandType::Size,
            "STOPWATCH" => CommandType::Stopwatch,
            "TRAY" => CommandType::Tray,
            "DISCONNECT" => CommandType::Disconnect,
            "CMDLINE" => CommandType::CmdLine,
            other => CommandType::Unknown(other.to_string()),
        }
    }

    /// Canonical keyword text
    pub fn keyword(&self) -> &str {
        match self {
            CommandType::Version => "VERSION",
            CommandType::Set => "SET",
            CommandType::Add => "ADD",
            CommandType::Url => "URL",
            CommandType::Tag => "TAG",
            CommandType::Frame => "FRAME",
            CommandType::Tab => "TAB",
            CommandType::Wait => "WAIT",
            CommandType::Pause => "PAUSE",
            CommandType::Back => "BACK",
            CommandType::Refresh => "REFRESH",
            CommandType::Clear => "CLEAR",
            CommandType::Click => "CLICK",
            CommandType::Ds => "DS",
            CommandType::Event => "EVENT",
            CommandType::Events => "EVENTS",
            CommandType::FileDelete => "FILEDELETE",
            CommandType::Filter => "FILTER",
            CommandType::ImageClick => "IMAGECLICK",
            CommandType::ImageSearch => "IMAGESEARCH",
            CommandType::OnCertificateDialog => "ONCERTIFICATEDIALOG",
            CommandType::OnDialog => "ONDIALOG",
            CommandType::OnDownload => "ONDOWNLOAD",
            CommandType::OnErrorDialog => "ONERRORDIALOG",
            CommandType::OnLogin => "ONLOGIN",
            CommandType::OnPrint => "ONPRINT",
            CommandType::OnSecurityDialog => "ONSECURITYDIALOG",
            CommandType::OnWebPageDialog => "ONWEBPAGEDIALOG",
            CommandType::Print => "PRINT",
            CommandType::Prompt => "PROMPT",
            CommandType::Proxy => "PROXY",
            CommandType::Redial => "REDIAL",
            CommandType::SaveAs => "SAVEAS",
            CommandType::SaveItem => "SAVEITEM",
            CommandType::Screenshot => "SCREENSHOT",
            CommandType::Search => "SEARCH",
            CommandType::Size => "SIZE",
            CommandType::Stopwatch => "STOPWATCH",
            CommandType::Tray => "TRAY",
            CommandType::Disconnect => "DISCONNECT",
            CommandType::CmdLine => "CMDLINE",
            CommandType::Unknown(k) => k,
        }
    }

    /// True for the `Unknown` sentinel
    pub fn is_unknown(&self) -> bool {
        matches!(self, CommandType::Unknown(_))
    }

    /// True for commands whose grammar is `KEYWORD <name> <rest-of-line>`
    ///
    /// SET/ADD/CMDLINE take a variable name and then everything up to the
    /// end of the line as the value, so unquoted values may contain spaces.
    pub fn takes_name_and_value(&self) -> bool {
        matches!(
            self,
            CommandType::Set | CommandType::Add | CommandType::CmdLine
        )
    }

    /// True for commands that take the whole remainder of the line as one
    /// positional parameter, interpreted by the handler
    pub fn takes_rest_of_line(&self) -> bool {
        matches!(self, CommandType::Prompt)
    }

    /// Structural requirement used by opt-in validation
    pub fn param_rule(&self) -> ParamRule {
        match self {
            CommandType::Set | CommandType::Add | CommandType::CmdLine => ParamRule::Positional(2),
            CommandType::Prompt => ParamRule::Positional(1),
            CommandType::Url => ParamRule::Keys(&["GOTO"]),
            CommandType::Tag => ParamRule::Keys(&["POS", "TYPE"]),
            CommandType::Frame => ParamRule::AnyOf(&["F", "NAME"]),
            CommandType::Tab => ParamRule::AnyOf(&["T", "OPEN", "CLOSE", "CLOSEALLOTHERS"]),
            CommandType::Wait => ParamRule::Keys(&["SECONDS"]),
            CommandType::Click => ParamRule::Keys(&["X", "Y"]),
            CommandType::Ds => ParamRule::Keys(&["CMD"]),
            CommandType::Event | CommandType::Events => ParamRule::Keys(&["TYPE"]),
            CommandType::FileDelete => ParamRule::Keys(&["NAME"]),
            CommandType::Filter => ParamRule::Keys(&["TYPE"]),
            CommandType::ImageClick | CommandType::ImageSearch => ParamRule::Keys(&["IMAGE"]),
            CommandType::OnDownload => ParamRule::Keys(&["FOLDER"]),
            CommandType::Proxy => ParamRule::Keys(&["ADDRESS"]),
            CommandType::SaveAs | CommandType::Screenshot => ParamRule::Keys(&["TYPE"]),
            CommandType::Search => ParamRule::Keys(&["SOURCE"]),
            CommandType::Size => ParamRule::Keys(&["X", "Y"]),
            CommandType::Stopwatch => ParamRule::Keys(&["ID"]),
            CommandType::Unknown(_) => ParamRule::None,
            _ => ParamRule::None,
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}
