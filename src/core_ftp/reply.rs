/// Reply codes sent on the control connection.
///
/// `NotSet` means no reply has been staged yet. `NoCode` marks a continuation line that is sent
/// without the numeric prefix and separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplyCode {
    #[default]
    NotSet,
    NoCode,
    TransferStatusOkay,
    CommandOkay,
    SystemStatus,
    SystemType,
    ServiceReady,
    ClosingControl,
    DataClosedOkay,
    PassiveMode,
    UserLoggedIn,
    SecurityExchangeOkay,
    NeedPassword,
    PendingMoreInfo,
    ServiceUnavailable,
    CantOpenDataConnection,
    DataCloseAborted,
    ActionAbortedError,
    SyntaxError,
    SyntaxErrorParameters,
    CommandNotImplemented,
    BadCommandSequence,
    ParameterNotImplemented,
    NotLoggedIn,
    ProtectionNotAvailable,
    ActionNotOkay,
    InvalidRESTParameter,
}

impl ReplyCode {
    /// Numeric value put on the wire, `None` for the two sentinels.
    pub fn code(self) -> Option<u16> {
        let code = match self {
            ReplyCode::NotSet | ReplyCode::NoCode => return None,
            ReplyCode::TransferStatusOkay => 150,
            ReplyCode::CommandOkay => 200,
            ReplyCode::SystemStatus => 211,
            ReplyCode::SystemType => 215,
            ReplyCode::ServiceReady => 220,
            ReplyCode::ClosingControl => 221,
            ReplyCode::DataClosedOkay => 226,
            ReplyCode::PassiveMode => 227,
            ReplyCode::UserLoggedIn => 230,
            ReplyCode::SecurityExchangeOkay => 234,
            ReplyCode::NeedPassword => 331,
            ReplyCode::PendingMoreInfo => 350,
            ReplyCode::ServiceUnavailable => 421,
            ReplyCode::CantOpenDataConnection => 425,
            ReplyCode::DataCloseAborted => 426,
            ReplyCode::ActionAbortedError => 451,
            ReplyCode::SyntaxError => 500,
            ReplyCode::SyntaxErrorParameters => 501,
            ReplyCode::CommandNotImplemented => 502,
            ReplyCode::BadCommandSequence => 503,
            ReplyCode::ParameterNotImplemented => 504,
            ReplyCode::NotLoggedIn => 530,
            ReplyCode::ProtectionNotAvailable => 534,
            ReplyCode::ActionNotOkay => 550,
            ReplyCode::InvalidRESTParameter => 554,
        };
        Some(code)
    }
}

/// Formats one reply line without its terminator.
///
/// Panics when called with `NotSet`: sending a line without a code is a caller bug.
pub fn format_line(code: ReplyCode, part: bool, message: &str) -> String {
    assert!(code != ReplyCode::NotSet, "reply line sent without a reply code");
    match code.code() {
        Some(numeric) => format!("{:03}{}{}", numeric, if part { '-' } else { ' ' }, message),
        None => message.to_string(),
    }
}

/// Lines staged for the next multi-line reply, together with the last staged code.
#[derive(Debug, Default)]
pub struct ReplyBuffer {
    buffer: String,
    code: ReplyCode,
}

impl ReplyBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `message` on a new line and records `code` as the reply code.
    pub fn stage(&mut self, code: ReplyCode, message: &str) {
        self.code = code;
        if !self.buffer.is_empty() && !self.buffer.ends_with('\n') {
            self.buffer.push('\n');
        }
        self.buffer.push_str(message);
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    #[cfg(test)]
    pub fn code(&self) -> ReplyCode {
        self.code
    }

    /// Drains the buffer, returning the code and the individual lines. Returns `None` when
    /// nothing is staged; the buffer is reset to empty/`NotSet` otherwise.
    pub fn take(&mut self) -> Option<(ReplyCode, Vec<String>)> {
        if self.buffer.is_empty() {
            return None;
        }
        assert!(
            self.code != ReplyCode::NotSet,
            "reply flushed without a staged reply code"
        );
        let lines = self.buffer.split('\n').map(str::to_string).collect();
        let code = std::mem::take(&mut self.code);
        self.buffer.clear();
        Some((code, lines))
    }
}

/// Turns staged lines into the `(part, message)` pairs of a multi-line reply. Every line but
/// the last is a part line; the last one is terminal only when `final_reply` is set.
pub fn frame_lines(lines: &[String], final_reply: bool) -> Vec<(bool, &str)> {
    let last = lines.len().saturating_sub(1);
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let part = if i == last { !final_reply } else { true };
            (part, line.as_str())
        })
        .collect()
}
