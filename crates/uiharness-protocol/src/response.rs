//! Response lines sent back to the automation client

use serde::{Deserialize, Serialize};
use std::fmt;

/// Image format advertised in screenshot headers
pub const SCREENSHOT_FORMAT: &str = "PNG";

/// Value of the `type` field on screenshot headers
pub const SCREENSHOT_TYPE: &str = "screenshot";

/// Outcome marker carried by every response line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ok,
    Error,
}

/// Machine-readable failure reasons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorReason {
    InvalidJson,
    UnknownCommand,
    MissingId,
    MissingParameters,
    InvalidCoordinates,
    InvalidKeyCode,
    WidgetNotFound,
    SwipeFailed,
    KeyEventFailed,
    ScreenshotFailed,
    ClickFailed,
    MouseMoveFailed,
    DragFailed,
    CommandFailed,
    QueueFull,
    Timeout,
    Aborted,
    LineTooLong,
}

impl ErrorReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidJson => "invalid_json",
            Self::UnknownCommand => "unknown_command",
            Self::MissingId => "missing_id",
            Self::MissingParameters => "missing_parameters",
            Self::InvalidCoordinates => "invalid_coordinates",
            Self::InvalidKeyCode => "invalid_key_code",
            Self::WidgetNotFound => "widget_not_found",
            Self::SwipeFailed => "swipe_failed",
            Self::KeyEventFailed => "key_event_failed",
            Self::ScreenshotFailed => "screenshot_failed",
            Self::ClickFailed => "click_failed",
            Self::MouseMoveFailed => "mouse_move_failed",
            Self::DragFailed => "drag_failed",
            Self::CommandFailed => "command_failed",
            Self::QueueFull => "queue_full",
            Self::Timeout => "timeout",
            Self::Aborted => "aborted",
            Self::LineTooLong => "line_too_long",
        }
    }
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One response line
///
/// Field order is the wire order; absent fields are omitted. A screenshot
/// header is followed on the wire by exactly `len` raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: Status,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widgets: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub len: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReason>,
}

impl Response {
    fn bare(status: Status) -> Self {
        Self {
            status,
            kind: None,
            cmd: None,
            text: None,
            widgets: None,
            width: None,
            height: None,
            format: None,
            len: None,
            error: None,
        }
    }

    /// `{"status":"ok","cmd":"<cmd>"}`
    pub fn ok(cmd: impl Into<String>) -> Self {
        Self {
            cmd: Some(cmd.into()),
            ..Self::bare(Status::Ok)
        }
    }

    /// Success carrying widget text; absent text omits the field
    pub fn text(cmd: impl Into<String>, text: Option<String>) -> Self {
        Self {
            text,
            ..Self::ok(cmd)
        }
    }

    /// Success carrying the registered widget ids
    pub fn widgets(cmd: impl Into<String>, widgets: Vec<String>) -> Self {
        Self {
            widgets: Some(widgets),
            ..Self::ok(cmd)
        }
    }

    /// Header announcing `len` bytes of PNG data
    pub fn screenshot(width: u32, height: u32, len: usize) -> Self {
        Self {
            kind: Some(SCREENSHOT_TYPE.to_string()),
            width: Some(width),
            height: Some(height),
            format: Some(SCREENSHOT_FORMAT.to_string()),
            len: Some(len),
            ..Self::bare(Status::Ok)
        }
    }

    /// `{"status":"error","cmd":"<cmd>","error":"<reason>"}`
    pub fn error(cmd: impl Into<String>, reason: ErrorReason) -> Self {
        Self {
            cmd: Some(cmd.into()),
            error: Some(reason),
            ..Self::bare(Status::Error)
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// True when this header announces a binary payload
    pub fn is_screenshot(&self) -> bool {
        self.is_ok() && self.kind.as_deref() == Some(SCREENSHOT_TYPE)
    }

    /// Serialize as a newline-terminated line
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_line_is_exact() {
        assert_eq!(
            Response::ok("click").to_line().unwrap(),
            "{\"status\":\"ok\",\"cmd\":\"click\"}\n"
        );
    }

    #[test]
    fn test_error_line_is_exact() {
        assert_eq!(
            Response::error("click", ErrorReason::WidgetNotFound)
                .to_line()
                .unwrap(),
            "{\"status\":\"error\",\"cmd\":\"click\",\"error\":\"widget_not_found\"}\n"
        );
    }

    #[test]
    fn test_text_line() {
        assert_eq!(
            Response::text("get_state", Some("12:00".into()))
                .to_line()
                .unwrap(),
            "{\"status\":\"ok\",\"cmd\":\"get_state\",\"text\":\"12:00\"}\n"
        );
        assert_eq!(
            Response::text("get_state", None).to_line().unwrap(),
            "{\"status\":\"ok\",\"cmd\":\"get_state\"}\n"
        );
    }

    #[test]
    fn test_text_is_escaped() {
        let line = Response::text("get_state", Some("say \"hi\"\n".into()))
            .to_line()
            .unwrap();
        assert_eq!(line.matches('\n').count(), 1);
        let parsed: Response = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(parsed.text.as_deref(), Some("say \"hi\"\n"));
    }

    #[test]
    fn test_screenshot_header_is_exact() {
        let header = Response::screenshot(480, 480, 1234);
        assert!(header.is_screenshot());
        assert_eq!(
            header.to_line().unwrap(),
            "{\"status\":\"ok\",\"type\":\"screenshot\",\"width\":480,\"height\":480,\"format\":\"PNG\",\"len\":1234}\n"
        );
    }

    #[test]
    fn test_widgets_line() {
        let line = Response::widgets("list_widgets", vec!["a".into(), "b".into()])
            .to_line()
            .unwrap();
        assert_eq!(
            line,
            "{\"status\":\"ok\",\"cmd\":\"list_widgets\",\"widgets\":[\"a\",\"b\"]}\n"
        );
    }

    #[test]
    fn test_parse_error_line() {
        let parsed: Response = serde_json::from_str(
            r#"{"status":"error","cmd":"unknown","error":"unknown_command"}"#,
        )
        .unwrap();
        assert!(!parsed.is_ok());
        assert_eq!(parsed.error, Some(ErrorReason::UnknownCommand));
    }

    const ALL_REASONS: [ErrorReason; 18] = [
        ErrorReason::InvalidJson,
        ErrorReason::UnknownCommand,
        ErrorReason::MissingId,
        ErrorReason::MissingParameters,
        ErrorReason::InvalidCoordinates,
        ErrorReason::InvalidKeyCode,
        ErrorReason::WidgetNotFound,
        ErrorReason::SwipeFailed,
        ErrorReason::KeyEventFailed,
        ErrorReason::ScreenshotFailed,
        ErrorReason::ClickFailed,
        ErrorReason::MouseMoveFailed,
        ErrorReason::DragFailed,
        ErrorReason::CommandFailed,
        ErrorReason::QueueFull,
        ErrorReason::Timeout,
        ErrorReason::Aborted,
        ErrorReason::LineTooLong,
    ];

    /// Position in `ALL_REASONS`; a new variant fails to compile here
    fn reason_index(reason: ErrorReason) -> usize {
        match reason {
            ErrorReason::InvalidJson => 0,
            ErrorReason::UnknownCommand => 1,
            ErrorReason::MissingId => 2,
            ErrorReason::MissingParameters => 3,
            ErrorReason::InvalidCoordinates => 4,
            ErrorReason::InvalidKeyCode => 5,
            ErrorReason::WidgetNotFound => 6,
            ErrorReason::SwipeFailed => 7,
            ErrorReason::KeyEventFailed => 8,
            ErrorReason::ScreenshotFailed => 9,
            ErrorReason::ClickFailed => 10,
            ErrorReason::MouseMoveFailed => 11,
            ErrorReason::DragFailed => 12,
            ErrorReason::CommandFailed => 13,
            ErrorReason::QueueFull => 14,
            ErrorReason::Timeout => 15,
            ErrorReason::Aborted => 16,
            ErrorReason::LineTooLong => 17,
        }
    }

    #[test]
    fn test_reason_strings_match_serde() {
        for (i, reason) in ALL_REASONS.into_iter().enumerate() {
            assert_eq!(reason_index(reason), i);
            let json = serde_json::to_string(&reason).unwrap();
            assert_eq!(json, format!("\"{}\"", reason.as_str()));
            assert_eq!(reason.to_string(), reason.as_str());
            let back: ErrorReason = serde_json::from_str(&json).unwrap();
            assert_eq!(back, reason);
        }
    }
}
