//! Typed automation commands and their construction from request lines

use crate::decoder::{DecodeError, WireDecoder};
use crate::response::ErrorReason;
use std::fmt;

/// Maximum widget id length in bytes
pub const MAX_ID_LEN: usize = 31;

/// Long-press duration used when `ms` is absent or not positive
pub const DEFAULT_LONGPRESS_MS: u32 = 1000;

/// Wait duration used when `ms` is absent or not positive
pub const DEFAULT_WAIT_MS: u32 = 100;

/// Name reported for lines whose command could not be decoded
pub const UNKNOWN_COMMAND: &str = "unknown";

/// A point in display coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// One automation command as decoded from the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Press, click and release a registered widget
    Click { id: String },
    /// Hold a press on a registered widget
    Longpress { id: String, duration_ms: u32 },
    /// Swipe gesture between two points
    Swipe { from: Point, to: Point },
    /// Simulated key input
    KeyEvent { code: u32 },
    /// Read the text of a registered widget
    GetText { id: String },
    /// Replace the text of a registered widget
    SetText { id: String, text: String },
    /// Capture the current frame as PNG
    Screenshot,
    /// Pause command execution
    Wait { ms: u32 },
    /// Click whichever registered widget lies under a point
    ClickAt { at: Point },
    /// Move the pointer without pressing
    MouseMove { to: Point },
    /// Pointer drag between two points
    Drag { from: Point, to: Point },
    /// List the registered widget ids
    ListWidgets,
}

/// A request line that was rejected before reaching the UI thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestError {
    /// Command name as sent, or [`UNKNOWN_COMMAND`]
    pub cmd: String,
    pub reason: ErrorReason,
}

impl RequestError {
    pub fn new(cmd: impl Into<String>, reason: ErrorReason) -> Self {
        Self {
            cmd: cmd.into(),
            reason,
        }
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.cmd, self.reason)
    }
}

impl std::error::Error for RequestError {}

impl Command {
    /// Decode one request line into a command
    ///
    /// Validation happens here so that malformed requests never reach the
    /// dispatcher.
    pub fn parse(line: &str) -> Result<Self, RequestError> {
        let mut decoder = WireDecoder::new(line);
        let name = decoder.string_field("cmd").map_err(|e| {
            tracing::debug!("Undecodable request {:?}: {}", line, e);
            RequestError::new(UNKNOWN_COMMAND, ErrorReason::InvalidJson)
        })?;

        let reject = |reason| RequestError::new(name, reason);

        match name {
            "click" => {
                let id = widget_id(&mut decoder).ok_or_else(|| reject(ErrorReason::MissingId))?;
                Ok(Self::Click { id })
            }
            "longpress" => {
                let id = widget_id(&mut decoder).ok_or_else(|| reject(ErrorReason::MissingId))?;
                let duration_ms = positive_ms(&mut decoder, DEFAULT_LONGPRESS_MS);
                Ok(Self::Longpress { id, duration_ms })
            }
            "swipe" => {
                let (from, to) = segment(&mut decoder)
                    .map_err(|_| reject(ErrorReason::InvalidCoordinates))?;
                Ok(Self::Swipe { from, to })
            }
            "key" => {
                let code = decoder
                    .int_field("code")
                    .ok()
                    .and_then(|v| u32::try_from(v).ok())
                    .ok_or_else(|| reject(ErrorReason::InvalidKeyCode))?;
                Ok(Self::KeyEvent { code })
            }
            "get_state" => {
                let id = widget_id(&mut decoder).ok_or_else(|| reject(ErrorReason::MissingId))?;
                Ok(Self::GetText { id })
            }
            "set_text" => {
                let id = widget_id(&mut decoder)
                    .ok_or_else(|| reject(ErrorReason::MissingParameters))?;
                let text = decoder
                    .string_field("text")
                    .map_err(|_| reject(ErrorReason::MissingParameters))?
                    .to_string();
                Ok(Self::SetText { id, text })
            }
            "screenshot" => Ok(Self::Screenshot),
            "wait" => Ok(Self::Wait {
                ms: positive_ms(&mut decoder, DEFAULT_WAIT_MS),
            }),
            "click_at" => {
                let at = point(&mut decoder, "x", "y")
                    .map_err(|_| reject(ErrorReason::InvalidCoordinates))?;
                Ok(Self::ClickAt { at })
            }
            "mouse_move" => {
                let to = point(&mut decoder, "x", "y")
                    .map_err(|_| reject(ErrorReason::InvalidCoordinates))?;
                Ok(Self::MouseMove { to })
            }
            "drag" => {
                let (from, to) = segment(&mut decoder)
                    .map_err(|_| reject(ErrorReason::InvalidCoordinates))?;
                Ok(Self::Drag { from, to })
            }
            "list_widgets" => Ok(Self::ListWidgets),
            other => Err(RequestError::new(other, ErrorReason::UnknownCommand)),
        }
    }

    /// Wire name of the command
    pub fn name(&self) -> &'static str {
        match self {
            Self::Click { .. } => "click",
            Self::Longpress { .. } => "longpress",
            Self::Swipe { .. } => "swipe",
            Self::KeyEvent { .. } => "key",
            Self::GetText { .. } => "get_state",
            Self::SetText { .. } => "set_text",
            Self::Screenshot => "screenshot",
            Self::Wait { .. } => "wait",
            Self::ClickAt { .. } => "click_at",
            Self::MouseMove { .. } => "mouse_move",
            Self::Drag { .. } => "drag",
            Self::ListWidgets => "list_widgets",
        }
    }

    /// Reason reported when the command fails on the UI thread
    pub fn failure_reason(&self) -> ErrorReason {
        match self {
            Self::Click { .. }
            | Self::Longpress { .. }
            | Self::GetText { .. }
            | Self::SetText { .. } => ErrorReason::WidgetNotFound,
            Self::Swipe { .. } => ErrorReason::SwipeFailed,
            Self::KeyEvent { .. } => ErrorReason::KeyEventFailed,
            Self::Screenshot => ErrorReason::ScreenshotFailed,
            Self::ClickAt { .. } => ErrorReason::ClickFailed,
            Self::MouseMove { .. } => ErrorReason::MouseMoveFailed,
            Self::Drag { .. } => ErrorReason::DragFailed,
            Self::Wait { .. } | Self::ListWidgets => ErrorReason::CommandFailed,
        }
    }

    /// How long the command itself occupies the UI thread, if it says so
    pub fn nominal_duration_ms(&self) -> u64 {
        match self {
            Self::Longpress { duration_ms, .. } => u64::from(*duration_ms),
            Self::Wait { ms } => u64::from(*ms),
            _ => 0,
        }
    }
}

fn widget_id(decoder: &mut WireDecoder<'_>) -> Option<String> {
    decoder
        .string_field("id")
        .ok()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

fn positive_ms(decoder: &mut WireDecoder<'_>, default: u32) -> u32 {
    decoder
        .int_field("ms")
        .ok()
        .and_then(|v| u32::try_from(v).ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

fn coordinate(decoder: &mut WireDecoder<'_>, key: &str) -> Result<i32, DecodeError> {
    let value = decoder.int_field(key)?;
    i32::try_from(value)
        .ok()
        .filter(|v| *v >= 0)
        .ok_or(DecodeError::InvalidNumber(decoder.position()))
}

fn point(decoder: &mut WireDecoder<'_>, x: &str, y: &str) -> Result<Point, DecodeError> {
    Ok(Point::new(coordinate(decoder, x)?, coordinate(decoder, y)?))
}

fn segment(decoder: &mut WireDecoder<'_>) -> Result<(Point, Point), DecodeError> {
    Ok((
        point(decoder, "x1", "y1")?,
        point(decoder, "x2", "y2")?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reason(line: &str) -> (String, ErrorReason) {
        let err = Command::parse(line).unwrap_err();
        (err.cmd, err.reason)
    }

    #[test]
    fn test_parse_click() {
        let cmd = Command::parse(r#"{"cmd":"click","id":"btn_heart"}"#).unwrap();
        assert_eq!(
            cmd,
            Command::Click {
                id: "btn_heart".to_string()
            }
        );
        assert_eq!(cmd.name(), "click");
    }

    #[test]
    fn test_click_without_id() {
        assert_eq!(
            reason(r#"{"cmd":"click"}"#),
            ("click".to_string(), ErrorReason::MissingId)
        );
        assert_eq!(
            reason(r#"{"cmd":"click","id":""}"#),
            ("click".to_string(), ErrorReason::MissingId)
        );
    }

    #[test]
    fn test_truncated_click_reports_missing_id() {
        assert_eq!(
            reason(r#"{"cmd":"click""#),
            ("click".to_string(), ErrorReason::MissingId)
        );
    }

    #[test]
    fn test_longpress_defaults() {
        let cmd = Command::parse(r#"{"cmd":"longpress","id":"hr_measure_area"}"#).unwrap();
        assert_eq!(
            cmd,
            Command::Longpress {
                id: "hr_measure_area".to_string(),
                duration_ms: DEFAULT_LONGPRESS_MS
            }
        );

        let cmd = Command::parse(r#"{"cmd":"longpress","id":"a","ms":0}"#).unwrap();
        assert_eq!(cmd.nominal_duration_ms(), u64::from(DEFAULT_LONGPRESS_MS));

        let cmd = Command::parse(r#"{"cmd":"longpress","id":"a","ms":2500}"#).unwrap();
        assert_eq!(cmd.nominal_duration_ms(), 2500);
    }

    #[test]
    fn test_parse_swipe() {
        let cmd =
            Command::parse(r#"{"cmd":"swipe","x1":400,"y1":200,"x2":50,"y2":210}"#).unwrap();
        assert_eq!(
            cmd,
            Command::Swipe {
                from: Point::new(400, 200),
                to: Point::new(50, 210)
            }
        );
    }

    #[test]
    fn test_swipe_rejects_negative_or_missing_coordinates() {
        let expected = ("swipe".to_string(), ErrorReason::InvalidCoordinates);
        assert_eq!(
            reason(r#"{"cmd":"swipe","x1":-1,"y1":0,"x2":5,"y2":5}"#),
            expected
        );
        assert_eq!(reason(r#"{"cmd":"swipe","x1":1,"y1":0,"x2":5}"#), expected);
        assert_eq!(
            reason(r#"{"cmd":"swipe","x1":"1","y1":0,"x2":5,"y2":5}"#),
            expected
        );
        assert_eq!(
            reason(r#"{"cmd":"swipe","x1":3000000000,"y1":0,"x2":5,"y2":5}"#),
            expected
        );
    }

    #[test]
    fn test_parse_key() {
        assert_eq!(
            Command::parse(r#"{"cmd":"key","code":27}"#).unwrap(),
            Command::KeyEvent { code: 27 }
        );
        assert_eq!(
            reason(r#"{"cmd":"key","code":-3}"#),
            ("key".to_string(), ErrorReason::InvalidKeyCode)
        );
        assert_eq!(
            reason(r#"{"cmd":"key"}"#),
            ("key".to_string(), ErrorReason::InvalidKeyCode)
        );
    }

    #[test]
    fn test_parse_set_text() {
        assert_eq!(
            Command::parse(r#"{"cmd":"set_text","id":"lbl_time","text":"12:00"}"#).unwrap(),
            Command::SetText {
                id: "lbl_time".to_string(),
                text: "12:00".to_string()
            }
        );
        assert_eq!(
            reason(r#"{"cmd":"set_text","id":"lbl_time"}"#),
            ("set_text".to_string(), ErrorReason::MissingParameters)
        );
        assert_eq!(
            reason(r#"{"cmd":"set_text","text":"x"}"#),
            ("set_text".to_string(), ErrorReason::MissingParameters)
        );
    }

    #[test]
    fn test_parse_wait_defaults() {
        assert_eq!(
            Command::parse(r#"{"cmd":"wait"}"#).unwrap(),
            Command::Wait {
                ms: DEFAULT_WAIT_MS
            }
        );
        assert_eq!(
            Command::parse(r#"{"cmd":"wait","ms":-5}"#).unwrap(),
            Command::Wait {
                ms: DEFAULT_WAIT_MS
            }
        );
        assert_eq!(
            Command::parse(r#"{"cmd":"wait","ms":250}"#).unwrap(),
            Command::Wait { ms: 250 }
        );
    }

    #[test]
    fn test_parse_pointer_commands() {
        assert_eq!(
            Command::parse(r#"{"cmd":"click_at","x":10,"y":20}"#).unwrap(),
            Command::ClickAt {
                at: Point::new(10, 20)
            }
        );
        assert_eq!(
            Command::parse(r#"{"cmd":"mouse_move","x":1,"y":2}"#).unwrap(),
            Command::MouseMove {
                to: Point::new(1, 2)
            }
        );
        assert_eq!(
            reason(r#"{"cmd":"drag","x1":1,"y1":2}"#),
            ("drag".to_string(), ErrorReason::InvalidCoordinates)
        );
    }

    #[test]
    fn test_unknown_command_echoes_name() {
        assert_eq!(
            reason(r#"{"cmd":"teleport"}"#),
            ("teleport".to_string(), ErrorReason::UnknownCommand)
        );
    }

    #[test]
    fn test_undecodable_lines() {
        let expected = (UNKNOWN_COMMAND.to_string(), ErrorReason::InvalidJson);
        assert_eq!(reason("hello"), expected);
        assert_eq!(reason(r#"{"id":"x"}"#), expected);
        assert_eq!(reason(r#"{"cmd":5}"#), expected);
        assert_eq!(reason(r#"{"cmd":"cli"#), expected);
    }

    #[test]
    fn test_failure_reasons() {
        assert_eq!(
            Command::Screenshot.failure_reason(),
            ErrorReason::ScreenshotFailed
        );
        assert_eq!(
            Command::KeyEvent { code: 1 }.failure_reason(),
            ErrorReason::KeyEventFailed
        );
        assert_eq!(
            Command::GetText { id: "a".into() }.failure_reason(),
            ErrorReason::WidgetNotFound
        );
    }
}
