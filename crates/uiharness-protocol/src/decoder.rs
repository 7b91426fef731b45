//! Key-seeking decoder for flat request objects
//!
//! Requests are single-line objects such as `{"cmd":"click","id":"btn_ok"}`.
//! Only the flat subset used on the wire is understood: double-quoted keys,
//! double-quoted string values without escape processing, and integers.
//! Every key lookup re-scans the line from the opening brace, so lookups are
//! independent of each other and the scanner never reads past the input.

use thiserror::Error;

/// Errors produced while scanning a request line
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The line does not start with `{`
    #[error("input is not an object")]
    NotAnObject,

    /// The input ended before the object was closed
    #[error("unexpected end of input")]
    UnexpectedEnd,

    /// A string has no closing quote
    #[error("unterminated string starting at byte {0}")]
    UnterminatedString(usize),

    /// A key is not followed by `:`
    #[error("missing ':' after key at byte {0}")]
    MissingColon(usize),

    /// An integer value is malformed or does not fit
    #[error("invalid integer at byte {0}")]
    InvalidNumber(usize),

    /// A character that cannot start a token
    #[error("unexpected character at byte {0}")]
    UnexpectedToken(usize),

    /// The value at the cursor is not of the requested type
    #[error("value at byte {0} has the wrong type")]
    TypeMismatch(usize),

    /// The object does not contain the key
    #[error("key '{0}' not found")]
    KeyNotFound(String),
}

/// Stateless-per-lookup scanner over one request line
#[derive(Debug, Clone)]
pub struct WireDecoder<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> WireDecoder<'a> {
    /// Create a decoder over a single line
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    /// Current byte offset of the cursor
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Position the cursor at the value for `key`
    ///
    /// Scanning always restarts at the beginning of the line.
    pub fn find_key(&mut self, key: &str) -> Result<(), DecodeError> {
        self.pos = 0;
        self.skip_whitespace();
        if self.peek() != Some(b'{') {
            return Err(DecodeError::NotAnObject);
        }
        self.pos += 1;

        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(DecodeError::UnexpectedEnd),
                Some(b'}') => return Err(DecodeError::KeyNotFound(key.to_string())),
                Some(b'"') => {}
                Some(_) => return Err(DecodeError::UnexpectedToken(self.pos)),
            }

            let current = self.read_string()?;

            self.skip_whitespace();
            if self.peek() != Some(b':') {
                return Err(DecodeError::MissingColon(self.pos));
            }
            self.pos += 1;

            if current == key {
                self.skip_whitespace();
                return Ok(());
            }

            self.skip_value()?;

            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {}
                None => return Err(DecodeError::UnexpectedEnd),
                Some(_) => return Err(DecodeError::UnexpectedToken(self.pos)),
            }
        }
    }

    /// Consume a double-quoted string at the cursor
    pub fn read_string(&mut self) -> Result<&'a str, DecodeError> {
        self.skip_whitespace();
        match self.peek() {
            Some(b'"') => {}
            None => return Err(DecodeError::UnexpectedEnd),
            Some(_) => return Err(DecodeError::TypeMismatch(self.pos)),
        }

        let open = self.pos;
        let start = open + 1;
        let bytes = self.input.as_bytes();
        match bytes[start..].iter().position(|b| *b == b'"') {
            Some(len) => {
                let end = start + len;
                self.pos = end + 1;
                Ok(&self.input[start..end])
            }
            None => {
                self.pos = bytes.len();
                Err(DecodeError::UnterminatedString(open))
            }
        }
    }

    /// Consume an integer at the cursor
    ///
    /// Accepts an optional leading `-` followed by decimal digits. Fractions
    /// and exponents are rejected.
    pub fn read_int(&mut self) -> Result<i64, DecodeError> {
        self.skip_whitespace();
        let start = self.pos;
        let negative = match self.peek() {
            Some(b'-') => {
                self.pos += 1;
                true
            }
            Some(b) if b.is_ascii_digit() => false,
            Some(b'"') => return Err(DecodeError::TypeMismatch(start)),
            None => return Err(DecodeError::UnexpectedEnd),
            Some(_) => return Err(DecodeError::InvalidNumber(start)),
        };

        let mut value: i64 = 0;
        let mut digits = 0usize;
        while let Some(b) = self.peek().filter(u8::is_ascii_digit) {
            let digit = i64::from(b - b'0');
            value = value
                .checked_mul(10)
                .and_then(|v| {
                    if negative {
                        v.checked_sub(digit)
                    } else {
                        v.checked_add(digit)
                    }
                })
                .ok_or(DecodeError::InvalidNumber(start))?;
            digits += 1;
            self.pos += 1;
        }

        if digits == 0 {
            return Err(DecodeError::InvalidNumber(start));
        }
        if matches!(self.peek(), Some(b'.' | b'e' | b'E')) {
            return Err(DecodeError::InvalidNumber(start));
        }
        Ok(value)
    }

    /// Look up `key` and read its string value
    pub fn string_field(&mut self, key: &str) -> Result<&'a str, DecodeError> {
        self.find_key(key)?;
        self.read_string()
    }

    /// Look up `key` and read its integer value
    pub fn int_field(&mut self, key: &str) -> Result<i64, DecodeError> {
        self.find_key(key)?;
        self.read_int()
    }

    fn skip_value(&mut self) -> Result<(), DecodeError> {
        self.skip_whitespace();
        match self.peek() {
            Some(b'"') => self.read_string().map(|_| ()),
            Some(b'-' | b'0'..=b'9') => {
                // Numbers that are only skipped may carry a fraction.
                self.pos += 1;
                while matches!(self.peek(), Some(b'0'..=b'9' | b'.' | b'e' | b'E' | b'+' | b'-')) {
                    self.pos += 1;
                }
                Ok(())
            }
            Some(b) if b.is_ascii_alphabetic() => {
                while self.peek().is_some_and(|b| b.is_ascii_alphabetic()) {
                    self.pos += 1;
                }
                Ok(())
            }
            None => Err(DecodeError::UnexpectedEnd),
            Some(_) => Err(DecodeError::UnexpectedToken(self.pos)),
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }
}
