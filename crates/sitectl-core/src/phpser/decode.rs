use super::{Key, Value};
use thiserror::Error;

/// Maximum nesting of arrays and objects accepted by the decoder.
pub const MAX_DEPTH: usize = 512;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unexpected end of input at byte {0}")]
    UnexpectedEnd(usize),

    #[error("expected {expected} at byte {pos}")]
    Unexpected { pos: usize, expected: &'static str },

    #[error("invalid number at byte {0}")]
    InvalidNumber(usize),

    #[error("unknown type marker '{marker}' at byte {pos}")]
    UnknownType { pos: usize, marker: char },

    #[error("trailing data after byte {0}")]
    TrailingData(usize),

    #[error("nesting deeper than {MAX_DEPTH} levels")]
    TooDeep,
}

/// Decode a complete serialized value. All input must be consumed.
pub fn decode(input: &[u8]) -> Result<Value, DecodeError> {
    let mut parser = Parser { input, pos: 0 };
    let value = parser.value(0)?;
    if parser.pos != input.len() {
        return Err(DecodeError::TrailingData(parser.pos));
    }
    Ok(value)
}

/// Decode if `input` is a serialized structure, `None` otherwise.
///
/// A decoded bare `false` counts as "not a structure": the encoding of
/// `false` is indistinguishable from a decode failure for the application
/// that writes these values.
pub fn try_decode(input: &[u8]) -> Option<Value> {
    match decode(input) {
        Ok(Value::Bool(false)) | Err(_) => None,
        Ok(value) => Some(value),
    }
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn next(&mut self) -> Result<u8, DecodeError> {
        let b = self.peek().ok_or(DecodeError::UnexpectedEnd(self.pos))?;
        self.pos += 1;
        Ok(b)
    }

    fn expect(&mut self, byte: u8, expected: &'static str) -> Result<(), DecodeError> {
        let pos = self.pos;
        match self.next()? {
            b if b == byte => Ok(()),
            _ => Err(DecodeError::Unexpected { pos, expected }),
        }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.input.len())
            .ok_or(DecodeError::UnexpectedEnd(self.input.len()))?;
        let slice = &self.input[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Bytes up to (not including) `terminator`, which is consumed.
    fn until(&mut self, terminator: u8) -> Result<&'a [u8], DecodeError> {
        let start = self.pos;
        let offset = self.input[start..]
            .iter()
            .position(|b| *b == terminator)
            .ok_or(DecodeError::UnexpectedEnd(self.input.len()))?;
        self.pos = start + offset + 1;
        Ok(&self.input[start..start + offset])
    }

    fn int_until(&mut self, terminator: u8) -> Result<i64, DecodeError> {
        let pos = self.pos;
        let digits = self.until(terminator)?;
        parse_int(digits).ok_or(DecodeError::InvalidNumber(pos))
    }

    fn len_until(&mut self, terminator: u8) -> Result<usize, DecodeError> {
        let pos = self.pos;
        let digits = self.until(terminator)?;
        if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
            return Err(DecodeError::InvalidNumber(pos));
        }
        std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .ok_or(DecodeError::InvalidNumber(pos))
    }

    /// `<len>:"<bytes>"`
    fn quoted(&mut self) -> Result<&'a [u8], DecodeError> {
        let len = self.len_until(b':')?;
        self.expect(b'"', "opening quote")?;
        let bytes = self.take(len)?;
        self.expect(b'"', "closing quote")?;
        Ok(bytes)
    }

    fn value(&mut self, depth: usize) -> Result<Value, DecodeError> {
        let pos = self.pos;
        let marker = self.next()?;
        if marker == b'N' {
            self.expect(b';', "';'")?;
            return Ok(Value::Null);
        }
        self.expect(b':', "':'")?;

        match marker {
            b'b' => {
                let pos = self.pos;
                let value = match self.next()? {
                    b'0' => false,
                    b'1' => true,
                    _ => return Err(DecodeError::Unexpected { pos, expected: "0 or 1" }),
                };
                self.expect(b';', "';'")?;
                Ok(Value::Bool(value))
            }
            b'i' => Ok(Value::Int(self.int_until(b';')?)),
            b'd' => {
                let pos = self.pos;
                let text = self.until(b';')?;
                parse_float(text)
                    .map(Value::Float)
                    .ok_or(DecodeError::InvalidNumber(pos))
            }
            b's' => {
                let bytes = self.quoted()?;
                self.expect(b';', "';'")?;
                Ok(Value::Str(bytes.to_vec()))
            }
            b'a' => {
                let members = self.members(depth)?;
                Ok(Value::Array(members))
            }
            b'O' => {
                let class = self.quoted()?.to_vec();
                self.expect(b':', "':'")?;
                let members = self.members(depth)?;
                Ok(Value::Object { class, members })
            }
            b'C' => {
                let class = self.quoted()?.to_vec();
                self.expect(b':', "':'")?;
                let len = self.len_until(b':')?;
                self.expect(b'{', "'{'")?;
                let payload = self.take(len)?.to_vec();
                self.expect(b'}', "'}'")?;
                Ok(Value::Custom { class, payload })
            }
            b'E' => {
                let case = self.quoted()?.to_vec();
                self.expect(b';', "';'")?;
                Ok(Value::Enum(case))
            }
            b'r' => Ok(Value::Ref(self.int_until(b';')?)),
            b'R' => Ok(Value::StrongRef(self.int_until(b';')?)),
            other => Err(DecodeError::UnknownType {
                pos,
                marker: char::from(other),
            }),
        }
    }

    /// `<n>:{<key><value>...}`
    fn members(&mut self, depth: usize) -> Result<Vec<(Key, Value)>, DecodeError> {
        if depth >= MAX_DEPTH {
            return Err(DecodeError::TooDeep);
        }
        let count = self.len_until(b':')?;
        self.expect(b'{', "'{'")?;

        // Every member takes at least 6 bytes ("i:0;N;").
        let remaining = self.input.len().saturating_sub(self.pos);
        let mut members = Vec::with_capacity(count.min(remaining / 6));
        for _ in 0..count {
            let key = self.key()?;
            let value = self.value(depth + 1)?;
            members.push((key, value));
        }
        self.expect(b'}', "'}'")?;
        Ok(members)
    }

    fn key(&mut self) -> Result<Key, DecodeError> {
        let pos = self.pos;
        match self.value(MAX_DEPTH)? {
            Value::Int(i) => Ok(Key::Int(i)),
            Value::Str(s) => Ok(Key::Str(s)),
            _ => Err(DecodeError::Unexpected {
                pos,
                expected: "integer or string key",
            }),
        }
    }
}

fn parse_int(digits: &[u8]) -> Option<i64> {
    let (sign, rest) = match digits.first()? {
        b'-' | b'+' => (digits.first().copied(), &digits[1..]),
        _ => (None, digits),
    };
    if rest.is_empty() || !rest.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let text = std::str::from_utf8(digits).ok()?;
    let text = if sign == Some(b'+') { &text[1..] } else { text };
    text.parse().ok()
}

fn parse_float(text: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(text).ok()?;
    match text {
        "INF" | "-INF" | "NAN" => return Some(text.to_string()),
        _ => {}
    }
    let valid = !text.is_empty()
        && text
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'-' | b'+' | b'.' | b'e' | b'E'))
        && text.parse::<f64>().is_ok();
    valid.then(|| text.to_string())
}
