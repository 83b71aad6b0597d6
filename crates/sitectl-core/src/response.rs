//! Reply tokens written back to the caller.

use crate::auth::AuthFailure;
use crate::phpser::{Key, Value};
use std::io::{self, Write};

pub const AUTH_OK: &str = "AUTHOK:";
pub const NO_AUTH: &str = "NOAUTH:";
pub const ERROR: &str = "ERROR:";
pub const SYNTAX_ERROR: &str = "Syntax Error";

/// `NOAUTH:<code>:<message>`
pub fn noauth(failure: AuthFailure) -> String {
    format!("{NO_AUTH}{}:{}", failure.code(), failure.message())
}

/// Writer for one reply body.
pub struct Reply<'w> {
    out: &'w mut dyn Write,
    written: u64,
}

impl<'w> Reply<'w> {
    pub fn new(out: &'w mut dyn Write) -> Self {
        Self { out, written: 0 }
    }

    pub fn bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.out.write_all(bytes)?;
        self.written += bytes.len() as u64;
        Ok(())
    }

    pub fn text(&mut self, text: &str) -> io::Result<()> {
        self.bytes(text.as_bytes())
    }

    /// `text` followed by a newline.
    pub fn line(&mut self, text: &str) -> io::Result<()> {
        self.text(text)?;
        self.bytes(b"\n")
    }

    pub fn auth_ok(&mut self) -> io::Result<()> {
        self.text(AUTH_OK)
    }

    /// `ERROR:<reason>`
    pub fn error(&mut self, reason: &str) -> io::Result<()> {
        self.text(ERROR)?;
        self.text(reason)
    }

    pub fn syntax_error(&mut self) -> io::Result<()> {
        self.text(SYNTAX_ERROR)
    }

    /// Stream everything from `reader`.
    pub fn copy_from(&mut self, reader: &mut dyn io::Read) -> io::Result<u64> {
        let n = io::copy(reader, &mut self.out)?;
        self.written += n;
        Ok(n)
    }

    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// `PONG:<proto>:<runtime>:<app-info>:<agent>`
pub fn pong(app_info: &str) -> String {
    format!(
        "PONG:{}:{}:{}:{}",
        crate::PROTO_VERSION,
        crate::RUNTIME_VERSION,
        app_info,
        crate::AGENT_VERSION
    )
}

/// Human-readable dump of a decoded value, in the layout the application's
/// `print_r` produces.
pub fn print_r(value: &Value) -> String {
    let mut out = String::new();
    print_value(value, 0, &mut out);
    out
}

fn print_value(value: &Value, indent: usize, out: &mut String) {
    match value {
        Value::Null | Value::Bool(false) => {}
        Value::Bool(true) => out.push('1'),
        Value::Int(i) => out.push_str(&i.to_string()),
        Value::Float(text) => out.push_str(text),
        Value::Str(bytes) => out.push_str(&String::from_utf8_lossy(bytes)),
        Value::Array(members) => print_members("Array", members, indent, out),
        Value::Object { class, members } => {
            let header = format!("{} Object", String::from_utf8_lossy(class));
            print_members(&header, members, indent, out);
        }
        Value::Custom { class, .. } => {
            out.push_str(&String::from_utf8_lossy(class));
            out.push_str(" Object\n");
        }
        Value::Enum(case) => out.push_str(&String::from_utf8_lossy(case)),
        Value::Ref(n) | Value::StrongRef(n) => out.push_str(&format!("*RECURSION {n}*")),
    }
}

fn print_members(header: &str, members: &[(Key, Value)], indent: usize, out: &mut String) {
    let pad = " ".repeat(indent);
    out.push_str(header);
    out.push('\n');
    out.push_str(&pad);
    out.push_str("(\n");
    for (key, value) in members {
        out.push_str(&pad);
        out.push_str(&format!("    [{key}] => "));
        print_value(value, indent + 8, out);
        out.push('\n');
    }
    out.push_str(&pad);
    out.push_str(")\n");
}
