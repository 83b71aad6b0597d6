use super::{Key, Value};
use std::io::Write as _;

/// Encode `value` into its serialized byte form.
pub fn encode(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    encode_into(value, &mut out);
    out
}

pub fn encode_into(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Null => out.extend_from_slice(b"N;"),
        Value::Bool(b) => {
            let _ = write!(out, "b:{};", u8::from(*b));
        }
        Value::Int(i) => {
            let _ = write!(out, "i:{i};");
        }
        Value::Float(text) => {
            let _ = write!(out, "d:{text};");
        }
        Value::Str(bytes) => {
            quoted(b's', bytes, out);
            out.push(b';');
        }
        Value::Array(members) => {
            let _ = write!(out, "a:{}:", members.len());
            encode_members(members, out);
        }
        Value::Object { class, members } => {
            quoted(b'O', class, out);
            let _ = write!(out, ":{}:", members.len());
            encode_members(members, out);
        }
        Value::Custom { class, payload } => {
            quoted(b'C', class, out);
            let _ = write!(out, ":{}:{{", payload.len());
            out.extend_from_slice(payload);
            out.push(b'}');
        }
        Value::Enum(case) => {
            quoted(b'E', case, out);
            out.push(b';');
        }
        Value::Ref(n) => {
            let _ = write!(out, "r:{n};");
        }
        Value::StrongRef(n) => {
            let _ = write!(out, "R:{n};");
        }
    }
}

/// `<marker>:<len>:"<bytes>"`
fn quoted(marker: u8, bytes: &[u8], out: &mut Vec<u8>) {
    out.push(marker);
    let _ = write!(out, ":{}:\"", bytes.len());
    out.extend_from_slice(bytes);
    out.push(b'"');
}

fn encode_members(members: &[(Key, Value)], out: &mut Vec<u8>) {
    out.push(b'{');
    for (key, value) in members {
        match key {
            Key::Int(i) => {
                let _ = write!(out, "i:{i};");
            }
            Key::Str(s) => {
                quoted(b's', s, out);
                out.push(b';');
            }
        }
        encode_into(value, out);
    }
    out.push(b'}');
}
