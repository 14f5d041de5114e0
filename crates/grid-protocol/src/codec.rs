//! Message <-> text-line codec.
//!
//! One message per line. String values are quoted and escaped so a payload
//! may contain any of the record's reserved characters; the decoder is a
//! quote-aware scanner, not a delimiter split, so nested task data can never
//! tear the outer framing.

use crate::message::{Message, WireError};

/// Characters escaped inside quoted string values.
const ESCAPED: [(char, char); 4] = [('\\', '\\'), ('"', '"'), ('\n', 'n'), ('\r', 'r')];

/// Serialize a message into a single text line (without the trailing `\n`;
/// the session layer appends the line break on write).
#[must_use]
pub fn encode(msg: &Message) -> String {
    let mut out = String::with_capacity(96 + msg.payload.len());
    out.push('{');
    push_str_field(&mut out, "magic", &msg.magic);
    out.push(',');
    push_num_field(&mut out, "version", u64::from(msg.version));
    out.push(',');
    push_str_field(&mut out, "messageType", &msg.message_type);
    out.push(',');
    push_str_field(&mut out, "senderId", &msg.sender_id);
    out.push(',');
    push_num_field(&mut out, "timestamp", msg.timestamp);
    out.push(',');
    push_str_field(&mut out, "payload", &msg.payload);
    out.push('}');
    out
}

/// Parse one text line into a message.
///
/// Fails with [`WireError::Parse`] on missing braces, missing required keys,
/// bad escapes, non-numeric `version`/`timestamp`, or trailing garbage.
/// Unknown keys are ignored; duplicate keys take the last value.
pub fn decode(line: &str) -> Result<Message, WireError> {
    let line = line.trim_end_matches(['\n', '\r']).trim();
    let inner = line
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .ok_or_else(|| WireError::Parse("missing enclosing braces".to_string()))?;

    let mut magic = None;
    let mut version = None;
    let mut message_type = None;
    let mut sender_id = None;
    let mut timestamp = None;
    let mut payload = None;

    let mut chars = inner.chars().peekable();
    loop {
        skip_ws(&mut chars);
        if chars.peek().is_none() {
            break;
        }
        let key = scan_key(&mut chars)?;
        skip_ws(&mut chars);
        match chars.next() {
            Some(':') => {}
            other => {
                return Err(WireError::Parse(format!(
                    "expected ':' after key {key:?}, found {other:?}"
                )))
            }
        }
        skip_ws(&mut chars);
        let value = scan_value(&mut chars, &key)?;

        match key.as_str() {
            "magic" => magic = Some(value.into_string(&key)?),
            "version" => version = Some(value.into_number(&key)?),
            "messageType" => message_type = Some(value.into_string(&key)?),
            "senderId" => sender_id = Some(value.into_string(&key)?),
            "timestamp" => timestamp = Some(value.into_number(&key)?),
            "payload" => payload = Some(value.into_string(&key)?),
            _ => {} // forward compatibility: unknown keys are skipped
        }

        skip_ws(&mut chars);
        match chars.next() {
            Some(',') => continue,
            None => break,
            Some(c) => {
                return Err(WireError::Parse(format!(
                    "unexpected character {c:?} after value of {key:?}"
                )))
            }
        }
    }

    let version = version.ok_or_else(|| missing("version"))?;
    let version = u32::try_from(version)
        .map_err(|_| WireError::Parse(format!("version out of range: {version}")))?;

    Ok(Message {
        magic: magic.ok_or_else(|| missing("magic"))?,
        version,
        message_type: message_type.ok_or_else(|| missing("messageType"))?,
        sender_id: sender_id.ok_or_else(|| missing("senderId"))?,
        timestamp: timestamp.ok_or_else(|| missing("timestamp"))?,
        payload: payload.ok_or_else(|| missing("payload"))?,
    })
}

fn missing(key: &str) -> WireError {
    WireError::Parse(format!("missing required key: {key}"))
}

fn push_str_field(out: &mut String, key: &str, value: &str) {
    out.push_str(key);
    out.push_str(":\"");
    for c in value.chars() {
        match ESCAPED.iter().find(|(raw, _)| *raw == c) {
            Some((_, escaped)) => {
                out.push('\\');
                out.push(*escaped);
            }
            None => out.push(c),
        }
    }
    out.push('"');
}

fn push_num_field(out: &mut String, key: &str, value: u64) {
    out.push_str(key);
    out.push(':');
    out.push_str(&value.to_string());
}

type Chars<'a> = std::iter::Peekable<std::str::Chars<'a>>;

fn skip_ws(chars: &mut Chars<'_>) {
    while matches!(chars.peek(), Some(' ' | '\t')) {
        chars.next();
    }
}

fn scan_key(chars: &mut Chars<'_>) -> Result<String, WireError> {
    let mut key = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_alphanumeric() || c == '_' {
            key.push(c);
            chars.next();
        } else {
            break;
        }
    }
    if key.is_empty() {
        return Err(WireError::Parse("empty key".to_string()));
    }
    Ok(key)
}

/// A scanned field value: quoted text or a bare number.
enum Scanned {
    Text(String),
    Number(u64),
}

impl Scanned {
    fn into_string(self, key: &str) -> Result<String, WireError> {
        match self {
            Scanned::Text(s) => Ok(s),
            Scanned::Number(_) => Err(WireError::Parse(format!(
                "key {key:?} requires a quoted string value"
            ))),
        }
    }

    fn into_number(self, key: &str) -> Result<u64, WireError> {
        match self {
            Scanned::Number(n) => Ok(n),
            Scanned::Text(_) => Err(WireError::Parse(format!(
                "key {key:?} requires a numeric value"
            ))),
        }
    }
}

fn scan_value(chars: &mut Chars<'_>, key: &str) -> Result<Scanned, WireError> {
    match chars.peek() {
        Some('"') => {
            chars.next();
            let mut value = String::new();
            loop {
                match chars.next() {
                    Some('"') => return Ok(Scanned::Text(value)),
                    Some('\\') => match chars.next() {
                        Some(e) => match ESCAPED.iter().find(|(_, esc)| *esc == e) {
                            Some((raw, _)) => value.push(*raw),
                            None => {
                                return Err(WireError::Parse(format!(
                                    "invalid escape \\{e} in value of {key:?}"
                                )))
                            }
                        },
                        None => {
                            return Err(WireError::Parse(format!(
                                "truncated escape in value of {key:?}"
                            )))
                        }
                    },
                    Some(c) => value.push(c),
                    None => {
                        return Err(WireError::Parse(format!(
                            "unterminated string value for {key:?}"
                        )))
                    }
                }
            }
        }
        Some(c) if c.is_ascii_digit() => {
            let mut digits = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_ascii_digit() {
                    digits.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            digits
                .parse::<u64>()
                .map(Scanned::Number)
                .map_err(|_| WireError::Parse(format!("non-numeric value for {key:?}")))
        }
        Some(c) => Err(WireError::Parse(format!(
            "unexpected value start {c:?} for {key:?}"
        ))),
        None => Err(WireError::Parse(format!("missing value for {key:?}"))),
    }
}
