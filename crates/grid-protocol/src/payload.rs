//! Payload sub-field codec.
//!
//! Payload fields are order-significant and `;`-separated, with a `\` escape
//! layer of their own so matrix data (which uses `\` and `,` internally) can
//! travel inside a field without splitting it.

use crate::message::WireError;

/// Join payload sub-fields into one escaped payload string.
#[must_use]
pub fn join_fields<S: AsRef<str>>(fields: &[S]) -> String {
    let mut out = String::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(';');
        }
        for c in field.as_ref().chars() {
            match c {
                '\\' => out.push_str("\\\\"),
                ';' => out.push_str("\\;"),
                other => out.push(other),
            }
        }
    }
    out
}

/// Split an escaped payload string back into its sub-fields.
pub fn split_fields(payload: &str) -> Result<Vec<String>, WireError> {
    let mut fields = vec![String::new()];
    let mut chars = payload.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('\\') => fields.last_mut().expect("non-empty").push('\\'),
                Some(';') => fields.last_mut().expect("non-empty").push(';'),
                Some(e) => {
                    return Err(WireError::Parse(format!(
                        "invalid payload escape \\{e}"
                    )))
                }
                None => {
                    return Err(WireError::Parse(
                        "truncated payload escape".to_string(),
                    ))
                }
            },
            ';' => fields.push(String::new()),
            other => fields.last_mut().expect("non-empty").push(other),
        }
    }
    Ok(fields)
}

/// Decoded `RPC_REQUEST` payload: `taskId;taskType;data;runtimeToken`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRequest {
    pub task_id: String,
    pub task_type: String,
    pub data: String,
    pub token: String,
}

impl TaskRequest {
    /// Encode into a payload string.
    #[must_use]
    pub fn to_payload(&self) -> String {
        join_fields(&[&self.task_id, &self.task_type, &self.data, &self.token])
    }

    /// Decode from a payload string.
    pub fn from_payload(payload: &str) -> Result<Self, WireError> {
        let fields = split_fields(payload)?;
        let [task_id, task_type, data, token]: [String; 4] =
            fields.try_into().map_err(|v: Vec<String>| {
                WireError::Parse(format!(
                    "RPC_REQUEST payload needs 4 fields, found {}",
                    v.len()
                ))
            })?;
        Ok(Self {
            task_id,
            task_type,
            data,
            token,
        })
    }
}

/// Decoded `TASK_COMPLETE`/`TASK_ERROR` payload: `taskId;body` where the body
/// is the result text or the error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReply {
    pub task_id: String,
    pub body: String,
}

impl TaskReply {
    #[must_use]
    pub fn new(task_id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            body: body.into(),
        }
    }

    /// Encode into a payload string.
    #[must_use]
    pub fn to_payload(&self) -> String {
        join_fields(&[&self.task_id, &self.body])
    }

    /// Decode from a payload string.
    pub fn from_payload(payload: &str) -> Result<Self, WireError> {
        let fields = split_fields(payload)?;
        let [task_id, body]: [String; 2] = fields.try_into().map_err(|v: Vec<String>| {
            WireError::Parse(format!(
                "task reply payload needs 2 fields, found {}",
                v.len()
            ))
        })?;
        Ok(Self { task_id, body })
    }
}
