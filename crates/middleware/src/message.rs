//! Self-describing field messages
//!
//! A message is an ordered list of typed fields. Each field carries a name and
//! a numeric field id (fid); lookups prefer the fid and fall back to the name
//! when the fid is zero.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::MiddlewareError;

/// Name/fid pair of a well-known field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub fid: u16,
}

pub const MSG_TYPE_FIELD: FieldDescriptor = FieldDescriptor {
    name: "MdMsgType",
    fid: 1,
};

pub const MSG_STATUS_FIELD: FieldDescriptor = FieldDescriptor {
    name: "MdMsgStatus",
    fid: 2,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgType {
    Update,
    Initial,
    Cancel,
    Error,
    Correction,
    Closing,
    Recap,
    Delete,
    Expire,
    Snapshot,
    Unknown,
}

impl MsgType {
    pub fn code(self) -> i32 {
        match self {
            MsgType::Update => 0,
            MsgType::Initial => 1,
            MsgType::Cancel => 2,
            MsgType::Error => 3,
            MsgType::Correction => 4,
            MsgType::Closing => 5,
            MsgType::Recap => 6,
            MsgType::Delete => 7,
            MsgType::Expire => 8,
            MsgType::Snapshot => 9,
            MsgType::Unknown => -1,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            0 => MsgType::Update,
            1 => MsgType::Initial,
            2 => MsgType::Cancel,
            3 => MsgType::Error,
            4 => MsgType::Correction,
            5 => MsgType::Closing,
            6 => MsgType::Recap,
            7 => MsgType::Delete,
            8 => MsgType::Expire,
            9 => MsgType::Snapshot,
            _ => MsgType::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MsgType::Update => "UPDATE",
            MsgType::Initial => "INITIAL",
            MsgType::Cancel => "CANCEL",
            MsgType::Error => "ERROR",
            MsgType::Correction => "CORRECTION",
            MsgType::Closing => "CLOSING",
            MsgType::Recap => "RECAP",
            MsgType::Delete => "DELETE",
            MsgType::Expire => "EXPIRE",
            MsgType::Snapshot => "SNAPSHOT",
            MsgType::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for MsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgStatus {
    Ok,
    LineDown,
    NoSubscribers,
    BadSymbol,
    Expired,
    Timeout,
    Misc,
    Stale,
    Unknown,
}

impl MsgStatus {
    pub fn code(self) -> i32 {
        match self {
            MsgStatus::Ok => 0,
            MsgStatus::LineDown => 1,
            MsgStatus::NoSubscribers => 2,
            MsgStatus::BadSymbol => 3,
            MsgStatus::Expired => 4,
            MsgStatus::Timeout => 5,
            MsgStatus::Misc => 6,
            MsgStatus::Stale => 7,
            MsgStatus::Unknown => -1,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            0 => MsgStatus::Ok,
            1 => MsgStatus::LineDown,
            2 => MsgStatus::NoSubscribers,
            3 => MsgStatus::BadSymbol,
            4 => MsgStatus::Expired,
            5 => MsgStatus::Timeout,
            6 => MsgStatus::Misc,
            7 => MsgStatus::Stale,
            _ => MsgStatus::Unknown,
        }
    }
}

/// Typed field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    String(String),
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F64(f64),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::String(v) => f.write_str(v),
            FieldValue::Bool(v) => write!(f, "{}", v),
            FieldValue::I32(v) => write!(f, "{}", v),
            FieldValue::I64(v) => write!(f, "{}", v),
            FieldValue::U32(v) => write!(f, "{}", v),
            FieldValue::U64(v) => write!(f, "{}", v),
            FieldValue::F64(v) => write!(f, "{}", v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(default)]
    pub fid: u16,
    pub value: FieldValue,
}

impl Field {
    fn matches(&self, name: &str, fid: u16) -> bool {
        if fid != 0 {
            self.fid == fid
        } else {
            self.name == name
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    fields: Vec<Field>,
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field. Rejects a field with neither name nor fid, a field
    /// whose lookup key is already present, and a non-finite float (it has
    /// no JSON encoding).
    pub fn add_field(
        &mut self,
        name: impl Into<String>,
        fid: u16,
        value: FieldValue,
    ) -> Result<(), MiddlewareError> {
        let name = name.into();
        if name.is_empty() && fid == 0 {
            return Err(MiddlewareError::Codec(
                "field needs a name or a non-zero fid".to_string(),
            ));
        }
        if let FieldValue::F64(v) = &value {
            if !v.is_finite() {
                return Err(MiddlewareError::Codec(format!(
                    "field '{}' (fid {}) is not a finite number: {}",
                    name, fid, v
                )));
            }
        }
        if self.get(&name, fid).is_some() {
            return Err(MiddlewareError::Codec(format!(
                "duplicate field '{}' (fid {})",
                name, fid
            )));
        }
        self.fields.push(Field { name, fid, value });
        Ok(())
    }

    pub fn add_string(
        &mut self,
        name: impl Into<String>,
        fid: u16,
        value: impl Into<String>,
    ) -> Result<(), MiddlewareError> {
        self.add_field(name, fid, FieldValue::String(value.into()))
    }

    pub fn add_bool(&mut self, name: impl Into<String>, fid: u16, value: bool) -> Result<(), MiddlewareError> {
        self.add_field(name, fid, FieldValue::Bool(value))
    }

    pub fn add_i32(&mut self, name: impl Into<String>, fid: u16, value: i32) -> Result<(), MiddlewareError> {
        self.add_field(name, fid, FieldValue::I32(value))
    }

    pub fn add_i64(&mut self, name: impl Into<String>, fid: u16, value: i64) -> Result<(), MiddlewareError> {
        self.add_field(name, fid, FieldValue::I64(value))
    }

    pub fn add_u32(&mut self, name: impl Into<String>, fid: u16, value: u32) -> Result<(), MiddlewareError> {
        self.add_field(name, fid, FieldValue::U32(value))
    }

    pub fn add_u64(&mut self, name: impl Into<String>, fid: u16, value: u64) -> Result<(), MiddlewareError> {
        self.add_field(name, fid, FieldValue::U64(value))
    }

    pub fn add_f64(&mut self, name: impl Into<String>, fid: u16, value: f64) -> Result<(), MiddlewareError> {
        self.add_field(name, fid, FieldValue::F64(value))
    }

    /// Set the standard message type and status fields
    pub fn set_standard(&mut self, msg_type: MsgType, status: MsgStatus) -> Result<(), MiddlewareError> {
        self.add_i32(MSG_TYPE_FIELD.name, MSG_TYPE_FIELD.fid, msg_type.code())?;
        self.add_i32(MSG_STATUS_FIELD.name, MSG_STATUS_FIELD.fid, status.code())
    }

    pub fn get(&self, name: &str, fid: u16) -> Option<&Field> {
        self.fields.iter().find(|f| f.matches(name, fid))
    }

    pub fn get_string(&self, name: &str, fid: u16) -> Option<&str> {
        match self.get(name, fid).map(|f| &f.value) {
            Some(FieldValue::String(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn get_i32(&self, name: &str, fid: u16) -> Option<i32> {
        match self.get(name, fid).map(|f| &f.value) {
            Some(FieldValue::I32(v)) => Some(*v),
            _ => None,
        }
    }

    /// Render any field type as text
    pub fn get_field_as_string(&self, name: &str, fid: u16) -> Option<String> {
        self.get(name, fid).map(|f| f.value.to_string())
    }

    pub fn msg_type(&self) -> MsgType {
        self.get_i32(MSG_TYPE_FIELD.name, MSG_TYPE_FIELD.fid)
            .map(MsgType::from_code)
            .unwrap_or(MsgType::Unknown)
    }

    pub fn msg_status(&self) -> MsgStatus {
        self.get_i32(MSG_STATUS_FIELD.name, MSG_STATUS_FIELD.fid)
            .map(MsgStatus::from_code)
            .unwrap_or(MsgStatus::Unknown)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Serialize to a transport payload
    pub fn encode(&self) -> Result<Bytes, MiddlewareError> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    pub fn decode(payload: &[u8]) -> Result<Self, MiddlewareError> {
        Ok(serde_json::from_slice(payload)?)
    }
}

/// `name=value` pairs in field order; a field without a name shows its fid
impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            if field.name.is_empty() {
                write!(f, "#{}={}", field.fid, field.value)?;
            } else {
                write!(f, "{}={}", field.name, field.value)?;
            }
        }
        Ok(())
    }
}
