//! Messages the tutorials exchange

use chrono::NaiveDateTime;
use pubsub_middleware::{FieldDescriptor, Message, MiddlewareError, MsgStatus, MsgType};

/// Timestamp carried by the periodic publisher
pub const TIMESTAMP_FIELD: FieldDescriptor = FieldDescriptor {
    name: "MdMyTimestamp",
    fid: 99,
};

/// Greeting carried by the one-shot publisher
pub const GREETING_FIELD: FieldDescriptor = FieldDescriptor {
    name: "MyGreetingField",
    fid: 99,
};

pub const GREETING: &str = "Hello World";

/// `Thu Jan  4 09:05:00 2024` style, without the trailing newline
pub fn asctime(at: &NaiveDateTime) -> String {
    at.format("%a %b %e %H:%M:%S %Y").to_string()
}

/// INITIAL/OK message stamped with `at`
pub fn timestamp_message(at: &NaiveDateTime) -> Result<Message, MiddlewareError> {
    let mut msg = Message::new();
    msg.set_standard(MsgType::Initial, MsgStatus::Ok)?;
    msg.add_string(TIMESTAMP_FIELD.name, TIMESTAMP_FIELD.fid, asctime(at))?;
    Ok(msg)
}

pub fn greeting_message() -> Result<Message, MiddlewareError> {
    let mut msg = Message::new();
    msg.add_string(GREETING_FIELD.name, GREETING_FIELD.fid, GREETING)?;
    Ok(msg)
}
