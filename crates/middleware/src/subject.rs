//! Topic validation and wildcard matching
//!
//! Topics are dot-separated tokens ("tutorial.topic"). Subscription patterns
//! may use `*` for exactly one token and a trailing `>` for one or more tokens.

use crate::error::TransportError;

const SEPARATOR: char = '.';
const SINGLE_WILDCARD: &str = "*";
const TAIL_WILDCARD: &str = ">";

/// Validate a topic used for publishing: no empty tokens, no wildcards.
pub fn validate_topic(topic: &str) -> Result<(), TransportError> {
    validate(topic, false)
}

/// Validate a subscription pattern: no empty tokens, `>` only as last token.
pub fn validate_pattern(pattern: &str) -> Result<(), TransportError> {
    validate(pattern, true)
}

fn validate(subject: &str, allow_wildcards: bool) -> Result<(), TransportError> {
    if subject.is_empty() {
        return Err(TransportError::ValidationFailed("empty topic".to_string()));
    }
    let tokens: Vec<&str> = subject.split(SEPARATOR).collect();
    for (i, token) in tokens.iter().enumerate() {
        if token.is_empty() {
            return Err(TransportError::ValidationFailed(format!(
                "empty token in topic '{}'",
                subject
            )));
        }
        if token.chars().any(char::is_whitespace) {
            return Err(TransportError::ValidationFailed(format!(
                "whitespace in topic '{}'",
                subject
            )));
        }
        let wildcard = *token == SINGLE_WILDCARD || *token == TAIL_WILDCARD;
        if wildcard && !allow_wildcards {
            return Err(TransportError::ValidationFailed(format!(
                "wildcard in publish topic '{}'",
                subject
            )));
        }
        if *token == TAIL_WILDCARD && i != tokens.len() - 1 {
            return Err(TransportError::ValidationFailed(format!(
                "'>' must be the last token in '{}'",
                subject
            )));
        }
    }
    Ok(())
}

/// Does `subject` fall under subscription `pattern`?
pub fn matches(pattern: &str, subject: &str) -> bool {
    let mut pattern_tokens = pattern.split(SEPARATOR);
    let mut subject_tokens = subject.split(SEPARATOR);

    loop {
        match (pattern_tokens.next(), subject_tokens.next()) {
            (Some(TAIL_WILDCARD), Some(_)) => return true,
            (Some(SINGLE_WILDCARD), Some(_)) => continue,
            (Some(p), Some(s)) if p == s => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}
