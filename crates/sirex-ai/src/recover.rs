//! Recovery of a single JSON object from free-form model output.
//!
//! Even in JSON response mode the model occasionally wraps its answer in a
//! markdown fence or surrounds it with prose. Attempts, in order:
//!
//! 1. the whole text as JSON
//! 2. the contents of a (optionally language-tagged) fenced block
//! 3. the outermost `{ ... }` substring
//!
//! Failures here are structural and must never be retried.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

static FENCED_OBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:[A-Za-z0-9_-]+)?\s*(\{.*\})\s*```").expect("fence pattern compiles")
});

static BRACED_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)(\{.*\})").expect("brace pattern compiles"));

#[derive(Debug, Error, PartialEq)]
pub enum RecoverError {
    #[error("empty model response")]
    Empty,

    #[error("model response JSON root must be an object")]
    NotAnObject,

    #[error("could not parse JSON from model response: {0}")]
    Unparseable(String),
}

/// Extract one JSON object from raw response text.
pub fn recover_object(text: &str) -> Result<Map<String, Value>, RecoverError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(RecoverError::Empty);
    }

    let mut last_error = match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => return Ok(map),
        Ok(_) => return Err(RecoverError::NotAnObject),
        Err(e) => e.to_string(),
    };

    for pattern in [&*FENCED_OBJECT, &*BRACED_OBJECT] {
        let Some(candidate) = pattern.captures(text).and_then(|c| c.get(1)) else {
            continue;
        };
        match serde_json::from_str::<Value>(candidate.as_str()) {
            Ok(Value::Object(map)) => return Ok(map),
            Ok(_) => return Err(RecoverError::NotAnObject),
            Err(e) => last_error = e.to_string(),
        }
    }

    Err(RecoverError::Unparseable(last_error))
}
