//! Locate the JSON object inside free-form model output.

use serde_json::Value;

use crate::{EduBuddyError, Result};

/// Extract the first top-level JSON object from model text.
///
/// Accepts a bare object, an object wrapped in a Markdown code fence, or an
/// object surrounded by prose. Anything else is a malformed response.
pub fn extract_json_object(text: &str) -> Result<Value> {
    let trimmed = strip_code_fence(text.trim());

    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) else {
        return Err(EduBuddyError::MalformedResponse(
            "no JSON object found in response".to_string(),
        ));
    };
    if end < start {
        return Err(EduBuddyError::MalformedResponse(
            "no JSON object found in response".to_string(),
        ));
    }

    match serde_json::from_str::<Value>(&trimmed[start..=end]) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(_) => Err(EduBuddyError::MalformedResponse(
            "response JSON is not an object".to_string(),
        )),
        Err(e) => Err(EduBuddyError::MalformedResponse(format!(
            "invalid JSON in response: {e}"
        ))),
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Skip the info string ("json") up to the first newline.
    let body = rest.split_once('\n').map_or(rest, |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
