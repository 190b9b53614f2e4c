//! Structured-output helpers.
//!
//! Providers without schema-constrained generation get the schema as a
//! prompt instruction; their answers are then recovered from whatever
//! wrapping the model added (code fences, leading prose).

use brandforge_core::message::{Message, Role};
use brandforge_core::provider::ResponseSchema;
use regex_lite::Regex;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use std::sync::OnceLock;

/// A type the gateway can request as structured output.
pub trait StructuredOutput: DeserializeOwned + JsonSchema {
    /// Name sent to providers that require one.
    fn output_name() -> &'static str;

    /// Semantic checks the schema cannot express.
    fn check(&self) -> Result<(), String> {
        Ok(())
    }

    fn response_schema() -> ResponseSchema {
        let schema = schemars::schema_for!(Self);
        ResponseSchema {
            name: Self::output_name().to_string(),
            schema: serde_json::to_value(schema).unwrap_or_default(),
        }
    }
}

/// The strict-JSON instruction appended for providers without native support.
pub fn json_instruction(schema: &serde_json::Value) -> String {
    format!(
        "\n\nYou must respond with ONLY valid JSON matching this exact structure. \
         No markdown, no explanations, just raw JSON:\n{schema}"
    )
}

/// Append the instruction to the final user message.
///
/// Returns false when there is no user message to carry it.
pub fn append_json_instruction(messages: &mut [Message], schema: &serde_json::Value) -> bool {
    match messages.iter_mut().rev().find(|m| m.role == Role::User) {
        Some(message) => {
            message.content.push_str(&json_instruction(schema));
            true
        }
        None => false,
    }
}

fn fence_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [r"(?m)^```(?:json)?[ \t]*\r?\n?", r"(?m)[ \t]*```[ \t]*$"]
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect()
    })
}

/// Remove markdown code-fence markers.
pub fn strip_code_fences(content: &str) -> String {
    fence_patterns()
        .iter()
        .fold(content.to_string(), |text, re| re.replace_all(&text, "").into_owned())
}

/// The first balanced `{...}` object in `text`, ignoring braces inside strings.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse a model answer as JSON: directly, then after fence stripping and
/// object extraction.
pub fn parse_json_response(content: &str) -> Result<serde_json::Value, String> {
    if let Ok(value) = serde_json::from_str(content.trim()) {
        return Ok(value);
    }
    let cleaned = strip_code_fences(content);
    let candidate = extract_json_object(&cleaned)
        .ok_or_else(|| "no JSON object found in model response".to_string())?;
    serde_json::from_str(candidate).map_err(|e| format!("extracted JSON is invalid: {e}"))
}

/// Deserialize a parsed answer into `T` and run its semantic checks.
pub fn validate_structured<T: StructuredOutput>(value: serde_json::Value) -> Result<T, String> {
    let parsed: T = serde_json::from_value(value)
        .map_err(|e| format!("response does not match schema '{}': {e}", T::output_name()))?;
    parsed.check()?;
    Ok(parsed)
}
