//! Embedded JSON Extraction
//!
//! Helpers for pulling JSON objects out of free-form LLM text. Providers
//! wrap structured output in markdown fences, prefix it with prose, or emit
//! it bare; these helpers handle all three.

/// Extract the first top-level JSON object from text that may contain
/// markdown fences or surrounding prose.
///
/// Resolution order:
/// 1. Content of the first ```json fence
/// 2. Content of the first generic ``` fence, if it starts with `{`
/// 3. Brace-balanced scan from the first `{` in the raw text
pub fn extract_first_json_object(text: &str) -> Option<String> {
    if let Some(start) = text.find("```json") {
        let after_fence = &text[start + 7..];
        if let Some(end) = after_fence.find("```") {
            let content = after_fence[..end].trim();
            if !content.is_empty() {
                return Some(content.to_string());
            }
        }
    }

    if let Some(start) = text.find("```") {
        let after_fence = &text[start + 3..];
        let after_lang = if let Some(nl) = after_fence.find('\n') {
            &after_fence[nl + 1..]
        } else {
            after_fence
        };
        if let Some(end) = after_lang.find("```") {
            let content = after_lang[..end].trim();
            if content.starts_with('{') {
                return Some(content.to_string());
            }
        }
    }

    let start = text.find('{')?;
    scan_balanced_object(&text[start..]).map(|s| s.to_string())
}

/// Find every balanced top-level JSON object in the text, returning each
/// object's byte offset and slice. String literals and escapes are honored
/// so braces inside strings don't break the balance.
pub fn scan_json_objects(text: &str) -> Vec<(usize, &str)> {
    let mut objects = Vec::new();
    let mut search_from = 0;

    while let Some(relative) = text[search_from..].find('{') {
        let start = search_from + relative;
        match scan_balanced_object(&text[start..]) {
            Some(slice) => {
                objects.push((start, slice));
                search_from = start + slice.len();
            }
            None => {
                // Unbalanced tail; nothing further can match
                break;
            }
        }
    }

    objects
}

/// Scan one brace-balanced object starting at `text[0] == '{'`.
fn scan_balanced_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    if bytes.first() != Some(&b'{') {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[..=i]);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_from_json_fence() {
        let text = "Here's the plan:\n```json\n{\"steps\": []}\n```\nDone.";
        assert_eq!(extract_first_json_object(text).unwrap(), "{\"steps\": []}");
    }

    #[test]
    fn test_extract_from_generic_fence() {
        let text = "```\n{\"goal\": \"x\"}\n```";
        assert_eq!(extract_first_json_object(text).unwrap(), "{\"goal\": \"x\"}");
    }

    #[test]
    fn test_extract_bare_object() {
        let text = "The answer is {\"a\": 1} as requested.";
        assert_eq!(extract_first_json_object(text).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn test_extract_nested_object() {
        let text = "prefix {\"outer\": {\"inner\": 2}} suffix";
        assert_eq!(
            extract_first_json_object(text).unwrap(),
            "{\"outer\": {\"inner\": 2}}"
        );
    }

    #[test]
    fn test_extract_ignores_braces_in_strings() {
        let text = r#"{"text": "closing } brace inside"}"#;
        let extracted = extract_first_json_object(text).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&extracted).unwrap();
        assert_eq!(parsed["text"], "closing } brace inside");
    }

    #[test]
    fn test_extract_none_for_prose() {
        assert!(extract_first_json_object("no json here at all").is_none());
        assert!(extract_first_json_object("unbalanced { brace").is_none());
    }

    #[test]
    fn test_scan_multiple_objects() {
        let text = r#"first {"a": 1} then {"b": {"c": 2}} end"#;
        let objects = scan_json_objects(text);
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].1, r#"{"a": 1}"#);
        assert_eq!(objects[1].1, r#"{"b": {"c": 2}}"#);
        assert!(objects[0].0 < objects[1].0);
    }

    #[test]
    fn test_scan_empty() {
        assert!(scan_json_objects("plain text").is_empty());
    }
}
