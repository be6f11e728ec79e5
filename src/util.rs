//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Log-safe truncation for large strings.
/// Cuts on a char boundary so multi-byte text never panics.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut end = max;
  while !s.is_char_boundary(end) { end -= 1; }
  format!("{}… ({} bytes total)", &s[..end], s.len())
}

/// Truncate to at most `max` characters, appending an ellipsis when cut.
pub fn truncate_chars(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    return s.to_string();
  }
  let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
  out = out.trim_end().to_string();
  out.push('…');
  out
}

/// Render submitted content for a prompt: strings verbatim, everything else as compact JSON.
pub fn content_as_text(content: &serde_json::Value) -> String {
  match content {
    serde_json::Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fill_template_replaces_every_key() {
    let out = fill_template("{a} and {b} and {a}", &[("a", "x"), ("b", "y")]);
    assert_eq!(out, "x and y and x");
  }

  #[test]
  fn trunc_for_log_respects_char_boundaries() {
    let s = "ñandú ñandú";
    let out = trunc_for_log(s, 2);
    assert!(out.starts_with('ñ'));
    assert!(out.contains("bytes total"));
  }

  #[test]
  fn truncate_chars_keeps_short_text() {
    assert_eq!(truncate_chars("hello", 10), "hello");
    let cut = truncate_chars("hello world again", 8);
    assert!(cut.ends_with('…'));
    assert!(cut.chars().count() <= 8);
  }

  #[test]
  fn content_as_text_leaves_strings_unquoted() {
    assert_eq!(content_as_text(&serde_json::json!("essay")), "essay");
    assert_eq!(content_as_text(&serde_json::json!({"a": 1})), r#"{"a":1}"#);
  }
}
