//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// This is intentionally simple (no nested/conditional logic).
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Log-safe truncation for large strings. Cuts on a char boundary.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let cut = s.char_indices().map(|(i, _)| i).take_while(|i| *i <= max).last().unwrap_or(0);
  format!("{}… ({} bytes total)", &s[..cut], s.len())
}

/// Countdown display, `m:ss`.
pub fn format_clock(secs: u32) -> String {
  format!("{}:{:02}", secs / 60, secs % 60)
}

/// Letter for a 0-based choice index (0 -> A).
pub fn choice_letter(index: usize) -> char {
  u8::try_from(index).ok().and_then(|i| b'A'.checked_add(i)).map_or('?', char::from)
}
