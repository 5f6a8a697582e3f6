//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values in a single
/// pass: substituted values are never scanned again, so placeholders inside them stay
/// literal. Unknown keys are left as-is.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = String::with_capacity(tpl.len());
  let mut rest = tpl;
  while let Some(open) = rest.find('{') {
    out.push_str(&rest[..open]);
    let after = &rest[open + 1..];
    let value = after
      .find('}')
      .and_then(|close| pairs.iter().find(|(k, _)| *k == &after[..close]).map(|(_, v)| (close, *v)));
    match value {
      Some((close, v)) => {
        out.push_str(v);
        rest = &after[close + 1..];
      }
      None => {
        out.push('{');
        rest = after;
      }
    }
  }
  out.push_str(rest);
  out
}

/// Log-safe truncation for large strings, cut on a char boundary.
pub fn trunc_for_log(s: &str, max_chars: usize) -> String {
  let total = s.chars().count();
  if total <= max_chars {
    s.to_string()
  } else {
    format!("{}… ({} chars total)", s.chars().take(max_chars).collect::<String>(), total)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fills_known_keys_and_leaves_others() {
    let out = fill_template("{a} and {b} and {c}", &[("a", "1"), ("b", "2")]);
    assert_eq!(out, "1 and 2 and {c}");
  }

  #[test]
  fn substituted_values_are_not_expanded_again() {
    let tpl = "Translation: {translation}\nGrammar: {grammar_topics}";
    let out = fill_template(tpl, &[("translation", "{grammar_topics} {x"), ("grammar_topics", "1: Perfekt")]);
    assert_eq!(out, "Translation: {grammar_topics} {x\nGrammar: 1: Perfekt");
  }

  #[test]
  fn json_braces_in_template_survive() {
    let out = fill_template(r#"Return {"a": {n}}"#, &[("n", "1")]);
    assert_eq!(out, r#"Return {"a": 1}"#);
  }

  #[test]
  fn truncation_respects_multibyte_chars() {
    assert_eq!(trunc_for_log("müde", 10), "müde");
    assert_eq!(trunc_for_log("Ich bin müde", 6), "Ich bi… (12 chars total)");
    assert_eq!(trunc_for_log("üüü", 1), "ü… (3 chars total)");
  }
}
