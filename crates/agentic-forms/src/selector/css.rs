//! CSS escaping and identifier stability heuristics.

use std::sync::OnceLock;

use regex::Regex;

/// Escape a string for use as a CSS identifier (`#id`, `.class`), following
/// the CSSOM `CSS.escape()` algorithm.
pub fn escape_identifier(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let mut out = String::with_capacity(value.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        let code = c as u32;
        if c == '\0' {
            out.push('\u{FFFD}');
        } else if (0x01..=0x1f).contains(&code)
            || code == 0x7f
            || (i == 0 && c.is_ascii_digit())
            || (i == 1 && c.is_ascii_digit() && chars[0] == '-')
        {
            out.push_str(&format!("\\{code:x} "));
        } else if i == 0 && c == '-' && chars.len() == 1 {
            out.push_str("\\-");
        } else if code >= 0x80 || c == '-' || c == '_' || c.is_ascii_alphanumeric() {
            out.push(c);
        } else {
            out.push('\\');
            out.push(c);
        }
    }
    out
}

/// Escape a string for a double-quoted attribute value.
pub fn escape_attr_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\a "),
            '\r' => out.push_str("\\d "),
            '\0' => out.push('\u{FFFD}'),
            _ => out.push(c),
        }
    }
    out
}

fn framework_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)^(ember\d+|react-|:r[0-9a-z]*:|mui-\d+|headlessui-|radix-|__next|ng-|yui_|ext-gen|gwt-uid-|j_idt|uid-\d|id-\d)",
        )
        .expect("framework id regex is valid")
    })
}

fn hex_run_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)[0-9a-f]{6,}").expect("hex run regex is valid"))
}

fn digit_run_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d{5,}").expect("digit run regex is valid"))
}

/// True for tokens that look hand-written rather than generated: no
/// framework prefixes, no hash-like hex runs, no long digit runs.
fn looks_handwritten(token: &str) -> bool {
    if token.is_empty() || token.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    if digit_run_pattern().is_match(token) {
        return false;
    }
    let hashy = hex_run_pattern().find_iter(token).any(|m| {
        let run = m.as_str();
        run.chars().any(|c| c.is_ascii_digit()) && run.chars().any(|c| c.is_ascii_alphabetic())
    });
    !hashy
}

/// Whether an `id` is likely to survive a re-render.
pub fn is_stable_id(id: &str) -> bool {
    let id = id.trim();
    if id.is_empty() || id.starts_with(|c: char| c.is_ascii_digit()) {
        return false;
    }
    !framework_id_pattern().is_match(id) && looks_handwritten(id)
}

fn generated_class_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(css-|sc-|jsx-\d|svelte-|emotion-|_[a-zA-Z0-9]{5,}$|[a-zA-Z]+__[a-zA-Z]+___[a-zA-Z0-9]{5}$|ng-)")
            .expect("generated class regex is valid")
    })
}

/// Whether a class name is likely authored rather than emitted by a CSS-in-JS tool.
pub fn is_stable_class(class: &str) -> bool {
    !generated_class_pattern().is_match(class) && looks_handwritten(class)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_identifier() {
        assert_eq!(escape_identifier("email"), "email");
        assert_eq!(escape_identifier("user.name"), "user\\.name");
        assert_eq!(escape_identifier("a:b[0]"), "a\\:b\\[0\\]");
        assert_eq!(escape_identifier("1st"), "\\31 st");
        assert_eq!(escape_identifier("-2x"), "-\\32 x");
        assert_eq!(escape_identifier("-"), "\\-");
        assert_eq!(escape_identifier("café"), "café");
    }

    #[test]
    fn test_escape_attr_value() {
        assert_eq!(escape_attr_value(r#"say "hi""#), r#"say \"hi\""#);
        assert_eq!(escape_attr_value(r"a\b"), r"a\\b");
    }

    #[test]
    fn test_stable_ids() {
        for id in ["email", "billing-address", "first_name", "zip2"] {
            assert!(is_stable_id(id), "{id} should be stable");
        }
        for id in [
            "", "12345", "1abc", "ember482", ":r1:", "react-select-3-input", "mui-42",
            "field-8f3a9c2e", "input_20240101", "headlessui-listbox-1", "j_idt12",
        ] {
            assert!(!is_stable_id(id), "{id} should be unstable");
        }
    }

    #[test]
    fn test_stable_classes() {
        assert!(is_stable_class("form-control"));
        assert!(is_stable_class("checkout-email"));
        assert!(!is_stable_class("css-1x2y3z"));
        assert!(!is_stable_class("sc-bdVaJa"));
        assert!(!is_stable_class("_3xk9q"));
        assert!(!is_stable_class("Button__primary___1a2b3"));
    }
}
