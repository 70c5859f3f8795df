//! Cleanup of model-generated markup.
//!
//! Models asked for raw HTML still like to wrap it in a Markdown fence, put
//! it in quotes or prefix a stray `html` language tag. [`normalize_markup`]
//! removes exactly those wrappers and nothing else:
//!
//! 1. surrounding whitespace
//! 2. a code fence enclosing the whole text (```` ```html ... ``` ````)
//! 3. one pair of matching quotes enclosing the whole text, if the inside is
//!    markup or a fence
//! 4. a leading bare `html` tag in front of markup
//!
//! Rules are reapplied until nothing changes, so the function is idempotent.

use once_cell::sync::Lazy;
use regex::Regex;

static FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\A```(?:[A-Za-z0-9_+-]*[ \t]*\r?\n)?(.*?)\s*```\z")
        .expect("fence pattern is valid")
});

static LANGUAGE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?si)\Ahtml\s*(<.*)\z").expect("language tag pattern is valid"));

pub fn normalize_markup(raw: &str) -> String {
    let mut current = raw.trim().to_string();
    loop {
        let next = strip_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn strip_once(text: &str) -> String {
    if let Some(body) = FENCE.captures(text).and_then(|c| c.get(1)) {
        return body.as_str().trim().to_string();
    }
    if let Some(inner) = unquote(text) {
        return inner.trim().to_string();
    }
    if let Some(markup) = LANGUAGE_TAG.captures(text).and_then(|c| c.get(1)) {
        return markup.as_str().trim().to_string();
    }
    text.trim().to_string()
}

fn unquote(text: &str) -> Option<&str> {
    ['"', '\''].into_iter().find_map(|quote| {
        let inner = text.strip_prefix(quote)?.strip_suffix(quote)?;
        let body = inner.trim_start();
        (body.starts_with('<') || body.starts_with("```")).then_some(inner)
    })
}
