//! Strip links and mentions from post text before it is re-published.

use std::sync::OnceLock;

use regex::Regex;

struct Patterns {
    removals: [Regex; 4],
    whitespace: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let re = |p: &str| Regex::new(p).expect("valid regex");
        Patterns {
            removals: [
                re(r"(?i)https?://\S+"),
                re(r"(?i)\bt\.me/\S+"),
                re(r"(?i)\bwww\.\S+"),
                re(r"@[A-Za-z0-9_]+"),
            ],
            whitespace: re(r"\s+"),
        }
    })
}

/// Remove URLs, `t.me` short links, `www.` links and `@mentions`, then collapse
/// whitespace.
///
/// Returns `None` when nothing is left, i.e. the post was links only.
pub fn clean_text(text: Option<&str>) -> Option<String> {
    let text = text?;
    let p = patterns();

    let mut out = text.to_string();
    for re in &p.removals {
        out = re.replace_all(&out, "").into_owned();
    }
    let out = p.whitespace.replace_all(&out, " ").trim().to_string();

    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}
