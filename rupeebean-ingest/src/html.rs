//! Plain text from transaction e-mails saved as HTML.

use std::sync::OnceLock;

use regex::Regex;

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<.*?>").expect("tag regex"))
}

/// Remove markup and decode the entities payment mails use.
pub fn strip_tags(html: &str) -> String {
    tag_re()
        .replace_all(html, "")
        .replace("&#8377;", "₹")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
