//! Markdown subset rendering with allow-list sanitization.

use std::sync::LazyLock;

use regex::Regex;

use crate::profile::Profile;

// Regex patterns - these are valid static patterns that cannot fail
#[allow(clippy::unwrap_used)]
static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.*)$").unwrap());

#[allow(clippy::unwrap_used)]
static ORDERED_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\s+(.*)$").unwrap());

#[allow(clippy::unwrap_used)]
static HTML_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?([a-zA-Z][a-zA-Z0-9]*)\b[^>]*>").unwrap());

#[allow(clippy::unwrap_used)]
static HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)href\s*=\s*["']([^"']*)["']"#).unwrap());

#[allow(clippy::unwrap_used)]
static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s<>\[\]()]+").unwrap());

#[allow(clippy::unwrap_used)]
static BOLD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").unwrap());

#[allow(clippy::unwrap_used)]
static ITALIC_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*([^*\n]+)\*").unwrap());

#[allow(clippy::unwrap_used)]
static INLINE_CODE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`([^`\n]+)`").unwrap());

#[allow(clippy::unwrap_used)]
static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]\n]+)\]\(([^)\s]+)\)").unwrap());

/// Inline constructs found in a line of text.
enum Inline {
    Code(String),
    Bold(String),
    Italic(String),
    Link { url: String, label: String },
    AutoLink(String),
    Tag { name: String, closing: bool, href: Option<String> },
}

/// Escape text content for HTML output.
fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Render a body to sanitized HTML under the given profile.
///
/// Blocks are separated by newlines in the output; tags the profile
/// does not allow degrade to their inline content.
#[must_use]
pub fn render(body: &str, profile: &Profile) -> String {
    let lines: Vec<&str> = body.lines().collect();
    let mut out: Vec<String> = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i].trim_end();

        if line.trim().is_empty() {
            i += 1;
            continue;
        }

        // Fenced code block
        if line.starts_with("```") {
            let mut code = Vec::new();
            i += 1;
            while i < lines.len() && !lines[i].trim_end().starts_with("```") {
                code.push(lines[i]);
                i += 1;
            }
            // skip the closing fence if present
            if i < lines.len() {
                i += 1;
            }
            let escaped = escape(&code.join("\n"));
            if profile.allows("pre") && profile.allows("code") {
                out.push(format!("<pre><code>{escaped}</code></pre>"));
            } else if profile.allows("code") {
                out.push(format!("<code>{escaped}</code>"));
            } else {
                out.push(escaped);
            }
            continue;
        }

        // Heading
        if let Some(caps) = HEADING_RE.captures(line) {
            let level = caps[1].len();
            let content = render_inline(&caps[2], profile);
            let tag = format!("h{level}");
            if profile.allows(&tag) {
                out.push(format!("<{tag}>{content}</{tag}>"));
            } else {
                out.push(content);
            }
            i += 1;
            continue;
        }

        // Blockquote
        if line.starts_with('>') {
            let mut quoted = Vec::new();
            while i < lines.len() {
                let l = lines[i].trim_end();
                if let Some(rest) = l.strip_prefix("> ") {
                    quoted.push(rest);
                } else if l == ">" {
                    quoted.push("");
                } else if let Some(rest) = l.strip_prefix('>') {
                    quoted.push(rest);
                } else {
                    break;
                }
                i += 1;
            }
            let content = render_inline(&quoted.join(" "), profile);
            if profile.allows("blockquote") {
                out.push(format!("<blockquote>{content}</blockquote>"));
            } else {
                out.push(content);
            }
            continue;
        }

        // Unordered list
        if bullet_item(line).is_some() {
            let mut items = Vec::new();
            while i < lines.len() {
                match bullet_item(lines[i].trim_end()) {
                    Some(item) => {
                        items.push(item);
                        i += 1;
                    }
                    None => break,
                }
            }
            out.push(render_list(&items, "ul", profile));
            continue;
        }

        // Ordered list
        if ORDERED_ITEM_RE.is_match(line) {
            let mut items = Vec::new();
            while i < lines.len() {
                match ORDERED_ITEM_RE.captures(lines[i].trim_end()) {
                    Some(caps) => {
                        items.push(caps[1].to_string());
                        i += 1;
                    }
                    None => break,
                }
            }
            out.push(render_list(&items, "ol", profile));
            continue;
        }

        // Paragraph: everything up to the next blank line or block start
        let mut para = vec![line];
        i += 1;
        while i < lines.len() {
            let l = lines[i].trim_end();
            if l.trim().is_empty()
                || l.starts_with("```")
                || l.starts_with('>')
                || l.starts_with('#')
                || bullet_item(l).is_some()
                || ORDERED_ITEM_RE.is_match(l)
            {
                break;
            }
            para.push(l);
            i += 1;
        }
        let content = render_inline(&para.join(" "), profile);
        if profile.allows("p") {
            out.push(format!("<p>{content}</p>"));
        } else {
            out.push(content);
        }
    }

    out.join("\n")
}

fn bullet_item(line: &str) -> Option<String> {
    line.strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .map(|rest| rest.to_string())
}

fn render_list(items: &[String], tag: &str, profile: &Profile) -> String {
    let rendered: Vec<String> = items.iter().map(|item| render_inline(item, profile)).collect();
    if profile.allows(tag) && profile.allows("li") {
        let body: String = rendered
            .iter()
            .map(|item| format!("<li>{item}</li>"))
            .collect();
        format!("<{tag}>{body}</{tag}>")
    } else {
        rendered.join(" ")
    }
}

/// Render inline content: Markdown emphasis/code/links, raw HTML tag
/// filtering, and bare-URL auto-linking. Everything else is escaped.
fn render_inline(text: &str, profile: &Profile) -> String {
    // Collect matches in priority order, then resolve overlaps by
    // position: earlier matches win, ties go to the higher-priority
    // construct.
    let mut matches: Vec<(usize, usize, Inline)> = Vec::new();

    for caps in INLINE_CODE_RE.captures_iter(text) {
        if let (Some(m), Some(inner)) = (caps.get(0), caps.get(1)) {
            matches.push((m.start(), m.end(), Inline::Code(inner.as_str().to_string())));
        }
    }

    for caps in HTML_TAG_RE.captures_iter(text) {
        if let (Some(m), Some(name)) = (caps.get(0), caps.get(1)) {
            let raw = m.as_str();
            let closing = raw.starts_with("</");
            let href = HREF_RE
                .captures(raw)
                .and_then(|c| c.get(1))
                .map(|h| h.as_str().to_string());
            matches.push((
                m.start(),
                m.end(),
                Inline::Tag {
                    name: name.as_str().to_lowercase(),
                    closing,
                    href,
                },
            ));
        }
    }

    for caps in LINK_RE.captures_iter(text) {
        if let (Some(m), Some(label), Some(url)) = (caps.get(0), caps.get(1), caps.get(2)) {
            matches.push((
                m.start(),
                m.end(),
                Inline::Link {
                    url: url.as_str().to_string(),
                    label: label.as_str().to_string(),
                },
            ));
        }
    }

    for m in URL_RE.find_iter(text) {
        matches.push((m.start(), m.end(), Inline::AutoLink(m.as_str().to_string())));
    }

    let mut bold_spans: Vec<(usize, usize)> = Vec::new();
    for caps in BOLD_RE.captures_iter(text) {
        if let (Some(m), Some(inner)) = (caps.get(0), caps.get(1)) {
            bold_spans.push((m.start(), m.end()));
            matches.push((m.start(), m.end(), Inline::Bold(inner.as_str().to_string())));
        }
    }

    // Scan italics over a copy with the bold spans blanked out, so the
    // delimiters of `**bold**` cannot be consumed as single stars and
    // swallow a later `*italic*`. Blanking preserves byte offsets.
    let masked = mask_spans(text, &bold_spans);
    for caps in ITALIC_RE.captures_iter(&masked) {
        if let (Some(m), Some(inner)) = (caps.get(0), caps.get(1)) {
            matches.push((m.start(), m.end(), Inline::Italic(inner.as_str().to_string())));
        }
    }

    // Stable sort keeps the priority ordering within equal positions.
    matches.sort_by_key(|(start, _, _)| *start);

    let mut html = String::new();
    let mut pos = 0;

    for (start, end, node) in matches {
        if start < pos {
            continue;
        }
        html.push_str(&escape(&text[pos..start]));
        html.push_str(&render_node(&node, profile));
        pos = end;
    }
    html.push_str(&escape(&text[pos..]));

    html
}

/// Replace every character inside the given byte spans with newlines
/// (one per byte, keeping offsets stable). Newlines terminate every
/// inline pattern, so masked regions cannot participate in a match.
fn mask_spans(text: &str, spans: &[(usize, usize)]) -> String {
    let mut masked = String::with_capacity(text.len());
    for (i, c) in text.char_indices() {
        if spans.iter().any(|&(start, end)| i >= start && i < end) {
            for _ in 0..c.len_utf8() {
                masked.push('\n');
            }
        } else {
            masked.push(c);
        }
    }
    masked
}

/// A link target survives sanitization only with an http, https or
/// mailto scheme, or none at all (relative URL).
fn href_allowed(url: &str) -> bool {
    let trimmed = url.trim();
    if trimmed.chars().any(|c| c.is_ascii_control()) {
        return false;
    }
    match trimmed
        .split(['/', '?', '#'])
        .next()
        .and_then(|head| head.split_once(':'))
    {
        Some((scheme, _)) => matches!(
            scheme.to_ascii_lowercase().as_str(),
            "http" | "https" | "mailto"
        ),
        None => true,
    }
}

fn render_node(node: &Inline, profile: &Profile) -> String {
    match node {
        Inline::Code(code) => {
            let escaped = escape(code);
            if profile.allows("code") {
                format!("<code>{escaped}</code>")
            } else {
                escaped
            }
        }
        Inline::Bold(inner) => {
            let content = render_inline(inner, profile);
            if profile.allows("strong") {
                format!("<strong>{content}</strong>")
            } else {
                content
            }
        }
        Inline::Italic(inner) => {
            let content = render_inline(inner, profile);
            if profile.allows("em") {
                format!("<em>{content}</em>")
            } else {
                content
            }
        }
        Inline::Link { url, label } => {
            let content = render_inline(label, profile);
            if profile.allows("a") && href_allowed(url) {
                format!("<a href=\"{}\">{content}</a>", escape(url))
            } else {
                content
            }
        }
        Inline::AutoLink(url) => {
            let escaped = escape(url);
            if profile.allows("a") {
                format!("<a href=\"{escaped}\">{escaped}</a>")
            } else {
                escaped
            }
        }
        Inline::Tag { name, closing, href } => {
            if !profile.allows(name) {
                // Stripped entirely; the surrounding text survives.
                return String::new();
            }
            if *closing {
                format!("</{name}>")
            } else if name == "a" {
                // href is the only attribute that survives
                // sanitization, and only with a safe scheme
                href.as_ref().filter(|h| href_allowed(h)).map_or_else(
                    || "<a>".to_string(),
                    |h| format!("<a href=\"{}\">", escape(h)),
                )
            } else {
                format!("<{name}>")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bold_and_italic() {
        let html = render("this is **bold** and *leaning*", &Profile::POST);
        assert!(html.contains("<strong>bold</strong>"));
        assert!(html.contains("<em>leaning</em>"));
    }

    #[test]
    fn test_bold_delimiters_do_not_swallow_later_italic() {
        let html = render("**a** b *c*", &Profile::POST);
        assert!(html.contains("<strong>a</strong>"));
        assert!(html.contains("<em>c</em>"));
    }

    #[test]
    fn test_inline_code_is_escaped() {
        let html = render("run `rm -rf <dir>` carefully", &Profile::POST);
        assert!(html.contains("<code>rm -rf &lt;dir&gt;</code>"));
    }

    #[test]
    fn test_markdown_link() {
        let html = render("[docs](https://example.com/docs)", &Profile::POST);
        assert!(html.contains("<a href=\"https://example.com/docs\">docs</a>"));
    }

    #[test]
    fn test_fenced_code_block() {
        let html = render("```\nlet x = 1 < 2;\n```", &Profile::POST);
        assert_eq!(html, "<pre><code>let x = 1 &lt; 2;</code></pre>");
    }

    #[test]
    fn test_fenced_code_block_in_comment_degrades() {
        // Comments allow <code> but not <pre>
        let html = render("```\nx\n```", &Profile::COMMENT);
        assert_eq!(html, "<code>x</code>");
    }

    #[test]
    fn test_unordered_list() {
        let html = render("- one\n- two", &Profile::POST);
        assert_eq!(html, "<ul><li>one</li><li>two</li></ul>");
    }

    #[test]
    fn test_ordered_list() {
        let html = render("1. first\n2. second", &Profile::POST);
        assert_eq!(html, "<ol><li>first</li><li>second</li></ol>");
    }

    #[test]
    fn test_paragraph_wrapping_depends_on_profile() {
        assert_eq!(render("hello", &Profile::POST), "<p>hello</p>");
        assert_eq!(render("hello", &Profile::COMMENT), "hello");
    }

    #[test]
    fn test_raw_allowed_tag_loses_attributes() {
        let html = render("<em class=\"x\" onclick=\"evil()\">hi</em>", &Profile::COMMENT);
        assert_eq!(html, "<em>hi</em>");
    }

    #[test]
    fn test_raw_anchor_keeps_href_only() {
        let html = render(
            "<a href=\"https://example.com\" onclick=\"evil()\">link</a>",
            &Profile::COMMENT,
        );
        assert_eq!(html, "<a href=\"https://example.com\">link</a>");
    }

    #[test]
    fn test_javascript_href_in_raw_anchor_is_dropped() {
        let html = render("<a href=\"javascript:alert(1)\">x</a>", &Profile::COMMENT);
        assert!(!html.contains("javascript"));
        assert_eq!(html, "<a>x</a>");
    }

    #[test]
    fn test_javascript_markdown_link_keeps_label_only() {
        for profile in [&Profile::POST, &Profile::COMMENT] {
            let html = render("[click](javascript:alert(1))", profile);
            assert!(!html.contains("javascript"));
            assert!(!html.contains("<a"));
            assert!(html.contains("click"));
        }
    }

    #[test]
    fn test_scheme_filter_is_case_insensitive() {
        let html = render("<a href=\"JaVaScRiPt:alert(1)\">x</a>", &Profile::POST);
        assert!(!html.to_lowercase().contains("javascript"));
    }

    #[test]
    fn test_mailto_and_relative_hrefs_survive() {
        let html = render("[mail](mailto:joe@example.com) [home](/user/joe)", &Profile::POST);
        assert!(html.contains("<a href=\"mailto:joe@example.com\">mail</a>"));
        assert!(html.contains("<a href=\"/user/joe\">home</a>"));
    }

    #[test]
    fn test_script_tag_stripped_content_kept() {
        let html = render("<script>alert(1)</script>", &Profile::POST);
        assert!(!html.contains("script"));
        assert!(html.contains("alert(1)"));
    }

    #[test]
    fn test_heading_levels() {
        assert_eq!(render("# One", &Profile::POST), "<h1>One</h1>");
        assert_eq!(render("### Three", &Profile::POST), "<h3>Three</h3>");
        // h4 is not on the post allow-list
        assert_eq!(render("#### Four", &Profile::POST), "Four");
    }

    #[test]
    fn test_autolink_does_not_touch_markdown_links() {
        let html = render("[x](https://example.com) and https://other.example", &Profile::POST);
        assert!(html.contains("<a href=\"https://example.com\">x</a>"));
        assert!(html.contains("<a href=\"https://other.example\">https://other.example</a>"));
    }

    #[test]
    fn test_empty_body_renders_empty() {
        assert_eq!(render("", &Profile::POST), "");
        assert_eq!(render("\n\n", &Profile::POST), "");
    }
}
