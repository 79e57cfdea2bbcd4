//! Markdown rendering and HTML sanitization for post and comment bodies.
//!
//! Whenever a post or comment body is written, the derived HTML field is
//! produced by this crate: the Markdown subset is rendered, any raw HTML
//! tag not on the profile's allow-list is stripped (keeping its text),
//! and bare URLs are turned into links.
//!
//! Posts render with the block-level [`Profile::POST`] allow-list;
//! comments use the inline-only [`Profile::COMMENT`] list.
//!
//! # Example
//!
//! ```
//! use iblog_markdown::{render_post, render_comment};
//!
//! let html = render_post("# Hello\n\nThis is **important**.");
//! assert!(html.contains("<h1>Hello</h1>"));
//!
//! let html = render_comment("<script>alert(1)</script>nice *post*");
//! assert!(!html.contains("<script>"));
//! assert!(html.contains("<em>post</em>"));
//! ```

mod profile;
mod render;

pub use profile::Profile;
pub use render::render;

/// Render a post body with the block-level allow-list.
#[must_use]
pub fn render_post(body: &str) -> String {
    render(body, &Profile::POST)
}

/// Render a comment body with the inline-only allow-list.
#[must_use]
pub fn render_comment(body: &str) -> String {
    render(body, &Profile::COMMENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disallowed_tag_stripped_allowed_kept() {
        let html = render_post("safe <em>emphasis</em> and <script>alert(1)</script>");
        assert!(html.contains("<em>emphasis</em>"));
        assert!(!html.contains("<script"));
        assert!(html.contains("alert(1)"));
    }

    #[test]
    fn test_bare_url_autolinked() {
        let html = render_post("see https://example.com/page for details");
        assert!(html.contains("<a href=\"https://example.com/page\">https://example.com/page</a>"));
    }

    #[test]
    fn test_comment_profile_is_inline_only() {
        let html = render_comment("# not a heading");
        assert!(!html.contains("<h1>"));
        assert!(html.contains("not a heading"));

        let html = render_comment("quoted <blockquote>text</blockquote>");
        assert!(!html.contains("<blockquote>"));
    }

    #[test]
    fn test_post_profile_keeps_blocks() {
        let html = render_post("## Section\n\n> quoted line");
        assert!(html.contains("<h2>Section</h2>"));
        assert!(html.contains("<blockquote>"));
    }

    #[test]
    fn test_plain_text_is_escaped() {
        let html = render_comment("1 < 2 && 3 > 2");
        assert!(html.contains("1 &lt; 2 &amp;&amp; 3 &gt; 2"));
    }
}
