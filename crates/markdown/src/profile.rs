//! Sanitization profiles.

/// An HTML tag allow-list applied to rendered bodies.
///
/// Tags not on the list are stripped from the output, keeping their
/// text content. The only attribute that ever survives is `href` on
/// `<a>` elements.
#[derive(Debug, Clone, Copy)]
pub struct Profile {
    allowed: &'static [&'static str],
}

impl Profile {
    /// Post bodies: block elements allowed.
    pub const POST: Self = Self {
        allowed: &[
            "a",
            "abbr",
            "acronym",
            "b",
            "blockquote",
            "code",
            "em",
            "i",
            "li",
            "ol",
            "pre",
            "strong",
            "ul",
            "h1",
            "h2",
            "h3",
            "p",
        ],
    };

    /// Comment bodies: inline formatting only.
    pub const COMMENT: Self = Self {
        allowed: &["a", "abbr", "acronym", "b", "code", "em", "i", "strong"],
    };

    /// Whether a tag name is on the allow-list.
    #[must_use]
    pub fn allows(&self, tag: &str) -> bool {
        self.allowed.contains(&tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_allows_blocks() {
        assert!(Profile::POST.allows("blockquote"));
        assert!(Profile::POST.allows("h1"));
        assert!(Profile::POST.allows("pre"));
        assert!(!Profile::POST.allows("script"));
        assert!(!Profile::POST.allows("img"));
    }

    #[test]
    fn test_comment_is_inline_only() {
        assert!(Profile::COMMENT.allows("em"));
        assert!(Profile::COMMENT.allows("a"));
        assert!(!Profile::COMMENT.allows("p"));
        assert!(!Profile::COMMENT.allows("blockquote"));
        assert!(!Profile::COMMENT.allows("h1"));
    }
}
