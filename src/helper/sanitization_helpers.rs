use ammonia::Builder;
use std::collections::HashSet;

use crate::config::ContentRendering;

/// Cleans stored post HTML down to a rich-text allow-list.
/// Scripts, event handlers and `javascript:` links are removed.
pub fn sanitize_rich_content(html_input: &str) -> String {
    let tags_to_allow = [
        "h1", "h2", "h3", "h4", "h5", "h6", "b", "strong", "i", "em", "u", "p", "br",
        "a", "ul", "ol", "li", "blockquote", "code", "pre", "hr", "img", "table",
        "thead", "tbody", "tr", "th", "td", "s", "del", "figure", "figcaption", "span", "div",
    ];
    let safe_tags = tags_to_allow.iter().cloned().collect::<HashSet<_>>();

    let safe_attributes = ["src", "href", "alt", "title", "class", "width", "height", "align"];
    let generic_attributes = safe_attributes.iter().cloned().collect::<HashSet<_>>();

    Builder::new()
        .tags(safe_tags)
        .generic_attributes(generic_attributes)
        .link_rel(Some("nofollow noopener noreferrer"))
        .clean(html_input)
        .to_string()
}

/// Produces the HTML that goes into the blog detail page.
pub fn render_post_content(html_input: &str, mode: ContentRendering) -> String {
    match mode {
        ContentRendering::Sanitize => sanitize_rich_content(html_input),
        ContentRendering::Trusted => html_input.to_string(),
    }
}

/// Strips all HTML tags from input (for titles/excerpts)
pub fn strip_all_html(input: &str) -> String {
    ammonia::Builder::new()
        .tags(HashSet::new())
        .clean(input)
        .to_string()
}

/// Tag-free, entity-free text, for places that are not HTML at all
/// (share text, email subjects).
pub fn plain_text(input: &str) -> String {
    let stripped = strip_all_html(input);
    html_escape::decode_html_entities(&stripped).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_removes_scripts_and_handlers() {
        let dirty = r#"<p onclick="steal()">Hello <strong>world</strong></p><script>alert(1)</script><a href="javascript:alert(1)">x</a>"#;
        let clean = sanitize_rich_content(dirty);
        assert!(clean.contains("<strong>world</strong>"));
        assert!(!clean.contains("script"));
        assert!(!clean.contains("onclick"));
        assert!(!clean.contains("javascript:"));
    }

    #[test]
    fn trusted_mode_renders_verbatim() {
        let html = r#"<iframe src="https://example.com/embed"></iframe>"#;
        assert_eq!(render_post_content(html, ContentRendering::Trusted), html);
        assert!(!render_post_content(html, ContentRendering::Sanitize).contains("iframe"));
    }

    #[test]
    fn plain_text_drops_tags_and_entities() {
        assert_eq!(plain_text("<b>Risk &amp; Reward</b> "), "Risk & Reward");
    }
}
