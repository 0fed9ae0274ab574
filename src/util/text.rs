use std::borrow::Cow;

use htmlescape::decode_html;

/// Longest character reference considered, `&` and `;` included
const MAX_REFERENCE_LEN: usize = 32;

/// Decodes HTML character references (`&amp;`, `&#39;`, `&rsquo;`, ...) into
/// plain text.
///
/// Runs once over text the XML parser has already decoded, so a title
/// written as `&amp;amp;` in the feed comes out as `&`. References produced
/// by the decoding itself are left alone. An `&` that does not start a known
/// reference is kept literally.
///
/// # Examples
///
/// ```
/// use gator::util::unescape_html;
///
/// assert_eq!(unescape_html("Tom &amp; Jerry"), "Tom & Jerry");
/// assert_eq!(unescape_html("Tom &amp;amp; Jerry"), "Tom &amp; Jerry");
/// assert_eq!(unescape_html("AT&T"), "AT&T");
/// ```
pub fn unescape_html(s: &str) -> Cow<'_, str> {
    match decode_once(s) {
        Some(decoded) => Cow::Owned(decoded),
        None => Cow::Borrowed(s),
    }
}

/// One decoding pass. Returns `None` when nothing was decoded.
fn decode_once(s: &str) -> Option<String> {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    let mut changed = false;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];

        let reference = tail[1..]
            .find(';')
            .filter(|&end| end > 0 && end + 2 <= MAX_REFERENCE_LEN)
            .map(|end| &tail[..end + 2])
            .filter(|r| !r[1..r.len() - 1].contains(|c: char| c == '&' || c.is_whitespace()));

        match reference.and_then(|r| decode_html(r).ok().map(|decoded| (r.len(), decoded))) {
            Some((len, decoded)) => {
                out.push_str(&decoded);
                rest = &tail[len..];
                changed = true;
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);

    changed.then_some(out)
}

/// Removes control characters except newline and tab.
///
/// Feed text is printed straight to the terminal by `browse`, so escape
/// sequences embedded in titles must not reach it.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(|c| c.is_control() && c != '\n' && c != '\t') {
        return Cow::Borrowed(s);
    }
    Cow::Owned(
        s.chars()
            .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_borrowed() {
        assert!(matches!(unescape_html("no entities here"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_named_and_numeric_entities() {
        assert_eq!(unescape_html("Fish &amp; Chips"), "Fish & Chips");
        assert_eq!(unescape_html("&lt;b&gt;bold&lt;/b&gt;"), "<b>bold</b>");
        assert_eq!(unescape_html("it&#39;s"), "it's");
        assert_eq!(unescape_html("it&#x27;s"), "it's");
        assert_eq!(unescape_html("&quot;quoted&quot;"), "\"quoted\"");
    }

    #[test]
    fn test_single_pass() {
        assert_eq!(unescape_html("Fish &amp;amp; Chips"), "Fish &amp; Chips");
        assert_eq!(unescape_html("&amp;lt;p&amp;gt;"), "&lt;p&gt;");
    }

    #[test]
    fn test_literal_entity_survives() {
        // `Use &amp;amp;lt; to write &lt;` after XML decoding
        assert_eq!(
            unescape_html("Use &amp;lt; to write <"),
            "Use &lt; to write <"
        );
    }

    #[test]
    fn test_bare_ampersand_preserved() {
        assert_eq!(unescape_html("AT&T"), "AT&T");
        assert_eq!(unescape_html("R&D &amp; more"), "R&D & more");
        assert_eq!(unescape_html("a &bogus; b"), "a &bogus; b");
    }

    #[test]
    fn test_decoded_ampersand_stops() {
        assert_eq!(unescape_html("AT&amp;T"), "AT&T");
    }

    #[test]
    fn test_strip_control_chars() {
        assert_eq!(strip_control_chars("Hello\x1b[31mWorld"), "Hello[31mWorld");
        assert_eq!(strip_control_chars("line1\nline2\tend"), "line1\nline2\tend");
        assert!(matches!(strip_control_chars("clean"), Cow::Borrowed(_)));
    }
}
