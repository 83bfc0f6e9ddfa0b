//! Rich-text flattening shared by all site adapters.
//!
//! Article bodies arrive as HTML fragments full of captions, embeds and
//! scripts. [`format_text`] turns such a fragment into plain text:
//!
//! 1. elements matching the adapter's noise selectors (and scripts, styles,
//!    media) are dropped with their content
//! 2. `<br>` becomes a newline
//! 3. paragraph-level elements start on a new line
//! 4. blank lines are collapsed and the result is trimmed
//!
//! Entities are decoded by the HTML parser, so the output holds plain
//! characters.

use crate::error::{Error, Result};
use itertools::Itertools;
use scraper::{ElementRef, Node, Selector};

/// Elements that never carry article text.
const NON_CONTENT: &[&str] = &[
    "script", "style", "noscript", "iframe", "figure", "figcaption", "img", "picture", "video",
    "audio", "svg", "form",
];

const PARAGRAPHS: &[&str] = &["p", "h1", "h2", "h3", "h4", "h5", "h6", "li"];

/// Compile a CSS selector, reporting the offending text on failure.
pub fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|_| Error::Selector(css.to_string()))
}

pub fn selectors(css: &[&str]) -> Result<Vec<Selector>> {
    css.iter().map(|c| selector(c)).collect()
}

/// Flatten an HTML fragment into plain text.
pub fn format_text(element: ElementRef<'_>, noise: &[Selector]) -> String {
    let mut out = String::new();
    flatten(element, noise, &mut out);
    collapse_newlines(&out)
}

/// Format a body and an optional lead, joining them into one text.
pub fn format_article(body: ElementRef<'_>, lead: Option<ElementRef<'_>>, noise: &[Selector]) -> String {
    let body = format_text(body, noise);
    let lead = lead.map(|l| format_text(l, noise)).unwrap_or_default();
    join_lead(&lead, &body)
}

/// Prepend a lead paragraph to the body.
///
/// An empty lead is dropped; otherwise it is joined with `". "`, or a single
/// space when it already ends in a period.
pub fn join_lead(lead: &str, body: &str) -> String {
    if lead.is_empty() {
        return body.to_string();
    }
    let joined = if lead.ends_with('.') {
        format!("{lead} {body}")
    } else {
        format!("{lead}. {body}")
    };
    joined.trim_end().to_string()
}

/// Trim every line, drop blank ones and strip the ends.
///
/// Applying it twice gives the same result as applying it once.
pub fn collapse_newlines(text: &str) -> String {
    text.split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .join("\n")
}

/// Plain text of an element, whitespace runs folded to single spaces.
pub fn inline_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().split_whitespace().join(" ")
}

/// Like [`inline_text`], ignoring descendants that match `skip`.
pub fn inline_text_without(element: ElementRef<'_>, skip: &[Selector]) -> String {
    let mut out = String::new();
    flatten(element, skip, &mut out);
    out.split_whitespace().join(" ")
}

fn flatten(element: ElementRef<'_>, noise: &[Selector], out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let Some(child) = ElementRef::wrap(child) else {
                    continue;
                };
                let name = el.name();
                if NON_CONTENT.contains(&name) || noise.iter().any(|s| s.matches(&child)) {
                    continue;
                }
                if name == "br" {
                    out.push('\n');
                    continue;
                }
                if PARAGRAPHS.contains(&name) {
                    out.push('\n');
                }
                flatten(child, noise, out);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn format_html(html: &str, noise: &[&str]) -> String {
        let fragment = Html::parse_fragment(html);
        format_text(fragment.root_element(), &selectors(noise).unwrap())
    }

    #[test]
    fn test_paragraphs_and_breaks() {
        let html = "<div><p>Prvi pasus.</p>\n   <p>Drugi<br>red</p><p></p><p>Treći &amp; zadnji</p></div>";
        assert_eq!(format_html(html, &[]), "Prvi pasus.\nDrugi\nred\nTreći & zadnji");
    }

    #[test]
    fn test_noise_is_removed() {
        let html = r#"<div>
            <script>var x = 1;</script>
            <p>Tekst <span class="caption-title">Foto: Beta</span>članka.</p>
            <div class="caption-title">Foto: Tanjug</div>
            <figure><img src="a.jpg"><figcaption>Opis</figcaption></figure>
            <p>Kraj.</p>
        </div>"#;
        assert_eq!(format_html(html, &[".caption-title"]), "Tekst članka.\nKraj.");
    }

    #[test]
    fn test_format_is_idempotent() {
        let html = "<p>Jedan &amp;lt;b&amp;gt;</p><p>  Dva  </p>\n\n\n<p>Tri &amp; pol</p><br><br>";
        let once = format_html(html, &[]);
        assert_eq!(once, "Jedan &lt;b&gt;\nDva\nTri & pol");
        // feed the text back as text, so entity-looking output is not decoded again
        let twice = format_html(&quick_xml::escape::escape(once.as_str()), &[]);
        assert_eq!(twice, once);
        assert_eq!(collapse_newlines(&once), once);
    }

    #[test]
    fn test_collapse_newlines() {
        assert_eq!(collapse_newlines("\n\n a \n \n\n b\n"), "a\nb");
        assert_eq!(collapse_newlines(""), "");
    }

    #[test]
    fn test_join_lead() {
        assert_eq!(join_lead("", "Body"), "Body");
        assert_eq!(join_lead("Lead", "Body"), "Lead. Body");
        assert_eq!(join_lead("Lead.", "Body"), "Lead. Body");
        assert_eq!(join_lead("Lead", ""), "Lead.");
    }

    #[test]
    fn test_format_article_with_lead() {
        let doc = Html::parse_document(
            r#"<div class="lead"><p>Uvod</p></div><div class="body"><p>Tekst.</p><p>Još.</p></div>"#,
        );
        let body = doc.select(&selector("div.body").unwrap()).next().unwrap();
        let lead = doc.select(&selector("div.lead").unwrap()).next();
        assert_eq!(format_article(body, lead, &[]), "Uvod. Tekst.\nJoš.");
    }

    #[test]
    fn test_inline_text_without() {
        let doc = Html::parse_fragment("<h2><span>VIDEO</span> Naslov   vesti </h2>");
        let h2 = doc.select(&selector("h2").unwrap()).next().unwrap();
        assert_eq!(inline_text(h2), "VIDEO Naslov vesti");
        assert_eq!(inline_text_without(h2, &selectors(&["span"]).unwrap()), "Naslov vesti");
    }

    #[test]
    fn test_bad_selector_is_an_error() {
        assert!(matches!(selector("div[["), Err(Error::Selector(_))));
    }
}
