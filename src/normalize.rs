//! Rewrites tool-specific link and embed markup into readable text.
//!
//! Journal exports carry two kinds of cross-reference markup: inline macros
//! in the raw text (`@UUID[Actor.abc]{Grak}`, `@Embed[...]`) and rendered
//! `content-link` elements. Both become a bold placeholder
//! `[[B]][label][[/B]]` so the reader sees what was linked instead of a gap.
//!
//! Normalization never fails. Markup that does not match is left in place.

use std::sync::LazyLock;

use log::debug;
use regex::{Captures, Regex};

use crate::dom::{ArenaDom, NodeId, parse_html, serialize_children};
use crate::error::Error;

/// Opening marker of a bold run in extracted text.
pub const BOLD_OPEN: &str = "[[B]]";
/// Closing marker of a bold run in extracted text.
pub const BOLD_CLOSE: &str = "[[/B]]";
/// Inserted into marker sequences that appear literally in the source so they
/// are not read as bold markers. Dropped again when text is rendered.
pub const MARKER_ESCAPE: char = '\u{E000}';
/// Label used when a link carries no usable text.
pub const LINKED_CONTENT: &str = "Linked Content";

/// `@Embed[... readaloud="text" ...]`, with plain or entity-encoded quotes.
static EMBED_READALOUD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"@Embed\[[^\[\]]*?readaloud=(?:"([^"]*)"|&quot;(.*?)&quot;)[^\[\]]*\]"#).unwrap()
});

/// Any other `@Embed[...]`.
static EMBED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@Embed\[[^\[\]]*\]").unwrap());

/// `@Type[target]{label}`.
static LABELED_MACRO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@[A-Za-z]+\[[^\[\]]*\]\{([^}]*)\}").unwrap());

/// `@Type[target]` without a label.
static BARE_MACRO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@[A-Za-z]+\[[^\[\]]*\]").unwrap());

/// A macro opener that survived the rewrite because its bracket never closed.
static UNCLOSED_MACRO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@[A-Za-z]+\[[^\[\]]*").unwrap());

/// A whole placeholder, used to avoid wrapping one twice.
static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[\[B\]\]\[(.*)\]\[\[/B\]\]$").unwrap());

/// Attributes that may name a link target, in order of preference.
const LABEL_ATTRS: &[&str] = &[
    "data-name",
    "data-label",
    "data-tooltip",
    "data-tooltip-content",
    "data-document-name",
    "aria-label",
    "title",
];

const ID_ATTRS: &[&str] = &["data-uuid", "data-document-uuid", "data-id"];

/// Wrap a label in bold placeholder markers.
pub fn placeholder(label: &str) -> String {
    let label = PLACEHOLDER_RE
        .captures(label)
        .and_then(|c| c.get(1))
        .map_or(label, |m| m.as_str());
    format!("{BOLD_OPEN}[{label}]{BOLD_CLOSE}")
}

/// Collapse whitespace runs (including non-breaking spaces) to one space and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Escape literal `[[B]]`/`[[/B]]` in source text.
pub fn escape_markers(text: &str) -> String {
    text.replace(BOLD_OPEN, &format!("[[{MARKER_ESCAPE}B]]"))
        .replace(BOLD_CLOSE, &format!("[[{MARKER_ESCAPE}/B]]"))
}

/// Remove the escapes added by [`escape_markers`].
pub fn unescape_markers(text: &str) -> String {
    text.replace(MARKER_ESCAPE, "")
}

/// Plain display text for a journal or page name: macros become their labels
/// without bold markers.
pub fn normalize_title(raw: &str) -> String {
    let rewritten = rewrite_inline_macros(&escape_markers(raw));
    collapse_whitespace(&rewritten.replace(BOLD_OPEN, "").replace(BOLD_CLOSE, ""))
}

/// Normalize a page's markup and return it re-serialized.
pub fn normalize_markup(html: &str) -> String {
    let dom = normalize_to_dom(html);
    serialize_children(&dom, dom.body())
}

/// Normalize a page's markup and return the parsed tree.
pub fn normalize_to_dom(html: &str) -> ArenaDom {
    let rewritten = rewrite_inline_macros(html);
    let mut dom = parse_html(&rewritten);
    let body = dom.body();
    replace_content_links(&mut dom, body);
    dom
}

/// Regex pass over the raw markup.
pub fn rewrite_inline_macros(html: &str) -> String {
    let s = EMBED_READALOUD_RE.replace_all(html, |caps: &Captures| {
        caps.get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    });
    let s = EMBED_RE.replace_all(&s, "");
    let s = LABELED_MACRO_RE.replace_all(&s, |caps: &Captures| {
        let label = caps.get(1).map_or("", |m| m.as_str()).trim();
        if label.is_empty() {
            placeholder(LINKED_CONTENT)
        } else {
            placeholder(label)
        }
    });
    let s = BARE_MACRO_RE.replace_all(&s, placeholder(LINKED_CONTENT).as_str());

    for m in UNCLOSED_MACRO_RE.find_iter(&s) {
        debug!("{}", Error::NormalizationFallback(m.as_str().to_string()));
    }

    s.into_owned()
}

/// Element pass: swap `content-link`/`entity-link` anchors and spans for placeholders.
pub fn replace_content_links(dom: &mut ArenaDom, parent: NodeId) {
    let children: Vec<NodeId> = dom.children(parent).collect();
    for child in children {
        if is_content_link(dom, child) {
            let label = link_label(dom, child);
            dom.replace_with_text(child, placeholder(&label));
        } else if dom.is_element(child) {
            replace_content_links(dom, child);
        }
    }
}

fn is_content_link(dom: &ArenaDom, id: NodeId) -> bool {
    matches!(dom.tag(id), "a" | "span")
        && (dom.has_class(id, "content-link") || dom.has_class(id, "entity-link"))
}

/// Best available label for a link element.
fn link_label(dom: &ArenaDom, id: NodeId) -> String {
    let visible = collapse_whitespace(&dom.deep_text(id));
    if !visible.is_empty() {
        return visible;
    }

    let attr = |name: &str| {
        dom.get_attr(id, name)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(label) = LABEL_ATTRS.iter().find_map(|name| attr(name)) {
        return label.to_string();
    }

    // Documents are addressed like `Compendium.pack.Item.id`; the tail is the id.
    if let Some(uuid) = ID_ATTRS.iter().find_map(|name| attr(name)) {
        let tail = uuid.rsplit('.').next().unwrap_or("").trim();
        if !tail.is_empty() {
            return tail.to_string();
        }
    }

    attr("data-pack")
        .or_else(|| attr("data-type"))
        .or_else(|| attr("data-document"))
        .unwrap_or(LINKED_CONTENT)
        .to_string()
}
