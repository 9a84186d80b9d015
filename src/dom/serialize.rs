//! Serialize an [`ArenaDom`] subtree back to HTML markup.

use super::arena::{ArenaDom, NodeData, NodeId};

/// Elements that never have children or a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Elements whose text is written without escaping.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes", "plaintext",
];

/// Escape text for inclusion in markup.
pub fn escape_html(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#39;"),
            _ => result.push(c),
        }
    }
    result
}

/// Serialize the children of `parent` (the node itself is not written).
pub fn serialize_children(dom: &ArenaDom, parent: NodeId) -> String {
    let mut out = String::new();
    for child in dom.children(parent) {
        write_node(dom, child, false, &mut out);
    }
    out
}

fn write_node(dom: &ArenaDom, id: NodeId, raw_text: bool, out: &mut String) {
    let Some(node) = dom.get(id) else {
        return;
    };

    match &node.data {
        NodeData::Document => {
            for child in dom.children(id) {
                write_node(dom, child, false, out);
            }
        }
        NodeData::Text(text) if raw_text => out.push_str(text),
        NodeData::Text(text) => out.push_str(&escape_html(text)),
        NodeData::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        NodeData::Doctype => {}
        NodeData::Element { name, attrs, .. } => {
            let tag = name.local.as_ref();
            out.push('<');
            out.push_str(tag);
            for attr in attrs {
                out.push(' ');
                out.push_str(attr.name.local.as_ref());
                out.push_str("=\"");
                out.push_str(&escape_html(&attr.value));
                out.push('"');
            }
            out.push('>');

            if VOID_ELEMENTS.contains(&tag) {
                return;
            }

            let raw = RAW_TEXT_ELEMENTS.contains(&tag);
            for child in dom.children(id) {
                write_node(dom, child, raw, out);
            }

            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
    }
}
