//! Lenient HTML parsing into an arena DOM.
//!
//! Journal page markup comes from a rich-text editor and is rarely well formed.
//! html5ever applies the browser recovery rules, so unclosed tags and odd
//! nesting still produce a usable tree.

mod arena;
mod role_map;
mod serialize;
mod tree_sink;

use html5ever::driver::ParseOpts;
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;

pub use arena::{ArenaDom, Attribute, Children, Node, NodeData, NodeId};
pub use role_map::{Role, element_to_role};
pub use serialize::{escape_html, serialize_children};
pub use tree_sink::ArenaSink;

/// Parse an HTML fragment or document. Never fails.
pub fn parse_html(html: &str) -> ArenaDom {
    let sink = ArenaSink::new();
    parse_document(sink, ParseOpts::default())
        .from_utf8()
        .one(html.as_bytes())
        .into_dom()
}

impl ArenaDom {
    /// Extraction role of an element, `None` for text and other nodes.
    pub fn role(&self, id: NodeId) -> Option<Role> {
        self.element_name(id).map(element_to_role)
    }
}
