//! Maps HTML element names to the roles the extractor cares about.

use html5ever::LocalName;

/// What an element means to page extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Transparent block wrapper. Children are walked directly.
    Container,
    /// `h1`..`h6`. Only 2..=6 open a section.
    Heading(u8),
    /// Block of running text.
    Paragraph,
    List { ordered: bool },
    ListItem,
    Table,
    TableRow,
    TableCell,
    Image,
    Break,
    /// Bold emphasis, kept as a placeholder run.
    Strong,
    /// Any other inline element. Text is kept, styling is dropped.
    Inline,
    /// Never contributes text.
    Ignored,
}

impl Role {
    pub fn is_block(self) -> bool {
        !matches!(self, Role::Strong | Role::Inline | Role::Break)
    }
}

/// Map an HTML element name to its extraction role.
pub fn element_to_role(local_name: &LocalName) -> Role {
    match local_name.as_ref() {
        "html" | "body" | "div" | "section" | "article" | "nav" | "header" | "footer"
        | "main" | "aside" | "address" | "details" | "summary" | "hgroup" | "blockquote"
        | "figure" | "center" | "dl" | "dd" | "dt" | "form" | "fieldset" | "thead"
        | "tbody" | "tfoot" | "colgroup" => Role::Container,

        "h1" => Role::Heading(1),
        "h2" => Role::Heading(2),
        "h3" => Role::Heading(3),
        "h4" => Role::Heading(4),
        "h5" => Role::Heading(5),
        "h6" => Role::Heading(6),

        "p" | "pre" | "figcaption" | "caption" => Role::Paragraph,

        "ul" | "menu" => Role::List { ordered: false },
        "ol" => Role::List { ordered: true },
        "li" => Role::ListItem,

        "table" => Role::Table,
        "tr" => Role::TableRow,
        "td" | "th" => Role::TableCell,

        "img" => Role::Image,
        "br" => Role::Break,
        "strong" | "b" => Role::Strong,

        "head" | "title" | "script" | "style" | "template" | "noscript" | "iframe"
        | "object" | "svg" | "math" | "hr" | "col" | "meta" | "link" | "input"
        | "button" | "select" | "textarea" => Role::Ignored,

        _ => Role::Inline,
    }
}
