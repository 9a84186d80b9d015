//! Journal export → journal tree.
//!
//! [`extract_page`] turns one page's markup into a preface and headings.
//! [`extract_journals`] turns a whole export payload into [`Journal`] values,
//! resolving and loading image assets on the way.

mod assets;
mod journal;
mod model;
mod page;

pub use assets::resolve_asset;
pub use journal::{
    DEFAULT_JOURNAL_TITLE, ExtractContext, extract_journals, is_manifest, manifest_files,
    parse_journal,
};
pub use model::{ContentBlock, Heading, ImageAsset, ImageBlock, Journal, Page, PageContent};
pub use page::{SYNTHETIC_HEADING, UNTITLED, extract_page, heading_key};
