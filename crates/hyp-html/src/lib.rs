//! hyp HTML Parser
//!
//! HTML5 parsing built on html5ever, converted into `hyp-dom` trees.
//! Provides whole-document parsing and detached fragment parsing (used by
//! the swap executor and the out-of-band processor).

mod parser;

pub use parser::{Fragment, HtmlParser};

use hyp_dom::Document;

/// Parse an HTML string into a document
pub fn parse(html: &str) -> Document {
    HtmlParser::new().parse(html)
}

/// Parse an HTML string into a document with a base URL
pub fn parse_with_url(html: &str, url: &str) -> Document {
    HtmlParser::new().parse_with_url(html, url)
}

/// Parse a markup fragment into a detached tree
pub fn parse_fragment(html: &str) -> Fragment {
    HtmlParser::new().parse_fragment(html)
}
