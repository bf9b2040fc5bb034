#![forbid(unsafe_code)]

//! XML Canonicalization (C14N) over the sigtuna document model.
//!
//! Implements the W3C canonicalization variants XML-DSig signatures use:
//! - Canonical XML 1.0 (with and without comments)
//! - Canonical XML 1.1 (with and without comments)
//! - Exclusive Canonical XML 1.0 (with and without comments)

pub mod exclusive;
pub mod inclusive;
pub mod render;

use sigtuna_core::{algorithm, Error};
use sigtuna_xml::{Document, NodeSet};

/// Which canonicalization variant a Transform or CanonicalizationMethod names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum C14nMode {
    Inclusive,
    InclusiveWithComments,
    Inclusive11,
    Inclusive11WithComments,
    Exclusive,
    ExclusiveWithComments,
}

// (mode, uri, keeps comments), in declaration order
const MODES: [(C14nMode, &str, bool); 6] = [
    (C14nMode::Inclusive, algorithm::C14N, false),
    (C14nMode::InclusiveWithComments, algorithm::C14N_WITH_COMMENTS, true),
    (C14nMode::Inclusive11, algorithm::C14N11, false),
    (C14nMode::Inclusive11WithComments, algorithm::C14N11_WITH_COMMENTS, true),
    (C14nMode::Exclusive, algorithm::EXC_C14N, false),
    (C14nMode::ExclusiveWithComments, algorithm::EXC_C14N_WITH_COMMENTS, true),
];

impl C14nMode {
    fn entry(self) -> &'static (C14nMode, &'static str, bool) {
        // rows follow declaration order
        &MODES[self as usize]
    }

    pub fn uri(&self) -> &'static str {
        self.entry().1
    }

    /// Looks up the mode for an algorithm URI; `None` for anything that is
    /// not one of the six canonicalization URIs.
    pub fn from_uri(uri: &str) -> Option<Self> {
        MODES
            .iter()
            .find(|(_, known, _)| *known == uri)
            .map(|(mode, _, _)| *mode)
    }

    pub fn with_comments(&self) -> bool {
        self.entry().2
    }

    pub fn is_exclusive(&self) -> bool {
        matches!(self, Self::Exclusive | Self::ExclusiveWithComments)
    }
}

/// Canonicalize a document, or the subset of it selected by `node_set`.
///
/// `inclusive_prefixes` is the InclusiveNamespaces PrefixList and is only
/// consulted by the exclusive variants.
pub fn canonicalize(
    doc: &Document,
    mode: C14nMode,
    node_set: Option<&NodeSet>,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>, Error> {
    match mode {
        C14nMode::Inclusive | C14nMode::InclusiveWithComments => {
            inclusive::canonicalize(doc, mode.with_comments(), node_set)
        }
        C14nMode::Inclusive11 | C14nMode::Inclusive11WithComments => {
            inclusive::canonicalize_11(doc, mode.with_comments(), node_set)
        }
        C14nMode::Exclusive | C14nMode::ExclusiveWithComments => {
            exclusive::canonicalize(doc, mode.with_comments(), node_set, inclusive_prefixes)
        }
    }
}

/// Convenience: parse XML text and canonicalize the whole document.
pub fn canonicalize_text(
    xml: &str,
    mode: C14nMode,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>, Error> {
    let doc = Document::parse(xml)?;
    canonicalize(&doc, mode, None, inclusive_prefixes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_table_is_consistent() {
        for (mode, uri, _) in MODES {
            assert_eq!(mode.uri(), uri);
            assert_eq!(C14nMode::from_uri(uri), Some(mode));
        }
        assert_eq!(C14nMode::from_uri("urn:nope"), None);
        assert!(C14nMode::ExclusiveWithComments.with_comments());
        assert!(!C14nMode::Exclusive.with_comments());
    }
}
