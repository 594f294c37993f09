//! Entity codecs: text representation of aliases and functions.
//!
//! A codec turns one entity into a block of shell source and finds every
//! block it recognizes in a file. Decoding works on the file split into
//! lines (terminators included), and each decoded entity carries the line
//! range it came from so the store can splice edits without touching
//! anything else.

pub mod alias;
pub mod function;
pub mod patterns;
pub mod scan;

use std::fmt;
use std::ops::Range;

use crate::error::Result;
use crate::model::EntityKind;

pub use alias::AliasCodec;
pub use function::FunctionCodec;

/// An entity found in a file, with the half-open line range it occupies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded<E> {
    pub entity: E,
    pub span: Range<usize>,
}

/// Encoding and decoding of one entity kind.
pub trait Codec {
    type Entity: Clone + PartialEq + fmt::Debug;

    const KIND: EntityKind;

    fn name(entity: &Self::Entity) -> &str;

    /// Reject entities whose encoding would not decode back to themselves.
    fn validate(entity: &Self::Entity) -> Result<()>;

    /// Encode as a block of whole lines, ending with `\n`.
    fn encode(entity: &Self::Entity) -> String;

    /// Every recognized entity in file order. Lines that are not part of an
    /// entity are skipped.
    fn decode_all(lines: &[&str]) -> Vec<Decoded<Self::Entity>>;
}

/// Split into lines, keeping terminators so that joining is lossless.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.split_inclusive('\n').collect()
}

pub(crate) fn strip_eol(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// Decode a whole text. Convenience for callers that do not edit spans.
pub fn decode_text<C: Codec>(text: &str) -> Vec<C::Entity> {
    C::decode_all(&split_lines(text))
        .into_iter()
        .map(|decoded| decoded.entity)
        .collect()
}
