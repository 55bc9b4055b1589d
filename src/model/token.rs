use crate::error::PrepError;
use crate::util::write_json;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Start of a measure.
    Marker,
    Value,
}

/// A tokenizer output, resolved once into its kind and vocabulary id.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub id: u32,
}

impl Token {
    pub fn marker(id: u32) -> Self {
        Self {
            kind: TokenKind::Marker,
            id,
        }
    }

    pub fn value(id: u32) -> Self {
        Self {
            kind: TokenKind::Value,
            id,
        }
    }

    pub fn is_marker(&self) -> bool {
        self.kind == TokenKind::Marker
    }
}

/// The ordered token ids a tokenizer produced for one track.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TokenSequence {
    ids: Vec<u32>,
}

impl TokenSequence {
    pub fn from_tokens(tokens: &[Token]) -> Self {
        Self {
            ids: tokens.iter().map(|t| t.id).collect(),
        }
    }

    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn into_ids(self) -> Vec<u32> {
        self.ids
    }
}

impl From<Vec<u32>> for TokenSequence {
    fn from(ids: Vec<u32>) -> Self {
        Self { ids }
    }
}

/// A contiguous window of token ids, written out as one training record.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub tokens: Vec<u32>,
    pub length: usize,
}

impl Chunk {
    pub fn new(tokens: &[u32]) -> Self {
        Self {
            tokens: tokens.to_vec(),
            length: tokens.len(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), PrepError> {
        write_json(self, path)
    }
}
