//! Core data model: extracted test blocks and the corpus that holds the
//! unique survivors.

use serde::Serialize;
use uuid::Uuid;

/// Rough intent of a test, inferred from its declared name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestKind {
    Normal,
    Edge,
    Error,
}

/// Name fragments that mark a test as exercising a failure path.
const ERROR_WORDS: &[&str] = &[
    "error", "fail", "throw", "raise", "invalid", "exception", "panic", "reject",
];

const EDGE_WORDS: &[&str] = &[
    "edge", "boundary", "empty", "zero", "null", "none", "negative", "max", "min",
    "overflow", "limit", "large",
];

impl TestKind {
    /// Classify from a declared test name. Error wins over edge when a name
    /// mentions both, since preserving failure semantics matters more.
    pub fn classify(name: &str) -> Self {
        let lower = name.to_lowercase();
        if ERROR_WORDS.iter().any(|w| lower.contains(w)) {
            TestKind::Error
        } else if EDGE_WORDS.iter().any(|w| lower.contains(w)) {
            TestKind::Edge
        } else {
            TestKind::Normal
        }
    }
}

/// One extracted test: declaration through closing punctuation.
#[derive(Debug, Clone, Serialize)]
pub struct TestBlock {
    pub id: Uuid,
    /// Declared name: the quoted title for Jest, the function or method name
    /// for Python and Java.
    pub name: String,
    /// Body text between the opening delimiter and the close.
    pub body: String,
    /// The complete block as it appeared in the source, declaration included.
    pub full_text: String,
    pub kind: TestKind,
}

impl TestBlock {
    pub fn new(name: impl Into<String>, body: impl Into<String>, full_text: impl Into<String>) -> Self {
        let name = name.into();
        let kind = TestKind::classify(&name);
        TestBlock {
            id: Uuid::new_v4(),
            name,
            body: body.into(),
            full_text: full_text.into(),
            kind,
        }
    }

    /// A variation keeps its source's kind rather than re-classifying, so an
    /// error test stays an error test even after renaming.
    pub fn variant_of(source: &TestBlock, name: String, body: String, full_text: String) -> Self {
        TestBlock {
            id: Uuid::new_v4(),
            name,
            body,
            full_text,
            kind: source.kind,
        }
    }

    /// Case-insensitive trimmed name, the key for exact duplicate detection.
    pub fn exact_signature(&self) -> String {
        self.name.trim().to_lowercase()
    }

    /// Aggressively normalized name for fuzzy matching: lowercased with
    /// underscores, hyphens, and all whitespace removed, so `test_add`,
    /// `testAdd`, and `Test Add` collapse to the same key.
    pub fn fuzzy_signature(&self) -> String {
        normalize_fuzzy(&self.name)
    }
}

pub fn normalize_fuzzy(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Ordered set of unique test blocks. Blocks only ever enter through
/// [`crate::dedupe::absorb`] and only ever leave through an explicit
/// [`Corpus::truncate_to`].
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    blocks: Vec<TestBlock>,
}

impl Corpus {
    pub fn new() -> Self {
        Corpus::default()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[TestBlock] {
        &self.blocks
    }

    pub fn names(&self) -> Vec<String> {
        self.blocks.iter().map(|b| b.name.clone()).collect()
    }

    pub fn contains_exact(&self, signature: &str) -> bool {
        self.blocks.iter().any(|b| b.exact_signature() == signature)
    }

    /// Append a block that has already passed duplicate screening.
    pub(crate) fn push(&mut self, block: TestBlock) {
        self.blocks.push(block);
    }

    /// Drop blocks beyond `target`, preserving insertion order. The only way
    /// the corpus ever shrinks.
    pub fn truncate_to(&mut self, target: usize) {
        self.blocks.truncate(target);
    }

    pub fn into_blocks(self) -> Vec<TestBlock> {
        self.blocks
    }
}
