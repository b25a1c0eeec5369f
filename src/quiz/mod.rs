pub mod bank;
pub mod sampler;

use std::path::PathBuf;

/// Every quiz item is shown with exactly this many options.
pub const OPTION_COUNT: usize = 4;

/// Partition of the built question collections. The serde names are the
/// `type` tags used in the CSV files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum Category {
    #[serde(rename = "eng_com")]
    Completion,
    #[serde(rename = "eng_rephrase")]
    Rephrase,
    #[serde(rename = "math_alg")]
    Algebra,
    #[serde(rename = "math_geo")]
    Geometry,
    #[serde(rename = "math_prob")]
    Problem,
}

impl Category {
    pub fn is_math(&self) -> bool {
        matches!(self, Category::Algebra | Category::Geometry | Category::Problem)
    }
}

/// Translation direction of a vocabulary question.
/// `Forward` asks for the Hebrew translation of an English word, `Reverse` the other way around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Direction {
    Forward,
    Reverse,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Prompt {
    Text(String),
    /// Path to an image with the question drawn on it
    Image(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Built(Category),
    Vocabulary(Direction),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizItem {
    pub kind: ItemKind,
    pub prompt: Prompt,
    pub options: [String; OPTION_COUNT],
    /// Zero-based, always below `OPTION_COUNT`
    pub correct_index: usize,
    /// Id of the bank record the item was built from; vocabulary items mix several pairs and have none
    pub record_id: Option<usize>,
}

impl QuizItem {
    pub fn correct_option(&self) -> &str {
        &self.options[self.correct_index]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleResult {
    pub items: Vec<QuizItem>,
}

impl SampleResult {
    pub fn new(items: Vec<QuizItem>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn extend(&mut self, other: SampleResult) {
        self.items.extend(other.items);
    }
}
