use std::io::Read;
use std::path::{Path, PathBuf};

use crate::quiz::{Category, Prompt, OPTION_COUNT};

pub const BUILT_QUESTIONS_FILE: &str = "eng_built_questions.csv";
pub const VOCABULARY_FILE: &str = "word_voc.csv";
pub const MATH_QUESTIONS_FILE: &str = "math_built_questions.csv";

/// Math questions are images, their options are just the ordinals
const MATH_OPTIONS: [&str; OPTION_COUNT] = ["1", "2", "3", "4"];

#[derive(Debug, thiserror::Error)]
pub enum BankError {
    #[error("question bank collection '{collection}' is unavailable: {source}")]
    DataUnavailable {
        collection: &'static str,
        #[source]
        source: csv::Error,
    },
    #[error("invalid record #{row} in '{collection}': {reason}")]
    InvalidRecord {
        collection: &'static str,
        row: usize,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionRecord {
    pub id: usize,
    pub category: Category,
    pub unit: Option<u32>,
    pub prompt: Prompt,
    pub answers: [String; OPTION_COUNT],
    pub correct_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VocabularyPair {
    /// English term
    pub source: String,
    /// Hebrew term
    pub target: String,
    pub unit: u32,
}

impl VocabularyPair {
    pub fn new(source: impl Into<String>, target: impl Into<String>, unit: u32) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            unit,
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct BuiltQuestionRow {
    #[serde(rename = "type")]
    category: Category,
    question: String,
    answer1: String,
    answer2: String,
    answer3: String,
    answer4: String,
    correct_answer: usize,
}

#[derive(Debug, serde::Deserialize)]
struct VocabularyRow {
    unit: u32,
    english: String,
    hebrew: String,
}

#[derive(Debug, serde::Deserialize)]
struct MathQuestionRow {
    #[serde(rename = "type")]
    category: Category,
    question_dir: PathBuf,
    correct_answer: usize,
}

/// Read-only view over every question the bot can ask.
/// Loaded once at startup and shared between all sessions without locking.
#[derive(Debug, Clone, Default)]
pub struct QuestionBank {
    questions: Vec<QuestionRecord>,
    vocabulary: Vec<VocabularyPair>,
}

impl QuestionBank {
    pub fn new(questions: Vec<QuestionRecord>, vocabulary: Vec<VocabularyPair>) -> Self {
        Self {
            questions,
            vocabulary,
        }
    }

    /// Loads the three CSV collections from `dir`.
    /// Image paths of the math questions are resolved against the same directory.
    pub fn load(dir: &Path) -> Result<Self, BankError> {
        let open = |collection: &'static str| {
            csv::Reader::from_path(dir.join(collection))
                .map_err(|source| BankError::DataUnavailable { collection, source })
        };
        let built = open(BUILT_QUESTIONS_FILE)?;
        let vocabulary = open(VOCABULARY_FILE)?;
        let math = open(MATH_QUESTIONS_FILE)?;

        Self::from_readers(built, vocabulary, math, dir)
    }

    pub fn from_readers<B: Read, V: Read, M: Read>(
        mut built: csv::Reader<B>,
        mut vocabulary: csv::Reader<V>,
        mut math: csv::Reader<M>,
        asset_dir: &Path,
    ) -> Result<Self, BankError> {
        let mut questions = Vec::new();

        for (row, result) in built.deserialize::<BuiltQuestionRow>().enumerate() {
            let record = result.map_err(|source| BankError::DataUnavailable {
                collection: BUILT_QUESTIONS_FILE,
                source,
            })?;
            if record.category.is_math() {
                return Err(BankError::InvalidRecord {
                    collection: BUILT_QUESTIONS_FILE,
                    row: row + 1,
                    reason: format!("{:?} is not an English question type", record.category),
                });
            }
            let correct_index = to_correct_index(record.correct_answer, BUILT_QUESTIONS_FILE, row)?;
            questions.push(QuestionRecord {
                id: questions.len(),
                category: record.category,
                unit: None,
                prompt: Prompt::Text(record.question),
                answers: [record.answer1, record.answer2, record.answer3, record.answer4],
                correct_index,
            });
        }

        for (row, result) in math.deserialize::<MathQuestionRow>().enumerate() {
            let record = result.map_err(|source| BankError::DataUnavailable {
                collection: MATH_QUESTIONS_FILE,
                source,
            })?;
            if !record.category.is_math() {
                return Err(BankError::InvalidRecord {
                    collection: MATH_QUESTIONS_FILE,
                    row: row + 1,
                    reason: format!("{:?} is not a math question type", record.category),
                });
            }
            let correct_index = to_correct_index(record.correct_answer, MATH_QUESTIONS_FILE, row)?;
            questions.push(QuestionRecord {
                id: questions.len(),
                category: record.category,
                unit: None,
                prompt: Prompt::Image(asset_dir.join(record.question_dir)),
                answers: MATH_OPTIONS.map(String::from),
                correct_index,
            });
        }

        let vocabulary = vocabulary
            .deserialize::<VocabularyRow>()
            .map(|result| {
                result
                    .map(|row| VocabularyPair::new(row.english.trim(), row.hebrew.trim(), row.unit))
                    .map_err(|source| BankError::DataUnavailable {
                        collection: VOCABULARY_FILE,
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(questions, vocabulary))
    }

    pub fn find_by_category(&self, category: Category) -> Vec<&QuestionRecord> {
        self.questions
            .iter()
            .filter(|q| q.category == category)
            .collect()
    }

    /// `None` means every unit
    pub fn find_vocabulary(&self, unit: Option<u32>) -> Vec<&VocabularyPair> {
        self.vocabulary
            .iter()
            .filter(|pair| unit.map_or(true, |unit| pair.unit == unit))
            .collect()
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    pub fn vocabulary_count(&self) -> usize {
        self.vocabulary.len()
    }
}

// Ordinals are 1-based in the data files
fn to_correct_index(ordinal: usize, collection: &'static str, row: usize) -> Result<usize, BankError> {
    if (1..=OPTION_COUNT).contains(&ordinal) {
        return Ok(ordinal - 1);
    }
    Err(BankError::InvalidRecord {
        collection,
        row: row + 1,
        reason: format!("correct answer must be between 1 and {}, got {}", OPTION_COUNT, ordinal),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUILT: &str = "type,question,answer1,answer2,answer3,answer4,correct_answer
eng_com,The cat ___ on the mat.,sit,sits,sitting,sat,2
eng_rephrase,He rarely smiles.,He smiles often.,He seldom smiles.,He never smiles.,He always smiles.,2
";
    const VOCABULARY: &str = "unit,english,hebrew
1,dog,כלב
1, cat ,חתול
2,house,בית
";
    const MATH: &str = "type,question_dir,correct_answer
math_alg,img/alg1.png,4
math_geo,img/geo1.png,1
";

    fn reader(data: &str) -> csv::Reader<&[u8]> {
        csv::Reader::from_reader(data.as_bytes())
    }

    #[test]
    fn loads_all_collections() {
        let bank = QuestionBank::from_readers(
            reader(BUILT),
            reader(VOCABULARY),
            reader(MATH),
            Path::new("DATA"),
        )
        .unwrap();

        assert_eq!(bank.question_count(), 4);
        assert_eq!(bank.vocabulary_count(), 3);

        let completion = bank.find_by_category(Category::Completion);
        assert_eq!(completion.len(), 1);
        assert_eq!(completion[0].correct_index, 1);
        assert_eq!(completion[0].answers[1], "sits");

        let algebra = bank.find_by_category(Category::Algebra);
        assert_eq!(algebra[0].correct_index, 3);
        assert_eq!(algebra[0].prompt, Prompt::Image(PathBuf::from("DATA/img/alg1.png")));
        assert_eq!(algebra[0].answers, MATH_OPTIONS.map(String::from));
    }

    #[test]
    fn record_ids_are_unique() {
        let bank = QuestionBank::from_readers(
            reader(BUILT),
            reader(VOCABULARY),
            reader(MATH),
            Path::new("."),
        )
        .unwrap();
        let ids: Vec<usize> = bank.questions.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
    }

    #[test]
    fn vocabulary_filters_by_unit() {
        let bank = QuestionBank::from_readers(
            reader(BUILT),
            reader(VOCABULARY),
            reader(MATH),
            Path::new("."),
        )
        .unwrap();

        let unit_one = bank.find_vocabulary(Some(1));
        assert_eq!(unit_one.len(), 2);
        assert_eq!(unit_one[1].source, "cat");
        assert_eq!(bank.find_vocabulary(None).len(), 3);
        assert!(bank.find_vocabulary(Some(7)).is_empty());
    }

    #[test]
    fn rejects_out_of_range_ordinal() {
        let built = "type,question,answer1,answer2,answer3,answer4,correct_answer
eng_com,Q,a,b,c,d,5
";
        let err = QuestionBank::from_readers(
            reader(built),
            reader(VOCABULARY),
            reader(MATH),
            Path::new("."),
        )
        .unwrap_err();
        assert!(matches!(err, BankError::InvalidRecord { row: 1, .. }));
    }

    #[test]
    fn rejects_unknown_category() {
        let built = "type,question,answer1,answer2,answer3,answer4,correct_answer
eng_poetry,Q,a,b,c,d,1
";
        let err = QuestionBank::from_readers(
            reader(built),
            reader(VOCABULARY),
            reader(MATH),
            Path::new("."),
        )
        .unwrap_err();
        assert!(matches!(err, BankError::DataUnavailable { collection: BUILT_QUESTIONS_FILE, .. }));
    }

    #[test]
    fn missing_directory_is_unavailable() {
        let err = QuestionBank::load(Path::new("/definitely/not/a/bank")).unwrap_err();
        assert!(matches!(err, BankError::DataUnavailable { .. }));
    }
}
