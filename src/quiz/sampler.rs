use std::collections::{BTreeMap, HashSet, VecDeque};

use rand::seq::{index, SliceRandom};
use rand::Rng;

use crate::quiz::bank::{QuestionBank, QuestionRecord, VocabularyPair};
use crate::quiz::{Category, Direction, ItemKind, Prompt, QuizItem, SampleResult, OPTION_COUNT};

/// How many plain draws are tried before falling back to the one-pair-per-term draw
const UNIQUE_DRAW_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SampleError {
    #[error("not enough {what}: {requested} requested, {available} available")]
    InsufficientData {
        what: String,
        requested: usize,
        available: usize,
    },
}

/// A fully specified quiz round, ready to be sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SampleRequest {
    Built {
        category: Category,
        count: usize,
    },
    Vocabulary {
        /// `None` means every unit
        unit: Option<u32>,
        /// `None` picks a direction for every question separately
        direction: Option<Direction>,
        count: usize,
    },
    /// Completion, both vocabulary directions and rephrase, one draw per question
    EnglishMix { count: usize },
    /// Algebra, geometry and problems, one draw per question
    MathMix { count: usize },
    /// An English mix followed by a math mix of `count_per_subject` questions each
    Combination { count_per_subject: usize },
}

/// One position in a mixed round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Built(Category),
    Vocabulary(Direction),
}

const ENGLISH_MIX_SLOTS: [Slot; 4] = [
    Slot::Built(Category::Completion),
    Slot::Vocabulary(Direction::Forward),
    Slot::Vocabulary(Direction::Reverse),
    Slot::Built(Category::Rephrase),
];

const MATH_MIX_SLOTS: [Slot; 3] = [
    Slot::Built(Category::Algebra),
    Slot::Built(Category::Geometry),
    Slot::Built(Category::Problem),
];

pub fn sample<R: Rng + ?Sized>(
    bank: &QuestionBank,
    request: &SampleRequest,
    rng: &mut R,
) -> Result<SampleResult, SampleError> {
    match *request {
        SampleRequest::Built { category, count } => {
            sample_built_questions(bank, category, count, rng)
        }
        SampleRequest::Vocabulary {
            unit,
            direction: Some(direction),
            count,
        } => sample_vocabulary(bank, unit, count, direction, rng),
        SampleRequest::Vocabulary {
            unit,
            direction: None,
            count,
        } => sample_mixed_vocabulary(bank, unit, count, rng),
        SampleRequest::EnglishMix { count } => sample_full_mix(bank, count, rng),
        SampleRequest::MathMix { count } => sample_math_mix(bank, count, rng),
        SampleRequest::Combination { count_per_subject } => {
            let mut result = sample_full_mix(bank, count_per_subject, rng)?;
            result.extend(sample_math_mix(bank, count_per_subject, rng)?);
            Ok(result)
        }
    }
}

/// Draws `count` distinct records of `category`, keeping their stored answer order.
pub fn sample_built_questions<R: Rng + ?Sized>(
    bank: &QuestionBank,
    category: Category,
    count: usize,
    rng: &mut R,
) -> Result<SampleResult, SampleError> {
    let records = bank.find_by_category(category);
    if count > records.len() {
        return Err(SampleError::InsufficientData {
            what: format!("{:?} questions", category),
            requested: count,
            available: records.len(),
        });
    }

    let items = index::sample(rng, records.len(), count)
        .into_iter()
        .map(|i| built_item(records[i]))
        .collect();
    Ok(SampleResult::new(items))
}

pub fn sample_vocabulary<R: Rng + ?Sized>(
    bank: &QuestionBank,
    unit: Option<u32>,
    count: usize,
    direction: Direction,
    rng: &mut R,
) -> Result<SampleResult, SampleError> {
    let directions = vec![direction; count];
    let items = vocabulary_items(bank, unit, &directions, rng)?;
    Ok(SampleResult::new(items))
}

/// Like `sample_vocabulary`, but each question flips its own coin for the direction.
pub fn sample_mixed_vocabulary<R: Rng + ?Sized>(
    bank: &QuestionBank,
    unit: Option<u32>,
    count: usize,
    rng: &mut R,
) -> Result<SampleResult, SampleError> {
    let directions: Vec<Direction> = (0..count)
        .map(|_| {
            if rng.gen_bool(0.5) {
                Direction::Forward
            } else {
                Direction::Reverse
            }
        })
        .collect();
    let items = vocabulary_items(bank, unit, &directions, rng)?;
    Ok(SampleResult::new(items))
}

/// English questions of every kind; vocabulary is drawn from all units.
pub fn sample_full_mix<R: Rng + ?Sized>(
    bank: &QuestionBank,
    count: usize,
    rng: &mut R,
) -> Result<SampleResult, SampleError> {
    let slots = draw_slots(&ENGLISH_MIX_SLOTS, count, rng);
    fill_slots(bank, &slots, rng)
}

pub fn sample_math_mix<R: Rng + ?Sized>(
    bank: &QuestionBank,
    count: usize,
    rng: &mut R,
) -> Result<SampleResult, SampleError> {
    let slots = draw_slots(&MATH_MIX_SLOTS, count, rng);
    fill_slots(bank, &slots, rng)
}

fn draw_slots<R: Rng + ?Sized>(choices: &[Slot], count: usize, rng: &mut R) -> Vec<Slot> {
    (0..count)
        .map(|_| choices[rng.gen_range(0..choices.len())])
        .collect()
}

// Samples every partition once and hands the items back out in slot order,
// so the result looks exactly like an independent draw per question.
// Empty partitions are never sampled.
fn fill_slots<R: Rng + ?Sized>(
    bank: &QuestionBank,
    slots: &[Slot],
    rng: &mut R,
) -> Result<SampleResult, SampleError> {
    let mut partitions: BTreeMap<Category, usize> = BTreeMap::new();
    let mut directions = Vec::new();
    for slot in slots {
        match *slot {
            Slot::Built(category) => *partitions.entry(category).or_default() += 1,
            Slot::Vocabulary(direction) => directions.push(direction),
        }
    }

    let mut built: BTreeMap<Category, VecDeque<QuizItem>> = BTreeMap::new();
    for (category, count) in partitions {
        let sampled = sample_built_questions(bank, category, count, rng)?;
        built.insert(category, sampled.items.into());
    }
    let mut vocabulary: VecDeque<QuizItem> = if directions.is_empty() {
        VecDeque::new()
    } else {
        vocabulary_items(bank, None, &directions, rng)?.into()
    };

    let items = slots
        .iter()
        .filter_map(|slot| match slot {
            Slot::Built(category) => built.get_mut(category).and_then(VecDeque::pop_front),
            Slot::Vocabulary(_) => vocabulary.pop_front(),
        })
        .collect();
    Ok(SampleResult::new(items))
}

fn built_item(record: &QuestionRecord) -> QuizItem {
    QuizItem {
        kind: ItemKind::Built(record.category),
        prompt: record.prompt.clone(),
        options: record.answers.clone(),
        correct_index: record.correct_index,
        record_id: Some(record.id),
    }
}

/// One question per entry of `directions`, all drawn from a single batch of
/// pairs with pairwise distinct terms on both sides.
fn vocabulary_items<R: Rng + ?Sized>(
    bank: &QuestionBank,
    unit: Option<u32>,
    directions: &[Direction],
    rng: &mut R,
) -> Result<Vec<QuizItem>, SampleError> {
    let pool = bank.find_vocabulary(unit);
    let pairs = draw_distinct_pairs(&pool, directions.len() * OPTION_COUNT, rng).map_err(
        |available| SampleError::InsufficientData {
            what: match unit {
                Some(unit) => format!("distinct vocabulary terms in unit {}", unit),
                None => "distinct vocabulary terms".to_string(),
            },
            requested: directions.len() * OPTION_COUNT,
            available,
        },
    )?;

    let items = pairs
        .chunks_exact(OPTION_COUNT)
        .zip(directions)
        .map(|(group, direction)| vocabulary_item(group, *direction, rng))
        .collect();
    Ok(items)
}

fn vocabulary_item<R: Rng + ?Sized>(
    group: &[&VocabularyPair],
    direction: Direction,
    rng: &mut R,
) -> QuizItem {
    let correct_index = rng.gen_range(0..OPTION_COUNT);
    let (asked, _) = terms(group[correct_index], direction);
    QuizItem {
        kind: ItemKind::Vocabulary(direction),
        prompt: Prompt::Text(asked.to_string()),
        options: std::array::from_fn(|i| terms(group[i], direction).1.to_string()),
        correct_index,
        record_id: None,
    }
}

/// (asked term, answered term)
fn terms(pair: &VocabularyPair, direction: Direction) -> (&str, &str) {
    match direction {
        Direction::Forward => (pair.source.as_str(), pair.target.as_str()),
        Direction::Reverse => (pair.target.as_str(), pair.source.as_str()),
    }
}

/// Draws `needed` pairs whose English terms are pairwise distinct and whose
/// Hebrew terms are pairwise distinct too, so neither a prompt nor a poll
/// option repeats whichever way the questions are asked.
///
/// A few plain draws are tried first; they keep the distribution of the pool
/// (a term that appears in several pairs is proportionally more likely). If all
/// of them collide, the English terms are visited in random order and each
/// contributes one pair whose translation is not taken yet, which cannot
/// collide but flattens that distribution.
///
/// On failure returns how many such pairs could be collected.
fn draw_distinct_pairs<'a, R: Rng + ?Sized>(
    pool: &[&'a VocabularyPair],
    needed: usize,
    rng: &mut R,
) -> Result<Vec<&'a VocabularyPair>, usize> {
    if pool.len() >= needed {
        for attempt in 1..=UNIQUE_DRAW_ATTEMPTS {
            let draw: Vec<&VocabularyPair> = index::sample(rng, pool.len(), needed)
                .into_iter()
                .map(|i| pool[i])
                .collect();
            if all_terms_distinct(&draw) {
                return Ok(draw);
            }
            log::debug!("Vocabulary draw #{} had repeated terms", attempt);
        }
    }

    // BTreeMap keeps the grouping order stable for seeded rngs
    let mut by_term: BTreeMap<&str, Vec<&VocabularyPair>> = BTreeMap::new();
    for pair in pool {
        by_term.entry(pair.source.as_str()).or_default().push(*pair);
    }
    log::debug!(
        "Falling back to one pair per term ({} terms for {} options)",
        by_term.len(),
        needed
    );

    let mut groups: Vec<Vec<&VocabularyPair>> = by_term.into_values().collect();
    groups.shuffle(rng);
    let mut translations: HashSet<&str> = HashSet::new();
    let mut picked = Vec::with_capacity(needed);
    for mut pairs in groups {
        pairs.shuffle(rng);
        if let Some(pair) = pairs
            .into_iter()
            .find(|&pair| translations.insert(pair.target.as_str()))
        {
            picked.push(pair);
            if picked.len() == needed {
                return Ok(picked);
            }
        }
    }
    Err(picked.len())
}

fn all_terms_distinct(pairs: &[&VocabularyPair]) -> bool {
    let sources: HashSet<&str> = pairs.iter().map(|p| p.source.as_str()).collect();
    let targets: HashSet<&str> = pairs.iter().map(|p| p.target.as_str()).collect();
    sources.len() == pairs.len() && targets.len() == pairs.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn record(id: usize, category: Category) -> QuestionRecord {
        QuestionRecord {
            id,
            category,
            unit: None,
            prompt: Prompt::Text(format!("Question {}", id)),
            answers: std::array::from_fn(|i| format!("Answer {}.{}", id, i + 1)),
            correct_index: id % OPTION_COUNT,
        }
    }

    /// 20 records per built category; 12 distinct pairs in units 1 and 2, 10 in unit 3, 20 in unit 4.
    fn bank() -> QuestionBank {
        let categories = [
            Category::Completion,
            Category::Rephrase,
            Category::Algebra,
            Category::Geometry,
            Category::Problem,
        ];
        let questions = categories
            .iter()
            .flat_map(|c| std::iter::repeat(*c).take(20))
            .enumerate()
            .map(|(id, category)| record(id, category))
            .collect();

        let mut vocabulary = Vec::new();
        for unit in 1..=2 {
            for i in 0..12 {
                vocabulary.push(VocabularyPair::new(
                    format!("word{}-{}", unit, i),
                    format!("מילה{}-{}", unit, i),
                    unit,
                ));
            }
        }
        for i in 0..10 {
            vocabulary.push(VocabularyPair::new(format!("word3-{}", i), format!("מילה3-{}", i), 3));
        }
        for i in 0..20 {
            vocabulary.push(VocabularyPair::new(format!("word4-{}", i), format!("מילה4-{}", i), 4));
        }
        QuestionBank::new(questions, vocabulary)
    }

    fn prompt_text(item: &QuizItem) -> &str {
        match &item.prompt {
            Prompt::Text(text) => text,
            Prompt::Image(_) => panic!("expected a text prompt"),
        }
    }

    #[test]
    fn built_questions_are_distinct_records() {
        let bank = bank();
        let mut rng = StdRng::seed_from_u64(7);

        let result = sample_built_questions(&bank, Category::Algebra, 5, &mut rng).unwrap();

        assert_eq!(result.len(), 5);
        let ids: HashSet<usize> = result.items.iter().filter_map(|i| i.record_id).collect();
        assert_eq!(ids.len(), 5);
        for item in &result.items {
            assert_eq!(item.kind, ItemKind::Built(Category::Algebra));
            assert!(item.correct_index < OPTION_COUNT);
            let id = item.record_id.unwrap();
            assert_eq!(item.correct_index, id % OPTION_COUNT);
            assert_eq!(item.options[0], format!("Answer {}.1", id));
        }
    }

    #[test]
    fn built_questions_can_take_the_whole_category() {
        let bank = bank();
        let mut rng = StdRng::seed_from_u64(1);
        let result = sample_built_questions(&bank, Category::Rephrase, 20, &mut rng).unwrap();
        let ids: HashSet<usize> = result.items.iter().filter_map(|i| i.record_id).collect();
        assert_eq!(ids.len(), 20);
    }

    #[test]
    fn built_questions_fail_when_category_is_too_small() {
        let bank = bank();
        let mut rng = StdRng::seed_from_u64(1);
        let err = sample_built_questions(&bank, Category::Geometry, 21, &mut rng).unwrap_err();
        assert_eq!(
            err,
            SampleError::InsufficientData {
                what: "Geometry questions".to_string(),
                requested: 21,
                available: 20,
            }
        );
    }

    #[test]
    fn vocabulary_prompts_and_options_are_distinct() {
        let bank = bank();
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let result = sample_vocabulary(&bank, Some(1), 3, Direction::Forward, &mut rng).unwrap();

            assert_eq!(result.len(), 3);
            let prompts: HashSet<&str> = result.items.iter().map(prompt_text).collect();
            assert_eq!(prompts.len(), 3);
            let options: HashSet<&str> = result
                .items
                .iter()
                .flat_map(|i| i.options.iter().map(String::as_str))
                .collect();
            assert_eq!(options.len(), 12);
        }
    }

    #[test]
    fn forward_vocabulary_asks_english_and_answers_hebrew() {
        let bank = bank();
        let mut rng = StdRng::seed_from_u64(3);
        let result = sample_vocabulary(&bank, Some(2), 2, Direction::Forward, &mut rng).unwrap();
        for item in &result.items {
            let prompt = prompt_text(item);
            assert!(prompt.starts_with("word2-"));
            assert_eq!(item.correct_option(), prompt.replace("word", "מילה"));
        }
    }

    #[test]
    fn reverse_vocabulary_asks_hebrew_and_answers_english() {
        let bank = bank();
        let mut rng = StdRng::seed_from_u64(4);
        let result = sample_vocabulary(&bank, None, 5, Direction::Reverse, &mut rng).unwrap();
        assert_eq!(result.len(), 5);
        for item in &result.items {
            assert_eq!(item.kind, ItemKind::Vocabulary(Direction::Reverse));
            assert_eq!(item.correct_option(), prompt_text(item).replace("מילה", "word"));
            assert!(item.options.iter().all(|o| o.starts_with("word")));
        }
    }

    #[test]
    fn vocabulary_fails_when_unit_is_too_small() {
        let bank = bank();
        let mut rng = StdRng::seed_from_u64(9);
        let err = sample_vocabulary(&bank, Some(3), 3, Direction::Forward, &mut rng).unwrap_err();
        assert_eq!(
            err,
            SampleError::InsufficientData {
                what: "distinct vocabulary terms in unit 3".to_string(),
                requested: 12,
                available: 10,
            }
        );
    }

    #[test]
    fn duplicated_terms_fall_back_to_one_pair_per_term() {
        // 8 distinct terms, each repeated 5 times: plain draws of 8 almost never succeed
        let vocabulary = (0..40)
            .map(|i| VocabularyPair::new(format!("w{}", i % 8), format!("t{}", i % 8), 1))
            .collect();
        let bank = QuestionBank::new(Vec::new(), vocabulary);

        for seed in 0..10 {
            let mut rng = StdRng::seed_from_u64(seed);
            let result = sample_vocabulary(&bank, Some(1), 2, Direction::Forward, &mut rng).unwrap();
            let options: HashSet<&str> = result
                .items
                .iter()
                .flat_map(|i| i.options.iter().map(String::as_str))
                .collect();
            assert_eq!(options.len(), 8);
        }
    }

    /// 16 English words; every two of them share one Hebrew translation
    fn synonym_bank() -> QuestionBank {
        let vocabulary = (0..16)
            .map(|i| VocabularyPair::new(format!("w{}", i), format!("t{}", i / 2), 1))
            .collect();
        QuestionBank::new(Vec::new(), vocabulary)
    }

    #[test]
    fn shared_translations_never_repeat_a_reverse_prompt() {
        let bank = synonym_bank();
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let result = sample_vocabulary(&bank, Some(1), 2, Direction::Reverse, &mut rng).unwrap();
            let prompts: HashSet<&str> = result.items.iter().map(prompt_text).collect();
            assert_eq!(prompts.len(), 2, "seed {}", seed);
        }
    }

    #[test]
    fn shared_translations_never_repeat_a_forward_option() {
        let bank = synonym_bank();
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let result = sample_vocabulary(&bank, Some(1), 2, Direction::Forward, &mut rng).unwrap();
            for item in &result.items {
                let options: HashSet<&str> = item.options.iter().map(String::as_str).collect();
                assert_eq!(options.len(), OPTION_COUNT, "seed {}", seed);
            }
            let all: HashSet<&str> = result
                .items
                .iter()
                .flat_map(|i| i.options.iter().map(String::as_str))
                .collect();
            assert_eq!(all.len(), 8, "seed {}", seed);
        }
    }

    #[test]
    fn shared_translations_count_once_towards_available_terms() {
        // 8 English words but only 4 Hebrew ones
        let vocabulary = (0..8)
            .map(|i| VocabularyPair::new(format!("w{}", i), format!("t{}", i / 2), 1))
            .collect();
        let bank = QuestionBank::new(Vec::new(), vocabulary);
        let mut rng = StdRng::seed_from_u64(0);

        let err = sample_vocabulary(&bank, Some(1), 2, Direction::Reverse, &mut rng).unwrap_err();
        assert_eq!(
            err,
            SampleError::InsufficientData {
                what: "distinct vocabulary terms in unit 1".to_string(),
                requested: 8,
                available: 4,
            }
        );
    }

    #[test]
    fn mixed_vocabulary_uses_both_directions() {
        let bank = bank();
        let mut rng = StdRng::seed_from_u64(11);
        let mut forward = 0;
        let mut reverse = 0;
        for _ in 0..20 {
            let result = sample_mixed_vocabulary(&bank, None, 5, &mut rng).unwrap();
            assert_eq!(result.len(), 5);
            for item in &result.items {
                match item.kind {
                    ItemKind::Vocabulary(Direction::Forward) => forward += 1,
                    ItemKind::Vocabulary(Direction::Reverse) => reverse += 1,
                    ItemKind::Built(_) => panic!("mixed vocabulary returned a built question"),
                }
            }
        }
        assert!(forward > 0 && reverse > 0);
    }

    #[test]
    fn full_mix_returns_requested_amount_of_english_items() {
        let bank = bank();
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let result = sample_full_mix(&bank, 10, &mut rng).unwrap();
            assert_eq!(result.len(), 10);
            for item in &result.items {
                assert!(matches!(
                    item.kind,
                    ItemKind::Built(Category::Completion)
                        | ItemKind::Built(Category::Rephrase)
                        | ItemKind::Vocabulary(_)
                ));
            }
        }
    }

    #[test]
    fn full_mix_skips_empty_partitions() {
        // Rephrase and vocabulary are empty here
        let questions = (0..10).map(|id| record(id, Category::Completion)).collect();
        let bank = QuestionBank::new(questions, Vec::new());
        let slots = vec![Slot::Built(Category::Completion); 4];
        let mut rng = StdRng::seed_from_u64(5);

        let result = fill_slots(&bank, &slots, &mut rng).unwrap();
        assert_eq!(result.len(), 4);
    }

    #[test]
    fn mixed_rounds_keep_slot_order() {
        let bank = bank();
        let slots = [
            Slot::Vocabulary(Direction::Reverse),
            Slot::Built(Category::Problem),
            Slot::Vocabulary(Direction::Forward),
            Slot::Built(Category::Completion),
        ];
        let mut rng = StdRng::seed_from_u64(2);

        let result = fill_slots(&bank, &slots, &mut rng).unwrap();
        let kinds: Vec<ItemKind> = result.items.iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ItemKind::Vocabulary(Direction::Reverse),
                ItemKind::Built(Category::Problem),
                ItemKind::Vocabulary(Direction::Forward),
                ItemKind::Built(Category::Completion),
            ]
        );
    }

    #[test]
    fn math_mix_only_returns_math() {
        let bank = bank();
        let mut rng = StdRng::seed_from_u64(13);
        let result = sample_math_mix(&bank, 10, &mut rng).unwrap();
        assert_eq!(result.len(), 10);
        assert!(result
            .items
            .iter()
            .all(|i| matches!(i.kind, ItemKind::Built(c) if c.is_math())));
    }

    #[test]
    fn combination_is_english_then_math() {
        let bank = bank();
        let mut rng = StdRng::seed_from_u64(17);
        let request = SampleRequest::Combination {
            count_per_subject: 5,
        };
        let result = sample(&bank, &request, &mut rng).unwrap();
        assert_eq!(result.len(), 10);
        assert!(result.items[..5]
            .iter()
            .all(|i| !matches!(i.kind, ItemKind::Built(c) if c.is_math())));
        assert!(result.items[5..]
            .iter()
            .all(|i| matches!(i.kind, ItemKind::Built(c) if c.is_math())));
    }
}
