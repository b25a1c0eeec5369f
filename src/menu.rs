//! Menus the user walks through and the answers their buttons carry.
//!
//! Every button's callback data is a [`MenuAnswer`] encoded as a small JSON
//! object, e.g. `{"menu":"unit","option":"3"}`. Decoding only accepts the
//! closed set of menu/option pairs below, so anything else coming back from
//! the platform is a [`TokenError::MalformedToken`].

use serde::{Deserialize, Serialize};

/// Number of vocabulary units offered in the unit menu
pub const UNIT_COUNT: u32 = 10;

/// Telegram rejects inline buttons with more callback data than this
pub const CALLBACK_DATA_LIMIT: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("malformed selection token {token:?}: {source}")]
    MalformedToken {
        token: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{found:?} menu answered while {expected:?} menu was expected")]
    Unreachable { expected: Menu, found: Menu },
    #[error("failed to encode selection token: {0}")]
    Encode(#[source] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Menu {
    Main,
    English,
    Vocabulary,
    Math,
    Unit,
    Amount,
    Repeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    English,
    Hebrew,
    Math,
    Combination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnglishChoice {
    Vocabulary,
    Completion,
    Mix,
    Rephrase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VocabularyChoice {
    #[serde(rename = "eng_heb")]
    EnglishToHebrew,
    #[serde(rename = "heb_eng")]
    HebrewToEnglish,
    #[serde(rename = "mixed")]
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MathChoice {
    Algebra,
    Geometry,
    Problem,
    Mix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum UnitChoice {
    All,
    /// Always within `1..=UNIT_COUNT`
    Number(u32),
}

impl UnitChoice {
    /// The bank filter for this choice, `None` meaning every unit
    pub fn unit(&self) -> Option<u32> {
        match self {
            UnitChoice::All => None,
            UnitChoice::Number(n) => Some(*n),
        }
    }
}

impl TryFrom<String> for UnitChoice {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == "all" {
            return Ok(UnitChoice::All);
        }
        match value.parse::<u32>() {
            Ok(n) if (1..=UNIT_COUNT).contains(&n) => Ok(UnitChoice::Number(n)),
            _ => Err(format!("unknown unit {:?}", value)),
        }
    }
}

impl From<UnitChoice> for String {
    fn from(choice: UnitChoice) -> Self {
        match choice {
            UnitChoice::All => "all".to_string(),
            UnitChoice::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Amount {
    #[serde(rename = "1")]
    One,
    #[serde(rename = "5")]
    Five,
    #[serde(rename = "10")]
    Ten,
}

impl Amount {
    pub fn count(&self) -> usize {
        match self {
            Amount::One => 1,
            Amount::Five => 5,
            Amount::Ten => 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatChoice {
    Menu,
    Again,
}

/// A button press: which menu it was on and what was picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "menu", content = "option", rename_all = "snake_case")]
pub enum MenuAnswer {
    Main(Subject),
    English(EnglishChoice),
    Vocabulary(VocabularyChoice),
    Math(MathChoice),
    Unit(UnitChoice),
    Amount(Amount),
    Repeat(RepeatChoice),
}

impl MenuAnswer {
    pub fn menu(&self) -> Menu {
        match self {
            MenuAnswer::Main(_) => Menu::Main,
            MenuAnswer::English(_) => Menu::English,
            MenuAnswer::Vocabulary(_) => Menu::Vocabulary,
            MenuAnswer::Math(_) => Menu::Math,
            MenuAnswer::Unit(_) => Menu::Unit,
            MenuAnswer::Amount(_) => Menu::Amount,
            MenuAnswer::Repeat(_) => Menu::Repeat,
        }
    }

    /// The menu the user is shown after this answer.
    /// Answers that start a quiz lead to the repeat menu.
    pub fn next_menu(&self) -> Menu {
        match self {
            MenuAnswer::Main(Subject::English) => Menu::English,
            MenuAnswer::Main(Subject::Math) => Menu::Math,
            MenuAnswer::Main(Subject::Hebrew) => Menu::Main,
            MenuAnswer::Main(Subject::Combination) => Menu::Repeat,
            MenuAnswer::English(EnglishChoice::Vocabulary) => Menu::Vocabulary,
            MenuAnswer::English(_) => Menu::Amount,
            MenuAnswer::Vocabulary(_) => Menu::Unit,
            MenuAnswer::Math(_) => Menu::Amount,
            MenuAnswer::Unit(_) => Menu::Amount,
            MenuAnswer::Amount(_) => Menu::Repeat,
            MenuAnswer::Repeat(RepeatChoice::Again) => Menu::Repeat,
            MenuAnswer::Repeat(RepeatChoice::Menu) => Menu::Main,
        }
    }

    pub fn encode(&self) -> Result<String, TokenError> {
        serde_json::to_string(self).map_err(TokenError::Encode)
    }

    pub fn decode(token: &str) -> Result<Self, TokenError> {
        serde_json::from_str(token).map_err(|source| TokenError::MalformedToken {
            token: token.to_string(),
            source,
        })
    }
}

pub struct Button {
    pub label: String,
    pub answer: MenuAnswer,
}

impl Button {
    fn new(label: impl Into<String>, answer: MenuAnswer) -> Self {
        Self {
            label: label.into(),
            answer,
        }
    }
}

impl Menu {
    pub const ALL: [Menu; 7] = [
        Menu::Main,
        Menu::English,
        Menu::Vocabulary,
        Menu::Math,
        Menu::Unit,
        Menu::Amount,
        Menu::Repeat,
    ];

    pub fn prompt(&self) -> &'static str {
        match self {
            Menu::Main => "Which subject do you want to learn?",
            Menu::English | Menu::Math => "What do you want to do?",
            Menu::Vocabulary => "Choose the translation direction",
            Menu::Unit => "Please choose a unit:",
            Menu::Amount => "How many questions do you want?",
            Menu::Repeat => "Again or menu?",
        }
    }

    /// Button rows of the menu's keyboard
    pub fn buttons(&self) -> Vec<Vec<Button>> {
        match self {
            Menu::Main => vec![
                vec![Button::new("English", MenuAnswer::Main(Subject::English))],
                vec![
                    Button::new("Hebrew", MenuAnswer::Main(Subject::Hebrew)),
                    Button::new("Math", MenuAnswer::Main(Subject::Math)),
                ],
                vec![Button::new("Everything", MenuAnswer::Main(Subject::Combination))],
            ],
            Menu::English => vec![
                vec![
                    Button::new("Vocabulary", MenuAnswer::English(EnglishChoice::Vocabulary)),
                    Button::new("Sentence completion", MenuAnswer::English(EnglishChoice::Completion)),
                ],
                vec![
                    Button::new("Mix", MenuAnswer::English(EnglishChoice::Mix)),
                    Button::new("Rephrasing", MenuAnswer::English(EnglishChoice::Rephrase)),
                ],
            ],
            Menu::Vocabulary => vec![
                vec![
                    Button::new(
                        "English → Hebrew",
                        MenuAnswer::Vocabulary(VocabularyChoice::EnglishToHebrew),
                    ),
                    Button::new(
                        "Hebrew → English",
                        MenuAnswer::Vocabulary(VocabularyChoice::HebrewToEnglish),
                    ),
                ],
                vec![Button::new(
                    "English ↔ Hebrew",
                    MenuAnswer::Vocabulary(VocabularyChoice::Mixed),
                )],
            ],
            Menu::Math => vec![
                vec![
                    Button::new("Algebra", MenuAnswer::Math(MathChoice::Algebra)),
                    Button::new("Geometry", MenuAnswer::Math(MathChoice::Geometry)),
                ],
                vec![
                    Button::new("Word problems", MenuAnswer::Math(MathChoice::Problem)),
                    Button::new("Mix", MenuAnswer::Math(MathChoice::Mix)),
                ],
            ],
            Menu::Unit => {
                let mut buttons: Vec<Button> = (1..=UNIT_COUNT)
                    .map(|n| Button::new(n.to_string(), MenuAnswer::Unit(UnitChoice::Number(n))))
                    .collect();
                buttons.push(Button::new("All", MenuAnswer::Unit(UnitChoice::All)));

                let mut rows = Vec::new();
                let mut buttons = buttons.into_iter().peekable();
                while buttons.peek().is_some() {
                    rows.push(buttons.by_ref().take(3).collect());
                }
                rows
            }
            Menu::Amount => vec![[Amount::One, Amount::Five, Amount::Ten]
                .into_iter()
                .map(|a| Button::new(a.count().to_string(), MenuAnswer::Amount(a)))
                .collect()],
            Menu::Repeat => vec![
                vec![Button::new("Menu", MenuAnswer::Repeat(RepeatChoice::Menu))],
                vec![Button::new("Again", MenuAnswer::Repeat(RepeatChoice::Again))],
            ],
        }
    }
}
