pub mod path;

use std::future::Future;

use rand::Rng;
use teloxide::dispatching::dialogue::{Dialogue, ErasedStorage};

use crate::menu::{
    Amount, EnglishChoice, MathChoice, Menu, MenuAnswer, RepeatChoice, Subject, TokenError,
    UnitChoice, VocabularyChoice,
};
use crate::quiz::bank::QuestionBank;
use crate::quiz::sampler::{self, SampleError, SampleRequest};
use crate::quiz::{Category, Direction, QuizItem, SampleResult};
use path::SelectionPath;

/// Questions per subject in an "everything" round, which never asks for an amount
pub const COMBINATION_AMOUNT: usize = 10;

const UNAVAILABLE_TEXT: &str = "Sorry, this option is currently unavailable. Try another option";
const COMBINATION_SHORT_TEXT: &str =
    "Sorry, the question bank cannot fill a combined round right now. Try another option";
const INCOMPLETE_TEXT: &str =
    "You didn't select a needed option, start again and be careful not to skip any of the menus";

pub type SessionDialogue = Dialogue<UserSession, ErasedStorage<UserSession>>;
pub type SessionStorage = std::sync::Arc<ErasedStorage<UserSession>>;
pub type StorageError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("the selection is incomplete")]
    IncompleteSelection,
    #[error(transparent)]
    Sampling(#[from] SampleError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum State {
    #[default]
    Idle,
    AwaitingSubject,
    AwaitingQuestionType,
    AwaitingDirection,
    AwaitingUnit,
    AwaitingAmount,
    /// Everything needed for a round is known
    Ready,
    AwaitingRepeatChoice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum QuestionType {
    Completion,
    Rephrase,
    EnglishMix,
    VocabularyForward,
    VocabularyReverse,
    VocabularyMixed,
    Algebra,
    Geometry,
    Problem,
    MathMix,
    FullMix,
}

impl From<VocabularyChoice> for QuestionType {
    fn from(choice: VocabularyChoice) -> Self {
        match choice {
            VocabularyChoice::EnglishToHebrew => QuestionType::VocabularyForward,
            VocabularyChoice::HebrewToEnglish => QuestionType::VocabularyReverse,
            VocabularyChoice::Mixed => QuestionType::VocabularyMixed,
        }
    }
}

impl From<MathChoice> for QuestionType {
    fn from(choice: MathChoice) -> Self {
        match choice {
            MathChoice::Algebra => QuestionType::Algebra,
            MathChoice::Geometry => QuestionType::Geometry,
            MathChoice::Problem => QuestionType::Problem,
            MathChoice::Mix => QuestionType::MathMix,
        }
    }
}

/// What the state machine wants to happen after an answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Show(Menu),
    Notice(&'static str, Menu),
    /// The session is `Ready`, sample a round
    Dispatch,
}

/// Something to send back to the user, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Notice(String),
    Menu(Menu),
    Quiz(QuizItem),
}

/// Per-chat selection state.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct UserSession {
    pub state: State,
    pub subject: Option<Subject>,
    pub question_type: Option<QuestionType>,
    pub unit: Option<UnitChoice>,
    pub amount: Option<Amount>,
    pub path: SelectionPath,
}

impl UserSession {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn open_main_menu(&mut self) -> Vec<Reply> {
        self.reset();
        self.state = State::AwaitingSubject;
        vec![Reply::Menu(Menu::Main)]
    }

    /// Applies a raw callback token. Tokens that do not decode reset the
    /// session and bring back the main menu.
    pub fn apply_choice(&mut self, token: &str) -> Step {
        match MenuAnswer::decode(token) {
            Ok(answer) => self.apply_answer(answer),
            Err(err) => {
                log::warn!("{}", err);
                self.reset();
                Step::Show(Menu::Main)
            }
        }
    }

    pub fn apply_answer(&mut self, answer: MenuAnswer) -> Step {
        // The main menu can be answered at any point and starts a new path
        if let MenuAnswer::Main(subject) = answer {
            self.reset();
            self.subject = Some(subject);
            return match self.path.push(answer) {
                Ok(()) => self.choose_subject(subject),
                Err(err) => self.fail_soft(err),
            };
        }

        if let Err(err) = self.path.push(answer) {
            return self.fail_soft(err);
        }

        let step = match (self.state, answer) {
            (State::AwaitingQuestionType, MenuAnswer::English(EnglishChoice::Vocabulary)) => {
                self.state = State::AwaitingDirection;
                Step::Show(Menu::Vocabulary)
            }
            (State::AwaitingQuestionType, MenuAnswer::English(EnglishChoice::Completion)) => {
                self.ask_amount(QuestionType::Completion)
            }
            (State::AwaitingQuestionType, MenuAnswer::English(EnglishChoice::Mix)) => {
                self.ask_amount(QuestionType::EnglishMix)
            }
            (State::AwaitingQuestionType, MenuAnswer::English(EnglishChoice::Rephrase)) => {
                self.ask_amount(QuestionType::Rephrase)
            }
            (State::AwaitingQuestionType, MenuAnswer::Math(choice)) => {
                self.ask_amount(choice.into())
            }
            (State::AwaitingDirection, MenuAnswer::Vocabulary(choice)) => {
                self.question_type = Some(choice.into());
                self.state = State::AwaitingUnit;
                Step::Show(Menu::Unit)
            }
            (State::AwaitingUnit, MenuAnswer::Unit(unit)) => {
                self.unit = Some(unit);
                self.state = State::AwaitingAmount;
                Step::Show(Menu::Amount)
            }
            (State::AwaitingAmount, MenuAnswer::Amount(amount)) => {
                self.amount = Some(amount);
                self.state = State::Ready;
                Step::Dispatch
            }
            (State::AwaitingRepeatChoice, MenuAnswer::Repeat(RepeatChoice::Menu)) => {
                self.reset();
                Step::Show(Menu::Main)
            }
            (State::AwaitingRepeatChoice, MenuAnswer::Repeat(RepeatChoice::Again)) => {
                self.state = State::Ready;
                Step::Dispatch
            }
            (state, answer) => {
                log::warn!("Unexpected {:?} while {:?}, starting over", answer, state);
                self.reset();
                Step::Show(Menu::Main)
            }
        };
        log::debug!("{:?} -> {:?}", answer, self.state);
        step
    }

    fn choose_subject(&mut self, subject: Subject) -> Step {
        match subject {
            Subject::English => {
                self.state = State::AwaitingQuestionType;
                Step::Show(Menu::English)
            }
            Subject::Math => {
                self.state = State::AwaitingQuestionType;
                Step::Show(Menu::Math)
            }
            Subject::Hebrew => {
                self.state = State::Idle;
                Step::Notice(UNAVAILABLE_TEXT, Menu::Main)
            }
            Subject::Combination => {
                self.question_type = Some(QuestionType::FullMix);
                self.state = State::Ready;
                Step::Dispatch
            }
        }
    }

    fn ask_amount(&mut self, question_type: QuestionType) -> Step {
        self.question_type = Some(question_type);
        self.state = State::AwaitingAmount;
        Step::Show(Menu::Amount)
    }

    fn fail_soft(&mut self, err: TokenError) -> Step {
        log::warn!("{}, starting over", err);
        self.reset();
        Step::Show(Menu::Main)
    }

    /// The round described by the current selection
    pub fn sample_request(&self) -> Result<SampleRequest, DispatchError> {
        let (Some(_), Some(question_type)) = (self.subject, self.question_type) else {
            return Err(DispatchError::IncompleteSelection);
        };
        let count = || {
            self.amount
                .map(|amount| amount.count())
                .ok_or(DispatchError::IncompleteSelection)
        };
        let unit = || {
            self.unit
                .map(|unit| unit.unit())
                .ok_or(DispatchError::IncompleteSelection)
        };
        let built = |category: Category| -> Result<SampleRequest, DispatchError> {
            Ok(SampleRequest::Built {
                category,
                count: count()?,
            })
        };

        let request = match question_type {
            QuestionType::Completion => built(Category::Completion)?,
            QuestionType::Rephrase => built(Category::Rephrase)?,
            QuestionType::Algebra => built(Category::Algebra)?,
            QuestionType::Geometry => built(Category::Geometry)?,
            QuestionType::Problem => built(Category::Problem)?,
            QuestionType::EnglishMix => SampleRequest::EnglishMix { count: count()? },
            QuestionType::MathMix => SampleRequest::MathMix { count: count()? },
            QuestionType::VocabularyForward => SampleRequest::Vocabulary {
                unit: unit()?,
                direction: Some(Direction::Forward),
                count: count()?,
            },
            QuestionType::VocabularyReverse => SampleRequest::Vocabulary {
                unit: unit()?,
                direction: Some(Direction::Reverse),
                count: count()?,
            },
            QuestionType::VocabularyMixed => SampleRequest::Vocabulary {
                unit: unit()?,
                direction: None,
                count: count()?,
            },
            QuestionType::FullMix => SampleRequest::Combination {
                count_per_subject: COMBINATION_AMOUNT,
            },
        };
        Ok(request)
    }

    /// Samples the round of a `Ready` session.
    ///
    /// On success the session waits for the repeat choice. When the bank is
    /// too small the amount is dropped and asked for again, keeping the rest
    /// of the selection. An incomplete selection resets the session.
    pub fn dispatch<R: Rng + ?Sized>(
        &mut self,
        bank: &QuestionBank,
        rng: &mut R,
    ) -> Result<SampleResult, DispatchError> {
        let request = match self.state {
            State::Ready => self.sample_request(),
            _ => Err(DispatchError::IncompleteSelection),
        };
        let request = match request {
            Ok(request) => request,
            Err(err) => {
                log::warn!("Dispatch refused: {:?}", self);
                self.reset();
                return Err(err);
            }
        };

        log::debug!("Sampling {:?}", request);
        match sampler::sample(bank, &request, rng) {
            Ok(result) => {
                self.state = State::AwaitingRepeatChoice;
                Ok(result)
            }
            Err(err) => {
                log::warn!("{}", err);
                if self.subject == Some(Subject::Combination) {
                    self.reset();
                } else {
                    self.amount = None;
                    self.state = State::AwaitingAmount;
                    self.path.rewind_to(Menu::Amount);
                }
                Err(err.into())
            }
        }
    }

    /// Applies `token` and runs the resulting round, if any.
    pub fn respond<R: Rng + ?Sized>(
        &mut self,
        token: &str,
        bank: &QuestionBank,
        rng: &mut R,
    ) -> Vec<Reply> {
        let step = self.apply_choice(token);
        let combination = self.subject == Some(Subject::Combination);
        match step {
            Step::Show(menu) => vec![Reply::Menu(menu)],
            Step::Notice(text, menu) => vec![Reply::Notice(text.to_string()), Reply::Menu(menu)],
            Step::Dispatch => match self.dispatch(bank, rng) {
                Ok(result) => result
                    .items
                    .into_iter()
                    .map(Reply::Quiz)
                    .chain(std::iter::once(Reply::Menu(Menu::Repeat)))
                    .collect(),
                Err(DispatchError::IncompleteSelection) => vec![
                    Reply::Notice(INCOMPLETE_TEXT.to_string()),
                    Reply::Menu(Menu::Main),
                ],
                // There is no amount to shrink, the session is back at the main menu
                Err(DispatchError::Sampling(err)) if combination => {
                    log::warn!("Combined round unavailable: {}", err);
                    vec![
                        Reply::Notice(COMBINATION_SHORT_TEXT.to_string()),
                        Reply::Menu(Menu::Main),
                    ]
                }
                Err(DispatchError::Sampling(err)) => vec![
                    Reply::Notice(format!(
                        "Sorry, there are not enough questions for that ({}). Try a smaller amount.",
                        err
                    )),
                    Reply::Menu(self.path.expected_menu()),
                ],
            },
        }
    }
}

/// Runs one button press against the chat's stored session.
///
/// The dispatcher feeds updates of one chat one at a time, so the
/// read-modify-write below never interleaves for the same session.
pub async fn handle_choice<R: Rng + ?Sized>(
    dialogue: &SessionDialogue,
    token: &str,
    bank: &QuestionBank,
    rng: &mut R,
) -> Result<Vec<Reply>, StorageError> {
    let mut session = dialogue.get_or_default().await?;
    let replies = session.respond(token, bank, rng);
    dialogue.update(session).await?;
    Ok(replies)
}

pub async fn handle_text(dialogue: &SessionDialogue) -> Result<Vec<Reply>, StorageError> {
    let mut session = dialogue.get_or_default().await?;
    let replies = session.open_main_menu();
    dialogue.update(session).await?;
    Ok(replies)
}

/// Sends every reply in order through `send`. A reply that fails is logged
/// and skipped, so the rest of the round and the menu after it still go out.
///
/// Returns how many replies could not be sent.
pub async fn deliver<F, Fut, E>(replies: Vec<Reply>, mut send: F) -> usize
where
    F: FnMut(Reply) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    let mut failed = 0;
    for (i, reply) in replies.into_iter().enumerate() {
        if let Err(err) = send(reply).await {
            log::error!("Failed to send reply #{}: {}", i + 1, err);
            failed += 1;
        }
    }
    failed
}
