use std::sync::Arc;

use dotenv::dotenv;
use rand::{rngs::StdRng, SeedableRng};
use teloxide::{
    dispatching::dialogue::{ErasedStorage, InMemStorage, Storage},
    prelude::*,
    types::{InlineKeyboardButton, InlineKeyboardMarkup, InputFile, PollType},
};

use psychometric_bot::config::Config;
use psychometric_bot::menu::{Menu, TokenError};
use psychometric_bot::quiz::{bank::QuestionBank, ItemKind, Prompt, QuizItem, OPTION_COUNT};
use psychometric_bot::session::{self, Reply, SessionDialogue, SessionStorage, UserSession};

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[tokio::main]
async fn main() {
    // The variables may just as well come from the real environment
    dotenv().ok();

    pretty_env_logger::init();
    log::info!("Starting psychometric bot...");

    let config = Config::from_env();

    log::info!("Loading the question bank from {}", config.bank_dir.display());
    let bank = match QuestionBank::load(&config.bank_dir) {
        Ok(bank) => Arc::new(bank),
        Err(err) => {
            log::error!("Cannot start without the question bank: {}", err);
            std::process::exit(1);
        }
    };
    log::info!(
        "Question bank loaded: {} questions, {} vocabulary pairs",
        bank.question_count(),
        bank.vocabulary_count()
    );

    let bot = Bot::from_env();
    let storage: SessionStorage = InMemStorage::<UserSession>::new().erase();

    // Updates of one chat are handled one after another, different chats run concurrently
    Dispatcher::builder(
        bot,
        dptree::entry()
            .branch(
                Update::filter_message()
                    .enter_dialogue::<Message, ErasedStorage<UserSession>, UserSession>()
                    .endpoint(on_text_message),
            )
            // Queries without a message carry no chat and never reach the endpoint
            .branch(
                Update::filter_callback_query()
                    .enter_dialogue::<CallbackQuery, ErasedStorage<UserSession>, UserSession>()
                    .endpoint(on_menu_choice),
            ),
    )
    .dependencies(dptree::deps![storage, bank])
    .enable_ctrlc_handler()
    .build()
    .dispatch()
    .await;
}

const GREETING_TEXT: &str = "Hello!\nWelcome to the Psychometric Bot!";
async fn on_text_message(bot: Bot, dialogue: SessionDialogue, msg: Message) -> HandlerResult {
    if msg.text() == Some("/start") {
        bot.send_message(msg.chat.id, GREETING_TEXT).await?;
    }

    let replies = session::handle_text(&dialogue).await?;
    send_replies(&bot, dialogue.chat_id(), replies).await;
    Ok(())
}

async fn on_menu_choice(
    bot: Bot,
    dialogue: SessionDialogue,
    bank: Arc<QuestionBank>,
    q: CallbackQuery,
) -> HandlerResult {
    // Only stops the spinner on the button, nothing depends on it
    if let Err(err) = bot.answer_callback_query(q.id.clone()).await {
        log::warn!("Failed to answer callback query: {}", err);
    }

    let token = q.data.as_deref().unwrap_or_default();

    let mut rng = StdRng::from_entropy();
    let replies = session::handle_choice(&dialogue, token, &bank, &mut rng).await?;
    send_replies(&bot, dialogue.chat_id(), replies).await;
    Ok(())
}

// The session is already stored at this point, so one rejected message must
// not keep the rest (and the next menu) from the user
async fn send_replies(bot: &Bot, chat_id: ChatId, replies: Vec<Reply>) {
    let failed = session::deliver(replies, |reply| send_reply(bot, chat_id, reply)).await;
    if failed > 0 {
        log::warn!("{} replies to chat {} were not delivered", failed, chat_id.0);
    }
}

async fn send_reply(bot: &Bot, chat_id: ChatId, reply: Reply) -> HandlerResult {
    match reply {
        Reply::Notice(text) => {
            bot.send_message(chat_id, text).await?;
        }
        Reply::Menu(menu) => render_menu(bot, chat_id, menu).await?,
        Reply::Quiz(item) => send_quiz_item(bot, chat_id, &item).await?,
    }
    Ok(())
}

async fn render_menu(bot: &Bot, chat_id: ChatId, menu: Menu) -> HandlerResult {
    let keyboard = menu
        .buttons()
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|button| {
                    let data = button.answer.encode()?;
                    Ok(InlineKeyboardButton::callback(button.label, data))
                })
                .collect::<Result<Vec<_>, TokenError>>()
        })
        .collect::<Result<Vec<_>, _>>()?;

    bot.send_message(chat_id, menu.prompt())
        .reply_markup(InlineKeyboardMarkup::new(keyboard))
        .await?;
    Ok(())
}

const TRANSLATION_QUESTION: &str = "Choose the correct translation of the word:";
const NUMBERED_QUESTION: &str = "Choose the correct answer";
async fn send_quiz_item(bot: &Bot, chat_id: ChatId, item: &QuizItem) -> HandlerResult {
    match (&item.kind, &item.prompt) {
        // Short enough to fit into the poll itself
        (ItemKind::Vocabulary(_), Prompt::Text(term)) => {
            let question = format!("{}\n{}", TRANSLATION_QUESTION, term);
            return send_quiz_poll(bot, chat_id, question, item.options.to_vec(), item.correct_index)
                .await;
        }
        // Sentences can be longer than poll options allow, so they are listed
        // in a message and the poll only carries their numbers
        (_, Prompt::Text(text)) => {
            let answers = item
                .options
                .iter()
                .enumerate()
                .map(|(i, option)| format!(" {}: {}", i + 1, option))
                .collect::<Vec<_>>()
                .join("\n\n");
            bot.send_message(chat_id, format!("Question:\n{}\n\nAnswers:\n\n{}", text, answers))
                .await?;
        }
        (_, Prompt::Image(path)) => {
            bot.send_photo(chat_id, InputFile::file(path.clone())).await?;
        }
    }

    let numbers = (1..=OPTION_COUNT).map(|n| n.to_string()).collect();
    send_quiz_poll(bot, chat_id, NUMBERED_QUESTION.to_string(), numbers, item.correct_index).await
}

async fn send_quiz_poll(
    bot: &Bot,
    chat_id: ChatId,
    question: String,
    options: Vec<String>,
    correct_index: usize,
) -> HandlerResult {
    bot.send_poll(chat_id, question, options)
        .type_(PollType::Quiz)
        .correct_option_id(u8::try_from(correct_index)?)
        .is_anonymous(false)
        .await?;
    Ok(())
}
