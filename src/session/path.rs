use crate::menu::{Menu, MenuAnswer, TokenError};

/// The answers given during one walk through the menus, oldest first.
///
/// Every entry must answer the menu its predecessor leads to (see
/// [`MenuAnswer::next_menu`]); an empty path expects the main menu.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SelectionPath {
    entries: Vec<MenuAnswer>,
}

impl SelectionPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[MenuAnswer] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// The menu the next answer has to come from
    pub fn expected_menu(&self) -> Menu {
        self.entries
            .last()
            .map_or(Menu::Main, |answer| answer.next_menu())
    }

    pub fn push(&mut self, answer: MenuAnswer) -> Result<(), TokenError> {
        let expected = self.expected_menu();
        if answer.menu() != expected {
            return Err(TokenError::Unreachable {
                expected,
                found: answer.menu(),
            });
        }
        self.entries.push(answer);
        Ok(())
    }

    /// Most recent answer given on `menu`
    pub fn latest(&self, menu: Menu) -> Option<MenuAnswer> {
        self.entries.iter().rev().find(|a| a.menu() == menu).copied()
    }

    /// Drops the latest answer on `menu` and everything after it, so that
    /// `menu` is expected again.
    pub fn rewind_to(&mut self, menu: Menu) {
        if let Some(position) = self.entries.iter().rposition(|a| a.menu() == menu) {
            self.entries.truncate(position);
        }
    }

    pub fn encode(&self) -> Result<String, TokenError> {
        serde_json::to_string(&self.entries).map_err(TokenError::Encode)
    }

    /// Parses a token made by [`SelectionPath::encode`], checking every entry
    /// against the menu graph.
    pub fn decode(token: &str) -> Result<Self, TokenError> {
        let entries: Vec<MenuAnswer> =
            serde_json::from_str(token).map_err(|source| TokenError::MalformedToken {
                token: token.to_string(),
                source,
            })?;

        let mut path = Self::new();
        for answer in entries {
            path.push(answer)?;
        }
        Ok(path)
    }
}
