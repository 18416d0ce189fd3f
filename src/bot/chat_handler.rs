use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::menu::Menu;
use crate::outputs::{Origin, PinState};
use crate::sync::SyncHandle;

const GREETING: &str = "Піни перепризначено! Керуй.";
const FAILURE: &str = "Помилка зв'язку";
const START_COMMAND: &str = "/start";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatReply {
    /// Answer to `/start`, sent together with the menu keyboard
    Greeting,
    Toggled { name: String, state: PinState },
    Failure,
}

impl ChatReply {
    pub fn text(&self) -> String {
        match self {
            ChatReply::Greeting => GREETING.to_string(),
            ChatReply::Toggled { name, state } => {
                let status = if state.is_on() {
                    "УВІМКНЕНО 💡"
                } else {
                    "ВИМКНЕНО 🌑"
                };
                format!("{}: {}", name, status)
            }
            ChatReply::Failure => FAILURE.to_string(),
        }
    }

    pub fn shows_menu(&self) -> bool {
        matches!(self, ChatReply::Greeting)
    }
}

/// Decides what to do with one chat message
///
/// Messages from users outside the allow-list get no reply at all, so the bot
/// stays invisible to them.
pub struct ChatHandler {
    allowed_users: HashSet<u64>,
    menu: Menu,
    sync: SyncHandle,
}

impl ChatHandler {
    pub fn new(allowed_users: impl IntoIterator<Item = u64>, menu: Menu, sync: SyncHandle) -> Self {
        let allowed_users: HashSet<u64> = allowed_users.into_iter().collect();
        if allowed_users.is_empty() {
            warn!("Telegram allow-list is empty, every chat message will be ignored");
        }
        Self {
            allowed_users,
            menu,
            sync,
        }
    }

    pub fn is_allowed(&self, user_id: u64) -> bool {
        self.allowed_users.contains(&user_id)
    }

    pub fn menu(&self) -> &Menu {
        &self.menu
    }

    pub async fn handle(&self, user_id: Option<u64>, text: Option<&str>) -> Option<ChatReply> {
        let Some(user_id) = user_id.filter(|id| self.is_allowed(*id)) else {
            info!("Ignoring message from unauthorized user {:?}", user_id);
            return None;
        };
        let text = text?;

        if is_start_command(text) {
            debug!("Start command from user {}", user_id);
            return Some(ChatReply::Greeting);
        }

        let Some(entry) = self.menu.lookup(text) else {
            debug!("No menu entry for {:?}", text);
            return None;
        };

        match self.sync.toggle(entry.pin, Origin::Chat).await {
            Ok(applied) => Some(ChatReply::Toggled {
                name: entry.name.clone(),
                state: applied.state,
            }),
            Err(e) => {
                warn!("User {} failed to toggle {}: {}", user_id, entry.name, e);
                Some(ChatReply::Failure)
            }
        }
    }
}

/// Accepts `/start`, `/start@botname` and `/start` with arguments
fn is_start_command(text: &str) -> bool {
    let Some(command) = text.split_whitespace().next() else {
        return false;
    };
    command == START_COMMAND
        || command
            .strip_prefix(START_COMMAND)
            .is_some_and(|rest| rest.starts_with('@'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::outputs::{Origin, OutputCommand, Pin};
    use crate::sync::testing::{spawn_handle, DriverProbe, MockDriver, RecordingSink};

    const OWNER: u64 = 1001;
    const STRANGER: u64 = 666;

    fn handler(driver: MockDriver) -> (ChatHandler, SyncHandle) {
        let (sync, _shutdown, _task) = spawn_handle(driver, Some(RecordingSink::new()));
        let menu = Menu::from_outputs(&AppConfig::default().outputs);
        (ChatHandler::new([OWNER], menu, sync.clone()), sync)
    }

    fn open_handler() -> (ChatHandler, SyncHandle, DriverProbe) {
        let (driver, probe) = MockDriver::open();
        let (handler, sync) = handler(driver);
        (handler, sync, probe)
    }

    #[tokio::test]
    async fn start_greets_allowed_user_with_menu() {
        let (handler, _sync, _probe) = open_handler();
        for text in ["/start", "/start@light_bot", "/start now"] {
            let reply = handler.handle(Some(OWNER), Some(text)).await.unwrap();
            assert_eq!(reply, ChatReply::Greeting);
            assert!(reply.shows_menu());
            assert_eq!(reply.text(), "Піни перепризначено! Керуй.");
        }
        assert!(handler.handle(Some(OWNER), Some("/started")).await.is_none());
    }

    #[tokio::test]
    async fn strangers_get_nothing_and_change_nothing() {
        let (handler, sync, probe) = open_handler();
        let before = sync.snapshot().await.unwrap();
        let writes = probe.writes().len();

        for text in ["/start", "🍳 Кухня", "🛁 Ванна", "hello", ""] {
            assert!(handler.handle(Some(STRANGER), Some(text)).await.is_none());
        }
        assert!(handler.handle(None, Some("🍳 Кухня")).await.is_none());

        assert_eq!(sync.snapshot().await.unwrap(), before);
        assert_eq!(probe.writes().len(), writes);
    }

    #[tokio::test]
    async fn kitchen_button_switches_light_off() {
        let (handler, sync, probe) = open_handler();
        sync.apply(OutputCommand::new(Pin(13), PinState::High, Origin::Bus), None)
            .await
            .unwrap();

        let reply = handler.handle(Some(OWNER), Some("🍳 Кухня")).await.unwrap();

        assert_eq!(
            reply,
            ChatReply::Toggled {
                name: "Кухня".to_string(),
                state: PinState::Low
            }
        );
        assert!(reply.text().contains("ВИМКНЕНО"));
        assert_eq!(probe.writes().last().map(String::as_str), Some("13 0"));
        assert_eq!(sync.state_of(Pin(13)).await.unwrap(), Some(PinState::Low));
    }

    #[tokio::test]
    async fn two_presses_restore_original_state() {
        let (handler, sync, _probe) = open_handler();

        let first = handler.handle(Some(OWNER), Some("🛏 Кімната")).await.unwrap();
        assert_eq!(first.text(), "Кімната: УВІМКНЕНО 💡");
        let second = handler.handle(Some(OWNER), Some("🛏 Кімната")).await.unwrap();
        assert_eq!(second.text(), "Кімната: ВИМКНЕНО 🌑");

        assert_eq!(sync.state_of(Pin(9)).await.unwrap(), Some(PinState::Low));
    }

    #[tokio::test]
    async fn hardware_outage_replies_with_failure() {
        let (driver, _probe) = MockDriver::closed();
        let (handler, sync) = handler(driver);

        let reply = handler.handle(Some(OWNER), Some("🚽 Туалет")).await.unwrap();

        assert_eq!(reply, ChatReply::Failure);
        assert_eq!(reply.text(), "Помилка зв'язку");
        // Registry still follows the request
        assert_eq!(sync.state_of(Pin(8)).await.unwrap(), Some(PinState::High));
    }

    #[tokio::test]
    async fn unknown_text_and_non_text_are_ignored() {
        let (handler, sync, probe) = open_handler();
        let before = sync.snapshot().await.unwrap();
        let writes = probe.writes().len();

        assert!(handler.handle(Some(OWNER), Some("Кухня")).await.is_none());
        assert!(handler.handle(Some(OWNER), None).await.is_none());
        assert_eq!(sync.snapshot().await.unwrap(), before);
        assert_eq!(probe.writes().len(), writes);
    }

    #[tokio::test]
    async fn empty_allow_list_denies_everyone() {
        let (driver, _probe) = MockDriver::open();
        let (sync, _shutdown, _task) = spawn_handle(driver, None);
        let menu = Menu::from_outputs(&AppConfig::default().outputs);
        let handler = ChatHandler::new([], menu, sync);

        assert!(!handler.is_allowed(OWNER));
        assert!(handler.handle(Some(OWNER), Some("/start")).await.is_none());
    }
}
