//! Telegram chat interface
//!
//! ```text
//! teloxide dispatcher ──► ChatHandler ──► SyncHandle::toggle
//!        ▲                    │
//!        └──── ChatReply ◄────┘
//! ```
//!
//! The handler holds all decisions (allow-list, menu lookup, reply text) and
//! knows nothing about teloxide; `telegram.rs` only moves messages in and
//! replies out.

pub mod chat_handler;
pub mod menu;
pub mod telegram;

pub use chat_handler::{ChatHandler, ChatReply};
pub use menu::Menu;
