//! # MQTT bus integration
//!
//! Listens for output commands on the broker and reports every state change
//! back as a retained status message.
//!
//! ## Module Architecture
//!
//! ```text
//! mqtt/
//! ├── config.rs           - Broker and topic settings
//! ├── topics.rs           - Command/status topic layout
//! ├── message_manager.rs  - Inbound message representation and parsing
//! ├── listener.rs         - Command filtering and synchronizer calls
//! ├── status_publisher.rs - Retained status publishing (StatusSink)
//! └── mqtt_handler.rs     - Connection state machine and event loop
//! ```
//!
//! ## Feedback loops
//!
//! The status we publish lands on the same broker we listen to. Two guards
//! keep it from turning into a new command: status topics are dropped by
//! name, and commands matching the current output state are suppressed by the
//! synchronizer.

pub mod config;
pub mod listener;
pub mod message_manager;
pub mod mqtt_handler;
pub mod status_publisher;
pub mod topics;

pub use listener::BusListener;
pub use mqtt_handler::{create_session, MqttHandler};
pub use status_publisher::MqttStatusSink;
pub use topics::TopicScheme;
