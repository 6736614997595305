pub mod chat_input;
pub mod chat_window;
pub mod dark_mode_toggle;
pub mod header;
pub mod markdown;
pub mod message;
pub mod sidebar;
pub mod toast;
