pub mod sessions;
pub mod stream_slot;
