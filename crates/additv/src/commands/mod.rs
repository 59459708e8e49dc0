//! Command handlers.

pub mod event;
pub mod job;
pub mod register;
pub mod status;
pub mod stream;
pub mod util;
