//! Reminder pipeline: eligibility scanning and scheduled dispatch.

pub mod dispatcher;
pub mod scanner;

pub use dispatcher::{run_reminder_dispatch, DispatchEntry, DispatchReport};
pub use scanner::reminder_window;
