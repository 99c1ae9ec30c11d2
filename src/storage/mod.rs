//! Local persistence. Everything lives in the application directory:
//!  - `state.json` is a small key-value store ([state_file::StateFile]) holding the session, the
//!    theme and the running check-in ([session::SessionStore]).
//!  - `outbox.jsonl` is the queue of writes waiting for the network ([outbox::Outbox]).
//!
//! The CLI and the sync daemon may touch the same files at once, so every access goes through
//! advisory file locks ([locked]).

pub mod locked;
pub mod outbox;
pub mod session;
pub mod state_file;
