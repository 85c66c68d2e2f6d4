//! Interactive live chat for one conversation at a time.
//!
//! Renders the session's snapshots as they change, reads input with
//! `rustyline-async`, and maps slash commands onto the session handle.
//! Entry point: `loop_runner::run_chat_loop`.

pub mod banner;
pub mod commands;
pub mod input;
pub mod loop_runner;
pub mod renderer;
