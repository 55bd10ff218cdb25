//! ISY Tutor Daemon - natural-language command center for tutors.
//!
//! Interprets free-text commands through an LLM function-calling loop and
//! executes them against flat JSON student records.

pub mod agent;
pub mod routes;
pub mod server;
pub mod tools;
