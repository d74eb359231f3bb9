//! Takeout export - bulk export of an account's data.
//!
//! Opens a takeout session, pages through every selected collection,
//! downloads referenced files in chunks and renders the result as HTML,
//! JSON or plain text.

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
