//! Campus Chat - conversation client for a campus question-answering service
//!
//! The transcript lives in a [`store::MessageStore`], is driven by the
//! [`state_machine`] through a [`runtime::ChatRuntime`], mirrored into
//! SQLite slots by [`persistence`], and answered by an
//! [`inference::InferenceClient`].

pub mod attachment;
pub mod auth;
pub mod config;
pub mod db;
pub mod inference;
pub mod message;
pub mod persistence;
pub mod runtime;
pub mod session;
pub mod state_machine;
pub mod store;
pub mod suggestions;
