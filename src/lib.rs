//! # pitbox
//!
//! Client core for the event registration app. Users sign in against the
//! hosted auth service, browse events, register for event classes, manage
//! team membership and upload verification documents.
//!
//! SYSTEM CONTEXT
//! ==============
//! All persistence lives in the hosted backend (auth, REST data API, object
//! storage). This crate holds the client-side session, keeps navigation
//! consistent with it, and wraps the remote queries behind a small cache.

pub mod auth;
pub mod config;
pub mod data;
pub mod guard;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;
