//! End-to-end tests for the SAML 2.0 workspace.
//!
//! These tests drive the object model, signatures, encryption and every
//! binding through the public API only, with the fixture keys under
//! `fixtures/` and a frozen clock.

mod back_channel;
mod common;
mod context;
mod encryption;
mod scenarios;
mod web_sso;
