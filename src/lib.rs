//! Client SDK for QR-code payments against a remote payment gateway.
//!
//! [`application::sdk::PaymentSdk`] creates a payment, mounts a modal showing
//! its QR code through a [`domain::ports::ModalRenderer`], and polls the
//! gateway until the payment reaches a terminal status.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;
