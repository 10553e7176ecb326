//! Driving adapters for the SDK.

pub mod terminal;
