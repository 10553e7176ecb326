//! Application layer: the poll loop, the modal lifecycle and the SDK facade
//! that wires them to a gateway and a renderer.
//!
//! Everything here runs on a tokio runtime. The poll loop owns one timer
//! task per session; the modal controller is synchronous and serializes all
//! overlay changes behind a single lock.

pub mod modal;
pub mod poll_loop;
pub mod sdk;
