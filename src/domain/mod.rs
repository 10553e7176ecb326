//! Plain payment types and the ports the application layer drives.

pub mod payment;
pub mod ports;
pub mod view;
