#![allow(missing_docs)]
//! Wire types for TLS 1.0 records and handshake messages, and the
//! buffers that turn a byte stream into them and back.

#[macro_use]
mod macros;

pub mod alert;
pub mod base;
pub mod ccs;
pub mod codec;
pub mod deframer;
pub mod enums;
pub mod fragmenter;
pub mod handshake;
pub mod hsjoiner;
pub mod message;
