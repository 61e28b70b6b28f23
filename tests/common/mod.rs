//! Integration test common infrastructure.
//!
//! A scripted IRC server on a loopback port and a helper that runs the
//! `chanstatsd` binary against it with a throwaway config and database.

pub mod server;

#[allow(unused_imports)]
pub use server::{FakeIrcServer, TestBot};
