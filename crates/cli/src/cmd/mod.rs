//! CLI command implementations

pub mod connect;
pub mod diff;
pub mod info;
pub mod logout;
pub mod pull;
pub mod push;
pub mod status;
pub mod sync;
pub mod track;
