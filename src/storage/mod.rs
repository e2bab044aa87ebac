//! Local lead file: reading it for upload and appending registrations to it.

pub mod csv;
pub mod traits;
pub mod writer;
