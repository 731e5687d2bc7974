// Utility functions

pub mod response;

pub use response::*;
