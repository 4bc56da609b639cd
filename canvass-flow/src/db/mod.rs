//! Entity query modules over the shared SQLite store

pub mod answers;
pub mod groups;
pub mod options;
pub mod questions;
pub mod surveys;
