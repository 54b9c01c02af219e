//! Domain layer - models, the content codec and SQL queries

pub mod content;
pub mod models;
pub mod outcome;
pub mod queries;

pub use content::PostItem;
pub use models::*;
pub use outcome::{OutcomeCode, Outcomes, StatusPolicy};
