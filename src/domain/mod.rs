/// Domain module containing core business logic and data types
///
/// This module defines the core entities (Habit, HabitLog, Todo), their
/// validation rules, and the pure statistics engine computed over a habit's
/// log history.

pub mod habit;
pub mod log;
pub mod stats;
pub mod todo;
pub mod types;

// Re-export public types for easy access
pub use habit::*;
pub use log::*;
pub use stats::*;
pub use todo::*;
pub use types::*;

use thiserror::Error;

/// Errors that can occur during domain operations
///
/// These are raised before any state change is attempted, so callers can
/// show a domain message instead of a generic storage failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Invalid habit name: {0}")]
    InvalidHabitName(String),

    #[error("Invalid frequency: {0}")]
    InvalidFrequency(String),

    #[error("Invalid value: {message}")]
    InvalidValue { message: String },

    #[error("Daily target already reached for habit {habit_id} ({target})")]
    DailyTargetReached { habit_id: HabitId, target: u32 },
}
