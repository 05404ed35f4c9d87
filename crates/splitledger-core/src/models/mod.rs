//! Data models for the expense backend.
//!
//! - `Expense`, `NewExpense`: individual and group expenses
//! - `Group`, `NewGroup`: expense-sharing groups and their members
//! - `User`, `UserRef`, `NewUser`: accounts, references to them, signup data
//! - `ApiResponse`: the `{ success, data, message }` envelope around every body

pub mod expense;
pub mod group;
pub mod response;
pub mod user;

pub use expense::{Expense, NewExpense};
pub use group::{Group, NewGroup};
pub use response::ApiResponse;
pub use user::{NewUser, Upload, User, UserRef};
