//! Promotion breakeven and grading toolkit.
//!
//! Load a CSV of promotions, validate it against the column schema, then
//! compute margins, breakeven lift, what-if scenarios and, for promotions
//! that already ran, weekly grades and a profit waterfall.
pub mod calc;
pub mod config;
pub mod error;
pub mod loader;
pub mod output;
pub mod reports;
pub mod schema;
pub mod types;
pub mod util;
pub mod validator;
