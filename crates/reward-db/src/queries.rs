//! Database query functions organized by domain.

pub mod reports;
