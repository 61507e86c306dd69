//! Core domain types and logic.

pub mod calendar;
pub mod composer;
pub mod error;
pub mod index;
pub mod returns;
pub mod settings;
pub mod stock;
