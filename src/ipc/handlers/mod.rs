pub mod activities;
pub mod categories;
pub mod core;
pub mod exchange;
pub mod export;
pub mod lessons;
pub mod plans;
pub mod units;
