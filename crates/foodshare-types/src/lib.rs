pub mod api;
pub mod enums;
pub mod models;
pub mod reports;
pub mod stats;
