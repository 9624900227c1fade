pub mod analytics;
pub mod classes;
pub mod compare;
pub mod core;
