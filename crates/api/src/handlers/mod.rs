pub mod admin;
pub mod agent;
pub mod checks;
pub mod health;
pub mod hub;
pub mod internal;
pub mod root;
