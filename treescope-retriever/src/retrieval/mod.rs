pub mod extract;
pub mod filter;
pub mod hierarchy;
pub mod service;
pub mod walker;
