pub mod catalog;
pub mod earnings;
pub mod platform;
pub mod transactions;
pub mod users;
