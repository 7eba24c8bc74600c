pub mod auth;
pub mod bonus;
pub mod cart;
pub mod favorites;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod tasks;
