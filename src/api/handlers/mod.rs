pub mod analytics;
pub mod auth;
pub mod market;
pub mod order;
pub mod trades;
pub mod wallets;
