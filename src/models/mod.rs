pub mod balance;
pub mod order;
pub mod principal;
pub mod trade;

pub use balance::*;
pub use order::*;
pub use principal::*;
pub use trade::*;
