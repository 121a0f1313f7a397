pub mod amount;
pub mod demo;
pub mod handle;
