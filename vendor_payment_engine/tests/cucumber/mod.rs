mod steps;
mod world;

pub use world::{MarketSystem, VendorWorld};
