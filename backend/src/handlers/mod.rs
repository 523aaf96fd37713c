//! HTTP request handlers

pub mod catalog;
pub mod delivery;
pub mod device;
pub mod health;
pub mod intake;
pub mod movement;
pub mod scrap;
pub mod technician;
pub mod warehouse;

pub use catalog::*;
pub use delivery::*;
pub use device::*;
pub use health::*;
pub use intake::*;
pub use movement::*;
pub use scrap::*;
pub use technician::*;
pub use warehouse::*;
