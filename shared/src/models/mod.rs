//! Domain models for the refurbished-equipment inventory

mod catalog;
mod device;
mod fault;
mod intake;
mod movement;
mod package;
mod patch;
mod scrap;
mod technician;
mod warehouse;

pub use catalog::*;
pub use device::*;
pub use fault::*;
pub use intake::*;
pub use movement::*;
pub use package::*;
pub use patch::*;
pub use scrap::*;
pub use technician::*;
pub use warehouse::*;
