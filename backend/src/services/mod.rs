//! Business logic services for the inventory server

pub mod catalog;
pub mod delivery;
pub mod device;
pub mod fault;
pub mod intake;
pub mod movement;
pub mod package;
pub mod scrap;
pub mod technician;
pub mod warehouse;

#[cfg(test)]
pub(crate) mod fixtures;
