//! Switchboard of collaborators used during validation and the traits they implement

pub mod validation_environment;
pub mod validation_environment_traits;

pub use crate::environment::{validation_environment::*, validation_environment_traits::*};
