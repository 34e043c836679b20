//! Business logic services.
//!
//! - [`zones`] - cached shipping zones and checkout quotes

pub mod zones;

pub use zones::ZoneService;
