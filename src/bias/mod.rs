//! Atmospheric delay models
pub mod iono;
pub mod tropo;
