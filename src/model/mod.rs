//! Data shapes exchanged with the data-fetch service.

pub mod types;
