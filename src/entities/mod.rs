// Entity Models
// Country entities back the name normalizer that runs before any join

pub mod country;

pub use country::{Country, CountryRegistry};
