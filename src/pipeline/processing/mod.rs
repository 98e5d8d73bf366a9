// Pipeline processing: normalization, aggregation, join, geocoding, filtering

pub mod aggregate;
pub mod enrich;
pub mod filter;
pub mod geocode;
pub mod normalize;
