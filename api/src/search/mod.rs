mod builder;
mod compiler;
mod params;
mod types;

pub use builder::{build_order_by, build_where, SqlValue};
pub use compiler::compile;
pub use params::RawQueryParams;
pub use types::{ProductQuery, Projection};

#[cfg(test)]
mod tests;
