mod blur;
mod coerce;
mod focus;
pub mod relational_join;
pub mod tvs;

pub use relational_join::RelationalSet;
pub use tvs::Tvs;
