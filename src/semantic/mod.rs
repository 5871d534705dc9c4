mod checker;
pub mod coercion;

pub use checker::Checker;
