//! Application layer orchestrating composition, execution, and analysis.

pub mod analysis;
pub mod capture;
pub mod compose;
pub mod markup;
pub mod playground;
pub mod sandbox;
pub mod session;
