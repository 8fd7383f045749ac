//! grindgraph: callgrind trace parsing and call-graph cost attribution.

mod analysis;
mod config;
mod cycles;
mod diagnostics;
mod error;
mod event;
mod integrate;
mod model;
mod parser;
mod query;
mod ratio;
mod ratios;
mod reduce;

pub use analysis::*;
pub use config::*;
pub use cycles::*;
pub use diagnostics::*;
pub use error::*;
pub use event::*;
pub use model::*;
pub use parser::*;
pub use query::*;
pub use ratio::*;
