// Resource services built on the authenticated transport

pub mod legajo;

pub use legajo::{LegajoService, DEFAULT_API_VERSION};
