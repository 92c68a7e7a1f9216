// Data models for the Digiventures API

pub mod legajo;

pub use legajo::{FileResponse, Legajo, LegajoCreateData, LegajoUpdateData, Reference, Strategy};
