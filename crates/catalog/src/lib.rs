//! Parts catalog domain module.
//!
//! Business rules for parts and their interchangeability, implemented purely
//! as deterministic domain logic (no IO, no storage).

pub mod interchange;
pub mod part;

pub use interchange::{Interchange, InterchangePair, LinkInterchange};
pub use part::{
    CreatePart, MAX_MODEL_YEAR, MIN_MODEL_YEAR, NewPart, Part, PartDetails, Sku, UpdatePart,
};
