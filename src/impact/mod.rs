//! Impact calculation engine.
//!
//! A request flows through four stages:
//!
//! 1. [`validate_composition`] checks and rescales the material breakdown
//! 2. [`FactorResolver`] resolves materials, clothing type and parameters
//!    from one pinned reference snapshot, falling back per material through
//!    an ordered list of [`MaterialStrategy`] implementations
//! 3. [`calculate`] turns the resolved factors into impact figures
//! 4. [`assemble`] packages figures, breakdowns and quality into an
//!    [`ImpactEstimate`]
//!
//! [`ImpactEngine`] drives the stages against a [`ReferenceStore`](crate::reference::ReferenceStore).

mod assembler;
mod calculator;
mod composition;
mod engine;
mod resolver;
pub mod types;

pub use assembler::assemble;
pub use calculator::calculate;
pub use composition::validate_composition;
pub use engine::ImpactEngine;
pub use resolver::{
    assess_brand, CategoryAverage, ExactMatch, FactorResolver, GlobalDefault, MaterialStrategy,
    Resolution,
};
pub use types::*;
