//! Environmental impact estimates for garment swaps.
//!
//! Given a garment's material composition and clothing type, the engine
//! estimates the CO2, water and energy avoided when the garment is swapped
//! instead of bought new.
//!
//! ```ignore
//! use swap_impact::{default_dataset, EngineConfig, ImpactEngine, ImpactRequest, InMemoryReferenceStore};
//!
//! let store = InMemoryReferenceStore::new(default_dataset());
//! let engine = ImpactEngine::new(store, EngineConfig::default());
//! let request = ImpactRequest::new("t-shirt", [("cotton_conventional".to_string(), 100.0)].into());
//! let estimate = engine.estimate(&request)?;
//! ```

pub mod config;
pub mod error;
pub mod impact;
pub mod reference;

pub use config::EngineConfig;
pub use error::ImpactError;
pub use impact::{ImpactEngine, ImpactEstimate, ImpactRequest, SwapImpact};
pub use reference::{
    default_dataset, load_dataset, validate_dataset, DataQuality, InMemoryReferenceStore,
    ReferenceDataset, ReferenceSnapshot, ReferenceStore, SqliteReferenceStore,
};

/// Initialise the global tracing subscriber.
///
/// The filter comes from `RUST_LOG`, falling back to `default_filter`.
/// Calling this more than once is a no-op.
pub fn init_tracing(default_filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
