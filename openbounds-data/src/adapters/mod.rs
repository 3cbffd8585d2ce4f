//! Built-in source adapters.

mod geojson;

pub use geojson::{GEOJSON_TAG, GeoJsonAdapter};

use openbounds_core::AdapterRegistry;

/// Registry holding every adapter shipped with this crate.
///
/// Embedding applications add their own formats with
/// [`AdapterRegistry::register`].
pub fn default_registry() -> AdapterRegistry {
    AdapterRegistry::new().with(GEOJSON_TAG, GeoJsonAdapter)
}
