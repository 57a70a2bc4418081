// Addon Source System
//
// Two-tier architecture:
//
// Tier 1: crumble-addons (pure addon protocol HTTP client)
//   - AddonClient, protocol types, AddonClientError
//
// Tier 2: crumble-core/source (AddonSource adapters)
//   - HttpAddonSource wraps an AddonClient plus its manifest
//   - AddonRegistry loads addons.json and owns the installed sources
//   - fallback: built-in sample catalog and stream

pub mod addon;
pub mod fallback;
pub mod registry;
pub mod traits;

pub use addon::HttpAddonSource;
pub use registry::{parse_addons_file, AddonEntry, AddonRegistry};
pub use traits::{is_primary_id, AddonSource};
