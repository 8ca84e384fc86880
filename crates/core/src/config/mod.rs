//! Configuration for blocks, sessions and the overhead guardrail.
//!
//! - `BloxConfig`: serializable settings, stored as JSON.
//! - `ConfigLayout`: computed paths of the config directory/file.
//! - `load_config` / `save_config`: disk helpers; a missing file means defaults.

pub mod layout;
pub mod settings;
pub mod util;

pub use layout::ConfigLayout;
pub use settings::{BloxConfig, DEFAULT_OVERHEAD_RATIO_LIMIT};
pub use util::{load_config, save_config};
