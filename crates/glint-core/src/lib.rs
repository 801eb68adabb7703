#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]

pub mod config;
pub mod error;
#[cfg(not(target_arch = "wasm32"))]
pub mod logging;

pub use error::{EngineError, FramebufferIncomplete};

pub use config::{load_typed_json, parse_typed_json, ContextOptions, GalleryConfig};
