//! Image gallery client: a grid of instanced planes showing one image at a time, with a
//! masked cross-fade between images driven by keyboard or pan navigation.

#![deny(missing_debug_implementations)]

pub mod app;
#[cfg(target_arch = "wasm32")]
pub mod browser;
pub mod clock;
pub mod loader;
pub mod navigation;
pub mod scene;
pub mod shaders;
pub mod transition;

pub use app::GalleryApp;
#[cfg(target_arch = "wasm32")]
pub use browser::{start, Delay, FrameLoop, Running, UrlImage};
pub use clock::Clock;
pub use loader::{load_all, ImageFuture, ImageSource, LoadError, LoadHandle, MemoryImage};
pub use navigation::Navigation;
pub use scene::{plane_grid, GalleryScene};
pub use transition::Transition;
