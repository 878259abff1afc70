//! Platform layer: window, event pumping and Vulkan surface creation.

mod host;
mod window;

pub use host::{EventState, WindowEvents, WindowHost, WindowSignal};
pub use window::{Surface, Window, required_instance_extensions};
