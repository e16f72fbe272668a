//! Built-in non-web drivers.

pub mod file;
pub mod mem;

use std::sync::Arc;

use crate::driver::Driver;
use crate::web::WebDriver;

pub use file::FileDriver;
pub use mem::MemDriver;

/// Drivers available without configuration, in registration order.
pub fn default_drivers() -> Vec<Arc<dyn Driver>> {
    vec![Arc::new(WebDriver::new()), Arc::new(FileDriver::new())]
}
