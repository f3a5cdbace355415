pub mod traits;
pub mod web;

pub use traits::{BrowserDriver, ElementHandle};
