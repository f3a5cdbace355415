pub mod capture;
pub mod driver;

pub use capture::WebCaptureListener;
pub use driver::{BrowserType, WebDriver, WebDriverConfig};
