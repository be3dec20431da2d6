pub mod browser;

pub use browser::{ChromiumBrowser, ChromiumSession};
