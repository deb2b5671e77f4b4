mod settings;

pub use settings::{STUB_CODE, Settings};
