//! Driving the analysis application file by file.

pub mod automator;
pub mod driver;
pub mod elements;
pub mod error;
pub mod files;
pub mod operator;
pub mod params;

// Re-export commonly used types
pub use automator::{Automator, MatchOptions};
pub use driver::{FileStep, RunOptions, Session};
pub use elements::{Element, TemplateLibrary};
pub use error::AutomationError;
pub use files::{discover_files, file_label, select_file};
pub use operator::{ConsoleOperator, Operator};
pub use params::{print_params, prompt_params};
