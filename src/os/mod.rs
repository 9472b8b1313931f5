//! Operating system interaction.

pub mod file_explorer;

pub use file_explorer::{FileExplorer, LocalFileExplorer, NullFileExplorer};
