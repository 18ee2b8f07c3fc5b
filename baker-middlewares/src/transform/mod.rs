pub mod append_path;
pub mod replace_path;

pub use append_path::AppendPath;
pub use replace_path::ReplacePath;
