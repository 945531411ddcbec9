pub mod cmdline;
pub use cmdline::{render_command_line, write_command_file};
