pub mod generate;
pub mod status;

pub use generate::{execute_generate, execute_generate_at, GenerateResult};
pub use status::{execute_status, StatusResult};

#[cfg(feature = "cli")]
pub use generate::print_generate_summary;
#[cfg(feature = "cli")]
pub use status::print_status_summary;
