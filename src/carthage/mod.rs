//! Carthage invocation plumbing
//!
//! Version probing, option parsing and assembly of the final
//! `carthage <verb> ...` invocation.

pub mod command;
pub mod options;
pub mod version;

pub use command::CommandRunner;
pub use options::{parse_options, resolve_project_directory};
pub use version::{probe_carthage_version, probe_swift_version, probe_version};

/// Carthage executable name
pub const CARTHAGE_BIN: &str = "carthage";

/// Swift executable name
pub const SWIFT_BIN: &str = "swift";

/// The only verb whose results are cached
pub const BOOTSTRAP_COMMAND: &str = "bootstrap";

/// Option that moves Carthage to another project directory
pub const PROJECT_DIRECTORY_FLAG: &str = "--project-directory";

/// Environment entry Carthage (through xcodebuild) reads for an xcconfig override
pub const XCCONFIG_ENV: &str = "XCODE_XCCONFIG_FILE";

/// Environment entry Carthage reads for authenticated GitHub API access
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_ACCESS_TOKEN";
