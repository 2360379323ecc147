mod error;
mod lifecycle;
mod scripts;
mod targets;

pub use error::{Error, ErrorKind};
pub use lifecycle::{HostManager, SetupOptions, SetupOutcome, Source};
pub use scripts::{
    BUNDLE, collect_scripts, install_command, prepare_command, script_candidates,
    setup_host_scripts,
};
pub use targets::{Report, Target, for_each};
