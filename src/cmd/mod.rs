//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module          | Commands handled                |
//! |-----------------|---------------------------------|
//! | `serve`         | `Serve`, `InitDb`               |
//! | `users`         | `User`                          |
//! | `build_monitor` | `BuildMonitor`                  |
//! | `review`        | `SecurityReview`                |
//! | `test_summary`  | `TestSummary`                   |
//! | `autofix`       | `AutoFix`                       |
//! | `config`        | `Config`                        |

pub mod autofix;
pub mod build_monitor;
pub mod config;
pub mod review;
pub mod serve;
pub mod test_summary;
pub mod users;

pub use autofix::cmd_auto_fix;
pub use build_monitor::cmd_build_monitor;
pub use config::cmd_config;
pub use review::cmd_security_review;
pub use serve::{cmd_init_db, cmd_serve};
pub use test_summary::cmd_test_summary;
pub use users::cmd_user;
