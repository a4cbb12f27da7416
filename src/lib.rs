//! Summon - Inject secrets from pluggable providers into a child process.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── cli/              # Command-line interface
//! │   ├── run           # Run a command with secrets injected
//! │   ├── versions      # Report installed provider versions
//! │   └── output        # Styled stderr messages
//! └── core/             # Core library components
//!     ├── secrets_yml   # secrets.yml parsing
//!     ├── locate        # Parent-directory lookup for --up
//!     ├── provider/     # Provider resolution and invocation
//!     │   ├── batch     # One process per secret
//!     │   └── interactive # One long-lived session
//!     ├── resolve       # Fetch orchestration, defaults, ignore policy
//!     ├── temp          # Scratch files for secret material
//!     ├── env           # Assembled environment, env-file rendering
//!     ├── materialize   # File spills and argument placeholders
//!     ├── process       # Child execution and signal forwarding
//!     └── summon        # One complete run
//! ```
//!
//! # Example
//!
//! ```no_run
//! use summon::core::summon::{run_subprocess, RunConfig};
//!
//! # async fn demo() -> summon::error::Result<()> {
//! let config = RunConfig {
//!     yaml_inline: Some("DB_PASS: !var prod/db/password".to_string()),
//!     ..RunConfig::new(vec!["printenv".to_string(), "DB_PASS".to_string()])
//! };
//! let code = run_subprocess(config).await?;
//! # let _ = code;
//! # Ok(())
//! # }
//! ```
//!
//! Embedders can answer variable secrets themselves instead of running a
//! provider executable:
//!
//! ```no_run
//! use summon::core::provider::SecretFetcher;
//! use summon::core::summon::{run_subprocess, RunConfig};
//!
//! # async fn demo() -> summon::error::Result<()> {
//! let config = RunConfig {
//!     yaml_inline: Some("TOKEN: !var api/token".to_string()),
//!     fetcher: Some(SecretFetcher::new(|path| Ok(format!("value-of-{path}").into_bytes()))),
//!     ..RunConfig::new(vec!["printenv".to_string(), "TOKEN".to_string()])
//! };
//! run_subprocess(config).await?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod core;
pub mod error;
