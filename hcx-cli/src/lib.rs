//! `hcx` command line client
//!
//! Stands in for the portal front end: turns arguments into a submission,
//! prints each lifecycle state as it is reached and finishes with a summary
//! of the result.
//!
//! ```bash
//! hcx scenarios
//! hcx check --policy-id PL-1001 --name "Asha Menon" --gender female --scenario 2
//! HCX_BASE_URL=http://portal:8080 HCX_WS_URL=ws://portal:8080/ws \
//!     hcx claim --policy-id PL-1001 --name "Asha Menon" --gender female --raw
//! ```

pub mod cli;
pub mod commands;

pub use cli::{Cli, Command, RequestArgs};
