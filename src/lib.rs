pub mod card;
pub mod card_type;
pub mod cli;
pub mod commands;
pub mod config;
pub mod crawler;
pub mod dispatcher;
pub mod errors;

pub mod mocks;

pub use card::Card;
pub use card_type::CardType;
pub use cli::{Cli, Report, RunOutcome};
pub use commands::{CommandRunner, SystemRunner, ToolCommand};
pub use config::{Config, OutputKind};
pub use dispatcher::{build_jobs, execute_pool, JobOutcome, JobResult};
pub use errors::{CardConvertError, Result};
