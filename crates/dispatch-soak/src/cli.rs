//! Command-line interface definition using clap.

use std::time::Duration;

use clap::Parser;

use crate::soak::SoakPlan;

/// Drive a dispatch heap with concurrent producers, consumers and evictions
#[derive(Parser, Debug)]
#[command(name = "dispatch-soak")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Capacity ceiling; overrides DISPATCH_HEAP_MAX_LEN
    #[arg(long)]
    pub max_len: Option<u64>,

    /// Number of producer threads
    #[arg(short, long, default_value_t = 4)]
    pub producers: usize,

    /// Number of consumer threads
    #[arg(short, long, default_value_t = 2)]
    pub consumers: usize,

    /// Jobs inserted by each producer
    #[arg(short = 'n', long, default_value_t = 1_000)]
    pub jobs: u64,

    /// Number of distinct groups jobs are spread over
    #[arg(short, long, default_value_t = 8)]
    pub groups: u64,

    /// Evict one group every N milliseconds (0 disables eviction)
    #[arg(long, default_value_t = 0)]
    pub evict_every_ms: u64,

    /// Give up after this many seconds
    #[arg(long, default_value_t = 30)]
    pub deadline_secs: u64,

    /// Print the final report as JSON
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Returns the log level based on verbosity.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    pub fn plan(&self) -> SoakPlan {
        SoakPlan {
            producers: self.producers.max(1),
            consumers: self.consumers.max(1),
            jobs_per_producer: self.jobs,
            groups: self.groups.max(1),
            evict_every: (self.evict_every_ms > 0)
                .then(|| Duration::from_millis(self.evict_every_ms)),
            deadline: Duration::from_secs(self.deadline_secs),
        }
    }
}
