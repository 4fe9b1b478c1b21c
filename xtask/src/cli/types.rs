use clap::{Parser, Subcommand, ValueEnum};

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LogLevel {
    #[value(name = "error")]
    Error,
    #[value(name = "warn")]
    Warn,
    #[value(name = "info")]
    Info,
    #[value(name = "debug")]
    Debug,
    #[value(name = "trace")]
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Self::Error,
            LogLevel::Warn => Self::Warn,
            LogLevel::Info => Self::Info,
            LogLevel::Debug => Self::Debug,
            LogLevel::Trace => Self::Trace,
        }
    }
}

/// How the driver learns that a transfer finished.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum CompletionArg {
    /// Interrupt handler signals the waiting worker.
    #[value(name = "irq")]
    Irq,
    /// Worker polls the status register.
    #[value(name = "poll")]
    Poll,
}

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "OmniBlk developer tasks against the emulated OmniXtend DMA controller")]
pub struct Cli {
    #[arg(long = "log-level", value_enum, default_value_t = LogLevel::Info, global = true)]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand)]
pub enum Cmd {
    /// Run the seven-step DMA bring-up scenario.
    ///
    /// Usage:
    ///   cargo xtask scenario --deferred-us 50
    Scenario {
        #[arg(
            long = "deferred-us",
            default_value_t = 0,
            help = "Complete each transfer on a background thread after this many microseconds (0 completes before the start write returns)."
        )]
        deferred_us: u64,

        #[arg(long = "hang", help = "Make the engine drop every transfer, to see the timeout path.")]
        hang: bool,

        #[arg(long = "json", help = "Print the per-step report as JSON.")]
        json: bool,
    },

    /// Write/read round trips through the block request path from several threads.
    Exercise {
        #[arg(long = "size-mb", default_value_t = 16)]
        size_mb: u64,

        #[arg(long = "threads", default_value_t = 4)]
        threads: usize,

        #[arg(long = "requests", default_value_t = 32, help = "Round trips per thread.")]
        requests: usize,

        #[arg(
            long = "request-kb",
            default_value_t = 64,
            help = "Bytes per request in KiB. Sizes above 1024 are split into several transfers."
        )]
        request_kb: usize,

        #[arg(long = "completion", value_enum, default_value_t = CompletionArg::Irq)]
        completion: CompletionArg,

        #[arg(long = "deferred-us", default_value_t = 20)]
        deferred_us: u64,

        #[arg(long = "json")]
        json: bool,
    },

    /// Issue one diagnostic command to a freshly probed device.
    Ioctl {
        #[command(subcommand)]
        cmd: IoctlCmd,

        #[arg(long = "size-mb", default_value_t = 512, global = true)]
        size_mb: u64,

        #[arg(
            long = "warmup",
            default_value_t = 0,
            global = true,
            help = "Sector write/read round trips to run before the command, so the counters are not all zero."
        )]
        warmup: usize,

        #[arg(long = "json", global = true)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, Subcommand)]
pub enum IoctlCmd {
    /// Total addressable bytes.
    #[command(name = "get-size")]
    GetSize,
    /// The five transfer counters.
    #[command(name = "get-stats")]
    GetStats,
    /// Zero the counters.
    #[command(name = "reset-stats")]
    ResetStats,
}
