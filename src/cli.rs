use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::{Config, FatalPolicy};
use crate::driver;
use crate::programs::{self, PROGRAMS};
use crate::runtime::Runtime;

#[derive(Parser)]
#[command(name = "asyncjmp")]
#[command(about = "asyncjmp - setjmp/longjmp over an unwind/rewind substrate", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides ASYNCJMP_CONFIG_PATH)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Capacity of each jump buffer's frame storage, in bytes
    #[arg(long, global = true)]
    pub stack_buffer_size: Option<usize>,

    /// What to do on a contract violation
    #[arg(long, global = true, value_enum)]
    pub on_fatal: Option<FatalArg>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum FatalArg {
    Abort,
    Panic,
}

impl From<FatalArg> for FatalPolicy {
    fn from(arg: FatalArg) -> Self {
        match arg {
            FatalArg::Abort => FatalPolicy::Abort,
            FatalArg::Panic => FatalPolicy::Panic,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a bundled guest program under the root driver
    Run {
        /// Program name (see `list`)
        program: String,

        /// Arguments passed to the program after its name
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,

        /// Print runtime counters after the program returns
        #[arg(long)]
        stats: bool,
    },

    /// List bundled guest programs
    List,

    /// Print the effective configuration as TOML
    Config,
}

/// Run the CLI by parsing process arguments
///
/// Returns the exit code for the process.
pub fn run_cli() -> Result<i32> {
    let cli = Cli::parse();
    run_cli_with_args(cli)
}

/// Run the CLI with provided arguments (first element is the binary name)
pub fn run_cli_from_args(args: Vec<String>) -> Result<i32> {
    let cli = Cli::try_parse_from(args)?;
    run_cli_with_args(cli)
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut builder = Config::builder().config_path(cli.config.clone());
    if let Some(size) = cli.stack_buffer_size {
        builder = builder.stack_buffer_size(size);
    }
    if let Some(policy) = cli.on_fatal {
        builder = builder.on_fatal(policy.into());
    }
    builder.build()
}

fn run_cli_with_args(cli: Cli) -> Result<i32> {
    // Load eagerly so config errors show before any command output
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Run {
            program,
            args,
            stats,
        } => {
            let program = programs::find(&program).with_context(|| {
                format!("Unknown program '{}' (try `asyncjmp list`)", program)
            })?;

            let mut argv = Vec::with_capacity(args.len() + 1);
            argv.push(program.name.to_string());
            argv.extend(args);

            tracing::info!(
                program = program.name,
                stack_buffer_size = config.stack_buffer_size,
                "running guest"
            );
            let mut rt = Runtime::new(config);
            let code = driver::start(&mut rt, program.entry, &argv);

            let counters = rt.stats();
            tracing::info!(code, root_passes = counters.root_passes, "guest returned");
            println!("{} exited with {}", program.name, code);

            if stats {
                println!("\nStats:");
                println!("  Root passes:     {}", counters.root_passes);
                println!("  Unwinds:         {}", counters.unwinds);
                println!("  Rewinds:         {}", counters.rewinds);
                println!("  Captures:        {}", counters.captures);
                println!("  Jumps:           {}", counters.jumps);
                println!("  Deliveries:      {}", counters.deliveries);
                println!("  Intercepts:      {}", counters.intercepts);
                println!("  Frames saved:    {}", counters.frames_saved);
                println!("  Frames restored: {}", counters.frames_restored);
                println!("  Peak stack:      {} bytes", counters.peak_stack_bytes);
            }

            Ok(code)
        }

        Commands::List => {
            let width = PROGRAMS.iter().map(|p| p.name.len()).max().unwrap_or(0);
            for program in PROGRAMS {
                println!("{:<width$}  {}", program.name, program.about, width = width);
            }
            Ok(0)
        }

        Commands::Config => {
            let rendered =
                toml::to_string_pretty(&config).context("Failed to render configuration")?;
            print!("{}", rendered);
            Ok(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        std::iter::once("asyncjmp")
            .chain(args.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_parse_run_with_trailing_args() {
        let cli = Cli::try_parse_from(argv(&["run", "countdown", "4"])).unwrap();
        match cli.command {
            Commands::Run { program, args, stats } => {
                assert_eq!(program, "countdown");
                assert_eq!(args, vec!["4".to_string()]);
                assert!(!stats);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(argv(&["list", "--stack-buffer-size", "4096"])).unwrap();
        assert_eq!(cli.stack_buffer_size, Some(4096));
        assert!(matches!(cli.command, Commands::List));
    }

    #[test]
    fn test_run_countdown_returns_guest_code() {
        let code = run_cli_from_args(argv(&[
            "--on-fatal",
            "panic",
            "run",
            "--stats",
            "countdown",
            "4",
        ]))
        .unwrap();
        assert_eq!(code, 4);
    }

    #[test]
    fn test_unknown_program_is_an_error() {
        let err = run_cli_from_args(argv(&["run", "nope"])).unwrap_err();
        assert!(err.to_string().contains("Unknown program 'nope'"));
    }

    #[test]
    fn test_invalid_stack_size_is_reported_before_running() {
        let err = run_cli_from_args(argv(&["--stack-buffer-size", "8", "list"])).unwrap_err();
        assert!(err.to_string().contains("at least 256"));
    }
}
