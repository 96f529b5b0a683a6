use std::process::ExitCode;
use std::time::Duration;

use automacro::{
    parse, render, tokenize, Config, DryRunExecutor, Interpreter, MacroError, MacroTask, Token,
};
use clap::{Parser as ClapParser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(author, version, about = "Automation macro runner")]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the tokens of a macro
    Tokenize {
        source: String,
        #[arg(long)]
        json: bool,
    },
    /// Print the commands built from a macro
    Parse {
        source: String,
        #[arg(long)]
        json: bool,
    },
    /// Parse a macro and replay it through the dry-run executor
    Run {
        /// Macro string to run
        #[arg(required_unless_present = "name")]
        source: Option<String>,
        /// Run a macro saved in the config instead
        #[arg(long, conflicts_with = "source")]
        name: Option<String>,
        /// Milliseconds to wait after each action (overrides the config)
        #[arg(long)]
        pause_ms: Option<u64>,
        /// Cancel the run after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Manage configuration and saved macros
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the current configuration
    Show,
    /// Print the config file location
    Path,
    /// Write a default config file if none exists
    Init,
    /// Save a named macro
    Save { name: String, source: String },
    /// Remove a named macro
    Remove { name: String },
    /// List saved macros
    List,
}

impl Commands {
    fn needs_config(&self) -> bool {
        matches!(self, Commands::Run { .. } | Commands::Config { .. })
    }
}

/// Commands that never read the config still run when it is broken; they
/// get default settings and the load error back for reporting.
fn config_or_default(
    loaded: Result<Config, MacroError>,
    required: bool,
) -> Result<(Config, Option<MacroError>), MacroError> {
    match loaded {
        Ok(config) => Ok((config, None)),
        Err(e) if !required => Ok((Config::default(), Some(e))),
        Err(e) => Err(e),
    }
}

fn init_tracing(level: &str, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_tokens(tokens: &[Token], depth: usize) {
    for token in tokens {
        println!(
            "{}{:?} {:?} @{}",
            "  ".repeat(depth),
            token.kind,
            token.text,
            token.position
        );
        print_tokens(&token.children, depth + 1);
    }
}

async fn run_macro(
    source: &str,
    config: &Config,
    pause_ms: Option<u64>,
    timeout_secs: Option<u64>,
) -> Result<(), MacroError> {
    let commands = parse(source)?;
    let pause = pause_ms.map(Duration::from_millis).unwrap_or_else(|| config.pause());

    let actions: u64 = commands.iter().map(|c| c.call_count()).sum();
    println!("Running {} ({} actions)", render(&commands), actions);

    let interpreter = Interpreter::new(DryRunExecutor::new()).with_pause(pause);
    let task = MacroTask::spawn(commands, interpreter);

    let cancel = task.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling macro");
            cancel.cancel();
        }
    });

    if let Some(secs) = timeout_secs {
        let cancel = task.cancel_token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            warn!(secs, "timeout reached, cancelling macro");
            cancel.cancel();
        });
    }

    let report = task.wait().await?;
    match report.outcome {
        Ok(summary) => {
            println!("Done: {} actions executed", summary.calls);
            Ok(())
        }
        Err(e) if e.is_cancelled() => {
            println!("Cancelled: {}", e);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn config_command(command: ConfigCommands, mut config: Config) -> Result<(), MacroError> {
    match command {
        ConfigCommands::Show => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigCommands::Path => {
            println!("{}", Config::get_config_path().display());
        }
        ConfigCommands::Init => {
            let config_path = Config::get_config_path();
            if config_path.exists() {
                println!("Config already exists at: {}", config_path.display());
            } else {
                config.save()?;
                println!("Initialized new config at: {}", config_path.display());
            }
        }
        ConfigCommands::Save { name, source } => {
            config.add_macro(&name, &source)?;
            config.save()?;
            info!(name = %name, "saved macro");
            println!("Saved macro '{}'", name);
        }
        ConfigCommands::Remove { name } => match config.remove_macro(&name) {
            Some(_) => {
                config.save()?;
                println!("Removed macro '{}'", name);
            }
            None => println!("No macro named '{}'", name),
        },
        ConfigCommands::List => {
            println!("Environment: {}", config.env_name);
            println!("\nMacros:");
            for (name, source) in &config.macros {
                println!("  {} = {}", name, source);
            }
        }
    }
    Ok(())
}

async fn run_cli(cli: Cli) -> Result<(), MacroError> {
    let (config, ignored) = config_or_default(Config::load(), cli.command.needs_config())?;
    init_tracing(&config.log_level, cli.verbose);
    if let Some(e) = ignored {
        warn!(error = %e, "ignoring unreadable config");
    }

    match cli.command {
        Commands::Tokenize { source, json } => {
            let tokens = tokenize(&source)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tokens)?);
            } else {
                print_tokens(&tokens, 0);
            }
        }
        Commands::Parse { source, json } => {
            let commands = parse(&source)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&commands)?);
            } else {
                for (index, command) in commands.iter().enumerate() {
                    println!("{:>3}: {}", index, command);
                }
            }
        }
        Commands::Run {
            source,
            name,
            pause_ms,
            timeout_secs,
        } => {
            let source = match (source, name) {
                (Some(source), _) => source,
                (None, Some(name)) => config
                    .get_macro(&name)
                    .map(str::to_string)
                    .ok_or_else(|| MacroError::Config(format!("no macro named '{}'", name)))?,
                (None, None) => {
                    return Err(MacroError::Config("nothing to run".to_string()));
                }
            };
            run_macro(&source, &config, pause_ms, timeout_secs).await?;
        }
        Commands::Config { command } => config_command(command, config)?,
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run_cli(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn broken() -> Result<Config, MacroError> {
        Err(MacroError::Config("config.json: expected value".to_string()))
    }

    #[test]
    fn only_run_and_config_need_the_config() {
        let cli = Cli::parse_from(["amc", "tokenize", "c"]);
        assert!(!cli.command.needs_config());
        let cli = Cli::parse_from(["amc", "parse", "--json", "c"]);
        assert!(!cli.command.needs_config());
        let cli = Cli::parse_from(["amc", "run", "c"]);
        assert!(cli.command.needs_config());
        let cli = Cli::parse_from(["amc", "config", "show"]);
        assert!(cli.command.needs_config());
    }

    #[test]
    fn broken_config_falls_back_when_not_needed() {
        let (config, ignored) = config_or_default(broken(), false).unwrap();
        assert_eq!(config.log_level, "info");
        assert!(matches!(ignored, Some(MacroError::Config(_))));

        assert!(matches!(config_or_default(broken(), true), Err(MacroError::Config(_))));
    }

    #[test]
    fn loaded_config_is_kept() {
        let config = Config {
            pause_ms: 7,
            ..Config::default()
        };
        let (kept, ignored) = config_or_default(Ok(config.clone()), false).unwrap();
        assert_eq!(kept, config);
        assert!(ignored.is_none());
    }
}
