use octopilot::cli::commands::{CliArgs, Commands};
use octopilot::cli::handlers::{
    handle_build, handle_config, handle_detect, handle_generate, handle_onboard, handle_schema,
    handle_tools,
};
use octopilot::util::logging::{init_logging, parse_level, LoggingConfig};
use octopilot::VERSION;

use clap::Parser;
use std::env;
use tracing::{debug, Level};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("octopilot v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match &args.command {
        Commands::Detect(detect_args) => handle_detect(detect_args),
        Commands::Generate(generate_args) => handle_generate(&generate_args.target, args.quiet),
        Commands::Build(build_args) => handle_build(build_args).await,
        Commands::Onboard(onboard_args) => handle_onboard(onboard_args, args.quiet),
        Commands::Tools(tools_args) => handle_tools(&tools_args.command).await,
        Commands::Schema => handle_schema(),
        Commands::Config(config_args) => handle_config(config_args),
    };

    std::process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs) {
    let level = if let Some(level_str) = &args.log_level {
        parse_level(level_str)
    } else if args.verbose {
        Level::DEBUG
    } else if args.quiet {
        Level::ERROR
    } else {
        env::var("OCTOPILOT_LOG_LEVEL")
            .map(|v| parse_level(&v))
            .unwrap_or(Level::INFO)
    };

    let use_json = env::var("OCTOPILOT_LOG_JSON")
        .map(|v| octopilot::config::is_truthy(&v))
        .unwrap_or(false);

    init_logging(LoggingConfig {
        level,
        use_json,
        ..Default::default()
    });
}
