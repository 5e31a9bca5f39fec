use anyhow::Result;
use scaleval::cli::{log_level, parse_args, Commands};
use scaleval::commands::{
    handle_analyze, handle_content_validity, init_config, AnalyzeConfig, AnalyzeOverrides,
    ContentValidityArgs,
};
use scaleval::formatting::FormattingConfig;
use scaleval::observability::install_panic_hook;
use scaleval::output::resolve_format;

fn main() -> Result<()> {
    install_panic_hook();
    let cli = parse_args();

    env_logger::Builder::new()
        .filter_level(log_level(cli.verbosity))
        .parse_default_env()
        .format_timestamp(None)
        .init();

    let formatting = if cli.plain {
        FormattingConfig::plain()
    } else {
        FormattingConfig::from_env()
    };

    match cli.command {
        Commands::Analyze {
            survey,
            config,
            format,
            output,
            no_network,
            bootstrap_iterations,
            workers,
            seed,
        } => {
            let format = resolve_format(format, &output);
            let overrides = AnalyzeOverrides {
                no_network,
                bootstrap_iterations,
                workers,
                seed,
            };
            handle_analyze(AnalyzeConfig::new(
                survey, config, format, output, overrides, formatting,
            ))
        }
        Commands::ContentValidity {
            ratings,
            config,
            format,
            output,
        } => handle_content_validity(ContentValidityArgs {
            format: resolve_format(format, &output),
            ratings,
            config_path: config,
            output,
            formatting,
        }),
        Commands::Init { force } => init_config(force),
    }
}
