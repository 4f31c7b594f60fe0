use std::io;
use std::io::IsTerminal;

use clap::{CommandFactory, FromArgMatches};
use clap_complete::generate;
use cli_table::ColorChoice;

use autoseg::client::commands::compute::command_compute;
use autoseg::client::commands::dataset::command_dataset;
use autoseg::client::commands::job::command_job;
use autoseg::client::commands::run::command_run;
use autoseg::client::globalsettings::{GlobalSettings, PlatformSettings};
use autoseg::client::output::cli::CliOutput;
use autoseg::client::output::json::JsonOutput;
use autoseg::client::output::outputs::{Output, Outputs};
use autoseg::client::output::quiet::Quiet;
use autoseg::common::cli::{
    ColorPolicy, CommonOpts, GenerateCompletionOpts, RootOptions, SubCommand,
};
use autoseg::common::setup::setup_logging;

fn make_global_settings(opts: CommonOpts) -> GlobalSettings {
    let color_policy = match opts.colors {
        ColorPolicy::Always => ColorChoice::AlwaysAnsi,
        ColorPolicy::Auto => {
            if io::stdout().is_terminal() {
                ColorChoice::Auto
            } else {
                ColorChoice::Never
            }
        }
        ColorPolicy::Never => ColorChoice::Never,
    };

    // Create Printer
    let printer: Box<dyn Output> = match opts.output_mode {
        Outputs::CLI => {
            // Set colored public for CLI
            match color_policy {
                ColorChoice::Always | ColorChoice::AlwaysAnsi => {
                    colored::control::set_override(true)
                }
                ColorChoice::Never => colored::control::set_override(false),
                _ => {}
            }

            Box::new(CliOutput::new(color_policy))
        }
        Outputs::JSON => Box::<JsonOutput>::default(),
        Outputs::Quiet => Box::<Quiet>::default(),
    };

    let platform = PlatformSettings {
        endpoint: opts.endpoint,
        api_version: opts.api_version,
        workspace: opts.workspace.into(),
    };
    GlobalSettings::new(platform, printer)
}

fn generate_completion(opts: GenerateCompletionOpts) -> anyhow::Result<()> {
    let generator = opts.shell;

    let mut app = RootOptions::command();
    eprintln!("Generating completion file for {generator}...");
    generate(generator, &mut app, "autoseg".to_string(), &mut io::stdout());
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> autoseg::Result<()> {
    let matches = RootOptions::command().get_matches();
    let top_opts = match RootOptions::from_arg_matches(&matches) {
        Ok(opts) => opts,
        Err(error) => error.exit(),
    };

    setup_logging(top_opts.common.debug);

    let gsettings = make_global_settings(top_opts.common);

    let result = match top_opts.subcmd {
        SubCommand::Run(opts) => command_run(&gsettings, opts).await,
        SubCommand::Compute(opts) => command_compute(&gsettings, opts).await,
        SubCommand::Dataset(opts) => command_dataset(&gsettings, opts).await,
        SubCommand::Job(opts) => command_job(&gsettings, opts).await,
        SubCommand::GenerateCompletion(opts) => generate_completion(opts),
    };

    if let Err(e) = result {
        gsettings.printer().print_error(e);
        std::process::exit(1);
    }

    Ok(())
}
