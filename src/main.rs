mod dockplate;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use log::{error, info, LevelFilter};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};
use time::UtcOffset;

use dockplate::base_image::{choose_base_image, detect_python_version};
use dockplate::config::{config_root, Config};
use dockplate::emitter::BuildDescriptor;
use dockplate::error::GenError;
use dockplate::manifest::Manifest;
use dockplate::pipeline;
use dockplate::project;
use dockplate::template::TemplateStore;
use dockplate::templates::Flavor;

#[derive(Debug, Args)]
struct GlobalOpts {
    #[arg(long, short, global = true, help = "Enable debug logging.")]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    #[clap(name = "list", about = "Show the current configuration.")]
    List,

    #[clap(
        name = "set",
        about = "Set a config key: base_image <image>, fallback_base_image <image>, or default."
    )]
    Set { key: String, value: Option<String> },
}

#[derive(Debug, Subcommand)]
enum Command {
    #[clap(
        name = "render",
        about = "Render a template with a manifest into a build descriptor."
    )]
    Render {
        #[arg(long, help = "Template file with {placeholder} markers.")]
        template: PathBuf,
        #[arg(long, help = "JSON manifest resolving the placeholders.")]
        manifest: PathBuf,
        #[arg(long, short, help = "Output path. Defaults to stdout.")]
        out: Option<PathBuf>,
        #[arg(long, help = "Write a JSON audit of the substitutions here.")]
        report: Option<PathBuf>,
    },

    #[clap(
        name = "generate",
        about = "Validate a model project and generate its Dockerfile."
    )]
    Generate {
        #[arg(default_value_os_t = PathBuf::from("."))]
        project_root: PathBuf,
        #[arg(long, help = "Use the GPU template.")]
        gpu: bool,
        #[arg(long, short, help = "Output path. Defaults to <project>/Dockerfile.dockplate.")]
        out: Option<PathBuf>,
        #[arg(long, help = "Write a JSON audit of the substitutions here.")]
        report: Option<PathBuf>,
    },

    #[clap(name = "check", about = "Check a model project's structure.")]
    Check {
        #[arg(default_value_os_t = PathBuf::from("."))]
        project_root: PathBuf,
    },

    #[clap(name = "config", about = "Manage user configuration.")]
    Config {
        #[clap(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Parser)]
#[command(name = "dockplate")]
#[command(about = "Render container build descriptors from placeholder templates.", long_about = None)]
#[command(version)]
pub struct App {
    #[clap(flatten)]
    args: GlobalOpts,

    #[clap(subcommand)]
    command: Command,
}

fn setup_logger(verbose: bool) -> Result<()> {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let mut builder = ConfigBuilder::new();
    if let Ok(offset) = UtcOffset::current_local_offset() {
        builder.set_time_offset(offset);
    }
    TermLogger::init(
        level,
        builder.build(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )?;
    Ok(())
}

fn audit(descriptor: &BuildDescriptor, report: Option<PathBuf>) -> Result<()> {
    info!("Substituted values: {:?}", descriptor.fixed());
    info!("Included fragments: {:?}", descriptor.included());
    info!("Excluded fragments: {:?}", descriptor.excluded());
    if let Some(report) = report {
        std::fs::write(&report, serde_json::to_string_pretty(descriptor)?)?;
        info!("Wrote report to {}", report.display());
    }
    Ok(())
}

fn load_config() -> Config {
    config_root()
        .map(|root| Config::load(&root))
        .unwrap_or_default()
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Render {
            template,
            manifest,
            out,
            report,
        } => {
            let store = TemplateStore::new();
            // The template is parsed before the manifest is read.
            let doc = store.load(&template)?;
            let manifest = Manifest::load(&manifest)?;
            let descriptor = pipeline::generate(&doc, &manifest)?;
            match out {
                Some(out) => {
                    descriptor.write_to(&out)?;
                    info!("Wrote descriptor to {}", out.display());
                }
                None => print!("{}", descriptor.text()),
            }
            audit(&descriptor, report)?;
        }
        Command::Generate {
            project_root,
            gpu,
            out,
            report,
        } => {
            let canon_path = std::fs::canonicalize(&project_root).map_err(|e| {
                GenError::InvalidProject(format!("{}: {}", project_root.display(), e))
            })?;
            let info = project::validate_project(&canon_path)?;

            let flavor = if gpu { Flavor::Gpu } else { Flavor::Cpu };
            let store = TemplateStore::new();
            let doc = project::select_template(&store, &canon_path, flavor)?;

            let base_image = choose_base_image(&load_config());
            let manifest = project::manifest_for(&info, &base_image)?;
            let descriptor = pipeline::generate(&doc, &manifest)?;

            let out = out.unwrap_or_else(|| project::default_output(&info.root));
            descriptor.write_to(&out)?;
            info!(
                "Generated {:?} descriptor for {} at {}",
                flavor,
                info.model_name,
                out.display()
            );
            audit(&descriptor, report)?;
        }
        Command::Check { project_root } => {
            let canon_path = std::fs::canonicalize(&project_root).map_err(|e| {
                GenError::InvalidProject(format!("{}: {}", project_root.display(), e))
            })?;
            let info = project::validate_project(&canon_path)?;
            println!("Project structure is valid.");
            println!("  Model name: {}", info.model_name);
            println!(
                "  Examples: {}",
                if info.has_examples { "yes" } else { "no" }
            );
            println!("Project files:");
            for file in project::REQUIRED_FILES {
                println!("  {}", file);
            }
            println!("  {}/", project::MODEL_DIR);
            if info.has_examples {
                println!("  {}/", project::EXAMPLES_DIR);
            }
        }
        Command::Config { action } => {
            let root = config_root()?;
            let mut config = Config::load(&root);
            match action {
                ConfigAction::List => {
                    println!("Configuration ({}):", root.display());
                    println!(
                        "  base_image: {}",
                        config.base_image.as_deref().unwrap_or("(detect)")
                    );
                    println!("  fallback_base_image: {}", config.fallback_base_image);
                    match detect_python_version() {
                        Some((major, minor)) => {
                            println!("  local python: {}.{}", major, minor)
                        }
                        None => println!("  local python: not found"),
                    }
                    println!("  selected base image: {}", choose_base_image(&config));
                }
                ConfigAction::Set { key, value } => {
                    config.set(&key, value)?;
                    config.save(&root)?;
                    println!("Updated {}", key);
                }
            }
        }
    }
    Ok(())
}

fn exit_code(e: &anyhow::Error) -> u8 {
    e.chain()
        .find_map(|cause| cause.downcast_ref::<GenError>())
        .map(GenError::exit_code)
        .unwrap_or(1)
}

fn main() -> ExitCode {
    let app = App::parse();
    if let Err(e) = setup_logger(app.args.verbose) {
        eprintln!("Failed to initialise logging: {}", e);
    }

    match run(app.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}
