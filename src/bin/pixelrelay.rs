use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use pixelrelay::prelude::*;
use pixelrelay::telemetry;

#[derive(Debug, Parser)]
#[command(name = "pixelrelay", version, about = "Image generation and reference composition")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate one image and print its URL
    Generate(GenerateArgs),
    /// Compose reference images and print the saved local reference
    Compose(ComposeArgs),
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long, default_value = "1024x1024")]
    size: String,
    /// Reference image file for image-to-image
    #[arg(long)]
    reference: Option<PathBuf>,
    /// Copy the result into the static root
    #[arg(long)]
    cache: bool,
}

#[derive(Debug, Parser)]
struct ComposeArgs {
    #[arg(long)]
    primary: Option<String>,
    #[arg(long = "secondary")]
    secondaries: Vec<String>,
    #[arg(long, value_enum, default_value_t = LayoutArg::PrimaryStrip)]
    layout: LayoutArg,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LayoutArg {
    PrimaryStrip,
    UniformRow,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _guard = match telemetry::init_from_env() {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("pixelrelay error: {err}");
            return ExitCode::FAILURE;
        }
    };

    match run(Cli::parse()).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("pixelrelay error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<String, ImageGenError> {
    let settings = ImageSettings::from_env()?;
    let cancel = CancelHandle::new();

    match cli.command {
        Command::Generate(args) => {
            let mut builder = GenerationRequest::builder(args.prompt).size(args.size);
            if let Some(path) = &args.reference {
                builder = builder.reference_image(tokio::fs::read(path).await?);
            }
            let request = builder.build()?;

            let generator = ImageGenerator::new(&settings)?;
            if args.cache {
                let cache = ExternalImageCache::new(
                    generator.executor().transport().client().clone(),
                    StaticRoot::new(&settings.static_root),
                    settings.request_timeout,
                );
                generator.generate_and_cache(&request, &cache, &cancel).await
            } else {
                generator.generate_url_with_cancel(&request, &cancel).await
            }
        }
        Command::Compose(args) => {
            let spec = match args.layout {
                LayoutArg::PrimaryStrip => {
                    let primary = args.primary.ok_or_else(|| {
                        ImageGenError::validation("--primary is required for primary-strip")
                    })?;
                    CompositionSpec::primary_strip(primary, args.secondaries)
                }
                LayoutArg::UniformRow => CompositionSpec::uniform_row(args.secondaries),
            }
            .with_canvas(settings.canvas_max_width, settings.canvas_max_height);

            let store = StaticRoot::new(&settings.static_root);
            let compositor = ImageCompositor::new(ImageFetcher::new(
                reqwest::Client::new(),
                store.clone(),
            ));
            compositor.compose_and_save(&spec, &store, &cancel).await
        }
    }
}
