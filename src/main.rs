// ABOUTME: Main entry point for the revelation program.
// ABOUTME: Provides CLI interface and executes commands from the library.

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;
use revelation::utils::{ensure_parent_directory_exists, validate_markdown_filename};
use revelation::{
    AppConfig, HandoutConfig, MediaAvailability, PipelineOptions, ResourceFile, RevelationError,
};
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Expand a slide document into Reveal.js markdown
    Preprocess(PreprocessArgs),

    /// Render a printable handout page
    Handout(HandoutArgs),

    /// Print the rendering engine configuration as JSON
    EngineConfig(EngineConfigArgs),
}

#[derive(Args)]
struct PreprocessArgs {
    /// Path to the markdown file
    #[arg(short, long)]
    input: PathBuf,

    /// Output file (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Handout mode: drop live media and embeds
    #[arg(long)]
    handout: bool,

    /// Drop all visual directives
    #[arg(long)]
    suppress_visuals: bool,

    /// Use large media variants when they are available locally
    #[arg(long)]
    prefer_high_bitrate: bool,

    /// Media availability index (JSON file path or URL)
    #[arg(long)]
    media_index: Option<String>,

    /// Probe large variants under this media base URL
    #[arg(long, value_name = "BASE_URL")]
    probe_media: Option<Url>,

    /// Process an alternative version named in the front matter instead
    #[arg(long)]
    alternative: Option<String>,
}

#[derive(Args)]
struct HandoutArgs {
    /// Path to the markdown file
    #[arg(short, long)]
    input: PathBuf,

    /// Path to output HTML file
    #[arg(short, long)]
    output: PathBuf,

    /// CSS files to include (local paths or URLs)
    #[arg(long, value_delimiter = ',')]
    css: Option<Vec<String>>,

    /// Mode for CSS: 'embed' to embed content or 'link' to reference
    #[arg(long, value_enum, default_value_t = ResourceMode::Embed)]
    mode: ResourceMode,
}

#[derive(Args)]
struct EngineConfigArgs {
    /// Path to the markdown file
    #[arg(short, long)]
    input: PathBuf,

    /// Query string with overrides, e.g. "forceControls=1&autoSlide=5000"
    #[arg(long, default_value = "")]
    query: String,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ResourceMode {
    Embed,
    Link,
}

fn resolve_alternative(input: &Path, alternative: Option<&str>) -> revelation::Result<PathBuf> {
    let Some(name) = alternative else {
        return Ok(input.to_path_buf());
    };
    let name = validate_markdown_filename(name)?;
    let dir = input.parent().unwrap_or_else(|| Path::new(""));
    Ok(dir.join(name))
}

fn run_preprocess(args: &PreprocessArgs, app: &AppConfig) -> revelation::Result<()> {
    let input = resolve_alternative(&args.input, args.alternative.as_deref())?;

    let availability = match args.media_index.as_deref() {
        Some(index) => {
            let source = ResourceFile::new(index).with_timeout(app.fetch_timeout_ms);
            Some(MediaAvailability::load(&source)?)
        }
        None => None,
    };

    let options = PipelineOptions {
        handout: args.handout,
        suppress_visuals: args.suppress_visuals,
        prefer_high_bitrate: args.prefer_high_bitrate.then_some(true),
        availability,
        probe_base: args.probe_media.clone(),
    };
    let doc = revelation::process_file(&input, &options, app)?;

    for (file, language) in &doc.metadata.alternatives {
        info!("Alternative version available: {} ({})", file, language);
    }

    match &args.output {
        Some(output) => {
            ensure_parent_directory_exists(output)?;
            fs::write(output, &doc.markdown)
                .map_err(|e| anyhow::anyhow!("Failed to write output file: {}", e))?;
            info!("Processed markdown written: {:?}", output);
        }
        None => println!("{}", doc.markdown),
    }
    Ok(())
}

fn run_handout(args: &HandoutArgs, app: &AppConfig) -> revelation::Result<()> {
    let css_files = args
        .css
        .as_ref()
        .map(|files| {
            files
                .iter()
                .map(|path| ResourceFile::new(path).with_timeout(app.fetch_timeout_ms))
                .collect()
        })
        .unwrap_or_default();

    let config = HandoutConfig {
        document_name: String::new(),
        css_files,
        embed_resources: args.mode == ResourceMode::Embed,
    };
    let html = revelation::generate_handout(&args.input, &config, app)?;
    revelation::write_html_to_file(&html, &args.output)?;
    info!("Handout generated successfully: {:?}", args.output);
    Ok(())
}

fn run_engine_config(args: &EngineConfigArgs) -> revelation::Result<()> {
    revelation::utils::validate_file_exists(&args.input)?;
    let raw = fs::read_to_string(&args.input)?;
    let front = revelation::extract(&raw);
    let config = revelation::engine_config(&front.metadata, &args.query);
    let json = serde_json::to_string_pretty(&config)?;
    println!("{}", json);
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let app = AppConfig::from_env();

    let result: Result<(), RevelationError> = match &cli.command {
        Some(Commands::Preprocess(args)) => run_preprocess(args, &app),
        Some(Commands::Handout(args)) => run_handout(args, &app),
        Some(Commands::EngineConfig(args)) => run_engine_config(args),
        None => {
            println!("No command specified. Use --help for usage information.");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
