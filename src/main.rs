use anyhow::Context;
use clap::Parser;
use projcat::{Config, Pipeline, DEFAULT_SAMPLE_SIZE};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "projcat",
    version,
    author,
    about = "Compile all source files in a directory into a single output",
    long_about = "Compile all source files in a directory into a single output.\n\n\
    Files are visited in sorted order. Paths matching .compileignore patterns \
    (gitignore syntax) and binary files are skipped.\n\n\
    USAGE EXAMPLES:\n  \
      # Compile current directory to stdout\n  \
      projcat .\n\n  \
      # Compile directory to file\n  \
      projcat /path/to/project -o output.txt\n\n  \
      # Use custom ignore file\n  \
      projcat . -i custom.ignore -o compiled.txt\n\n  \
      # Include binary files and show verbose output\n  \
      projcat . --include-binary -v"
)]
struct Cli {
    /// Directory to compile
    #[arg(value_name = "DIRECTORY")]
    directory: PathBuf,

    /// Output file (if not specified, writes to stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Custom ignore file (default: .compileignore in target directory)
    #[arg(short, long, value_name = "FILE")]
    ignore_file: Option<PathBuf>,

    /// Include binary files in output
    #[arg(long)]
    include_binary: bool,

    /// Bytes sampled from the start of each file for binary detection
    #[arg(long, default_value_t = DEFAULT_SAMPLE_SIZE, value_name = "BYTES")]
    sample_size: usize,

    /// Verbose output to stderr (repeat for more detail)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_tracing(cli.verbose);

    let mut builder = Config::builder()
        .root_dir(cli.directory)
        .include_binary_files(cli.include_binary)
        .sample_size(cli.sample_size);

    if let Some(output) = cli.output {
        builder = builder.output_file(output);
    }

    if let Some(ignore_file) = cli.ignore_file {
        builder = builder.ignore_file(ignore_file);
    }

    let config = builder.build().context("Failed to build configuration")?;

    Pipeline::new(config)
        .context("Failed to prepare compilation")?
        .run()
        .context("Compilation failed")?;

    Ok(())
}

/// Diagnostics go to stderr so they never mix with compiled output on stdout.
fn setup_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => EnvFilter::new("projcat=warn"),
        1 => EnvFilter::new("projcat=debug"),
        _ => EnvFilter::new("projcat=trace"),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .without_time(),
        )
        .init();
}
