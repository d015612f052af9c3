/*!
CBOR Tools - A CLI for working with CBOR data

# Commands

- `inspect`: Display CBOR data as diagnostic notation, JSON or hex
- `compose`: Convert JSON to CBOR binary
- `canon`: Re-encode CBOR data in canonical form
- `check`: Verify that CBOR data is canonically encoded

# Examples

```bash
# Inspect a CBOR file
cbor inspect data.cbor

# Inspect hex input as JSON (lossy)
echo 'a26161016162820203' | cbor inspect --hex-input --format json -

# Convert JSON to canonical CBOR
echo '{"name": "Alice", "age": 30}' | cbor compose --canonical -o data.cbor -

# Canonicalize, then check
cbor canon data.cbor -o canon.cbor
cbor check canon.cbor
```
*/

use clap::{Parser, Subcommand};
use tracing_subscriber::filter::LevelFilter;

mod canon;
mod check;
mod compose;
mod inspect;
mod io;

/// A CLI tool for working with CBOR data
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "A CLI tool for inspecting and manipulating CBOR data",
    long_about = "CBOR Tools provides utilities for working with CBOR (RFC 8949) data.\n\n\
                  Features:\n\
                  - Inspect CBOR data and sequences in human-readable formats\n\
                  - Convert JSON to CBOR\n\
                  - Re-encode data in canonical form and verify canonical encodings"
)]
struct Cli {
    /// Increase logging verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Inspect and display CBOR data in various formats
    Inspect(inspect::Command),

    /// Convert JSON to CBOR binary
    Compose(compose::Command),

    /// Re-encode CBOR data in canonical form
    Canon(canon::Command),

    /// Verify that CBOR data is canonically encoded
    Check(check::Command),
}

fn init_logger(verbose: u8) {
    let log_level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(log_level > LevelFilter::DEBUG)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    match cli.command {
        Commands::Inspect(args) => args.exec(),
        Commands::Compose(args) => args.exec(),
        Commands::Canon(args) => args.exec(),
        Commands::Check(args) => args.exec(),
    }
}
