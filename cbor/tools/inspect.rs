/*!
Inspect command - display CBOR data in various formats
*/

use super::io::{Input, Output};
use base64::prelude::*;
use canopy_cbor::{Options, Simple, Value, decode::parse_sequence};
use clap::Parser;

/// Inspect and display CBOR data
#[derive(Parser, Debug)]
#[command(about = "Inspect and display CBOR information", long_about = None)]
pub struct Command {
    /// Output format
    #[arg(
        long,
        default_value = "diag",
        value_name = "FORMAT",
        help = "Output format: diag/diagnostic (human-readable), json (lossy), hex"
    )]
    format: OutputFormat,

    /// Input is hex text rather than binary
    #[arg(short = 'x', long)]
    hex_input: bool,

    /// Maximum nesting depth accepted while decoding
    #[arg(long, default_value_t = canopy_cbor::options::DEFAULT_MAX_DEPTH)]
    max_depth: u32,

    /// Output file (default: stdout)
    #[arg(short = 'o', long)]
    output: Option<Output>,

    /// Input CBOR file (use '-' for stdin)
    input: Input,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    /// CBOR Diagnostic Notation (human-readable)
    #[value(alias = "diagnostic")]
    Diag,
    /// JSON format (lossy - loses CBOR tags, types, etc.)
    Json,
    /// Hexadecimal dump
    Hex,
}

impl Command {
    pub fn exec(self) -> anyhow::Result<()> {
        let cbor_bytes = self.input.read_cbor(self.hex_input)?;

        // Input may be a CBOR sequence, one item per line
        let output_text = match self.format {
            OutputFormat::Hex => hex::encode(&cbor_bytes),
            format => {
                let options = Options::default().with_max_depth(self.max_depth);
                let items = parse_sequence(&cbor_bytes, &options)?;
                tracing::debug!("Decoded {} items", items.len());
                items
                    .iter()
                    .map(|item| match format {
                        OutputFormat::Json => serde_json::to_string_pretty(&value_to_json(item)),
                        _ => Ok(item.to_string()),
                    })
                    .collect::<Result<Vec<_>, _>>()?
                    .join("\n")
            }
        };

        let output = self.output.unwrap_or(Output::Stdout);
        output.write_str(&output_text)?;

        // Add newline for better terminal output
        if matches!(output, Output::Stdout) {
            println!();
        }

        Ok(())
    }
}

/// Convert a CBOR value to JSON (lossy)
fn value_to_json(value: &Value) -> serde_json::Value {
    use serde_json::Value as J;

    match value {
        Value::UInt(n, _) => J::from(*n),
        Value::NInt(..) => match value.as_i64() {
            Some(n) => J::from(n),
            // Below i64::MIN: keep the digits as a string
            None => J::String(value.to_string()),
        },
        Value::Float(f, _) => serde_json::Number::from_f64(*f)
            .map(J::Number)
            .unwrap_or(J::Null), // JSON doesn't support NaN/Infinity
        Value::Bytes(b, _) => J::String(BASE64_URL_SAFE_NO_PAD.encode(b)),
        Value::Text(s, _) => J::String(s.clone()),
        Value::Array(items, _) => J::Array(items.iter().map(value_to_json).collect()),
        Value::Map(pairs, _) => J::Object(
            pairs
                .iter()
                .map(|(k, v)| {
                    // In JSON, all keys must be strings
                    let key = match k.as_str() {
                        Some(s) => s.to_owned(),
                        None => k.to_string(),
                    };
                    (key, value_to_json(v))
                })
                .collect(),
        ),
        Value::Tag(tag, inner, _) => match (*tag, value.as_i128()) {
            // Bignums as decimal strings
            (2 | 3, Some(n)) => J::String(n.to_string()),
            _ => value_to_json(inner),
        },
        Value::Simple(Simple::FALSE) => J::Bool(false),
        Value::Simple(Simple::TRUE) => J::Bool(true),
        Value::Simple(_) => J::Null, // No JSON equivalent
    }
}
