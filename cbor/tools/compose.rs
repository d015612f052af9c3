/*!
Compose command - convert JSON to CBOR
*/

use crate::io::{Input, Output};
use canopy_cbor::{Options, Value};
use clap::Parser;

/// Convert JSON to CBOR binary
#[derive(Parser, Debug)]
#[command(
    about = "Convert JSON to CBOR binary",
    long_about = "Parse JSON text and convert it to CBOR binary.\n\n\
                  Integers become CBOR integers, other numbers become floats at the\n\
                  smallest width that holds them exactly."
)]
pub struct Command {
    /// Encode canonically (sorted map keys, shortest forms)
    #[arg(short, long)]
    canonical: bool,

    /// Write hex text rather than binary
    #[arg(short = 'x', long)]
    hex_output: bool,

    /// Output file (default: stdout)
    #[arg(short = 'o', long)]
    output: Option<Output>,

    /// Input file (use '-' for stdin)
    input: Input,
}

impl Command {
    pub fn exec(self) -> anyhow::Result<()> {
        let input_text = self.input.read_to_string()?;
        let json_value: serde_json::Value = serde_json::from_str(&input_text)?;

        let options = if self.canonical {
            Options::canonical()
        } else {
            Options::default()
        };
        let cbor_bytes = canopy_cbor::encode(&json_to_value(json_value)?, &options)?;

        let output = self.output.unwrap_or(Output::Stdout);
        output.write_cbor(&cbor_bytes, self.hex_output)?;

        Ok(())
    }
}

/// Convert a JSON value to the CBOR value model
fn json_to_value(value: serde_json::Value) -> anyhow::Result<Value> {
    use serde_json::Value as J;

    Ok(match value {
        J::Null => Value::null(),
        J::Bool(b) => Value::bool(b),
        J::Number(n) => {
            if let Some(u) = n.as_u64() {
                Value::uint(u)
            } else if let Some(i) = n.as_i64() {
                Value::int(i)
            } else if let Some(f) = n.as_f64() {
                Value::float(f)
            } else {
                anyhow::bail!("Invalid JSON number: {}", n)
            }
        }
        J::String(s) => Value::text(s),
        J::Array(arr) => Value::array(
            arr.into_iter()
                .map(json_to_value)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        J::Object(obj) => Value::map(
            obj.into_iter()
                .map(|(key, val)| Ok((Value::text(key), json_to_value(val)?)))
                .collect::<anyhow::Result<Vec<_>>>()?,
        ),
    })
}
