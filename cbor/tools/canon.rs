/*!
Canon command - re-encode CBOR data in canonical form
*/

use crate::io::{Input, Output};
use canopy_cbor::{Options, decode::parse_sequence, encode};
use clap::Parser;

/// Re-encode CBOR data canonically
#[derive(Parser, Debug)]
#[command(
    about = "Re-encode CBOR data in canonical form",
    long_about = "Decode any well-formed CBOR item or sequence and re-encode it with\n\
                  shortest arguments, definite lengths, smallest lossless floats and\n\
                  sorted map keys. Maps with duplicate keys are rejected."
)]
pub struct Command {
    /// Input is hex text rather than binary
    #[arg(long)]
    hex_input: bool,

    /// Write hex text rather than binary
    #[arg(short = 'x', long)]
    hex_output: bool,

    /// Output file (default: stdout)
    #[arg(short = 'o', long)]
    output: Option<Output>,

    /// Input CBOR file (use '-' for stdin)
    input: Input,
}

impl Command {
    pub fn exec(self) -> anyhow::Result<()> {
        let cbor_bytes = self.input.read_cbor(self.hex_input)?;

        let mut canonical = Vec::with_capacity(cbor_bytes.len());
        for item in parse_sequence(&cbor_bytes, &Options::default())? {
            canonical.extend(encode(&item.canonicalize()?, &Options::canonical())?);
        }
        tracing::debug!(
            "Re-encoded {} bytes as {} bytes",
            cbor_bytes.len(),
            canonical.len()
        );

        let output = self.output.unwrap_or(Output::Stdout);
        output.write_cbor(&canonical, self.hex_output)?;

        Ok(())
    }
}
