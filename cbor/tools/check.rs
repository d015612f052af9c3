/*!
Check command - verify canonical encoding
*/

use crate::io::Input;
use canopy_cbor::{Options, canonical};
use clap::Parser;

/// Verify that input holds exactly one canonically encoded item
#[derive(Parser, Debug)]
#[command(about = "Verify that CBOR data is canonically encoded", long_about = None)]
pub struct Command {
    /// Input is hex text rather than binary
    #[arg(short = 'x', long)]
    hex_input: bool,

    /// Maximum nesting depth accepted while decoding
    #[arg(long, default_value_t = canopy_cbor::options::DEFAULT_MAX_DEPTH)]
    max_depth: u32,

    /// Input CBOR file (use '-' for stdin)
    input: Input,
}

impl Command {
    pub fn exec(self) -> anyhow::Result<()> {
        let cbor_bytes = self.input.read_cbor(self.hex_input)?;

        canonical::check(
            &cbor_bytes,
            &Options::default().with_max_depth(self.max_depth),
        )
        .map_err(|e| anyhow::anyhow!("Not canonical: {e}"))?;

        println!("OK: {} bytes, canonical", cbor_bytes.len());
        Ok(())
    }
}
