//! `keel version` command.

use keel_schema::Dialect;

use crate::error::CliResult;
use crate::output;

/// Print the version and the dialects this build renders.
pub async fn run() -> CliResult<()> {
    output::header(concat!("keel ", env!("CARGO_PKG_VERSION")));
    output::field("Version", env!("CARGO_PKG_VERSION"));

    let dialects: Vec<&str> = Dialect::ALL.iter().map(Dialect::as_str).collect();
    output::field("Dialects", &dialects.join(", "));
    Ok(())
}
