use crate::cli::ConvertArgs;
use crate::error::Result;
use moltopo::core::io::gro::{read_gro, write_gro};
use moltopo::core::potential::forms::FormCatalog;
use moltopo::external::{from_structure, to_structure};
use tracing::info;

pub fn run(args: &ConvertArgs) -> Result<()> {
    info!("reading {}", args.input.display());
    let top = read_gro(&args.input)?;

    // Round-trip through the external structure representation; this is
    // the same path a parametrized interchange would take.
    let catalog = FormCatalog::default();
    let structure = to_structure(&top, true, &catalog)?;
    let top = from_structure(&structure, true, &catalog)?;

    info!(
        "writing {} ({} sites, precision {})",
        args.output.display(),
        top.n_sites(),
        args.precision
    );
    write_gro(&top, &args.output, args.precision)?;
    Ok(())
}
