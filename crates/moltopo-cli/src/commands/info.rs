use crate::cli::InfoArgs;
use crate::error::Result;
use moltopo::core::io::gro::read_gro;
use std::collections::BTreeSet;
use tracing::info;

pub fn run(args: &InfoArgs) -> Result<()> {
    info!("reading {}", args.input.display());
    let top = read_gro(&args.input)?;

    println!("name:      {}", top.name());
    println!("sites:     {}", top.n_sites());

    let residues: BTreeSet<(String, isize)> = top
        .sites()
        .filter_map(|(_, site)| {
            site.residue
                .as_ref()
                .map(|r| (r.name.clone(), r.number))
        })
        .collect();
    println!("residues:  {}", residues.len());

    match top.simbox() {
        Some(simbox) => {
            let l = simbox.lengths().values();
            let a = simbox.angles();
            println!(
                "box:       {:.4} x {:.4} x {:.4} nm ({:.1}/{:.1}/{:.1} deg)",
                l.x,
                l.y,
                l.z,
                a[0].value(),
                a[1].value(),
                a[2].value()
            );
        }
        None => println!("box:       none"),
    }
    Ok(())
}
