//! Gromos87 (.gro) reader and writer.
//!
//! A gro file carries a title, an atom count, one line per atom with the
//! residue column (`NNNNAME`), atom name, atom number and position in nm,
//! and a final box line. Connectivity is not part of the format, so a read
//! topology has sites but no connections. Residue information read from the
//! file populates both the residue and molecule labels of each site.

use crate::core::models::simbox::SimBox;
use crate::core::models::site::{GroupLabel, Site};
use crate::core::models::topology::Topology;
use crate::core::units::{NANOMETER, Quantity3};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum GroError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: GroParseErrorKind },
    #[error(
        "Incorrect number of lines: expected {expected} atom rows based on the count in the \
         second line, but at least one {found} was found"
    )]
    AtomCountMismatch {
        expected: usize,
        found: &'static str,
    },
    #[error("Missing required line: {0}")]
    MissingLine(&'static str),
}

#[derive(Debug, Error)]
pub enum GroParseErrorKind {
    #[error("Invalid integer (value: '{value}')")]
    InvalidInt { value: String },
    #[error("Invalid float (value: '{value}')")]
    InvalidFloat { value: String },
    #[error("Invalid residue column (value: '{value}')")]
    InvalidResidue { value: String },
    #[error("Atom row has fewer than 6 whitespace-separated fields")]
    ShortAtomRow,
    #[error("Box line has fewer than 3 components")]
    ShortBoxLine,
}

pub fn read_gro(path: &Path) -> Result<Topology, GroError> {
    let file = File::open(path)?;
    read_gro_from(BufReader::new(file))
}

pub fn read_gro_from<R: BufRead>(mut reader: R) -> Result<Topology, GroError> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Err(GroError::MissingLine("title"));
    }
    let mut top = Topology::new(line.trim());

    line.clear();
    if reader.read_line(&mut line)? == 0 {
        return Err(GroError::MissingLine("atom count"));
    }
    let n_atoms: usize = line
        .trim()
        .parse()
        .map_err(|_| GroError::Parse {
            line: 2,
            kind: GroParseErrorKind::InvalidInt { value: line.trim().to_string() },
        })?;

    for row in 0..n_atoms {
        let line_no = row + 3;
        line.clear();
        if reader.read_line(&mut line)? == 0 || line.trim().is_empty() {
            return Err(GroError::AtomCountMismatch { expected: n_atoms, found: "fewer" });
        }
        let content: Vec<&str> = line.split_whitespace().collect();
        if content.len() < 6 {
            return Err(GroError::Parse {
                line: line_no,
                kind: GroParseErrorKind::ShortAtomRow,
            });
        }

        let (res_number, res_name) = split_residue_column(content[0]).ok_or_else(|| {
            GroError::Parse {
                line: line_no,
                kind: GroParseErrorKind::InvalidResidue { value: content[0].to_string() },
            }
        })?;
        let atom_name = content[1];
        let mut coords = [0.0f64; 3];
        for (slot, raw) in coords.iter_mut().zip(&content[3..6]) {
            *slot = raw.parse().map_err(|_| GroError::Parse {
                line: line_no,
                kind: GroParseErrorKind::InvalidFloat { value: raw.to_string() },
            })?;
        }

        let mut site = Site::new(atom_name, Quantity3::from_array(coords, NANOMETER));
        // gro residue numbers are 1-based; labels are stored 0-based.
        site.residue = Some(GroupLabel::new(res_name, res_number - 1));
        site.molecule = Some(GroupLabel::new(res_name, res_number - 1));
        top.add_site(site);
    }
    top.update_topology();

    line.clear();
    if reader.read_line(&mut line)? == 0 {
        return Err(GroError::MissingLine("box"));
    }
    let box_line_no = n_atoms + 3;
    let components: Vec<&str> = line.split_whitespace().collect();
    if components.len() < 3 {
        return Err(GroError::Parse {
            line: box_line_no,
            kind: GroParseErrorKind::ShortBoxLine,
        });
    }
    let mut lengths = [0.0f64; 3];
    for (slot, raw) in lengths.iter_mut().zip(&components[..3]) {
        *slot = raw.parse().map_err(|_| GroError::Parse {
            line: box_line_no,
            kind: GroParseErrorKind::InvalidFloat { value: raw.to_string() },
        })?;
    }
    // Lengths and the default right angles share compatible units, so this
    // cannot fail.
    if let Ok(simbox) = SimBox::new(Quantity3::from_array(lengths, NANOMETER), None) {
        top.set_simbox(Some(simbox));
    }

    line.clear();
    if reader.read_line(&mut line)? != 0 && !line.trim().is_empty() {
        return Err(GroError::AtomCountMismatch { expected: n_atoms, found: "more" });
    }

    Ok(top)
}

/// Splits the `NNNNAME` residue column into (number, name).
fn split_residue_column(column: &str) -> Option<(isize, &str)> {
    let digits_end = column.find(|c: char| !c.is_ascii_digit())?;
    if digits_end == 0 {
        return None;
    }
    let number: isize = column[..digits_end].parse().ok()?;
    let name = &column[digits_end..];
    if name.chars().all(|c| c.is_ascii_alphabetic()) {
        Some((number, name))
    } else {
        None
    }
}

pub fn write_gro(top: &Topology, path: &Path, precision: usize) -> Result<(), GroError> {
    let file = File::create(path)?;
    write_gro_to(top, BufWriter::new(file), precision)
}

pub fn write_gro_to<W: Write>(
    top: &Topology,
    mut writer: W,
    precision: usize,
) -> Result<(), GroError> {
    let positions = translated_positions(top);

    writeln!(writer, "{} written by moltopo", top.name())?;
    writeln!(writer, "{}", top.n_sites())?;
    write_atoms(top, &positions, &mut writer, precision)?;
    write_box(top, &mut writer)?;
    Ok(())
}

/// Shifts coordinates so every component is non-negative, as the format
/// expects; warns when a translation was applied.
fn translated_positions(top: &Topology) -> Vec<[f64; 3]> {
    let mut positions: Vec<[f64; 3]> = top
        .sites()
        .map(|(_, site)| {
            let v = site
                .position
                .to(NANOMETER)
                .map(|p| p.values())
                .unwrap_or_else(|_| site.position.values());
            [v.x, v.y, v.z]
        })
        .collect();

    let mut min_xyz = [f64::INFINITY; 3];
    for pos in &positions {
        for axis in 0..3 {
            min_xyz[axis] = min_xyz[axis].min(pos[axis]);
        }
    }
    let mut translated = false;
    for axis in 0..3 {
        if min_xyz[axis] < 0.0 {
            translated = true;
            for pos in &mut positions {
                pos[axis] -= min_xyz[axis];
            }
        }
    }
    if translated {
        warn!("Topology contains negative positions; translating so all coordinates are non-negative");
    }
    positions
}

fn write_atoms<W: Write>(
    top: &Topology,
    positions: &[[f64; 3]],
    writer: &mut W,
    precision: usize,
) -> Result<(), GroError> {
    let width = 5 + precision;
    for (idx, ((_, site), pos)) in top.sites().zip(positions).enumerate() {
        // Residue information comes from the molecule label, falling back
        // to the residue label; gro is 1-indexed.
        let (res_id, res_name) = match (&site.molecule, &site.residue) {
            (Some(molecule), _) => (molecule.number + 1, molecule.name.as_str()),
            (None, Some(residue)) => (residue.number + 1, residue.name.as_str()),
            (None, None) => (1, "MOL"),
        };
        let res_name: String = res_name.chars().take(3).collect();
        let atom_name: String = site.name.chars().take(3).collect();
        let atom_id = idx + 1;

        let crt_x = clip(format!("{:width$.precision$}", pos[0]), width);
        let crt_y = clip(format!("{:width$.precision$}", pos[1]), width);
        let crt_z = clip(format!("{:width$.precision$}", pos[2]), width);
        writeln!(
            writer,
            "{res_id:5}{res_name:<5}{atom_name:<5}{atom_id:5}{crt_x}{crt_y}{crt_z}"
        )?;
    }
    Ok(())
}

fn clip(mut s: String, width: usize) -> String {
    s.truncate(width);
    s
}

fn write_box<W: Write>(top: &Topology, writer: &mut W) -> Result<(), GroError> {
    let Some(simbox) = top.simbox() else {
        writeln!(writer, " {:0.5} {:0.5} {:0.5}", 0.0, 0.0, 0.0)?;
        return Ok(());
    };
    if simbox.is_orthorhombic() {
        let l = simbox.lengths().values();
        writeln!(writer, " {:0.5} {:0.5} {:0.5}", l.x, l.y, l.z)?;
    } else {
        // Triclinic cells use the nine-component vector form in the
        // GROMACS component order.
        let v = simbox.vectors();
        writeln!(
            writer,
            " {:0.5} {:0.5} {:0.5} {:0.5} {:0.5} {:0.5} {:0.5} {:0.5} {:0.5}",
            v[(0, 0)],
            v[(1, 1)],
            v[(2, 2)],
            v[(0, 1)],
            v[(0, 2)],
            v[(1, 0)],
            v[(1, 2)],
            v[(2, 0)],
            v[(2, 1)],
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::units::{DEGREE, Quantity};
    use std::io::Cursor;
    use tempfile::tempdir;

    const WATER_GRO: &str = "\
Two waters
6
    1SOL     OW    1   0.230   0.628   0.113
    1SOL    HW1    2   0.137   0.626   0.150
    1SOL    HW2    3   0.231   0.589   0.021
    2SOL     OW    4   0.225   0.275   0.316
    2SOL    HW1    5   0.260   0.258   0.227
    2SOL    HW2    6   0.137   0.230   0.323
   1.82060   1.82060   1.82060
";

    #[test]
    fn read_parses_sites_and_box() {
        let top = read_gro_from(Cursor::new(WATER_GRO)).unwrap();
        assert_eq!(top.name(), "Two waters");
        assert_eq!(top.n_sites(), 6);

        let (_, first) = top.sites().next().unwrap();
        assert_eq!(first.name, "OW");
        assert_eq!(first.residue.as_ref().unwrap().name, "SOL");
        assert_eq!(first.residue.as_ref().unwrap().number, 0);
        assert!((first.position.values().x - 0.230).abs() < 1e-12);

        let (_, last) = top.sites().last().unwrap();
        assert_eq!(last.residue.as_ref().unwrap().number, 1);

        let simbox = top.simbox().unwrap();
        assert!((simbox.lengths().values().x - 1.8206).abs() < 1e-9);
    }

    #[test]
    fn read_fails_on_too_few_atom_rows() {
        let bad = "title\n3\n    1SOL     OW    1   0.0   0.0   0.0\n";
        let err = read_gro_from(Cursor::new(bad)).unwrap_err();
        assert!(matches!(
            err,
            GroError::AtomCountMismatch { expected: 3, found: "fewer" }
        ));
    }

    #[test]
    fn read_fails_on_extra_atom_rows() {
        let bad = format!("{WATER_GRO}    3SOL     OW    7   0.0   0.0   0.0\n");
        let err = read_gro_from(Cursor::new(bad.as_str())).unwrap_err();
        assert!(matches!(err, GroError::AtomCountMismatch { found: "more", .. }));
    }

    #[test]
    fn read_fails_on_malformed_residue_column() {
        let bad = "title\n1\n    SOL1     OW    1   0.0   0.0   0.0\n 1.0 1.0 1.0\n";
        let err = read_gro_from(Cursor::new(bad)).unwrap_err();
        assert!(matches!(
            err,
            GroError::Parse { line: 3, kind: GroParseErrorKind::InvalidResidue { .. } }
        ));
    }

    #[test]
    fn roundtrip_through_file_preserves_sites_and_positions() {
        let top = read_gro_from(Cursor::new(WATER_GRO)).unwrap();
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.gro");
        write_gro(&top, &path, 3).unwrap();
        let back = read_gro(&path).unwrap();

        assert_eq!(back.n_sites(), top.n_sites());
        for ((_, a), (_, b)) in top.sites().zip(back.sites()) {
            assert_eq!(a.name, b.name);
            assert_eq!(a.residue, b.residue);
            let pa = a.position.values();
            let pb = b.position.values();
            for axis in 0..3 {
                assert!((pa[axis] - pb[axis]).abs() < 1e-3);
            }
        }
        let la = top.simbox().unwrap().lengths().values();
        let lb = back.simbox().unwrap().lengths().values();
        for axis in 0..3 {
            assert!((la[axis] - lb[axis]).abs() < 1e-5);
        }
    }

    #[test]
    fn write_translates_negative_positions() {
        let mut top = Topology::new("shifted");
        let mut site = Site::new(
            "C",
            Quantity3::from_array([-0.5, 0.2, 0.0], NANOMETER),
        );
        site.residue = Some(GroupLabel::new("MOL", 0));
        top.add_site(site);

        let mut out = Vec::new();
        write_gro_to(&top, &mut out, 3).unwrap();
        let text = String::from_utf8(out).unwrap();
        let atom_line = text.lines().nth(2).unwrap();
        let fields: Vec<&str> = atom_line.split_whitespace().collect();
        let x: f64 = fields[fields.len() - 3].parse().unwrap();
        assert!(x >= 0.0);
    }

    #[test]
    fn write_unlabeled_site_uses_default_residue() {
        let mut top = Topology::new("bare");
        top.add_site(Site::new(
            "Ar",
            Quantity3::from_array([0.1, 0.1, 0.1], NANOMETER),
        ));
        let mut out = Vec::new();
        write_gro_to(&top, &mut out, 3).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.lines().nth(2).unwrap().contains("MOL"));
    }

    #[test]
    fn write_triclinic_box_emits_nine_components() {
        let mut top = Topology::new("triclinic");
        top.add_site(Site::new(
            "C",
            Quantity3::from_array([0.1, 0.1, 0.1], NANOMETER),
        ));
        top.set_simbox(Some(
            SimBox::new(
                Quantity3::from_array([3.0, 3.0, 3.0], NANOMETER),
                Some([
                    Quantity::new(60.0, DEGREE),
                    Quantity::new(90.0, DEGREE),
                    Quantity::new(90.0, DEGREE),
                ]),
            )
            .unwrap(),
        ));
        let mut out = Vec::new();
        write_gro_to(&top, &mut out, 3).unwrap();
        let text = String::from_utf8(out).unwrap();
        let box_line = text.lines().last().unwrap();
        assert_eq!(box_line.split_whitespace().count(), 9);
    }
}
