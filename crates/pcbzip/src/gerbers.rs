use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use colored::Colorize;

use crate::prompt;

/// Extensions KiCad uses for plotted layers and drill files
const GERBER_EXTENSIONS: &[&str] = &[
    "gbr", "drl", "gtp", "gbp", "gbl", "gtl", "gto", "gbo", "gbs", "gts", "gm1",
];

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Manufacturer {
    #[value(name = "seeedstudio")]
    SeeedStudio,
    #[value(name = "pcbway")]
    PcbWay,
    /// JLCPCB with KiCad 5 file names
    #[value(name = "jlcpcb-v5")]
    JlcpcbV5,
    /// JLCPCB with KiCad 6 or later file names
    #[value(name = "jlcpcb")]
    Jlcpcb,
}

impl Manufacturer {
    pub const ALL: [Manufacturer; 4] = [
        Manufacturer::SeeedStudio,
        Manufacturer::PcbWay,
        Manufacturer::JlcpcbV5,
        Manufacturer::Jlcpcb,
    ];

    /// File name endings that must all be present, ordered top layer first
    pub fn required_suffixes(self) -> &'static [&'static str] {
        match self {
            Manufacturer::SeeedStudio => &[
                "F.SilkS.gto",
                "F.Cu.gtl",
                "F.Paste.gtp",
                "F.Mask.gts",
                "B.Paste.gbp",
                "B.Cu.gbl",
                "B.SilkS.gbo",
                "B.Mask.gbs",
                "Dwgs.User.gbr",
                "Edge.Cuts.gm1",
                ".drl",
            ],
            Manufacturer::PcbWay => &[
                "F.Cu.gbr",
                "F.SilkS.gbr",
                "F.Mask.gbr",
                "B.Cu.gbr",
                "B.SilkS.gbr",
                "Edge.Cuts.gbr",
                "B.Mask.gbr",
                ".drl",
            ],
            Manufacturer::JlcpcbV5 => &[
                "F_Cu.gbr",
                "F_SilkS.gbr",
                "F_Mask.gbr",
                "B_Cu.gbr",
                "B_SilkS.gbr",
                "Edge_Cuts.gbr",
                "B_Mask.gbr",
                ".drl",
            ],
            Manufacturer::Jlcpcb => &[
                "F_Cu.gtl",
                "B_Cu.gbl",
                "F_Paste.gtp",
                "B_Paste.gbp",
                "F_Silkscreen.gto",
                "B_Silkscreen.gbo",
                "F_Mask.gts",
                "B_Mask.gbs",
                "Edge_Cuts.gm1",
                ".drl",
            ],
        }
    }

    /// Tag used in the zip file name
    pub fn file_tag(self) -> &'static str {
        match self {
            Manufacturer::SeeedStudio => "seeedstudio",
            Manufacturer::PcbWay => "pcbway",
            Manufacturer::JlcpcbV5 | Manufacturer::Jlcpcb => "jlcpcb",
        }
    }
}

impl fmt::Display for Manufacturer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Manufacturer::SeeedStudio => "SeeedStudio",
            Manufacturer::PcbWay => "PCBWay",
            Manufacturer::JlcpcbV5 => "JLCPCB (KiCad 5)",
            Manufacturer::Jlcpcb => "JLCPCB (KiCad 6+)",
        };
        f.write_str(label)
    }
}

#[derive(Args, Debug, Clone)]
pub struct ZipArgs {
    /// Target manufacturer (prompted for if omitted)
    #[arg(short, long, value_enum)]
    pub manufacturer: Option<Manufacturer>,

    /// Project name used in the zip file name
    #[arg(short, long)]
    pub project: Option<String>,

    /// Board version used in the zip file name
    #[arg(short = 'b', long = "board-version")]
    pub version: Option<String>,

    /// Directory containing the plotted gerber and drill files
    #[arg(long, default_value = ".", value_hint = clap::ValueHint::DirPath)]
    pub dir: PathBuf,

    /// Open the zip in the gerber viewer once created
    #[arg(long)]
    pub view: bool,

    /// Use gerbview (shipped with KiCad) instead of gerbv
    #[arg(long)]
    pub gerbview: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ViewArgs {
    /// Gerber zip file to view
    #[arg(value_name = "ZIP", value_hint = clap::ValueHint::FilePath)]
    pub zip: PathBuf,

    /// Use gerbview (shipped with KiCad) instead of gerbv
    #[arg(long)]
    pub gerbview: bool,
}

pub fn execute_zip(args: ZipArgs) -> Result<()> {
    let manufacturer = match args.manufacturer {
        Some(m) => m,
        None => match prompt::select("Manufacturer:", Manufacturer::ALL.to_vec())? {
            Some(m) => m,
            None => return Ok(()),
        },
    };
    let Some(project) = value_or_prompt(args.project, "Enter the project name:")? else {
        return Ok(());
    };
    let Some(version) = value_or_prompt(args.version, "Enter the version of the board:")? else {
        return Ok(());
    };
    if project.is_empty() || version.is_empty() {
        anyhow::bail!("A project name and a board version are required");
    }

    let files = gerber_files(&args.dir)?;
    let missing = missing_suffixes(&files, manufacturer);
    if !missing.is_empty() {
        println!("Expected filename extension list");
        for suffix in manufacturer.required_suffixes() {
            println!("  {suffix}");
        }
        println!("Missing filename extension list");
        for suffix in &missing {
            println!("  {}", suffix.red());
        }
        anyhow::bail!(
            "Not all required files are present in {} ({} missing)",
            args.dir.display(),
            missing.join(", ")
        );
    }

    let zip_path = args
        .dir
        .join(zip_file_name(&project, &version, manufacturer));
    create_gerbers_zip(&files, &zip_path)
        .with_context(|| format!("Failed to create {}", zip_path.display()))?;
    println!("{} Created {}", "✓".green(), zip_path.display());

    if args.view || args.gerbview {
        view_zip(&zip_path, args.gerbview)?;
    }
    Ok(())
}

pub fn execute_view(args: ViewArgs) -> Result<()> {
    view_zip(&args.zip, args.gerbview)
}

fn value_or_prompt(value: Option<String>, message: &str) -> Result<Option<String>> {
    match value {
        Some(v) => Ok(Some(v.trim().to_string())),
        None => Ok(prompt::text(message)?.map(|v| v.trim().to_string())),
    }
}

pub fn zip_file_name(project: &str, version: &str, manufacturer: Manufacturer) -> String {
    format!("{project}_v{version}_{}.zip", manufacturer.file_tag())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Gerber and drill files directly inside `dir`, sorted by name
pub fn gerber_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let path = entry?.path();
        let is_gerber = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| GERBER_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
        if path.is_file() && is_gerber {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Required suffixes no file ends with
pub fn missing_suffixes(files: &[PathBuf], manufacturer: Manufacturer) -> Vec<&'static str> {
    let names: Vec<String> = files.iter().map(|f| file_name(f)).collect();
    manufacturer
        .required_suffixes()
        .iter()
        .copied()
        .filter(|suffix| !names.iter().any(|n| n.ends_with(suffix)))
        .collect()
}

/// Guess the manufacturer from the file holding its first (top) layer
fn detect_manufacturer(files: &[PathBuf]) -> Option<Manufacturer> {
    const DETECTION_ORDER: [Manufacturer; 4] = [
        Manufacturer::PcbWay,
        Manufacturer::SeeedStudio,
        Manufacturer::JlcpcbV5,
        Manufacturer::Jlcpcb,
    ];
    files.iter().map(|f| file_name(f)).find_map(|name| {
        DETECTION_ORDER
            .into_iter()
            .find(|m| name.ends_with(m.required_suffixes()[0]))
    })
}

/// Order files so the viewer stacks layers top to bottom.
/// Files from an unrecognised layout are returned unchanged.
pub fn layer_order(files: Vec<PathBuf>) -> Vec<PathBuf> {
    let Some(manufacturer) = detect_manufacturer(&files) else {
        return files;
    };
    let mut sorted = Vec::with_capacity(files.len());
    for suffix in manufacturer.required_suffixes() {
        for file in &files {
            if file_name(file).ends_with(suffix) && !sorted.contains(file) {
                sorted.push(file.clone());
            }
        }
    }
    sorted
}

pub fn create_gerbers_zip(files: &[PathBuf], zip_path: &Path) -> Result<()> {
    let zip_file = fs::File::create(zip_path)?;
    let mut zip = zip::ZipWriter::new(zip_file);

    for path in files {
        zip.start_file(file_name(path), zip::write::FileOptions::<()>::default())?;
        let content = fs::read(path)?;
        zip.write_all(&content)?;
    }
    zip.finish()?;
    Ok(())
}

/// Extract every file in the archive into `dest`, flattening directories
fn extract_zip(zip_path: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
    let file = fs::File::open(zip_path)
        .with_context(|| format!("Failed to open {}", zip_path.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("{} is not a zip file", zip_path.display()))?;

    let mut extracted = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let Some(name) = entry.enclosed_name().and_then(|p| p.file_name().map(PathBuf::from))
        else {
            log::debug!("Skipping unsafe zip entry {}", entry.name());
            continue;
        };
        let out_path = dest.join(name);
        let mut out = fs::File::create(&out_path)?;
        io::copy(&mut entry, &mut out)?;
        extracted.push(out_path);
    }
    Ok(extracted)
}

pub fn view_zip(zip_path: &Path, gerbview: bool) -> Result<()> {
    let viewer = if gerbview { "gerbview" } else { "gerbv" };
    let program =
        which::which(viewer).with_context(|| format!("{viewer} was not found on the PATH"))?;

    let temp_dir = tempfile::tempdir()?;
    let files = layer_order(extract_zip(zip_path, temp_dir.path())?);
    log::info!("Running {} with {} files", program.display(), files.len());

    let status = Command::new(&program)
        .args(&files)
        .status()
        .with_context(|| format!("Failed to run {viewer}"))?;
    if !status.success() {
        anyhow::bail!("{viewer} exited with {status}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch_all(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|name| {
                let path = dir.join(name);
                fs::write(&path, format!("G04 {name}*\n")).unwrap();
                path
            })
            .collect()
    }

    const JLCPCB_BOARD: &[&str] = &[
        "board-B_Cu.gbl",
        "board-B_Mask.gbs",
        "board-B_Paste.gbp",
        "board-B_Silkscreen.gbo",
        "board-Edge_Cuts.gm1",
        "board-F_Cu.gtl",
        "board-F_Mask.gts",
        "board-F_Paste.gtp",
        "board-F_Silkscreen.gto",
        "board.drl",
    ];

    #[test]
    fn test_missing_suffixes() {
        let dir = tempfile::tempdir().unwrap();
        touch_all(dir.path(), JLCPCB_BOARD);
        fs::write(dir.path().join("board.kicad_pcb"), "").unwrap();

        let files = gerber_files(dir.path()).unwrap();
        assert_eq!(files.len(), JLCPCB_BOARD.len());
        assert!(missing_suffixes(&files, Manufacturer::Jlcpcb).is_empty());

        let without_paste: Vec<PathBuf> = files
            .iter()
            .filter(|f| !file_name(f).contains("Paste"))
            .cloned()
            .collect();
        assert_eq!(
            missing_suffixes(&without_paste, Manufacturer::Jlcpcb),
            vec!["F_Paste.gtp", "B_Paste.gbp"]
        );
        assert_eq!(
            missing_suffixes(&files, Manufacturer::PcbWay),
            vec![
                "F.Cu.gbr",
                "F.SilkS.gbr",
                "F.Mask.gbr",
                "B.Cu.gbr",
                "B.SilkS.gbr",
                "Edge.Cuts.gbr",
                "B.Mask.gbr",
            ]
        );
    }

    #[test]
    fn test_layer_order_is_top_to_bottom() {
        let files: Vec<PathBuf> = JLCPCB_BOARD.iter().map(PathBuf::from).collect();
        let ordered: Vec<String> = layer_order(files).iter().map(|f| file_name(f)).collect();
        assert_eq!(
            ordered,
            vec![
                "board-F_Cu.gtl",
                "board-B_Cu.gbl",
                "board-F_Paste.gtp",
                "board-B_Paste.gbp",
                "board-F_Silkscreen.gto",
                "board-B_Silkscreen.gbo",
                "board-F_Mask.gts",
                "board-B_Mask.gbs",
                "board-Edge_Cuts.gm1",
                "board.drl",
            ]
        );

        let unknown = vec![PathBuf::from("a.gbr"), PathBuf::from("b.drl")];
        assert_eq!(layer_order(unknown.clone()), unknown);
    }

    #[test]
    fn test_zip_and_extract() {
        let src = tempfile::tempdir().unwrap();
        let files = touch_all(src.path(), JLCPCB_BOARD);
        let zip_path = src
            .path()
            .join(zip_file_name("board", "1.2", Manufacturer::Jlcpcb));
        assert!(zip_path.ends_with("board_v1.2_jlcpcb.zip"));
        create_gerbers_zip(&files, &zip_path).unwrap();

        let dest = tempfile::tempdir().unwrap();
        let mut extracted: Vec<String> = extract_zip(&zip_path, dest.path())
            .unwrap()
            .iter()
            .map(|f| file_name(f))
            .collect();
        extracted.sort();
        assert_eq!(extracted, JLCPCB_BOARD);
        assert_eq!(
            fs::read_to_string(dest.path().join("board.drl")).unwrap(),
            "G04 board.drl*\n"
        );
    }
}
