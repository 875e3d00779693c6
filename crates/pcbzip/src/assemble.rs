use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use colored::Colorize;
use comfy_table::Table;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use pcbzip_bom::{
    ACTIONS, Action, AssemblyCommand, AssemblyConfig, AssemblySession, AssemblyState, BomLine,
    ResumePolicy, normalize,
};

use crate::prompt;

/// Column names JLCPCB expects in the component placement list
const CPL_HEADER: &str = "Designator,Val,Package,Mid X,Mid Y,Rotation,Layer";

#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum Side {
    #[default]
    Top,
    Bottom,
    All,
}

impl Side {
    fn as_str(self) -> &'static str {
        match self {
            Side::Top => "top",
            Side::Bottom => "bottom",
            Side::All => "all",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Args, Debug, Clone)]
pub struct AssembleArgs {
    /// KiCad project name (defaults to the only .kicad_pro in the directory)
    #[arg(short, long)]
    pub project: Option<String>,

    /// BOM file (defaults to <project>.csv)
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub bom: Option<PathBuf>,

    /// Board side of the placement file <project>-<side>-pos.csv
    #[arg(long, default_value_t = Side::Top)]
    pub side: Side,

    /// Directory containing the KiCad output files
    #[arg(long, default_value = ".", value_hint = clap::ValueHint::DirPath)]
    pub dir: PathBuf,

    /// Output directory for the assembly files, relative to --dir
    #[arg(short, long, default_value = "assembly")]
    pub output: PathBuf,

    /// Start at the first BOM line instead of the first one without a part number
    #[arg(long)]
    pub restart: bool,

    /// Rewrite the BOM into the assembly format without asking
    #[arg(short, long)]
    pub yes: bool,
}

pub fn execute(args: AssembleArgs) -> Result<()> {
    let project = match args.project {
        Some(project) => project,
        None => find_project(&args.dir)?,
    };
    let search_dir = fs::canonicalize(&args.dir).unwrap_or_else(|_| args.dir.clone());

    let bom_path = args
        .bom
        .unwrap_or_else(|| args.dir.join(format!("{project}.csv")));
    if !bom_path.is_file() {
        anyhow::bail!("Failed to find the BOM file {}", bom_path.display());
    }

    let placement_name = format!("{project}-{}-pos.csv", args.side);
    let placement_path = args.dir.join(&placement_name);
    if !placement_path.is_file() {
        eprintln!(
            "ERROR: Failed to find the placement file {placement_name} in {}",
            search_dir.display()
        );
        std::process::exit(1);
    }

    if !normalize_bom(&bom_path, args.yes)? {
        return Ok(());
    }

    let resume = if args.restart {
        ResumePolicy::Restart
    } else {
        ResumePolicy::FirstUnassigned
    };
    let state = run_assignment(AssemblyConfig {
        bom_path: bom_path.clone(),
        resume,
    })?;
    if state == AssemblyState::Aborted {
        println!(
            "{} Aborted, assignments so far are saved in {}",
            "!".yellow(),
            bom_path.display()
        );
        return Ok(());
    }

    let out_dir = args.dir.join(&args.output);
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let bom_out = out_dir.join(format!("{project}_bom.csv"));
    fs::copy(&bom_path, &bom_out)
        .with_context(|| format!("Failed to copy {}", bom_path.display()))?;

    let cpl_out = out_dir.join(format!("{project}_cpl.csv"));
    let placement = fs::read_to_string(&placement_path)
        .with_context(|| format!("Failed to read {}", placement_path.display()))?;
    fs::write(&cpl_out, rewrite_cpl_header(&placement))?;

    println!("{} Assembly files written:", "✓".green());
    println!("  {}", bom_out.display());
    println!("  {}", cpl_out.display());
    Ok(())
}

/// Project name from the single `.kicad_pro` file in `dir`
fn find_project(dir: &Path) -> Result<String> {
    let mut projects = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let path = entry?.path();
        if path.extension().is_some_and(|e| e == "kicad_pro") {
            if let Some(stem) = path.file_stem() {
                projects.push(stem.to_string_lossy().into_owned());
            }
        }
    }
    match projects.as_slice() {
        [project] => Ok(project.clone()),
        [] => anyhow::bail!(
            "No KiCad project found in {}, pass --project",
            dir.display()
        ),
        _ => anyhow::bail!(
            "Several KiCad projects found in {} ({}), pass --project",
            dir.display(),
            projects.join(", ")
        ),
    }
}

/// Bring the BOM into the four column shape. Returns `false` if the user
/// declined the rewrite, in which case the file is not touched.
fn normalize_bom(bom_path: &Path, yes: bool) -> Result<bool> {
    let bom = normalize::read_bom(bom_path)
        .with_context(|| format!("Failed to read the BOM {}", bom_path.display()))?;
    if bom.skipped > 0 {
        println!(
            "{} {} BOM rows without a designator or footprint would be dropped by the rewrite",
            "!".yellow(),
            bom.skipped
        );
    }
    if !bom.needs_rewrite {
        return Ok(true);
    }

    let question = format!(
        "Rewrite {} with the columns {}?",
        bom_path.display(),
        normalize::CANONICAL_HEADER.join(",")
    );
    let confirmed = yes || prompt::confirm(&question, true)?.unwrap_or(false);
    if confirmed {
        bom.write_back(bom_path)?;
        log::info!("Rewrote {} ({} lines)", bom_path.display(), bom.lines.len());
        return Ok(true);
    }

    println!(
        "{} {} was left unchanged; part numbers can only be assigned to a BOM in the assembly format",
        "!".yellow(),
        bom_path.display()
    );
    Ok(false)
}

fn run_assignment(config: AssemblyConfig) -> Result<AssemblyState> {
    let mut session = AssemblySession::open(config)?;
    let total = session.lines().len();
    if total == 0 {
        println!("The BOM has no lines to assign");
        return Ok(session.state());
    }

    let help = ACTIONS
        .iter()
        .map(|a| format!("{} {}", a.code, a.help.to_lowercase()))
        .chain(std::iter::once("empty = not fitted".to_string()))
        .collect::<Vec<_>>()
        .join(", ");

    while let Some((i, line)) = session.current() {
        println!("{}", line_table(i, total, line));
        let command = match prompt::text_with_help("Part number:", &help)? {
            Some(input) => AssemblyCommand::parse(&input),
            None => AssemblyCommand::Navigate(Action::Abort),
        };
        session.apply(command)?;
    }

    let assigned = session.lines().iter().filter(|l| l.is_assigned()).count();
    log::info!("{assigned} of {total} BOM lines have a part number");
    Ok(session.state())
}

fn line_table(i: usize, total: usize, line: &BomLine) -> Table {
    let part_number = if line.is_assigned() {
        line.part_number.clone()
    } else {
        "-".to_string()
    };

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec![format!("Line {} of {total}", i + 1), String::new()]);
    table.add_row(vec!["Comment".to_string(), line.comment.clone()]);
    table.add_row(vec![
        "Designator".to_string(),
        format!("{} ({})", line.designator, line.quantity()),
    ]);
    table.add_row(vec!["Footprint".to_string(), line.footprint.clone()]);
    table.add_row(vec!["Part number".to_string(), part_number]);
    table
}

/// Replace the KiCad placement header with the one JLCPCB expects
fn rewrite_cpl_header(content: &str) -> String {
    let mut out = String::from(CPL_HEADER);
    out.push('\n');
    for line in content.lines().skip(1) {
        out.push_str(line);
        out.push('\n');
    }
    out
}
