use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{exit, Command, ExitStatus};

use clap::{Parser, Subcommand, ValueEnum};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the CV ingestion workspace",
    long_about = "A unified CLI for local ingestion runs, CI checks and\n\
                  Lambda packaging in the CV ingestion workspace."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run CI checks (fmt, clippy, tests)
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::Check)]
        job: CiJob,
    },
    /// Ingest a local CSV file (dry run unless a database URL is given)
    Ingest {
        /// CSV file to ingest
        #[arg(long)]
        file: String,
        /// Data category (users, affiliations, declarations, grants, patents, cv_data)
        #[arg(long)]
        category: Option<String>,
        /// PostgreSQL connection string
        #[arg(long, env = "DATABASE_URL")]
        database_url: Option<String>,
        /// Directory receiving the JSON report
        #[arg(long)]
        report_dir: Option<String>,
    },
    /// Build and package the ingestion Lambda for Terraform inputs
    ServerlessPackage {
        /// Compilation target triple for Lambda binaries
        #[arg(long, default_value = "x86_64-unknown-linux-gnu")]
        target: String,
        /// Build profile used for binaries
        #[arg(value_enum, long, default_value_t = BuildProfile::Release)]
        profile: BuildProfile,
    },
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting and clippy
    Check,
    /// Check plus the test suites of both crates
    All,
}

#[derive(Clone, Copy, ValueEnum)]
enum BuildProfile {
    Debug,
    Release,
}

impl BuildProfile {
    fn dir_name(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
        }
    }

    fn as_cargo_flag(self) -> Option<&'static str> {
        match self {
            Self::Debug => None,
            Self::Release => Some("--release"),
        }
    }
}

// ── helpers ────────────────────────────────────────────────────────

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn cargo(args: &[&str]) -> ExitStatus {
    eprintln!("+ cargo {}", args.join(" "));
    Command::new("cargo")
        .args(args)
        .status()
        .expect("failed to execute cargo")
}

fn run_cargo(args: &[&str]) {
    let status = cargo(args);
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

/// A Lambda binary and the zip Terraform expects it in.
struct LambdaArtifact<'a> {
    bin: &'a str,
    dist_dir: &'a str,
    zip_name: &'a str,
}

const INGEST_ARTIFACT: LambdaArtifact<'static> = LambdaArtifact {
    bin: "ingest_lambda",
    dist_dir: "infra/aws_cv_ingest/dist",
    zip_name: "ingest.zip",
};

fn package_ingest_lambda(target: &str, profile: BuildProfile) -> Result<(), String> {
    check_rust_target(target)?;

    let artifact = &INGEST_ARTIFACT;
    step("Build ingestion lambda binary");
    let mut cargo_args = vec![
        "build",
        "-p",
        "cv_ingest_lambda",
        "--target",
        target,
        "--bin",
        artifact.bin,
    ];
    if let Some(flag) = profile.as_cargo_flag() {
        cargo_args.push(flag);
    }
    run_cargo(&cargo_args);

    step("Package Terraform lambda zip artifact");
    let binary_path = Path::new("target")
        .join(target)
        .join(profile.dir_name())
        .join(artifact.binary_file(target));
    let zip_path = write_bootstrap_zip(&binary_path, artifact)?;

    eprintln!("\nPackaged artifact:\n- {}", zip_path.display());
    Ok(())
}

/// Fails when `rustup` reports the target missing. A machine without
/// `rustup` is let through with a warning.
fn check_rust_target(target: &str) -> Result<(), String> {
    let output = match Command::new("rustup")
        .args(["target", "list", "--installed"])
        .output()
    {
        Ok(output) => output,
        Err(error) => {
            eprintln!("warning: rustup unavailable ({error}); skipping target check for {target}");
            return Ok(());
        }
    };

    if !output.status.success() {
        return Err(format!(
            "`rustup target list --installed` failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    if String::from_utf8_lossy(&output.stdout)
        .lines()
        .any(|line| line.trim() == target)
    {
        Ok(())
    } else {
        Err(format!(
            "rust target `{target}` is not installed; run `rustup target add {target}`"
        ))
    }
}

impl LambdaArtifact<'_> {
    fn binary_file(&self, target: &str) -> String {
        if target.contains("windows") {
            format!("{}.exe", self.bin)
        } else {
            self.bin.to_string()
        }
    }
}

/// Lambda's custom runtime runs the archive entry named `bootstrap`.
fn write_bootstrap_zip(
    binary_path: &Path,
    artifact: &LambdaArtifact<'_>,
) -> Result<PathBuf, String> {
    let binary = fs::read(binary_path)
        .map_err(|error| format!("cannot read lambda binary {}: {error}", binary_path.display()))?;
    let dist_dir = Path::new(artifact.dist_dir);
    fs::create_dir_all(dist_dir)
        .map_err(|error| format!("cannot create {}: {error}", dist_dir.display()))?;

    let zip_path = dist_dir.join(artifact.zip_name);
    let file = fs::File::create(&zip_path)
        .map_err(|error| format!("cannot create {}: {error}", zip_path.display()))?;
    zip_bootstrap(file, &binary)
        .map_err(|error| format!("cannot write {}: {error}", zip_path.display()))?;
    Ok(zip_path)
}

fn zip_bootstrap(file: fs::File, binary: &[u8]) -> zip::result::ZipResult<()> {
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o755);
    zip.start_file("bootstrap", options)?;
    zip.write_all(binary)?;
    zip.finish()?;
    Ok(())
}

// ── CI jobs ────────────────────────────────────────────────────────

fn ci_check() {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"]);

    step("Clippy");
    run_cargo(&[
        "clippy",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ]);
}

fn ci_tests() {
    step("Test cv_ingest_core");
    run_cargo(&["test", "-p", "cv_ingest_core"]);

    step("Test cv_ingest_lambda");
    run_cargo(&["test", "-p", "cv_ingest_lambda"]);
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ci { job } => match job {
            CiJob::Check => ci_check(),
            CiJob::All => {
                ci_check();
                ci_tests();
            }
        },
        Commands::Ingest {
            file,
            category,
            database_url,
            report_dir,
        } => {
            let mut args = vec![
                "run",
                "-p",
                "cv_ingest_lambda",
                "--bin",
                "ingest_local",
                "--",
                "--file",
                file.as_str(),
            ];
            if let Some(category) = category.as_deref() {
                args.extend(["--category", category]);
            }
            if let Some(url) = database_url.as_deref() {
                args.extend(["--database-url", url]);
            }
            if let Some(dir) = report_dir.as_deref() {
                args.extend(["--report-dir", dir]);
            }
            run_cargo(&args);
        }
        Commands::ServerlessPackage { target, profile } => {
            if let Err(error) = package_ingest_lambda(&target, profile) {
                eprintln!("error: {error}");
                exit(1);
            }
        }
    }
}
