//! # mtcard
//!
//! Command-line entry point for the multitenant card initializer.
//!
//! - `mtcard discover` runs the pipeline for one viewer and prints the
//!   resulting job registry as JSON
//! - `mtcard seal` builds the job name an app submits so that `discover`
//!   can later decode it

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result, ensure};
use clap::{Args, Parser, Subcommand};
use mtcard_core::payload::{self, SEGMENT_SEPARATOR, keys::KeyMaterial};
use mtcard_core::{MultiTenant, Viewer, logging};
use mtcard_settings::MtSettings;

/// Multitenant session card initializer.
#[derive(Parser, Debug)]
#[command(name = "mtcard", about = "Multitenant session card initializer")]
struct Cli {
    /// Settings file (defaults to `$MULTITENANT_SETTINGS`, then
    /// `/etc/mtcard/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Discover shared jobs for a viewer and write their session cards.
    Discover(DiscoverArgs),
    /// Print the job name carrying an encrypted payload.
    Seal(SealArgs),
}

#[derive(Args, Debug)]
struct DiscoverArgs {
    /// Viewer's numeric uid.
    #[arg(long)]
    uid: u32,

    /// Viewer's login name.
    #[arg(long)]
    user: String,

    /// Viewer's groups (repeatable or comma-separated).
    #[arg(long = "group", value_delimiter = ',')]
    groups: Vec<String>,

    /// Override the configured dataroot.
    #[arg(long)]
    dataroot: Option<PathBuf>,

    /// Run even when the activation gate is off.
    #[arg(long)]
    force: bool,
}

#[derive(Args, Debug)]
struct SealArgs {
    /// Scheduler job id.
    #[arg(long)]
    job_id: String,

    /// Submitting user.
    #[arg(long)]
    submitter: String,

    /// Group whose members may see the job.
    #[arg(long)]
    group: String,

    /// Accounting JSON (`mti`, `mtd`, `mta`, `mtu`, `mtm`).
    #[arg(long)]
    accounting: String,

    /// Connection JSON, flat string values.
    #[arg(long)]
    connection: String,

    /// Leading job-name field kept for older dashboards.
    #[arg(long, default_value = "multitenant")]
    legacy_name: String,
}

fn load_settings(path: Option<&PathBuf>) -> Result<MtSettings> {
    match path {
        Some(path) => mtcard_settings::load_settings_from_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display())),
        None => mtcard_settings::load_settings().context("Failed to load settings"),
    }
}

async fn discover(settings: &MtSettings, args: DiscoverArgs) -> Result<String> {
    let viewer = Viewer::new(args.uid, args.user, args.groups);
    let mut pipeline = MultiTenant::from_settings(settings);
    if let Some(root) = args.dataroot {
        pipeline = pipeline.with_dataroot(root);
    }

    let registry = if args.force {
        Some(pipeline.run(&viewer).await?)
    } else {
        pipeline.run_if_enabled(&viewer).await?
    };

    match registry {
        Some(registry) => {
            serde_json::to_string_pretty(&registry).context("Failed to serialize registry")
        }
        None => {
            tracing::info!("multitenant discovery disabled; set MULTITENANT_ENABLE=1 or pass --force");
            Ok("{}".to_string())
        }
    }
}

fn seal(args: &SealArgs) -> Result<String> {
    for (name, value) in [
        ("legacy name", &args.legacy_name),
        ("group", &args.group),
        ("accounting", &args.accounting),
        ("connection", &args.connection),
    ] {
        ensure!(
            !value.contains(SEGMENT_SEPARATOR),
            "{name} must not contain '{SEGMENT_SEPARATOR}'"
        );
    }

    let material = KeyMaterial::derive(&args.job_id, &args.submitter);
    let message = payload::encode(&material, &args.accounting, &args.connection)
        .context("Failed to compress payload")?;
    Ok(payload::job_name(&args.legacy_name, &args.group, &message))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(cli.settings.as_ref())?;
    logging::init_subscriber(&settings.logging.level);

    let output = match cli.command {
        Command::Discover(args) => discover(&settings, args).await?,
        Command::Seal(args) => seal(&args)?,
    };
    println!("{output}");
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn seal_args(accounting: &str) -> SealArgs {
        SealArgs {
            job_id: "123".into(),
            submitter: "alice".into(),
            group: "grp1".into(),
            accounting: accounting.into(),
            connection: "{'host':'n1','port':'8080'}".into(),
            legacy_name: "multitenant".into(),
        }
    }

    #[test]
    fn parses_discover_groups() {
        let cli = Cli::try_parse_from([
            "mtcard", "discover", "--uid", "1001", "--user", "bob", "--group", "grp1,grp2",
            "--group", "grp3",
        ])
        .unwrap();
        let Command::Discover(args) = cli.command else {
            panic!("expected discover");
        };
        assert_eq!(args.uid, 1001);
        assert_eq!(args.groups, vec!["grp1", "grp2", "grp3"]);
        assert!(!args.force);
    }

    #[test]
    fn settings_flag_is_global() {
        let cli = Cli::try_parse_from([
            "mtcard", "seal", "--job-id", "1", "--submitter", "a", "--group", "g",
            "--accounting", "{}", "--connection", "{}", "--settings", "/tmp/s.json",
        ])
        .unwrap();
        assert_eq!(cli.settings, Some(PathBuf::from("/tmp/s.json")));
    }

    #[test]
    fn sealed_name_decodes_with_job_key() {
        let acc = "{'mti':'abc','mtd':'tok','mta':'App','mtu':'1001','mtm':'card'}";
        let name = seal(&seal_args(acc)).unwrap();

        let mut fields = name.splitn(3, SEGMENT_SEPARATOR);
        assert_eq!(fields.next(), Some("multitenant"));
        assert_eq!(fields.next(), Some("grp1"));
        let decoded =
            payload::decode(fields.next().unwrap(), &KeyMaterial::derive("123", "alice")).unwrap();
        assert_eq!(decoded.accounting.mti, "abc");
        assert_eq!(decoded.connection.get("port"), Some("8080"));
    }

    #[test]
    fn seal_rejects_separator_in_segment() {
        let err = seal(&seal_args("{'mti':'a|b'}")).unwrap_err();
        assert!(err.to_string().contains("accounting"));
    }

    #[tokio::test]
    async fn discover_respects_gate() {
        let dir = tempfile::tempdir().unwrap();
        let args = DiscoverArgs {
            uid: 1001,
            user: "bob".into(),
            groups: vec!["grp1".into()],
            dataroot: Some(dir.path().to_path_buf()),
            force: false,
        };
        let out = discover(&MtSettings::default(), args).await.unwrap();
        assert_eq!(out, "{}");
    }
}
