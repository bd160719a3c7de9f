//! Operator front end for inventory edits.
//!
//! Each subcommand runs one commit against the configured PostgreSQL
//! inventory and prints the outcome as `key=value` lines.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cap_std::{ambient_authority, fs::Dir};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Context, Result, eyre};
use ortho_config::OrthoConfig;
use tokio::runtime::Builder;
use tracing_subscriber::{EnvFilter, fmt};

use edgeconfig::config::InventorySettings;
use edgeconfig::domain::ports::InventoryStore;
use edgeconfig::domain::{
    ChangeCommitCoordinator, CommitError, CpuAssignment, CpuId, DirtyMarks, EdgeFile, EdgeFileId,
    MembershipOutcome, RoleEditOutcome, RoleEditRequest, RoleId,
};
use edgeconfig::outbound::persistence::{
    DbPool, DieselInventoryStore, PoolConfig, apply_migrations,
};

/// `edgeconfig-admin` command arguments.
#[derive(Debug, Parser)]
#[command(
    name = "edgeconfig-admin",
    about = "Commit role, account, edgefile and cpu edits to the edge inventory",
    version
)]
struct CliArgs {
    /// Database connection URL. Overrides `EDGECONFIG_DATABASE_URL`.
    #[arg(long = "database-url", value_name = "url", global = true)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply pending schema migrations.
    Migrate,
    /// Move a role to another cpu and/or rename its accounts.
    RoleEdit {
        #[arg(long = "role-id")]
        role_id: i64,
        /// Target cpu id, or `NONE` to unassign.
        #[arg(long)]
        cpu: CpuAssignment,
        /// Space-separated accounts, same count as today.
        #[arg(long)]
        accounts: String,
    },
    /// Add or remove accounts without renaming anything.
    AccountsSet {
        #[arg(long = "role-id")]
        role_id: i64,
        #[arg(long)]
        accounts: String,
    },
    /// Create or overwrite an edgefile.
    EdgefileSave {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        name: String,
        /// File holding the new content.
        #[arg(long = "content-file", value_name = "path")]
        content_file: PathBuf,
    },
    /// Update cpu attributes.
    CpuEdit {
        #[arg(long = "cpu-id")]
        cpu_id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long = "node-number")]
        node_number: Option<i32>,
        #[arg(long)]
        ipadr: Option<String>,
        #[arg(long)]
        os: Option<String>,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(message) = install_tracing() {
        eprintln!("{message}");
    }

    let args = CliArgs::parse();
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .wrap_err("failed to build Tokio runtime")?;
    runtime.block_on(run(args))
}

/// Install the JSON subscriber, returning the failure text for stderr.
fn install_tracing() -> std::result::Result<(), String> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
        .map_err(|error| format!("tracing init failed: {error}"))
}

async fn run(args: CliArgs) -> Result<()> {
    let mut settings =
        InventorySettings::load_from_iter([OsString::from("edgeconfig-admin")])
            .wrap_err("failed to load settings")?;
    if let Some(url) = args.database_url {
        settings.database_url = Some(url);
    }

    if matches!(args.command, Command::Migrate) {
        let versions = apply_migrations(settings.database_url())?;
        println!("migrations_applied={}", versions.len());
        for version in versions {
            println!("migration={version}");
        }
        return Ok(());
    }

    let naming_rules = settings
        .naming_rules()
        .wrap_err("failed to load naming rules")?;
    let pool = DbPool::new(PoolConfig::from_settings(&settings)).await?;
    let store = Arc::new(DieselInventoryStore::new(pool));
    let coordinator = ChangeCommitCoordinator::new(Arc::clone(&store), Arc::new(naming_rules));

    let lines = match args.command {
        Command::Migrate => Vec::new(),
        Command::RoleEdit {
            role_id,
            cpu,
            accounts,
        } => {
            let outcome = coordinator
                .commit_role_edit(RoleEditRequest {
                    role_id: RoleId::new(role_id),
                    cpu,
                    accounts,
                })
                .await
                .map_err(report_commit_error)?;
            role_edit_lines(&outcome)
        }
        Command::AccountsSet { role_id, accounts } => {
            let outcome = coordinator
                .commit_account_membership(RoleId::new(role_id), &accounts)
                .await
                .map_err(report_commit_error)?;
            membership_lines(&outcome)
        }
        Command::EdgefileSave {
            id,
            name,
            content_file,
        } => {
            let content = read_text(&content_file)?;
            let edge_file = EdgeFile {
                id: EdgeFileId::new(id),
                name,
                content,
            };
            let outcome = coordinator
                .commit_edge_file_edit(&edge_file)
                .await
                .map_err(report_commit_error)?;
            marks_lines(&outcome.marks)
        }
        Command::CpuEdit {
            cpu_id,
            name,
            node_number,
            ipadr,
            os,
        } => {
            let cpu_id = CpuId::new(cpu_id);
            let mut cpu = store
                .get_cpu(cpu_id)
                .await?
                .ok_or_else(|| eyre!("cpu {cpu_id} does not exist"))?;
            if let Some(name) = name {
                cpu.name = name;
            }
            if let Some(node_number) = node_number {
                cpu.node_number = node_number;
            }
            if let Some(ipadr) = ipadr {
                cpu.ipadr = ipadr;
            }
            if let Some(os) = os {
                cpu.os = os;
            }
            let outcome = coordinator
                .commit_cpu_edit(&cpu)
                .await
                .map_err(report_commit_error)?;
            marks_lines(&outcome.marks)
        }
    };

    for line in lines {
        println!("{line}");
    }
    Ok(())
}

fn report_commit_error(error: CommitError) -> color_eyre::Report {
    let code = serde_json::to_value(error.code())
        .ok()
        .and_then(|value| value.as_str().map(str::to_owned))
        .unwrap_or_default();
    println!("status=failed");
    println!("code={code}");
    println!("inventory_unchanged={}", error.left_inventory_unchanged());
    color_eyre::Report::new(error)
}

fn read_text(path: &Path) -> Result<String> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| eyre!("content path must name a file"))?;
    let directory = Dir::open_ambient_dir(parent, ambient_authority())
        .wrap_err_with(|| format!("open directory '{}'", parent.display()))?;
    directory
        .read_to_string(Path::new(file_name))
        .wrap_err_with(|| format!("read '{}'", path.display()))
}

fn join<T: ToString>(items: impl IntoIterator<Item = T>) -> String {
    items
        .into_iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn marks_lines(marks: &DirtyMarks) -> Vec<String> {
    vec![
        "status=committed".to_owned(),
        format!("dirty_roles={}", join(&marks.roles)),
        format!("dirty_cpus={}", join(&marks.cpus)),
    ]
}

fn role_edit_lines(outcome: &RoleEditOutcome) -> Vec<String> {
    let mut lines = marks_lines(&outcome.marks);
    lines.push(format!("role={}", outcome.role.name));
    lines.push(format!("cpu={}", outcome.role.cpu));
    lines.push(format!("accounts={}", outcome.role.accounts));
    for applied in &outcome.renames.applied {
        lines.push(format!(
            "rename={} edgefiles={} thread_assignments={}",
            applied.rename, applied.edge_files, applied.thread_assignments
        ));
    }
    lines
}

fn membership_lines(outcome: &MembershipOutcome) -> Vec<String> {
    let mut lines = marks_lines(&outcome.marks);
    lines.push(format!("accounts={}", outcome.role.accounts));
    lines.push(format!("added={}", outcome.added.join(",")));
    lines.push(format!("removed={}", outcome.removed.join(",")));
    lines.push(format!(
        "orphaned_thread_assignments={}",
        join(outcome.orphaned.iter().map(|assignment| assignment.id))
    ));
    lines
}

#[cfg(test)]
mod tests {
    //! Argument parsing and outcome rendering.

    use edgeconfig::domain::{AccountSet, AppliedRename, Rename, RenameReport, Role};
    use rstest::rstest;

    use super::*;

    fn role() -> Role {
        Role {
            id: RoleId::new(1),
            name: "gacq1".to_owned(),
            ipadr: String::new(),
            accounts: AccountSet::parse("vdl vdl3"),
            cpu: CpuAssignment::Assigned(CpuId::new(2)),
            has_data: true,
            description: String::new(),
        }
    }

    #[rstest]
    #[case("NONE", CpuAssignment::Unassigned)]
    #[case("0", CpuAssignment::Unassigned)]
    #[case("7", CpuAssignment::Assigned(CpuId::new(7)))]
    fn role_edit_accepts_cpu_tokens(#[case] raw: &str, #[case] expected: CpuAssignment) {
        let args = CliArgs::try_parse_from([
            "edgeconfig-admin",
            "role-edit",
            "--role-id",
            "1",
            "--cpu",
            raw,
            "--accounts",
            "vdl vdl2",
        ])
        .expect("arguments parse");
        let Command::RoleEdit { cpu, .. } = args.command else {
            panic!("expected role-edit");
        };
        assert_eq!(cpu, expected);
    }

    #[rstest]
    fn second_tracing_install_reports_a_message() {
        let _ = install_tracing();
        let message = install_tracing().expect_err("a global subscriber is already set");
        assert!(message.starts_with("tracing init failed"));
    }

    #[rstest]
    fn role_edit_rejects_garbage_cpu() {
        let parsed = CliArgs::try_parse_from([
            "edgeconfig-admin",
            "role-edit",
            "--role-id",
            "1",
            "--cpu",
            "alpha",
            "--accounts",
            "vdl",
        ]);
        assert!(parsed.is_err());
    }

    #[rstest]
    fn role_edit_lines_list_renames() {
        let mut marks = DirtyMarks::default();
        marks.roles.insert(RoleId::new(1));
        let outcome = RoleEditOutcome {
            role: role(),
            renames: RenameReport {
                applied: vec![AppliedRename {
                    rename: Rename::new("vdl2", "vdl3"),
                    edge_files: 2,
                    thread_assignments: 1,
                }],
            },
            marks,
        };

        let lines = role_edit_lines(&outcome);
        assert_eq!(
            lines,
            [
                "status=committed",
                "dirty_roles=1",
                "dirty_cpus=",
                "role=gacq1",
                "cpu=2",
                "accounts=vdl vdl3",
                "rename=vdl2 -> vdl3 edgefiles=2 thread_assignments=1",
            ]
        );
    }
}
