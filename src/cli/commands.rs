//! Command dispatch and output rendering.

use std::io::{self, Write};

use thiserror::Error;

use crate::cli::args::{CheckoutTarget, Cli, Command};
use crate::storage::{MergeOutcome, RepoConfig, Repository, StorageError};

/// errors surfaced by the command line
#[derive(Debug, Error)]
pub enum CliError {
    /// operands that match no form of the command
    #[error("Incorrect operands.")]
    IncorrectOperands,

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// writing command output failed
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// process exit status for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::IncorrectOperands => 2,
            CliError::Storage(StorageError::InvalidName(_)) => 2,
            CliError::Storage(_) | CliError::Io(_) => 1,
        }
    }

    /// coarse failure class, recorded with the error in the logs
    pub fn kind(&self) -> &'static str {
        match self {
            CliError::IncorrectOperands | CliError::Storage(StorageError::InvalidName(_)) => "usage",
            CliError::Storage(e) if e.is_state() => "state",
            CliError::Storage(e) if e.is_not_found() => "not-found",
            CliError::Storage(e) if e.is_precondition() => "precondition",
            CliError::Storage(_) | CliError::Io(_) => "io",
        }
    }

    /// whether the repository itself is unusable, not just this request
    pub fn is_fatal(&self) -> bool {
        self.kind() == "state"
    }
}

pub type CliResult<T> = Result<T, CliError>;

impl Cli {
    pub fn config(&self) -> RepoConfig {
        RepoConfig::new(&self.dir)
    }
}

/// Run one parsed command, writing its output to `out`.
pub fn run(cli: &Cli, out: &mut impl Write) -> CliResult<()> {
    let config = cli.config();
    tracing::debug!(dir = %config.work_dir.display(), command = ?cli.command, "running command");

    match &cli.command {
        Command::Init => {
            Repository::init(config)?;
        }
        Command::Add { file } => {
            Repository::open_for_write(config)?.add(file)?;
        }
        Command::Commit { message } => {
            Repository::open_for_write(config)?.commit(message)?;
        }
        Command::Rm { file } => {
            Repository::open_for_write(config)?.remove(file)?;
        }
        Command::Log => {
            for entry in Repository::open(config)?.log()? {
                writeln!(out, "{}", entry)?;
            }
        }
        Command::GlobalLog => {
            for entry in Repository::open(config)?.global_log()? {
                writeln!(out, "{}", entry)?;
            }
        }
        Command::Find { message } => {
            for id in Repository::open(config)?.find(message)? {
                writeln!(out, "{}", id)?;
            }
        }
        Command::Status => {
            write!(out, "{}", Repository::open(config)?.status()?)?;
        }
        Command::Checkout { target, file } => {
            let target = CheckoutTarget::parse(target.as_deref(), file)
                .ok_or(CliError::IncorrectOperands)?;
            let mut repo = Repository::open_for_write(config)?;
            match target {
                CheckoutTarget::Branch(branch) => repo.checkout_branch(branch)?,
                CheckoutTarget::File(file) => repo.checkout_file(file)?,
                CheckoutTarget::FileFrom { commit, file } => repo.checkout_file_from(commit, file)?,
            }
        }
        Command::Branch { name } => {
            Repository::open_for_write(config)?.create_branch(name)?;
        }
        Command::RmBranch { name } => {
            Repository::open_for_write(config)?.remove_branch(name)?;
        }
        Command::Reset { commit } => {
            Repository::open_for_write(config)?.reset(commit)?;
        }
        Command::Merge { branch } => {
            let outcome = Repository::open_for_write(config)?.merge(branch)?;
            render_merge(&outcome, out)?;
        }
    }

    out.flush()?;
    Ok(())
}

fn render_merge(outcome: &MergeOutcome, out: &mut impl Write) -> io::Result<()> {
    match outcome {
        MergeOutcome::AlreadyUpToDate => {
            writeln!(out, "Given branch is an ancestor of the current branch.")
        }
        MergeOutcome::FastForwarded(_) => writeln!(out, "Current branch fast-forwarded."),
        MergeOutcome::Merged { conflicts, .. } if !conflicts.is_empty() => {
            writeln!(out, "Encountered a merge conflict.")
        }
        MergeOutcome::Merged { .. } => Ok(()),
    }
}
