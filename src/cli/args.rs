//! Command-line arguments.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

/// grove - a small content-addressed version control system
#[derive(Debug, Parser)]
#[command(name = "grove")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if started in <DIR>
    #[arg(short = 'C', value_name = "DIR", default_value = ".", global = true)]
    pub dir: PathBuf,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a new repository in the working directory
    Init,
    /// Stage a file for the next commit
    Add {
        /// File to stage
        file: String,
    },
    /// Record the staged changes
    Commit {
        /// Commit message
        message: String,
    },
    /// Unstage a file, or stage its removal and delete it
    Rm {
        /// File to remove
        file: String,
    },
    /// Show the history of the current branch
    Log,
    /// Show every commit ever made
    GlobalLog,
    /// Print the ids of commits with the given message
    Find {
        /// Exact commit message
        message: String,
    },
    /// Show branches, staged files and working-tree changes
    Status,
    /// Switch branches or restore a file
    ///
    /// `checkout <branch>`, `checkout -- <file>` or `checkout <commit> -- <file>`
    Checkout {
        /// Branch name, or commit id when a file follows `--`
        target: Option<String>,
        /// File to restore
        #[arg(last = true)]
        file: Vec<String>,
    },
    /// Create a branch at the current commit
    Branch {
        /// Branch name
        name: String,
    },
    /// Delete a branch pointer
    RmBranch {
        /// Branch name
        name: String,
    },
    /// Check out a commit and move the current branch to it
    Reset {
        /// Commit id or unique prefix
        commit: String,
    },
    /// Merge a branch into the current branch
    Merge {
        /// Branch to merge
        branch: String,
    },
}

/// what a `checkout` invocation asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutTarget<'a> {
    Branch(&'a str),
    File(&'a str),
    FileFrom { commit: &'a str, file: &'a str },
}

impl<'a> CheckoutTarget<'a> {
    /// interpret the operands; `None` means they match no checkout form
    pub fn parse(target: Option<&'a str>, file: &'a [String]) -> Option<Self> {
        match (target, file) {
            (Some(branch), []) => Some(CheckoutTarget::Branch(branch)),
            (None, [file]) => Some(CheckoutTarget::File(file)),
            (Some(commit), [file]) => Some(CheckoutTarget::FileFrom { commit, file }),
            _ => None,
        }
    }
}
