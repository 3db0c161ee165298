use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

#[derive(Parser)]
#[command(name = "clean-streets")]
#[command(about = "Civic cleanliness reporting with photo-verified resolution")]
#[command(long_about = "Clean Streets tracks citizen-reported cleanliness issues from report to \
                       verified resolution. Photos are checked by a waste classifier, and every \
                       change fans out to notifications, email and real-time subscribers. \
                       Start with 'clean-streets migrate' and 'clean-streets add-user'.")]
pub struct Cli {
    /// Extra configuration file layered over clean-streets.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database and apply migrations
    Migrate,
    /// Register a citizen, official or admin
    AddUser {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "citizen", help = "citizen, official or admin")]
        role: String,
        #[arg(long, help = "Ward the user belongs to")]
        ward: Option<String>,
    },
    /// Change a user's role (admins only)
    SetRole {
        #[arg(long = "as")]
        actor: i64,
        user: i64,
        #[arg(help = "citizen, official or admin")]
        role: String,
    },
    /// Set or clear a user's ward (admins only)
    SetWard {
        #[arg(long = "as")]
        actor: i64,
        user: i64,
        #[arg(help = "Ward number; omit to clear")]
        ward: Option<String>,
    },
    /// Score an image with the classifier and show the gate decision
    Verify {
        #[arg(long, default_value = "creation", help = "creation or resolution")]
        mode: String,
        image: PathBuf,
    },
    /// Report a new issue with a photo
    Report {
        #[arg(long = "as", help = "Id of the reporting user")]
        actor: i64,
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        #[arg(long, help = "waste, drainage, graffiti, street_cleaning or other")]
        category: String,
        #[arg(long)]
        address: String,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        #[arg(long, help = "low, medium, high or critical (default medium)")]
        priority: Option<String>,
        image: PathBuf,
    },
    /// Move an issue to a new status
    Transition {
        #[arg(long = "as", help = "Id of the official or admin")]
        actor: i64,
        issue: i64,
        #[arg(help = "in_progress, resolved or closed")]
        status: String,
        #[arg(long, help = "Proof photo, required for resolved and closed")]
        proof: Option<PathBuf>,
    },
    /// Assign an issue to an official
    Assign {
        #[arg(long = "as")]
        actor: i64,
        issue: i64,
        official: i64,
    },
    /// Change an issue's priority (admins only)
    Priority {
        #[arg(long = "as")]
        actor: i64,
        issue: i64,
        priority: String,
    },
    /// Delete an issue with its comments and likes
    Delete {
        #[arg(long = "as")]
        actor: i64,
        issue: i64,
    },
    /// Toggle a like on an issue
    Like {
        #[arg(long = "as")]
        actor: i64,
        issue: i64,
    },
    /// Comment on an issue
    Comment {
        #[arg(long = "as")]
        actor: i64,
        issue: i64,
        text: String,
    },
    /// List a user's notifications
    Notifications {
        #[arg(long = "as")]
        actor: i64,
        #[arg(long, help = "Maximum notifications to show (default 20)")]
        limit: Option<u32>,
        #[arg(long, help = "Mark every notification read after listing")]
        mark_all_read: bool,
    },
    /// Print the effective configuration as TOML
    ShowConfig,
}
