use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "ordo", about = concat!("ordo v", env!("CARGO_PKG_VERSION"), " - manual ordering that stays put"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Run against a different store directory
    #[arg(short = 'C', long = "store-dir", global = true)]
    pub store_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new store in the current directory
    Init(InitArgs),
    /// Add a task (inbox by default)
    Add(AddArgs),
    /// Add a header to a project
    Header(HeaderArgs),
    /// Add a project
    Project(NameArgs),
    /// Add an area
    Area(NameArgs),
    /// List a group in display order
    List(ListArgs),
    /// List every ordering group
    Groups,
    /// Move an item to another position in its group
    Mv(MvArgs),
    /// Move a task to another project, header, or the inbox
    Reparent(ReparentArgs),
    /// Mark a task completed
    Done(TaskRefArgs),
    /// Reopen a completed task
    Reopen(TaskRefArgs),
    /// Move completed tasks to the logbook once their delay has passed
    Log(LogArgs),
    /// Give order values to records that have none
    Ensure(EnsureArgs),
    /// Renumber a group from scratch
    Repair(RepairArgs),
    /// Validate ordering state
    Check,
    /// View or change store configuration
    Config(ConfigArgs),
    /// Report changes made to the store by other processes
    Watch,
    /// View or manage the recovery log
    Recovery(RecoveryCmd),
}

// ---------------------------------------------------------------------------
// Init args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct InitArgs {
    /// Reinitialize even if .ordo/ already exists
    #[arg(long)]
    pub force: bool,
}

// ---------------------------------------------------------------------------
// Creation args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct AddArgs {
    /// Task title
    pub title: String,
    /// Destination: a project, or <project>/<header> (default: inbox)
    #[arg(long)]
    pub to: Option<String>,
    /// Insert at the top of the group
    #[arg(long, conflicts_with = "after")]
    pub top: bool,
    /// Insert after this task (name or id prefix)
    #[arg(long)]
    pub after: Option<String>,
}

#[derive(Args)]
pub struct HeaderArgs {
    /// Project the header belongs to (name or id prefix)
    pub project: String,
    /// Header title
    pub title: String,
    /// Insert at the top of the project's headers
    #[arg(long, conflicts_with = "after")]
    pub top: bool,
    /// Insert after this header
    #[arg(long)]
    pub after: Option<String>,
}

#[derive(Args)]
pub struct NameArgs {
    /// Display name
    pub name: String,
    /// Insert at the top of the list
    #[arg(long, conflicts_with = "after")]
    pub top: bool,
    /// Insert after this record
    #[arg(long)]
    pub after: Option<String>,
}

// ---------------------------------------------------------------------------
// Read command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ListArgs {
    /// Group to list: inbox, projects, areas, headers:<project>, <project>,
    /// or <project>/<header> (default: inbox)
    pub group: Option<String>,
    /// Include tasks already moved to the logbook
    #[arg(long)]
    pub all: bool,
}

// ---------------------------------------------------------------------------
// Ordering args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct MvArgs {
    /// Group the item lives in (see `ordo list --help`)
    pub group: String,
    /// Current position (0-indexed)
    #[arg(allow_negative_numbers = true)]
    pub from: isize,
    /// New position (0-indexed)
    #[arg(allow_negative_numbers = true)]
    pub to: isize,
}

#[derive(Args)]
pub struct ReparentArgs {
    /// Task to move (title or id prefix)
    pub task: String,
    /// Destination: inbox, a project, or <project>/<header>
    pub to: String,
}

#[derive(Args)]
pub struct TaskRefArgs {
    /// Task (title or id prefix)
    pub task: String,
}

#[derive(Args)]
pub struct LogArgs {
    /// Wait for tasks whose delay has not passed yet
    #[arg(long)]
    pub wait: bool,
}

#[derive(Args)]
pub struct EnsureArgs {
    /// Only this group (default: every group, also separating duplicates)
    pub group: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum RepairKey {
    /// Oldest first
    Created,
    /// Keep the current order, separating duplicates
    Order,
}

#[derive(Args)]
pub struct RepairArgs {
    /// Group to renumber
    pub group: String,
    /// Sort key used to rebuild the order
    #[arg(long, value_enum, default_value = "created")]
    pub by: RepairKey,
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ConfigArgs {
    /// Key to read or set, e.g. ordering.spacing (omit to show all)
    pub key: Option<String>,
    /// New value
    pub value: Option<String>,
}

// ---------------------------------------------------------------------------
// Recovery log
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct RecoveryCmd {
    #[command(subcommand)]
    pub action: Option<RecoveryAction>,
    /// Maximum number of entries to show (default: 10)
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Subcommand)]
pub enum RecoveryAction {
    /// Remove all entries
    Clear,
    /// Print the absolute path to the recovery log
    Path,
}
