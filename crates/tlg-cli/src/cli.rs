use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tlg_types::{ModuleType, RevisionId, SignatureType, ThreadCategory, ThreadId};

#[derive(Parser)]
#[command(
    name = "tlg",
    about = "Trust Ledger -- permanent reference ids and hash-chained governance records",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Ledger state file, created on first write
    #[arg(long, global = true, default_value = "tlg-ledger.json")]
    pub state: PathBuf,

    /// TOML file with ledger limits
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// User performing the operation
    #[arg(long, global = true, default_value = "cli")]
    pub actor: String,

    /// User the actor is acting on behalf of
    #[arg(long, global = true)]
    pub acting_as: Option<String>,

    #[arg(long, global = true)]
    pub ip: Option<String>,

    #[arg(long, global = true, default_value = "default")]
    pub portfolio: String,

    #[arg(long, global = true, default_value = "default")]
    pub trust: String,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Set the portfolio's base token (once)
    RegisterBase(RegisterBaseArgs),
    /// Open a new thread on the lowest free group
    CreateThread(CreateThreadArgs),
    /// Reserve the next sub-number on a thread
    AllocateSub(ThreadArgs),
    /// File a new record as a version 1 draft
    CreateRecord(CreateRecordArgs),
    /// Replace the payload of a draft revision
    UpdateDraft(UpdateDraftArgs),
    /// Seal a draft revision
    Finalize(RevisionArgs),
    /// Seal an amendment draft
    FinalizeAmendment(RevisionArgs),
    /// Open a new version of a finalized record
    Amend(AmendArgs),
    /// Void a record
    Void(VoidArgs),
    /// List every version of a record
    History(RecordArgs),
    /// Field changes between two revisions
    Diff(DiffArgs),
    /// Audit events of a record
    Events(RecordArgs),
    /// Sign off on a finalized revision
    Attest(AttestArgs),
    /// List sign-offs on a record
    Attestations(RecordArgs),
    /// Verify a record's revision chain
    Verify(RecordArgs),
    /// Recompute and compare one revision's hash
    VerifyRevision(RevisionArgs),
    /// Look up a record by current or historical display id
    Resolve(ResolveArgs),
    /// Show a thread
    Thread(ThreadArgs),
    /// List the portfolio's threads
    Threads(ThreadsArgs),
    /// Show a record
    Record(RecordArgs),
    /// List records filed under a thread
    Records(ThreadArgs),
    /// Move every record of the sources onto a target thread
    Merge(MergeArgs),
    /// Move selected records onto a new thread
    Split(SplitArgs),
    /// Move selected records onto an existing thread
    Reassign(ReassignArgs),
    /// Show thread maintenance runs for the portfolio
    IntegrityLog,
}

#[derive(Args)]
pub struct RegisterBaseArgs {
    pub base: String,
}

#[derive(Args)]
pub struct CreateThreadArgs {
    pub title: String,
    #[arg(long, default_value = "general")]
    pub category: ThreadCategory,
    #[arg(long)]
    pub party: Option<String>,
    #[arg(long)]
    pub external_ref: Option<String>,
}

#[derive(Args)]
pub struct ThreadArgs {
    pub thread: ThreadId,
}

#[derive(Args)]
pub struct ThreadsArgs {
    #[arg(long)]
    pub include_deleted: bool,
}

/// A record, by id or by any display id it has carried.
#[derive(Args)]
pub struct RecordArgs {
    pub record: String,
}

#[derive(Args)]
pub struct RevisionArgs {
    pub revision: RevisionId,
}

#[derive(Args)]
pub struct PayloadArgs {
    /// Inline JSON object
    #[arg(long, conflicts_with = "payload_file")]
    pub payload: Option<String>,
    /// File holding a JSON object
    #[arg(long)]
    pub payload_file: Option<PathBuf>,
}

#[derive(Args)]
pub struct CreateRecordArgs {
    #[arg(long)]
    pub module: ModuleType,
    /// Defaults to the payload's title
    #[arg(long)]
    pub title: Option<String>,
    #[command(flatten)]
    pub payload: PayloadArgs,
    /// File under an existing thread
    #[arg(long, conflicts_with = "new_thread")]
    pub thread: Option<ThreadId>,
    /// Use a sub-number reserved with allocate-sub (requires --thread)
    #[arg(long, requires = "thread")]
    pub reserved_sub: Option<u32>,
    /// Open a new thread with this title
    #[arg(long)]
    pub new_thread: Option<String>,
    #[arg(long, default_value = "general")]
    pub category: ThreadCategory,
}

#[derive(Args)]
pub struct UpdateDraftArgs {
    pub revision: RevisionId,
    #[command(flatten)]
    pub payload: PayloadArgs,
}

#[derive(Args)]
pub struct AmendArgs {
    pub record: String,
    #[arg(long, default_value = "")]
    pub reason: String,
    /// Record the new version as a correction rather than an amendment
    #[arg(long)]
    pub correction: bool,
}

#[derive(Args)]
pub struct VoidArgs {
    pub record: String,
    #[arg(long)]
    pub reason: String,
}

#[derive(Args)]
pub struct DiffArgs {
    pub revision: RevisionId,
    /// Defaults to the revision's parent
    #[arg(long)]
    pub against: Option<RevisionId>,
}

#[derive(Args)]
pub struct AttestArgs {
    pub revision: RevisionId,
    #[arg(long)]
    pub signer_name: String,
    #[arg(long, default_value = "trustee")]
    pub role: String,
    #[arg(long, default_value = "typed_name")]
    pub signature_type: SignatureType,
    #[arg(long)]
    pub text: String,
}

#[derive(Args)]
pub struct ResolveArgs {
    pub display_id: String,
}

#[derive(Args)]
pub struct MergeArgs {
    pub target: ThreadId,
    #[arg(required = true)]
    pub sources: Vec<ThreadId>,
    #[arg(long)]
    pub reason: String,
}

#[derive(Args)]
pub struct SplitArgs {
    pub source: ThreadId,
    #[arg(required = true)]
    pub records: Vec<String>,
    #[arg(long)]
    pub title: String,
    #[arg(long)]
    pub reason: String,
}

#[derive(Args)]
pub struct ReassignArgs {
    pub target: ThreadId,
    #[arg(required = true)]
    pub records: Vec<String>,
    #[arg(long)]
    pub reason: String,
}
