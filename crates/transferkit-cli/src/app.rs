//! CLI argument definitions

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use transferkit_core::{ExtractionScope, RequestContext, ScopeKind};

#[derive(Parser)]
#[command(name = "transferkit")]
#[command(
    author,
    version,
    about = "Transfer-metadata extraction with tiered caching and provider fallback"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "cli")]
    pub format: OutputFormat,

    /// Configuration file (defaults to TRANSFERKIT_CONFIG or the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage imported content
    Content(ContentArgs),

    /// Resolve transfer metadata for one section
    Extract(ExtractArgs),

    /// Resolve transfer metadata for every chunk of a content item
    ExtractAll(ExtractAllArgs),

    /// Show stored metadata for a content item
    Show(ShowArgs),

    /// Show provider availability in fallback order
    Providers,
}

#[derive(Args)]
pub struct ContentArgs {
    #[command(subcommand)]
    pub action: ContentAction,
}

#[derive(Subcommand)]
pub enum ContentAction {
    /// Import a JSON content document
    Import { file: PathBuf },

    /// List imported content
    List,
}

#[derive(Args)]
pub struct ExtractArgs {
    /// Content identifier
    pub content_id: String,

    /// Chunk identifier
    #[arg(long, conflicts_with_all = ["chunk_index", "page"])]
    pub chunk_id: Option<String>,

    /// Zero-based chunk position
    #[arg(long, conflicts_with = "page")]
    pub chunk_index: Option<u32>,

    /// Page number
    #[arg(long)]
    pub page: Option<u32>,

    #[command(flatten)]
    pub scope: ScopeArgs,

    #[command(flatten)]
    pub context: ContextArgs,

    /// Print telemetry events emitted during resolution
    #[arg(long)]
    pub trace_events: bool,
}

#[derive(Args)]
pub struct ExtractAllArgs {
    /// Content identifier
    pub content_id: String,

    #[command(flatten)]
    pub scope: ScopeArgs,

    #[command(flatten)]
    pub context: ContextArgs,

    /// Print telemetry events emitted during resolution
    #[arg(long)]
    pub trace_events: bool,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Content identifier
    pub content_id: String,

    #[command(flatten)]
    pub scope: ScopeArgs,
}

#[derive(Args)]
pub struct ScopeArgs {
    /// Audience partition
    #[arg(long, value_enum, default_value = "user")]
    pub scope: ScopeArg,

    /// Family id (FAMILY scope)
    #[arg(long)]
    pub family_id: Option<String>,

    /// Institution id (INSTITUTION scope)
    #[arg(long)]
    pub institution_id: Option<String>,
}

impl ScopeArgs {
    pub fn to_scope(&self) -> transferkit_core::Result<ExtractionScope> {
        ExtractionScope::new(
            self.scope.into(),
            self.family_id.clone(),
            self.institution_id.clone(),
        )
    }
}

#[derive(Args)]
pub struct ContextArgs {
    /// Caller identity for policy and audit
    #[arg(long)]
    pub caller: Option<String>,

    /// Current session phase (e.g. study, assessment)
    #[arg(long)]
    pub phase: Option<String>,

    /// Education level
    #[arg(long)]
    pub level: Option<String>,

    /// Content language
    #[arg(long)]
    pub language: Option<String>,
}

impl ContextArgs {
    pub fn to_context(&self) -> RequestContext {
        RequestContext {
            caller_id: self.caller.clone(),
            session_phase: self.phase.clone(),
            education_level: self.level.clone(),
            language: self.language.clone(),
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ScopeArg {
    User,
    Family,
    Institution,
    Global,
}

impl From<ScopeArg> for ScopeKind {
    fn from(value: ScopeArg) -> Self {
        match value {
            ScopeArg::User => ScopeKind::User,
            ScopeArg::Family => ScopeKind::Family,
            ScopeArg::Institution => ScopeKind::Institution,
            ScopeArg::Global => ScopeKind::Global,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Cli,
    Json,
}
