//! formtree cli interface

use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::Formatter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Change the work directory
    ///
    /// Can be specified multiple times. Note that all
    /// paths on the way to the final path must exist.
    ///
    /// This is equivalent to running { cd <directory>; formtree ... }
    #[clap(short = 'C', long = "directory", global(true))]
    pub directory: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the fields a submission of the form is validated against
    ///
    /// Reads HCL from stdin unless any other source is provided (via --input-*)
    Fields(FormCommand),

    /// Print the markup of a form
    Render(RenderCommand),

    /// Print the hidden fields of the one-click enrollment form for a free access plan
    FreeEnroll(FreeEnrollCommand),

    /// Print debug information for development
    Dev(DevCommand),
}

#[derive(Parser, Debug)]
pub struct FormCommand {
    #[clap(flatten)]
    pub input: InputArgs,

    #[clap(flatten)]
    pub viewer: ViewerArgs,

    #[clap(flatten)]
    pub output: OutputArgs,

    /// Form location, for example `checkout`
    pub location: String,
}

#[derive(Parser, Debug)]
pub struct RenderCommand {
    #[clap(flatten)]
    pub input: InputArgs,

    #[clap(flatten)]
    pub viewer: ViewerArgs,

    /// Form location, for example `checkout`
    pub location: String,
}

#[derive(Parser, Debug)]
pub struct FreeEnrollCommand {
    #[clap(flatten)]
    pub input: InputArgs,

    #[clap(flatten)]
    pub viewer: ViewerArgs,

    #[clap(flatten)]
    pub output: OutputArgs,

    /// Id of the access plan
    #[clap(long = "plan-id")]
    pub plan_id: u64,

    /// Where to send the student after enrolling
    #[clap(long = "redirect")]
    pub redirect: String,

    /// Print markup instead of field settings
    #[clap(long = "markup")]
    pub markup: bool,
}

#[derive(Parser, Debug)]
pub struct InputArgs {
    /// Load files from work directory
    #[clap(short = 'w', long = "input-workdir")]
    pub workdir: bool,

    /// Load a file
    #[clap(short = 'f', long = "input-file")]
    pub files: Vec<PathBuf>,

    /// Load files from given directory
    #[clap(short = 'd', long = "input-dir")]
    pub directories: Vec<PathBuf>,

    /// Store the template of each location that has no form yet
    #[clap(long = "install")]
    pub install: bool,
}

#[derive(Parser, Debug)]
pub struct ViewerArgs {
    /// Compose the form for a logged in user
    #[clap(long = "logged-in")]
    pub logged_in: bool,

    /// Compose the form for a user that may preview drafts
    #[clap(long = "can-manage-forms")]
    pub can_manage_forms: bool,
}

#[derive(Parser, Debug)]
pub struct OutputArgs {
    #[arg(short = 'F', long = "output-format", default_value_t)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Default, Debug)]
pub enum OutputFormat {
    Json,
    #[default]
    Yaml,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Yaml => f.write_str("yaml"),
        }
    }
}

#[derive(Parser, Debug)]
pub struct DevCommand {
    #[clap(flatten)]
    pub input: InputArgs,

    #[command(subcommand)]
    pub command: DevSubCommand,
}

#[derive(Subcommand, Debug)]
pub enum DevSubCommand {
    /// Loaded hcl documents
    Documents,
    /// Composed block tree of a form
    Blocks {
        location: String,

        #[clap(flatten)]
        viewer: ViewerArgs,

        #[clap(flatten)]
        output: OutputArgs,
    },
}
