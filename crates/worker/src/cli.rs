use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "transcoder-worker")]
#[command(about = "Background VAAPI transcoder for a Jellyfin media library")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the transcoding daemon (default)
    Run,
    /// List every transcoded file in the library
    List,
    /// Delete every transcoded file in the library
    Delete(ConfirmArgs),
    /// Remove all skip-tracking records
    ClearDb(ConfirmArgs),
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfirmArgs {
    /// Do not ask for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

impl Cli {
    /// The selected subcommand, `run` when none was given.
    pub fn subcommand(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run)
    }
}
