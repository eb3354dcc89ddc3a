use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use odb_types::ObjectKind;

#[derive(Parser)]
#[command(
    name = "odb",
    about = "Inspect and write git-style object databases",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Repository directory: `<repo>.git` or `<repo>.git/objects`
    #[arg(long, global = true, default_value = ".git")]
    pub repo: PathBuf,

    /// Treat --repo as a bare objects root instead of a repository directory
    #[arg(long, global = true)]
    pub objects: bool,

    /// TOML file overriding the store layout
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the discovered sub-stores
    Layout,
    /// Count stored objects
    Count(CountArgs),
    /// List every object ID
    List,
    /// Expand an abbreviated object name
    Resolve(ResolveArgs),
    /// Print an object's body or header
    Cat(CatArgs),
    /// Store a file as a new object
    Write(WriteArgs),
}

#[derive(Args)]
pub struct CountArgs {
    /// Count each ID once even when several sub-stores hold it
    #[arg(long)]
    pub distinct: bool,
}

#[derive(Args)]
pub struct ResolveArgs {
    pub prefix: String,
}

#[derive(Args)]
pub struct CatArgs {
    pub prefix: String,
    /// Print kind and size instead of the body
    #[arg(long)]
    pub info: bool,
}

#[derive(Args)]
pub struct WriteArgs {
    /// File to store, or `-` for standard input
    pub file: PathBuf,
    #[arg(long, default_value = "blob")]
    pub kind: ObjectKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_layout_defaults() {
        let cli = Cli::try_parse_from(["odb", "layout"]).unwrap();
        assert!(matches!(cli.command, Command::Layout));
        assert_eq!(cli.repo, PathBuf::from(".git"));
        assert!(!cli.objects);
        assert!(cli.config.is_none());
        assert!(matches!(cli.format, OutputFormat::Text));
    }

    #[test]
    fn parse_count_distinct() {
        let cli = Cli::try_parse_from(["odb", "count", "--distinct"]).unwrap();
        if let Command::Count(args) = cli.command {
            assert!(args.distinct);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_cat_info() {
        let cli = Cli::try_parse_from(["odb", "cat", "abc123", "--info"]).unwrap();
        if let Command::Cat(args) = cli.command {
            assert_eq!(args.prefix, "abc123");
            assert!(args.info);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_write_kind() {
        let cli = Cli::try_parse_from(["odb", "write", "notes.txt", "--kind", "tree"]).unwrap();
        if let Command::Write(args) = cli.command {
            assert_eq!(args.file, PathBuf::from("notes.txt"));
            assert_eq!(args.kind, ObjectKind::Tree);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_write_rejects_unknown_kind() {
        assert!(Cli::try_parse_from(["odb", "write", "f", "--kind", "banana"]).is_err());
    }

    #[test]
    fn parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "odb", "list", "--repo", "/srv/r.git/objects", "--objects", "--format", "json", "-v",
        ])
        .unwrap();
        assert_eq!(cli.repo, PathBuf::from("/srv/r.git/objects"));
        assert!(cli.objects);
        assert!(cli.verbose);
        assert!(matches!(cli.format, OutputFormat::Json));
    }
}
