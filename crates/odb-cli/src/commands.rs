use std::collections::HashSet;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use odb_db::{CompoundDb, ObjectRepository, OdbConfig};
use odb_store::{IStream, ObjectDb, ObjectDbWrite, StoreResult};
use serde_json::json;

use crate::cli::*;

/// The store a command runs against.
enum Target {
    Repository(ObjectRepository),
    Objects(CompoundDb),
}

impl Target {
    fn open(cli: &Cli) -> anyhow::Result<Self> {
        let config = match &cli.config {
            Some(path) => OdbConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => OdbConfig::default(),
        };
        if cli.objects {
            return Ok(Self::Objects(CompoundDb::with_config(&cli.repo, &config)));
        }
        let repo = ObjectRepository::open_with_config(&cli.repo, &config)
            .with_context(|| format!("opening repository {}", cli.repo.display()))?;
        Ok(Self::Repository(repo))
    }

    fn db(&self) -> &CompoundDb {
        match self {
            Self::Repository(repo) => repo.db(),
            Self::Objects(db) => db,
        }
    }

    fn git_dir(&self) -> Option<&Path> {
        match self {
            Self::Repository(repo) => Some(repo.git_dir()),
            Self::Objects(_) => None,
        }
    }
}

/// Run `cli`, writing command output to `out`.
pub fn run_command(cli: Cli, out: &mut impl Write) -> anyhow::Result<()> {
    let target = Target::open(&cli)?;
    let json = matches!(cli.format, OutputFormat::Json);
    match cli.command {
        Command::Layout => cmd_layout(&target, json, out),
        Command::Count(args) => cmd_count(target.db(), args, json, out),
        Command::List => cmd_list(target.db(), json, out),
        Command::Resolve(args) => cmd_resolve(target.db(), args, json, out),
        Command::Cat(args) => cmd_cat(target.db(), args, json, out),
        Command::Write(args) => cmd_write(target.db(), args, json, out),
    }
}

fn print_json(out: &mut impl Write, value: &serde_json::Value) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

fn cmd_layout(target: &Target, json: bool, out: &mut impl Write) -> anyhow::Result<()> {
    let db = target.db();
    let primary = db.primary_kind()?;
    let stores = db.databases()?;

    if json {
        let rows = stores
            .iter()
            .map(|s| -> StoreResult<serde_json::Value> {
                Ok(json!({
                    "kind": s.kind().as_str(),
                    "path": s.path().display().to_string(),
                    "objects": s.size()?,
                    "writable": s.kind() == primary,
                }))
            })
            .collect::<StoreResult<Vec<_>>>()?;
        return print_json(out, &json!({
            "git_dir": target.git_dir().map(|p| p.display().to_string()),
            "objects_dir": db.root_path().display().to_string(),
            "stores": rows,
        }));
    }

    if let Some(git_dir) = target.git_dir() {
        writeln!(out, "Repository: {}", git_dir.display().to_string().bold())?;
    }
    writeln!(out, "Objects:    {}", db.root_path().display().to_string().bold())?;
    for store in stores {
        let marker = if store.kind() == primary {
            " (writable)".green().to_string()
        } else {
            String::new()
        };
        writeln!(
            out,
            "  {:<10} {:>8} objects  {}{}",
            store.kind().to_string().cyan(),
            store.size()?,
            store.path().display(),
            marker
        )?;
    }
    Ok(())
}

fn cmd_count(
    db: &CompoundDb,
    args: CountArgs,
    json: bool,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let count = if args.distinct {
        let mut seen = HashSet::new();
        for id in db.sha_iter() {
            seen.insert(id?);
        }
        seen.len()
    } else {
        db.size()?
    };

    if json {
        return print_json(out, &json!({ "objects": count, "distinct": args.distinct }));
    }
    writeln!(out, "{count}")?;
    Ok(())
}

fn cmd_list(db: &CompoundDb, json: bool, out: &mut impl Write) -> anyhow::Result<()> {
    if json {
        let ids = db
            .sha_iter()
            .map(|id| id.map(|id| id.to_hex()))
            .collect::<StoreResult<Vec<_>>>()?;
        return print_json(out, &json!(ids));
    }
    for id in db.sha_iter() {
        writeln!(out, "{}", id?)?;
    }
    Ok(())
}

fn cmd_resolve(
    db: &CompoundDb,
    args: ResolveArgs,
    json: bool,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let id = db.partial_to_complete_sha(&args.prefix)?;
    if json {
        return print_json(out, &json!({ "prefix": args.prefix, "id": id.to_hex() }));
    }
    writeln!(out, "{id}")?;
    Ok(())
}

fn cmd_cat(db: &CompoundDb, args: CatArgs, json: bool, out: &mut impl Write) -> anyhow::Result<()> {
    let id = db.partial_to_complete_sha(&args.prefix)?;

    if args.info {
        let info = db.info(&id)?;
        if json {
            return print_json(out, &json!({
                "id": info.id.to_hex(),
                "kind": info.kind.as_str(),
                "size": info.size,
            }));
        }
        writeln!(out, "{} {} {}", info.id.to_string().yellow(), info.kind, info.size)?;
        return Ok(());
    }

    let body = db.stream(&id)?.into_bytes();
    if json {
        return print_json(out, &json!({
            "id": id.to_hex(),
            "body": String::from_utf8_lossy(&body),
        }));
    }
    out.write_all(&body)?;
    Ok(())
}

fn cmd_write(
    db: &CompoundDb,
    args: WriteArgs,
    json: bool,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let data = if args.file == Path::new("-") {
        let mut buf = Vec::new();
        std::io::stdin().lock().read_to_end(&mut buf)?;
        buf
    } else {
        std::fs::read(&args.file).with_context(|| format!("reading {}", args.file.display()))?
    };

    let info = db.store(IStream::from_bytes(args.kind, data))?;
    if json {
        return print_json(out, &json!({
            "id": info.id.to_hex(),
            "kind": info.kind.as_str(),
            "size": info.size,
        }));
    }
    writeln!(
        out,
        "{} {} {}",
        "✓".green().bold(),
        info.kind,
        info.id.to_string().yellow()
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use odb_pack::PackWriter;
    use odb_store::StoreError;
    use odb_types::{ObjectId, ObjectKind};
    use serde_json::Value;

    fn run(args: &[&str]) -> anyhow::Result<String> {
        let mut argv = vec!["odb"];
        argv.extend_from_slice(args);
        let mut out = Vec::new();
        run_command(Cli::try_parse_from(argv).unwrap(), &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    fn run_json(args: &[&str]) -> Value {
        let mut argv = vec!["--format", "json"];
        argv.extend_from_slice(args);
        serde_json::from_str(&run(&argv).unwrap()).unwrap()
    }

    fn write_pack(pack_dir: &Path, body: &[u8]) -> ObjectId {
        std::fs::create_dir_all(pack_dir).unwrap();
        let mut writer = PackWriter::new(&pack_dir.join("pack-1"));
        let id = writer.add_object(ObjectKind::Blob, body);
        writer.finish().unwrap();
        id
    }

    fn repo_with_objects() -> (tempfile::TempDir, String, ObjectId) {
        let dir = tempfile::tempdir().unwrap();
        let git_dir = dir.path().join("r.git");
        let id = write_pack(&git_dir.join("objects/pack"), b"packed");
        let repo = git_dir.to_str().unwrap().to_string();
        (dir, repo, id)
    }

    fn store_error(err: &anyhow::Error) -> &StoreError {
        err.downcast_ref::<StoreError>().unwrap()
    }

    #[test]
    fn write_then_cat_through_repository() {
        let (dir, repo, _) = repo_with_objects();
        let file = dir.path().join("input.txt");
        std::fs::write(&file, b"from a file").unwrap();

        let written = run_json(&["--repo", &repo, "write", file.to_str().unwrap()]);
        assert_eq!(written["kind"], "blob");
        assert_eq!(written["size"], 11);
        let id = written["id"].as_str().unwrap().to_string();

        let resolved = run_json(&["--repo", &repo, "resolve", &id[..10]]);
        assert_eq!(resolved["id"], id.as_str());
        assert_eq!(run(&["--repo", &repo, "resolve", &id[..10]]).unwrap(), format!("{id}\n"));

        assert_eq!(run(&["--repo", &repo, "cat", &id[..10]]).unwrap(), "from a file");
        let info = run_json(&["--repo", &repo, "cat", &id[..10], "--info"]);
        assert_eq!(info["kind"], "blob");
        assert_eq!(info["size"], 11);

        assert_eq!(run_json(&["--repo", &repo, "count"])["objects"], 2);
    }

    #[test]
    fn layout_reports_sub_stores() {
        let (_dir, repo, _) = repo_with_objects();
        let layout = run_json(&["--repo", &repo, "layout"]);
        assert_eq!(layout["git_dir"], repo.as_str());

        let stores = layout["stores"].as_array().unwrap();
        let kinds: Vec<&str> = stores.iter().map(|s| s["kind"].as_str().unwrap()).collect();
        assert_eq!(kinds, vec!["packed", "loose"]);
        assert_eq!(stores[0]["objects"], 1);
        assert_eq!(stores[0]["writable"], false);
        assert_eq!(stores[1]["writable"], true);

        let text = run(&["--repo", &repo, "layout"]).unwrap();
        assert!(text.contains(&repo));
        assert!(text.contains("objects"));
    }

    #[test]
    fn list_and_count_agree() {
        let (_dir, repo, id) = repo_with_objects();
        assert_eq!(run(&["--repo", &repo, "list"]).unwrap(), format!("{id}\n"));
        assert_eq!(run_json(&["--repo", &repo, "list"]), serde_json::json!([id.to_hex()]));
        assert_eq!(run(&["--repo", &repo, "count"]).unwrap(), "1\n");
    }

    #[test]
    fn distinct_count_collapses_duplicates() {
        let (_dir, repo, _) = repo_with_objects();
        let input = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(input.path(), b"packed").unwrap();
        run(&["--repo", &repo, "write", input.path().to_str().unwrap()]).unwrap();

        assert_eq!(run_json(&["--repo", &repo, "count"])["objects"], 2);
        let distinct = run_json(&["--repo", &repo, "count", "--distinct"]);
        assert_eq!(distinct["objects"], 1);
        assert_eq!(distinct["distinct"], true);
    }

    #[test]
    fn objects_flag_skips_resolution() {
        let (_dir, repo, _) = repo_with_objects();
        let objects = format!("{repo}/objects");
        let count = run_json(&["--repo", &objects, "--objects", "count"]);
        assert_eq!(count["objects"], 1);

        let layout = run_json(&["--repo", &objects, "--objects", "layout"]);
        assert_eq!(layout["git_dir"], Value::Null);
        assert_eq!(layout["objects_dir"], objects.as_str());
    }

    #[test]
    fn non_repository_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("plain");
        std::fs::create_dir_all(&plain).unwrap();
        let err = run(&["--repo", plain.to_str().unwrap(), "layout"]).unwrap_err();
        assert!(matches!(store_error(&err), StoreError::InvalidGitDirectory(_)));
    }

    #[test]
    fn unmatched_prefix_is_bad_object() {
        let (_dir, repo, id) = repo_with_objects();
        let prefix = if id.to_hex().starts_with('0') { "11111111" } else { "00000000" };
        let err = run(&["--repo", &repo, "resolve", prefix]).unwrap_err();
        assert!(store_error(&err).is_bad_object());
    }

    #[test]
    fn malformed_prefix_is_invalid_name() {
        let (_dir, repo, _) = repo_with_objects();
        let err = run(&["--repo", &repo, "resolve", "zz"]).unwrap_err();
        assert!(matches!(store_error(&err), StoreError::InvalidName(_)));
    }

    #[test]
    fn config_file_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        let git_dir = dir.path().join("r.git");
        write_pack(&git_dir.join("objects/archives"), b"archived");
        let repo = git_dir.to_str().unwrap().to_string();

        // The default layout does not look in `archives`.
        let stores = run_json(&["--repo", &repo, "layout"])["stores"].clone();
        assert_eq!(stores.as_array().unwrap().len(), 1);
        assert_eq!(stores[0]["kind"], "loose");

        let config = dir.path().join("odb.toml");
        std::fs::write(&config, "pack_dir = \"archives\"\n").unwrap();
        let config = config.to_str().unwrap().to_string();
        let layout = run_json(&["--repo", &repo, "--config", &config, "layout"]);
        let stores = layout["stores"].as_array().unwrap();
        assert_eq!(stores[0]["kind"], "packed");
        assert_eq!(
            stores[0]["path"],
            git_dir.join("objects/archives").display().to_string()
        );
        assert_eq!(stores[0]["objects"], 1);

        std::fs::write(&config, "pack_dir = \"../outside\"\n").unwrap();
        let err = run(&["--repo", &repo, "--config", &config, "layout"]).unwrap_err();
        assert!(err.downcast_ref::<odb_db::ConfigError>().is_some());
    }
}
