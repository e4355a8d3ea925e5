mod fixture;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use treeview_model::{LayoutOptions, LayoutOptionsStore};
use treeview_tree::{NodeKey, SessionError, TreeNode, TreeSession, TreeStore, UserNotice};

use crate::fixture::{Fixture, FixtureClient};

#[derive(Parser)]
#[command(
    name = "treeview-cli",
    about = "Inspect and edit hierarchical tree collections stored as JSON fixtures",
    author,
    version
)]
struct Cli {
    /// 輸出除錯記錄至 stderr。 / Emit debug logs on stderr.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 驗證樹狀集合的欄位結構。 / Validate the field structure of a tree collection.
    Validate(SourceArgs),
    /// 顯示樹狀結構與待儲存的變更。 / Print the tree with pending changes.
    Tree(SourceArgs),
    /// 移動項目並可選擇儲存。 / Move an item and optionally save the result.
    Move(MoveArgs),
    /// 管理版面選項檔案。 / Manage layout option files.
    #[command(subcommand)]
    Options(OptionsCommand),
}

#[derive(Args)]
struct SourceArgs {
    /// 夾具檔案路徑。 / Path to the fixture file.
    #[arg(value_name = "FIXTURE")]
    fixture: PathBuf,

    /// 以此檔案的版面選項取代夾具內的設定。 / Layout options file overriding the fixture's options.
    #[arg(long, value_name = "PATH")]
    options: Option<PathBuf>,
}

#[derive(Args)]
struct MoveArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// 要移動的項目。 / Item to move.
    #[arg(value_name = "ITEM")]
    item: String,

    /// 新的父節點（項目或群組鍵）。 / New parent: an item id or a group key.
    #[arg(value_name = "PARENT")]
    parent: String,

    /// 在父節點子項目中的位置。 / Position among the parent's children.
    #[arg(value_name = "INDEX")]
    index: usize,

    /// 將變更寫回夾具。 / Write the changes back to the fixture.
    #[arg(long)]
    save: bool,
}

#[derive(Subcommand)]
enum OptionsCommand {
    /// 顯示版面選項。 / Print layout options.
    Show(OptionsPathArgs),
    /// 修改版面選項。 / Change layout options.
    Set(OptionsSetArgs),
    /// 匯出版面選項。 / Export layout options.
    Export(OptionsTransferArgs),
    /// 匯入版面選項。 / Import layout options.
    Import(OptionsTransferArgs),
}

#[derive(Args)]
struct OptionsPathArgs {
    /// 版面選項檔案；不存在時使用預設值。 / Layout options file; defaults apply when missing.
    #[arg(value_name = "PATH")]
    path: PathBuf,
}

#[derive(Args)]
struct OptionsSetArgs {
    #[command(flatten)]
    target: OptionsPathArgs,

    /// 樹狀集合名稱。 / Tree collection name.
    #[arg(long, value_name = "COLLECTION")]
    collection: Option<String>,

    /// 產生 slug 的內容欄位。 / Content field slugs are generated from.
    #[arg(long, value_name = "FIELD")]
    slug_field: Option<String>,

    /// 主要標籤樣板。 / Primary label template.
    #[arg(long, value_name = "TEMPLATE")]
    label_primary: Option<String>,

    /// 次要標籤樣板。 / Secondary label template.
    #[arg(long, value_name = "TEMPLATE")]
    label_secondary: Option<String>,

    /// 狀態指示欄位。 / Status indicator field.
    #[arg(long, value_name = "FIELD")]
    status_field: Option<String>,

    /// 縮排寬度（rem）。 / Indentation width in rem.
    #[arg(long, value_name = "REM")]
    indentation: Option<f32>,

    /// 預設收合的項目（以逗號分隔）。 / Items collapsed by default (comma separated).
    #[arg(long, value_name = "IDS", value_delimiter = ',')]
    collapsed: Option<Vec<String>>,

    /// 啟用除錯顯示。 / Enable the debug display.
    #[arg(long, value_name = "true|false")]
    debug: Option<bool>,
}

#[derive(Args)]
struct OptionsTransferArgs {
    #[command(flatten)]
    target: OptionsPathArgs,

    /// 匯入來源或匯出目的地。 / Import source or export destination.
    #[arg(value_name = "FILE")]
    file: PathBuf,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Err(err) = run(cli.command) {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Validate(args) => execute_validate(args),
        Commands::Tree(args) => execute_tree(args),
        Commands::Move(args) => execute_move(args),
        Commands::Options(subcommand) => execute_options_command(subcommand),
    }
}

fn open_session(args: &SourceArgs) -> Result<TreeSession<FixtureClient>> {
    let fixture = Fixture::load(&args.fixture)?;
    let options = match &args.options {
        Some(path) => load_options(path)?.options().clone(),
        None => fixture.options.clone(),
    };
    tracing::debug!(
        fixture = %args.fixture.display(),
        items = fixture.items.len(),
        "loaded fixture"
    );
    let context = fixture.context();
    Ok(TreeSession::new(FixtureClient::new(fixture), context, options))
}

fn execute_validate(args: SourceArgs) -> Result<()> {
    let session = open_session(&args)?;
    match session.check_structure() {
        Ok(groups) => {
            println!("Structure OK ({} group(s))", groups.len());
            for group in groups.iter() {
                let depth = if group.is_unlimited() {
                    "unlimited".to_string()
                } else {
                    format!("max level {}", group.max_level)
                };
                println!("  {} ({}): {depth}", group.label, group.key);
            }
            Ok(())
        }
        Err(SessionError::Schema(err)) => {
            for line in err.details() {
                println!("  {line}");
            }
            Err(err.into())
        }
        Err(err) => Err(err.into()),
    }
}

fn execute_tree(args: SourceArgs) -> Result<()> {
    let mut session = open_session(&args)?;
    session.refresh().context("failed to load the tree")?;
    print_tree(session.store())?;
    if let Some(notice) = session.notice(false) {
        print_notice(&notice);
    }
    Ok(())
}

fn execute_move(args: MoveArgs) -> Result<()> {
    let mut session = open_session(&args.source)?;
    session.refresh().context("failed to load the tree")?;
    session.toggle_edit_mode();

    let event = session
        .move_item(
            &NodeKey::from(args.item),
            &NodeKey::from(args.parent),
            args.index,
        )
        .context("move rejected")?;
    println!(
        "Moved {} from {}[{}] to {}[{}]",
        event.item, event.from.parent, event.from.index, event.to.parent, event.to.index
    );
    for update in session.store().pending_updates()? {
        println!("{}", update.to_payload());
    }
    if let Some(notice) = session.notice(false) {
        print_notice(&notice);
    }

    if args.save {
        let written = session.save_changes().context("failed to save changes")?;
        if written > 0 {
            let (client, _) = session.into_parts();
            client.into_fixture().save(&args.source.fixture)?;
        }
        println!(
            "Saved {written} record(s) to {}",
            args.source.fixture.display()
        );
    }
    Ok(())
}

fn print_tree(store: &TreeStore) -> Result<()> {
    for root in store.roots() {
        let Some(state) = store.group(&root.group) else {
            continue;
        };
        let marker = if state.has_dirty { " *" } else { "" };
        println!("{} ({}){marker}", state.group.label, state.group.key);
        print_children(store, root, 1)?;
    }
    Ok(())
}

fn print_children(store: &TreeStore, node: &TreeNode, depth: usize) -> Result<()> {
    for key in &node.children {
        let child = store.get(key)?;
        let mut flags = String::new();
        if child.is_dirty {
            flags.push_str(" *");
        }
        if store.invalid_items().contains(key) {
            flags.push_str(" !");
        }
        println!(
            "{:indent$}{key}  {}{flags}",
            "",
            child.effective_path(),
            indent = depth * 2
        );
        print_children(store, child, depth + 1)?;
    }
    Ok(())
}

fn print_notice(notice: &UserNotice) {
    eprintln!("[{:?}] {}: {}", notice.kind, notice.title, notice.text);
}

fn execute_options_command(command: OptionsCommand) -> Result<()> {
    match command {
        OptionsCommand::Show(args) => show_options(args),
        OptionsCommand::Set(args) => set_options(args),
        OptionsCommand::Export(args) => export_options(args),
        OptionsCommand::Import(args) => import_options(args),
    }
}

fn load_options(path: &Path) -> Result<LayoutOptionsStore> {
    LayoutOptionsStore::load(path)
        .with_context(|| format!("failed to load layout options from {}", path.display()))
}

fn show_options(args: OptionsPathArgs) -> Result<()> {
    let store = load_options(&args.path)?;
    let rendered = serde_json::to_string_pretty(store.options())?;
    println!("{rendered}");
    Ok(())
}

fn set_options(args: OptionsSetArgs) -> Result<()> {
    let OptionsSetArgs {
        target,
        collection,
        slug_field,
        label_primary,
        label_secondary,
        status_field,
        indentation,
        collapsed,
        debug,
    } = args;
    let mut store = load_options(&target.path)?;
    store
        .update(|options: &mut LayoutOptions| {
            if collection.is_some() {
                options.meta_collection_name = collection;
            }
            if slug_field.is_some() {
                options.slugify_field_name = slug_field;
            }
            if label_primary.is_some() {
                options.label_primary = label_primary;
            }
            if label_secondary.is_some() {
                options.label_secondary = label_secondary;
            }
            if status_field.is_some() {
                options.status_indicator = status_field;
            }
            if let Some(indentation) = indentation {
                options.indentation = indentation;
            }
            if let Some(collapsed) = collapsed {
                options.collapsed = collapsed;
            }
            if let Some(debug) = debug {
                options.debug = debug;
            }
        })
        .with_context(|| format!("failed to save layout options to {}", target.path.display()))?;
    println!("Updated layout options in {}", target.path.display());
    Ok(())
}

fn export_options(args: OptionsTransferArgs) -> Result<()> {
    let store = load_options(&args.target.path)?;
    if let Some(parent) = args.file.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    store
        .export_to(&args.file)
        .with_context(|| format!("failed to export layout options to {}", args.file.display()))?;
    println!("Exported layout options to {}", args.file.display());
    Ok(())
}

fn import_options(args: OptionsTransferArgs) -> Result<()> {
    let mut store = load_options(&args.target.path)?;
    if !args.file.exists() {
        bail!("layout options file '{}' does not exist", args.file.display());
    }
    store
        .import_from(&args.file)
        .with_context(|| format!("failed to import layout options from {}", args.file.display()))?;
    println!("Imported layout options from {}", args.file.display());
    Ok(())
}
