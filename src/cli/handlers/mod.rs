mod init;
pub use init::cmd_init;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::backend::Backend;
use crate::io::config_io;
use crate::io::flush::CommitError;
use crate::io::lock::StoreLock;
use crate::io::recovery;
use crate::io::store::{ScopeId, Store};
use crate::io::store_io::{self, FileBackend, STORE_DIR, StoreError};
use crate::io::watcher::{StoreEvent, StoreWatcher};
use crate::model::document::{StoreDocument, StoredRecord};
use crate::model::group::{GroupKey, RecordKind};
use crate::model::ordered::{by_created, compare_by_order};
use crate::model::record::{Area, Header, Project, Task};
use crate::ops::bootstrap::{self, RepairReport};
use crate::ops::check;
use crate::ops::deferred::DeferredLog;
use crate::ops::record_ops::{self, InsertPosition};
use crate::ops::reorder;
use crate::ops::reparent::{self, Placement};

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let json = cli.json;

    let start = match cli.store_dir {
        Some(ref dir) => std::fs::canonicalize(dir)
            .map_err(|e| format!("cannot resolve -C path '{}': {}", dir, e))?,
        None => std::env::current_dir()?,
    };

    match cli.command {
        Commands::Init(args) => cmd_init(&start, args),

        // Read commands
        Commands::List(args) => cmd_list(&start, args, json),
        Commands::Groups => cmd_groups(&start, json),
        Commands::Check => cmd_check(&start, json),
        Commands::Watch => cmd_watch(&start, json),

        // Write commands
        Commands::Add(args) => cmd_add(&start, args),
        Commands::Header(args) => cmd_header(&start, args),
        Commands::Project(args) => cmd_project(&start, args),
        Commands::Area(args) => cmd_area(&start, args),
        Commands::Mv(args) => cmd_mv(&start, args),
        Commands::Reparent(args) => cmd_reparent(&start, args),
        Commands::Done(args) => cmd_done(&start, args),
        Commands::Reopen(args) => cmd_reopen(&start, args),
        Commands::Log(args) => cmd_log(&start, args),

        // Maintenance
        Commands::Ensure(args) => cmd_ensure(&start, args, json),
        Commands::Repair(args) => cmd_repair(&start, args, json),
        Commands::Config(args) => cmd_config(&start, args, json),
        Commands::Recovery(cmd) => cmd_recovery(&start, cmd, json),
    }
}

// ---------------------------------------------------------------------------
// Store access
// ---------------------------------------------------------------------------

/// An open store and the lock that keeps other ordo processes out of it
/// until the command finishes. Fields drop in order, so the store is gone
/// before the lock is released.
struct Session {
    store: Store,
    _lock: StoreLock,
}

fn find_store_dir(start: &Path) -> Result<PathBuf, StoreError> {
    Ok(store_io::discover_store(start)?.join(STORE_DIR))
}

fn open_session(start: &Path) -> Result<Session, Box<dyn std::error::Error>> {
    let store_dir = find_store_dir(start)?;
    let (config, _) = config_io::read_config(&store_dir)?;
    let timeout = Duration::from_millis(config.durability.lock_timeout_ms);
    let lock = StoreLock::acquire(&store_dir, timeout)?;
    let store = Store::open(Box::new(FileBackend::new(&store_dir)), config)?;
    Ok(Session { store, _lock: lock })
}

// ---------------------------------------------------------------------------
// Reference resolution
// ---------------------------------------------------------------------------

/// Pick one record out of `records` by full id, case-insensitive label, or
/// id prefix (at least four hex digits).
fn resolve_in<R: StoredRecord>(records: Vec<R>, reference: &str) -> Result<R, String> {
    let needle = reference.trim();
    if let Ok(id) = Uuid::parse_str(needle) {
        return records
            .into_iter()
            .find(|r| r.id() == id)
            .ok_or_else(|| format!("{} not found: {}", R::KIND, needle));
    }

    let lower = needle.to_lowercase();
    let prefix = needle.replace('-', "").to_lowercase();
    let by_label = records
        .iter()
        .filter(|r| r.label().to_lowercase() == lower)
        .count();

    let mut matches: Vec<R> = if by_label > 0 {
        records
            .into_iter()
            .filter(|r| r.label().to_lowercase() == lower)
            .collect()
    } else if prefix.len() >= 4 {
        records
            .into_iter()
            .filter(|r| r.id().simple().to_string().starts_with(&prefix))
            .collect()
    } else {
        Vec::new()
    };

    match matches.len() {
        0 => Err(format!("{} not found: {}", R::KIND, needle)),
        1 => Ok(matches.remove(0)),
        n => Err(format!(
            "\"{}\" matches {} {}s, use an id prefix",
            needle,
            n,
            R::KIND
        )),
    }
}

fn resolve<R: StoredRecord>(store: &Store, scope: ScopeId, reference: &str) -> Result<R, String> {
    let records: Vec<R> = store.all(scope).map_err(|e| e.to_string())?;
    resolve_in(records, reference)
}

/// Parse a task destination: `inbox`, `<project>`, or `<project>/<header>`.
fn parse_placement(store: &Store, scope: ScopeId, reference: &str) -> Result<Placement, String> {
    if reference == "inbox" {
        return Ok(Placement::inbox());
    }
    let (project_ref, header_ref) = match reference.split_once('/') {
        Some((p, h)) => (p, Some(h)),
        None => (reference, None),
    };
    let project: Project = resolve(store, scope, project_ref)?;
    match header_ref {
        None => Ok(Placement::project(project.id)),
        Some(header_ref) => {
            let headers: Vec<Header> = store
                .siblings(scope, &GroupKey::Headers { project: project.id })
                .map_err(|e| e.to_string())?;
            let header = resolve_in(headers, header_ref)?;
            Ok(Placement::header(project.id, header.id))
        }
    }
}

/// Parse a group reference: `inbox`, `projects`, `areas`,
/// `headers:<project>`, or any task destination.
fn parse_group(store: &Store, scope: ScopeId, reference: &str) -> Result<GroupKey, String> {
    match reference {
        "projects" => Ok(GroupKey::Projects),
        "areas" => Ok(GroupKey::Areas),
        _ => {
            if let Some(project_ref) = reference.strip_prefix("headers:") {
                let project: Project = resolve(store, scope, project_ref)?;
                return Ok(GroupKey::Headers {
                    project: project.id,
                });
            }
            Ok(parse_placement(store, scope, reference)?.group())
        }
    }
}

fn insert_position<R: StoredRecord>(
    siblings: Vec<R>,
    top: bool,
    after: Option<&str>,
) -> Result<InsertPosition, String> {
    if let Some(after) = after {
        let record = resolve_in(siblings, after)?;
        return Ok(InsertPosition::After(record.id()));
    }
    Ok(if top {
        InsertPosition::Top
    } else {
        InsertPosition::Bottom
    })
}

fn group_len(store: &Store, scope: ScopeId, group: &GroupKey) -> Result<usize, StoreError> {
    Ok(match group.kind() {
        RecordKind::Task => store.siblings::<Task>(scope, group)?.len(),
        RecordKind::Header => store.siblings::<Header>(scope, group)?.len(),
        RecordKind::Project => store.siblings::<Project>(scope, group)?.len(),
        RecordKind::Area => store.siblings::<Area>(scope, group)?.len(),
    })
}

// ---------------------------------------------------------------------------
// Read command handlers
// ---------------------------------------------------------------------------

fn cmd_list(start: &Path, args: ListArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = open_session(start)?;
    let scope = session.store.primary();
    let reference = args.group.as_deref().unwrap_or("inbox");
    let group = parse_group(&session.store, scope, reference)?;

    match group.kind() {
        RecordKind::Task => list_tasks(&mut session.store, scope, &group, args.all, json),
        RecordKind::Header => list_records::<Header>(&mut session.store, scope, &group, json),
        RecordKind::Project => list_records::<Project>(&mut session.store, scope, &group, json),
        RecordKind::Area => list_records::<Area>(&mut session.store, scope, &group, json),
    }
}

/// Load a group for display, giving uninitialized members a value first
fn load_for_display<R: StoredRecord>(
    store: &mut Store,
    scope: ScopeId,
    group: &GroupKey,
) -> Result<Vec<R>, Box<dyn std::error::Error>> {
    bootstrap::ensure_ordering_initialized::<R>(store, scope, group)?;
    Ok(store.siblings(scope, group)?)
}

fn list_records<R: StoredRecord>(
    store: &mut Store,
    scope: ScopeId,
    group: &GroupKey,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let records: Vec<R> = load_for_display(store, scope, group)?;
    if json {
        let out = GroupListJson {
            group: group.to_string(),
            records: records
                .iter()
                .enumerate()
                .map(|(i, r)| record_to_json(i, r))
                .collect(),
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }
    if records.is_empty() {
        println!("{}: empty", group);
    }
    for (i, record) in records.iter().enumerate() {
        println!("{}", format_record_line(i, record));
    }
    Ok(())
}

/// Positions count logged tasks too, so they match what `ordo mv` expects
/// even when the logged ones are hidden.
fn list_tasks(
    store: &mut Store,
    scope: ScopeId,
    group: &GroupKey,
    all: bool,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let tasks: Vec<Task> = load_for_display(store, scope, group)?;
    let shown: Vec<(usize, &Task)> = tasks
        .iter()
        .enumerate()
        .filter(|(_, t)| all || !t.logged)
        .collect();

    if json {
        let out = GroupListJson {
            group: group.to_string(),
            records: shown.iter().map(|(i, t)| task_to_json(*i, t)).collect(),
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }
    if shown.is_empty() {
        println!("{}: empty", group);
    }
    for (i, task) in shown {
        println!("{}", format_task_line(i, task));
    }
    Ok(())
}

fn cmd_groups(start: &Path, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let session = open_session(start)?;
    let scope = session.store.primary();
    let groups = session.store.groups(scope)?;

    let mut summaries = Vec::new();
    for group in &groups {
        summaries.push((*group, group_len(&session.store, scope, group)?));
    }

    if json {
        let out: Vec<GroupSummaryJson> = summaries
            .iter()
            .map(|(g, count)| GroupSummaryJson {
                group: g.to_string(),
                kind: g.kind().to_string(),
                count: *count,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        for (group, count) in &summaries {
            println!("{}", format_group_line(group, *count));
        }
    }
    Ok(())
}

fn cmd_check(start: &Path, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let session = open_session(start)?;
    let result = check::check_store(session.store.committed());

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        if !result.errors.is_empty() {
            println!("Errors:");
            for err in &result.errors {
                match err {
                    check::CheckError::MissingOrder { group, id, label } => {
                        println!("  [{}] {} \"{}\" has no order value", group, short_id(*id), label);
                    }
                    check::CheckError::DuplicateOrder { group, order, ids } => {
                        let ids: Vec<String> = ids.iter().map(|id| short_id(*id)).collect();
                        println!("  [{}] order {} shared by: {}", group, order, ids.join(", "));
                    }
                    check::CheckError::DanglingHeader { task_id, header_id } => {
                        println!(
                            "  {} points at missing header {}",
                            short_id(*task_id),
                            short_id(*header_id)
                        );
                    }
                    check::CheckError::UnknownProject { id, project_id } => {
                        println!(
                            "  {} points at missing project {}",
                            short_id(*id),
                            short_id(*project_id)
                        );
                    }
                }
            }
        }
        if !result.warnings.is_empty() {
            if !result.errors.is_empty() {
                println!();
            }
            println!("Warnings:");
            for warn in &result.warnings {
                match warn {
                    check::CheckWarning::ExhaustedGap {
                        group,
                        before,
                        after,
                    } => {
                        println!(
                            "  [{}] no room between {} and {}",
                            group,
                            short_id(*before),
                            short_id(*after)
                        );
                    }
                }
            }
        }
        if result.valid {
            println!("✓ ordering is valid");
        } else {
            println!("✗ ordering has errors (try `ordo ensure`)");
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Watch
// ---------------------------------------------------------------------------

type Layout = BTreeMap<GroupKey, Vec<(Option<i32>, Uuid)>>;

fn collect_layout<R: StoredRecord>(doc: &StoreDocument, layout: &mut Layout) {
    for record in R::table(doc).values() {
        layout
            .entry(record.group())
            .or_default()
            .push((record.order(), record.id()));
    }
}

/// Membership and order values of every group in `doc`
fn group_layout(doc: &StoreDocument) -> Layout {
    let mut layout = Layout::new();
    collect_layout::<Task>(doc, &mut layout);
    collect_layout::<Header>(doc, &mut layout);
    collect_layout::<Project>(doc, &mut layout);
    collect_layout::<Area>(doc, &mut layout);
    for members in layout.values_mut() {
        members.sort();
    }
    layout
}

/// Groups whose members or order values differ between two documents
fn changed_groups(before: &StoreDocument, after: &StoreDocument) -> Vec<GroupKey> {
    let old = group_layout(before);
    let new = group_layout(after);
    let mut changed: Vec<GroupKey> = old
        .keys()
        .chain(new.keys())
        .filter(|g| old.get(g) != new.get(g))
        .copied()
        .collect();
    changed.sort();
    changed.dedup();
    changed
}

fn cmd_watch(start: &Path, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let store_dir = find_store_dir(start)?;
    let watcher = StoreWatcher::start(&store_dir)?;
    let mut backend = FileBackend::new(&store_dir);
    let mut snapshot = backend.load()?.unwrap_or_default();
    eprintln!("watching {} (Ctrl-C to stop)", backend.describe());

    while let Some(StoreEvent::Changed(mut paths)) = watcher.wait() {
        // One atomic write shows up as several events
        std::thread::sleep(Duration::from_millis(50));
        for StoreEvent::Changed(more) in watcher.poll() {
            paths.extend(more);
        }

        if paths.iter().any(|p| p.ends_with("config.toml")) {
            if json {
                println!("{}", serde_json::json!({ "config": "changed" }));
            } else {
                println!("config changed");
            }
        }

        let current = match backend.load() {
            Ok(doc) => doc.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "could not reload store after change");
                continue;
            }
        };
        let changed = changed_groups(&snapshot, &current);
        snapshot = current;
        if changed.is_empty() {
            continue;
        }

        if json {
            let groups: Vec<String> = changed.iter().map(|g| g.to_string()).collect();
            println!("{}", serde_json::json!({ "groups": groups }));
        } else {
            for group in &changed {
                println!("changed: {}", group);
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write command handlers
// ---------------------------------------------------------------------------

fn cmd_add(start: &Path, args: AddArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = open_session(start)?;
    let store = &mut session.store;
    let scope = store.primary();

    let placement = match args.to.as_deref() {
        Some(to) => parse_placement(store, scope, to)?,
        None => Placement::inbox(),
    };
    let siblings: Vec<Task> = store.siblings(scope, &placement.group())?;
    let position = insert_position(siblings, args.top, args.after.as_deref())?;

    let id = record_ops::add_task(store, scope, &args.title, placement, &position, Utc::now())?;
    println!("{}", short_id(id));
    Ok(())
}

fn cmd_header(start: &Path, args: HeaderArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = open_session(start)?;
    let store = &mut session.store;
    let scope = store.primary();

    let project: Project = resolve(store, scope, &args.project)?;
    let siblings: Vec<Header> = store.siblings(scope, &GroupKey::Headers { project: project.id })?;
    let position = insert_position(siblings, args.top, args.after.as_deref())?;

    let id = record_ops::add_header(store, scope, project.id, &args.title, &position, Utc::now())?;
    println!("{}", short_id(id));
    Ok(())
}

fn cmd_project(start: &Path, args: NameArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = open_session(start)?;
    let store = &mut session.store;
    let scope = store.primary();

    let siblings: Vec<Project> = store.siblings(scope, &GroupKey::Projects)?;
    let position = insert_position(siblings, args.top, args.after.as_deref())?;

    let id = record_ops::add_project(store, scope, &args.name, &position, Utc::now())?;
    println!("{}", short_id(id));
    Ok(())
}

fn cmd_area(start: &Path, args: NameArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = open_session(start)?;
    let store = &mut session.store;
    let scope = store.primary();

    let siblings: Vec<Area> = store.siblings(scope, &GroupKey::Areas)?;
    let position = insert_position(siblings, args.top, args.after.as_deref())?;

    let id = record_ops::add_area(store, scope, &args.name, &position, Utc::now())?;
    println!("{}", short_id(id));
    Ok(())
}

fn cmd_mv(start: &Path, args: MvArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = open_session(start)?;
    let store = &mut session.store;
    let scope = store.primary();
    let group = parse_group(store, scope, &args.group)?;

    if args.from == args.to {
        return Ok(());
    }
    match reorder::reorder_in_group(store, scope, &group, args.from, args.to)? {
        Some(_) => {
            println!("{}: moved {} -> {}", group, args.from, args.to);
            Ok(())
        }
        None => {
            tracing::debug!(%group, from = args.from, to = args.to, "move ignored");
            println!("{}: nothing moved", group);
            Ok(())
        }
    }
}

fn cmd_reparent(start: &Path, args: ReparentArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = open_session(start)?;
    let store = &mut session.store;
    let scope = store.primary();

    let task: Task = resolve(store, scope, &args.task)?;
    let placement = parse_placement(store, scope, &args.to)?;
    match reparent::reparent_task(store, scope, task.id, placement)? {
        Some(_) => println!("{} -> {}", short_id(task.id), placement.group()),
        None => println!("{} is already in {}", short_id(task.id), placement.group()),
    }
    Ok(())
}

fn cmd_done(start: &Path, args: TaskRefArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = open_session(start)?;
    let store = &mut session.store;
    let scope = store.primary();

    let task: Task = resolve(store, scope, &args.task)?;
    let task = record_ops::complete_task(store, scope, task.id, Utc::now())?;
    println!("{} done: {}", short_id(task.id), task.title);
    Ok(())
}

fn cmd_reopen(start: &Path, args: TaskRefArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = open_session(start)?;
    let store = &mut session.store;
    let scope = store.primary();

    let task: Task = resolve(store, scope, &args.task)?;
    let task = record_ops::reopen_task(store, scope, task.id)?;
    println!("{} reopened: {}", short_id(task.id), task.title);
    Ok(())
}

fn cmd_log(start: &Path, args: LogArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = open_session(start)?;
    let store = &mut session.store;
    let scope = store.primary();

    let mut log = DeferredLog::from_config(&store.config().completion);
    for task in store.all::<Task>(scope)? {
        log.schedule(&task);
    }

    let mut logged = log.fire_due(store, scope, Utc::now())?;
    if args.wait {
        while let Some(due) = log.next_due() {
            if let Ok(wait) = (due - Utc::now()).to_std() {
                std::thread::sleep(wait);
            }
            logged.extend(log.fire_due(store, scope, Utc::now())?);
        }
    }

    for id in &logged {
        println!("logged {}", short_id(*id));
    }
    if !log.is_empty() {
        println!(
            "{} completed task(s) not due yet (use --wait)",
            log.len()
        );
    } else if logged.is_empty() {
        println!("nothing to log");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Maintenance handlers
// ---------------------------------------------------------------------------

fn ensure_group(
    store: &mut Store,
    scope: ScopeId,
    group: &GroupKey,
) -> Result<RepairReport, CommitError> {
    match group.kind() {
        RecordKind::Task => bootstrap::ensure_ordering_initialized::<Task>(store, scope, group),
        RecordKind::Header => bootstrap::ensure_ordering_initialized::<Header>(store, scope, group),
        RecordKind::Project => {
            bootstrap::ensure_ordering_initialized::<Project>(store, scope, group)
        }
        RecordKind::Area => bootstrap::ensure_ordering_initialized::<Area>(store, scope, group),
    }
}

fn repair_typed<R: StoredRecord>(
    store: &mut Store,
    scope: ScopeId,
    group: &GroupKey,
    key: RepairKey,
) -> Result<RepairReport, CommitError> {
    match key {
        RepairKey::Created => bootstrap::repair_ordering::<R, _>(store, scope, group, by_created),
        RepairKey::Order => {
            bootstrap::repair_ordering::<R, _>(store, scope, group, compare_by_order)
        }
    }
}

fn print_reports(reports: &[RepairReport], json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        let out: Vec<RepairJson> = reports.iter().map(repair_to_json).collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }
    let changed: Vec<&RepairReport> = reports.iter().filter(|r| r.updated > 0).collect();
    if changed.is_empty() {
        println!("nothing to update");
    }
    for report in changed {
        println!("{}", format_repair_line(report));
    }
    Ok(())
}

fn cmd_ensure(start: &Path, args: EnsureArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = open_session(start)?;
    let store = &mut session.store;
    let scope = store.primary();

    let reports = match args.group.as_deref() {
        Some(reference) => {
            let group = parse_group(store, scope, reference)?;
            vec![ensure_group(store, scope, &group)?]
        }
        None => bootstrap::initialize_all(store, scope)?,
    };
    print_reports(&reports, json)
}

fn cmd_repair(start: &Path, args: RepairArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = open_session(start)?;
    let store = &mut session.store;
    let scope = store.primary();
    let group = parse_group(store, scope, &args.group)?;

    let report = match group.kind() {
        RecordKind::Task => repair_typed::<Task>(store, scope, &group, args.by)?,
        RecordKind::Header => repair_typed::<Header>(store, scope, &group, args.by)?,
        RecordKind::Project => repair_typed::<Project>(store, scope, &group, args.by)?,
        RecordKind::Area => repair_typed::<Area>(store, scope, &group, args.by)?,
    };
    print_reports(&[report], json)
}

fn cmd_config(start: &Path, args: ConfigArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let store_dir = find_store_dir(start)?;
    let (config, mut doc) = config_io::read_config(&store_dir)?;
    let effective = serde_json::to_value(&config)?;
    let lookup = |key: &str| -> Option<String> {
        let (section, name) = key.split_once('.')?;
        effective.get(section)?.get(name).map(|v| v.to_string())
    };

    match (args.key, args.value) {
        (None, _) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                for key in config_io::KNOWN_KEYS {
                    println!("{} = {}", key, lookup(*key).unwrap_or_default());
                }
            }
        }
        (Some(key), None) => {
            if !config_io::KNOWN_KEYS.contains(&key.as_str()) {
                return Err(format!("unknown config key \"{}\"", key).into());
            }
            let value = config_io::get_value(&doc, &key)
                .or_else(|| lookup(&key))
                .unwrap_or_default();
            println!("{}", value);
        }
        (Some(key), Some(value)) => {
            let timeout = Duration::from_millis(config.durability.lock_timeout_ms);
            let _lock = StoreLock::acquire(&store_dir, timeout)?;
            config_io::set_value(&mut doc, &key, &value)?;
            config_io::write_config(&store_dir, &doc)?;
            tracing::info!(%key, %value, "config updated");
            println!("{} = {}", key, value);
        }
    }
    Ok(())
}

fn cmd_recovery(start: &Path, cmd: RecoveryCmd, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let store_dir = find_store_dir(start)?;

    match cmd.action {
        Some(RecoveryAction::Path) => {
            let path = recovery::recovery_log_path(&store_dir);
            println!("{}", path.display());
        }
        Some(RecoveryAction::Clear) => {
            let removed = recovery::clear_recovery(&store_dir)?;
            println!("cleared {} recovery entries", removed);
        }
        None => {
            let entries = recovery::read_recovery_entries(&store_dir, Some(cmd.limit.unwrap_or(10)));
            if json {
                let out: Vec<RecoveryEntryJson> = entries.iter().map(recovery_to_json).collect();
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else if entries.is_empty() {
                println!("no recovery entries");
            } else {
                for entry in &entries {
                    println!(
                        "{} [{}] {}",
                        entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                        entry.category,
                        entry.description
                    );
                    for (name, value) in &entry.fields {
                        println!("    {}: {}", name, value);
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(titles: &[&str]) -> Vec<Task> {
        titles
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let mut task = Task::new(*t, Utc::now());
                task.order = Some(i as i32 * 10);
                task
            })
            .collect()
    }

    #[test]
    fn test_resolve_by_label_case_insensitive() {
        let tasks = named(&["Buy milk", "Call mom"]);
        let found = resolve_in(tasks, "buy MILK").unwrap();
        assert_eq!(found.title, "Buy milk");
    }

    #[test]
    fn test_resolve_by_id_prefix_and_full_id() {
        let tasks = named(&["One", "Two"]);
        let id = tasks[1].id;
        let prefix = short_id(id);
        assert_eq!(resolve_in(tasks.clone(), &prefix).unwrap().id, id);
        assert_eq!(resolve_in(tasks, &id.to_string()).unwrap().id, id);
    }

    #[test]
    fn test_resolve_ambiguous_label() {
        let tasks = named(&["Same", "same"]);
        let err = resolve_in(tasks, "SAME").unwrap_err();
        assert!(err.contains("matches 2 tasks"));
    }

    #[test]
    fn test_resolve_short_prefix_is_not_matched() {
        let tasks = named(&["One"]);
        let prefix: String = short_id(tasks[0].id).chars().take(3).collect();
        assert!(resolve_in(tasks, &prefix).is_err());
    }

    #[test]
    fn test_changed_groups_reports_reordered_group_only() {
        let mut before = StoreDocument::default();
        let mut project = Project::new("Home", Utc::now());
        project.order = Some(0);
        before.projects.insert(project.id, project);
        for task in named(&["A", "B"]) {
            before.tasks.insert(task.id, task);
        }

        let mut after = before.clone();
        assert!(changed_groups(&before, &after).is_empty());

        let first = *after.tasks.keys().next().unwrap();
        after.tasks[&first].order = Some(99);
        assert_eq!(changed_groups(&before, &after), vec![GroupKey::inbox()]);
    }
}
