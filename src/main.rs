use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use vault_task_sync::cli::{
    AppConfig, Args, ConfigDiscovery, ExecutionMode, GlobalOptions, SyncOverrides,
};
use vault_task_sync::compose::{compose_outbound_message, create_mime_email};
use vault_task_sync::env;
use vault_task_sync::sync::StateStore;
use vault_task_sync::task::parse_syncable_tasks;
use vault_task_sync::{
    FileStore, FsVault, HttpSchedulerClient, JsonStateStore, OutboundSync, OutboxSender,
    RemoteSink, SchedulerClient, SynchronizationEngine, TaskCollector, VaultSink,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mode = match args.mode() {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };
    let options = args.global_options();

    match mode {
        ExecutionMode::ShowConfig => {
            ConfigDiscovery::show_discovery_info();
            Ok(())
        }
        ExecutionMode::InitConfig => {
            let path = ConfigDiscovery::create_default_user_config()?;
            println!("Configuration file: {}", path.display());
            Ok(())
        }
        mode => {
            let config = ConfigDiscovery::discover_config(options.config_override.as_deref())?;
            let workspace = Workspace::open(config, &options);
            run(mode, workspace).await
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "vault_task_sync=debug,vts=debug"
    } else {
        env::DEFAULT_LOG_FILTER
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Everything a subcommand needs, resolved once from configuration.
struct Workspace {
    config: AppConfig,
    root: PathBuf,
    vault: Arc<FsVault>,
    verbose: bool,
}

impl Workspace {
    fn open(config: AppConfig, options: &GlobalOptions) -> Self {
        let root = config.vault_root(options.vault_override.as_deref());
        info!("Using vault at {:?}", root);
        Self {
            vault: Arc::new(FsVault::new(root.clone())),
            root,
            config,
            verbose: options.verbose,
        }
    }

    fn collector(&self) -> Arc<TaskCollector> {
        Arc::new(TaskCollector::new(
            self.vault.clone(),
            self.config.vault.filter.clone(),
            &self.config.vault.task_file_patterns,
        ))
    }

    fn state_store(&self) -> Arc<JsonStateStore> {
        Arc::new(JsonStateStore::new(env::state_file_path(&self.root)))
    }

    fn scheduler(&self) -> Result<Arc<HttpSchedulerClient>> {
        let client = HttpSchedulerClient::new(self.config.scheduler.clone())
            .context("Failed to build scheduler client")?;
        Ok(Arc::new(client))
    }

    async fn outbound(&self) -> Result<Arc<OutboundSync>> {
        let sender = OutboxSender::new(self.config.outbox_dir(&self.root));
        let outbound = OutboundSync::load(
            self.vault.clone(),
            Arc::new(sender),
            self.state_store(),
            self.config.email.clone(),
            self.config.vault.filter.clone(),
            self.config.sync.debounce(),
        )
        .await?;
        Ok(Arc::new(outbound))
    }

    fn engine(
        &self,
        collector: Arc<TaskCollector>,
        client: Arc<HttpSchedulerClient>,
        overrides: SyncOverrides,
    ) -> SynchronizationEngine {
        let mut sync_config = self.config.sync.clone();
        if let Some(strategy) = overrides.strategy {
            sync_config.conflict_strategy = strategy;
        }
        if let Some(direction) = overrides.direction {
            sync_config.direction = direction;
        }

        let vault_sink = VaultSink::new(collector, self.config.vault.inbox_file.clone())
            .with_linker(client.clone(), sync_config.priority_to_remote.clone());
        let remote_sink = RemoteSink::new(client, sync_config.priority_to_remote.clone());
        let state: Arc<dyn StateStore> = self.state_store();

        SynchronizationEngine::new(sync_config, Arc::new(vault_sink), Arc::new(remote_sink))
            .with_state_store(state)
    }
}

async fn run(mode: ExecutionMode, workspace: Workspace) -> Result<()> {
    match mode {
        ExecutionMode::Collect { include_completed } => {
            run_collect(&workspace, include_completed).await
        }
        ExecutionMode::Compose { file } => run_compose(&workspace, file).await,
        ExecutionMode::Send { file } => run_send(&workspace, &file).await,
        ExecutionMode::Sync(overrides) => run_sync(&workspace, overrides).await,
        ExecutionMode::Watch {
            overrides,
            interval_secs,
        } => run_watch(&workspace, overrides, interval_secs).await,
        ExecutionMode::TestConnection => run_test_connection(&workspace).await,
        ExecutionMode::ShowConfig | ExecutionMode::InitConfig => Ok(()),
    }
}

async fn run_collect(workspace: &Workspace, include_completed: bool) -> Result<()> {
    let mut filter = workspace.config.vault.filter.clone();
    filter.include_completed_tasks |= include_completed;
    let collector = TaskCollector::new(
        workspace.vault.clone(),
        filter,
        &workspace.config.vault.task_file_patterns,
    );

    let tasks = collector.collect_tasks().await?;
    for task in &tasks {
        let status = if task.completed { 'x' } else { ' ' };
        println!("[{}] {}  {}", status, task.description, task.id);
        if workspace.verbose {
            let metadata = serde_json::to_string(&task.metadata)?;
            println!("      {}", metadata);
        }
    }
    println!("{} task(s)", tasks.len());
    Ok(())
}

async fn run_compose(workspace: &Workspace, file: Option<String>) -> Result<()> {
    let files = match file {
        Some(file) => vec![file],
        None => workspace
            .collector()
            .eligible_files()
            .await?
            .into_iter()
            .map(|f| f.path)
            .collect(),
    };

    let mut composed = 0;
    for path in files {
        let content = workspace.vault.read_file(&path).await?;
        let lines: Vec<&str> = content.split('\n').collect();
        for task in parse_syncable_tasks(&lines, &workspace.config.vault.filter)
            .iter()
            .filter(|t| t.should_sync)
        {
            let message = compose_outbound_message(task, &workspace.config.email)
                .with_context(|| format!("Cannot compose {}:{}", path, task.line_number + 1))?;
            println!("# {}:{}", path, task.line_number + 1);
            println!("{}", create_mime_email(&message));
            composed += 1;
        }
    }
    println!("{} message(s)", composed);
    Ok(())
}

async fn run_send(workspace: &Workspace, file: &str) -> Result<()> {
    let outbound = workspace.outbound().await?;
    let report = outbound.handle_file_change(file).await?;

    for subject in &report.sent {
        println!("Sent: {}", subject);
    }
    for error in &report.errors {
        eprintln!("Failed: {}", error);
    }
    if !report.errors.is_empty() {
        bail!("{} task(s) could not be sent", report.errors.len());
    }
    Ok(())
}

async fn run_sync(workspace: &Workspace, overrides: SyncOverrides) -> Result<()> {
    let collector = workspace.collector();
    let client = workspace.scheduler()?;
    let engine = workspace.engine(collector.clone(), client.clone(), overrides);
    engine.restore_checkpoint().await?;

    sync_once(&engine, &collector, client.as_ref()).await
}

async fn sync_once(
    engine: &SynchronizationEngine,
    collector: &TaskCollector,
    client: &dyn SchedulerClient,
) -> Result<()> {
    let vault_tasks = collector.collect_tasks().await?;
    let remote_tasks = client.list_tasks().await?;
    let status = engine.synchronize(&vault_tasks, &remote_tasks).await?;

    println!("{}", status.summary());
    for e in &status.errors {
        eprintln!("  {}", e);
    }
    Ok(())
}

async fn run_watch(
    workspace: &Workspace,
    overrides: SyncOverrides,
    interval_secs: Option<u64>,
) -> Result<()> {
    let interval = interval_secs
        .map(std::time::Duration::from_secs)
        .unwrap_or_else(|| workspace.config.sync.interval());

    let collector = workspace.collector();
    let client = workspace.scheduler()?;
    let engine = workspace.engine(collector.clone(), client.clone(), overrides);
    engine.restore_checkpoint().await?;

    let outbound = if workspace.config.email.auto_send_on_save {
        Some(workspace.outbound().await?)
    } else {
        None
    };

    info!("Watching vault every {:?}", interval);
    let mut ticker = tokio::time::interval(interval);
    let mut last_scan: Option<DateTime<Utc>> = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Some(outbound) = &outbound {
                    let scan_started = Utc::now();
                    if let Err(e) = notify_changed_files(outbound, &collector, last_scan).await {
                        warn!("Scanning for changed files failed: {}", e);
                    }
                    last_scan = Some(scan_started);
                }
                if let Err(e) = sync_once(&engine, &collector, client.as_ref()).await {
                    error!("Sync pass failed: {:#}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping watch");
                return Ok(());
            }
        }
    }
}

/// Hands files modified since the previous scan to the debounced email flow.
async fn notify_changed_files(
    outbound: &Arc<OutboundSync>,
    collector: &TaskCollector,
    since: Option<DateTime<Utc>>,
) -> Result<()> {
    for file in collector.eligible_files().await? {
        let changed = match (since, file.modified) {
            (Some(since), Some(modified)) => modified > since,
            _ => true,
        };
        if changed {
            debug!("{} changed, scheduling outbound check", file.path);
            outbound.notify_modified(&file.path);
        }
    }
    Ok(())
}

async fn run_test_connection(workspace: &Workspace) -> Result<()> {
    let client = workspace.scheduler()?;
    if let Err(e) = client.validate() {
        bail!("Scheduler configuration is incomplete: {}", e);
    }

    if client.test_connection().await {
        println!("✓ Connected to {} ({})", client.client_name(), workspace.config.scheduler.base_url);
        Ok(())
    } else {
        bail!("Could not reach {}", workspace.config.scheduler.base_url)
    }
}
