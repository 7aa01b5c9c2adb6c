mod config;
mod display;
mod workspace;

use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use cirrus_core::differ::create_plan;
use cirrus_core::effect::Effect;
use cirrus_core::interpreter::{ApplyResult, Interpreter, InterpreterConfig};
use cirrus_core::plan::Plan;
use cirrus_core::provider::{ErrorKind, Provider};
use cirrus_core::resource::{Resource, ResourceId};
use cirrus_provider_azurerm::client::MemoryArmClient;
use cirrus_provider_azurerm::{AzureRmProvider, ProviderContext};
use cirrus_state::{BackendError, ResourceState, StateBackend, StateFile, create_backend};

use config::CirrusConfig;

#[derive(Parser)]
#[command(name = "cirrus")]
#[command(about = "Declarative provisioning for Azure Resource Manager", long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, short, global = true, default_value = "cirrus.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration file without contacting Azure
    Validate,
    /// Show execution plan without applying changes
    Plan,
    /// Apply changes to reach the desired state
    Apply {
        /// Skip confirmation prompt
        #[arg(long)]
        auto_approve: bool,

        /// Show what would happen without calling Azure
        #[arg(long)]
        dry_run: bool,

        /// Keep applying after an effect fails
        #[arg(long)]
        continue_on_error: bool,
    },
    /// Destroy every resource recorded in state
    Destroy {
        /// Skip confirmation prompt
        #[arg(long)]
        auto_approve: bool,
    },
    /// Adopt an existing Azure resource into state
    Import {
        /// Resource address, `<type>.<name>`
        address: String,
        /// Azure Resource Manager ID of the existing resource
        id: String,
    },
    /// Re-read every recorded resource and update state
    Refresh,
    /// Inspect or modify recorded state
    State {
        #[command(subcommand)]
        command: StateCommands,
    },
    /// Print the schema of one or all resource types
    Schema {
        /// Resource type, all types when omitted
        resource_type: Option<String>,
    },
    /// Generate shell completions
    Completions {
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum StateCommands {
    /// List recorded resources
    List,
    /// Show the recorded attributes of a resource
    Show { address: String },
    /// Forget a resource without deleting it in Azure
    Rm { address: String },
    /// Release a stale state lock
    ForceUnlock { lock_id: String },
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate => run_validate(&cli.config),
        Commands::Plan => run_plan(&cli.config).await,
        Commands::Apply {
            auto_approve,
            dry_run,
            continue_on_error,
        } => {
            let config = InterpreterConfig {
                dry_run,
                continue_on_error,
            };
            run_apply(&cli.config, auto_approve, config).await
        }
        Commands::Destroy { auto_approve } => run_destroy(&cli.config, auto_approve).await,
        Commands::Import { address, id } => run_import(&cli.config, &address, &id).await,
        Commands::Refresh => run_refresh(&cli.config).await,
        Commands::State { command } => run_state_command(&cli.config, command).await,
        Commands::Schema { resource_type } => run_schema(resource_type.as_deref()),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "cirrus", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Log output is controlled by `CIRRUS_LOG`, e.g. `CIRRUS_LOG=cirrus_provider_azurerm=debug`
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("CIRRUS_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

// =============================================================================
// Workspace setup
// =============================================================================

struct Session {
    config: CirrusConfig,
    provider: AzureRmProvider,
    backend: Box<dyn StateBackend>,
}

impl Session {
    fn open(path: &Path) -> Result<Self, String> {
        let mut config = CirrusConfig::load(path)?;
        config.provider = config.provider.clone().with_env_overrides();

        let provider = config.provider.build().map_err(|e| e.to_string())?;
        let backend = create_backend(&config.backend).map_err(|e| e.to_string())?;
        Ok(Self {
            config,
            provider,
            backend,
        })
    }

    async fn read_state(&self) -> Result<StateFile, String> {
        read_state_from(self.backend.as_ref()).await
    }

    async fn write_state(&self, state: &mut StateFile) -> Result<(), String> {
        self.backend
            .init()
            .await
            .map_err(|e| format!("Failed to initialise state backend: {}", e))?;
        state.increment_serial();
        self.backend
            .write_state(state)
            .await
            .map_err(|e| format!("Failed to write state: {}", e))
    }

    /// Run `f` while holding the state lock
    async fn locked<T>(
        &self,
        operation: &str,
        f: impl Future<Output = Result<T, String>>,
    ) -> Result<T, String> {
        let lock = self
            .backend
            .acquire_lock(operation)
            .await
            .map_err(lock_error)?;
        let result = f.await;
        self.backend
            .release_lock(&lock)
            .await
            .map_err(|e| format!("Failed to release state lock: {}", e))?;
        result
    }
}

fn lock_error(e: BackendError) -> String {
    match &e {
        BackendError::Locked(held) => format!(
            "{}\nIf no other cirrus command is running, release it with `cirrus state force-unlock {}`",
            e, held.id
        ),
        _ => e.to_string(),
    }
}

fn validate_resources<P: Provider>(provider: &P, resources: &[Resource]) -> Result<(), String> {
    let mut all_errors = Vec::new();
    for resource in resources {
        if let Err(e) = provider.validate(resource) {
            all_errors.push(e.to_string());
        }
    }
    if all_errors.is_empty() {
        Ok(())
    } else {
        Err(format!("Validation failed:\n  {}", all_errors.join("\n  ")))
    }
}

fn parse_address(address: &str) -> Result<ResourceId, String> {
    match address.split_once('.') {
        Some((resource_type, name)) if !resource_type.is_empty() && !name.is_empty() => {
            Ok(ResourceId::new(resource_type, name))
        }
        _ => Err(format!(
            "invalid resource address {:?}, expected <type>.<name>",
            address
        )),
    }
}

fn confirm(question: &str) -> Result<bool, String> {
    println!("{}", question.yellow().bold());
    println!("  {}", "Only 'yes' will be accepted to approve.".yellow());
    print!("\n  Enter a value: ");
    std::io::stdout().flush().map_err(|e| e.to_string())?;

    let mut input = String::new();
    std::io::stdin()
        .read_line(&mut input)
        .map_err(|e| e.to_string())?;
    println!();
    Ok(input.trim() == "yes")
}

// =============================================================================
// Commands
// =============================================================================

fn run_validate(path: &Path) -> Result<(), String> {
    let config = CirrusConfig::load(path)?;
    let resources = config.resources()?;

    let provider = offline_provider(&config);

    println!("{}", "Validating...".cyan());
    validate_resources(&provider, &resources)?;

    println!(
        "{}",
        format!("✓ {} resources validated successfully.", resources.len())
            .green()
            .bold()
    );
    for resource in &resources {
        println!("  • {}", resource.id);
    }
    Ok(())
}

/// Provider for schema lookups and validation; it never reaches Azure
fn offline_provider(config: &CirrusConfig) -> AzureRmProvider {
    let subscription = config
        .provider
        .subscription_id
        .clone()
        .unwrap_or_default();
    let ctx = ProviderContext::new(Arc::new(MemoryArmClient::new()), subscription)
        .with_features(config.provider.features.clone());
    AzureRmProvider::new(ctx)
}

async fn plan_changes(session: &Session, state: &mut StateFile) -> Result<Plan, String> {
    let resources = session.config.resources()?;
    validate_resources(&session.provider, &resources)?;

    let current = workspace::refresh(&session.provider, state).await?;
    Ok(create_plan(
        &resources,
        &current,
        &workspace::schemas(&session.provider),
    ))
}

async fn run_plan(path: &Path) -> Result<(), String> {
    let session = Session::open(path)?;
    let mut state = session.read_state().await?;

    let plan = plan_changes(&session, &mut state).await?;
    print!(
        "{}",
        display::render_plan(&plan, &workspace::schemas(&session.provider))
    );
    Ok(())
}

async fn run_apply(path: &Path, auto_approve: bool, config: InterpreterConfig) -> Result<(), String> {
    let session = Session::open(path)?;
    session
        .locked("apply", apply_changes(&session, auto_approve, config))
        .await
}

async fn apply_changes(
    session: &Session,
    auto_approve: bool,
    config: InterpreterConfig,
) -> Result<(), String> {
    let mut state = session.read_state().await?;
    let plan = plan_changes(session, &mut state).await?;
    let schemas = workspace::schemas(&session.provider);

    if plan.is_empty() {
        println!("{}", "No changes needed.".green());
        // Refresh may still have dropped resources deleted outside Cirrus
        return session.write_state(&mut state).await;
    }

    print!("{}", display::render_plan(&plan, &schemas));
    println!();

    if !auto_approve && !config.dry_run && !confirm("Do you want to perform these actions?")? {
        println!("{}", "Apply cancelled.".yellow());
        return Ok(());
    }

    println!("{}", "Applying changes...".cyan().bold());
    println!();

    let dry_run = config.dry_run;
    let interpreter = Interpreter::new(&session.provider).with_config(config);
    let result = interpreter.apply(&plan).await;
    report_outcomes(&plan, &result);

    if !dry_run {
        workspace::record(&mut state, session.provider.name(), &plan, &result);
        session.write_state(&mut state).await?;
    }

    println!();
    if result.is_success() {
        println!(
            "{}",
            format!("Apply complete! {} changes applied.", result.success_count)
                .green()
                .bold()
        );
        Ok(())
    } else {
        Err(format!(
            "Apply failed. {} succeeded, {} failed.",
            result.success_count, result.failure_count
        ))
    }
}

fn report_outcomes(plan: &Plan, result: &ApplyResult) {
    for (effect, outcome) in plan.effects().iter().zip(&result.outcomes) {
        match outcome {
            Ok(_) => println!("  {} {}", "✓".green(), effect),
            Err(e) => {
                println!("  {} {} - {}", "✗".red(), effect, e);
                if let ErrorKind::AlreadyExists { id } = &e.kind {
                    println!(
                        "      {}",
                        format!(
                            "A resource with the ID {:?} already exists - it needs to be imported: cirrus import {} {}",
                            id,
                            effect.resource_id(),
                            id
                        )
                        .yellow()
                    );
                }
            }
        }
    }
}

async fn run_destroy(path: &Path, auto_approve: bool) -> Result<(), String> {
    let session = Session::open(path)?;
    session
        .locked("destroy", destroy_all(&session, auto_approve))
        .await
}

async fn destroy_all(session: &Session, auto_approve: bool) -> Result<(), String> {
    let mut state = session.read_state().await?;
    workspace::refresh(&session.provider, &mut state).await?;

    if state.resources.is_empty() {
        println!("{}", "No resources to destroy.".green());
        return session.write_state(&mut state).await;
    }

    // Reverse creation order: children before their parents
    let mut plan = Plan::new();
    for entry in state.resources.iter().rev() {
        plan.add(Effect::Delete {
            id: entry.resource_id(),
            identifier: entry.identifier.clone(),
        });
    }

    println!("{}", "Destroy Plan:".red().bold());
    println!();
    for effect in plan.effects() {
        println!("  {} {}", "-".red().bold(), effect.resource_id());
    }
    println!();
    println!("Plan: {} to destroy.", plan.len().to_string().red());
    println!();

    if !auto_approve
        && !confirm("Do you really want to destroy all resources? This action cannot be undone.")?
    {
        println!("{}", "Destroy cancelled.".yellow());
        return Ok(());
    }

    println!("{}", "Destroying resources...".red().bold());
    println!();

    let interpreter = Interpreter::new(&session.provider).with_config(InterpreterConfig {
        dry_run: false,
        continue_on_error: true,
    });
    let result = interpreter.apply(&plan).await;
    report_outcomes(&plan, &result);
    workspace::record(&mut state, session.provider.name(), &plan, &result);
    session.write_state(&mut state).await?;

    println!();
    if result.is_success() {
        println!(
            "{}",
            format!("Destroy complete! {} resources destroyed.", result.success_count)
                .green()
                .bold()
        );
        Ok(())
    } else {
        Err(format!(
            "Destroy failed. {} succeeded, {} failed.",
            result.success_count, result.failure_count
        ))
    }
}

async fn run_import(path: &Path, address: &str, identifier: &str) -> Result<(), String> {
    let id = parse_address(address)?;
    let session = Session::open(path)?;
    session
        .locked("import", async {
            let mut state = session.read_state().await?;
            if state.find_resource(&id.resource_type, &id.name).is_some() {
                return Err(format!(
                    "{} is already managed; remove it with `cirrus state rm {}` first",
                    id, id
                ));
            }

            let imported = session
                .provider
                .import(&id, identifier)
                .await
                .map_err(|e| format!("Import failed: {}", e))?;
            let entry = ResourceState::from_state(&imported, session.provider.name())
                .ok_or_else(|| format!("Import failed: {} returned no state", id))?;
            state.upsert_resource(entry);
            session.write_state(&mut state).await?;

            println!("{}", format!("✓ Imported {} from {}", id, identifier).green().bold());
            Ok(())
        })
        .await
}

async fn run_refresh(path: &Path) -> Result<(), String> {
    let session = Session::open(path)?;
    session
        .locked("refresh", async {
            let mut state = session.read_state().await?;
            let current = workspace::refresh(&session.provider, &mut state).await?;
            session.write_state(&mut state).await?;
            println!(
                "{}",
                format!("✓ Refreshed {} resources.", current.len()).green().bold()
            );
            Ok(())
        })
        .await
}

async fn read_state_from(backend: &dyn StateBackend) -> Result<StateFile, String> {
    let state = backend
        .read_state()
        .await
        .map_err(|e| format!("Failed to read state: {}", e))?;
    Ok(state.unwrap_or_default())
}

async fn run_state_command(path: &Path, command: StateCommands) -> Result<(), String> {
    let config = CirrusConfig::load(path)?;
    let backend = create_backend(&config.backend).map_err(|e| e.to_string())?;

    match command {
        StateCommands::List => {
            let state = read_state_from(backend.as_ref()).await?;
            for entry in &state.resources {
                println!("{}  {}", entry.resource_id(), entry.identifier.dimmed());
            }
            Ok(())
        }
        StateCommands::Show { address } => {
            let id = parse_address(&address)?;
            let state = read_state_from(backend.as_ref()).await?;
            let entry = state
                .find_resource(&id.resource_type, &id.name)
                .ok_or_else(|| format!("{} is not in state", id))?;
            let schemas = workspace::schemas(&offline_provider(&config));
            print!(
                "{}",
                display::render_state(&entry.to_state(), schemas.get(&id.resource_type))
            );
            Ok(())
        }
        StateCommands::Rm { address } => {
            let id = parse_address(&address)?;
            let lock = backend
                .acquire_lock("state rm")
                .await
                .map_err(lock_error)?;
            let result = async {
                let mut state = read_state_from(backend.as_ref()).await?;
                state
                    .remove_resource(&id.resource_type, &id.name)
                    .ok_or_else(|| format!("{} is not in state", id))?;
                state.increment_serial();
                backend
                    .write_state(&state)
                    .await
                    .map_err(|e| format!("Failed to write state: {}", e))
            }
            .await;
            backend
                .release_lock(&lock)
                .await
                .map_err(|e| e.to_string())?;
            result?;
            println!("{}", format!("✓ Removed {} from state", id).green());
            Ok(())
        }
        StateCommands::ForceUnlock { lock_id } => {
            backend
                .force_unlock(&lock_id)
                .await
                .map_err(|e| e.to_string())?;
            println!("{}", "State lock released.".green());
            Ok(())
        }
    }
}

fn run_schema(resource_type: Option<&str>) -> Result<(), String> {
    let provider = offline_provider(&CirrusConfig::parse("{}")?);
    let mut schemas: Vec<_> = workspace::schemas(&provider).into_values().collect();
    schemas.sort_by(|a, b| a.resource_type.cmp(&b.resource_type));

    let selected: Vec<_> = match resource_type {
        None => schemas,
        Some(name) => {
            let found: Vec<_> = schemas
                .into_iter()
                .filter(|s| s.resource_type == name)
                .collect();
            if found.is_empty() {
                return Err(format!("Unknown resource type: {}", name));
            }
            found
        }
    };

    let rendered: Vec<String> = selected.iter().map(display::render_schema).collect();
    print!("{}", rendered.join("\n"));
    Ok(())
}
