//! `graphwatch poll` command implementation.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context as _, Result, bail, ensure};
use clap::Args;
use graphwatch::{Context, ExecutionItem, ExecutionMode, InstanceLeases, PollStateStore};
use graphwatch_core::{Config, FileStateStore, TriggerConfig};
use serde_json::{Value as JsonValue, json};
use sharepoint::TriggerOptions;
use tokio::{
    task::JoinSet,
    time::{MissedTickBehavior, interval},
};
use tracing::{debug, error, info};

use crate::credentials::{CredentialArgs, Credentials, load_credentials, with_sharepoint_credential};

/// Arguments for the `poll` command.
#[derive(Args)]
pub struct PollArgs {
    /// Path to graphwatch.toml. Defaults to `$GRAPHWATCH_CONFIG_PATH` or the
    /// nearest graphwatch.toml in the current directory or its parents.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Only poll these triggers (by name). Can be specified multiple times.
    #[arg(short = 't', long = "trigger")]
    pub triggers: Vec<String>,

    /// Run a single cycle per trigger and exit.
    #[arg(long)]
    pub once: bool,

    /// Print sample output for each trigger without reading or updating poll
    /// state. Implies --once.
    #[arg(long)]
    pub test: bool,

    #[command(flatten)]
    pub credentials: CredentialArgs,
}

/// A configured trigger ready to run.
#[derive(Debug, Clone)]
struct TriggerInstance {
    ctx: Context,
    options: TriggerOptions,
}

pub async fn run(args: &PollArgs) -> Result<()> {
    let (config_path, config) = match &args.config {
        Some(path) => (path.clone(), Config::load(path)?),
        None => Config::load_resolved()?.context(
            "no graphwatch.toml found; pass --config or set GRAPHWATCH_CONFIG_PATH",
        )?,
    };
    let credentials = load_credentials(&args.credentials)?;

    let state_dir = config.state_dir(&config_path);
    info!(config = %config_path.display(), state_dir = %state_dir.display(), "loaded configuration");
    let store: Arc<dyn PollStateStore> = Arc::new(FileStateStore::new(state_dir));
    let leases = Arc::new(InstanceLeases::new());
    let mode = if args.test {
        ExecutionMode::Manual
    } else {
        ExecutionMode::Trigger
    };

    let mut instances = Vec::new();
    for trigger in select_triggers(&config, &args.triggers)? {
        let ctx = Context::with_metadata("", &trigger.name)
            .with_mode(mode)
            .with_state_store(Arc::clone(&store))
            .with_leases(Arc::clone(&leases));
        instances.push(prepare(trigger, ctx, &credentials)?);
    }
    ensure!(!instances.is_empty(), "no enabled triggers to poll");

    let once = args.once || args.test;
    let mut tasks = JoinSet::new();
    for instance in instances {
        tasks.spawn(run_instance(instance, once));
    }

    if once {
        return join_all(&mut tasks).await;
    }
    let interrupted = tokio::select! {
        result = join_all(&mut tasks) => {
            result?;
            false
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for ctrl-c")?;
            true
        }
    };
    if interrupted {
        info!("shutting down");
        tasks.abort_all();
    }
    Ok(())
}

async fn join_all(tasks: &mut JoinSet<Result<()>>) -> Result<()> {
    let mut failed = 0usize;
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined.context("poll task panicked")? {
            error!(error = format!("{e:#}"), "trigger failed");
            failed += 1;
        }
    }
    if failed > 0 {
        bail!("{failed} trigger(s) failed");
    }
    Ok(())
}

/// Picks the enabled triggers, narrowed to `names` when given.
fn select_triggers<'a>(config: &'a Config, names: &[String]) -> Result<Vec<&'a TriggerConfig>> {
    if names.is_empty() {
        return Ok(config.enabled_triggers().collect());
    }
    names
        .iter()
        .map(|name| {
            config
                .enabled_triggers()
                .find(|t| t.name == *name)
                .with_context(|| format!("unknown or disabled trigger: {name}"))
        })
        .collect()
}

fn prepare(trigger: &TriggerConfig, ctx: Context, credentials: &Credentials) -> Result<TriggerInstance> {
    let options: TriggerOptions =
        serde_json::from_value(JsonValue::Object(trigger.options.clone()))
            .with_context(|| format!("invalid options for trigger '{}'", trigger.name))?;
    options
        .validate()
        .with_context(|| format!("invalid options for trigger '{}'", trigger.name))?;
    let ctx = with_sharepoint_credential(ctx, credentials, &trigger.credential)?;
    Ok(TriggerInstance { ctx, options })
}

async fn run_instance(instance: TriggerInstance, once: bool) -> Result<()> {
    let TriggerInstance { ctx, options } = instance;
    let name = ctx.instance_id().to_string();
    let mut ticker = interval(options.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut cycle = 0u64;
    loop {
        ticker.tick().await;
        cycle += 1;
        let cycle_ctx = ctx.clone().with_request_id(&format!("{name}-{cycle}"));

        match sharepoint::poll(&cycle_ctx, &options).await {
            Ok(Some(items)) => {
                info!(trigger = %name, cycle, items = items.len(), "trigger fired");
                emit(&name, &items)?;
            }
            Ok(None) => debug!(trigger = %name, cycle, "no changes"),
            Err(e) if once => return Err(e.context(format!("trigger '{name}'"))),
            Err(e) => error!(trigger = %name, cycle, error = format!("{e:#}"), "poll failed"),
        }

        if once {
            return Ok(());
        }
    }
}

/// Prints items as JSON lines on stdout.
fn emit(trigger: &str, items: &[ExecutionItem]) -> Result<()> {
    for item in items {
        let line = serde_json::to_string(&json!({ "trigger": trigger, "item": item }))?;
        println!("{line}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tempfile::TempDir;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    use super::*;

    fn config(toml_str: &str) -> Config {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("graphwatch.toml");
        std::fs::write(&path, toml_str).unwrap();
        Config::load(&path).unwrap()
    }

    fn credentials(server: &MockServer) -> Credentials {
        Credentials::from([(
            "sharepoint".to_string(),
            HashMap::from([
                ("tenant_id".to_string(), "tenant-1".to_string()),
                ("client_id".to_string(), "client-1".to_string()),
                ("client_secret".to_string(), "secret-1".to_string()),
                (
                    "site_url".to_string(),
                    "https://contoso.sharepoint.com/sites/Marketing".to_string(),
                ),
                (
                    "token_endpoint".to_string(),
                    format!("{}/token", server.uri()),
                ),
                ("endpoint".to_string(), format!("{}/v1.0", server.uri())),
            ]),
        )])
    }

    async fn mount_graph(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(r#"{"access_token":"test-token"}"#, "application/json"),
            )
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1.0/sites/contoso.sharepoint.com:/sites/Marketing"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(r#"{"id":"site-1"}"#, "application/json"),
            )
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1.0/sites/site-1/drives"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"value":[{"id":"drive-1","name":"Documents"}]}"#,
                "application/json",
            ))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1.0/drives/drive-1/root:/Contracts:/children"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"value":[{"id":"A","name":"a.pdf","lastModifiedDateTime":"2024-01-01T00:00:00Z","file":{}}]}"#,
                "application/json",
            ))
            .mount(server)
            .await;
    }

    #[test]
    fn test_select_triggers_skips_disabled() {
        let config = config(
            r#"
[[triggers]]
name = "a"

[[triggers]]
name = "b"
enabled = false
"#,
        );

        let selected = select_triggers(&config, &[]).unwrap();

        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "a");
    }

    #[test]
    fn test_select_triggers_rejects_unknown_name() {
        let config = config("[[triggers]]\nname = \"a\"\n");

        let err = select_triggers(&config, &["missing".to_string()]).unwrap_err();

        assert_eq!(err.to_string(), "unknown or disabled trigger: missing");
    }

    #[test]
    fn test_prepare_rejects_out_of_range_interval() {
        let config = config(
            r#"
[[triggers]]
name = "fast"

[triggers.options]
pollInterval = 1
"#,
        );

        let err = prepare(&config.triggers[0], Context::empty(), &Credentials::new()).unwrap_err();

        assert!(format!("{err:#}").contains("pollInterval must be between 10 and 3600"));
    }

    #[test]
    fn test_prepare_reads_options_and_credential() {
        let config = config(
            r#"
[[triggers]]
name = "contracts"
credential = "contoso"

[triggers.options]
event = "fileModified"
folderPath = "Contracts"
fileExtensions = "pdf,docx"
"#,
        );
        let credentials = Credentials::from([("contoso".to_string(), HashMap::new())]);

        let instance = prepare(&config.triggers[0], Context::empty(), &credentials).unwrap();

        assert_eq!(instance.options.event, sharepoint::TriggerEvent::FileModified);
        assert_eq!(instance.options.file_extensions, ["pdf", "docx"]);
        assert!(
            instance
                .ctx
                .credential::<HashMap<String, String>>("sharepoint")
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_single_cycle_persists_snapshot_to_state_dir() {
        // Arrange
        let server = MockServer::start().await;
        mount_graph(&server).await;
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(FileStateStore::new(temp_dir.path()));
        let config = config(
            r#"
[[triggers]]
name = "contracts"

[triggers.options]
folderPath = "Contracts"
"#,
        );
        let ctx = Context::with_metadata("", "contracts")
            .with_state_store(Arc::clone(&store) as Arc<dyn PollStateStore>);
        let instance = prepare(&config.triggers[0], ctx, &credentials(&server)).unwrap();

        // Act
        run_instance(instance, true).await.unwrap();

        // Assert
        let snapshot = store.load("contracts").await.unwrap().unwrap();
        assert_eq!(snapshot["lastKnownFiles"][0]["id"], "A");
        assert!(snapshot["lastPollTime"].is_string());
    }

    #[tokio::test]
    async fn test_single_cycle_failure_names_the_trigger() {
        let server = MockServer::start().await;
        let config = config("[[triggers]]\nname = \"broken\"\n");
        let ctx = Context::with_metadata("", "broken");
        let instance = prepare(&config.triggers[0], ctx, &credentials(&server)).unwrap();

        let err = run_instance(instance, true).await.unwrap_err();

        let message = format!("{err:#}");
        assert!(message.starts_with("trigger 'broken': Trigger failed: authentication failed"));
    }
}
