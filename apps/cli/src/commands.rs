//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use operatorcert_github::{CommentAction, CommentRequest, GithubClient};
use operatorcert_iib::{IibClient, PollObserver, PollOutcome, PollSettings, PublishRequest};
use operatorcert_pyxis::{EnsureOutcome, IdentityKey, NewContainerImage, ParsedData, PyxisClient};
use operatorcert_shared::{
    AppConfig, Credentials, DeletionFilter, OperatorCertError, load_config, load_config_from,
};
use operatorcert_webhook::{MirrorServiceClient, ReplicationEvent, ReplicationOutcome};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// operatorcert — operator certification pipeline steps.
#[derive(Parser)]
#[command(
    name = "operatorcert",
    version,
    about = "Operator certification pipeline steps: catalog records, index builds, PR comments, marketplace replication.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.operatorcert/operatorcert.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Pipeline flags are passed as strings; only `"true"` is true.
fn string_flag(value: &str) -> std::result::Result<bool, std::convert::Infallible> {
    Ok(value == "true")
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Create a ContainerImage record in Pyxis unless one already exists.
    CreateContainerImage {
        /// Base URL for the Pyxis container metadata API.
        #[arg(long)]
        pyxis_url: Option<String>,

        /// isv_pid of the certification project.
        #[arg(long)]
        isv_pid: String,

        /// Is the ContainerImage repository published?
        #[arg(long, action = clap::ArgAction::Set, value_parser = string_flag)]
        repo_published: bool,

        /// Certification project registry.
        #[arg(long)]
        registry: String,

        /// Repository name assigned to the certification project.
        #[arg(long)]
        repository: String,

        /// Is the ContainerImage certified?
        #[arg(long, action = clap::ArgAction::Set, value_parser = string_flag)]
        certified: bool,

        /// Operator bundle version.
        #[arg(long)]
        bundle_version: String,

        /// Container image digest of the related image stream.
        #[arg(long)]
        docker_image_digest: String,

        /// File with the result of `skopeo inspect` against the image.
        #[arg(long)]
        skopeo_result: PathBuf,

        /// Sum of the size of the image layers, in bytes.
        #[arg(long)]
        image_size: u64,

        /// Is the given version the latest?
        #[arg(long, action = clap::ArgAction::Set, value_parser = string_flag)]
        is_latest: bool,

        /// How deleted records are excluded: server-side or compensated.
        #[arg(long)]
        deletion_filter: Option<DeletionFilter>,
    },

    /// Publish a bundle to an index image using IIB.
    PublishBundle {
        /// Organization index where the bundle is released.
        #[arg(long)]
        organization: String,

        /// Operator bundle pullspec.
        #[arg(long)]
        bundle_pullspec: String,

        /// Base index pullspec.
        #[arg(long)]
        from_index: String,

        /// Base URL for the IIB API.
        #[arg(long)]
        iib_url: Option<String>,

        /// Maximum time to wait for the build, in seconds.
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Delay between build status reads, in seconds.
        #[arg(long)]
        poll_delay_secs: Option<u64>,
    },

    /// Add or replace a comment on a GitHub issue or pull request.
    GitAddComment {
        /// The GitHub API host; adjust for GitHub Enterprise.
        #[arg(long)]
        git_host_url: Option<String>,

        /// The API path prefix, e.g. /api/v3 for GitHub Enterprise.
        #[arg(long)]
        api_path_prefix: Option<String>,

        /// The issue or pull request URL to comment on.
        #[arg(long)]
        request_url: String,

        /// The comment text, or the name of a file containing it.
        #[arg(long)]
        comment_or_file: String,

        /// An invisible tag added to the comment.
        #[arg(long, default_value = "")]
        comment_tag: String,

        /// Replace the last comment carrying the tag instead of adding one.
        #[arg(long, default_value = "false", action = clap::ArgAction::Set, value_parser = string_flag)]
        replace: bool,

        /// Result of the preceding test stage.
        #[arg(long)]
        test_result: String,

        /// Whether --comment-or-file names a file in the workspace.
        #[arg(long, action = clap::ArgAction::Set, value_parser = string_flag)]
        comment_file: bool,

        /// Where to write the replaced comment, if any.
        #[arg(long)]
        old_comment: PathBuf,

        /// Where to write the posted comment.
        #[arg(long)]
        new_comment: PathBuf,

        /// File holding the bot token (defaults to $GITHUBTOKEN/github_bot_token.txt).
        #[arg(long)]
        token_file: Option<PathBuf>,
    },

    /// Notify the marketplace mirror about a newly published bundle.
    MarketplaceReplication {
        /// Repository the bundle was published from.
        #[arg(long)]
        git_repo_url: String,

        /// Operator package name.
        #[arg(long)]
        package: String,

        /// Target OpenShift version.
        #[arg(long)]
        ocp_version: String,

        /// Bundle image digest.
        #[arg(long)]
        bundle_image_digest: String,

        /// Bundle image pullspec.
        #[arg(long)]
        bundle_image: String,

        /// Bundle version.
        #[arg(long = "version")]
        bundle_version: String,

        /// Base URL of the mirror service.
        #[arg(long)]
        webhook_url: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "operatorcert=info",
        1 => "operatorcert=debug",
        _ => "operatorcert=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    // Secrets are read from the environment here and nowhere else.
    let credentials = Credentials::from_env(&config);

    match cli.command {
        Command::CreateContainerImage {
            pyxis_url,
            isv_pid,
            repo_published,
            registry,
            repository,
            certified,
            bundle_version,
            docker_image_digest,
            skopeo_result,
            image_size,
            is_latest,
            deletion_filter,
        } => {
            let parsed_data = ParsedData::from_inspect_file(&skopeo_result)?;
            let image = NewContainerImage {
                key: IdentityKey {
                    isv_pid,
                    docker_image_digest,
                },
                registry,
                repository,
                repo_published,
                certified,
                bundle_version,
                parsed_data,
                sum_layer_size_bytes: image_size,
                is_latest,
            };
            let pyxis_url = pyxis_url.unwrap_or_else(|| config.pyxis.url.clone());
            let filter = deletion_filter.unwrap_or(config.pyxis.deletion_filter);
            cmd_create_container_image(&pyxis_url, &image, filter, &credentials).await
        }
        Command::PublishBundle {
            organization,
            bundle_pullspec,
            from_index,
            iib_url,
            timeout_secs,
            poll_delay_secs,
        } => {
            let request = PublishRequest {
                organization,
                bundle_pullspec,
                from_index,
            };
            let settings = PollSettings {
                timeout: Duration::from_secs(timeout_secs.unwrap_or(config.iib.timeout_secs)),
                delay: Duration::from_secs(poll_delay_secs.unwrap_or(config.iib.poll_delay_secs)),
            };
            let iib_url = iib_url.unwrap_or_else(|| config.iib.url.clone());
            cmd_publish_bundle(&iib_url, &request, settings, &config, &credentials).await
        }
        Command::GitAddComment {
            git_host_url,
            api_path_prefix,
            request_url,
            comment_or_file,
            comment_tag,
            replace,
            test_result,
            comment_file,
            old_comment,
            new_comment,
            token_file,
        } => {
            let request = CommentRequest {
                request_url,
                comment_or_file,
                comment_is_file: comment_file,
                tag: comment_tag,
                replace,
                old_comment_path: Some(old_comment),
                new_comment_path: new_comment,
            };
            let host_url = git_host_url.unwrap_or_else(|| config.github.host_url.clone());
            let prefix = api_path_prefix.unwrap_or_else(|| config.github.api_path_prefix.clone());
            let token_file = token_file.or_else(|| config.github.resolve_token_file());
            cmd_git_add_comment(&host_url, &prefix, token_file, &request, &test_result).await
        }
        Command::MarketplaceReplication {
            git_repo_url,
            package,
            ocp_version,
            bundle_image_digest,
            bundle_image,
            bundle_version,
            webhook_url,
        } => {
            let event = ReplicationEvent {
                git_repo_url,
                package,
                ocp_version,
                bundle_image_digest,
                bundle_image,
                version: bundle_version,
            };
            let webhook_url = webhook_url.or_else(|| config.marketplace.webhook_url.clone());
            cmd_marketplace_replication(webhook_url.as_deref(), &event, &config, &credentials).await
        }
        Command::Config { action } => match action {
            ConfigAction::Show => cmd_config_show(&config),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_create_container_image(
    pyxis_url: &str,
    image: &NewContainerImage,
    filter: DeletionFilter,
    credentials: &Credentials,
) -> Result<()> {
    let client = PyxisClient::new(pyxis_url, credentials.pyxis_api_key.clone())?;

    info!(
        isv_pid = %image.key.isv_pid,
        digest = %image.key.docker_image_digest,
        version = %image.bundle_version,
        ?filter,
        "ensuring container image"
    );

    match operatorcert_pyxis::ensure_container_image(&client, image, filter).await? {
        EnsureOutcome::AlreadyExists => {
            println!("  Container image already exists, nothing created.");
        }
        EnsureOutcome::Created(body) => {
            let id = body.get("_id").and_then(|v| v.as_str()).unwrap_or("-");
            println!("  Container image created: {id}");
        }
    }

    Ok(())
}

async fn cmd_publish_bundle(
    iib_url: &str,
    request: &PublishRequest,
    settings: PollSettings,
    config: &AppConfig,
    credentials: &Credentials,
) -> Result<()> {
    let client = IibClient::new(iib_url)?;

    info!(
        organization = %request.organization,
        bundle = %request.bundle_pullspec,
        from_index = %request.from_index,
        timeout_secs = settings.timeout.as_secs(),
        "publishing bundle to index"
    );

    let progress = CliPollProgress::new();
    let build = operatorcert_iib::publish_bundle(
        &client,
        request,
        &credentials.iib,
        &config.iib.add_arches,
        settings,
        &progress,
    )
    .await?;

    println!();
    println!("  Index image build completed!");
    println!("  Build: {}", build.id);
    if let Some(index_image) = &build.index_image {
        println!("  Index: {index_image}");
    }
    println!();

    Ok(())
}

async fn cmd_git_add_comment(
    host_url: &str,
    api_path_prefix: &str,
    token_file: Option<PathBuf>,
    request: &CommentRequest,
    test_result: &str,
) -> Result<()> {
    if operatorcert_github::tests_passed(test_result) {
        info!("tests passed successfully, no comment needed");
        return Ok(());
    }

    let token_file = token_file.ok_or_else(|| {
        eyre!("no GitHub token file: pass --token-file or set GITHUBTOKEN")
    })?;
    let token = operatorcert_github::load_token(&token_file)?;
    let client = GithubClient::new(host_url, api_path_prefix, token)?;

    let outcome = operatorcert_github::publish_comment(&client, request).await?;
    let verb = match outcome.action {
        CommentAction::Created => "added to",
        CommentAction::Updated => "updated on",
    };
    println!("  A GitHub comment has been {verb} {}", request.request_url);

    Ok(())
}

async fn cmd_marketplace_replication(
    webhook_url: Option<&str>,
    event: &ReplicationEvent,
    config: &AppConfig,
    credentials: &Credentials,
) -> Result<()> {
    // The URL is only required once the repository matched and a token is set.
    let outcome = operatorcert_webhook::notify_replication(
        event,
        &config.marketplace.repo_pattern,
        credentials.webhook_token.as_deref(),
        |token| {
            let url = webhook_url.ok_or_else(|| {
                OperatorCertError::config(
                    "no mirror service URL: pass --webhook-url or set [marketplace] webhook_url",
                )
            })?;
            MirrorServiceClient::new(url, token)
        },
    )
    .await
    .map_err(|e| match e {
        OperatorCertError::Config { .. } if credentials.webhook_token.is_none() => eyre!(
            "{e}; set the {} environment variable",
            config.marketplace.token_env
        ),
        other => other.into(),
    })?;

    match outcome {
        ReplicationOutcome::Skipped => println!("  Not a marketplace repository, nothing sent."),
        ReplicationOutcome::Notified => println!("  Marketplace notified about {}", event.bundle_image),
    }

    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Build poll progress shown as an indicatif spinner.
struct CliPollProgress {
    spinner: ProgressBar,
}

impl CliPollProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl PollObserver for CliPollProgress {
    fn polled(&self, build_id: u64, state: &str, elapsed: Duration) {
        self.spinner.set_message(format!(
            "IIB build {build_id}: {state} ({}s)",
            elapsed.as_secs()
        ));
    }

    fn finished(&self, _build_id: u64, _outcome: &PollOutcome) {
        self.spinner.finish_and_clear();
    }
}
