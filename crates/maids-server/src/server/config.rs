use anyhow::bail;
use clap::{Parser, ValueEnum};
use core::time::Duration;
use maids_core::{
    AllocationConfig, DEFAULT_BATCH_CONCURRENCY, DEFAULT_MAX_GEN_RETRY,
    DEFAULT_MAX_IDS_IN_CREATE, DEFAULT_MAX_IDS_IN_REGISTER, FibonacciBackoff,
};
use std::path::PathBuf;

/// Backend holding the App ID table.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// SQLite database file at `DATABASE_PATH`.
    Sqlite,
    /// Process-local map. Contents are lost on restart.
    Memory,
}

/// Runtime configuration for the `maids-server` binary.
///
/// All values are parsed from CLI arguments or environment variables. A `.env`
/// file in the working directory is loaded first.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "maids-server",
    version,
    about = "An HTTP service that registers and generates unique App IDs"
)]
pub struct CliArgs {
    /// Address to listen on.
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:3000"))]
    pub server_addr: String,

    /// Shared secret every request must present, either as
    /// `Authorization: Bearer <token>` or as the `access_token` query
    /// parameter.
    ///
    /// Environment variable: `API_TOKEN_MAIDS`
    #[arg(long, env = "API_TOKEN_MAIDS", default_value_t = String::from("development-only-token"), hide_env_values = true)]
    pub api_token: String,

    /// Maximum number of IDs accepted by one register request.
    ///
    /// Environment variable: `MAX_REGISTER_IDS`
    #[arg(long, env = "MAX_REGISTER_IDS", default_value_t = DEFAULT_MAX_IDS_IN_REGISTER)]
    pub max_register_ids: usize,

    /// Maximum number of IDs generated by one create request.
    ///
    /// Environment variable: `MAX_CREATE_IDS`
    #[arg(long, env = "MAX_CREATE_IDS", default_value_t = DEFAULT_MAX_IDS_IN_CREATE)]
    pub max_create_ids: usize,

    /// Number of times a colliding generated ID is replaced before the item
    /// is reported as a conflict.
    ///
    /// Environment variable: `MAX_GEN_RETRY`
    #[arg(long, env = "MAX_GEN_RETRY", default_value_t = DEFAULT_MAX_GEN_RETRY)]
    pub max_gen_retry: u32,

    /// Lets create requests choose the values of their generated IDs. Only
    /// meant for test deployments.
    ///
    /// Environment variable: `CAN_SET_IDS_IN_CREATE`
    #[arg(long, env = "CAN_SET_IDS_IN_CREATE", default_value_t = false)]
    pub can_set_ids_in_create: bool,

    /// Lets create requests override `MAX_GEN_RETRY`. Only meant for test
    /// deployments.
    ///
    /// Environment variable: `CAN_SET_RETRIES_IN_CREATE`
    #[arg(long, env = "CAN_SET_RETRIES_IN_CREATE", default_value_t = false)]
    pub can_set_retries_in_create: bool,

    /// Items of one batch allocated at the same time.
    ///
    /// Environment variable: `BATCH_CONCURRENCY`
    #[arg(long, env = "BATCH_CONCURRENCY", default_value_t = DEFAULT_BATCH_CONCURRENCY)]
    pub batch_concurrency: usize,

    /// Store backend.
    ///
    /// Environment variable: `MAIDS_STORE`
    #[arg(long, env = "MAIDS_STORE", value_enum, default_value_t = StoreKind::Sqlite)]
    pub store: StoreKind,

    /// SQLite database file.
    ///
    /// Environment variable: `DATABASE_PATH`
    #[arg(long, env = "DATABASE_PATH", default_value = "maids.db")]
    pub database_path: PathBuf,

    /// Drops and recreates the App ID table at startup. Destroys all data.
    ///
    /// Environment variable: `DROP_TABLE_ON_INIT`
    #[arg(long, env = "DROP_TABLE_ON_INIT", default_value_t = false)]
    pub drop_table_on_init: bool,

    /// Upper bound for a single store operation, in milliseconds.
    ///
    /// Environment variable: `STORE_TIMEOUT_MS`
    #[arg(long, env = "STORE_TIMEOUT_MS", default_value_t = 10_000)]
    pub store_timeout_ms: u64,

    /// Connection attempts at startup before giving up.
    ///
    /// Environment variable: `CONNECT_MAX_ATTEMPTS`
    #[arg(long, env = "CONNECT_MAX_ATTEMPTS", default_value_t = 30)]
    pub connect_max_attempts: u32,

    /// Adds the underlying error detail to error objects in replies.
    ///
    /// Environment variable: `OUTPUT_STACK_TRACE`
    #[arg(long, env = "OUTPUT_STACK_TRACE", default_value_t = false)]
    pub output_stack_trace: bool,

    /// Seconds to wait for in-flight requests once a shutdown signal arrives.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 5)]
    pub shutdown_timeout: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub api_token: String,
    pub allocation: AllocationConfig,
    pub store: StoreKind,
    pub database_path: PathBuf,
    pub drop_table_on_init: bool,
    pub store_timeout: Duration,
    pub connect_backoff: FibonacciBackoff,
    pub output_stack_trace: bool,
    pub shutdown_timeout: Duration,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.max_register_ids == 0 {
            bail!("MAX_REGISTER_IDS must be greater than 0");
        }

        if args.max_create_ids == 0 {
            bail!("MAX_CREATE_IDS must be greater than 0");
        }

        if args.batch_concurrency == 0 {
            bail!("BATCH_CONCURRENCY must be greater than 0");
        }

        if args.store_timeout_ms == 0 {
            bail!("STORE_TIMEOUT_MS must be greater than 0");
        }

        if args.connect_max_attempts == 0 {
            bail!("CONNECT_MAX_ATTEMPTS must be greater than 0");
        }

        if args.api_token.is_empty() {
            bail!("API_TOKEN_MAIDS must not be empty");
        }

        Ok(Self {
            server_addr: args.server_addr,
            api_token: args.api_token,
            allocation: AllocationConfig {
                max_ids_in_register: args.max_register_ids,
                max_ids_in_create: args.max_create_ids,
                max_gen_retry: args.max_gen_retry,
                can_set_ids_in_create: args.can_set_ids_in_create,
                can_set_retries_in_create: args.can_set_retries_in_create,
                batch_concurrency: args.batch_concurrency,
            },
            store: args.store,
            database_path: args.database_path,
            drop_table_on_init: args.drop_table_on_init,
            store_timeout: Duration::from_millis(args.store_timeout_ms),
            connect_backoff: FibonacciBackoff {
                max_attempts: args.connect_max_attempts,
                ..FibonacciBackoff::default()
            },
            output_stack_trace: args.output_stack_trace,
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
        })
    }
}
