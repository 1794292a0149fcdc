//! Service configuration
//!
//! All settings load from environment variables with sane local-development
//! defaults, so `cargo run` against local containers needs no setup. A `.env`
//! file is honored when present (loaded in `main`).
//!
//! | Variable | Default | Purpose |
//! |----------|---------|---------|
//! | MONGO_URI | mongodb://localhost:27017 | storage connection string |
//! | MONGO_DATABASE | orders | database name |
//! | MONGO_MAX_POOL_SIZE / MONGO_MIN_POOL_SIZE | 100 / 10 | driver pool bounds |
//! | MONGO_CONNECT_TIMEOUT / MONGO_SERVER_SELECTION_TIMEOUT | 10 / 5 (s) | driver timeouts |
//! | REDIS_URL / REDIS_PASSWORD / REDIS_DB | redis://localhost:6379 / "" / 0 | cache backend |
//! | RABBITMQ_URL | amqp://localhost:5672 | bus connection |
//! | RABBITMQ_MAX_RETRIES / RABBITMQ_RETRY_DELAY | 3 / 1 (s) | publish retry policy |
//! | RABBITMQ_EXCHANGE_NAME/_TYPE/_DURABLE/_AUTO_DELETE | exchange.order / direct / true / false | declared exchange |
//! | OUTBOX_BATCH_SIZE / OUTBOX_INTERVAL | 100 / 500 (ms) | relay tuning |
//! | HTTP_PORT / HTTP_BIND_INTERFACE | 8080 / 0.0.0.0 | listener |
//! | OTEL_ENDPOINT / OTEL_SERVICE_NAME / IS_PRODUCTION | http://localhost:4317 / order-server / false | telemetry |

use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
    pub max_pool_size: u32,
    pub min_pool_size: u32,
    pub connect_timeout: Duration,
    pub server_selection_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
    pub password: String,
    pub db: i64,
}

#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    pub name: String,
    /// direct | topic | fanout | headers
    pub kind: String,
    pub durable: bool,
    pub auto_delete: bool,
}

#[derive(Debug, Clone)]
pub struct RabbitMqConfig {
    pub url: String,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub exchanges: Vec<ExchangeConfig>,
}

#[derive(Debug, Clone)]
pub struct OutboxConfig {
    pub batch_size: u32,
    pub interval: Duration,
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub port: u16,
    pub bind_interface: String,
}

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub endpoint: String,
    pub service_name: String,
    pub is_production: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub mongo: MongoConfig,
    pub redis: RedisConfig,
    pub rabbitmq: RabbitMqConfig,
    pub outbox: OutboxConfig,
    pub http: HttpConfig,
    pub logger: LoggerConfig,
}

impl Config {
    /// Loads configuration from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            mongo: MongoConfig {
                uri: env_string("MONGO_URI", "mongodb://localhost:27017"),
                database: env_string("MONGO_DATABASE", "orders"),
                max_pool_size: env_parse("MONGO_MAX_POOL_SIZE", 100),
                min_pool_size: env_parse("MONGO_MIN_POOL_SIZE", 10),
                connect_timeout: Duration::from_secs(env_parse("MONGO_CONNECT_TIMEOUT", 10)),
                server_selection_timeout: Duration::from_secs(env_parse(
                    "MONGO_SERVER_SELECTION_TIMEOUT",
                    5,
                )),
            },
            redis: RedisConfig {
                url: env_string("REDIS_URL", "redis://localhost:6379"),
                password: env_string("REDIS_PASSWORD", ""),
                db: env_parse("REDIS_DB", 0),
            },
            rabbitmq: RabbitMqConfig {
                url: env_string("RABBITMQ_URL", "amqp://localhost:5672"),
                max_retries: env_parse("RABBITMQ_MAX_RETRIES", 3),
                retry_delay: Duration::from_secs(env_parse("RABBITMQ_RETRY_DELAY", 1)),
                exchanges: vec![ExchangeConfig {
                    name: env_string("RABBITMQ_EXCHANGE_NAME", "exchange.order"),
                    kind: env_string("RABBITMQ_EXCHANGE_TYPE", "direct"),
                    durable: env_parse("RABBITMQ_EXCHANGE_DURABLE", true),
                    auto_delete: env_parse("RABBITMQ_EXCHANGE_AUTO_DELETE", false),
                }],
            },
            outbox: OutboxConfig {
                batch_size: env_parse("OUTBOX_BATCH_SIZE", 100),
                interval: Duration::from_millis(env_parse("OUTBOX_INTERVAL", 500)),
            },
            http: HttpConfig {
                port: env_parse("HTTP_PORT", 8080),
                bind_interface: env_string("HTTP_BIND_INTERFACE", "0.0.0.0"),
            },
            logger: LoggerConfig {
                endpoint: env_string("OTEL_ENDPOINT", "http://localhost:4317"),
                service_name: env_string("OTEL_SERVICE_NAME", "order-server"),
                is_production: env_parse("IS_PRODUCTION", false),
            },
        }
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
