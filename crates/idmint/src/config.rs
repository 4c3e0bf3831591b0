//! Environment-derived coordinator configuration.
//!
//! Every knob has a default matching the deployment the sidecar ships in, so
//! a bare process comes up against the in-cluster service names.

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_port_or(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

/// MySQL connection settings shared by the ticket and segment strategies.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub name: String,
}

impl DbConfig {
    /// Ticket-server settings. The default host is the multi-master write
    /// proxy, which owns offset/step tuning across masters.
    pub fn ticket_from_env() -> Self {
        Self::from_env("proxysql", 6033)
    }

    /// Segment-table settings, pointing straight at the segment schema.
    pub fn segment_from_env() -> Self {
        Self::from_env("mysql-dual-buffer", 3306)
    }

    fn from_env(default_host: &str, default_port: u16) -> Self {
        Self {
            host: env_or("DB_HOST", default_host),
            port: env_port_or("DB_PORT", default_port),
            user: env_or("DB_USER", "root"),
            pass: env_or("DB_PASS", "root"),
            name: env_or("DB_NAME", "uuid_db"),
        }
    }
}

/// Location of the etcd v3 HTTP gateway.
#[derive(Debug, Clone)]
pub struct EtcdConfig {
    pub host: String,
    pub port: u16,
}

impl EtcdConfig {
    pub fn from_env() -> Self {
        Self {
            host: env_or("ETCD_SERVICE_HOST", "etcd"),
            port: env_port_or("ETCD_SERVICE_PORT", 2379),
        }
    }

    /// Base URL of the v3 gateway, e.g. `http://etcd:2379/v3`.
    pub fn endpoint(&self) -> String {
        format!("http://{}:{}/v3", self.host, self.port)
    }
}

/// Location of a Spanner-compatible REST surface.
#[derive(Debug, Clone)]
pub struct SpannerConfig {
    pub emulator_host: String,
    pub project_id: String,
    pub instance_id: String,
    pub database_id: String,
}

impl SpannerConfig {
    pub fn from_env() -> Self {
        Self {
            emulator_host: env_or("SPANNER_EMULATOR_HOST", "spanner:9020"),
            project_id: env_or("SPANNER_PROJECT_ID", "test-project"),
            instance_id: env_or("SPANNER_INSTANCE_ID", "test-instance"),
            database_id: env_or("SPANNER_DATABASE_ID", "test-db"),
        }
    }

    /// Fully-qualified database URL all session operations hang off of.
    pub fn database_url(&self) -> String {
        format!(
            "http://{}/v1/projects/{}/instances/{}/databases/{}",
            self.emulator_host, self.project_id, self.instance_id, self.database_id
        )
    }
}
