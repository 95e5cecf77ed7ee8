use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default HTTP listen address; sensor stations are set up to report here
pub const DEFAULT_HTTP_BIND: &str = "0.0.0.0:1883";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DatabaseConfig {
    /// Full connection string; wins over the individual fields
    pub url: Option<String>,
    pub name: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub bind: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub database: Option<DatabaseConfig>,
    pub http: Option<HttpConfig>,
}

/// Settings given on the command line; they win over file and environment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub database: Option<String>,
    pub dbhost: Option<String>,
    pub dbport: Option<u16>,
    pub port: Option<u16>,
    pub bind: Option<String>,
}

/// Where readings are kept
#[derive(Debug, Clone, PartialEq)]
pub enum Backend {
    /// Nothing configured; readings live in process memory
    Memory,
    Url(String),
    Components {
        name: String,
        host: String,
        port: u16,
        user: String,
        password: Option<String>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

impl AppConfig {
    /// Load configuration from HTC_CONFIG path (TOML) if present, then apply
    /// DATABASE_URL, DBUSER and DBPASSWORD from the environment
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("HTC_CONFIG").unwrap_or_else(|_| "htcollector.toml".to_string());
        let mut cfg = Self::from_file(&path)?;
        cfg.apply_env(|key| std::env::var(key).ok())?;
        Ok(cfg)
    }

    /// Read a TOML file; a missing file yields the defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            let s = fs::read_to_string(path)?;
            Ok(toml::from_str::<AppConfig>(&s)?)
        } else {
            Ok(AppConfig::default())
        }
    }

    /// Overlay environment settings; `lookup` abstracts `std::env::var`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.get_or_insert_with(Default::default).url = Some(url);
        }
        if let Some(user) = lookup("DBUSER") {
            self.database.get_or_insert_with(Default::default).user = Some(user);
        }
        if let Some(password) = lookup("DBPASSWORD") {
            self.database.get_or_insert_with(Default::default).password = Some(password);
        }
        if let Some(port) = lookup("DBPORT") {
            let port = port.parse().map_err(|_| ConfigError::Invalid {
                key: "DBPORT",
                value: port.clone(),
            })?;
            self.database.get_or_insert_with(Default::default).port = Some(port);
        }
        Ok(())
    }

    /// Overlay command line settings. Any database flag selects MySQL.
    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if overrides.database.is_some() || overrides.dbhost.is_some() || overrides.dbport.is_some()
        {
            let db = self.database.get_or_insert_with(Default::default);
            if let Some(name) = &overrides.database {
                db.name = Some(name.clone());
            }
            if let Some(host) = &overrides.dbhost {
                db.host = Some(host.clone());
            }
            if let Some(port) = overrides.dbport {
                db.port = Some(port);
            }
        }

        if overrides.bind.is_some() || overrides.port.is_some() {
            let current = self.http_bind();
            let (host, port) = current
                .rsplit_once(':')
                .unwrap_or((current.as_str(), "1883"));
            let host = match overrides.bind.as_deref() {
                None => host.to_string(),
                // empty address listens on every interface
                Some("") => "0.0.0.0".to_string(),
                Some(addr) if addr.contains(':') && !addr.starts_with('[') => format!("[{addr}]"),
                Some(addr) => addr.to_string(),
            };
            let port = overrides
                .port
                .map(|p| p.to_string())
                .unwrap_or_else(|| port.to_string());
            self.http = Some(HttpConfig {
                bind: Some(format!("{host}:{port}")),
            });
        }
    }

    /// Get HTTP bind address (default 0.0.0.0:1883)
    pub fn http_bind(&self) -> String {
        self.http
            .as_ref()
            .and_then(|h| h.bind.clone())
            .unwrap_or_else(|| DEFAULT_HTTP_BIND.to_string())
    }

    /// Resolve the storage backend.
    ///
    /// A `[database]` section or any database variable selects MySQL; only
    /// its absence falls back to memory.
    pub fn backend(&self) -> Backend {
        let Some(db) = self.database.as_ref() else {
            return Backend::Memory;
        };
        if let Some(url) = db.url.clone() {
            return Backend::Url(url);
        }
        Backend::Components {
            name: db.name.clone().unwrap_or_else(|| "shellyht".to_string()),
            host: db.host.clone().unwrap_or_else(|| "127.0.0.1".to_string()),
            port: db.port.unwrap_or(3306),
            user: db.user.clone().unwrap_or_else(|| "htcollector".to_string()),
            password: db.password.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_bind_is_1883() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.http_bind(), "0.0.0.0:1883");
        assert_eq!(cfg.backend(), Backend::Memory);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = AppConfig::from_file(dir.path().join("absent.toml")).unwrap();
        assert!(cfg.database.is_none());
    }

    #[test]
    fn reads_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[database]
name = "sensors"
host = "db.lan"
port = 3307

[http]
bind = "127.0.0.1:8080"
"#
        )
        .unwrap();

        let cfg = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(cfg.http_bind(), "127.0.0.1:8080");
        assert_eq!(
            cfg.backend(),
            Backend::Components {
                name: "sensors".into(),
                host: "db.lan".into(),
                port: 3307,
                user: "htcollector".into(),
                password: None,
            }
        );
    }

    #[test]
    fn rejects_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[database").unwrap();
        assert!(matches!(
            AppConfig::from_file(file.path()),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn env_credentials_select_database() {
        let mut cfg = AppConfig::default();
        cfg.apply_env(env(&[("DBUSER", "test-user"), ("DBPASSWORD", "test_secret")]))
            .unwrap();

        match cfg.backend() {
            Backend::Components { user, password, name, .. } => {
                assert_eq!(user, "test-user");
                assert_eq!(password.as_deref(), Some("test_secret"));
                assert_eq!(name, "shellyht");
            }
            other => panic!("unexpected backend {other:?}"),
        }
    }

    #[test]
    fn database_url_wins() {
        let mut cfg = AppConfig::default();
        cfg.apply_env(env(&[
            ("DATABASE_URL", "mysql://u:p@localhost/shellyht"),
            ("DBUSER", "ignored"),
        ]))
        .unwrap();
        assert_eq!(
            cfg.backend(),
            Backend::Url("mysql://u:p@localhost/shellyht".into())
        );
    }

    #[test]
    fn bad_port_is_rejected() {
        let mut cfg = AppConfig::default();
        let err = cfg.apply_env(env(&[("DBPORT", "db")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "DBPORT", .. }));
    }

    #[test]
    fn command_line_overrides_win() {
        let mut cfg = AppConfig::default();
        cfg.apply_env(env(&[("DBUSER", "sensor"), ("DBPORT", "3307")]))
            .unwrap();
        cfg.apply_overrides(&Overrides {
            database: Some("garden".into()),
            dbport: Some(3308),
            port: Some(8080),
            ..Default::default()
        });

        assert_eq!(cfg.http_bind(), "0.0.0.0:8080");
        assert_eq!(
            cfg.backend(),
            Backend::Components {
                name: "garden".into(),
                host: "127.0.0.1".into(),
                port: 3308,
                user: "sensor".into(),
                password: None,
            }
        );
    }

    #[test]
    fn bind_override_keeps_port() {
        let mut cfg = AppConfig {
            database: None,
            http: Some(HttpConfig {
                bind: Some("127.0.0.1:9000".into()),
            }),
        };
        cfg.apply_overrides(&Overrides {
            bind: Some("192.168.1.5".into()),
            ..Default::default()
        });
        assert_eq!(cfg.http_bind(), "192.168.1.5:9000");

        cfg.apply_overrides(&Overrides {
            bind: Some("".into()),
            ..Default::default()
        });
        assert_eq!(cfg.http_bind(), "0.0.0.0:9000");

        cfg.apply_overrides(&Overrides {
            bind: Some("::".into()),
            port: Some(1883),
            ..Default::default()
        });
        assert_eq!(cfg.http_bind(), "[::]:1883");
    }

    #[test]
    fn no_overrides_change_nothing() {
        let mut cfg = AppConfig::default();
        cfg.apply_overrides(&Overrides::default());
        assert_eq!(cfg.backend(), Backend::Memory);
        assert_eq!(cfg.http_bind(), DEFAULT_HTTP_BIND);
    }
}
