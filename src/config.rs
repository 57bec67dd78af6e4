//! Конфигурация бота: администраторы, токен и реестр серверов Outline.

use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/outline-admin.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub admin_ids: HashSet<i64>,
    #[serde(default)]
    bot_token: Option<String>,
    pub servers: BTreeMap<String, ServerConfig>,
}

/// Параметры подключения к management API одного сервера.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    pub url: String,
    /// SHA-256 отпечаток самоподписанного сертификата, hex (двоеточия допустимы).
    pub cert_sha256: String,
    #[serde(default)]
    pub override_address: Option<String>,
    #[serde(default)]
    pub override_name: Option<String>,
}

/// Публичный адрес, подставляемый в ссылки вместо реального host:port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessOverride<'a> {
    pub address: &'a str,
    pub display_name: &'a str,
}

impl ServerConfig {
    pub fn access_override(&self) -> Option<AccessOverride<'_>> {
        match (self.override_address.as_deref(), self.override_name.as_deref()) {
            (Some(address), Some(display_name)) => Some(AccessOverride {
                address,
                display_name,
            }),
            _ => None,
        }
    }

    pub fn fingerprint(&self) -> Result<[u8; 32], anyhow::Error> {
        let normalized: String = self
            .cert_sha256
            .chars()
            .filter(|c| *c != ':' && !c.is_whitespace())
            .collect();
        let bytes = hex::decode(&normalized)
            .map_err(|e| anyhow::anyhow!("Некорректный cert_sha256: {}", e))?;
        <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| {
            anyhow::anyhow!(
                "cert_sha256 должен содержать 32 байта, получено {}",
                bytes.len()
            )
        })
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Не удалось прочитать {}: {}", path.display(), e))?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, anyhow::Error> {
        let config: Config =
            toml::from_str(raw).map_err(|e| anyhow::anyhow!("Ошибка разбора конфига: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), anyhow::Error> {
        if self.admin_ids.is_empty() {
            anyhow::bail!("В конфиге не задан ни один admin_ids");
        }
        if self.servers.is_empty() {
            anyhow::bail!("В конфиге не задан ни один сервер");
        }
        for (name, server) in &self.servers {
            server
                .fingerprint()
                .map_err(|e| anyhow::anyhow!("Сервер {}: {}", name, e))?;
            if server.override_address.is_some() != server.override_name.is_some() {
                anyhow::bail!(
                    "Сервер {}: override_address и override_name задаются только вместе",
                    name
                );
            }
        }
        Ok(())
    }

    /// Токен из `BOT_TOKEN` имеет приоритет над значением в файле.
    pub fn bot_token(&self) -> Result<String, anyhow::Error> {
        if let Ok(token) = std::env::var("BOT_TOKEN")
            && !token.trim().is_empty()
        {
            return Ok(token.trim().to_string());
        }
        self.bot_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Не задан bot_token (в конфиге или BOT_TOKEN)"))
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }

    pub fn server(&self, name: &str) -> Option<&ServerConfig> {
        self.servers.get(name)
    }

    pub fn server_names(&self) -> impl Iterator<Item = &str> {
        self.servers.keys().map(String::as_str)
    }
}
