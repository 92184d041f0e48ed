use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    address_map::AddressMap,
    bridge::parse_bridge_line,
    error::ConfigError,
    family::fix_my_family,
    resolve::SelfAddressConfig,
    transport::{options_from_transport_options_line, parse_transport_line, NoopRegistry, TransportRole},
};

/// One `Keyword value` line of a torrc-style file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLine {
    pub line: usize,
    pub keyword: String,
    pub value: String,
}

pub fn parse_lines(text: &str) -> Result<Vec<ConfigLine>, ConfigError> {
    let mut lines = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let content = raw.split_once('#').map_or(raw, |(before, _)| before);
        let trimmed = content.trim();
        if trimmed.is_empty() {
            continue;
        }

        let (keyword, value) = match trimmed.split_once(char::is_whitespace) {
            Some((k, v)) => (k, v.trim()),
            None => (trimmed, ""),
        };

        if value.is_empty() {
            return Err(ConfigError::MissingValue {
                line: idx + 1,
                keyword: keyword.to_string(),
            });
        }

        lines.push(ConfigLine {
            line: idx + 1,
            keyword: keyword.to_string(),
            value: value.to_string(),
        });
    }

    Ok(lines)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    pub address: Option<String>,
    pub authoritative_directory: bool,
    pub map_address: Vec<String>,
    pub bridges: Vec<String>,
    pub client_transport_plugins: Vec<String>,
    pub server_transport_plugins: Vec<String>,
    pub client_transport_options: Vec<String>,
    pub server_transport_options: Vec<String>,
    pub my_family: Option<String>,
    pub sandbox: bool,
}

impl Options {
    pub fn from_lines(lines: &[ConfigLine]) -> Result<Self, ConfigError> {
        let mut opts = Options::default();

        for l in lines {
            let value = l.value.clone();
            match l.keyword.to_ascii_lowercase().as_str() {
                "address" => opts.address = Some(value),
                "authoritativedirectory" => {
                    opts.authoritative_directory = parse_bool(&l.keyword, &value)?
                }
                "mapaddress" => opts.map_address.push(value),
                "bridge" => opts.bridges.push(value),
                "clienttransportplugin" => opts.client_transport_plugins.push(value),
                "servertransportplugin" => opts.server_transport_plugins.push(value),
                "clienttransportoptions" => opts.client_transport_options.push(value),
                "servertransportoptions" => opts.server_transport_options.push(value),
                "myfamily" => opts.my_family = Some(value),
                "sandbox" => opts.sandbox = parse_bool(&l.keyword, &value)?,
                _ => log::debug!("line {}: ignoring unknown option '{}'", l.line, l.keyword),
            }
        }

        Ok(opts)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Self::from_lines(&parse_lines(text)?)
    }

    /// Reads `path` as JSON if it ends in `.json`, as directive lines otherwise.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading configuration {}", path.display()))?;

        let opts = if path.extension().is_some_and(|e| e == "json") {
            serde_json::from_str(&text)
                .with_context(|| format!("parsing JSON configuration {}", path.display()))?
        } else {
            Self::parse(&text).with_context(|| format!("parsing {}", path.display()))?
        };

        Ok(opts)
    }

    /// Normalizes `MyFamily` and checks every bridge and transport line
    /// without launching anything.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if let Some(family) = &self.my_family {
            self.my_family = Some(fix_my_family(family)?);
        }

        for line in &self.bridges {
            parse_bridge_line(line).map_err(|source| ConfigError::Bridge {
                line: line.clone(),
                source,
            })?;
        }

        let plugins = self
            .client_transport_plugins
            .iter()
            .map(|l| (l, TransportRole::Client))
            .chain(
                self.server_transport_plugins
                    .iter()
                    .map(|l| (l, TransportRole::Server)),
            );
        for (line, role) in plugins {
            parse_transport_line(line, role, true, self.sandbox, &mut NoopRegistry).map_err(
                |source| ConfigError::Transport {
                    line: line.clone(),
                    source,
                },
            )?;
        }

        for line in self
            .client_transport_options
            .iter()
            .chain(&self.server_transport_options)
        {
            options_from_transport_options_line(line, None).map_err(|source| {
                ConfigError::Transport {
                    line: line.clone(),
                    source,
                }
            })?;
        }

        Ok(())
    }

    pub fn self_address_config(&self) -> SelfAddressConfig {
        SelfAddressConfig {
            address: self.address.clone(),
            authority: self.authoritative_directory,
        }
    }

    pub fn address_map(&self) -> AddressMap {
        let mut map = AddressMap::new();
        map.load(&self.map_address);
        map
    }
}

fn parse_bool(keyword: &str, value: &str) -> Result<bool, ConfigError> {
    match value {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(ConfigError::InvalidBool {
            keyword: keyword.to_string(),
            value: value.to_string(),
        }),
    }
}
