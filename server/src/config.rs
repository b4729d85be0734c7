//! Configuration loading for the daemon.
//!
//! The config file is an INI-like block format: `[Name]` opens a nested
//! section closed by a bare `END`, sections contain `key = value` entries
//! (values may be single or double quoted), and `#` starts a comment that
//! runs to the end of the line.  The parser is a small recursive descent
//! over the lines producing a tree of key/value maps; typed server settings
//! are then extracted from the `Config -> Servers` subtree.
//!
//! A missing config file is replaced with a built-in default document
//! (written back to disk so the operator has something to edit); an
//! unreadable file logs the error and falls back to the same defaults.

use log::{error, warn};
use std::collections::HashMap;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "minnow.conf";

pub const DEFAULT_CONFIG: &str = "\
# Default config
[Config]
  [Servers]
    [Web]
      Id = Web
      RootDir = www # Also accepts: RootDir = \"www\"
      Index = index.htm

      # Any > IpAddress
      IpV6 = false
      IpAddr = Any
      Port = 8080
      IpAddr6 = Any
      Port6 = 8080
    END

    [Rtmp]
      Id = Rtmp
      IpAddr = Any
      Port = 1935
    END
  END
END
";

const DEFAULT_WEB_PORT: u16 = 8080;
const DEFAULT_RTMP_PORT: u16 = 1935;

/// One node of the parsed config tree: the key/value entries of a section
/// plus its nested sections.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ConfigNode {
    values: HashMap<String, String>,
    children: HashMap<String, ConfigNode>,
}

impl ConfigNode {
    pub fn value(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn child(&self, name: &str) -> Option<&ConfigNode> {
        self.children.get(name)
    }

    pub fn children(&self) -> impl Iterator<Item = (&String, &ConfigNode)> {
        self.children.iter()
    }
}

/// Startup parameters for one HTTP static file server.
#[derive(Debug, Clone, PartialEq)]
pub struct WebServerSettings {
    pub id: String,
    pub root_dir: String,
    pub index: String,
    pub bind_address: IpAddr,
    pub port: u16,
}

/// Startup parameters for one RTMP server.
#[derive(Debug, Clone, PartialEq)]
pub struct RtmpServerSettings {
    pub id: String,
    pub bind_address: IpAddr,
    pub port: u16,
}

/// The loaded configuration: the raw document (the operator shell prints
/// it back verbatim) and the parsed tree.
pub struct Config {
    pub text: String,
    pub root: ConfigNode,
}

impl Config {
    pub fn from_text(text: String) -> Config {
        let root = parse(&text);
        Config { text, root }
    }

    /// Loads the config from `path`, writing the default document there
    /// first when the file does not exist.  Falls back to the defaults on
    /// any read failure.
    pub fn load_or_create(path: &str) -> Config {
        if !Path::new(path).exists() {
            warn!("Config {} not found, using defaults", path);
            if let Err(err) = fs::write(path, DEFAULT_CONFIG) {
                error!("Could not write default config to {}: {}", path, err);
            }
            return Config::from_text(DEFAULT_CONFIG.to_string());
        }

        match fs::read_to_string(path) {
            Ok(text) => Config::from_text(text),
            Err(err) => {
                error!("Could not read config {}: {}; using defaults", path, err);
                Config::from_text(DEFAULT_CONFIG.to_string())
            }
        }
    }

    pub fn web_servers(&self) -> Vec<WebServerSettings> {
        self.server_nodes("Web")
            .into_iter()
            .filter_map(|(name, node)| {
                let (bind_address, port) = parse_bind(node, &name, DEFAULT_WEB_PORT)?;
                Some(WebServerSettings {
                    id: node.value("Id").unwrap_or(&name).to_string(),
                    root_dir: node.value("RootDir").unwrap_or("www").to_string(),
                    index: node.value("Index").unwrap_or("index.htm").to_string(),
                    bind_address,
                    port,
                })
            })
            .collect()
    }

    pub fn rtmp_servers(&self) -> Vec<RtmpServerSettings> {
        self.server_nodes("Rtmp")
            .into_iter()
            .filter_map(|(name, node)| {
                let (bind_address, port) = parse_bind(node, &name, DEFAULT_RTMP_PORT)?;
                Some(RtmpServerSettings {
                    id: node.value("Id").unwrap_or(&name).to_string(),
                    bind_address,
                    port,
                })
            })
            .collect()
    }

    /// Collects every `Config -> Servers` child whose section name starts
    /// with the given prefix, sorted by name for deterministic startup
    /// order.
    fn server_nodes(&self, prefix: &str) -> Vec<(String, &ConfigNode)> {
        let mut nodes: Vec<(String, &ConfigNode)> = self
            .root
            .child("Config")
            .and_then(|config| config.child("Servers"))
            .map(|servers| {
                servers
                    .children()
                    .filter(|(name, _)| name.starts_with(prefix))
                    .map(|(name, node)| (name.clone(), node))
                    .collect()
            })
            .unwrap_or_default();

        nodes.sort_by(|a, b| a.0.cmp(&b.0));
        nodes
    }
}

/// Parses a whole config document into its root node.
pub fn parse(text: &str) -> ConfigNode {
    let mut lines = text.lines();
    parse_node(&mut lines)
}

fn parse_node<'a, I>(lines: &mut I) -> ConfigNode
where
    I: Iterator<Item = &'a str>,
{
    let mut node = ConfigNode::default();

    while let Some(raw_line) = lines.next() {
        let line = strip_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        if line == "END" {
            break;
        }

        if line.starts_with('[') && line.ends_with(']') {
            let name = line[1..line.len() - 1].trim().to_string();
            let child = parse_node(lines);
            node.children.insert(name, child);
        } else if let Some((key, value)) = line.split_once('=') {
            node.values
                .insert(key.trim().to_string(), unquote(value.trim()).to_string());
        }
        // Anything else is not a recognizable entry and is skipped
    }

    node
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(index) => &line[..index],
        None => line,
    }
}

fn unquote(value: &str) -> &str {
    let quoted = (value.starts_with('\'') && value.ends_with('\'') && value.len() >= 2)
        || (value.starts_with('"') && value.ends_with('"') && value.len() >= 2);

    if quoted {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

fn parse_bind(node: &ConfigNode, name: &str, default_port: u16) -> Option<(IpAddr, u16)> {
    let prefer_v6 = node.value("IpV6") == Some("true");
    let (address_key, port_key) = if prefer_v6 {
        ("IpAddr6", "Port6")
    } else {
        ("IpAddr", "Port")
    };

    let address = match node.value(address_key).unwrap_or("Any") {
        "Any" if prefer_v6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        "Any" => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        literal => match literal.parse() {
            Ok(address) => address,
            Err(_) => {
                error!("Server {}: invalid {} value '{}'", name, address_key, literal);
                return None;
            }
        },
    };

    let port = match node.value(port_key) {
        None => default_port,
        Some(text) => match text.parse() {
            Ok(port) => port,
            Err(_) => {
                error!("Server {}: invalid {} value '{}'", name, port_key, text);
                return None;
            }
        },
    };

    Some((address, port))
}
