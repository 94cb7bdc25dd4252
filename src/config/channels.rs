//! Channel definition file.
//!
//! One channel per line, `channel <name> <port> <capacity>`, fields separated
//! by whitespace. Blank lines are skipped; anything else that does not
//! validate aborts startup.

use super::types::{ChannelRules, ConfigError};
use std::collections::HashSet;
use std::path::Path;

/// Smallest capacity a channel may be configured with.
pub const MIN_CAPACITY: usize = 5;

/// Highest port accepted while unprivileged ports are disallowed.
const MAX_PRIVILEGED_PORT: u16 = 1023;

/// One validated line of the channel file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelDefinition {
    pub name: String,
    pub port: u16,
    pub capacity: usize,
}

/// Read and validate the channel file at `path`.
pub fn load_channels<P: AsRef<Path>>(
    path: P,
    rules: &ChannelRules,
) -> Result<Vec<ChannelDefinition>, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_channels(&content, rules)
}

/// Parse channel definitions, enforcing unique names and ports.
pub fn parse_channels(
    content: &str,
    rules: &ChannelRules,
) -> Result<Vec<ChannelDefinition>, ConfigError> {
    let mut definitions = Vec::new();
    let mut names = HashSet::new();
    let mut ports = HashSet::new();

    for (index, raw) in content.lines().enumerate() {
        let line = index + 1;
        let fields: Vec<&str> = raw.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }

        let definition = parse_line(line, &fields, rules)?;
        if !names.insert(definition.name.clone()) {
            return Err(ConfigError::DuplicateName {
                line,
                name: definition.name,
            });
        }
        if !ports.insert(definition.port) {
            return Err(ConfigError::DuplicatePort {
                line,
                port: definition.port,
            });
        }
        definitions.push(definition);
    }

    if definitions.is_empty() {
        return Err(ConfigError::NoChannels);
    }
    Ok(definitions)
}

fn parse_line(
    line: usize,
    fields: &[&str],
    rules: &ChannelRules,
) -> Result<ChannelDefinition, ConfigError> {
    let &[keyword, name, port, capacity] = fields else {
        return Err(ConfigError::Malformed { line });
    };
    if !keyword.eq_ignore_ascii_case("channel") {
        return Err(ConfigError::Malformed { line });
    }

    if name.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(ConfigError::NameStartsWithDigit {
            line,
            name: name.to_string(),
        });
    }
    // `/mute` and `/kick` address users as `<channel>:<user>`.
    if name.contains(':') {
        return Err(ConfigError::InvalidName {
            line,
            name: name.to_string(),
        });
    }

    let port = port.parse::<u32>().map_err(|_| ConfigError::InvalidPort {
        line,
        value: port.to_string(),
    })?;
    let port = check_port(line, port, rules)?;

    let capacity = capacity
        .parse::<usize>()
        .ok()
        .filter(|c| *c >= MIN_CAPACITY)
        .ok_or_else(|| ConfigError::InvalidCapacity {
            line,
            value: capacity.to_string(),
        })?;

    Ok(ChannelDefinition {
        name: name.to_string(),
        port,
        capacity,
    })
}

fn check_port(line: usize, port: u32, rules: &ChannelRules) -> Result<u16, ConfigError> {
    let upper = if rules.allow_unprivileged_ports {
        u16::MAX
    } else {
        MAX_PRIVILEGED_PORT
    };
    match u16::try_from(port) {
        Ok(p) if p != 0 && p <= upper => Ok(p),
        Ok(p) if p > MAX_PRIVILEGED_PORT => Err(ConfigError::EphemeralPort { line, port: p }),
        _ => Err(ConfigError::PortOutOfRange { line, port }),
    }
}
