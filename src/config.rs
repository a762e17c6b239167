// config.rs - configuration
//
// mini-irc-server - simple IRC server
// Copyright (C) 2022  Mateusz Szpakowski
//
// This library is free software; you can redistribute it and/or
// modify it under the terms of the GNU Lesser General Public
// License as published by the Free Software Foundation; either
// version 2.1 of the License, or (at your option) any later version.
//
// This library is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public
// License along with this library; if not, write to the Free Software
// Foundation, Inc., 51 Franklin Street, Fifth Floor, Boston, MA  02110-1301  USA

use clap;
use clap::Parser;
use serde_derive::{Deserialize, Serialize};
use std::error::Error;
use std::fs::File;
use std::io::Read;
use std::net::IpAddr;
use toml;
use validator::{Validate, ValidationError};

#[derive(clap::Parser, Clone)]
#[clap(author, version, about, long_about = None)]
pub(crate) struct Cli {
    #[clap(short, long, help = "Configuration file path")]
    config: Option<String>,
    #[clap(short, long, help = "Listen bind address")]
    listen: Option<IpAddr>,
    #[clap(short, long, help = "Listen port")]
    port: Option<u16>,
    #[clap(short = 'n', long, help = "Server name")]
    name: Option<String>,
    #[clap(short = 'N', long, help = "Network")]
    network: Option<String>,
    #[clap(short = 'g', long, help = "Generate password hash and exit")]
    pub(crate) gen_password_hash: bool,
}

pub(crate) fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.len() != 0 && (username.as_bytes()[0] == b'#' || username.as_bytes()[0] == b'&') {
        Err(ValidationError::new("Username must not have channel prefix."))
    } else if !username.contains('.') && !username.contains(':') && !username.contains(',') {
        Ok(())
    } else {
        Err(ValidationError::new(
            "Username must not contains '.', ',' or ':'.",
        ))
    }
}

pub(crate) fn validate_nickname(nickname: &str) -> Result<(), ValidationError> {
    let first_ok = nickname.bytes().next().map_or(false, |c| {
        c.is_ascii_alphabetic() || b"[]\\`_^{|}".contains(&c)
    });
    if first_ok
        && nickname
            .bytes()
            .all(|c| c.is_ascii_alphanumeric() || b"[]\\`_^{|}-".contains(&c))
    {
        Ok(())
    } else {
        Err(ValidationError::new(
            "Nickname must begin with a letter and must contain only letters, \
                digits or []\\`_^{|}- characters.",
        ))
    }
}

pub(crate) fn validate_channel(channel: &str) -> Result<(), ValidationError> {
    if channel.len() != 0
        && !channel.contains(':')
        && !channel.contains(',')
        && (channel.as_bytes()[0] == b'#' || channel.as_bytes()[0] == b'&')
    {
        Ok(())
    } else {
        Err(ValidationError::new(
            "Channel name must have '#' or '&' at start and \
                must not contains ',' or ':'.",
        ))
    }
}

/// Main configuration structure.
#[derive(PartialEq, Eq, Serialize, Deserialize, Debug, Validate, Clone)]
pub(crate) struct MainConfig {
    #[validate(contains = ".")]
    pub(crate) name: String,
    pub(crate) listen: IpAddr,
    pub(crate) port: u16,
    pub(crate) network: String,
    // argon2 hash of the server password. None - no password required.
    pub(crate) password: Option<String>,
    pub(crate) max_connections: Option<usize>,
    pub(crate) max_joins: Option<usize>,
    #[validate(range(min = 1, max = 200))]
    pub(crate) max_nickname_len: usize,
    pub(crate) ping_timeout: u64,
    pub(crate) pong_timeout: u64,
}

impl MainConfig {
    pub(crate) fn new(cli: Cli) -> Result<MainConfig, Box<dyn Error>> {
        let config_path = cli.config.as_deref().unwrap_or("mini-irc-server.toml");
        let mut config_file = File::open(config_path)?;
        let mut config_str = String::new();
        config_file.read_to_string(&mut config_str)?;
        // modify configuration by CLI options
        {
            let mut config: MainConfig = toml::from_str(&config_str)?;
            if let Some(addr) = cli.listen {
                config.listen = addr;
            }
            if let Some(port) = cli.port {
                config.port = port;
            }
            if let Some(name) = cli.name {
                config.name = name;
            }
            if let Some(network) = cli.network {
                config.network = network;
            }
            if let Err(e) = config.validate() {
                Err(Box::new(e))
            } else {
                Ok(config)
            }
        }
    }
}

impl Default for MainConfig {
    fn default() -> Self {
        MainConfig {
            name: "irc.irc".to_string(),
            listen: "127.0.0.1".parse().unwrap(),
            port: 6667,
            network: "IRCnetwork".to_string(),
            password: None,
            max_connections: None,
            max_joins: None,
            max_nickname_len: 20,
            ping_timeout: 120,
            pong_timeout: 20,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use std::env::temp_dir;
    use std::fs;

    struct TempFileHandle {
        path: String,
    }

    impl TempFileHandle {
        fn new(path: &str) -> TempFileHandle {
            TempFileHandle {
                path: temp_dir().join(path).to_string_lossy().to_string(),
            }
        }
    }

    impl Drop for TempFileHandle {
        fn drop(&mut self) {
            fs::remove_file(self.path.as_str()).unwrap();
        }
    }

    #[test]
    fn test_mainconfig_new() {
        let file_handle = TempFileHandle::new("temp_config.toml");
        let cli = Cli {
            config: Some(file_handle.path.clone()),
            listen: None,
            port: None,
            name: None,
            network: None,
            gen_password_hash: false,
        };

        fs::write(
            file_handle.path.as_str(),
            r##"
name = "irci.localhost"
listen = "127.0.0.1"
port = 6667
network = "IRCInetwork"
max_connections = 4000
max_joins = 10
max_nickname_len = 20
ping_timeout = 100
pong_timeout = 30
"##,
        )
        .unwrap();
        let result = MainConfig::new(cli.clone()).map_err(|e| e.to_string());
        assert_eq!(
            Ok(MainConfig {
                name: "irci.localhost".to_string(),
                listen: "127.0.0.1".parse().unwrap(),
                port: 6667,
                network: "IRCInetwork".to_string(),
                password: None,
                max_connections: Some(4000),
                max_joins: Some(10),
                max_nickname_len: 20,
                ping_timeout: 100,
                pong_timeout: 30,
            }),
            result
        );

        // with CLI overrides
        let cli2 = Cli {
            config: Some(file_handle.path.clone()),
            listen: Some("192.168.1.4".parse().unwrap()),
            port: Some(6668),
            name: Some("ircer.localhost".to_string()),
            network: Some("SomeNetwork".to_string()),
            gen_password_hash: false,
        };
        let result = MainConfig::new(cli2).map_err(|e| e.to_string());
        assert_eq!(
            Ok(MainConfig {
                name: "ircer.localhost".to_string(),
                listen: "192.168.1.4".parse().unwrap(),
                port: 6668,
                network: "SomeNetwork".to_string(),
                password: None,
                max_connections: Some(4000),
                max_joins: Some(10),
                max_nickname_len: 20,
                ping_timeout: 100,
                pong_timeout: 30,
            }),
            result
        );

        // server name without dot fails validation
        fs::write(
            file_handle.path.as_str(),
            r##"
name = "ircserver"
listen = "127.0.0.1"
port = 6667
network = "IRCInetwork"
max_nickname_len = 20
ping_timeout = 100
pong_timeout = 30
"##,
        )
        .unwrap();
        assert!(MainConfig::new(cli).is_err());
    }

    #[test]
    fn test_validate_username() {
        assert_eq!(true, validate_username("ala").is_ok());
        assert_eq!(false, validate_username("#ala").is_ok());
        assert_eq!(false, validate_username("&ala").is_ok());
        assert_eq!(false, validate_username("a.la").is_ok());
        assert_eq!(false, validate_username("a,la").is_ok());
        assert_eq!(false, validate_username("aL:a").is_ok());
    }

    #[test]
    fn test_validate_nickname() {
        assert_eq!(true, validate_nickname("ala").is_ok());
        assert_eq!(true, validate_nickname("ala77").is_ok());
        assert_eq!(true, validate_nickname("[bracket]").is_ok());
        assert_eq!(true, validate_nickname("mood-y").is_ok());
        assert_eq!(false, validate_nickname("7ala").is_ok());
        assert_eq!(false, validate_nickname("#ala").is_ok());
        assert_eq!(false, validate_nickname("al a").is_ok());
        assert_eq!(false, validate_nickname("al,a").is_ok());
        assert_eq!(false, validate_nickname("al:a").is_ok());
        assert_eq!(false, validate_nickname("").is_ok());
    }

    #[test]
    fn test_validate_channel() {
        assert_eq!(true, validate_channel("#ala").is_ok());
        assert_eq!(true, validate_channel("&ala").is_ok());
        assert_eq!(false, validate_channel("&al:a").is_ok());
        assert_eq!(false, validate_channel("&al,a").is_ok());
        assert_eq!(false, validate_channel("#al:a").is_ok());
        assert_eq!(false, validate_channel("#al,a").is_ok());
        assert_eq!(false, validate_channel("ala").is_ok());
    }
}
