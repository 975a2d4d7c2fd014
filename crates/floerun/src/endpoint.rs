//! # Endpoints
//!
//! A concrete address a direct reference can be reached at.
//!
//! ## String Form
//! `tcp|ssl|udp [-h host] [-p port] [-t timeout-ms] [-z]`
//!
//! A missing `-h` falls back to the factory's default host. `-t -1` means no
//! timeout. Printing always emits `-h` and `-p`, so a printed endpoint parses
//! back to an equal value under any default host.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use crate::error::Error;
use crate::error::Result;
use crate::syntax::Scanner;
use crate::syntax::quote_if_needed;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Protocol {
    Tcp,
    Ssl,
    Udp,
}

impl Protocol {
    pub fn name(self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Ssl => "ssl",
            Protocol::Udp => "udp",
        }
    }

    pub fn is_secure(self) -> bool {
        self == Protocol::Ssl
    }

    pub fn is_datagram(self) -> bool {
        self == Protocol::Udp
    }
}

impl FromStr for Protocol {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        match s {
            "tcp" => Ok(Protocol::Tcp),
            "ssl" => Ok(Protocol::Ssl),
            "udp" => Ok(Protocol::Udp),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub protocol: Protocol,
    pub host: String,
    pub port: u16,
    /// Milliseconds. `None` waits forever.
    pub timeout: Option<u32>,
    pub compress: bool,
}

impl Endpoint {
    pub fn new(protocol: Protocol, host: impl Into<String>, port: u16) -> Self {
        Self {
            protocol,
            host: host.into(),
            port,
            timeout: None,
            compress: false,
        }
    }

    pub fn is_secure(&self) -> bool {
        self.protocol.is_secure()
    }

    pub fn is_datagram(&self) -> bool {
        self.protocol.is_datagram()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -h {} -p {}",
            self.protocol.name(),
            quote_if_needed(&self.host),
            self.port
        )?;
        if let Some(ms) = self.timeout {
            write!(f, " -t {}", ms)?;
        }
        if self.compress {
            write!(f, " -z")?;
        }
        Ok(())
    }
}

/// Parses endpoint strings. Torn down with the communicator.
#[derive(Debug)]
pub struct EndpointFactory {
    default_host: String,
    destroyed: AtomicBool,
}

impl EndpointFactory {
    pub fn new(default_host: impl Into<String>) -> Self {
        Self {
            default_host: default_host.into(),
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn default_host(&self) -> &str {
        &self.default_host
    }

    pub fn create(&self, input: &str) -> Result<Endpoint> {
        if self.destroyed.load(Ordering::Acquire) {
            return Err(Error::CommunicatorDestroyed);
        }

        let mut scanner = Scanner::new(input.trim());
        let name = scanner
            .token(&[])
            .map_err(|reason| Error::endpoint_parse(input, reason))?;
        let protocol: Protocol = name
            .parse()
            .map_err(|_| Error::endpoint_parse(input, format!("unknown protocol `{}`", name)))?;

        let mut endpoint = Endpoint::new(protocol, self.default_host.clone(), 0);
        loop {
            scanner.skip_whitespace();
            if scanner.at_end() {
                break;
            }
            let option = scanner
                .token(&[])
                .map_err(|reason| Error::endpoint_parse(input, reason))?;
            match option {
                "-h" => endpoint.host = argument(&mut scanner, input, option)?.to_owned(),
                "-p" => {
                    let value = argument(&mut scanner, input, option)?;
                    endpoint.port = value.parse().map_err(|_| {
                        Error::endpoint_parse(input, format!("invalid port `{}`", value))
                    })?;
                }
                "-t" => {
                    let value = argument(&mut scanner, input, option)?;
                    endpoint.timeout = match value.parse::<i64>() {
                        Ok(-1) => None,
                        Ok(ms) if (0..=u32::MAX as i64).contains(&ms) => Some(ms as u32),
                        _ => {
                            return Err(Error::endpoint_parse(
                                input,
                                format!("invalid timeout `{}`", value),
                            ));
                        }
                    };
                }
                "-z" => endpoint.compress = true,
                other => {
                    return Err(Error::endpoint_parse(input, format!("unknown option `{}`", other)));
                }
            }
        }
        Ok(endpoint)
    }

    pub fn destroy(&self) {
        self.destroyed.store(true, Ordering::Release);
    }
}

fn argument<'a>(scanner: &mut Scanner<'a>, input: &str, option: &str) -> Result<&'a str> {
    scanner.skip_whitespace();
    let value = scanner
        .token(&[])
        .map_err(|reason| Error::endpoint_parse(input, reason))?;
    if value.is_empty() {
        return Err(Error::endpoint_parse(input, format!("no argument for `{}`", option)));
    }
    Ok(value)
}
