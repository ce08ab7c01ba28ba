//! Client for connecting to the knowledge tree daemon.

use crate::config::Config;
use crate::protocol::{Request, Response};
use crate::tools::ToolCall;
use eyre::{Context, Result, bail};
use serde_json::Value;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::time::Duration;

/// Client for communicating with the daemon.
pub struct Client {
    stream: UnixStream,
}

impl Client {
    /// Connect to a running daemon.
    pub fn connect(config: &Config) -> Result<Self> {
        let stream = UnixStream::connect(config.socket_path())
            .map_err(|e| eyre::eyre!("Failed to connect to daemon: {}. Is it running?", e))?;

        stream
            .set_read_timeout(Some(Duration::from_secs(30)))
            .context("Failed to set read timeout")?;

        Ok(Self { stream })
    }

    /// Send a request and receive a response.
    fn request(&mut self, request: Request) -> Result<Response> {
        let request_json = serde_json::to_string(&request)?;
        writeln!(self.stream, "{}", request_json)?;
        self.stream.flush()?;

        let mut reader = BufReader::new(&self.stream);
        let mut response_line = String::new();
        reader.read_line(&mut response_line)?;

        let response: Response = serde_json::from_str(&response_line).context("Malformed daemon response")?;
        Ok(response)
    }

    /// Run a tool in the daemon and return its result envelope.
    pub fn call(&mut self, call: ToolCall) -> Result<Value> {
        let response = self.request(Request::Call { call })?;

        match response {
            Response::Result { value } => Ok(value),
            Response::Error { message } => bail!("{}", message),
            _ => bail!("Unexpected response"),
        }
    }

    /// Shutdown the daemon.
    pub fn shutdown(&mut self) -> Result<()> {
        let response = self.request(Request::Shutdown)?;

        match response {
            Response::Ok => Ok(()),
            Response::Error { message } => bail!("{}", message),
            _ => bail!("Unexpected response"),
        }
    }

    /// Ping the daemon.
    pub fn ping(&mut self) -> Result<()> {
        let response = self.request(Request::Ping)?;

        match response {
            Response::Pong => Ok(()),
            Response::Error { message } => bail!("{}", message),
            _ => bail!("Unexpected response"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_connect_without_daemon_fails() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::new(temp_dir.path());
        crate::store::Store::init(&config).unwrap();

        let err = Client::connect(&config).err().unwrap();
        assert!(err.to_string().contains("Is it running?"));
    }
}
