//! Upstream transport stream fetch.

use crate::error::Result;

use std::io::{BufReader, Read};
use std::time::Duration;

/// Read buffer in front of the upstream socket. Live TS sources burst, and
/// the segmenter reads 188 bytes at a time.
pub const READ_BUFFER_SIZE: usize = 4 * 1024 * 1024;

/// A connected upstream byte stream. Dropping it closes the connection.
pub struct HttpSource {
    body: BufReader<reqwest::blocking::Response>,
}

impl HttpSource {
    /// Issue the GET and wrap the response body. No request timeout: the
    /// stream is expected to run until the session is torn down.
    pub fn connect(url: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Option::<Duration>::None)
            .build()?;
        let response = client.get(url).send()?.error_for_status()?;

        Ok(Self {
            body: BufReader::with_capacity(READ_BUFFER_SIZE, response),
        })
    }
}

impl Read for HttpSource {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.body.read(buf)
    }
}
