//! Page titles fetched over HTTP.

use notefmt_core::{TitleError, TitleLookup, extract_title};
use std::time::Duration;

const USER_AGENT: &str = concat!("notefmt/", env!("CARGO_PKG_VERSION"));

pub struct HttpTitles {
    client: reqwest::blocking::Client,
}

impl HttpTitles {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

impl TitleLookup for HttpTitles {
    fn title(&self, url: &str) -> Result<String, TitleError> {
        tracing::debug!(url, "fetching page title");
        let response = self.client.get(url).send().map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(TitleError::Status(status.as_u16()));
        }
        let page = response.text().map_err(transport_error)?;
        extract_title(&page).ok_or(TitleError::NoTitle)
    }
}

fn transport_error(err: reqwest::Error) -> TitleError {
    if err.is_timeout() {
        TitleError::Timeout
    } else {
        TitleError::Transport(err.to_string())
    }
}
