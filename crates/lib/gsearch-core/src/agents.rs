//! User-agent rotation for upstream requests.

use std::sync::Arc;

use rand::Rng;

const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:124.0) Gecko/20100101 Firefox/124.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Lynx/2.9.0dev.12 libwww-FM/2.14 SSL-MM/1.4.1 GNUTLS/3.7.8",
    "Lynx/2.8.9rel.1 libwww-FM/2.14 SSL-MM/1.4.1 OpenSSL/1.1.1d",
    "Links (2.29; Linux 6.1.0-18-amd64 x86_64; GNU C 12.2; text)",
];

/// A pool of user-agent strings; each pick differs from the previous one when possible.
#[derive(Debug, Clone)]
pub struct UserAgentPool {
    agents: Arc<[String]>,
}

impl UserAgentPool {
    /// Builds a pool from the given strings, falling back to the built-in list when empty.
    #[must_use]
    pub fn new<I, S>(agents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let agents: Vec<String> = agents
            .into_iter()
            .map(Into::into)
            .filter(|agent: &String| !agent.trim().is_empty())
            .collect();
        if agents.is_empty() {
            return Self::default();
        }
        Self {
            agents: agents.into(),
        }
    }

    /// Picks a random agent other than `previous`.
    #[must_use]
    pub fn pick_after(&self, previous: Option<&str>) -> String {
        let mut rng = rand::thread_rng();
        let candidates: Vec<&String> = self
            .agents
            .iter()
            .filter(|agent| Some(agent.as_str()) != previous)
            .collect();
        if candidates.is_empty() {
            return self.agents[0].clone();
        }
        candidates[rng.gen_range(0..candidates.len())].clone()
    }
}

impl Default for UserAgentPool {
    fn default() -> Self {
        Self {
            agents: DEFAULT_USER_AGENTS
                .iter()
                .map(|agent| (*agent).to_string())
                .collect(),
        }
    }
}
