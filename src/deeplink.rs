/// Inbound deep links selecting a tab (`...?tab=habit|todo`)

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    Habit,
    Todo,
}

impl Tab {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tab::Habit => "habit",
            Tab::Todo => "todo",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "habit" => Some(Tab::Habit),
            "todo" => Some(Tab::Todo),
            _ => None,
        }
    }

    /// Tab requested by a URI, if any
    ///
    /// Accepts absolute URIs (`habittracker://open?tab=todo`) as well as
    /// bare paths and query strings (`/?tab=habit`, `?tab=todo`).
    pub fn from_uri(uri: &str) -> Option<Self> {
        let url = match Url::parse(uri) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = Url::parse("app://local/").ok()?;
                base.join(uri).ok()?
            }
            Err(err) => {
                tracing::debug!("Ignoring unparseable deep link {:?}: {}", uri, err);
                return None;
            }
        };

        url.query_pairs()
            .find(|(key, _)| key == "tab")
            .and_then(|(_, value)| Tab::parse(&value))
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
