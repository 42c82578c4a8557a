use log::{debug, info};
use std::fmt::Debug;
use std::sync::RwLock;
use url::Url;

/// Where the console currently is and how to move it.
///
/// The session manager uses this to consume the one-time bootstrap
/// parameter and to reset the client to the application root on sign-out.
pub trait Navigator: Send + Sync + Debug {
    fn current_url(&self) -> Option<Url>;
    fn replace_url(&self, url: Url);
    fn redirect_to_root(&self);
}

/// Remove a query parameter from a URL, returning its first value and the stripped URL.
/// The value is `Some` whenever the parameter is present, even if empty.
/// Other parameters keep their order.
pub fn take_query_param(url: &Url, name: &str) -> (Option<String>, Url) {
    let mut value = None;
    let mut kept = Vec::new();

    for (key, val) in url.query_pairs() {
        if key == name {
            if value.is_none() {
                value = Some(val.into_owned());
            }
        } else {
            kept.push((key.into_owned(), val.into_owned()));
        }
    }

    let mut stripped = url.clone();
    if kept.is_empty() {
        stripped.set_query(None);
    } else {
        stripped.query_pairs_mut().clear().extend_pairs(kept.iter());
    }

    (value, stripped)
}

/// Root of the application the URL belongs to
pub fn root_of(url: &Url) -> Url {
    let mut root = url.clone();
    root.set_path("/");
    root.set_query(None);
    root.set_fragment(None);
    root
}

/// Navigator keeping the location in memory, used by the terminal front-end and tests
#[derive(Debug)]
pub struct InMemoryNavigator {
    location: RwLock<Option<Url>>,
    redirects: RwLock<u32>,
}

impl InMemoryNavigator {
    pub fn new(start: Option<Url>) -> Self {
        Self {
            location: RwLock::new(start),
            redirects: RwLock::new(0),
        }
    }

    /// How many times the client was sent back to the root
    pub fn redirect_count(&self) -> u32 {
        self.redirects.read().map(|r| *r).unwrap_or(0)
    }
}

impl Default for InMemoryNavigator {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Navigator for InMemoryNavigator {
    fn current_url(&self) -> Option<Url> {
        self.location.read().ok().and_then(|l| l.clone())
    }

    fn replace_url(&self, url: Url) {
        debug!("Replacing location with {}", url);
        if let Ok(mut location) = self.location.write() {
            *location = Some(url);
        }
    }

    fn redirect_to_root(&self) {
        if let Ok(mut location) = self.location.write() {
            if let Some(current) = location.as_ref() {
                let root = root_of(current);
                info!("Redirecting to application root {}", root);
                *location = Some(root);
            } else {
                info!("Redirecting to application root");
            }
        }
        if let Ok(mut redirects) = self.redirects.write() {
            *redirects += 1;
        }
    }
}
