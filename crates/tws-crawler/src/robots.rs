use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use texting_robots::Robot;
use tokio::sync::OnceCell;
use url::Url;

use crate::config::secs;
use crate::transport::{Request, Transport};

type Slot = Arc<OnceCell<Option<Arc<Robot>>>>;

/// Robots rules per origin (`scheme://host[:port]`), fetched at most once per
/// origin. A missing, unreachable or malformed robots.txt is remembered as
/// `None`: no restriction and no crawl-delay.
pub struct RobotsCache {
    user_agent: String,
    origins: Mutex<HashMap<String, Slot>>,
}

impl RobotsCache {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            origins: Mutex::new(HashMap::new()),
        }
    }

    pub async fn rules(&self, transport: &dyn Transport, url: &Url) -> Option<Arc<Robot>> {
        let origin = url.origin().ascii_serialization();
        let slot = {
            let mut origins = self.origins.lock().unwrap_or_else(|e| e.into_inner());
            origins.entry(origin.clone()).or_default().clone()
        };
        slot.get_or_init(|| self.download(transport, origin))
            .await
            .clone()
    }

    async fn download(&self, transport: &dyn Transport, origin: String) -> Option<Arc<Robot>> {
        let robots_url = format!("{origin}/robots.txt");
        let resp = match transport.get(Request::get(&robots_url)).await {
            Ok(resp) => resp,
            Err(e) => {
                log::debug!("No robots.txt for {origin}: {e}");
                return None;
            }
        };
        if resp.status != 200 {
            log::debug!("No robots.txt for {origin}: status {}", resp.status);
            return None;
        }
        match Robot::new(&self.user_agent, &resp.body) {
            Ok(robot) => Some(Arc::new(robot)),
            Err(e) => {
                log::debug!("Ignoring malformed {robots_url}: {e}");
                None
            }
        }
    }

    pub async fn crawl_delay(&self, transport: &dyn Transport, url: &Url) -> Duration {
        self.rules(transport, url)
            .await
            .and_then(|robot| robot.delay)
            .map(secs)
            .unwrap_or_default()
    }

    pub async fn allowed(&self, transport: &dyn Transport, url: &Url) -> bool {
        match self.rules(transport, url).await {
            Some(robot) => robot.allowed(url.as_str()),
            None => true,
        }
    }

    pub async fn sitemaps(&self, transport: &dyn Transport, url: &Url) -> Vec<String> {
        self.rules(transport, url)
            .await
            .map(|robot| robot.sitemaps.clone())
            .unwrap_or_default()
    }
}
