use robotstxt::DefaultMatcher;
use url::Url;

/// robots.txt rules resolved for one product token
#[derive(Debug, Clone)]
pub struct RobotsRules {
    /// Raw file body; empty means everything is allowed
    body: String,
    agent: String,
    crawl_delay: Option<f64>,
}

/// One `User-agent` group with the crawl delay it declares
struct Group {
    agents: Vec<String>,
    crawl_delay: Option<f64>,
}

impl RobotsRules {
    /// Parses a robots.txt body for the given agent
    pub fn parse(body: &str, agent: &str) -> Self {
        Self {
            body: body.to_string(),
            agent: agent.to_string(),
            crawl_delay: crawl_delay_for(body, agent),
        }
    }

    /// Rules that allow every path; used when robots.txt is missing or
    /// cannot be fetched
    pub fn permissive(agent: &str) -> Self {
        Self {
            body: String::new(),
            agent: agent.to_string(),
            crawl_delay: None,
        }
    }

    pub fn allows(&self, url: &Url) -> bool {
        if self.body.trim().is_empty() {
            return true;
        }
        DefaultMatcher::default().one_agent_allowed_by_robots(&self.body, &self.agent, url.as_str())
    }

    /// `Crawl-delay` in seconds for this agent, if declared
    pub fn crawl_delay(&self) -> Option<f64> {
        self.crawl_delay
    }
}

/// Picks the crawl delay of the most specific group matching `agent`
///
/// A group naming the agent (case-insensitive substring of the agent's
/// product token) beats the `*` group.
fn crawl_delay_for(body: &str, agent: &str) -> Option<f64> {
    let agent = agent.to_lowercase();
    let groups = parse_groups(body);

    let specific = groups
        .iter()
        .filter(|g| g.agents.iter().any(|a| a != "*" && agent.contains(a.as_str())))
        .find_map(|g| g.crawl_delay);

    specific.or_else(|| {
        groups
            .iter()
            .filter(|g| g.agents.iter().any(|a| a == "*"))
            .find_map(|g| g.crawl_delay)
    })
}

fn parse_groups(body: &str) -> Vec<Group> {
    let mut groups: Vec<Group> = Vec::new();
    // Consecutive User-agent lines share one group
    let mut collecting_agents = false;

    for line in body.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();

        match key.trim().to_lowercase().as_str() {
            "user-agent" => {
                if !collecting_agents {
                    groups.push(Group {
                        agents: Vec::new(),
                        crawl_delay: None,
                    });
                    collecting_agents = true;
                }
                if let Some(group) = groups.last_mut() {
                    group.agents.push(value.to_lowercase());
                }
            }
            "crawl-delay" => {
                collecting_agents = false;
                if let (Some(group), Ok(delay)) = (groups.last_mut(), value.parse::<f64>()) {
                    if delay.is_finite() && delay >= 0.0 {
                        group.crawl_delay = Some(delay);
                    }
                }
            }
            _ => collecting_agents = false,
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(path: &str) -> Url {
        Url::parse(&format!("https://www.example.com{}", path)).unwrap()
    }

    #[test]
    fn test_permissive() {
        let rules = RobotsRules::permissive("sampletrace");
        assert!(rules.allows(&url("/anything/")));
        assert_eq!(rules.crawl_delay(), None);
    }

    #[test]
    fn test_disallow_prefix() {
        let rules = RobotsRules::parse("User-agent: *\nDisallow: /ajax/", "sampletrace");
        assert!(rules.allows(&url("/Artist/Track/")));
        assert!(!rules.allows(&url("/ajax/comments/")));
    }

    #[test]
    fn test_agent_specific_group() {
        let body = "User-agent: sampletrace\nDisallow: /\n\nUser-agent: *\nAllow: /";
        assert!(!RobotsRules::parse(body, "sampletrace").allows(&url("/A/B/")));
        assert!(RobotsRules::parse(body, "otherbot").allows(&url("/A/B/")));
    }

    #[test]
    fn test_garbage_allows_all() {
        let rules = RobotsRules::parse("<html>not robots</html>", "sampletrace");
        assert!(rules.allows(&url("/A/B/")));
    }

    #[test]
    fn test_crawl_delay_prefers_specific_group() {
        let body = "User-agent: *\nCrawl-delay: 10\n\nUser-agent: sampletrace\nCrawl-delay: 3";
        assert_eq!(RobotsRules::parse(body, "sampletrace").crawl_delay(), Some(3.0));
        assert_eq!(RobotsRules::parse(body, "otherbot").crawl_delay(), Some(10.0));
    }

    #[test]
    fn test_crawl_delay_shared_group() {
        let body = "User-agent: a-bot\nUser-agent: b-bot\nCrawl-delay: 1.5\nDisallow: /x";
        assert_eq!(RobotsRules::parse(body, "b-bot").crawl_delay(), Some(1.5));
        assert_eq!(RobotsRules::parse(body, "c-bot").crawl_delay(), None);
    }

    #[test]
    fn test_crawl_delay_ignores_comments_and_junk() {
        let body = "User-agent: * # everyone\nCrawl-delay: soon\nCrawl-delay: 4 # seconds";
        assert_eq!(RobotsRules::parse(body, "sampletrace").crawl_delay(), Some(4.0));
    }
}
