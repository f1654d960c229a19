pub mod follows;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::error::Result;

pub use follows::TwitchFollows;

/// One follow record, most recent first when returned by a [`FollowSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Follower {
    pub name: String,
    pub followed_at: Option<DateTime<Utc>>,
}

/// Announcement produced when new followers show up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowEvent {
    /// Oldest first
    pub followers: Vec<String>,
}

impl FollowEvent {
    /// `alice`, `alice and bob`, `alice, bob and carol`
    pub fn display_names(&self) -> String {
        match self.followers.split_last() {
            None => String::new(),
            Some((last, [])) => last.clone(),
            Some((last, rest)) => format!("{} and {}", rest.join(", "), last),
        }
    }
}

/// Where follows come from.
#[async_trait]
pub trait FollowSource: Send {
    /// Most recent follows, newest first.
    async fn latest_follows(&mut self) -> Result<Vec<Follower>>;
}

#[derive(Debug, Default, Clone)]
pub struct FollowState {
    pub last_seen_follower: Option<String>,
}

/// Compares each poll against the last follower seen.
///
/// The first successful poll only records a baseline so a restart does not
/// re-announce whoever followed last.
pub struct FollowPoller<S> {
    source: S,
    state: FollowState,
    started_at: DateTime<Utc>,
}

impl<S: FollowSource> FollowPoller<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            state: FollowState::default(),
            started_at: Utc::now(),
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> &FollowState {
        &self.state
    }

    /// Poll once. On error the state is left untouched.
    pub async fn poll_once(&mut self) -> Result<Option<FollowEvent>> {
        let follows = self.source.latest_follows().await?;
        let Some(newest) = follows.first() else {
            return Ok(None);
        };

        let Some(last_seen) = self.state.last_seen_follower.replace(newest.name.clone()) else {
            debug!("Follow baseline set to '{}'", newest.name);
            return Ok(None);
        };
        if last_seen == newest.name {
            return Ok(None);
        }

        // Follows dated before startup are old news even if the page shifted.
        let mut followers: Vec<String> = follows
            .iter()
            .take_while(|f| f.name != last_seen)
            .filter(|f| f.followed_at.map_or(true, |at| at >= self.started_at))
            .map(|f| f.name.clone())
            .collect();
        if followers.is_empty() {
            return Ok(None);
        }
        followers.reverse();

        info!("New follower(s): {:?}", followers);
        Ok(Some(FollowEvent { followers }))
    }

    /// One scheduled run: poll, log failures, forward any event.
    pub async fn tick(&mut self, events: &UnboundedSender<FollowEvent>) {
        match self.poll_once().await {
            Ok(Some(event)) => {
                if events.send(event).is_err() {
                    debug!("Follow event dropped, bot loop has stopped");
                }
            }
            Ok(None) => {}
            Err(e) => warn!("Skipping follow poll: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BotError;
    use std::collections::VecDeque;

    /// Replays scripted poll results.
    struct Scripted(VecDeque<Result<Vec<Follower>>>);

    #[async_trait]
    impl FollowSource for Scripted {
        async fn latest_follows(&mut self) -> Result<Vec<Follower>> {
            self.0
                .pop_front()
                .unwrap_or_else(|| Err(BotError::Poll("script exhausted".into())))
        }
    }

    fn page(names: &[&str]) -> Result<Vec<Follower>> {
        Ok(names
            .iter()
            .map(|name| Follower {
                name: name.to_string(),
                followed_at: None,
            })
            .collect())
    }

    fn poller(script: Vec<Result<Vec<Follower>>>) -> FollowPoller<Scripted> {
        FollowPoller::new(Scripted(script.into()))
    }

    #[tokio::test]
    async fn test_first_poll_is_baseline_only() {
        let mut poller = poller(vec![page(&["alice"])]);
        assert_eq!(poller.poll_once().await.unwrap(), None);
        assert_eq!(poller.state().last_seen_follower.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_same_follower_twice_is_silent() {
        let mut poller = poller(vec![page(&["alice"]), page(&["alice"]), page(&["alice"])]);
        for _ in 0..3 {
            assert_eq!(poller.poll_once().await.unwrap(), None);
        }
    }

    #[tokio::test]
    async fn test_changed_follower_emits_one_event() {
        let mut poller = poller(vec![page(&["alice"]), page(&["bob"]), page(&["bob"])]);
        assert_eq!(poller.poll_once().await.unwrap(), None);
        assert_eq!(
            poller.poll_once().await.unwrap(),
            Some(FollowEvent {
                followers: vec!["bob".into()]
            })
        );
        assert_eq!(poller.poll_once().await.unwrap(), None);
        assert_eq!(poller.state().last_seen_follower.as_deref(), Some("bob"));
    }

    #[tokio::test]
    async fn test_error_leaves_state_unchanged() {
        let mut poller = poller(vec![
            page(&["alice"]),
            Err(BotError::Poll("HTTP 503".into())),
            page(&["bob"]),
        ]);
        poller.poll_once().await.unwrap();
        assert!(poller.poll_once().await.is_err());
        assert_eq!(poller.state().last_seen_follower.as_deref(), Some("alice"));

        let event = poller.poll_once().await.unwrap().unwrap();
        assert_eq!(event.followers, vec!["bob"]);
    }

    #[tokio::test]
    async fn test_empty_page_is_silent() {
        let mut poller = poller(vec![page(&[]), page(&["alice"])]);
        assert_eq!(poller.poll_once().await.unwrap(), None);
        assert_eq!(poller.state().last_seen_follower, None);
        assert_eq!(poller.poll_once().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_several_new_followers_in_one_event() {
        let mut poller = poller(vec![
            page(&["alice", "zed"]),
            page(&["dave", "carol", "bob", "alice"]),
        ]);
        poller.poll_once().await.unwrap();
        let event = poller.poll_once().await.unwrap().unwrap();
        assert_eq!(event.followers, vec!["bob", "carol", "dave"]);
        assert_eq!(event.display_names(), "bob, carol and dave");
    }

    #[tokio::test]
    async fn test_follows_before_startup_not_announced() {
        let long_ago = Utc::now() - chrono::Duration::days(30);
        let mut poller = poller(vec![
            page(&["alice"]),
            Ok(vec![Follower {
                name: "old-timer".into(),
                followed_at: Some(long_ago),
            }]),
        ]);
        poller.poll_once().await.unwrap();
        assert_eq!(poller.poll_once().await.unwrap(), None);
        assert_eq!(poller.state().last_seen_follower.as_deref(), Some("old-timer"));
    }

    #[tokio::test]
    async fn test_tick_forwards_events_and_swallows_errors() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut poller = poller(vec![
            page(&["alice"]),
            Err(BotError::Poll("connection reset".into())),
            page(&["bob"]),
        ]);
        for _ in 0..3 {
            poller.tick(&tx).await;
        }
        drop(tx);

        assert_eq!(rx.recv().await.unwrap().followers, vec!["bob"]);
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_display_names() {
        let event = |names: &[&str]| FollowEvent {
            followers: names.iter().map(|s| s.to_string()).collect(),
        };
        assert_eq!(event(&["alice"]).display_names(), "alice");
        assert_eq!(event(&["alice", "bob"]).display_names(), "alice and bob");
        assert_eq!(
            event(&["alice", "bob", "carol"]).display_names(),
            "alice, bob and carol"
        );
    }
}
