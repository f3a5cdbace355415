//! Locator Resolver
//!
//! Finds the live element behind a step target. Candidates are tried in
//! order on every attempt; the first one matching exactly one element wins.
//! Attempts are spaced by an exponential backoff capped at `max_backoff`,
//! and the whole search gives up after `max_attempts` rounds.

use log::debug;
use std::time::Duration;

use crate::driver::traits::{BrowserDriver, ElementHandle};
use crate::error::{MacroError, Result};
use crate::model::Locator;

/// Bounded polling parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverConfig {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_millis(2000),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LocatorResolver {
    config: ResolverConfig,
}

impl LocatorResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve `target` to a single live element
    ///
    /// Lookup errors the driver flags as transient are retried like a miss;
    /// anything else (a lost session above all) ends the search at once.
    pub async fn resolve(
        &self,
        driver: &dyn BrowserDriver,
        target: &[Locator],
    ) -> Result<ElementHandle> {
        let attempts = self.config.max_attempts.max(1);
        let mut delay = self.config.initial_backoff;

        for attempt in 1..=attempts {
            for locator in target {
                match driver.find_candidates(locator).await {
                    Ok(mut matches) if matches.len() == 1 => {
                        debug!("{} resolved on attempt {}", locator, attempt);
                        return Ok(matches.remove(0));
                    }
                    Ok(matches) if matches.len() > 1 => {
                        debug!(
                            "{} is ambiguous ({} matches), trying next candidate",
                            locator,
                            matches.len()
                        );
                    }
                    Ok(_) => {}
                    Err(e) if e.is_transient() => {
                        debug!("lookup of {} failed transiently: {}", locator, e);
                    }
                    Err(e) => return Err(e),
                }
            }

            if attempt < attempts {
                debug!(
                    "no unique match on attempt {}/{}, retrying in {:?}",
                    attempt, attempts, delay
                );
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(self.config.max_backoff);
            }
        }

        Err(MacroError::LocatorNotFound {
            candidates: target.to_vec(),
            attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeDriver, FakeElement};

    fn quick(max_attempts: u32) -> LocatorResolver {
        LocatorResolver::new(ResolverConfig {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
        })
    }

    #[tokio::test]
    async fn test_first_unique_candidate_wins() {
        let driver = FakeDriver::new(vec![
            FakeElement::new(
                "submit",
                vec![Locator::Id("submit".into()), Locator::Text("Send".into())],
            ),
            FakeElement::new("other", vec![Locator::Text("Send".into())]),
        ]);
        let handle = quick(3)
            .resolve(
                &driver,
                &[Locator::Id("submit".into()), Locator::Text("Send".into())],
            )
            .await
            .unwrap();
        assert_eq!(handle.as_str(), "submit");
        assert_eq!(driver.lookups().len(), 1);
    }

    #[tokio::test]
    async fn test_ambiguous_candidate_falls_through() {
        let driver = FakeDriver::new(vec![
            FakeElement::new(
                "a",
                vec![Locator::Text("Edit".into()), Locator::CssPath("li:nth-of-type(1) > a".into())],
            ),
            FakeElement::new("b", vec![Locator::Text("Edit".into())]),
        ]);
        let handle = quick(3)
            .resolve(
                &driver,
                &[
                    Locator::Text("Edit".into()),
                    Locator::CssPath("li:nth-of-type(1) > a".into()),
                ],
            )
            .await
            .unwrap();
        assert_eq!(handle.as_str(), "a");
    }

    #[tokio::test]
    async fn test_late_element_found_by_polling() {
        let driver = FakeDriver::new(vec![FakeElement::with_id("late").appears_after(2)]);
        let handle = quick(5)
            .resolve(&driver, &[Locator::Id("late".into())])
            .await
            .unwrap();
        assert_eq!(handle.as_str(), "late");
        assert_eq!(driver.lookups().len(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_configured_attempts() {
        let driver = FakeDriver::new(Vec::new());
        let target = vec![Locator::Id("ghost".into()), Locator::Text("Ghost".into())];
        let err = quick(4).resolve(&driver, &target).await.unwrap_err();

        match err {
            MacroError::LocatorNotFound {
                candidates,
                attempts,
            } => {
                assert_eq!(candidates, target);
                assert_eq!(attempts, 4);
            }
            other => panic!("unexpected error: {other}"),
        }
        // Every attempt tries every candidate once
        assert_eq!(driver.lookups().len(), 8);
    }

    #[tokio::test]
    async fn test_lost_session_is_not_retried() {
        let driver = FakeDriver::new(vec![FakeElement::with_id("x")]);
        driver.lose_session();
        let err = quick(5)
            .resolve(&driver, &[Locator::Id("x".into())])
            .await
            .unwrap_err();
        assert!(matches!(err, MacroError::DriverSession(_)));
    }
}
