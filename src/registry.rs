//! Driver registry: owns the challenge drivers and selects one for each
//! init request based on the requested capability dimensions.

use std::sync::Arc;

use crate::challenges::ChallengeDriver;
use crate::error::{AgentAuthError, Result};
use crate::types::Dimension;

/// Immutable after engine construction; needs no locking.
#[derive(Default)]
pub struct DriverRegistry {
    drivers: Vec<Arc<dyn ChallengeDriver>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        DriverRegistry::default()
    }

    pub fn register(&mut self, driver: Arc<dyn ChallengeDriver>) -> Result<()> {
        if self.drivers.iter().any(|d| d.name() == driver.name()) {
            return Err(AgentAuthError::DriverAlreadyRegistered(
                driver.name().to_owned(),
            ));
        }
        self.drivers.push(driver);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ChallengeDriver>> {
        self.drivers.iter().find(|d| d.name() == name).cloned()
    }

    pub fn list(&self) -> &[Arc<dyn ChallengeDriver>] {
        &self.drivers
    }

    /// Pick up to `count` drivers for the requested dimensions.
    ///
    /// With no dimensions the first `count` registered drivers win;
    /// otherwise drivers are ranked by how many requested dimensions they
    /// cover, ties broken by registration order.
    pub fn select(
        &self,
        dimensions: &[Dimension],
        count: usize,
    ) -> Result<Vec<Arc<dyn ChallengeDriver>>> {
        if self.drivers.is_empty() {
            return Err(AgentAuthError::NoDriversRegistered);
        }

        if dimensions.is_empty() {
            return Ok(self.drivers.iter().take(count).cloned().collect());
        }

        let mut scored: Vec<(usize, Arc<dyn ChallengeDriver>)> = self
            .drivers
            .iter()
            .map(|driver| {
                let coverage = driver
                    .dimensions()
                    .iter()
                    .filter(|d| dimensions.contains(d))
                    .count();
                (coverage, Arc::clone(driver))
            })
            .collect();

        // stable sort keeps registration order within equal coverage
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(count)
            .map(|(_, driver)| driver)
            .collect())
    }
}
