//! Scripted in-memory registry for tests
//!
//! Each package gets a script: how its publish calls answer and after how
//! many polls it turns resolvable. The registry records every call and flags
//! any publish whose dependencies were not confirmed resolvable first.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::core::error::PublishError;
use crate::core::traits::{PackageId, PackageSpec, RegistryClient};

/// How publish calls for one package answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishScript {
    Accept,
    AlreadyPublished,
    Reject(String),
    /// The first `n` calls fail transiently, later calls succeed
    TransientThenAccept(u32),
    AlwaysTransient,
}

/// Behaviour of one package
#[derive(Debug, Clone)]
pub struct PackageScript {
    pub publish: PublishScript,
    /// Failed polls before the package turns resolvable; `None` never does
    pub resolvable_after: Option<u32>,
    /// Time each publish call takes
    pub publish_delay: Duration,
}

impl Default for PackageScript {
    fn default() -> Self {
        Self {
            publish: PublishScript::Accept,
            resolvable_after: Some(0),
            publish_delay: Duration::ZERO,
        }
    }
}

impl PackageScript {
    pub fn accepted() -> Self {
        Self::default()
    }

    pub fn rejected(message: &str) -> Self {
        Self {
            publish: PublishScript::Reject(message.to_string()),
            ..Self::default()
        }
    }

    pub fn already_published() -> Self {
        Self {
            publish: PublishScript::AlreadyPublished,
            ..Self::default()
        }
    }

    pub fn transient(failures: u32) -> Self {
        Self {
            publish: PublishScript::TransientThenAccept(failures),
            ..Self::default()
        }
    }

    pub fn always_transient() -> Self {
        Self {
            publish: PublishScript::AlwaysTransient,
            ..Self::default()
        }
    }

    pub fn resolvable_after(mut self, failed_polls: u32) -> Self {
        self.resolvable_after = Some(failed_polls);
        self
    }

    pub fn never_resolvable(mut self) -> Self {
        self.resolvable_after = None;
        self
    }

    pub fn publish_delay(mut self, delay: Duration) -> Self {
        self.publish_delay = delay;
        self
    }
}

/// One recorded registry call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryCall {
    Publish { package: String },
    Poll { package: String, resolvable: bool },
}

#[derive(Debug, Default)]
struct Inner {
    calls: Vec<RegistryCall>,
    publish_calls: HashMap<String, u32>,
    polls: HashMap<String, u32>,
    published: HashSet<String>,
    resolvable: HashSet<String>,
    violations: Vec<String>,
    in_flight: usize,
    max_in_flight: usize,
}

/// Instrumented fake registry
#[derive(Debug, Default)]
pub struct ScriptedRegistry {
    scripts: HashMap<String, PackageScript>,
    external: HashSet<String>,
    inner: Mutex<Inner>,
}

impl ScriptedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a package; unscripted packages are accepted and resolvable at once
    pub fn with_script(mut self, package: &str, script: PackageScript) -> Self {
        self.scripts.insert(package.to_string(), script);
        self
    }

    /// Dependencies that count as resolvable without being published here
    pub fn with_external<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.external.extend(names.into_iter().map(Into::into));
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn script(&self, package: &str) -> PackageScript {
        self.scripts.get(package).cloned().unwrap_or_default()
    }

    /// Every call in the order it was made
    pub fn calls(&self) -> Vec<RegistryCall> {
        self.lock().calls.clone()
    }

    pub fn publish_count(&self, package: &str) -> u32 {
        self.lock().publish_calls.get(package).copied().unwrap_or(0)
    }

    pub fn poll_count(&self, package: &str) -> u32 {
        self.lock().polls.get(package).copied().unwrap_or(0)
    }

    /// Publishes issued before a dependency was confirmed resolvable
    pub fn violations(&self) -> Vec<String> {
        self.lock().violations.clone()
    }

    /// Most publish calls observed running at the same time
    pub fn max_in_flight(&self) -> usize {
        self.lock().max_in_flight
    }

    /// Package names in first-publish order
    pub fn publish_order(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                RegistryCall::Publish { package } if seen.insert(package.clone()) => {
                    Some(package.clone())
                }
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl RegistryClient for ScriptedRegistry {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn publish(&self, package: &PackageSpec) -> Result<(), PublishError> {
        let name = package.name().to_string();
        let script = self.script(&name);

        let attempt = {
            let mut inner = self.lock();
            for dep in &package.depends_on {
                if !self.external.contains(dep) && !inner.resolvable.contains(dep) {
                    let violation =
                        format!("{} published before {} was resolvable", name, dep);
                    inner.violations.push(violation);
                }
            }
            inner.calls.push(RegistryCall::Publish {
                package: name.clone(),
            });
            inner.in_flight += 1;
            inner.max_in_flight = inner.max_in_flight.max(inner.in_flight);
            let count = inner.publish_calls.entry(name.clone()).or_insert(0);
            *count += 1;
            *count
        };

        if !script.publish_delay.is_zero() {
            tokio::time::sleep(script.publish_delay).await;
        }

        let label = package.id.to_string();
        let result = match script.publish {
            PublishScript::Accept => Ok(()),
            PublishScript::AlreadyPublished => {
                Err(PublishError::AlreadyPublished { package: label })
            }
            PublishScript::Reject(message) => Err(PublishError::Rejected {
                package: label,
                message,
            }),
            PublishScript::TransientThenAccept(failures) if attempt <= failures => {
                Err(PublishError::Transient {
                    package: label,
                    message: "503 Service Unavailable".to_string(),
                })
            }
            PublishScript::TransientThenAccept(_) => Ok(()),
            PublishScript::AlwaysTransient => Err(PublishError::Transient {
                package: label,
                message: "connection reset".to_string(),
            }),
        };

        let mut inner = self.lock();
        inner.in_flight -= 1;
        if matches!(result, Ok(()) | Err(PublishError::AlreadyPublished { .. })) {
            inner.published.insert(name);
        }

        result
    }

    async fn is_resolvable(&self, id: &PackageId) -> bool {
        let script = self.script(&id.name);
        let mut inner = self.lock();

        let polls = inner.polls.entry(id.name.clone()).or_insert(0);
        *polls += 1;
        let poll = *polls;

        let resolvable = inner.published.contains(&id.name)
            && script.resolvable_after.is_some_and(|k| poll > k);

        inner.calls.push(RegistryCall::Poll {
            package: id.name.clone(),
            resolvable,
        });
        if resolvable {
            inner.resolvable.insert(id.name.clone());
        }

        resolvable
    }
}
