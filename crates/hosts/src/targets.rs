//! Fan-out of single-host operations over several hosts.

use crate::error::Error;

/// The hosts a command applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Nothing was named; the command does nothing.
    None,
    /// Every host of the command's universe.
    All,
    /// The named hosts, in order.
    Hosts(Vec<String>),
}

impl Target {
    /// `all` wins over any named hosts.
    pub fn new(hosts: Vec<String>, all: bool) -> Self {
        if all {
            Self::All
        } else if hosts.is_empty() {
            Self::None
        } else {
            Self::Hosts(hosts)
        }
    }
}

/// Outcome of a fan-out: what succeeded and what failed, per alias.
#[derive(Debug)]
pub struct Report<T> {
    pub done: Vec<(String, T)>,
    pub failed: Vec<(String, Error)>,
}

impl<T> Default for Report<T> {
    fn default() -> Self {
        Self {
            done: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<T> Report<T> {
    pub fn push(&mut self, alias: impl Into<String>, result: Result<T, Error>) {
        let alias = alias.into();
        match result {
            Ok(value) => self.done.push((alias, value)),
            Err(e) => {
                tracing::debug!(alias, kind = %e.kind(), error = %e, "operation failed");
                self.failed.push((alias, e));
            }
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.done.len() + self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Runs `op` for every alias of `target`, in order.
///
/// A failing alias does not stop the others. `universe` is only consulted for
/// [`Target::All`].
///
/// # Errors
///
/// Returns an error only if `universe` fails.
pub fn for_each<T, U, F>(target: &Target, universe: U, mut op: F) -> Result<Report<T>, Error>
where
    U: FnOnce() -> Result<Vec<String>, Error>,
    F: FnMut(&str) -> Result<T, Error>,
{
    let aliases = match target {
        Target::None => return Ok(Report::default()),
        Target::All => universe()?,
        Target::Hosts(hosts) => hosts.clone(),
    };

    let mut report = Report::default();
    for alias in aliases {
        let result = op(&alias);
        report.push(alias, result);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_target_new() {
        assert_eq!(Target::new(vec![], false), Target::None);
        assert_eq!(Target::new(names(&["a"]), true), Target::All);
        assert_eq!(
            Target::new(names(&["a", "b"]), false),
            Target::Hosts(names(&["a", "b"]))
        );
    }

    #[test]
    fn test_none_is_a_noop() {
        let mut calls = 0;
        let report = for_each(
            &Target::None,
            || panic!("universe must not be read"),
            |_| {
                calls += 1;
                Ok(())
            },
        )
        .unwrap();

        assert!(report.is_empty());
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_all_uses_universe_and_ignores_names() {
        let mut seen = Vec::new();
        let report = for_each(
            &Target::new(names(&["x"]), true),
            || Ok(names(&["a", "b"])),
            |alias| {
                seen.push(alias.to_string());
                Ok(alias.len())
            },
        )
        .unwrap();

        assert_eq!(seen, names(&["a", "b"]));
        assert_eq!(report.done.len(), 2);
        assert!(report.is_success());
    }

    #[test]
    fn test_failures_do_not_stop_the_fan_out() {
        let report = for_each(
            &Target::Hosts(names(&["a", "ghost", "b", "phantom"])),
            || Ok(Vec::new()),
            |alias| {
                if alias.starts_with('a') || alias == "b" {
                    Ok(())
                } else {
                    Err(Error::MissingHost(alias.to_string()))
                }
            },
        )
        .unwrap();

        let done: Vec<_> = report.done.iter().map(|(a, ())| a.as_str()).collect();
        let failed: Vec<_> = report.failed.iter().map(|(a, _)| a.as_str()).collect();
        assert_eq!(done, ["a", "b"]);
        assert_eq!(failed, ["ghost", "phantom"]);
        assert!(!report.is_success());
    }

    #[test]
    fn test_universe_error_is_fatal() {
        let result: Result<Report<()>, _> = for_each(
            &Target::All,
            || Err(Error::Configuration("no mounts".into())),
            |_| Ok(()),
        );
        assert!(result.is_err());
    }
}
