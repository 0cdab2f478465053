//! Property-test run profile shared by every proptest suite in the workspace.
//!
//! `PROGTEST_CASES` scales the number of generated cases and `KPD_PBT_FORK`
//! runs each case in a forked subprocess. Malformed overrides are logged and
//! ignored.

use std::env;

/// Environment variable controlling proptest case counts.
pub const PROGTEST_CASES_ENV_KEY: &str = "PROGTEST_CASES";
/// Environment variable controlling proptest process forking.
pub const KPD_PBT_FORK_ENV_KEY: &str = "KPD_PBT_FORK";

/// Case count and fork mode for one property suite.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProptestRunProfile {
    cases: u32,
    fork: bool,
}

impl ProptestRunProfile {
    /// Reads the profile from the process environment.
    ///
    /// # Examples
    ///
    /// ```
    /// use kpd_test_support::ci::property_test_profile::ProptestRunProfile;
    ///
    /// let profile = ProptestRunProfile::load(64, false);
    /// assert!(profile.cases() > 0);
    /// ```
    #[must_use]
    pub fn load(default_cases: u32, default_fork: bool) -> Self {
        Self::from_lookup(default_cases, default_fork, |key| env::var(key).ok())
    }

    /// Reads the profile through `lookup`, which maps a variable name to its
    /// raw value.
    ///
    /// # Examples
    ///
    /// ```
    /// use kpd_test_support::ci::property_test_profile::ProptestRunProfile;
    ///
    /// let profile = ProptestRunProfile::from_lookup(64, false, |key| {
    ///     (key == "PROGTEST_CASES").then(|| "512".to_owned())
    /// });
    /// assert_eq!(profile.cases(), 512);
    /// assert!(!profile.fork());
    /// ```
    #[must_use]
    pub fn from_lookup(
        default_cases: u32,
        default_fork: bool,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        Self {
            cases: Override::new(PROGTEST_CASES_ENV_KEY, &lookup).parse(default_cases, parse_cases),
            fork: Override::new(KPD_PBT_FORK_ENV_KEY, &lookup).parse(default_fork, parse_bool),
        }
    }

    /// Number of cases to run per property.
    #[must_use]
    #[rustfmt::skip]
    pub const fn cases(&self) -> u32 { self.cases }

    /// Whether to run proptest cases in forked subprocesses.
    #[must_use]
    #[rustfmt::skip]
    pub const fn fork(&self) -> bool { self.fork }
}

struct Override {
    key: &'static str,
    raw: Option<String>,
}

impl Override {
    fn new(key: &'static str, lookup: &impl Fn(&str) -> Option<String>) -> Self {
        Self {
            key,
            raw: lookup(key),
        }
    }

    fn parse<T>(self, default: T, parser: fn(&str) -> Result<T, &'static str>) -> T {
        let Some(raw) = self.raw else {
            return default;
        };
        parser(&raw).unwrap_or_else(|reason| {
            tracing::warn!(
                env = self.key,
                raw = %raw,
                reason,
                "ignoring malformed property-test override",
            );
            default
        })
    }
}

fn parse_cases(raw: &str) -> Result<u32, &'static str> {
    match raw.trim().parse::<u32>() {
        Ok(0) => Err("cases must be positive"),
        Ok(cases) => Ok(cases),
        Err(_) => Err("cases must be an unsigned integer"),
    }
}

fn parse_bool(raw: &str) -> Result<bool, &'static str> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err("expected true/false, 1/0, yes/no or on/off"),
    }
}
