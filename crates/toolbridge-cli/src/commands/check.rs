//! `toolbridge check` command implementation.
//!
//! Validates the configuration against the routes the host commits:
//! - configuration invariants (mount path, empty patterns)
//! - discovery results (malformed routes, duplicate tool names, filters)
//! - include/exclude patterns that match nothing

use super::{assemble, load_config};
use crate::demo::{self, UserStore};
use anyhow::Result;
use std::path::PathBuf;
use toolbridge_core::{BridgeConfig, CommittedRoutes, Transport};
use toolbridge_mcp::RouteDiscoverer;
use toolbridge_mcp::discovery::RoutePattern;

// ============================================================================
// Check Result Types
// ============================================================================

/// Severity level for check results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARN"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// A single check finding.
#[derive(Debug, Clone)]
pub struct CheckFinding {
    pub severity: Severity,
    /// Category of the check that produced this finding.
    pub category: &'static str,
    pub message: String,
}

impl CheckFinding {
    fn error(category: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            category,
            message: message.into(),
        }
    }

    fn warning(category: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            category,
            message: message.into(),
        }
    }

    fn info(category: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            category,
            message: message.into(),
        }
    }
}

/// Results from running all checks.
#[derive(Debug, Default)]
pub struct CheckResults {
    pub findings: Vec<CheckFinding>,
}

impl CheckResults {
    fn add(&mut self, finding: CheckFinding) {
        self.findings.push(finding);
    }

    pub fn has_errors(&self) -> bool {
        self.findings.iter().any(|f| f.severity == Severity::Error)
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == severity)
            .count()
    }

    /// Print human-readable summary.
    pub fn print_summary(&self) {
        for severity in [Severity::Error, Severity::Warning, Severity::Info] {
            let findings: Vec<_> = self
                .findings
                .iter()
                .filter(|f| f.severity == severity)
                .collect();
            if findings.is_empty() {
                continue;
            }
            println!("\n{} ({}):", severity, findings.len());
            println!("{}", "─".repeat(60));
            for finding in findings {
                println!("  [{}] {}", finding.category, finding.message);
            }
        }

        println!();
        println!("{}", "═".repeat(60));
        if self.has_errors() {
            println!(
                "❌ {} error(s), {} warning(s)",
                self.count(Severity::Error),
                self.count(Severity::Warning)
            );
        } else {
            println!("✅ All checks passed!");
        }
    }
}

// ============================================================================
// Checks
// ============================================================================

/// Run every check against a configuration and committed route set.
pub fn run_checks(config: &BridgeConfig, routes: &CommittedRoutes) -> CheckResults {
    let mut results = CheckResults::default();

    if let Err(e) = config.validate() {
        results.add(CheckFinding::error("config", e.to_string()));
    }
    if config.mcp.transport == Transport::Http && config.mcp.port == 0 {
        results.add(CheckFinding::warning(
            "config",
            "mcp.port is 0; the HTTP transport will bind a random port",
        ));
    }

    let discoverer = RouteDiscoverer::new(&config.discovery);
    let report = discoverer.discover(routes);

    if !config.discovery.enabled {
        results.add(CheckFinding::info("discovery", "route discovery is disabled"));
        return results;
    }
    if report.skipped_malformed > 0 {
        results.add(CheckFinding::warning(
            "discovery",
            format!("{} route method(s) skipped as malformed", report.skipped_malformed),
        ));
    }
    if report.skipped_duplicates > 0 {
        results.add(CheckFinding::warning(
            "discovery",
            format!(
                "{} route method(s) skipped for duplicate tool names",
                report.skipped_duplicates
            ),
        ));
    }
    if report.tools.is_empty() {
        results.add(CheckFinding::warning("discovery", "no routes became tools"));
    } else {
        results.add(CheckFinding::info(
            "discovery",
            format!(
                "{} tool(s) discovered, {} filtered out",
                report.tools.len(),
                report.filtered
            ),
        ));
    }

    let infos = discoverer.route_infos(routes);
    for pattern in &config.discovery.include {
        let pattern = RoutePattern::new(pattern.as_str());
        if !infos.iter().any(|info| pattern.matches_route(info)) {
            results.add(CheckFinding::warning(
                "filters",
                format!("include pattern '{}' matches no route", pattern.as_str()),
            ));
        }
    }
    for pattern in &config.discovery.exclude {
        let pattern = RoutePattern::new(pattern.as_str());
        if !infos.iter().any(|info| pattern.matches_route(info)) {
            results.add(CheckFinding::info(
                "filters",
                format!("exclude pattern '{}' matches no route", pattern.as_str()),
            ));
        }
    }

    if !config.discovery.expose_auth_as_params && infos.iter().any(|i| i.security.is_some()) {
        results.add(CheckFinding::info(
            "security",
            "credential parameters are hidden; agents must send an Authorization header",
        ));
    }

    results
}

/// Check configuration against the demo host's routes.
pub async fn check(config_path: Option<PathBuf>) -> Result<()> {
    println!("🔍 Checking toolbridge configuration...");

    let config = load_config(config_path.as_deref())?;
    let mut results = run_checks(&config, &demo::routes());

    if !results.has_errors() {
        let (server, _) = assemble(config, UserStore::default())?;
        let shadowed = server.registry().shadowed();
        if shadowed > 0 {
            results.add(CheckFinding::warning(
                "registry",
                format!("{shadowed} discovered tool(s) shadowed by manual tools"),
            ));
        }
    }

    results.print_summary();
    if results.has_errors() {
        anyhow::bail!("Configuration check failed");
    }
    Ok(())
}
