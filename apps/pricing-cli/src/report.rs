//! # Diagnostic Report
//!
//! Human-readable rendering of an [`EngineResult`].
//!
//! ## Layout
//! ```text
//! ============================================================
//!    PRICING ENGINE - DIAGNOSTIC REPORT
//! ============================================================
//!
//! [1. EXECUTION LOG]      one line per non-guard rule
//! [2. GUARDS]             violations, or "No violations detected."
//! [3. STATE FRAGMENT]     pretty JSON of the changed fields
//! [4. SUMMARY]            status, delta flag, rules version
//! ============================================================
//! ```

use std::fmt;

use pricing_core::{EngineResult, StepAction};

const RULE_WIDTH: usize = 60;

/// `Display` wrapper that renders the full report.
pub struct DiagnosticReport<'a> {
    result: &'a EngineResult,
}

impl<'a> DiagnosticReport<'a> {
    pub fn new(result: &'a EngineResult) -> Self {
        DiagnosticReport { result }
    }

    /// `BLOCKED` when any guard fired, `APPROVED` otherwise.
    pub fn status(&self) -> &'static str {
        if self.result.is_blocked() {
            "BLOCKED"
        } else {
            "APPROVED"
        }
    }

    fn write_log(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n[1. EXECUTION LOG]")?;
        if self.result.execution_log.is_empty() {
            return writeln!(f, "   (no rules recorded)");
        }
        for step in &self.result.execution_log {
            let marker = match step.action {
                StepAction::Compute => "->",
                StepAction::Failed => "!!",
            };
            writeln!(
                f,
                "   [{:<12}] Rule: {:<20} {} {}",
                step.phase.as_str().to_uppercase(),
                step.rule_id,
                marker,
                step.message
            )?;
        }
        Ok(())
    }

    fn write_guards(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n[2. GUARDS]")?;
        if !self.result.is_blocked() {
            return writeln!(f, "   No violations detected.");
        }
        for guard in &self.result.guard_violations {
            writeln!(f, "   BLOCKED: [{}] Reason: {}", guard.rule_id, guard.context)?;
        }
        Ok(())
    }

    fn write_fragment(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n[3. STATE FRAGMENT]")?;
        let pretty =
            serde_json::to_string_pretty(&self.result.state_fragment).map_err(|_| fmt::Error)?;
        for line in pretty.lines() {
            writeln!(f, "   {}", line)?;
        }
        Ok(())
    }

    fn write_summary(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n[4. SUMMARY]")?;
        writeln!(f, "   Status:        {}", self.status())?;
        writeln!(
            f,
            "   Delta:         {} (fields changed by the engine)",
            self.result.authoritative_change
        )?;
        writeln!(f, "   Rules version: {}", self.result.rules_version)?;
        writeln!(f, "   Failed rules:  {}", self.result.failed_steps())
    }
}

impl fmt::Display for DiagnosticReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(RULE_WIDTH);
        writeln!(f, "{}", rule)?;
        writeln!(f, "   PRICING ENGINE - DIAGNOSTIC REPORT")?;
        writeln!(f, "{}", rule)?;

        self.write_log(f)?;
        self.write_guards(f)?;
        self.write_fragment(f)?;
        self.write_summary(f)?;

        writeln!(f, "{}", rule)
    }
}
