//! Console rendering of runs.

use std::io::{self, Write};

use harvest_core::extract::Candidate;
use harvest_core::validate::ValidationReport;
use harvest_shared::HeritageSite;

/// One block per site, separated by `---`.
pub(crate) fn write_sites<W: Write>(out: &mut W, sites: &[HeritageSite]) -> io::Result<()> {
    if sites.is_empty() {
        writeln!(out, "No heritage sites could be extracted from the answer.")?;
        return Ok(());
    }

    for site in sites {
        writeln!(out, "Name: {}", site.name)?;
        writeln!(out, "Registered Year: {}", site.registered_year)?;
        if let Some(kind) = site.kind {
            writeln!(out, "Type: {kind}")?;
        }
        writeln!(out, "Description: {}", site.description)?;
        writeln!(out, "---")?;
    }
    Ok(())
}

/// Pretty JSON array.
pub(crate) fn write_json<W: Write>(out: &mut W, sites: &[HeritageSite]) -> io::Result<()> {
    let json = serde_json::to_string_pretty(sites).map_err(io::Error::other)?;
    writeln!(out, "{json}")
}

/// Raw answer and the span the extractor kept.
pub(crate) fn write_raw<W: Write>(out: &mut W, raw: &str, candidate: &Candidate) -> io::Result<()> {
    writeln!(out, "Raw answer:")?;
    writeln!(out, "{raw}")?;
    writeln!(out)?;
    if candidate.span_found {
        writeln!(out, "Extracted JSON:")?;
    } else {
        writeln!(out, "Extracted JSON (no bracket span found):")?;
    }
    writeln!(out, "{}", candidate.text)?;
    writeln!(out)
}

/// One-line tally of what the validator did.
pub(crate) fn write_summary<W: Write>(out: &mut W, report: &ValidationReport) -> io::Result<()> {
    if let Some(err) = &report.parse_error {
        return writeln!(out, "  Answer could not be parsed: {err}");
    }
    writeln!(
        out,
        "  Accepted: {}  Dropped: {}",
        report.sites.len(),
        report.rejections.len()
    )?;
    for rejection in &report.rejections {
        writeln!(out, "    #{}: {}", rejection.index, rejection.reason)?;
    }
    Ok(())
}
