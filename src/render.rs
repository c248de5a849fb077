// render module: invoice layout as Typst markup, compiled to PDF by the typst CLI.

use std::{
    fmt::{self, Write as _},
    io,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use rand::{Rng, distr::Alphanumeric};
use thiserror::Error;
use tokio::{fs, process::Command};
use tracing::{debug, warn};

use crate::models::Invoice;

const DISPLAY_DATE: &str = "%b %d, %Y";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("could not prepare render directory: {0}")]
    Io(#[from] io::Error),
    #[error("typst binary `{0}` not found; install it or set TYPST_BIN")]
    MissingCompiler(String),
    #[error("typst failed: {0}")]
    Compile(String),
    #[error("could not write typst source: {0}")]
    Format(#[from] fmt::Error),
}

/// A compiled document and the private directory that holds it.
#[derive(Debug)]
pub struct RenderedDocument {
    pub dir: PathBuf,
    pub path: PathBuf,
}

/// Typst string literal with every user-provided character escaped.
pub fn typst_str(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

fn money(value: f64) -> String {
    typst_str(&format!("{value:.2}"))
}

pub fn invoice_source(invoice: &Invoice) -> Result<String, RenderError> {
    let mut src = String::new();
    write_source(&mut src, invoice)?;
    Ok(src)
}

fn write_source(src: &mut String, invoice: &Invoice) -> fmt::Result {
    writeln!(src, "#set page(paper: \"a4\", margin: 10mm)")?;
    writeln!(src, "#set text(size: 10pt)")?;
    writeln!(
        src,
        "#align(center, text(size: 20pt, weight: \"bold\")[#{}])",
        typst_str(&format!("Invoice #{}", invoice.invoice_number))
    )?;
    writeln!(src, "#v(6mm)")?;

    writeln!(src, "#grid(columns: (1fr, 1fr), gutter: 8mm,")?;
    for (label, party) in [("Sender", &invoice.sender), ("Customer", &invoice.customer)] {
        writeln!(
            src,
            "  [*{label}* \\ #{} \\ #{} \\ #{} \\ #{}],",
            typst_str(&party.name),
            typst_str(&party.address),
            typst_str(&party.email),
            typst_str(&party.phone),
        )?;
    }
    writeln!(src, ")")?;
    writeln!(src, "#v(4mm)")?;

    writeln!(
        src,
        "*Issue date:* #{} \\ *Due date:* #{} \\ *Currency:* #{}",
        typst_str(&invoice.issue_date.format(DISPLAY_DATE).to_string()),
        typst_str(&invoice.due_date.format(DISPLAY_DATE).to_string()),
        typst_str(&invoice.billing_currency),
    )?;
    writeln!(src, "#v(4mm)")?;

    writeln!(src, "#table(")?;
    writeln!(src, "  columns: (80mm, 30mm, 40mm, 40mm),")?;
    writeln!(src, "  fill: (_, row) => if row == 0 {{ luma(220) }},")?;
    writeln!(
        src,
        "  [*Description*], [*Quantity*], [*Unit price*], [*Total price*],"
    )?;
    for item in &invoice.items {
        writeln!(
            src,
            "  [#{}], [#{}], [#{}], [#{}],",
            typst_str(&item.description),
            typst_str(&item.quantity.to_string()),
            money(item.unit_price),
            money(f64::from(item.quantity) * item.unit_price),
        )?;
    }
    writeln!(src, ")")?;
    writeln!(src, "#v(4mm)")?;

    if invoice.discount > 0.0 {
        writeln!(
            src,
            "#align(right)[Discount: #{}%]",
            typst_str(&format!("{}", invoice.discount))
        )?;
    }
    writeln!(
        src,
        "#align(right, box(stroke: 0.5pt, inset: 6pt)[*Total amount due:* #{} #{}])",
        typst_str(&invoice.billing_currency),
        money(invoice.total_amount_due),
    )?;
    writeln!(src, "#v(6mm)")?;

    let payment = &invoice.payment_info;
    writeln!(
        src,
        "*Payment information* \\ Account name: #{} \\ Account number: #{} \\ Routing number: #{} \\ Bank: #{}",
        typst_str(&payment.account_name),
        typst_str(&payment.account_number),
        typst_str(&payment.routing_number),
        typst_str(&payment.bank_name),
    )?;

    if !invoice.notes.trim().is_empty() {
        writeln!(src, "#v(4mm)")?;
        writeln!(src, "*Notes* \\ #{}", typst_str(&invoice.notes))?;
    }
    Ok(())
}

/// Compiles `source` inside a fresh directory under `base_dir`.
/// The caller owns the directory and is expected to remove it.
pub async fn compile_pdf(
    source: &str,
    typst_bin: &str,
    base_dir: &Path,
) -> Result<RenderedDocument, RenderError> {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect();
    let dir = base_dir.join(format!("invoice-{suffix}"));
    fs::create_dir_all(&dir).await?;

    let input = dir.join("invoice.typ");
    let output = dir.join("invoice.pdf");
    if let Err(err) = fs::write(&input, source).await {
        let _ = fs::remove_dir_all(&dir).await;
        return Err(err.into());
    }

    let result = Command::new(typst_bin)
        .arg("compile")
        .arg(&input)
        .arg(&output)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await;

    let failure = match result {
        Ok(out) if out.status.success() => None,
        Ok(out) => {
            let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
            Some(RenderError::Compile(if stderr.is_empty() {
                format!("exit status {}", out.status)
            } else {
                stderr
            }))
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            Some(RenderError::MissingCompiler(typst_bin.to_string()))
        }
        Err(err) => Some(RenderError::Io(err)),
    };
    if let Some(err) = failure {
        let _ = fs::remove_dir_all(&dir).await;
        return Err(err);
    }

    debug!(path = %output.display(), "invoice rendered");
    Ok(RenderedDocument { dir, path: output })
}

/// Removes a render directory once `after` has elapsed.
pub fn schedule_cleanup(dir: PathBuf, after: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        if let Err(err) = fs::remove_dir_all(&dir).await {
            warn!(path = %dir.display(), error = %err, "failed to remove render directory");
        }
    });
}
