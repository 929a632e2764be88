use std::fs;
use std::path::Path;

use listey_core::ids::UuidIssuer;
use listey_core::models::{normalize, Status};
use listey_core::store::{RecordKey, SyncPlan};
use listey_core::sync::TracingSink;
use listey_core::{reconcile, ListNode};
use serde::Serialize;

use crate::error::CliError;

/// Path that stands for "this side has no copy"
pub const ABSENT: &str = "-";

#[derive(Debug, Serialize)]
pub struct ReconcileReport {
    pub merged: Option<ListNode>,
    pub changed_on_server: Vec<RecordKey>,
    pub issued_ids: usize,
    pub plan: SyncPlan,
}

pub fn run_reconcile(
    server_path: &Path,
    client_path: &Path,
    owner: &str,
    as_json: bool,
    output_path: Option<&Path>,
) -> Result<(), CliError> {
    let server = read_list_document(server_path)?;
    let client = read_list_document(client_path)?;
    let report = reconcile_documents(owner, server.as_ref(), client.as_ref())?;

    let rendered = if as_json {
        serde_json::to_string_pretty(&report)?
    } else {
        format_report_lines(&report).join("\n")
    };

    if let Some(path) = output_path {
        fs::write(path, rendered)?;
        println!("{}", path.display());
    } else {
        println!("{rendered}");
    }

    Ok(())
}

/// Parse and normalize a list document; `-` yields `None`
pub fn read_list_document(path: &Path) -> Result<Option<ListNode>, CliError> {
    if path.as_os_str() == ABSENT {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|source| CliError::ReadInput {
        path: path.to_path_buf(),
        source,
    })?;
    parse_list_document(path, &raw).map(Some)
}

pub fn parse_list_document(path: &Path, raw: &str) -> Result<ListNode, CliError> {
    let mut list: ListNode =
        serde_json::from_str(raw).map_err(|source| CliError::InvalidDocument {
            path: path.to_path_buf(),
            source,
        })?;
    normalize(&mut list)?;
    Ok(list)
}

pub fn reconcile_documents(
    owner: &str,
    server: Option<&ListNode>,
    client: Option<&ListNode>,
) -> Result<ReconcileReport, CliError> {
    let owner = normalize_owner(owner)?;
    let issuer = UuidIssuer::new();
    let mut sink = TracingSink;
    let outcome = reconcile(&issuer, &mut sink, &RecordKey::user(owner), &[], server, client)?;

    Ok(ReconcileReport {
        merged: outcome.merged,
        changed_on_server: outcome.changed_keys.into_iter().collect(),
        issued_ids: issuer.issued_count(),
        plan: outcome.plan,
    })
}

fn normalize_owner(owner: &str) -> Result<&str, CliError> {
    let owner = owner.trim();
    if owner.is_empty() {
        return Err(CliError::InvalidOwner("owner cannot be empty".to_string()));
    }
    if owner.contains(['/', ':']) {
        return Err(CliError::InvalidOwner(format!(
            "{owner:?} must not contain '/' or ':'"
        )));
    }
    Ok(owner)
}

pub fn format_report_lines(report: &ReconcileReport) -> Vec<String> {
    let mut lines = Vec::new();

    match &report.merged {
        Some(list) => lines.extend(format_list_lines(list)),
        None => lines.push("merged: (nothing)".to_string()),
    }

    lines.push(format!(
        "changed on server ({}):",
        report.changed_on_server.len()
    ));
    lines.extend(report.changed_on_server.iter().map(|key| format!("  {key}")));

    lines.push(format!("persist ({}):", report.plan.persist.len()));
    lines.extend(
        report
            .plan
            .persist
            .iter()
            .map(|record| format!("  {}", record.key())),
    );

    lines.push(format!("delete ({}):", report.plan.delete.len()));
    lines.extend(report.plan.delete.iter().map(|key| format!("  {key}")));

    if report.issued_ids > 0 {
        lines.push(format!("issued {} permanent id(s)", report.issued_ids));
    }
    lines
}

fn format_list_lines(list: &ListNode) -> Vec<String> {
    let mut lines = vec![format!(
        "merged: list {} \"{}\"{}",
        list.unique_id,
        list.name,
        status_suffix(list.status)
    )];

    let mut items: Vec<_> = list.items.values().collect();
    items.sort_by(|a, b| a.unique_id.cmp(&b.unique_id));
    for item in items {
        let mut tags: Vec<&str> = item
            .categories
            .values()
            .map(|category| category.label.as_str())
            .collect();
        tags.sort_unstable();
        let tags = if tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", tags.join(", "))
        };
        lines.push(format!(
            "  item {} \"{}\" x{}{}{}",
            item.unique_id,
            item.name,
            item.count,
            tags,
            status_suffix(item.status)
        ));
    }

    for category in &list.categories {
        lines.push(format!(
            "  category {} \"{}\"{}",
            category.unique_id,
            category.label,
            status_suffix(category.status)
        ));
    }

    let mut shared: Vec<_> = list.shared_privileges.values().collect();
    shared.sort_by(|a, b| a.user_id.cmp(&b.user_id));
    for privilege in shared {
        lines.push(format!(
            "  shared with {} ({}){}",
            privilege.user_id,
            privilege.privilege,
            status_suffix(privilege.status)
        ));
    }
    lines
}

fn status_suffix(status: Status) -> String {
    if status == Status::Active {
        String::new()
    } else {
        format!(" ({status})")
    }
}
