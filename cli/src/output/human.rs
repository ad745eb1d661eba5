//! Human-readable terminal renderer.

use owo_colors::OwoColorize as _;

use crate::application::services::bootstrap::Provisioned;
use crate::domain::config::region_short_name;
use crate::domain::{DomainCheck, EcsConfig, Instance, InstanceStatus, RegisteredDomain};
use crate::output::OutputContext;

const HEADERS: [&str; 7] = ["Idx", "Zone", "Id", "Type", "Status", "Public IP", "Created"];
const DOMAIN_HEADERS: [&str; 5] = ["Idx", "Name", "Status", "Type", "Expires"];

/// Renders domain types as human-readable terminal output using `OutputContext`.
pub struct HumanRenderer<'a> {
    ctx: &'a OutputContext,
}

impl<'a> HumanRenderer<'a> {
    /// Create a new `HumanRenderer` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    /// Render instances as an aligned table.
    pub fn render_instances(&self, instances: &[Instance]) {
        if instances.is_empty() {
            if !self.ctx.quiet {
                println!("No instances. Create one: ecsup up");
            }
            return;
        }

        let lines = format_table(&instance_rows(instances));
        if let Some((header, body)) = lines.split_first() {
            println!("{}", header.style(self.ctx.styles.bold));
            for (line, instance) in body.iter().zip(instances) {
                println!("{}", line.style(status_style(self.ctx, instance.status)));
            }
        }
    }

    /// Render registered domains as an aligned table.
    pub fn render_domains(&self, domains: &[RegisteredDomain]) {
        if domains.is_empty() {
            if !self.ctx.quiet {
                println!("No registered domains.");
            }
            return;
        }
        let lines = format_columns(DOMAIN_HEADERS, &domain_rows(domains));
        if let Some((header, body)) = lines.split_first() {
            println!("{}", header.style(self.ctx.styles.bold));
            for line in body {
                println!("{line}");
            }
        }
    }

    /// Render an availability check; always printed, even when quiet.
    pub fn render_domain_check(&self, check: &DomainCheck) {
        let style = if check.availability.is_registrable() {
            self.ctx.styles.success
        } else {
            self.ctx.styles.warning
        };
        println!("{}", check_summary(check).style(style));
    }

    /// Print the bare address in quiet mode so scripts can capture it; the
    /// progress reporter has already said everything else.
    pub fn render_provisioned(&self, provisioned: &Provisioned) {
        if self.ctx.quiet {
            println!("{}", provisioned.address);
        }
    }

    /// Render the current configuration. Secrets are never shown.
    pub fn render_config(&self, config: &EcsConfig, path: &std::path::Path) {
        println!();
        self.ctx.header(&format!("Configuration ({})", path.display()));
        println!();
        let region = config.region().map_or_else(
            |_| "(unknown zone)".to_string(),
            |r| format!("{r} ({})", region_short_name(r)),
        );
        let rows = [
            ("zone:", format!("{} in {region}", config.zone)),
            ("instance_name:", config.instance_name.clone()),
            ("instance_type:", config.instance_type.clone()),
            ("image:", config.image.clone()),
            (
                "charge:",
                format!(
                    "{} / {}",
                    config.instance_charge_type, config.internet_charge_type
                ),
            ),
            (
                "bandwidth:",
                format!("{} in / {} out Mbps", config.bandwidth_in, config.bandwidth_out),
            ),
            (
                "system_disk:",
                format!("{} GB {}", config.system_disk_size, config.system_disk_category),
            ),
            ("poll_interval_ms:", config.poll_interval_ms.to_string()),
            ("timeout_secs:", config.timeout_secs.to_string()),
            (
                "ssh:",
                format!("{}@<host>:{}", config.ssh_user, config.ssh_port),
            ),
            (
                "private_key:",
                config
                    .private_key
                    .as_ref()
                    .map_or_else(|| "(password login)".to_string(), |p| p.display().to_string()),
            ),
            ("connect_timeout_secs:", config.connect_timeout_secs.to_string()),
            (
                "endpoint:",
                config
                    .endpoint
                    .clone()
                    .unwrap_or_else(|| "(default)".to_string()),
            ),
            ("dry_run:", config.dry_run.to_string()),
        ];
        for (key, value) in &rows {
            self.ctx.kv(key, value);
        }

        println!();
        println!("  {}", "Init commands:".style(self.ctx.styles.bold));
        if config.init_cmds.is_empty() {
            println!("    (none)");
        }
        for cmd in &config.init_cmds {
            println!("    {cmd}");
        }

        println!();
        println!("  {}", "Environment:".style(self.ctx.styles.bold));
        for var in ["ECSUP_CONFIG", "ECS_ACCESS_KEY_ID", "ECS_KEY_PAIR_NAME"] {
            println!(
                "    {:<24}{}",
                format!("{var}:"),
                std::env::var(var).unwrap_or_else(|_| "(not set)".to_string())
            );
        }
        for var in ["ECS_ACCESS_KEY_SECRET", "ECS_ROOT_PWD"] {
            let shown = if std::env::var(var).is_ok() {
                "(set)"
            } else {
                "(not set)"
            };
            println!("    {:<24}{shown}", format!("{var}:"));
        }
        println!();
    }
}

fn status_style(ctx: &OutputContext, status: InstanceStatus) -> owo_colors::Style {
    match status {
        InstanceStatus::Running => ctx.styles.success,
        InstanceStatus::Starting | InstanceStatus::Stopping => ctx.styles.warning,
        InstanceStatus::Stopped => ctx.styles.dim,
        InstanceStatus::Unknown => ctx.styles.error,
    }
}

// ── Display helpers (used by tests and output layer) ─────────────────────────

/// Table cells for each instance, numbered from 0 in listing order.
#[must_use]
pub fn instance_rows(instances: &[Instance]) -> Vec<[String; 7]> {
    instances
        .iter()
        .enumerate()
        .map(|(idx, i)| {
            [
                idx.to_string(),
                i.zone.clone(),
                i.id.clone(),
                i.instance_type.clone(),
                i.status.to_string(),
                i.address().unwrap_or("-").to_string(),
                i.created_at.clone(),
            ]
        })
        .collect()
}

/// Left-align `rows` under [`HEADERS`]; the first line is the header.
#[must_use]
pub fn format_table(rows: &[[String; 7]]) -> Vec<String> {
    format_columns(HEADERS, rows)
}

/// Left-align `rows` under `headers`; the first line is the header.
#[must_use]
pub fn format_columns<const N: usize>(headers: [&str; N], rows: &[[String; N]]) -> Vec<String> {
    let mut widths = headers.map(str::len);
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }
    let line = |cells: [&str; N]| {
        cells
            .iter()
            .zip(widths)
            .map(|(cell, w)| format!("{cell:<w$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };
    std::iter::once(line(headers))
        .chain(rows.iter().map(|r| line(std::array::from_fn(|i| r[i].as_str()))))
        .collect()
}

/// Table cells for each registered domain, numbered from 0.
#[must_use]
pub fn domain_rows(domains: &[RegisteredDomain]) -> Vec<[String; 5]> {
    domains
        .iter()
        .enumerate()
        .map(|(idx, d)| {
            [
                idx.to_string(),
                d.name.clone(),
                d.status_label().to_string(),
                d.kind.clone(),
                d.expires_at.clone(),
            ]
        })
        .collect()
}

/// One-line verdict for an availability check.
#[must_use]
pub fn check_summary(check: &DomainCheck) -> String {
    let mut line = format!("{}: {}", check.name, check.availability);
    if !check.reason.is_empty() {
        line.push_str(&format!(" ({})", check.reason));
    }
    if let Some(price) = check.price.filter(|_| check.availability.is_registrable()) {
        line.push_str(&format!(", {price} CNY for one year"));
    }
    line
}
