//! Mapping of the runtime CLI's templated text output.
//!
//! Every CLI call uses a fixed `--format` template with `|` separated fields, one entity per
//! line. Empty output is an empty collection and missing trailing fields are empty strings.
use std::path::Path;

use serde::Deserialize;

use super::{
    ParseError, Result, map_status, parse_cli_timestamp, parse_memory_usage, parse_percent,
    parse_size, parse_uptime, split_fields,
};
use crate::container::ContainerID;
use crate::metrics::PrecomputedStats;
use crate::model::{
    ComposeProject, ComposeService, ContainerSnapshot, ImageSnapshot, PruneReport, RuntimeVersion,
};

pub const CONTAINER_FORMAT: &str =
    "{{.ID}}|{{.Names}}|{{.Image}}|{{.Status}}|{{.State}}|{{.CreatedAt}}|{{.Ports}}";
pub const STATS_FORMAT: &str = "{{.CPUPerc}}|{{.MemUsage}}";
pub const IMAGE_FORMAT: &str = "{{.ID}}|{{.Repository}}|{{.Tag}}|{{.Size}}|{{.CreatedAt}}";
pub const COMPOSE_SERVICE_FORMAT: &str = "{{.Service}}|{{.State}}|{{.Image}}|{{.Ports}}|{{.ID}}";
pub const VERSION_FORMAT: &str =
    "{{.Server.Version}}|{{.Server.APIVersion}}|{{.Server.Os}}|{{.Server.Arch}}";

fn lines(output: &str) -> impl Iterator<Item = (usize, &str)> {
    output
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
}

fn malformed(line: usize, content: &str, reason: impl ToString) -> ParseError {
    ParseError::MalformedLine {
        line,
        content: content.to_owned(),
        reason: reason.to_string(),
    }
}

fn split_ports(ports: &str) -> Vec<String> {
    ports
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Parses `docker ps --format` output using [`CONTAINER_FORMAT`].
pub fn containers(output: &str) -> Result<Vec<ContainerSnapshot>> {
    let mut out = Vec::new();
    for (number, line) in lines(output) {
        let fields = split_fields(line, '|', 7);
        let id = ContainerID::new(fields[0]).map_err(|err| malformed(number, line, err))?;
        let name = fields[1].split(',').next().unwrap_or_default().to_owned();

        out.push(ContainerSnapshot {
            id,
            name,
            image: fields[2].to_owned(),
            image_id: None,
            status: map_status(fields[4]),
            uptime: parse_uptime(fields[3]),
            status_text: fields[3].to_owned(),
            created: parse_cli_timestamp(fields[5]),
            ports: split_ports(fields[6]),
            labels: Default::default(),
            cpu_percent: 0.0,
            memory_usage: "0B".to_owned(),
            memory_limit: "0B".to_owned(),
        });
    }
    Ok(out)
}

/// Parses `docker stats --no-stream --format` output using [`STATS_FORMAT`].
pub fn stats(output: &str) -> Result<PrecomputedStats> {
    let (number, line) = lines(output)
        .next()
        .ok_or_else(|| malformed(0, output, "empty stats output"))?;
    let fields = split_fields(line, '|', 2);
    let cpu_percent = parse_percent(fields[0]).map_err(|err| malformed(number, line, err))?;
    let (memory_usage, memory_limit) =
        parse_memory_usage(fields[1]).map_err(|err| malformed(number, line, err))?;

    Ok(PrecomputedStats {
        cpu_percent,
        memory_usage,
        memory_limit,
    })
}

/// Parses `docker images --format` output using [`IMAGE_FORMAT`].
pub fn images(output: &str) -> Result<Vec<ImageSnapshot>> {
    let mut out = Vec::new();
    for (number, line) in lines(output) {
        let fields = split_fields(line, '|', 5);
        if fields[0].is_empty() {
            return Err(malformed(number, line, "missing image id"));
        }
        let size = if fields[3].is_empty() {
            0
        } else {
            parse_size(fields[3]).map_err(|err| malformed(number, line, err))?
        };
        out.push(ImageSnapshot {
            id: super::socket::short_image_id(fields[0]),
            repository: fields[1].to_owned(),
            tag: fields[2].to_owned(),
            size,
            created: parse_cli_timestamp(fields[4]),
            in_use: false,
        });
    }
    Ok(out)
}

/// Parses the output of `docker image prune -f`.
///
/// The CLI prints one `deleted: sha256:...` line per removed layer owner and a trailing
/// `Total reclaimed space: 1.2GB` line.
pub fn prune_report(output: &str) -> Result<PruneReport> {
    let mut report = PruneReport::default();
    for (number, line) in lines(output) {
        if line.to_lowercase().starts_with("deleted:") {
            report.images_deleted += 1;
        } else if let Some(space) = line.strip_prefix("Total reclaimed space:") {
            report.space_reclaimed =
                parse_size(space).map_err(|err| malformed(number, line, err))?;
        }
    }
    Ok(report)
}

/// Parses `docker version --format` output using [`VERSION_FORMAT`].
pub fn version(output: &str) -> Result<RuntimeVersion> {
    let (_, line) = lines(output)
        .next()
        .ok_or_else(|| malformed(0, output, "empty version output"))?;
    let fields = split_fields(line, '|', 4);
    Ok(RuntimeVersion {
        version: fields[0].to_owned(),
        api_version: fields[1].to_owned(),
        os: fields[2].to_owned(),
        arch: fields[3].to_owned(),
    })
}

/// One entry of `docker compose ls --format json`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ComposeListing {
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub config_files: String,
}

impl ComposeListing {
    /// The first config file; compose lists several separated by commas.
    pub fn config_file(&self) -> &str {
        self.config_files
            .split(',')
            .next()
            .unwrap_or_default()
            .trim()
    }

    pub fn working_dir(&self) -> String {
        Path::new(self.config_file())
            .parent()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    }
}

/// Parses `docker compose ls --all --format json` output.
pub fn compose_listing(output: &str) -> Result<Vec<ComposeListing>> {
    let output = output.trim();
    if output.is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(output)?)
}

/// Parses project-scoped `compose ps --format` output using [`COMPOSE_SERVICE_FORMAT`].
pub fn compose_services(output: &str) -> Result<Vec<ComposeService>> {
    let mut out = Vec::new();
    for (number, line) in lines(output) {
        let fields = split_fields(line, '|', 5);
        if fields[0].is_empty() {
            return Err(malformed(number, line, "missing service name"));
        }
        let container_id = if fields[4].is_empty() {
            None
        } else {
            Some(ContainerID::new(fields[4]).map_err(|err| malformed(number, line, err))?)
        };
        out.push(ComposeService {
            name: fields[0].to_owned(),
            status: map_status(fields[1]),
            image: fields[2].to_owned(),
            ports: split_ports(fields[3]),
            container_id,
        });
    }
    Ok(out)
}

/// Combines a listing entry with its services.
pub fn compose_project(listing: &ComposeListing, services: Vec<ComposeService>) -> ComposeProject {
    ComposeProject::new(
        listing.name.clone(),
        listing.config_file().to_owned(),
        listing.working_dir(),
        services,
    )
}
