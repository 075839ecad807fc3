//! Mapping of the runtime HTTP API's JSON payloads.
use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

use super::{Result, format_port, from_unix_seconds, map_status, parse_uptime};
use crate::container::ContainerID;
use crate::metrics::{CpuCounters, NetworkTotals, StatsCounters};
use crate::model::{
    ComposeProject, ComposeService, ContainerSnapshot, ImageSnapshot, PruneReport, RuntimeVersion,
};

const COMPOSE_PROJECT_LABEL: &str = "com.docker.compose.project";
const COMPOSE_SERVICE_LABEL: &str = "com.docker.compose.service";
const COMPOSE_CONFIG_LABEL: &str = "com.docker.compose.project.config_files";
const COMPOSE_WORKING_DIR_LABEL: &str = "com.docker.compose.project.working_dir";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiPort {
    #[serde(rename = "IP", default)]
    ip: Option<String>,
    private_port: u16,
    #[serde(default)]
    public_port: Option<u16>,
    #[serde(rename = "Type", default)]
    proto: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiContainer {
    id: String,
    #[serde(default)]
    names: Vec<String>,
    #[serde(default)]
    image: String,
    #[serde(rename = "ImageID", default)]
    image_id: Option<String>,
    #[serde(default)]
    created: i64,
    #[serde(default)]
    ports: Option<Vec<ApiPort>>,
    #[serde(default)]
    labels: Option<BTreeMap<String, String>>,
    #[serde(default)]
    state: String,
    #[serde(default)]
    status: String,
}

/// Maps a `GET /containers/json` payload.
pub fn containers(payload: &[u8]) -> Result<Vec<ContainerSnapshot>> {
    let raw: Vec<ApiContainer> = serde_json::from_slice(payload)?;
    raw.into_iter().map(container).collect()
}

fn container(raw: ApiContainer) -> Result<ContainerSnapshot> {
    let name = raw
        .names
        .first()
        .map(|n| n.trim_start_matches('/').to_owned())
        .unwrap_or_default();
    let raw_ports = raw.ports.unwrap_or_default();
    let mut ports: Vec<String> = Vec::with_capacity(raw_ports.len());
    for port in &raw_ports {
        let formatted = format_port(
            port.ip.as_deref(),
            port.public_port,
            port.private_port,
            &port.proto,
        );
        if !ports.contains(&formatted) {
            ports.push(formatted);
        }
    }

    Ok(ContainerSnapshot {
        id: ContainerID::new(&raw.id)?,
        name,
        image: raw.image,
        image_id: raw.image_id,
        status: map_status(&raw.state),
        uptime: parse_uptime(&raw.status),
        status_text: raw.status,
        created: from_unix_seconds(raw.created),
        ports,
        labels: raw.labels.unwrap_or_default(),
        cpu_percent: 0.0,
        memory_usage: "0B".to_owned(),
        memory_limit: "0B".to_owned(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ApiCpuUsage {
    #[serde(default)]
    total_usage: u64,
    #[serde(default)]
    percpu_usage: Option<Vec<u64>>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiCpuStats {
    #[serde(default)]
    cpu_usage: ApiCpuUsage,
    #[serde(default)]
    system_cpu_usage: Option<u64>,
    #[serde(default)]
    online_cpus: Option<u32>,
}

impl ApiCpuStats {
    fn counters(&self) -> Option<CpuCounters> {
        Some(CpuCounters {
            total_usage: self.cpu_usage.total_usage,
            system_usage: self.system_cpu_usage?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct ApiMemoryStats {
    #[serde(default)]
    usage: u64,
    #[serde(default)]
    limit: u64,
    #[serde(default)]
    stats: Option<HashMap<String, u64>>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiNetworkStats {
    #[serde(default)]
    rx_bytes: u64,
    #[serde(default)]
    rx_packets: u64,
    #[serde(default)]
    tx_bytes: u64,
    #[serde(default)]
    tx_packets: u64,
}

#[derive(Debug, Deserialize)]
struct ApiStats {
    #[serde(default)]
    cpu_stats: ApiCpuStats,
    #[serde(default)]
    precpu_stats: ApiCpuStats,
    #[serde(default)]
    memory_stats: ApiMemoryStats,
    #[serde(default)]
    networks: Option<HashMap<String, ApiNetworkStats>>,
}

/// Maps a `GET /containers/{id}/stats?stream=false` payload onto raw counters.
///
/// Page cache is subtracted from the memory usage (`inactive_file` on cgroup v2, `cache` on v1)
/// so the figure matches what the CLI reports.
pub fn stats(payload: &[u8]) -> Result<StatsCounters> {
    let raw: ApiStats = serde_json::from_slice(payload)?;

    let online_cpus = raw
        .cpu_stats
        .online_cpus
        .filter(|n| *n > 0)
        .or_else(|| {
            raw.cpu_stats
                .cpu_usage
                .percpu_usage
                .as_ref()
                .map(|per_cpu| per_cpu.len() as u32)
        })
        .unwrap_or(1);

    let cache = raw
        .memory_stats
        .stats
        .as_ref()
        .and_then(|stats| stats.get("inactive_file").or_else(|| stats.get("cache")))
        .copied()
        .unwrap_or(0);

    let mut network = NetworkTotals::default();
    for iface in raw.networks.unwrap_or_default().values() {
        network += NetworkTotals {
            rx_bytes: iface.rx_bytes,
            rx_packets: iface.rx_packets,
            tx_bytes: iface.tx_bytes,
            tx_packets: iface.tx_packets,
        };
    }

    Ok(StatsCounters {
        cpu: raw.cpu_stats.counters().unwrap_or_default(),
        precpu: raw.precpu_stats.counters(),
        online_cpus,
        memory_usage: raw.memory_stats.usage.saturating_sub(cache),
        memory_limit: raw.memory_stats.limit,
        network,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiImage {
    id: String,
    #[serde(default)]
    repo_tags: Option<Vec<String>>,
    #[serde(default)]
    created: i64,
    #[serde(default)]
    size: i64,
}

/// Maps a `GET /images/json` payload. `in_use` is left unset; it needs the container set.
pub fn images(payload: &[u8]) -> Result<Vec<ImageSnapshot>> {
    let raw: Vec<ApiImage> = serde_json::from_slice(payload)?;
    let mut out = Vec::with_capacity(raw.len());
    for image in raw {
        let id = short_image_id(&image.id);
        let tags = image.repo_tags.unwrap_or_default();
        let (repository, tag) = tags
            .iter()
            .find(|t| t.as_str() != "<none>:<none>")
            .and_then(|t| t.rsplit_once(':'))
            .map(|(repo, tag)| (repo.to_owned(), tag.to_owned()))
            .unwrap_or_else(|| ("<none>".to_owned(), "<none>".to_owned()));

        out.push(ImageSnapshot {
            id,
            repository,
            tag,
            size: image.size.max(0) as u64,
            created: from_unix_seconds(image.created),
            in_use: false,
        });
    }
    Ok(out)
}

pub(crate) fn short_image_id(id: &str) -> String {
    let id = id.strip_prefix("sha256:").unwrap_or(id);
    id.chars().take(crate::container::SHORT_ID_LEN).collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiPruneResponse {
    #[serde(default)]
    images_deleted: Option<Vec<HashMap<String, String>>>,
    #[serde(default)]
    space_reclaimed: u64,
}

/// Maps a `POST /images/prune` payload.
pub fn prune_report(payload: &[u8]) -> Result<PruneReport> {
    let raw: ApiPruneResponse = serde_json::from_slice(payload)?;
    let images_deleted = raw
        .images_deleted
        .unwrap_or_default()
        .iter()
        .filter(|entry| entry.contains_key("Deleted"))
        .count();
    Ok(PruneReport {
        images_deleted,
        space_reclaimed: raw.space_reclaimed,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiVersion {
    #[serde(default)]
    version: String,
    #[serde(default)]
    api_version: String,
    #[serde(default)]
    os: String,
    #[serde(default)]
    arch: String,
}

/// Maps a `GET /version` payload.
pub fn version(payload: &[u8]) -> Result<RuntimeVersion> {
    let raw: ApiVersion = serde_json::from_slice(payload)?;
    Ok(RuntimeVersion {
        version: raw.version,
        api_version: raw.api_version,
        os: raw.os,
        arch: raw.arch,
    })
}

/// Groups containers into compose projects by their `com.docker.compose.*` labels.
///
/// Projects are returned sorted by name.
pub fn compose_projects(containers: &[ContainerSnapshot]) -> Vec<ComposeProject> {
    let mut grouped: BTreeMap<&str, Vec<&ContainerSnapshot>> = BTreeMap::new();
    for container in containers {
        if let Some(project) = container.labels.get(COMPOSE_PROJECT_LABEL) {
            grouped.entry(project.as_str()).or_default().push(container);
        }
    }

    grouped
        .into_iter()
        .map(|(name, members)| {
            let label = |key: &str| {
                members
                    .iter()
                    .find_map(|c| c.labels.get(key))
                    .cloned()
                    .unwrap_or_default()
            };
            let config_file = label(COMPOSE_CONFIG_LABEL);
            let working_dir = label(COMPOSE_WORKING_DIR_LABEL);
            let services = members
                .iter()
                .map(|c| ComposeService {
                    name: c
                        .labels
                        .get(COMPOSE_SERVICE_LABEL)
                        .cloned()
                        .unwrap_or_else(|| c.name.clone()),
                    status: c.status,
                    image: c.image.clone(),
                    ports: c.ports.clone(),
                    container_id: Some(c.id.clone()),
                })
                .collect();
            ComposeProject::new(name.to_owned(), config_file, working_dir, services)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ComposeStatus, ContainerStatus};

    const CONTAINERS: &str = r#"[
        {
            "Id": "8dfafdbc3a40b4c1e4d3a1ad4ee8c8ad3c8a1fa7e1d6d3fb8f1c3b7e1c2d3e4f",
            "Names": ["/web"],
            "Image": "nginx:latest",
            "ImageID": "sha256:605c77e624ddb75e6110f997c58876baa13f8754486b461117934b24a9dc3a85",
            "Created": 1705140000,
            "Ports": [
                {"IP": "0.0.0.0", "PrivatePort": 80, "PublicPort": 8080, "Type": "tcp"},
                {"IP": "0.0.0.0", "PrivatePort": 80, "PublicPort": 8080, "Type": "tcp"},
                {"PrivatePort": 443, "Type": "tcp"}
            ],
            "Labels": {
                "com.docker.compose.project": "shop",
                "com.docker.compose.service": "frontend",
                "com.docker.compose.project.config_files": "/srv/shop/compose.yml",
                "com.docker.compose.project.working_dir": "/srv/shop"
            },
            "State": "running",
            "Status": "Up 2 hours"
        },
        {
            "Id": "1111111111112222222222223333333333334444444444445555555555556666",
            "Names": ["/db"],
            "Image": "postgres:16",
            "Created": 1705140000,
            "Ports": [],
            "Labels": {
                "com.docker.compose.project": "shop",
                "com.docker.compose.service": "db"
            },
            "State": "exited",
            "Status": "Exited (0) 5 minutes ago"
        },
        {
            "Id": "aaaaaaaaaaaabbbbbbbbbbbb",
            "Names": ["/lonely"],
            "Image": "busybox",
            "Created": 0,
            "Labels": null,
            "State": "created",
            "Status": "Created"
        }
    ]"#;

    #[test]
    fn test_containers() {
        let containers = containers(CONTAINERS.as_bytes()).unwrap();
        assert_eq!(containers.len(), 3);

        let web = &containers[0];
        assert_eq!(web.id.as_str(), "8dfafdbc3a40");
        assert_eq!(web.name, "web");
        assert_eq!(web.status, ContainerStatus::Running);
        assert_eq!(web.uptime, "2 hours");
        assert_eq!(web.ports, vec!["0.0.0.0:8080->80/tcp", "443/tcp"]);
        assert_eq!(web.created.unwrap().timestamp(), 1705140000);

        let lonely = &containers[2];
        assert_eq!(lonely.status, ContainerStatus::Stopped);
        assert_eq!(lonely.uptime, "-");
        assert!(lonely.created.is_none());
        assert!(lonely.labels.is_empty());
    }

    #[test]
    fn test_compose_projects_from_labels() {
        let containers = containers(CONTAINERS.as_bytes()).unwrap();
        let projects = compose_projects(&containers);
        assert_eq!(projects.len(), 1);
        let shop = &projects[0];
        assert_eq!(shop.name, "shop");
        assert_eq!(shop.config_file, "/srv/shop/compose.yml");
        assert_eq!(shop.working_dir, "/srv/shop");
        assert_eq!(shop.status, ComposeStatus::Partial);
        let names: Vec<&str> = shop.services.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["frontend", "db"]);
    }

    #[test]
    fn test_stats() {
        let payload = r#"{
            "cpu_stats": {
                "cpu_usage": {"total_usage": 400, "percpu_usage": [100, 100, 100, 100]},
                "system_cpu_usage": 10000
            },
            "precpu_stats": {
                "cpu_usage": {"total_usage": 300},
                "system_cpu_usage": 9000
            },
            "memory_stats": {
                "usage": 2048,
                "limit": 4096,
                "stats": {"inactive_file": 1024}
            },
            "networks": {
                "eth0": {"rx_bytes": 100, "tx_bytes": 200, "rx_packets": 1, "tx_packets": 2},
                "eth1": {"rx_bytes": 10, "tx_bytes": 20, "rx_packets": 3, "tx_packets": 4}
            }
        }"#;
        let stats = stats(payload.as_bytes()).unwrap();
        assert_eq!(stats.online_cpus, 4);
        assert_eq!(
            stats.cpu,
            CpuCounters {
                total_usage: 400,
                system_usage: 10000
            }
        );
        assert_eq!(
            stats.precpu,
            Some(CpuCounters {
                total_usage: 300,
                system_usage: 9000
            })
        );
        assert_eq!(stats.memory_usage, 1024);
        assert_eq!(stats.memory_limit, 4096);
        assert_eq!(stats.network.rx_bytes, 110);
        assert_eq!(stats.network.tx_bytes, 220);
        assert_eq!(stats.network.rx_packets, 4);
        assert_eq!(stats.network.tx_packets, 6);
    }

    #[test]
    fn test_stats_of_stopped_container() {
        let payload = r#"{"cpu_stats": {"cpu_usage": {"total_usage": 0}}, "precpu_stats": {}, "memory_stats": {}}"#;
        let stats = stats(payload.as_bytes()).unwrap();
        assert_eq!(stats.online_cpus, 1);
        assert_eq!(stats.precpu, None);
        assert_eq!(stats.network, NetworkTotals::default());
    }

    #[test]
    fn test_images() {
        let payload = r#"[
            {"Id": "sha256:605c77e624ddb75e6110f997c58876baa13f8754486b461117934b24a9dc3a85",
             "RepoTags": ["nginx:latest"], "Created": 1705140000, "Size": 187000000},
            {"Id": "sha256:0123456789abcdef", "RepoTags": null, "Created": 1705140000, "Size": 10},
            {"Id": "sha256:feedfeedfeedfeed", "RepoTags": ["localhost:5000/app:1.2"], "Created": 1, "Size": 1}
        ]"#;
        let images = images(payload.as_bytes()).unwrap();
        assert_eq!(images[0].id, "605c77e624dd");
        assert_eq!(images[0].repository, "nginx");
        assert_eq!(images[0].tag, "latest");
        assert_eq!(images[0].size, 187000000);
        assert_eq!(images[1].repository, "<none>");
        assert_eq!(images[2].repository, "localhost:5000/app");
        assert_eq!(images[2].tag, "1.2");
    }

    #[test]
    fn test_prune_report() {
        let payload = r#"{"ImagesDeleted": [{"Untagged": "a"}, {"Deleted": "sha256:1"}, {"Deleted": "sha256:2"}], "SpaceReclaimed": 4096}"#;
        let report = prune_report(payload.as_bytes()).unwrap();
        assert_eq!(report.images_deleted, 2);
        assert_eq!(report.space_reclaimed, 4096);

        let report = prune_report(br#"{"ImagesDeleted": null, "SpaceReclaimed": 0}"#).unwrap();
        assert_eq!(report, PruneReport::default());
    }

    #[test]
    fn test_unexpected_shape_is_parse_error() {
        assert!(matches!(
            containers(br#"{"message": "nope"}"#),
            Err(crate::normalize::ParseError::Json(_))
        ));
    }
}
