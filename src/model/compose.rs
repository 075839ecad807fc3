use std::fmt;
use std::str::FromStr;

use super::ContainerStatus;
use crate::container::ContainerID;

/// Aggregated status of a compose project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComposeStatus {
    Running,
    Partial,
    Stopped,
}

impl ComposeStatus {
    /// All services running means running, none running means stopped, anything else is partial.
    pub fn derive(services: &[ComposeService]) -> Self {
        let running = services.iter().filter(|s| s.status.is_running()).count();
        if running == 0 {
            ComposeStatus::Stopped
        } else if running == services.len() {
            ComposeStatus::Running
        } else {
            ComposeStatus::Partial
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposeService {
    pub name: String,
    pub status: ContainerStatus,
    pub image: String,
    pub ports: Vec<String>,
    pub container_id: Option<ContainerID>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposeProject {
    pub name: String,
    pub config_file: String,
    pub working_dir: String,
    pub status: ComposeStatus,
    pub services: Vec<ComposeService>,
}

impl ComposeProject {
    pub fn new(
        name: String,
        config_file: String,
        working_dir: String,
        services: Vec<ComposeService>,
    ) -> Self {
        Self {
            status: ComposeStatus::derive(&services),
            name,
            config_file,
            working_dir,
            services,
        }
    }
}

/// Project-scoped compose commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeAction {
    Up,
    Down,
    Restart,
}

impl ComposeAction {
    /// Arguments passed to the compose binary after the project selector.
    pub fn args(&self) -> &'static [&'static str] {
        match self {
            ComposeAction::Up => &["up", "-d"],
            ComposeAction::Down => &["down"],
            ComposeAction::Restart => &["restart"],
        }
    }
}

impl fmt::Display for ComposeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComposeAction::Up => "up",
            ComposeAction::Down => "down",
            ComposeAction::Restart => "restart",
        };
        write!(f, "{name}")
    }
}

impl FromStr for ComposeAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" | "start" => Ok(ComposeAction::Up),
            "down" | "stop" => Ok(ComposeAction::Down),
            "restart" => Ok(ComposeAction::Restart),
            other => Err(format!("unknown compose action `{other}`")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(status: ContainerStatus) -> ComposeService {
        ComposeService {
            name: "web".to_owned(),
            status,
            image: "nginx".to_owned(),
            ports: Vec::new(),
            container_id: None,
        }
    }

    #[test]
    fn test_derive_status() {
        assert_eq!(ComposeStatus::derive(&[]), ComposeStatus::Stopped);
        assert_eq!(
            ComposeStatus::derive(&[service(ContainerStatus::Running)]),
            ComposeStatus::Running
        );
        assert_eq!(
            ComposeStatus::derive(&[
                service(ContainerStatus::Running),
                service(ContainerStatus::Exited)
            ]),
            ComposeStatus::Partial
        );
        assert_eq!(
            ComposeStatus::derive(&[
                service(ContainerStatus::Exited),
                service(ContainerStatus::Stopped)
            ]),
            ComposeStatus::Stopped
        );
    }

    #[test]
    fn test_parse_action() {
        assert_eq!("up".parse::<ComposeAction>(), Ok(ComposeAction::Up));
        assert_eq!("stop".parse::<ComposeAction>(), Ok(ComposeAction::Down));
        assert!("explode".parse::<ComposeAction>().is_err());
    }
}
