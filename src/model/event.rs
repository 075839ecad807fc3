use std::fmt;
use std::str::FromStr;

/// Severity class of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Success,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Success => "success",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kinds of events a notification channel can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    CpuThreshold,
    MemoryThreshold,
    ContainerStart,
    ContainerStop,
    ContainerRestart,
    Test,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::CpuThreshold => "cpu_threshold",
            EventType::MemoryThreshold => "memory_threshold",
            EventType::ContainerStart => "container_start",
            EventType::ContainerStop => "container_stop",
            EventType::ContainerRestart => "container_restart",
            EventType::Test => "test",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cpu_threshold" => Ok(EventType::CpuThreshold),
            "memory_threshold" => Ok(EventType::MemoryThreshold),
            "container_start" => Ok(EventType::ContainerStart),
            "container_stop" => Ok(EventType::ContainerStop),
            "container_restart" => Ok(EventType::ContainerRestart),
            "test" => Ok(EventType::Test),
            other => Err(format!("unknown event type `{other}`")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_names() {
        for event in [
            EventType::CpuThreshold,
            EventType::MemoryThreshold,
            EventType::ContainerStart,
            EventType::ContainerStop,
            EventType::ContainerRestart,
            EventType::Test,
        ] {
            assert_eq!(event.as_str().parse::<EventType>(), Ok(event));
            assert_eq!(
                serde_json::to_value(event).unwrap(),
                serde_json::Value::from(event.as_str())
            );
        }
        assert!("all".parse::<EventType>().is_err());
    }
}
