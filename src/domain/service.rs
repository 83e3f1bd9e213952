use std::fmt;
use std::path::PathBuf;

/// How a service takes part in pipeline dispatch
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConcurrencyClass {
    /// Dispatched alone, strictly after the services listed before it
    Sequential,
    /// Dispatched concurrently with the other members of the named group
    Group(String),
}

impl fmt::Display for ConcurrencyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConcurrencyClass::Sequential => write!(f, "sequential"),
            ConcurrencyClass::Group(name) => write!(f, "group '{}'", name),
        }
    }
}

/// One repository of the fleet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub name: String,
    /// Working copy of the repository
    pub directory: PathBuf,
    /// Path of the project on the CI server (e.g. `backend/billing`)
    pub project: String,
    pub class: ConcurrencyClass,
    /// Sub-directories built and installed before the service itself
    pub prebuild: Vec<String>,
}

impl Service {
    pub fn new(
        name: impl Into<String>,
        directory: impl Into<PathBuf>,
        project: impl Into<String>,
        class: ConcurrencyClass,
    ) -> Self {
        Service {
            name: name.into(),
            directory: directory.into(),
            project: project.into(),
            class,
            prebuild: Vec::new(),
        }
    }

    pub fn is_sequential(&self) -> bool {
        self.class == ConcurrencyClass::Sequential
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_service() {
        let service = Service::new("bom", "/srv/bom", "platform/bom", ConcurrencyClass::Sequential);
        assert!(service.is_sequential());
        assert!(service.prebuild.is_empty());
    }

    #[test]
    fn test_group_display() {
        let class = ConcurrencyClass::Group("backend".to_string());
        assert_eq!(class.to_string(), "group 'backend'");
        assert_eq!(ConcurrencyClass::Sequential.to_string(), "sequential");
    }
}
