use std::fmt;

/// Non-fatal issues met while running the train.
/// These are reported to the user and execution continues.
#[derive(Debug, Clone, PartialEq)]
pub enum ReleaseWarning {
    /// A working copy had uncommitted changes to tracked files
    DirtyWorkingCopy { service: String, files: usize },
    /// The release the notes compare against could not be resolved
    PreviousLineageMissing { reason: String },
    /// A service could not be scanned and was left out of the notes
    ServiceSkipped { service: String, reason: String },
    /// No release tag was found in the lineage; the branch head was used
    MarkerFallback { service: String, lineage: String },
    /// There was nothing to commit for the version bump
    NothingToCommit { service: String },
}

impl ReleaseWarning {
    /// Name of the service the warning concerns, if any
    pub fn service(&self) -> Option<&str> {
        match self {
            ReleaseWarning::DirtyWorkingCopy { service, .. }
            | ReleaseWarning::ServiceSkipped { service, .. }
            | ReleaseWarning::MarkerFallback { service, .. }
            | ReleaseWarning::NothingToCommit { service } => Some(service),
            ReleaseWarning::PreviousLineageMissing { .. } => None,
        }
    }
}

impl fmt::Display for ReleaseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseWarning::DirtyWorkingCopy { service, files } => {
                write!(f, "{}: {} uncommitted change(s) in tracked files", service, files)
            }
            ReleaseWarning::PreviousLineageMissing { reason } => {
                write!(f, "No previous release branch to compare against: {}", reason)
            }
            ReleaseWarning::ServiceSkipped { service, reason } => {
                write!(f, "{}: skipped in release notes ({})", service, reason)
            }
            ReleaseWarning::MarkerFallback { service, lineage } => {
                write!(
                    f,
                    "{}: no release tag in '{}', using the branch head instead",
                    service, lineage
                )
            }
            ReleaseWarning::NothingToCommit { service } => {
                write!(f, "{}: nothing to commit, version already up to date", service)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_accessor() {
        let warning = ReleaseWarning::NothingToCommit {
            service: "billing".to_string(),
        };
        assert_eq!(warning.service(), Some("billing"));

        let warning = ReleaseWarning::PreviousLineageMissing {
            reason: "release-11 not found".to_string(),
        };
        assert_eq!(warning.service(), None);
    }
}
