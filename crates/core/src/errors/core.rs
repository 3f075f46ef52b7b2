use thiserror::Error;

/// Core error type for the silo container
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Definition error for '{subject}': {message}")]
    Definition { subject: String, message: String },

    #[error("Type resolution failed for '{class_name}': {message}")]
    TypeResolution { class_name: String, message: String },

    #[error("Unsatisfied resolution: no enabled bean matches {request}")]
    UnsatisfiedResolution { request: String },

    #[error("Ambiguous resolution for {request}: candidates [{}]", .candidates.join(", "))]
    AmbiguousResolution {
        request: String,
        candidates: Vec<String>,
    },

    #[error("Context for scope '{scope}' does not allow '{operation}'")]
    ContextNotActive { scope: String, operation: String },

    #[error("Illegal state for '{operation}': container is {state}")]
    IllegalState { operation: String, state: String },

    #[error("Unknown scope: {scope}")]
    UnknownScope { scope: String },

    #[error("Lock error on resource: {resource}")]
    Lock { resource: String },

    #[error("Bean creation failed for '{bean}': {message}")]
    Creation { bean: String, message: String },

    #[error("Deployment failed with {} problem(s):\n{}", .problems.len(), format_problems(.problems))]
    Deployment { problems: Vec<ContainerError> },

    #[error("Context teardown completed with {} failure(s):\n{}", .failures.len(), format_problems(.failures))]
    Destruction { failures: Vec<ContainerError> },
}

fn format_problems(problems: &[ContainerError]) -> String {
    problems
        .iter()
        .enumerate()
        .map(|(i, p)| format!("  {}: {}", i + 1, p))
        .collect::<Vec<_>>()
        .join("\n")
}

impl ContainerError {
    /// Create a new definition error
    pub fn definition(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Definition {
            subject: subject.into(),
            message: message.into(),
        }
    }

    /// Create a new type resolution error
    pub fn type_resolution(class_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TypeResolution {
            class_name: class_name.into(),
            message: message.into(),
        }
    }

    /// Create a new unsatisfied resolution error
    pub fn unsatisfied(request: impl Into<String>) -> Self {
        Self::UnsatisfiedResolution {
            request: request.into(),
        }
    }

    /// Create a new ambiguous resolution error
    pub fn ambiguous(request: impl Into<String>, candidates: Vec<String>) -> Self {
        Self::AmbiguousResolution {
            request: request.into(),
            candidates,
        }
    }

    /// Create a new context-state error
    pub fn context_not_active(scope: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::ContextNotActive {
            scope: scope.into(),
            operation: operation.into(),
        }
    }

    /// Create a new illegal state error
    pub fn illegal_state(operation: impl Into<String>, state: impl Into<String>) -> Self {
        Self::IllegalState {
            operation: operation.into(),
            state: state.into(),
        }
    }

    /// Create a new lock error
    pub fn lock(resource: impl Into<String>) -> Self {
        Self::Lock {
            resource: resource.into(),
        }
    }

    /// Create a new creation error
    pub fn creation(bean: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Creation {
            bean: bean.into(),
            message: message.into(),
        }
    }

    /// Check if the error is a definition error. An unrecognized scope
    /// declaration is one: it can only come from a malformed descriptor.
    pub fn is_definition(&self) -> bool {
        matches!(
            self,
            Self::Definition { .. } | Self::TypeResolution { .. } | Self::UnknownScope { .. }
        )
    }

    /// Check if the error is a resolution error (unsatisfied or ambiguous)
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            Self::UnsatisfiedResolution { .. } | Self::AmbiguousResolution { .. }
        )
    }

    /// Check if the error is a context-state error
    pub fn is_context_not_active(&self) -> bool {
        matches!(self, Self::ContextNotActive { .. })
    }

    /// Check if the error is an aggregate deployment error
    pub fn is_deployment(&self) -> bool {
        matches!(self, Self::Deployment { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_predicates() {
        assert!(ContainerError::definition("Dog", "bad scope").is_definition());
        assert!(ContainerError::UnknownScope {
            scope: "galactic".into()
        }
        .is_definition());
        assert!(ContainerError::unsatisfied("Animal").is_resolution());
        assert!(ContainerError::ambiguous("Service", vec!["A".into(), "B".into()]).is_resolution());
        assert!(ContainerError::context_not_active("request", "get").is_context_not_active());
        assert!(!ContainerError::illegal_state("register", "closed").is_resolution());
    }

    #[test]
    fn test_deployment_display_lists_all_problems() {
        let error = ContainerError::Deployment {
            problems: vec![
                ContainerError::unsatisfied("Animal with [@Default]"),
                ContainerError::definition("Cat", "unknown scope"),
            ],
        };
        let rendered = error.to_string();
        assert!(rendered.contains("2 problem(s)"));
        assert!(rendered.contains("Animal with [@Default]"));
        assert!(rendered.contains("unknown scope"));
    }

    #[test]
    fn test_ambiguous_display_lists_candidates() {
        let error =
            ContainerError::ambiguous("Service", vec!["FastService".into(), "SlowService".into()]);
        let rendered = error.to_string();
        assert!(rendered.contains("FastService"));
        assert!(rendered.contains("SlowService"));
    }
}
