//! Deployment validation
//!
//! After the registry closes, every enabled bean's injection points are
//! resolved against the final bean set. Violations never short-circuit the
//! walk; they accumulate into a [`ValidationReport`] so one deployment
//! failure surfaces every problem at once.

use crate::container::registry::BeanRegistry;
use crate::container::resolver::{Resolution, Resolver};
use crate::errors::ContainerError;
use tracing::{debug, warn};

/// Accumulated outcome of the validation walk
#[derive(Debug, Default)]
pub struct ValidationReport {
    problems: Vec<ContainerError>,
    beans_checked: usize,
    points_checked: usize,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn problems(&self) -> &[ContainerError] {
        &self.problems
    }

    /// Record a problem found outside the injection-point walk, such as a
    /// definition error collected during discovery processing
    pub fn add_problem(&mut self, problem: ContainerError) {
        self.problems.push(problem);
    }

    pub fn beans_checked(&self) -> usize {
        self.beans_checked
    }

    pub fn points_checked(&self) -> usize {
        self.points_checked
    }

    /// Convert into a result: a clean report passes, anything else becomes
    /// one aggregate deployment error
    pub fn into_result(self) -> Result<(), ContainerError> {
        if self.problems.is_empty() {
            Ok(())
        } else {
            Err(ContainerError::Deployment {
                problems: self.problems,
            })
        }
    }
}

/// Walk the whole deployment and collect every violation
pub fn validate(registry: &BeanRegistry, resolver: &Resolver) -> ValidationReport {
    let mut report = ValidationReport::default();

    for bean in registry.enabled_beans() {
        report.beans_checked += 1;
        for point in bean.injection_points() {
            report.points_checked += 1;
            match resolver.lookup(point.required_type(), point.qualifiers()) {
                Ok(Resolution::Resolved(_)) => {}
                Ok(Resolution::Unsatisfied) => {
                    report.problems.push(ContainerError::unsatisfied(format!(
                        "{} required by {}",
                        point,
                        bean.bean_class()
                    )));
                }
                Ok(Resolution::Ambiguous(candidates)) => {
                    report.problems.push(ContainerError::ambiguous(
                        format!("{} required by {}", point, bean.bean_class()),
                        candidates
                            .iter()
                            .map(|c| c.bean_class().to_string())
                            .collect(),
                    ));
                }
                Err(error) => report.problems.push(error),
            }
        }
    }

    // Two enabled beans must not share a name.
    for (name, holders) in registry.names() {
        if holders.len() > 1 {
            let classes: Vec<String> = holders
                .iter()
                .map(|b| b.bean_class().to_string())
                .collect();
            report.problems.push(ContainerError::definition(
                name,
                format!("bean name is declared by multiple enabled beans: {}", classes.join(", ")),
            ));
        }
    }

    if report.is_clean() {
        debug!(
            beans = report.beans_checked,
            injection_points = report.points_checked,
            "deployment validation passed"
        );
    } else {
        warn!(
            problems = report.problems.len(),
            "deployment validation failed"
        );
    }
    report
}
