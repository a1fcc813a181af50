//! Query algebra handed to the executor by the query-block parser

use super::expression::Expression;
use crate::rdf::{TriplePattern, Variable};

/// Algebra tree node
///
/// `Bgp`, `Join`, `Filter`, `Construct` and `Project` are evaluated. The
/// remaining kinds can be produced by a SPARQL parser but are rejected by the
/// executor before evaluation starts.
#[derive(Debug, Clone)]
pub enum Algebra {
    /// Basic graph pattern: conjunction of triple patterns
    Bgp { patterns: Vec<TriplePattern> },
    /// Join of two independently evaluated sub-patterns
    Join {
        left: Box<Algebra>,
        right: Box<Algebra>,
    },
    /// Keep solutions whose expression is true
    Filter {
        expression: Expression,
        inner: Box<Algebra>,
    },
    /// Instantiate a template once per solution; only valid at the root
    Construct {
        template: Vec<TriplePattern>,
        inner: Box<Algebra>,
    },
    /// Restrict solutions to the selected variables
    Project {
        variables: Vec<Variable>,
        inner: Box<Algebra>,
    },
    LeftJoin {
        left: Box<Algebra>,
        right: Box<Algebra>,
        expression: Option<Expression>,
    },
    Union {
        left: Box<Algebra>,
        right: Box<Algebra>,
    },
    Minus {
        left: Box<Algebra>,
        right: Box<Algebra>,
    },
    Distinct { inner: Box<Algebra> },
    Slice {
        inner: Box<Algebra>,
        start: usize,
        length: Option<usize>,
    },
}

impl Algebra {
    pub fn bgp(patterns: Vec<TriplePattern>) -> Self {
        Algebra::Bgp { patterns }
    }

    pub fn join(left: Algebra, right: Algebra) -> Self {
        Algebra::Join {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn filter(expression: Expression, inner: Algebra) -> Self {
        Algebra::Filter {
            expression,
            inner: Box::new(inner),
        }
    }

    pub fn construct(template: Vec<TriplePattern>, inner: Algebra) -> Self {
        Algebra::Construct {
            template,
            inner: Box::new(inner),
        }
    }

    pub fn project(variables: Vec<Variable>, inner: Algebra) -> Self {
        Algebra::Project {
            variables,
            inner: Box::new(inner),
        }
    }

    /// Operator name used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Algebra::Bgp { .. } => "BGP",
            Algebra::Join { .. } => "Join",
            Algebra::Filter { .. } => "Filter",
            Algebra::Construct { .. } => "Construct",
            Algebra::Project { .. } => "Project",
            Algebra::LeftJoin { .. } => "LeftJoin",
            Algebra::Union { .. } => "Union",
            Algebra::Minus { .. } => "Minus",
            Algebra::Distinct { .. } => "Distinct",
            Algebra::Slice { .. } => "Slice",
        }
    }

    /// Whether the executor evaluates this kind of node
    pub fn is_supported(&self) -> bool {
        matches!(
            self,
            Algebra::Bgp { .. }
                | Algebra::Join { .. }
                | Algebra::Filter { .. }
                | Algebra::Construct { .. }
                | Algebra::Project { .. }
        )
    }

    /// Direct children, left to right
    pub fn children(&self) -> Vec<&Algebra> {
        match self {
            Algebra::Bgp { .. } => Vec::new(),
            Algebra::Filter { inner, .. }
            | Algebra::Construct { inner, .. }
            | Algebra::Project { inner, .. }
            | Algebra::Distinct { inner }
            | Algebra::Slice { inner, .. } => vec![inner.as_ref()],
            Algebra::Join { left, right }
            | Algebra::LeftJoin { left, right, .. }
            | Algebra::Union { left, right }
            | Algebra::Minus { left, right } => vec![left.as_ref(), right.as_ref()],
        }
    }

    /// First node (pre-order) the executor cannot evaluate
    pub fn first_unsupported(&self) -> Option<&Algebra> {
        if !self.is_supported() {
            return Some(self);
        }
        self.children()
            .into_iter()
            .find_map(|child| child.first_unsupported())
    }

    /// Variables visible in the solutions this node produces, first-seen order
    pub fn variables(&self) -> Vec<Variable> {
        let mut out = Vec::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables(&self, out: &mut Vec<Variable>) {
        match self {
            Algebra::Bgp { patterns } => {
                for variable in patterns.iter().flat_map(TriplePattern::variables) {
                    if !out.contains(variable) {
                        out.push(variable.clone());
                    }
                }
            }
            Algebra::Project { variables, .. } => {
                for variable in variables {
                    if !out.contains(variable) {
                        out.push(variable.clone());
                    }
                }
            }
            Algebra::Construct { .. } => {}
            Algebra::Minus { left, .. } => left.collect_variables(out),
            other => {
                for child in other.children() {
                    child.collect_variables(out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::Term;

    fn var(name: &str) -> Term {
        Term::variable(name).unwrap()
    }

    fn iri(s: &str) -> Term {
        Term::iri(format!("http://example.org/{}", s)).unwrap()
    }

    #[test]
    fn test_variables_in_first_seen_order() {
        let algebra = Algebra::join(
            Algebra::bgp(vec![TriplePattern::new(var("x"), iri("p"), var("y"))]),
            Algebra::bgp(vec![TriplePattern::new(var("y"), iri("q"), var("z"))]),
        );
        let names: Vec<String> = algebra.variables().iter().map(|v| v.as_str().to_string()).collect();
        assert_eq!(names, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_first_unsupported_finds_nested_node() {
        let algebra = Algebra::project(
            vec![Variable::new("x").unwrap()],
            Algebra::Distinct {
                inner: Box::new(Algebra::bgp(vec![])),
            },
        );
        assert_eq!(algebra.first_unsupported().map(Algebra::kind), Some("Distinct"));

        let supported = Algebra::bgp(vec![]);
        assert!(supported.first_unsupported().is_none());
    }
}
