//! RDF type definitions
//!
//! Thin wrappers around the oxrdf primitives plus the closed [`Term`] enum that
//! every store and query consumer matches on.

use oxrdf::{
    BlankNode as OxBlankNode,
    Literal as OxLiteral,
    NamedNode as OxNamedNode,
    Variable as OxVariable,
};
use std::fmt;
use thiserror::Error;

/// RDF errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RdfError {
    /// Invalid IRI
    #[error("Invalid IRI: {0}")]
    InvalidIri(String),

    /// Invalid blank node
    #[error("Invalid blank node: {0}")]
    InvalidBlankNode(String),

    /// Invalid literal
    #[error("Invalid literal: {0}")]
    InvalidLiteral(String),

    /// Invalid variable name
    #[error("Invalid variable: {0}")]
    InvalidVariable(String),
}

pub type RdfResult<T> = Result<T, RdfError>;

/// Named node (IRI)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamedNode(OxNamedNode);

impl NamedNode {
    /// Create a new named node from an IRI string
    pub fn new(iri: impl Into<String>) -> RdfResult<Self> {
        OxNamedNode::new(iri)
            .map(Self)
            .map_err(|e| RdfError::InvalidIri(e.to_string()))
    }

    /// Get the IRI string
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for NamedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.as_str())
    }
}

impl From<OxNamedNode> for NamedNode {
    fn from(node: OxNamedNode) -> Self {
        Self(node)
    }
}

/// Blank node (anonymous node)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlankNode(OxBlankNode);

impl BlankNode {
    /// Create a new blank node with a unique identifier
    pub fn new() -> Self {
        Self(OxBlankNode::default())
    }

    /// Create a blank node from an identifier
    pub fn with_id(id: impl Into<String>) -> RdfResult<Self> {
        OxBlankNode::new(id)
            .map(Self)
            .map_err(|e| RdfError::InvalidBlankNode(e.to_string()))
    }

    /// Get the blank node identifier
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Default for BlankNode {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BlankNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_:{}", self.as_str())
    }
}

/// RDF literal value, optionally typed or language-tagged
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Literal(OxLiteral);

impl Literal {
    /// Create a simple literal (plain string)
    pub fn new_simple_literal(value: impl Into<String>) -> Self {
        Self(OxLiteral::new_simple_literal(value))
    }

    /// Create a literal with language tag
    pub fn new_language_tagged_literal(
        value: impl Into<String>,
        language: impl Into<String>,
    ) -> RdfResult<Self> {
        OxLiteral::new_language_tagged_literal(value, language)
            .map(Self)
            .map_err(|e| RdfError::InvalidLiteral(e.to_string()))
    }

    /// Create a typed literal
    pub fn new_typed_literal(value: impl Into<String>, datatype: NamedNode) -> Self {
        Self(OxLiteral::new_typed_literal(value, datatype.0))
    }

    /// Get the lexical value
    pub fn value(&self) -> &str {
        self.0.value()
    }

    /// Get the language tag if present
    pub fn language(&self) -> Option<&str> {
        self.0.language()
    }

    /// Get the datatype IRI
    pub fn datatype(&self) -> &str {
        self.0.datatype().as_str()
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<OxLiteral> for Literal {
    fn from(lit: OxLiteral) -> Self {
        Self(lit)
    }
}

/// Query variable (`?name`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Variable(OxVariable);

impl Variable {
    /// Create a variable from its name, without the leading `?`
    pub fn new(name: impl Into<String>) -> RdfResult<Self> {
        OxVariable::new(name)
            .map(Self)
            .map_err(|e| RdfError::InvalidVariable(e.to_string()))
    }

    /// Get the variable name
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.as_str())
    }
}

/// Any value that can sit in a triple or pattern position
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    /// Named node (IRI)
    NamedNode(NamedNode),
    /// Blank node
    BlankNode(BlankNode),
    /// Literal value
    Literal(Literal),
    /// Query variable; only valid inside patterns
    Variable(Variable),
}

impl Term {
    /// Build a named node term from an IRI
    pub fn iri(iri: impl Into<String>) -> RdfResult<Self> {
        NamedNode::new(iri).map(Term::NamedNode)
    }

    /// Build a simple literal term
    pub fn literal(value: impl Into<String>) -> Self {
        Term::Literal(Literal::new_simple_literal(value))
    }

    /// Build a variable term
    pub fn variable(name: impl Into<String>) -> RdfResult<Self> {
        Variable::new(name).map(Term::Variable)
    }

    pub fn is_named_node(&self) -> bool {
        matches!(self, Term::NamedNode(_))
    }

    pub fn is_blank_node(&self) -> bool {
        matches!(self, Term::BlankNode(_))
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Term::Literal(_))
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, Term::Variable(_))
    }

    /// The term itself when it is ground, `None` for a variable
    pub fn as_ground(&self) -> Option<&Term> {
        match self {
            Term::Variable(_) => None,
            other => Some(other),
        }
    }

    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            Term::Variable(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Term::Literal(l) => Some(l),
            _ => None,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::NamedNode(n) => write!(f, "{}", n),
            Term::BlankNode(b) => write!(f, "{}", b),
            Term::Literal(l) => write!(f, "{}", l),
            Term::Variable(v) => write!(f, "{}", v),
        }
    }
}

impl From<NamedNode> for Term {
    fn from(node: NamedNode) -> Self {
        Term::NamedNode(node)
    }
}

impl From<BlankNode> for Term {
    fn from(node: BlankNode) -> Self {
        Term::BlankNode(node)
    }
}

impl From<Literal> for Term {
    fn from(lit: Literal) -> Self {
        Term::Literal(lit)
    }
}

impl From<Variable> for Term {
    fn from(var: Variable) -> Self {
        Term::Variable(var)
    }
}

/// Triple position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    Subject,
    Predicate,
    Object,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Subject => write!(f, "subject"),
            Position::Predicate => write!(f, "predicate"),
            Position::Object => write!(f, "object"),
        }
    }
}

/// Why a triple cannot be stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TripleViolation {
    pub position: Position,
    pub reason: &'static str,
}

/// RDF triple (subject-predicate-object)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Triple {
    /// Subject
    pub subject: Term,
    /// Predicate
    pub predicate: Term,
    /// Object
    pub object: Term,
}

impl Triple {
    /// Create a new triple. Shape is checked by [`Triple::validate`] when stored.
    pub fn new(subject: impl Into<Term>, predicate: impl Into<Term>, object: impl Into<Term>) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }

    /// Check that the triple is ground and well-formed
    pub fn validate(&self) -> Result<(), TripleViolation> {
        match &self.subject {
            Term::NamedNode(_) | Term::BlankNode(_) => {}
            Term::Literal(_) => {
                return Err(TripleViolation {
                    position: Position::Subject,
                    reason: "must be an IRI or blank node, found a literal",
                })
            }
            Term::Variable(_) => {
                return Err(TripleViolation {
                    position: Position::Subject,
                    reason: "must be ground, found a variable",
                })
            }
        }
        match &self.predicate {
            Term::NamedNode(_) => {}
            Term::Variable(_) => {
                return Err(TripleViolation {
                    position: Position::Predicate,
                    reason: "must be ground, found a variable",
                })
            }
            Term::BlankNode(_) | Term::Literal(_) => {
                return Err(TripleViolation {
                    position: Position::Predicate,
                    reason: "must be an IRI",
                })
            }
        }
        if self.object.is_variable() {
            return Err(TripleViolation {
                position: Position::Object,
                reason: "must be ground, found a variable",
            });
        }
        Ok(())
    }

    pub fn get(&self, position: Position) -> &Term {
        match position {
            Position::Subject => &self.subject,
            Position::Predicate => &self.predicate,
            Position::Object => &self.object,
        }
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} .", self.subject, self.predicate, self.object)
    }
}

/// Triple pattern for queries; variable positions are wildcards
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TriplePattern {
    /// Subject
    pub subject: Term,
    /// Predicate
    pub predicate: Term,
    /// Object
    pub object: Term,
}

impl TriplePattern {
    /// Create a new triple pattern
    pub fn new(subject: impl Into<Term>, predicate: impl Into<Term>, object: impl Into<Term>) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }

    pub fn get(&self, position: Position) -> &Term {
        match position {
            Position::Subject => &self.subject,
            Position::Predicate => &self.predicate,
            Position::Object => &self.object,
        }
    }

    /// Positions in subject, predicate, object order
    pub fn positions(&self) -> [(Position, &Term); 3] {
        [
            (Position::Subject, &self.subject),
            (Position::Predicate, &self.predicate),
            (Position::Object, &self.object),
        ]
    }

    /// Number of positions holding a ground term
    pub fn ground_count(&self) -> usize {
        self.positions()
            .iter()
            .filter(|(_, term)| !term.is_variable())
            .count()
    }

    /// Variables of the pattern in position order (repeats included)
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.positions()
            .into_iter()
            .filter_map(|(_, term)| term.as_variable())
    }

    /// Check if a triple matches the ground positions of this pattern
    pub fn matches(&self, triple: &Triple) -> bool {
        self.positions()
            .iter()
            .all(|(position, term)| term.is_variable() || *term == triple.get(*position))
    }
}

impl fmt::Display for TriplePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} .", self.subject, self.predicate, self.object)
    }
}
