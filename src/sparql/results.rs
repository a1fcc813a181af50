//! SPARQL query results

use super::binding::QuerySolution;
use crate::rdf::{Term, Triple, Variable};
use indexmap::IndexSet;
use rustc_hash::{FxBuildHasher, FxHashSet};
use serde_json::{json, Map, Value};

const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";

/// SPARQL query results
#[derive(Debug, Clone, PartialEq)]
pub enum SparqlResults {
    /// Solution sequence from a SELECT-shaped tree
    Bindings {
        /// Projected (or visible) variables, in order
        variables: Vec<Variable>,
        /// Solutions
        solutions: Vec<QuerySolution>,
    },

    /// Triples from a CONSTRUCT root
    Graph(Vec<Triple>),
}

impl SparqlResults {
    /// Number of solutions or triples
    pub fn len(&self) -> usize {
        match self {
            SparqlResults::Bindings { solutions, .. } => solutions.len(),
            SparqlResults::Graph(triples) => triples.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Solutions, or `None` for a graph result
    pub fn solutions(&self) -> Option<&[QuerySolution]> {
        match self {
            SparqlResults::Bindings { solutions, .. } => Some(solutions),
            SparqlResults::Graph(_) => None,
        }
    }

    /// Triples, or `None` for a bindings result
    pub fn triples(&self) -> Option<&[Triple]> {
        match self {
            SparqlResults::Graph(triples) => Some(triples),
            SparqlResults::Bindings { .. } => None,
        }
    }

    /// Drop duplicate solutions or triples, keeping first occurrences
    pub fn into_distinct(self) -> Self {
        match self {
            SparqlResults::Bindings { variables, solutions } => {
                let mut seen: FxHashSet<Vec<(String, Term)>> = FxHashSet::default();
                let solutions = solutions
                    .into_iter()
                    .filter(|solution| {
                        let mut key: Vec<(String, Term)> = solution
                            .iter()
                            .map(|(name, term)| (name.to_string(), term.clone()))
                            .collect();
                        key.sort_by(|a, b| a.0.cmp(&b.0));
                        seen.insert(key)
                    })
                    .collect();
                SparqlResults::Bindings { variables, solutions }
            }
            SparqlResults::Graph(triples) => {
                let unique: IndexSet<Triple, FxBuildHasher> = triples.into_iter().collect();
                SparqlResults::Graph(unique.into_iter().collect())
            }
        }
    }

    /// Serialize in the W3C SPARQL 1.1 query results JSON shape
    ///
    /// Graph results use the same term encoding, one object per triple.
    pub fn to_json(&self) -> Value {
        match self {
            SparqlResults::Bindings { variables, solutions } => {
                let vars: Vec<&str> = variables.iter().map(Variable::as_str).collect();
                let bindings: Vec<Value> = solutions
                    .iter()
                    .map(|solution| {
                        let row: Map<String, Value> = solution
                            .iter()
                            .map(|(name, term)| (name.to_string(), term_to_json(term)))
                            .collect();
                        Value::Object(row)
                    })
                    .collect();
                json!({
                    "head": { "vars": vars },
                    "results": { "bindings": bindings },
                })
            }
            SparqlResults::Graph(triples) => {
                let triples: Vec<Value> = triples
                    .iter()
                    .map(|t| {
                        json!({
                            "subject": term_to_json(&t.subject),
                            "predicate": term_to_json(&t.predicate),
                            "object": term_to_json(&t.object),
                        })
                    })
                    .collect();
                json!({ "triples": triples })
            }
        }
    }
}

fn term_to_json(term: &Term) -> Value {
    match term {
        Term::NamedNode(n) => json!({ "type": "uri", "value": n.as_str() }),
        Term::BlankNode(b) => json!({ "type": "bnode", "value": b.as_str() }),
        Term::Literal(l) => {
            let mut object = Map::new();
            object.insert("type".into(), json!("literal"));
            object.insert("value".into(), json!(l.value()));
            if let Some(lang) = l.language() {
                object.insert("xml:lang".into(), json!(lang));
            } else if l.datatype() != XSD_STRING {
                object.insert("datatype".into(), json!(l.datatype()));
            }
            Value::Object(object)
        }
        Term::Variable(v) => json!({ "type": "variable", "value": v.as_str() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::{Literal, NamedNode};

    fn iri(s: &str) -> Term {
        Term::iri(format!("http://example.org/{}", s)).unwrap()
    }

    #[test]
    fn test_bindings_json_shape() {
        let x = Variable::new("x").unwrap();
        let n = Variable::new("n").unwrap();
        let count = Literal::new_typed_literal(
            "3",
            NamedNode::new("http://www.w3.org/2001/XMLSchema#integer").unwrap(),
        );
        let solution: QuerySolution = vec![(x.clone(), iri("a")), (n.clone(), count.into())]
            .into_iter()
            .collect();
        let results = SparqlResults::Bindings {
            variables: vec![x, n],
            solutions: vec![solution],
        };

        let value = results.to_json();
        assert_eq!(value["head"]["vars"], json!(["x", "n"]));
        let row = &value["results"]["bindings"][0];
        assert_eq!(row["x"], json!({ "type": "uri", "value": "http://example.org/a" }));
        assert_eq!(row["n"]["datatype"], json!("http://www.w3.org/2001/XMLSchema#integer"));
    }

    #[test]
    fn test_plain_literal_has_no_datatype() {
        let value = term_to_json(&Term::literal("open"));
        assert_eq!(value, json!({ "type": "literal", "value": "open" }));
    }

    #[test]
    fn test_into_distinct() {
        let t = Triple::new(iri("a"), iri("p"), iri("b"));
        let results = SparqlResults::Graph(vec![t.clone(), t.clone()]).into_distinct();
        assert_eq!(results.triples(), Some(&[t][..]));

        let x = Variable::new("x").unwrap();
        let s: QuerySolution = std::iter::once((x.clone(), iri("a"))).collect();
        let results = SparqlResults::Bindings {
            variables: vec![x],
            solutions: vec![s.clone(), s.clone()],
        }
        .into_distinct();
        assert_eq!(results.len(), 1);
    }
}
