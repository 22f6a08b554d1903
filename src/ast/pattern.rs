//! Binding and assignment patterns

use super::*;

/// A binding pattern (declarations, parameters, assignment targets)
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Simple identifier binding
    Identifier(Name),

    /// Array destructuring `[a, , b, ...rest]` (holes are `None`)
    Array(Vec<Option<Pattern>>),

    /// Object destructuring `{ a, b: c, ...rest }`
    Object(Vec<ObjectPatternProperty>),

    /// Pattern with a default value `a = 1`
    Assignment(Box<Pattern>, Box<Expression>),

    /// Rest element `...rest`
    Rest(Box<Pattern>),

    /// Member expression target, only valid in assignments
    Member(Box<Expression>),
}

impl Pattern {
    /// All identifiers bound by this pattern
    pub fn bound_names(&self) -> Vec<Name> {
        let mut names = Vec::new();
        self.collect_bound_names(&mut names);
        names
    }

    fn collect_bound_names(&self, names: &mut Vec<Name>) {
        match self {
            Pattern::Identifier(name) => names.push(name.clone()),
            Pattern::Array(elements) => {
                for element in elements.iter().flatten() {
                    element.collect_bound_names(names);
                }
            }
            Pattern::Object(properties) => {
                for property in properties {
                    match property {
                        ObjectPatternProperty::Property { value, .. } => {
                            value.collect_bound_names(names)
                        }
                        ObjectPatternProperty::Rest(argument) => argument.collect_bound_names(names),
                    }
                }
            }
            Pattern::Assignment(left, _) => left.collect_bound_names(names),
            Pattern::Rest(argument) => argument.collect_bound_names(names),
            Pattern::Member(_) => {}
        }
    }
}

/// Object pattern entry
#[derive(Debug, Clone)]
pub enum ObjectPatternProperty {
    /// `key: value` or shorthand `key`
    Property { key: PropertyKey, value: Pattern },
    /// `...rest`
    Rest(Pattern),
}
