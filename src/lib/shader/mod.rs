//! Shader node graphs: definitions, node wiring and the declarations a generator needs.

pub mod condition;
pub mod definition;
pub mod error;
pub mod graph;
pub mod parsing;
pub mod registry;
pub mod resolver;
pub mod technique;
pub mod typecheck;
pub mod variable;
