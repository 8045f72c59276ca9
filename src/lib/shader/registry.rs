//! Deduplicated uniform, attribute and varying declarations with the nodes consuming them.

use super::{
    condition::merge,
    definition::Stage,
    graph::{MappingSource, ShaderNode},
    variable::{ShaderNodeVariable, VarId, Variables},
};

use std::collections::HashMap;

use log::debug;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
/// Identity of a declaration. Two resolutions with the same key share one variable.
pub enum DeclKey {
    /// Vertex attribute, by name.
    Attribute(String),
    /// Material or world parameter uniform, by prefixed name. Stages reading it share it.
    Uniform(String),
    /// Vertex output interpolated for the fragment stage.
    Varying {
        /// Producing node.
        producer: String,
        /// Output of the producing node.
        output: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// A registered declaration.
pub struct DeclaredVariable {
    /// Shared variable.
    pub var: VarId,
    /// Names of the consuming nodes, in order of first use.
    pub consumers: Vec<String>,
}

impl DeclaredVariable {
    fn add_consumer(&mut self, consumer: &str) {
        if !self.consumers.iter().any(|c| c == consumer) {
            self.consumers.push(consumer.to_owned());
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
/// Declarations of one technique, in registration order.
pub struct DeclarationRegistry {
    index: HashMap<DeclKey, usize>,
    entries: Vec<(DeclKey, DeclaredVariable)>,
}

impl DeclarationRegistry {
    /// Register `var` under `key` or, if the key is known, return the existing variable.
    ///
    /// The offered variable is dropped when the key already exists: only the consumer set grows.
    /// The boolean is `true` for a new declaration.
    pub fn register_or_merge(
        &mut self,
        key: DeclKey,
        var: ShaderNodeVariable,
        consumer: &str,
        variables: &mut Variables,
    ) -> (VarId, bool) {
        if let Some(&i) = self.index.get(&key) {
            let entry = &mut self.entries[i].1;
            entry.add_consumer(consumer);
            return (entry.var, false);
        }

        debug!("Declaring `{}` for {key:?}", var.name);

        let id = variables.add(var);
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((
            key,
            DeclaredVariable {
                var: id,
                consumers: vec![consumer.to_owned()],
            },
        ));

        (id, true)
    }

    /// Look a declaration up.
    pub fn get(&self, key: &DeclKey) -> Option<&DeclaredVariable> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    /// Iterate over declarations in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&DeclKey, &DeclaredVariable)> {
        self.entries.iter().map(|(key, entry)| (key, entry))
    }

    /// Number of declarations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if nothing was declared.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Append `condition` to `current` with `operator` unless it already appears in it.
fn widen(current: String, condition: &str, operator: &str) -> String {
    if current.contains(condition) {
        current
    } else {
        format!("{current} {operator} ({condition})")
    }
}

/// Activation condition of a declaration: needed as soon as any consumer needs it.
fn make_condition(entry: &DeclaredVariable, nodes: &[ShaderNode]) -> Option<String> {
    let mut res: Option<String> = None;

    for node in entry
        .consumers
        .iter()
        .filter_map(|name| nodes.iter().find(|node| &node.name == name))
    {
        let mut condition: Option<String> = None;
        for mapping in node
            .input_mapping
            .iter()
            .filter(|mapping| mapping.right == MappingSource::Variable(entry.var))
        {
            let Some(mapping_condition) = &mapping.condition else {
                condition = None;
                break;
            };

            condition = Some(match condition {
                None => format!("({mapping_condition})"),
                Some(current) => widen(current, mapping_condition, "||"),
            });
        }

        let condition = match (&node.condition, condition) {
            (None, None) => return None,
            (None, Some(condition)) => condition,
            (Some(node_condition), None) => node_condition.clone(),
            (Some(node_condition), Some(condition)) if condition.contains(node_condition) => {
                condition
            }
            (Some(node_condition), Some(condition)) => {
                format!("({node_condition}) && ({condition})")
            }
        };

        res = Some(match res {
            None => condition,
            Some(current) if current.contains(&condition) => current,
            Some(current) => format!("({current}) || ({condition})"),
        });
    }

    res
}

fn update_conditions<'a>(
    entries: impl Iterator<Item = &'a DeclaredVariable>,
    nodes: &[ShaderNode],
    variables: &mut Variables,
) {
    for entry in entries {
        let mut condition = make_condition(entry, nodes);

        if let Some(define) = &variables[entry.var].multiplicity_define {
            let defined = format!("defined({define})");
            condition = merge(condition.as_deref(), Some(defined.as_str()), "||");
        }

        variables[entry.var].condition = condition;
    }
}

/// Compute the activation condition of every declaration of a technique.
///
/// Uniforms come first, then varyings and attributes. Vertex input
/// mappings writing to a promoted varying inherit its condition.
pub fn compute_conditions(
    nodes: &mut [ShaderNode],
    declarations: &DeclarationRegistry,
    variables: &mut Variables,
) {
    let of_kind = |filter: fn(&DeclKey) -> bool| {
        declarations
            .iter()
            .filter(move |(key, _)| filter(key))
            .map(|(_, entry)| entry)
    };

    update_conditions(
        of_kind(|key| matches!(key, DeclKey::Uniform(_))),
        nodes,
        variables,
    );
    update_conditions(
        of_kind(|key| matches!(key, DeclKey::Varying { .. })),
        nodes,
        variables,
    );

    for varying in of_kind(|key| matches!(key, DeclKey::Varying { .. })) {
        let var = &variables[varying.var];

        for node in nodes.iter_mut().filter(|node| node.stage() == Stage::Vertex) {
            for mapping in node
                .input_mapping
                .iter_mut()
                .filter(|mapping| variables[mapping.left].same_as(var))
            {
                mapping.condition = match (&mapping.condition, &var.condition) {
                    (Some(current), Some(condition)) => {
                        Some(format!("({current}) || ({condition})"))
                    }
                    _ => var.condition.clone(),
                };
            }
        }
    }

    update_conditions(
        of_kind(|key| matches!(key, DeclKey::Attribute(_))),
        nodes,
        variables,
    );
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::shader::{
        definition::ShaderNodeDefinition,
        graph::VariableMapping,
        variable::Namespace,
    };

    use std::rc::Rc;

    fn node(name: &str, stage: Stage, condition: Option<&str>) -> ShaderNode {
        ShaderNode {
            name: name.to_owned(),
            definition: Rc::new(ShaderNodeDefinition::new(name, stage)),
            condition: condition.map(str::to_owned),
            input_mapping: vec![],
            output_mapping: vec![],
        }
    }

    fn mapping(left: VarId, right: VarId, condition: Option<&str>) -> VariableMapping {
        VariableMapping {
            left,
            right: MappingSource::Variable(right),
            left_swizzle: String::new(),
            right_swizzle: String::new(),
            condition: condition.map(str::to_owned),
        }
    }

    fn uniform() -> ShaderNodeVariable {
        ShaderNodeVariable::new("vec4", "m_Color").in_namespace(Namespace::MaterialParameter)
    }

    #[test]
    fn same_key_same_variable() {
        let mut variables = Variables::default();
        let mut registry = DeclarationRegistry::default();
        let key = DeclKey::Uniform("m_Color".to_owned());

        let (a, new_a) = registry.register_or_merge(key.clone(), uniform(), "A", &mut variables);
        let (b, new_b) = registry.register_or_merge(
            key.clone(),
            ShaderNodeVariable::new("float", "m_Color"),
            "B",
            &mut variables,
        );
        registry.register_or_merge(key.clone(), uniform(), "B", &mut variables);

        assert!(new_a);
        assert!(!new_b);
        assert_eq!(a, b);
        assert_eq!(variables.len(), 1);
        assert_eq!(variables[a].r#type, "vec4");
        assert_eq!(registry.get(&key).unwrap().consumers, ["A", "B"]);
    }

    #[test]
    fn consumer_conditions_are_ored() {
        let mut variables = Variables::default();
        let mut registry = DeclarationRegistry::default();
        let key = DeclKey::Uniform("m_Color".to_owned());
        let (color, _) = registry.register_or_merge(key.clone(), uniform(), "A", &mut variables);
        registry.register_or_merge(key, uniform(), "B", &mut variables);
        let left = variables.add(ShaderNodeVariable::new("vec4", "color"));

        let mut a = node("A", Stage::Fragment, Some("defined(FOG)"));
        a.input_mapping.push(mapping(left, color, Some("defined(COLORMAP)")));
        let mut b = node("B", Stage::Fragment, None);
        b.input_mapping.push(mapping(left, color, Some("defined(LIGHTMAP)")));

        let mut nodes = [a, b];
        compute_conditions(&mut nodes, &registry, &mut variables);

        assert_eq!(
            variables[color].condition.as_deref(),
            Some("((defined(FOG)) && ((defined(COLORMAP)))) || ((defined(LIGHTMAP)))")
        );
    }

    #[test]
    fn uniform_shared_across_stages() {
        let mut variables = Variables::default();
        let mut registry = DeclarationRegistry::default();
        let key = DeclKey::Uniform("m_Color".to_owned());
        let (color, _) = registry.register_or_merge(key.clone(), uniform(), "Vert", &mut variables);
        let (again, new) = registry.register_or_merge(key, uniform(), "Frag", &mut variables);
        let left = variables.add(ShaderNodeVariable::new("vec4", "color"));

        let mut vert = node("Vert", Stage::Vertex, Some("defined(FOG)"));
        vert.input_mapping.push(mapping(left, color, None));
        let mut frag = node("Frag", Stage::Fragment, Some("defined(COLORMAP)"));
        frag.input_mapping.push(mapping(left, color, None));

        let mut nodes = [vert, frag];
        compute_conditions(&mut nodes, &registry, &mut variables);

        assert_eq!(color, again);
        assert!(!new);
        assert_eq!(registry.len(), 1);
        assert_eq!(
            variables[color].condition.as_deref(),
            Some("(defined(FOG)) || (defined(COLORMAP))")
        );
    }

    #[test]
    fn unconditional_use_wins() {
        let mut variables = Variables::default();
        let mut registry = DeclarationRegistry::default();
        let key = DeclKey::Uniform("m_Color".to_owned());
        let (color, _) = registry.register_or_merge(key.clone(), uniform(), "A", &mut variables);
        registry.register_or_merge(key, uniform(), "B", &mut variables);
        let left = variables.add(ShaderNodeVariable::new("vec4", "color"));

        let mut a = node("A", Stage::Vertex, Some("defined(FOG)"));
        a.input_mapping.push(mapping(left, color, None));
        let mut b = node("B", Stage::Vertex, None);
        b.input_mapping.push(mapping(left, color, None));

        let mut nodes = [a, b];
        compute_conditions(&mut nodes, &registry, &mut variables);

        assert_eq!(variables[color].condition, None);
    }

    #[test]
    fn multiplicity_define_widens() {
        let mut variables = Variables::default();
        let mut registry = DeclarationRegistry::default();
        let lights = ShaderNodeVariable {
            multiplicity_define: Some("NBLIGHTS".to_owned()),
            ..ShaderNodeVariable::new("vec4", "m_Lights")
        };
        let (id, _) = registry.register_or_merge(
            DeclKey::Uniform("m_Lights".to_owned()),
            lights,
            "A",
            &mut variables,
        );
        let left = variables.add(ShaderNodeVariable::new("vec4", "lights"));

        let mut a = node("A", Stage::Fragment, Some("defined(LIGHTING)"));
        a.input_mapping.push(mapping(left, id, None));

        let mut nodes = [a];
        compute_conditions(&mut nodes, &registry, &mut variables);

        assert_eq!(
            variables[id].condition.as_deref(),
            Some("(defined(LIGHTING)) || (defined(NBLIGHTS))")
        );
    }

    #[test]
    fn varying_condition_reaches_vertex_alias() {
        let mut variables = Variables::default();
        let mut registry = DeclarationRegistry::default();

        let texcoord = ShaderNodeVariable::new("vec2", "texCoord")
            .in_namespace(Namespace::Node("Vert".to_owned()));
        let (varying, _) = registry.register_or_merge(
            DeclKey::Varying {
                producer: "Vert".to_owned(),
                output: "texCoord".to_owned(),
            },
            texcoord.clone(),
            "Frag",
            &mut variables,
        );
        let attr = variables.add(ShaderNodeVariable::new("vec2", "inTexCoord"));
        let alias = variables.add(texcoord);
        let frag_left = variables.add(ShaderNodeVariable::new("vec2", "uv"));

        let mut vert = node("Vert", Stage::Vertex, None);
        vert.input_mapping.push(mapping(alias, attr, None));
        let mut frag = node("Frag", Stage::Fragment, Some("defined(COLORMAP)"));
        frag.input_mapping.push(mapping(frag_left, varying, None));

        let mut nodes = [vert, frag];
        compute_conditions(&mut nodes, &registry, &mut variables);

        assert_eq!(variables[varying].condition.as_deref(), Some("defined(COLORMAP)"));
        assert_eq!(
            nodes[0].input_mapping[0].condition.as_deref(),
            Some("defined(COLORMAP)")
        );
    }
}
