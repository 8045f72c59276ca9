//! Resolution of the right-hand side of input mappings against the material, the technique and
//! the nodes declared so far.

use super::{
    condition::{extract_defines, merge},
    definition::Stage,
    error::ErrorKind,
    registry::DeclKey,
    technique::TechniqueDef,
    typecheck::{collapse_sampler_union, UNION_SEPARATOR},
    variable::{cardinality, float_type, Namespace, ShaderNodeVariable, VarId, VariableRef, GLOBAL_TYPE},
};

use crate::{
    material::{MatParam, MaterialDef, VarType},
    Building,
};

use log::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// The node whose mapping is being resolved.
pub struct Consumer<'n> {
    /// Node name.
    pub name: &'n str,
    /// Stage of the node definition.
    pub stage: Stage,
}

/// Uniforms are declared either in the vertex shader or in the fragment shader.
fn uniform_stage(stage: Stage) -> Stage {
    match stage {
        Stage::Vertex => Stage::Vertex,
        _ => Stage::Fragment,
    }
}

/// Resolves references for one technique.
pub struct Resolver<'a> {
    material: &'a MaterialDef,
    technique: &'a mut TechniqueDef<Building>,
}

impl<'a> Resolver<'a> {
    /// Resolve against `material`, declaring into `technique`.
    pub fn new(material: &'a MaterialDef, technique: &'a mut TechniqueDef<Building>) -> Self {
        Self {
            material,
            technique,
        }
    }

    /// Resolve `reference`, the source of an input mapping writing to `left`.
    ///
    /// `left` may be updated: a multiplicity sized by a material parameter widens its condition.
    pub fn resolve(
        &mut self,
        reference: &VariableRef,
        left: &mut ShaderNodeVariable,
        consumer: Consumer,
    ) -> Result<VarId, ErrorKind> {
        match &reference.namespace {
            None => Err(ErrorKind::MalformedMapping(reference.name.clone())),
            Some(Namespace::Global) => {
                let var = ShaderNodeVariable::new(GLOBAL_TYPE, &reference.name)
                    .in_namespace(Namespace::Global);
                self.store_global(var, consumer.stage)
            }
            Some(Namespace::Attribute) => self.resolve_attribute(reference, left, consumer),
            Some(Namespace::MaterialParameter) => {
                self.resolve_material_parameter(reference, left, consumer)
            }
            Some(Namespace::WorldParameter) => self.resolve_world_parameter(reference, consumer),
            Some(Namespace::Node(producer)) => self.resolve_node_output(producer, reference, consumer),
        }
    }

    /// Store a stage output. The vertex stage has a single global, fragment globals are
    /// deduplicated by name.
    pub fn store_global(
        &mut self,
        mut var: ShaderNodeVariable,
        stage: Stage,
    ) -> Result<VarId, ErrorKind> {
        var.is_shader_output = true;

        let info = &mut self.technique.info;
        let variables = &mut self.technique.variables;

        match stage {
            Stage::Vertex => match info.vertex_global {
                Some(id) if variables[id].name == var.name => Ok(id),
                Some(id) => Err(ErrorKind::VertexGlobal {
                    existing: variables[id].name.clone(),
                    found: var.name,
                }),
                None => {
                    let id = variables.add(var);
                    info.vertex_global = Some(id);
                    Ok(id)
                }
            },
            Stage::Fragment => {
                let existing = info
                    .fragment_globals
                    .iter()
                    .copied()
                    .find(|&id| variables[id].name == var.name);

                Ok(existing.unwrap_or_else(|| {
                    let id = variables.add(var);
                    info.fragment_globals.push(id);
                    id
                }))
            }
            _ => Ok(variables.add(var)),
        }
    }

    /// Register a define for `param`, named after it in uppercase.
    pub fn add_define(&mut self, param: &str, var_type: VarType) {
        self.technique
            .add_param_define(param, &param.to_uppercase(), var_type);
    }

    /// Normalize a condition, checking every identifier names a material parameter.
    pub fn extract_condition(&mut self, text: &str) -> Result<String, ErrorKind> {
        let material = self.material;
        let expression = extract_defines(text);

        for define in expression.defines.iter() {
            let param = material
                .param(define)
                .ok_or_else(|| ErrorKind::InvalidCondition(text.trim().to_owned()))?;
            self.add_define(&param.name, param.var_type);
        }

        Ok(expression.normalized)
    }

    fn register(
        &mut self,
        key: DeclKey,
        var: ShaderNodeVariable,
        consumer: Consumer,
    ) -> (VarId, bool) {
        let technique = &mut *self.technique;
        technique
            .declarations
            .register_or_merge(key, var, consumer.name, &mut technique.variables)
    }

    /// Declare a uniform once per technique, listing it in each stage that reads it.
    fn register_uniform(&mut self, var: ShaderNodeVariable, consumer: Consumer) -> VarId {
        let (id, _) = self.register(DeclKey::Uniform(var.name.clone()), var, consumer);

        let info = &mut self.technique.info;
        let uniforms = match uniform_stage(consumer.stage) {
            Stage::Vertex => &mut info.vertex_uniforms,
            _ => &mut info.fragment_uniforms,
        };
        if !uniforms.contains(&id) {
            uniforms.push(id);
        }

        id
    }

    fn resolve_attribute(
        &mut self,
        reference: &VariableRef,
        left: &ShaderNodeVariable,
        consumer: Consumer,
    ) -> Result<VarId, ErrorKind> {
        if consumer.stage == Stage::Fragment {
            return Err(ErrorKind::FragmentAttribute(reference.name.clone()));
        }

        let r#type = cardinality(&left.r#type, &reference.swizzle)
            .map_or_else(|| left.r#type.clone(), float_type);
        let var = ShaderNodeVariable::new(&r#type, &reference.name)
            .in_namespace(Namespace::Attribute)
            .with_multiplicity(left.multiplicity.clone());

        let (id, new) = self.register(DeclKey::Attribute(reference.name.clone()), var, consumer);
        if new {
            self.technique.info.attributes.push(id);
        }

        Ok(id)
    }

    /// Resolve the multiplicity `left` requests from an array parameter.
    ///
    /// Returns the multiplicity and, when it is sized by another parameter, the define doing so.
    fn resolve_multiplicity(
        &mut self,
        param: &MatParam,
        left: &mut ShaderNodeVariable,
    ) -> Result<Option<(String, Option<String>)>, ErrorKind> {
        let Some(multiplicity) = left.multiplicity.clone() else {
            return Ok(None);
        };

        if !param.var_type.is_array() {
            return Err(ErrorKind::NotAnArray(param.name.clone()));
        }

        if multiplicity.parse::<usize>().is_ok() {
            return Ok(Some((multiplicity, None)));
        }

        let material = self.material;
        let Some(size) = material.param(&multiplicity) else {
            return Err(ErrorKind::InvalidMultiplicity {
                variable: left.name.clone(),
                multiplicity,
            });
        };

        self.add_define(&size.name, VarType::Int);

        let define = multiplicity.to_uppercase();
        let defined = format!("defined({define})");
        left.condition = merge(left.condition.as_deref(), Some(defined.as_str()), "||");

        Ok(Some((define.clone(), Some(define))))
    }

    fn resolve_material_parameter(
        &mut self,
        reference: &VariableRef,
        left: &mut ShaderNodeVariable,
        consumer: Consumer,
    ) -> Result<VarId, ErrorKind> {
        let material = self.material;
        let param = material
            .param(&reference.name)
            .ok_or_else(|| ErrorKind::UnknownMaterialParameter(reference.name.clone()))?;

        let mut var = ShaderNodeVariable::new(param.var_type.glsl_type(), &param.prefixed_name())
            .in_namespace(Namespace::MaterialParameter);

        if let Some((multiplicity, define)) = self.resolve_multiplicity(param, left)? {
            var.multiplicity = Some(multiplicity);
            var.multiplicity_define = define;
        }

        if var.r#type.contains(UNION_SEPARATOR) {
            var.r#type = collapse_sampler_union(&left.r#type, &var.r#type).ok_or_else(|| {
                ErrorKind::SamplerUnion {
                    param: param.name.clone(),
                    expected: var.r#type.replace(UNION_SEPARATOR, ", "),
                    found: left.r#type.clone(),
                }
            })?;
        }

        Ok(self.register_uniform(var, consumer))
    }

    fn resolve_world_parameter(
        &mut self,
        reference: &VariableRef,
        consumer: Consumer,
    ) -> Result<VarId, ErrorKind> {
        let binding = self
            .technique
            .world_bindings
            .iter()
            .copied()
            .find(|binding| binding.to_string() == reference.name)
            .ok_or_else(|| ErrorKind::UnknownWorldParameter(reference.name.clone()))?;

        let var = ShaderNodeVariable::new(binding.glsl_type(), &binding.uniform_name())
            .in_namespace(Namespace::WorldParameter);

        Ok(self.register_uniform(var, consumer))
    }

    fn resolve_node_output(
        &mut self,
        producer: &str,
        reference: &VariableRef,
        consumer: Consumer,
    ) -> Result<VarId, ErrorKind> {
        let index = self
            .technique
            .nodes
            .iter()
            .position(|node| node.name == producer)
            .ok_or_else(|| ErrorKind::UndeclaredNode(producer.to_owned()))?;
        let node = &self.technique.nodes[index];

        let output = node
            .definition
            .output(&reference.name)
            .ok_or_else(|| ErrorKind::NotAnOutput {
                variable: reference.name.clone(),
                definition: node.definition.name.clone(),
            })?;
        let var = ShaderNodeVariable::new(&output.r#type, &output.name)
            .in_namespace(Namespace::Node(node.name.clone()))
            .with_multiplicity(output.multiplicity.clone());

        match (node.stage(), consumer.stage) {
            (producer_stage, consumer_stage) if producer_stage == consumer_stage => {
                Ok(self.technique.variables.add(var))
            }
            (Stage::Vertex, Stage::Fragment) => Ok(self.promote_varying(index, var, consumer)),
            (producer_stage, consumer_stage) => Err(ErrorKind::BackwardFlow {
                producer: node.name.clone(),
                producer_stage,
                consumer: consumer.name.to_owned(),
                consumer_stage,
            }),
        }
    }

    /// Declare a vertex output as a varying, once per producer and output.
    fn promote_varying(
        &mut self,
        producer: usize,
        mut var: ShaderNodeVariable,
        consumer: Consumer,
    ) -> VarId {
        var.is_shader_output = true;

        let key = DeclKey::Varying {
            producer: self.technique.nodes[producer].name.clone(),
            output: var.name.clone(),
        };
        let (id, new) = self.register(key, var, consumer);

        let technique = &mut *self.technique;
        if new {
            debug!(
                "Promoting `{}.{}` to a varying",
                technique.nodes[producer].name, technique.variables[id].name
            );
            technique.info.varyings.push(id);
        }

        // An input of the producer named like the output is the same varying.
        for mapping in technique.nodes[producer].input_mapping.iter() {
            if technique.variables[mapping.left].name == technique.variables[id].name {
                technique.variables[mapping.left].is_shader_output = true;
            }
        }

        id
    }
}
