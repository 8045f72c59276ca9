//! Shader node graph assembly: nodes, their wiring and what the generator has to declare.

use super::{
    definition::{LoadOptions, ShaderNodeDefinition, Stage},
    error::{ErrorKind, LoadResult},
    parsing::Statement,
    resolver::{Consumer, Resolver},
    technique::TechniqueDef,
    typecheck,
    variable::{Namespace, ShaderNodeVariable, VarId, VariableRef, GLOBAL_TYPE},
};

use crate::{asset::AssetLoader, material::MaterialDef, Building, Finalized};

use std::{
    collections::{BTreeSet, HashMap},
    rc::Rc,
};

use log::{debug, warn};

/// Delimiter of inline GLSL expressions on the right of a mapping.
const EXPRESSION_DELIMITER: &str = "%%";

#[derive(Clone, Debug, PartialEq, Eq)]
/// Right-hand side of a [VariableMapping].
pub enum MappingSource {
    /// Resolved variable.
    Variable(VarId),
    /// Raw GLSL expression, copied as is by the generator.
    Expression(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// One wiring rule of a node.
///
/// For input mappings the left side is a definition input; for output mappings it is a global
/// and the right side is a definition output.
pub struct VariableMapping {
    /// Variable written.
    pub left: VarId,
    /// Value read.
    pub right: MappingSource,
    /// Component selection on the left, empty for the whole variable.
    pub left_swizzle: String,
    /// Component selection on the right, empty for the whole variable.
    pub right_swizzle: String,
    /// Normalized condition guarding the assignment.
    pub condition: Option<String>,
}

impl VariableMapping {
    /// The resolved right variable, `None` for inline expressions.
    pub fn right_variable(&self) -> Option<VarId> {
        match self.right {
            MappingSource::Variable(id) => Some(id),
            MappingSource::Expression(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
/// An instance of a [ShaderNodeDefinition] in a technique.
pub struct ShaderNode {
    /// Unique name in the technique.
    pub name: String,
    /// Shared definition.
    pub definition: Rc<ShaderNodeDefinition>,
    /// Normalized condition guarding the whole node.
    pub condition: Option<String>,
    /// Input wiring, in declaration order.
    pub input_mapping: Vec<VariableMapping>,
    /// Output wiring, in declaration order.
    pub output_mapping: Vec<VariableMapping>,
}

impl ShaderNode {
    /// Stage of the definition.
    pub fn stage(&self) -> Stage {
        self.definition.stage
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
/// Declarations the generator has to emit, each exactly once.
pub struct ShaderGenerationInfo {
    /// Vertex attributes.
    pub attributes: Vec<VarId>,
    /// Uniforms of the vertex shader.
    pub vertex_uniforms: Vec<VarId>,
    /// Uniforms of the fragment shader.
    pub fragment_uniforms: Vec<VarId>,
    /// Vertex outputs read by fragment nodes.
    pub varyings: Vec<VarId>,
    /// The single vertex output.
    pub vertex_global: Option<VarId>,
    /// Fragment outputs.
    pub fragment_globals: Vec<VarId>,
    /// Nodes whose outputs nobody reads.
    pub unused_nodes: BTreeSet<String>,
}

enum RawSource<'t> {
    Reference(&'t str),
    Expression(&'t str),
}

struct RawMapping<'t> {
    left: &'t str,
    right: RawSource<'t>,
    condition: Option<&'t str>,
}

/// Read the `[:<condition>]` tail of a mapping. An empty condition is no condition.
fn mapping_condition<'t>(line: &str, tail: &'t str) -> Result<Option<&'t str>, ErrorKind> {
    let tail = tail.trim();
    if tail.is_empty() {
        return Ok(None);
    }

    let condition = tail
        .strip_prefix(':')
        .ok_or_else(|| ErrorKind::MalformedMapping(line.to_owned()))?
        .trim();

    Ok(Some(condition).filter(|condition| !condition.is_empty()))
}

/// Split `<left> = <right>[:<condition>]` where `<right>` may be a `%% expression %%`.
fn split_mapping(line: &str) -> Result<RawMapping<'_>, ErrorKind> {
    let malformed = || ErrorKind::MalformedMapping(line.to_owned());

    if let Some(start) = line.find(EXPRESSION_DELIMITER) {
        let (head, rest) = line.split_at(start);
        let rest = &rest[EXPRESSION_DELIMITER.len()..];
        let end = rest.find(EXPRESSION_DELIMITER).ok_or_else(malformed)?;

        let left = head.trim_end().strip_suffix('=').ok_or_else(malformed)?;
        if left.contains('=') {
            return Err(malformed());
        }

        return Ok(RawMapping {
            left: left.trim(),
            right: RawSource::Expression(rest[..end].trim()),
            condition: mapping_condition(line, &rest[end + EXPRESSION_DELIMITER.len()..])?,
        });
    }

    let (assignment, tail) = match line.find(':') {
        Some(i) => line.split_at(i),
        None => (line, ""),
    };

    let sides = assignment.split('=').collect::<Vec<_>>();
    let [left, right] = sides.as_slice() else {
        return Err(malformed());
    };

    Ok(RawMapping {
        left: left.trim(),
        right: RawSource::Reference(right.trim()),
        condition: mapping_condition(line, tail)?,
    })
}

/// Reads the node blocks of one technique into its graph.
///
/// Definitions are looked up by name among the ones already known, loading the file named by the
/// `Definition` line when needed.
pub struct GraphBuilder<'a, L: AssetLoader> {
    material: &'a MaterialDef,
    loader: &'a mut L,
    options: LoadOptions,
    definitions: HashMap<String, Rc<ShaderNodeDefinition>>,
    technique: TechniqueDef<Building>,
}

impl<'a, L: AssetLoader> GraphBuilder<'a, L> {
    /// Build the graph of `technique` against `material`.
    pub fn new(
        material: &'a MaterialDef,
        loader: &'a mut L,
        options: LoadOptions,
        technique: TechniqueDef<Building>,
    ) -> Self {
        Self {
            material,
            loader,
            options,
            definitions: HashMap::new(),
            technique,
        }
    }

    /// Make definitions available to `Definition` lines. Known names are not replaced.
    pub fn add_definitions(&mut self, definitions: impl IntoIterator<Item = ShaderNodeDefinition>) {
        for definition in definitions {
            self.definitions
                .entry(definition.name.clone())
                .or_insert_with(|| Rc::new(definition));
        }
    }

    /// Compute conditions and hand the technique over.
    pub fn finish(self) -> TechniqueDef<Finalized> {
        self.technique.finish()
    }

    fn resolver(&mut self) -> Resolver<'_> {
        Resolver::new(self.material, &mut self.technique)
    }

    /// Read the `ShaderNode` blocks of a `VertexShaderNodes` or `FragmentShaderNodes` block.
    pub fn read_nodes(&mut self, statements: &[Statement]) -> LoadResult<()> {
        for statement in statements {
            let Some(name) = statement.line.strip_prefix("ShaderNode ") else {
                return Err(ErrorKind::UnexpectedStatement {
                    expected: "ShaderNode",
                    got: statement.keyword().to_owned(),
                }
                .at(statement));
            };
            let name = name.trim();

            if self.technique.nodes.iter().any(|node| node.name == name) {
                return Err(ErrorKind::DuplicateNode(name.to_owned()).at(statement));
            }

            let node = self.read_node(name, statement)?;
            self.technique.nodes.push(node);
        }

        Ok(())
    }

    /// Read one `ShaderNode` block. Its `Definition` line must come first.
    pub fn read_node(&mut self, name: &str, statement: &Statement) -> LoadResult<ShaderNode> {
        let missing_definition = || ErrorKind::MissingDefinition(name.to_owned());

        let Some((first, rest)) = statement.contents.split_first() else {
            return Err(missing_definition().at(statement));
        };
        if !first.line.starts_with("Definition") {
            return Err(missing_definition().at(first));
        }

        let definition = self.find_definition(first)?;

        self.technique.info.unused_nodes.insert(name.to_owned());
        if definition.no_output {
            self.technique.info.unused_nodes.remove(name);
        } else if definition.outputs.is_empty() {
            warn!("Shader node `{name}`: definition `{}` declares no output", definition.name);
        }

        let mut node = ShaderNode {
            name: name.to_owned(),
            definition,
            condition: None,
            input_mapping: vec![],
            output_mapping: vec![],
        };

        for statement in rest {
            let line = statement.line.as_str();

            if line.starts_with("Condition") {
                let Some((_, condition)) = line.rsplit_once(':') else {
                    return Err(ErrorKind::MalformedStatement("Condition").at(statement));
                };
                let condition = Some(condition.trim()).filter(|c| !c.is_empty());
                node.condition = self
                    .read_condition(condition)
                    .map_err(|kind| kind.at(statement))?;
            } else if line.starts_with("InputMapping") {
                for mapping in statement.contents.iter() {
                    let mapping = self.read_input_mapping(&node, mapping)?;
                    node.input_mapping.push(mapping);
                }
            } else if line.starts_with("OutputMapping") {
                for mapping in statement.contents.iter() {
                    let mapping = self.read_output_mapping(&node, mapping)?;
                    node.output_mapping.push(mapping);
                }
            } else {
                return Err(ErrorKind::UnexpectedStatement {
                    expected: "one of Condition, InputMappings, OutputMappings",
                    got: statement.keyword().to_owned(),
                }
                .at(statement));
            }
        }

        Ok(node)
    }

    /// Find the definition named by a `Definition: <Name> [: <path>]` line.
    fn find_definition(&mut self, statement: &Statement) -> LoadResult<Rc<ShaderNodeDefinition>> {
        let split = statement.line.split(':').map(str::trim).collect::<Vec<_>>();
        let (name, path) = match split.as_slice() {
            [_, name] => (*name, None),
            [_, name, path] => (*name, Some(*path)),
            _ => return Err(ErrorKind::MalformedStatement("Definition").at(statement)),
        };

        if let Some(definition) = self.definitions.get(name) {
            return Ok(definition.clone());
        }

        if let Some(path) = path {
            let loaded = self
                .loader
                .load_definitions(path, self.options)
                .map_err(|err| err.or_at(statement))?;

            for mut definition in loaded {
                definition.path = Some(path.to_owned());
                self.definitions
                    .entry(definition.name.clone())
                    .or_insert_with(|| Rc::new(definition));
            }
        }

        self.definitions
            .get(name)
            .cloned()
            .ok_or_else(|| ErrorKind::UnknownDefinition(name.to_owned()).at(statement))
    }

    fn read_condition(&mut self, condition: Option<&str>) -> Result<Option<String>, ErrorKind> {
        condition
            .map(|condition| self.resolver().extract_condition(condition))
            .transpose()
    }

    /// Read `<input>[.<swizzle>] = <namespace>.<name>[.<swizzle>][:<condition>]`.
    fn read_input_mapping(
        &mut self,
        node: &ShaderNode,
        statement: &Statement,
    ) -> LoadResult<VariableMapping> {
        let at = |kind: ErrorKind| kind.at(statement);
        let malformed = || at(ErrorKind::MalformedMapping(statement.line.clone()));

        let raw = split_mapping(&statement.line).map_err(at)?;
        let left_ref = VariableRef::parse(raw.left, false).ok_or_else(malformed)?;

        let mut left = node
            .definition
            .input(&left_ref.name)
            .ok_or_else(|| {
                at(ErrorKind::NotAnInput {
                    variable: left_ref.name.clone(),
                    definition: node.definition.name.clone(),
                })
            })?
            .clone();
        left.namespace = Some(Namespace::Node(node.name.clone()));

        let condition = self.read_condition(raw.condition).map_err(at)?;

        let (right, right_swizzle) = match raw.right {
            RawSource::Expression(expression) => {
                (MappingSource::Expression(expression.to_owned()), String::new())
            }
            RawSource::Reference(text) => {
                let right_ref = VariableRef::parse(text, true).ok_or_else(malformed)?;

                if left.is_sampler() && right_ref.namespace != Some(Namespace::MaterialParameter) {
                    return Err(at(ErrorKind::SamplerSource(left.name.clone())));
                }

                let consumer = Consumer {
                    name: &node.name,
                    stage: node.stage(),
                };
                let id = self
                    .resolver()
                    .resolve(&right_ref, &mut left, consumer)
                    .map_err(at)?;

                typecheck::check(
                    &left,
                    &left_ref.swizzle,
                    &self.technique.variables[id],
                    &right_ref.swizzle,
                )
                .map_err(at)?;

                if let Some(Namespace::Node(producer)) = &right_ref.namespace {
                    self.technique.info.unused_nodes.remove(producer);
                }

                (MappingSource::Variable(id), right_ref.swizzle)
            }
        };

        Ok(VariableMapping {
            left: self.technique.variables.add(left),
            right,
            left_swizzle: left_ref.swizzle,
            right_swizzle,
            condition,
        })
    }

    /// Read `Global.<name>[.<swizzle>] = <output>[.<swizzle>][:<condition>]`.
    fn read_output_mapping(
        &mut self,
        node: &ShaderNode,
        statement: &Statement,
    ) -> LoadResult<VariableMapping> {
        let at = |kind: ErrorKind| kind.at(statement);
        let malformed = || at(ErrorKind::MalformedMapping(statement.line.clone()));

        let raw = split_mapping(&statement.line).map_err(at)?;
        let RawSource::Reference(right) = raw.right else {
            return Err(malformed());
        };

        let left_ref = VariableRef::parse(raw.left, true).ok_or_else(malformed)?;
        let right_ref = VariableRef::parse(right, false).ok_or_else(malformed)?;

        match &left_ref.namespace {
            Some(Namespace::Global) => {}
            namespace => {
                return Err(at(ErrorKind::OutputNamespace(
                    namespace.as_ref().map(ToString::to_string).unwrap_or_default(),
                )))
            }
        }

        let output = node.definition.output(&right_ref.name).ok_or_else(|| {
            at(ErrorKind::NotAnOutput {
                variable: right_ref.name.clone(),
                definition: node.definition.name.clone(),
            })
        })?;
        if output.is_sampler() {
            return Err(at(ErrorKind::SamplerOutput(output.name.clone())));
        }

        let mut var = output.clone();
        var.namespace = Some(Namespace::Node(node.name.clone()));

        let global =
            ShaderNodeVariable::new(GLOBAL_TYPE, &left_ref.name).in_namespace(Namespace::Global);
        typecheck::check(&global, &left_ref.swizzle, &var, &right_ref.swizzle).map_err(at)?;

        let condition = self.read_condition(raw.condition).map_err(at)?;
        let left = self
            .resolver()
            .store_global(global, node.stage())
            .map_err(at)?;

        debug!("Shader node `{}` writes `Global.{}`", node.name, left_ref.name);
        self.technique.info.unused_nodes.remove(&node.name);

        Ok(VariableMapping {
            left,
            right: MappingSource::Variable(self.technique.variables.add(var)),
            left_swizzle: left_ref.swizzle,
            right_swizzle: right_ref.swizzle,
            condition,
        })
    }
}
