//! Techniques: one way of rendering a material, either from explicit shader sources or from a
//! shader node graph.

use super::{
    definition::{read_definitions, read_shader_statement, LoadOptions, ShaderSource, Stage},
    error::{ErrorKind, LoadResult},
    graph::{GraphBuilder, ShaderGenerationInfo, ShaderNode},
    parsing::Statement,
    registry::{compute_conditions, DeclarationRegistry},
    variable::Variables,
};

use crate::{
    asset::AssetLoader,
    binding::UniformBinding,
    material::{MaterialDef, VarType},
    Building, Finalized,
};

use std::{collections::BTreeMap, marker::PhantomData};

use log::debug;

#[derive(Clone, Debug, PartialEq, Eq)]
/// Define set by the generator when a material parameter is set.
pub struct ParamDefine {
    /// Define name.
    pub define: String,
    /// Type of the bound parameter.
    pub var_type: VarType,
}

#[derive(Clone, Debug)]
/// A technique of a material definition.
///
/// Nodes and declarations are filled while [Building]; conditions are computed when moving to
/// [Finalized].
pub struct TechniqueDef<State> {
    /// Technique name, `None` for the default technique.
    pub name: Option<String>,
    /// Shader nodes, in declaration order.
    pub nodes: Vec<ShaderNode>,
    /// What the generator has to declare.
    pub info: ShaderGenerationInfo,
    /// Every variable referenced by the nodes.
    pub variables: Variables,
    /// Uniform, attribute and varying declarations with their consumers.
    pub declarations: DeclarationRegistry,
    /// Material parameter name to define bindings.
    pub param_defines: BTreeMap<String, ParamDefine>,
    /// Defines always set.
    pub preset_defines: Vec<String>,
    /// World parameters the technique requests.
    pub world_bindings: Vec<UniformBinding>,
    /// Explicit shader sources, by stage.
    pub shader_sources: Vec<(Stage, ShaderSource)>,
    /// Preset defines as preprocessor lines.
    pub shader_prologue: String,
    state: PhantomData<State>,
}

impl<State> TechniqueDef<State> {
    /// Define bound to a material parameter.
    pub fn param_define(&self, param: &str) -> Option<&ParamDefine> {
        self.param_defines.get(param)
    }

    /// `true` when the technique is generated from shader nodes.
    pub fn uses_nodes(&self) -> bool {
        !self.nodes.is_empty()
    }

    /// Shader source given for a stage.
    pub fn shader_source(&self, stage: Stage) -> Option<&ShaderSource> {
        self.shader_sources
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, source)| source)
    }
}

impl TechniqueDef<Building> {
    /// Create an empty technique.
    pub fn new(name: Option<&str>) -> Self {
        Self {
            name: name.map(str::to_owned),
            nodes: vec![],
            info: ShaderGenerationInfo::default(),
            variables: Variables::default(),
            declarations: DeclarationRegistry::default(),
            param_defines: BTreeMap::new(),
            preset_defines: vec![],
            world_bindings: vec![],
            shader_sources: vec![],
            shader_prologue: String::new(),
            state: PhantomData,
        }
    }

    /// Bind `define` to `param` unless the parameter already has a define.
    pub fn add_param_define(&mut self, param: &str, define: &str, var_type: VarType) {
        if !self.param_defines.contains_key(param) {
            debug!("Binding define `{define}` to parameter `{param}`");

            self.param_defines.insert(
                param.to_owned(),
                ParamDefine {
                    define: define.to_owned(),
                    var_type,
                },
            );
        }
    }

    /// Compute declaration conditions and the shader prologue.
    pub fn finish(mut self) -> TechniqueDef<Finalized> {
        compute_conditions(&mut self.nodes, &self.declarations, &mut self.variables);

        let shader_prologue = self
            .preset_defines
            .iter()
            .map(|define| format!("#define {define} 1\n"))
            .collect();

        TechniqueDef {
            name: self.name,
            nodes: self.nodes,
            info: self.info,
            variables: self.variables,
            declarations: self.declarations,
            param_defines: self.param_defines,
            preset_defines: self.preset_defines,
            world_bindings: self.world_bindings,
            shader_sources: self.shader_sources,
            shader_prologue,
            state: PhantomData,
        }
    }
}

/// Read a `<DEFINE> [: <Param>]` line.
fn read_define(
    technique: &mut TechniqueDef<Building>,
    material: &MaterialDef,
    statement: &Statement,
) -> LoadResult<()> {
    let split = statement.line.split(':').map(str::trim).collect::<Vec<_>>();

    match split.as_slice() {
        [define] => {
            if !technique.preset_defines.iter().any(|d| d == define) {
                technique.preset_defines.push(define.to_string());
            }
        }
        [define, param] => {
            let param = material.param(param).ok_or_else(|| {
                ErrorKind::UnknownMaterialParameter(param.to_string()).at(statement)
            })?;
            technique.add_param_define(&param.name, define, param.var_type);
        }
        _ => return Err(ErrorKind::MalformedStatement("Define").at(statement)),
    }

    Ok(())
}

/// Read a `<Stage>Shader <LANG>: <path>` line.
fn read_source(keyword: &str, statement: &Statement) -> LoadResult<(Stage, ShaderSource)> {
    let stage = keyword
        .strip_suffix("Shader")
        .unwrap_or(keyword)
        .parse::<Stage>()
        .map_err(|kind| kind.at(statement))?;

    Ok((stage, read_shader_statement(statement)?))
}

/// Read a `Technique [name] { ... }` block.
///
/// Returns `None` for a technique that has neither a vertex and fragment source pair nor shader
/// nodes. With explicit sources the node blocks are not read.
pub fn read_technique<L: AssetLoader>(
    statement: &Statement,
    material: &MaterialDef,
    loader: &mut L,
    options: LoadOptions,
) -> LoadResult<Option<TechniqueDef<Finalized>>> {
    let tokens = statement.line.split_whitespace().collect::<Vec<_>>();
    let name = match tokens.as_slice() {
        [_] => None,
        [_, name] => Some(*name),
        _ => return Err(ErrorKind::MalformedStatement("Technique").at(statement)),
    };

    let mut technique = TechniqueDef::new(name);
    let mut definitions = vec![];
    let mut node_blocks = vec![];

    for statement in statement.contents.iter() {
        match statement.keyword() {
            "WorldParameters" => {
                for binding in statement.contents.iter() {
                    let binding = binding
                        .line
                        .parse::<UniformBinding>()
                        .map_err(|kind| kind.at(binding))?;
                    if !technique.world_bindings.contains(&binding) {
                        technique.world_bindings.push(binding);
                    }
                }
            }
            "Defines" => {
                for define in statement.contents.iter() {
                    read_define(&mut technique, material, define)?;
                }
            }
            "ShaderNodesDefinitions" => {
                definitions.extend(read_definitions(&statement.contents, options)?);
            }
            "VertexShaderNodes" | "FragmentShaderNodes" => node_blocks.push(statement),
            "RenderState" | "ForcedRenderState" | "LightMode" | "ShadowMode" => {
                debug!("Ignoring `{}`", statement.keyword());
            }
            keyword if keyword.ends_with("Shader") => {
                technique.shader_sources.push(read_source(keyword, statement)?);
            }
            other => {
                return Err(ErrorKind::UnexpectedStatement {
                    expected: "a technique statement",
                    got: other.to_owned(),
                }
                .at(statement))
            }
        }
    }

    let has_sources = technique.shader_source(Stage::Vertex).is_some()
        && technique.shader_source(Stage::Fragment).is_some();

    if has_sources {
        if !node_blocks.is_empty() {
            debug!("Technique has explicit shader sources, ignoring its shader nodes");
        }
        return Ok(Some(technique.finish()));
    }

    if node_blocks.is_empty() {
        return Ok(None);
    }

    let mut builder = GraphBuilder::new(material, loader, options, technique);
    builder.add_definitions(definitions);
    for block in node_blocks {
        builder.read_nodes(&block.contents)?;
    }

    Ok(Some(builder.finish()))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        asset::MemoryAssets,
        material::MatParam,
        shader::parsing::read_statements,
    };

    fn material() -> MaterialDef {
        MaterialDef::new(
            "Test",
            vec![
                MatParam {
                    name: "Color".to_owned(),
                    var_type: VarType::Vector4,
                    default: None,
                },
                MatParam {
                    name: "UseFog".to_owned(),
                    var_type: VarType::Boolean,
                    default: None,
                },
            ],
        )
    }

    fn technique(text: &str) -> LoadResult<Option<TechniqueDef<Finalized>>> {
        let statements = read_statements(text).unwrap();
        read_technique(
            &statements[0],
            &material(),
            &mut MemoryAssets::default(),
            LoadOptions::default(),
        )
    }

    #[test]
    fn explicit_sources() {
        let technique = technique(
            r#"
            Technique Glow {
                VertexShader GLSL100: Shaders/glow.vert
                FragmentShader GLSL100: Shaders/glow.frag
                WorldParameters {
                    WorldViewProjectionMatrix
                    WorldViewProjectionMatrix
                }
                Defines {
                    HAS_FOG : UseFog
                    DISCARD_ALPHA
                    DISCARD_ALPHA
                }
                RenderState {
                    FaceCull Off
                }
            }
            "#,
        )
        .unwrap()
        .unwrap();

        assert_eq!(technique.name.as_deref(), Some("Glow"));
        assert!(!technique.uses_nodes());
        assert_eq!(
            technique.shader_source(Stage::Fragment).unwrap().path,
            "Shaders/glow.frag"
        );
        assert_eq!(technique.world_bindings, [UniformBinding::WorldViewProjectionMatrix]);
        assert_eq!(
            technique.param_define("UseFog"),
            Some(&ParamDefine {
                define: "HAS_FOG".to_owned(),
                var_type: VarType::Boolean,
            })
        );
        assert_eq!(technique.shader_prologue, "#define DISCARD_ALPHA 1\n");
    }

    #[test]
    fn without_shaders() {
        let technique = technique("Technique { VertexShader GLSL100: a.vert }").unwrap();

        assert!(technique.is_none());
    }

    #[test]
    fn bad_define() {
        let err = technique("Technique { Defines { HAS_FOG : Fog } }").unwrap_err();

        assert_eq!(err.kind, ErrorKind::UnknownMaterialParameter("Fog".to_owned()));
        assert_eq!(err.location.unwrap().text, "HAS_FOG : Fog");
    }

    #[test]
    fn bad_binding() {
        let err = technique("Technique { WorldParameters { Camera } }").unwrap_err();

        assert_eq!(err.kind, ErrorKind::UnknownBinding("Camera".to_owned()));
    }
}
