//! Reusable shader node definitions: typed signature, target stage and sources.

use super::{
    error::{ErrorKind, LoadResult},
    parsing::Statement,
    variable::ShaderNodeVariable,
};

use std::{collections::HashSet, str::FromStr};

use derive_more::Display;

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
/// Pipeline stage a definition runs in.
#[allow(missing_docs)]
pub enum Stage {
    Vertex,
    Fragment,
    Geometry,
    TessellationControl,
    TessellationEvaluation,
}

impl FromStr for Stage {
    type Err = ErrorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "Vertex" => Self::Vertex,
            "Fragment" => Self::Fragment,
            "Geometry" => Self::Geometry,
            "TessellationControl" => Self::TessellationControl,
            "TessellationEvaluation" => Self::TessellationEvaluation,
            other => Err(ErrorKind::UnknownStage(other.to_owned()))?,
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// Options for reading definition files.
pub struct LoadOptions {
    /// Keep `Documentation` blocks (editors want them, the generator does not).
    pub load_documentation: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// Source file implementing a definition for one shading language.
pub struct ShaderSource {
    /// Language tag, e.g. `GLSL100`.
    pub language: String,
    /// Asset path of the source.
    pub path: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// Signature and metadata of a reusable shader node operation.
pub struct ShaderNodeDefinition {
    /// Definition name, referenced by `Definition:` lines.
    pub name: String,
    /// File the definition was loaded from, if external.
    pub path: Option<String>,
    /// Stage the node code runs in.
    pub stage: Stage,
    /// Implementations, one per language.
    pub shaders: Vec<ShaderSource>,
    /// Free text documentation, see [LoadOptions].
    pub documentation: Option<String>,
    /// Declared inputs.
    pub inputs: Vec<ShaderNodeVariable>,
    /// Declared outputs.
    pub outputs: Vec<ShaderNodeVariable>,
    /// Declared with `Output { None }`: the node only has side effects.
    pub no_output: bool,
}

impl ShaderNodeDefinition {
    /// Create an empty definition, mostly useful to build definitions by hand.
    pub fn new(name: &str, stage: Stage) -> Self {
        Self {
            name: name.to_owned(),
            path: None,
            stage,
            shaders: vec![],
            documentation: None,
            inputs: vec![],
            outputs: vec![],
            no_output: false,
        }
    }

    /// Find a declared input by name.
    pub fn input(&self, name: &str) -> Option<&ShaderNodeVariable> {
        self.inputs.iter().find(|var| var.name == name)
    }

    /// Find a declared output by name.
    pub fn output(&self, name: &str) -> Option<&ShaderNodeVariable> {
        self.outputs.iter().find(|var| var.name == name)
    }
}

/// Read the contents of a `ShaderNodeDefinitions` block (or of a whole definition file).
///
/// Definitions named twice keep their first declaration.
pub fn read_definitions(
    statements: &[Statement],
    options: LoadOptions,
) -> LoadResult<Vec<ShaderNodeDefinition>> {
    let mut res: Vec<ShaderNodeDefinition> = Vec::new();

    for statement in statements {
        let Some(name) = statement.line.strip_prefix("ShaderNodeDefinition") else {
            return Err(ErrorKind::UnexpectedStatement {
                expected: "ShaderNodeDefinition",
                got: statement.keyword().to_owned(),
            }
            .at(statement));
        };
        let name = name.trim();

        if res.iter().any(|def| def.name == name) {
            continue;
        }

        res.push(read_definition(name, statement, options)?);
    }

    Ok(res)
}

fn read_definition(
    name: &str,
    statement: &Statement,
    options: LoadOptions,
) -> LoadResult<ShaderNodeDefinition> {
    let mut stage = None;
    let mut shaders = vec![];
    let mut documentation = None;
    let mut inputs = vec![];
    let mut outputs = vec![];
    let mut no_output = false;

    for statement in statement.contents.iter() {
        let line = statement.line.as_str();

        if line.starts_with("Type") {
            let value = line[line.rfind(':').map_or(0, |i| i + 1)..].trim();
            stage = Some(value.parse::<Stage>().map_err(|kind| kind.at(statement))?);
        } else if line.starts_with("Shader ") {
            shaders.push(read_shader_statement(statement)?);
        } else if line.starts_with("Documentation") {
            if options.load_documentation {
                documentation = Some(
                    statement
                        .contents
                        .iter()
                        .map(|line| format!("\n{}", line.line))
                        .collect::<String>(),
                );
            }
        } else if line.starts_with("Input") {
            inputs = read_variables(&statement.contents)?;
        } else if line.starts_with("Output") {
            if statement.contents.iter().any(|s| s.line == "None") {
                no_output = true;
            }
            outputs = read_variables(
                &statement
                    .contents
                    .iter()
                    .filter(|s| s.line != "None")
                    .cloned()
                    .collect::<Vec<_>>(),
            )?;
        } else {
            return Err(ErrorKind::UnexpectedStatement {
                expected: "one of Type, Shader, Documentation, Input, Output",
                got: statement.keyword().to_owned(),
            }
            .at(statement));
        }
    }

    let stage = stage.ok_or_else(|| ErrorKind::MissingStage(name.to_owned()).at(statement))?;

    Ok(ShaderNodeDefinition {
        name: name.to_owned(),
        path: None,
        stage,
        shaders,
        documentation,
        inputs,
        outputs,
        no_output,
    })
}

/// Read a `Shader <LANG>: <path>` line.
pub fn read_shader_statement(statement: &Statement) -> LoadResult<ShaderSource> {
    let split = statement.line.split(':').collect::<Vec<_>>();
    let [head, path] = split.as_slice() else {
        return Err(ErrorKind::MalformedStatement("Shader").at(statement));
    };

    let type_and_lang = head.split_whitespace().collect::<Vec<_>>();
    let [_, language] = type_and_lang.as_slice() else {
        return Err(ErrorKind::MalformedStatement("Shader").at(statement));
    };

    Ok(ShaderSource {
        language: language.to_string(),
        path: path.trim().to_owned(),
    })
}

fn read_variables(statements: &[Statement]) -> LoadResult<Vec<ShaderNodeVariable>> {
    let mut names = HashSet::new();

    statements
        .iter()
        .map(|statement| {
            let var = read_variable(statement)?;
            if !names.insert(var.name.clone()) {
                return Err(ErrorKind::DuplicateVariable(var.name).at(statement));
            }
            Ok(var)
        })
        .collect()
}

/// Read a `<glslType> <varName>[<multiplicity>] [<defaultValue>]` declaration.
pub fn read_variable(statement: &Statement) -> LoadResult<ShaderNodeVariable> {
    let malformed = || ErrorKind::MalformedVariable(statement.line.clone()).at(statement);

    // `vec4 lights [4]` is accepted as `vec4 lights[4]`.
    let mut line = statement.line.trim().to_owned();
    while line.contains(" [") || line.contains("\t[") {
        line = line.replace(" [", "[").replace("\t[", "[");
    }

    let tokens = line.split_whitespace().collect::<Vec<_>>();
    let (r#type, declaration, default_value) = match tokens.as_slice() {
        [r#type, declaration] => (*r#type, *declaration, None),
        [r#type, declaration, default] => (*r#type, *declaration, Some(default.to_string())),
        _ => return Err(malformed()),
    };

    let (name, multiplicity) = match declaration.split_once('[') {
        Some((name, rest)) => {
            let multiplicity = rest.trim_end_matches(']').trim();
            if multiplicity.is_empty() {
                return Err(malformed());
            }
            (name.trim(), Some(multiplicity.to_owned()))
        }
        None => (declaration, None),
    };

    Ok(ShaderNodeVariable {
        default_value,
        ..ShaderNodeVariable::new(r#type, name).with_multiplicity(multiplicity)
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::shader::parsing::read_statements;

    const DEFINITIONS: &str = r#"
        ShaderNodeDefinition ColorMult {
            Type: Fragment
            Shader GLSL100: Common/MatDefs/ShaderNodes/Basic/colorMult.frag
            Documentation {
                Multiplies two colors
            }
            Input {
                vec4 color1
                vec4 color2 vec4(1.0)
            }
            Output {
                vec4 outColor
            }
        }
        ShaderNodeDefinition Discard {
            Type: Fragment
            Input {
                float alpha
                vec4 lights [NbLights]
            }
            Output {
                None
            }
        }
    "#;

    fn definitions(options: LoadOptions) -> Vec<ShaderNodeDefinition> {
        read_definitions(&read_statements(DEFINITIONS).unwrap(), options).unwrap()
    }

    #[test]
    fn signature() {
        let defs = definitions(LoadOptions::default());
        let mult = &defs[0];

        assert_eq!(mult.name, "ColorMult");
        assert_eq!(mult.stage, Stage::Fragment);
        assert_eq!(
            mult.shaders,
            [ShaderSource {
                language: "GLSL100".to_owned(),
                path: "Common/MatDefs/ShaderNodes/Basic/colorMult.frag".to_owned(),
            }]
        );
        assert_eq!(mult.inputs.len(), 2);
        assert_eq!(mult.input("color2").unwrap().default_value.as_deref(), Some("vec4(1.0)"));
        assert_eq!(mult.output("outColor").unwrap().r#type, "vec4");
        assert_eq!(mult.documentation, None);
        assert!(!mult.no_output);
    }

    #[test]
    fn no_output_and_multiplicity() {
        let defs = definitions(LoadOptions::default());
        let discard = &defs[1];

        assert!(discard.no_output);
        assert!(discard.outputs.is_empty());

        let lights = discard.input("lights").unwrap();
        assert_eq!(lights.multiplicity.as_deref(), Some("NbLights"));
        assert_eq!(lights.r#type, "vec4");
    }

    #[test]
    fn documentation_on_demand() {
        let defs = definitions(LoadOptions {
            load_documentation: true,
        });

        assert_eq!(defs[0].documentation.as_deref(), Some("\nMultiplies two colors"));
    }

    #[test]
    fn malformed_variable() {
        let err = read_variable(&Statement::new("vec4 a b c", 3)).unwrap_err();

        assert!(matches!(err.kind, ErrorKind::MalformedVariable(_)));
        assert_eq!(err.location.unwrap().line, 3);
    }

    #[test]
    fn duplicate_variable() {
        let text = "ShaderNodeDefinition A { Type: Vertex; Input { vec4 a; float a } }";
        let err = read_definitions(&read_statements(text).unwrap(), LoadOptions::default())
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::DuplicateVariable("a".to_owned()));
    }

    #[test]
    fn unknown_stage() {
        let text = "ShaderNodeDefinition A { Type: Compute }";
        let err = read_definitions(&read_statements(text).unwrap(), LoadOptions::default())
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::UnknownStage("Compute".to_owned()));
    }

    #[test]
    fn missing_stage() {
        let text = "ShaderNodeDefinition A { Input { vec4 a } }";
        let err = read_definitions(&read_statements(text).unwrap(), LoadOptions::default())
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::MissingStage("A".to_owned()));
    }

    #[test]
    fn wrong_keyword() {
        let text = "ShaderNodeDefinition A { Type: Vertex; Parameters { vec4 a } }";
        let err = read_definitions(&read_statements(text).unwrap(), LoadOptions::default())
            .unwrap_err();

        assert_eq!(err.category(), crate::shader::error::Category::Syntax);
    }
}
